pub mod config;

pub use config::{JournalMode, StoreConfig, StoreLocation};
