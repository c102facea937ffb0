pub mod engine;
pub mod memory;
pub mod sqlite;

pub use engine::StorageEngine;
pub use memory::MemoryEngine;
pub use sqlite::SqliteEngine;
