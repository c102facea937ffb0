// ============================================================================
// dynstore Library
// ============================================================================
//
// Schema-less object store on SQLite. Classes are declared on the fly,
// instances live as rows, and attribute columns are added the first time
// an attribute is written.

#[macro_use]
mod macros;

pub mod core;
pub mod storage;
pub mod connection;
pub mod registry;
pub mod schema;
pub mod identity;
pub mod instance;
pub mod query;
pub mod facade;
pub mod prelude;

// Re-export main types for convenience
pub use facade::{Class, Store};
pub use crate::core::{Attributes, Result, StoreError, Value};
pub use connection::{JournalMode, StoreConfig, StoreLocation};
pub use registry::ClassDescriptor;
pub use instance::Instance;
pub use query::{Search, SearchIter};
pub use identity::CacheStats;
pub use storage::{MemoryEngine, SqliteEngine, StorageEngine};
