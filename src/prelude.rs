//! Common imports for application code.
//!
//! ```
//! use dynstore::prelude::*;
//! ```

pub use crate::attrs;
pub use crate::{Class, ClassDescriptor, Instance, Result, Store, StoreConfig, StoreError, Value};
