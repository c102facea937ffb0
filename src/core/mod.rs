pub mod error;
pub mod naming;
pub mod value;

pub use error::{Result, StoreError};
pub use naming::{ID_COLUMN, normalize_class_name, validate_identifier};
pub use value::Value;

use std::collections::BTreeMap;

/// Attribute snapshot of one row, identifier column excluded.
pub type Attributes = BTreeMap<String, Value>;
