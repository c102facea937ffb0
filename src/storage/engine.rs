use crate::core::{Attributes, Result, Value};

/// Storage engine trait - the capability set the object store consumes
/// from its backing relational engine.
///
/// Table and column names handed to an engine are already validated
/// against the identifier grammar. Values are always bound as
/// parameters, never spliced into statement text.
pub trait StorageEngine: Send + Sync {
    /// List all user table names
    fn list_tables(&self) -> Result<Vec<String>>;

    /// Create a table holding only the identifier column (no-op if present)
    fn create_table(&self, table: &str) -> Result<()>;

    /// Attribute column names of a table, identifier column excluded
    fn columns(&self, table: &str) -> Result<Vec<String>>;

    /// Add a nullable, untyped column; existing rows read it as null
    fn add_column(&self, table: &str, column: &str) -> Result<()>;

    /// Insert a bare row carrying only its identifier
    fn insert(&self, table: &str, id: &str) -> Result<()>;

    /// Overwrite the named columns of the row with `id`
    fn update(&self, table: &str, id: &str, values: &Attributes) -> Result<()>;

    /// Every attribute column of the row with `id`, or `None` if absent
    fn fetch(&self, table: &str, id: &str) -> Result<Option<Attributes>>;

    /// Identifiers of rows matching every `column = value` pair.
    /// An empty filter selects all rows.
    fn select_ids(&self, table: &str, filter: &[(String, Value)]) -> Result<Vec<String>>;

    /// Release the underlying connection; later calls may reopen it
    fn close(&self) -> Result<()>;
}
