use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Class or attribute name fails the identifier grammar.
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// Value the backing store cannot hold unchanged (NaN).
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Point lookup or `find` matched no row.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Backing store unreachable or misconfigured.
    #[error("Connection error: {0}")]
    Connection(String),

    /// DDL/DML failure surfaced from the backing store.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Backing store reported the file as busy or locked by another writer.
    #[error("Storage busy: {0}")]
    Busy(String),
}

impl StoreError {
    /// Transient failures that a caller may retry as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Storage(format!("lock poisoned: {}", err))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match &err {
            rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                    Self::Busy(err.to_string())
                }
                ErrorCode::CannotOpen | ErrorCode::NotADatabase | ErrorCode::PermissionDenied => {
                    Self::Connection(err.to_string())
                }
                _ => Self::Storage(err.to_string()),
            },
            _ => Self::Storage(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(format!("json: {}", err))
    }
}
