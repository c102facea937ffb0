use std::path::{Path, PathBuf};
use std::time::Duration;

const URL_SCHEME: &str = "sqlite://";
const MEMORY_URL: &str = "sqlite::memory:";

/// Journal mode applied when the backing file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalMode {
    /// Write-ahead log: readers do not block the writer across processes
    Wal,
    /// Rollback journal, deleted after each transaction
    Delete,
    /// Journal kept in memory
    Memory,
}

impl JournalMode {
    pub fn as_pragma(&self) -> &'static str {
        match self {
            Self::Wal => "WAL",
            Self::Delete => "DELETE",
            Self::Memory => "MEMORY",
        }
    }
}

/// Where the backing store lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// Not configured yet; opening fails with a connection error
    Unset,
    File(PathBuf),
    /// Private in-memory database, gone when the store closes
    Memory,
}

/// Store configuration
///
/// Set once before the store is built. The location cannot be changed on a
/// live store; build a new one instead.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Backing file (or in-memory database)
    pub location: StoreLocation,

    /// How long a statement waits on another writer's lock before failing
    pub busy_timeout: Duration,

    /// Journal mode applied on open (ignored for in-memory stores)
    pub journal_mode: JournalMode,

    /// Create missing parent directories of the backing file
    pub create_dirs: bool,
}

impl StoreConfig {
    /// Create a configuration pointing at `path`
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            location: StoreLocation::File(path.as_ref().to_path_buf()),
            ..Self::default()
        }
    }

    /// Create a configuration for a private in-memory database
    pub fn in_memory() -> Self {
        Self {
            location: StoreLocation::Memory,
            ..Self::default()
        }
    }

    /// Set the backing file
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.location = StoreLocation::File(path.as_ref().to_path_buf());
        self
    }

    /// Set the busy timeout
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Set the journal mode
    pub fn journal_mode(mut self, mode: JournalMode) -> Self {
        self.journal_mode = mode;
        self
    }

    /// Enable or disable creation of missing parent directories
    pub fn create_dirs(mut self, create: bool) -> Self {
        self.create_dirs = create;
        self
    }

    /// Parse from connection string
    ///
    /// Format: `sqlite://<path>` or `sqlite::memory:`
    ///
    /// # Examples
    ///
    /// ```
    /// use dynstore::StoreConfig;
    ///
    /// let config = StoreConfig::from_url("sqlite://data/objects.db").unwrap();
    /// assert_eq!(config.to_url(), "sqlite://data/objects.db");
    /// ```
    pub fn from_url(url: &str) -> Result<Self, String> {
        if url == MEMORY_URL {
            return Ok(Self::in_memory());
        }

        let path = url
            .strip_prefix(URL_SCHEME)
            .ok_or_else(|| format!("URL must start with '{}'", URL_SCHEME))?;

        if path.is_empty() {
            return Err("URL does not name a file".to_string());
        }

        Ok(Self::new(path))
    }

    /// Convert to connection string
    pub fn to_url(&self) -> String {
        match &self.location {
            StoreLocation::File(path) => format!("{}{}", URL_SCHEME, path.display()),
            StoreLocation::Memory => MEMORY_URL.to_string(),
            StoreLocation::Unset => URL_SCHEME.to_string(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        match &self.location {
            StoreLocation::Unset => return Err("Backing file path is not set".to_string()),
            StoreLocation::File(path) if path.as_os_str().is_empty() => {
                return Err("Backing file path cannot be empty".to_string());
            }
            _ => {}
        }

        if self.busy_timeout.is_zero() && self.journal_mode == JournalMode::Wal {
            return Err("busy_timeout must be > 0 in WAL mode".to_string());
        }

        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            location: StoreLocation::Unset,
            busy_timeout: Duration::from_secs(5),
            journal_mode: JournalMode::Wal,
            create_dirs: true,
        }
    }
}
