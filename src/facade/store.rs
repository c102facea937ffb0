use crate::connection::StoreConfig;
use crate::core::{Result, StoreError, Value};
use crate::identity::{CacheStats, IdentityCache};
use crate::instance::{Instance, InstanceInner, collect_attributes};
use crate::query::Search;
use crate::registry::{ClassDescriptor, ClassRegistry};
use crate::schema::SchemaEvolver;
use crate::storage::{SqliteEngine, StorageEngine};
use std::path::Path;
use std::sync::Arc;
use tracing::{Level, event, info_span};

/// Components shared by every class and instance of one store.
pub(crate) struct StoreInner {
    pub(crate) engine: Arc<dyn StorageEngine>,
    pub(crate) registry: ClassRegistry,
    pub(crate) evolver: SchemaEvolver,
    pub(crate) cache: IdentityCache<InstanceInner>,
    pub(crate) config: Option<StoreConfig>,
}

/// Schema-less object store
///
/// Owns the single backing connection shared by every class and instance.
/// Cheap to clone; clones share the connection, registry and identity
/// cache, and may be used from several threads.
///
/// # Examples
///
/// ```
/// use dynstore::{Store, StoreConfig, Value};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = Store::open(StoreConfig::in_memory())?;
/// let people = store.class("Person")?;
///
/// let alice = people.create([("name", "Alice")])?;
/// alice.set("age", 30)?;
///
/// let found = people.find([("name", "Alice")])?;
/// assert!(found.ptr_eq(&alice));
/// assert_eq!(found.get("age"), Some(Value::Integer(30)));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Open a store on the configured backing file
    ///
    /// Runs a discovery pass so classes created by earlier sessions or
    /// other processes are usable right away.
    pub fn open(config: StoreConfig) -> Result<Self> {
        config.validate().map_err(StoreError::Connection)?;
        let engine = Arc::new(SqliteEngine::new(config.clone()));
        Self::build(engine, Some(config))
    }

    /// Open a store on `path` with default settings
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(StoreConfig::new(path))
    }

    /// Open a store on a caller-supplied engine
    pub fn with_engine(engine: Arc<dyn StorageEngine>) -> Result<Self> {
        Self::build(engine, None)
    }

    fn build(engine: Arc<dyn StorageEngine>, config: Option<StoreConfig>) -> Result<Self> {
        let inner = StoreInner {
            registry: ClassRegistry::new(Arc::clone(&engine)),
            evolver: SchemaEvolver::new(Arc::clone(&engine)),
            cache: IdentityCache::new(),
            engine,
            config,
        };
        let store = Self {
            inner: Arc::new(inner),
        };

        let classes = store.list_classes()?;
        event!(Level::INFO, classes = classes.len(), "store opened");
        Ok(store)
    }

    /// Configuration the store was opened with, if it owns its engine
    pub fn config(&self) -> Option<&StoreConfig> {
        self.inner.config.as_ref()
    }

    /// Register a class, creating its table on first use
    pub fn register(&self, name: &str) -> Result<ClassDescriptor> {
        let span = info_span!("store.register", class = %name);
        let _enter = span.enter();
        self.inner.registry.register(name)
    }

    /// Every class present in the backing store, computed fresh
    pub fn list_classes(&self) -> Result<Vec<ClassDescriptor>> {
        self.inner.registry.list_classes()
    }

    /// Handle for working with the instances of a class
    ///
    /// Registers the class if needed.
    pub fn class(&self, name: &str) -> Result<Class> {
        let descriptor = self.register(name)?;
        Ok(Class {
            store: Arc::clone(&self.inner),
            descriptor,
        })
    }

    /// Identity cache counters
    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    /// Sweep dead identity cache entries
    pub fn purge_cache(&self) -> usize {
        self.inner.cache.purge()
    }

    /// Release the backing connection
    ///
    /// Live instances keep working; the next operation reopens the
    /// connection. An in-memory store loses its contents.
    pub fn close(&self) -> Result<()> {
        self.inner.engine.close()
    }
}

/// Operations scoped to one registered class
#[derive(Clone)]
pub struct Class {
    store: Arc<StoreInner>,
    descriptor: ClassDescriptor,
}

impl Class {
    pub fn descriptor(&self) -> &ClassDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// Create an instance carrying `attributes`
    ///
    /// Every name is validated before the row is inserted.
    pub fn create<I, K, V>(&self, attributes: I) -> Result<Instance>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let attributes = collect_attributes(attributes)?;
        Instance::create(&self.store, &self.descriptor, attributes)
    }

    /// Instance with identifier `id`
    ///
    /// Returns the live object if one exists, otherwise loads it. Fails
    /// with `NotFound` when no row carries `id`.
    pub fn retrieve(&self, id: &str) -> Result<Instance> {
        Instance::load(&self.store, &self.descriptor, id)
    }

    /// First instance matching every criterion
    ///
    /// No ordering is guaranteed between several matches. Fails with
    /// `NotFound` when nothing matches.
    pub fn find<I, K, V>(&self, criteria: I) -> Result<Instance>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let search = self.search(criteria)?;
        search.first()?.ok_or_else(|| {
            StoreError::NotFound(format!("{} matching {}", self.descriptor.name(), search))
        })
    }

    /// Instances matching every `attribute = value` criterion
    ///
    /// An empty criteria list selects every instance.
    pub fn search<I, K, V>(&self, criteria: I) -> Result<Search>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let criteria = collect_attributes(criteria)?;
        Ok(Search::new(Arc::clone(&self.store), self.descriptor.clone(), criteria))
    }

    /// Attribute columns provisioned so far, read from live schema
    pub fn columns(&self) -> Result<Vec<String>> {
        self.store.evolver.columns(self.descriptor.table())
    }
}
