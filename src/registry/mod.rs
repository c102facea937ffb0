//! Class registry: logical class names mapped to physical tables.

use crate::core::naming::{normalize_class_name, validate_identifier};
use crate::core::Result;
use crate::storage::StorageEngine;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::{Level, event};

/// A registered class and the table holding its instances.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassDescriptor {
    name: String,
    table: String,
}

impl ClassDescriptor {
    /// Builds a descriptor from a raw class name.
    pub fn from_name(name: &str) -> Result<Self> {
        validate_identifier("Class", name)?;
        let name = normalize_class_name(name);
        let table = name.to_ascii_lowercase();
        Ok(Self { name, table })
    }

    /// Canonical display name, e.g. `Person`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Physical table name, e.g. `person`
    pub fn table(&self) -> &str {
        &self.table
    }
}

impl fmt::Display for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Catalog of known classes, backed by the engine's table list.
pub struct ClassRegistry {
    engine: Arc<dyn StorageEngine>,
    /// Keyed by table name
    catalog: RwLock<HashMap<String, ClassDescriptor>>,
}

impl ClassRegistry {
    pub fn new(engine: Arc<dyn StorageEngine>) -> Self {
        Self {
            engine,
            catalog: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a class, creating its table on first use.
    ///
    /// Registering an already known class returns the same descriptor and
    /// issues no statement.
    pub fn register(&self, name: &str) -> Result<ClassDescriptor> {
        let descriptor = ClassDescriptor::from_name(name)?;

        if let Some(existing) = self.catalog.read()?.get(descriptor.table()) {
            return Ok(existing.clone());
        }

        self.engine.create_table(descriptor.table())?;
        event!(Level::INFO, class = %descriptor.name(), table = %descriptor.table(), "class registered");

        let mut catalog = self.catalog.write()?;
        Ok(catalog
            .entry(descriptor.table().to_string())
            .or_insert(descriptor)
            .clone())
    }

    /// Enumerates every class table in the backing store.
    ///
    /// Computed fresh on every call, so classes created by an earlier
    /// session or another process sharing the file show up here. Each
    /// discovered class joins the catalog.
    pub fn list_classes(&self) -> Result<Vec<ClassDescriptor>> {
        let tables = self.engine.list_tables()?;
        let mut classes = Vec::with_capacity(tables.len());

        for table in tables {
            match ClassDescriptor::from_name(&table) {
                Ok(descriptor) => classes.push(descriptor),
                Err(err) => warn!("Skipping table '{}' during class discovery: {}", table, err),
            }
        }

        let mut catalog = self.catalog.write()?;
        for descriptor in &classes {
            catalog
                .entry(descriptor.table().to_string())
                .or_insert_with(|| descriptor.clone());
        }

        Ok(classes)
    }

    /// Catalog lookup; never touches storage.
    pub fn lookup(&self, name: &str) -> Option<ClassDescriptor> {
        let table = name.to_ascii_lowercase();
        self.catalog.read().ok()?.get(&table).cloned()
    }

    /// Number of classes currently in the catalog
    pub fn len(&self) -> usize {
        self.catalog.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
