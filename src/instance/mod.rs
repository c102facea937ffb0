//! Persisted objects: an identifier plus an attribute snapshot.

use crate::core::naming::attribute_name;
use crate::core::{Attributes, ID_COLUMN, Result, StoreError, Value};
use crate::facade::StoreInner;
use crate::registry::ClassDescriptor;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{Level, event, info_span};
use uuid::Uuid;

/// Validates and case-folds attribute names, converting values.
///
/// Fails on the first invalid name or NaN before anything is touched;
/// SQLite would store a bound NaN as null.
pub(crate) fn collect_attributes<I, K, V>(attributes: I) -> Result<Vec<(String, Value)>>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<Value>,
{
    attributes
        .into_iter()
        .map(|(name, value)| {
            let name = attribute_name(name.as_ref())?;
            let value = value.into();
            if let Value::Float(f) = value
                && f.is_nan()
            {
                return Err(StoreError::InvalidValue(format!(
                    "attribute '{}' cannot hold NaN",
                    name
                )));
            }
            Ok((name, value))
        })
        .collect()
}

pub(crate) struct InstanceInner {
    store: Arc<StoreInner>,
    class: ClassDescriptor,
    id: String,
    /// Last committed state of the row; held for the whole write sequence
    snapshot: Mutex<Attributes>,
}

impl Drop for InstanceInner {
    fn drop(&mut self) {
        self.store.cache.evict_dead(self.class.table(), &self.id);
    }
}

/// Handle to a persisted object.
///
/// Clones share the same underlying object. Within one store, every live
/// handle for a given `(class, id)` points at the same object, so writes
/// made through one handle are visible through all of them.
#[derive(Clone)]
pub struct Instance(Arc<InstanceInner>);

impl Instance {
    /// Inserts a bare row under a fresh identifier, then applies
    /// `attributes` through [`Instance::set_many`].
    ///
    /// Names are validated before the insert, so invalid input leaves no
    /// row behind. The steps are not wrapped in a transaction: a failure
    /// after the insert leaves a row without some of its attributes.
    pub(crate) fn create(
        store: &Arc<StoreInner>,
        class: &ClassDescriptor,
        attributes: Vec<(String, Value)>,
    ) -> Result<Self> {
        let id = Uuid::new_v4().to_string();
        store.engine.insert(class.table(), &id)?;
        event!(Level::DEBUG, table = %class.table(), id = %id, "row inserted");

        let instance = Self::load(store, class, &id)?;
        instance.apply(attributes)?;
        Ok(instance)
    }

    /// Returns the live object for `id` or loads it from storage.
    pub(crate) fn load(store: &Arc<StoreInner>, class: &ClassDescriptor, id: &str) -> Result<Self> {
        let inner = store.cache.get_or_create(class.table(), id, || {
            let snapshot = store
                .engine
                .fetch(class.table(), id)?
                .ok_or_else(|| not_found(class, id))?;
            Ok(Arc::new(InstanceInner {
                store: Arc::clone(store),
                class: class.clone(),
                id: id.to_string(),
                snapshot: Mutex::new(snapshot),
            }))
        })?;
        Ok(Self(inner))
    }

    pub fn id(&self) -> &str {
        &self.0.id
    }

    pub fn class(&self) -> &ClassDescriptor {
        &self.0.class
    }

    /// Current snapshot value of `attribute`; never touches storage.
    ///
    /// `None` means the attribute was never provisioned for this class as
    /// of the last read. A provisioned but unset attribute is
    /// `Some(Value::Null)`.
    pub fn get(&self, attribute: &str) -> Option<Value> {
        let snapshot = self.0.snapshot.lock().unwrap_or_else(PoisonError::into_inner);
        snapshot.get(&attribute.to_ascii_lowercase()).cloned()
    }

    /// Sets a single attribute. See [`Instance::set_many`].
    pub fn set(&self, attribute: &str, value: impl Into<Value>) -> Result<()> {
        self.set_many([(attribute, value.into())])
    }

    /// Writes attributes and re-reads the row.
    ///
    /// Missing columns are provisioned first, then one update carries the
    /// full snapshot, then the snapshot is refreshed from storage so
    /// changes made by other writers become visible. An empty list is a
    /// pure refresh. An invalid name fails before any mutation.
    pub fn set_many<I, K, V>(&self, attributes: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let attributes = collect_attributes(attributes)?;
        self.apply(attributes)
    }

    fn apply(&self, attributes: Vec<(String, Value)>) -> Result<()> {
        let inner = &self.0;
        let table = inner.class.table();
        let span = info_span!("instance.set", table = %table, id = %inner.id);
        let _enter = span.enter();

        let mut snapshot = inner.snapshot.lock()?;
        if !attributes.is_empty() {
            let mut next = snapshot.clone();
            for (column, value) in attributes {
                inner.store.evolver.ensure_column(table, &column, &next)?;
                next.insert(column, value);
            }
            inner.store.engine.update(table, &inner.id, &next)?;
            event!(Level::DEBUG, columns = next.len(), "row updated");
        }

        *snapshot = self.read_row()?;
        Ok(())
    }

    /// Re-reads the row, replacing the snapshot.
    pub fn refresh(&self) -> Result<()> {
        let mut snapshot = self.0.snapshot.lock()?;
        *snapshot = self.read_row()?;
        Ok(())
    }

    fn read_row(&self) -> Result<Attributes> {
        self.0
            .store
            .engine
            .fetch(self.0.class.table(), &self.0.id)?
            .ok_or_else(|| not_found(&self.0.class, &self.0.id))
    }

    /// Copy of the attribute snapshot
    pub fn attributes(&self) -> Result<Attributes> {
        Ok(self.0.snapshot.lock()?.clone())
    }

    /// JSON object holding the identifier and every attribute.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let mut object = serde_json::Map::new();
        object.insert(ID_COLUMN.to_string(), serde_json::Value::String(self.0.id.clone()));
        for (name, value) in self.attributes()? {
            object.insert(name, serde_json::to_value(value)?);
        }
        Ok(serde_json::Value::Object(object))
    }

    /// True when both handles refer to the same in-memory object.
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Number of live handles to this object
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Instance");
        debug.field("class", &self.0.class.name()).field("id", &self.0.id);
        match self.0.snapshot.try_lock() {
            Ok(snapshot) => debug.field("attributes", &*snapshot),
            Err(_) => debug.field("attributes", &"<locked>"),
        };
        debug.finish()
    }
}

fn not_found(class: &ClassDescriptor, id: &str) -> StoreError {
    StoreError::NotFound(format!("{} '{}'", class.name(), id))
}
