//! Conjunctive equality search over a class table.

use crate::core::{Result, Value};
use crate::facade::StoreInner;
use crate::instance::Instance;
use crate::registry::ClassDescriptor;
use std::fmt;
use std::sync::Arc;
use tracing::{Level, event, info_span};

/// A reusable search over one class.
///
/// Nothing runs until [`Search::iter`] is called; each call re-runs the
/// scan, so a `Search` can be iterated any number of times and always
/// reflects the current contents of the table.
pub struct Search {
    store: Arc<StoreInner>,
    class: ClassDescriptor,
    criteria: Vec<(String, Value)>,
}

impl Search {
    pub(crate) fn new(
        store: Arc<StoreInner>,
        class: ClassDescriptor,
        criteria: Vec<(String, Value)>,
    ) -> Self {
        Self {
            store,
            class,
            criteria,
        }
    }

    pub fn class(&self) -> &ClassDescriptor {
        &self.class
    }

    /// Case-folded `(attribute, value)` pairs, all of which must match
    pub fn criteria(&self) -> &[(String, Value)] {
        &self.criteria
    }

    /// Identifiers of matching rows, in scan order.
    ///
    /// A criterion naming a column that was never provisioned on this
    /// table cannot match anything, so the result is empty rather than an
    /// error. `Value::Null` matches rows where the column holds null.
    pub fn ids(&self) -> Result<Vec<String>> {
        let table = self.class.table();
        let span = info_span!("query.search", table = %table);
        let _enter = span.enter();

        if !self.criteria.is_empty() {
            let columns = self.store.evolver.columns(table)?;
            let unknown = self
                .criteria
                .iter()
                .find(|(name, _)| !columns.iter().any(|c| c.eq_ignore_ascii_case(name)));
            if let Some((name, _)) = unknown {
                event!(Level::DEBUG, table = %table, column = %name, "search on unprovisioned column");
                return Ok(Vec::new());
            }
        }

        let ids = self.store.engine.select_ids(table, &self.criteria)?;
        event!(Level::DEBUG, table = %table, criteria = %self, matches = ids.len(), "search executed");
        Ok(ids)
    }

    /// Runs the scan and returns an iterator that materializes matches
    /// one by one through the identity cache.
    pub fn iter(&self) -> Result<SearchIter> {
        Ok(SearchIter {
            store: Arc::clone(&self.store),
            class: self.class.clone(),
            ids: self.ids()?.into_iter(),
        })
    }

    /// Number of matching rows
    pub fn count(&self) -> Result<usize> {
        Ok(self.ids()?.len())
    }

    /// First match in scan order, if any
    pub fn first(&self) -> Result<Option<Instance>> {
        self.iter()?.next().transpose()
    }

    /// Every match, materialized
    pub fn collect(&self) -> Result<Vec<Instance>> {
        self.iter()?.collect()
    }
}

impl fmt::Display for Search {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.criteria.is_empty() {
            return write!(f, "*");
        }
        let parts: Vec<String> = self
            .criteria
            .iter()
            .map(|(name, value)| format!("{} = {}", name, value))
            .collect();
        write!(f, "{}", parts.join(" AND "))
    }
}

/// Lazily materializing iterator over search matches.
///
/// A row removed after the scan surfaces as a `NotFound` item.
pub struct SearchIter {
    store: Arc<StoreInner>,
    class: ClassDescriptor,
    ids: std::vec::IntoIter<String>,
}

impl Iterator for SearchIter {
    type Item = Result<Instance>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.ids.next()?;
        Some(Instance::load(&self.store, &self.class, &id))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ids.size_hint()
    }
}

impl ExactSizeIterator for SearchIter {}

#[cfg(test)]
mod tests {
    use crate::core::{StoreError, Value};
    use crate::facade::Store;
    use crate::storage::MemoryEngine;
    use std::sync::Arc;

    fn store() -> Store {
        Store::with_engine(Arc::new(MemoryEngine::new())).unwrap()
    }

    #[test]
    fn test_search_matches_exactly() {
        let store = store();
        let items = store.class("Item").unwrap();
        let red = items.create([("color", "red")]).unwrap();
        let _blue = items.create([("color", "blue")]).unwrap();

        let found = items.search([("color", "red")]).unwrap().collect().unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].ptr_eq(&red));
    }

    #[test]
    fn test_empty_criteria_is_full_scan() {
        let store = store();
        let items = store.class("Item").unwrap();
        for size in 0..3 {
            items.create([("size", size)]).unwrap();
        }
        let all = items.search(Vec::<(String, Value)>::new()).unwrap();
        assert_eq!(all.count().unwrap(), 3);
        assert_eq!(all.to_string(), "*");
    }

    #[test]
    fn test_unprovisioned_column_yields_nothing() {
        let store = store();
        let items = store.class("Item").unwrap();
        items.create([("color", "red")]).unwrap();

        let search = items.search([("weight", 3)]).unwrap();
        assert_eq!(search.count().unwrap(), 0);
        assert!(search.first().unwrap().is_none());
    }

    #[test]
    fn test_search_is_restartable_and_live() {
        let store = store();
        let items = store.class("Item").unwrap();
        let first = items.create([("color", "red")]).unwrap();

        let search = items.search([("color", "red")]).unwrap();
        assert_eq!(search.iter().unwrap().count(), 1);

        let _second = items.create([("color", "red")]).unwrap();
        first.set("color", "green").unwrap();
        let ids: Vec<String> = search
            .iter()
            .unwrap()
            .map(|i| i.unwrap().id().to_string())
            .collect();
        assert_eq!(ids.len(), 1);
        assert_ne!(ids[0], first.id());
    }

    #[test]
    fn test_invalid_criteria_rejected() {
        let store = store();
        let items = store.class("Item").unwrap();
        assert!(matches!(
            items.search([("bad name!", 1)]),
            Err(StoreError::InvalidName(_))
        ));
    }

    #[test]
    fn test_display_lists_criteria() {
        let store = store();
        let items = store.class("Item").unwrap();
        let search = items
            .search([("Color", Value::from("red")), ("size", Value::from(2))])
            .unwrap();
        assert_eq!(search.to_string(), "color = red AND size = 2");
    }
}
