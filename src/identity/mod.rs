//! Identity map: at most one live in-memory object per `(table, id)`.
//!
//! Entries are `Weak` handles, so the cache never keeps an object alive.
//! Losing an entry early only costs a reload.

use crate::core::Result;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

type CacheKey = (String, String);

/// Counters exposed for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub live_entries: usize,
}

pub struct IdentityCache<T> {
    entries: Mutex<HashMap<CacheKey, Weak<T>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<T> IdentityCache<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Returns the live object for `(table, id)` or materializes one with
    /// `loader`.
    ///
    /// The loader runs without the cache lock held. If another thread
    /// registered a live object meanwhile, that object is returned and the
    /// freshly loaded one is discarded.
    pub fn get_or_create<F>(&self, table: &str, id: &str, loader: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<Arc<T>>,
    {
        let key = (table.to_string(), id.to_string());

        {
            let entries = self.entries.lock()?;
            if let Some(live) = entries.get(&key).and_then(Weak::upgrade) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(live);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let fresh = loader()?;

        let mut entries = self.entries.lock()?;
        if let Some(existing) = entries.get(&key).and_then(Weak::upgrade) {
            // dropping `fresh` may re-enter the cache through Drop
            drop(entries);
            drop(fresh);
            return Ok(existing);
        }
        entries.insert(key, Arc::downgrade(&fresh));
        Ok(fresh)
    }

    /// Live object for `(table, id)`, if any; never loads.
    pub fn lookup(&self, table: &str, id: &str) -> Option<Arc<T>> {
        let entries = self.entries.lock().ok()?;
        entries
            .get(&(table.to_string(), id.to_string()))
            .and_then(Weak::upgrade)
    }

    /// Drops the entry for `(table, id)` if its object is gone.
    ///
    /// Called when the last handle of an object is released. An entry
    /// already replaced by a newer live object is left alone.
    pub fn evict_dead(&self, table: &str, id: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            let key = (table.to_string(), id.to_string());
            if entries.get(&key).is_some_and(|w| w.strong_count() == 0) {
                entries.remove(&key);
            }
        }
    }

    /// Sweeps all dead entries, returning how many were removed.
    pub fn purge(&self) -> usize {
        match self.entries.lock() {
            Ok(mut entries) => {
                let before = entries.len();
                entries.retain(|_, w| w.strong_count() > 0);
                before - entries.len()
            }
            Err(_) => 0,
        }
    }

    /// Number of entries whose object is still alive
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .map(|entries| entries.values().filter(|w| w.strong_count() > 0).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            live_entries: self.len(),
        }
    }
}

impl<T> Default for IdentityCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StoreError;
    use std::cell::Cell;

    #[test]
    fn test_live_entry_is_shared() {
        let cache = IdentityCache::new();
        let first = cache.get_or_create("t", "1", || Ok(Arc::new(10))).unwrap();
        let second = cache
            .get_or_create("t", "1", || panic!("loader must not run for a live entry"))
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_cache_does_not_extend_lifetime() {
        let cache = IdentityCache::new();
        let value = cache.get_or_create("t", "1", || Ok(Arc::new(10))).unwrap();
        assert_eq!(cache.len(), 1);

        drop(value);
        assert!(cache.lookup("t", "1").is_none());
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.purge(), 1);
    }

    #[test]
    fn test_dead_entry_reloads() {
        let cache = IdentityCache::new();
        let loads = Cell::new(0);
        let load = || {
            loads.set(loads.get() + 1);
            Ok(Arc::new(String::from("row")))
        };

        drop(cache.get_or_create("t", "1", load).unwrap());
        let again = cache.get_or_create("t", "1", load).unwrap();
        assert_eq!(*again, "row");
        assert_eq!(loads.get(), 2);
    }

    #[test]
    fn test_keys_are_scoped_by_table() {
        let cache = IdentityCache::new();
        let a = cache.get_or_create("a", "1", || Ok(Arc::new(1))).unwrap();
        let b = cache.get_or_create("b", "1", || Ok(Arc::new(2))).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_loader_error_leaves_no_entry() {
        let cache: IdentityCache<i32> = IdentityCache::new();
        let err = cache
            .get_or_create("t", "x", || Err(StoreError::NotFound("t 'x'".into())))
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(cache.purge(), 0);
    }

    #[test]
    fn test_evict_dead_keeps_replacement() {
        let cache = IdentityCache::new();
        drop(cache.get_or_create("t", "1", || Ok(Arc::new(1))).unwrap());
        let replacement = cache.get_or_create("t", "1", || Ok(Arc::new(2))).unwrap();

        cache.evict_dead("t", "1");
        assert!(Arc::ptr_eq(&cache.lookup("t", "1").unwrap(), &replacement));
    }
}
