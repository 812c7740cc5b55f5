//! In-memory cache store — a type-erased, thread-safe key/value map.
//!
//! [`CacheStore`] knows nothing about what it holds: values of any
//! `Send + Sync + 'static` type are stored behind an [`Arc`] and recovered by
//! downcasting at the call site. Absence is always reported as `None`, never
//! as a default value, so a cached empty page is distinguishable from a miss.
//!
//! The store lives as long as its owner. It is constructed explicitly and
//! shared by handing out `Arc<CacheStore>` clones; there is no global instance.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

type Value = Arc<dyn Any + Send + Sync>;

/// Thread-safe map from string keys to opaque values.
///
/// # Examples
///
/// ```
/// use qcache::cache::CacheStore;
///
/// let store = CacheStore::new();
/// store.set("greeting", String::from("hello"));
///
/// assert_eq!(store.get::<String>("greeting").as_deref().map(String::as_str), Some("hello"));
/// store.invalidate("greeting");
/// assert!(store.get::<String>("greeting").is_none());
/// ```
#[derive(Default)]
pub struct CacheStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl CacheStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the value stored under `key`, or `None` if there is none.
    ///
    /// A value stored under a different type than `T` is treated as absent.
    pub fn get<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let value = self.entries.read().get(key).cloned()?;
        value.downcast::<T>().ok()
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn set<T>(&self, key: impl Into<String>, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.set_shared(key, Arc::new(value));
    }

    /// Store an already shared value under `key` without re-allocating it.
    pub fn set_shared<T>(&self, key: impl Into<String>, value: Arc<T>)
    where
        T: Send + Sync + 'static,
    {
        self.entries.write().insert(key.into(), value);
    }

    /// Remove the entry for `key`. Missing keys are ignored.
    pub fn invalidate(&self, key: &str) {
        self.entries.write().remove(key);
    }

    /// Remove every entry whose key starts with `prefix`, returning how many went.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        before - entries.len()
    }

    /// Returns `true` if an entry of any type exists under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_missing_key_is_none() {
        let store = CacheStore::new();
        assert!(store.get::<String>("nope").is_none());
    }

    #[test]
    fn empty_value_is_not_a_miss() {
        let store = CacheStore::new();
        store.set("page", Vec::<u32>::new());
        let page = store.get::<Vec<u32>>("page").unwrap();
        assert!(page.is_empty());
    }

    #[test]
    fn set_overwrites() {
        let store = CacheStore::new();
        store.set("k", 1u32);
        store.set("k", 2u32);
        assert_eq!(*store.get::<u32>("k").unwrap(), 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn set_invalidate_get_is_absent() {
        let store = CacheStore::new();
        store.set("k", vec!["a", "b"]);
        store.invalidate("k");
        assert!(store.get::<Vec<&str>>("k").is_none());
    }

    #[test]
    fn invalidate_missing_is_noop() {
        let store = CacheStore::new();
        store.invalidate("ghost");
        assert!(store.is_empty());
    }

    #[test]
    fn wrong_type_reads_as_absent() {
        let store = CacheStore::new();
        store.set("k", 7u64);
        assert!(store.get::<String>("k").is_none());
        assert!(store.contains("k"));
    }

    #[test]
    fn invalidate_prefix_only_touches_namespace() {
        let store = CacheStore::new();
        store.set("GetEmployees:{a}", 1u8);
        store.set("GetEmployees:{b}", 2u8);
        store.set("EmployeeServiceCodeLogicHash", String::from("abc"));

        assert_eq!(store.invalidate_prefix("GetEmployees:"), 2);
        assert_eq!(store.len(), 1);
        assert!(store.contains("EmployeeServiceCodeLogicHash"));
    }

    #[test]
    fn concurrent_access_keeps_store_consistent() {
        let store = Arc::new(CacheStore::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let key = format!("k{}", i % 16);
                        store.set(key.clone(), t * 1000 + i);
                        let _ = store.get::<i32>(&key);
                        if i % 7 == 0 {
                            store.invalidate(&key);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(store.len() <= 16);
        for i in 0..16 {
            if let Some(v) = store.get::<i32>(&format!("k{i}")) {
                assert_eq!(*v % 1000 % 16, i);
            }
        }
    }
}
