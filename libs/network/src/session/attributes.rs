//! Open per-session storage for collaborator data (identity, subscriptions)

use dashmap::DashMap;
use std::any::Any;
use std::sync::Arc;

type Value = Arc<dyn Any + Send + Sync>;

/// Concurrent string-keyed map with typed accessors
///
/// Values are dropped when removed or when the session closes, so a value
/// with a `Drop` impl acts as a release hook that runs exactly once.
#[derive(Default)]
pub struct Attributes {
    map: DashMap<String, Value>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value under `key` if present and of type `T`
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let value = self.map.get(key)?.value().clone();
        value.downcast::<T>().ok()
    }

    /// Store `value`, returning whether a previous value was replaced
    pub fn insert<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) -> bool {
        self.insert_arc(key, Arc::new(value))
    }

    pub fn insert_arc<T: Any + Send + Sync>(&self, key: impl Into<String>, value: Arc<T>) -> bool {
        // previous value is dropped outside the shard lock
        let previous = self.map.insert(key.into(), value);
        previous.is_some()
    }

    pub fn remove(&self, key: &str) -> bool {
        let removed = self.map.remove(key);
        removed.is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Remove every entry and drop the values after all locks are released
    pub(crate) fn release_all(&self) -> usize {
        let keys: Vec<String> = self.map.iter().map(|entry| entry.key().clone()).collect();
        let removed: Vec<Value> = keys
            .iter()
            .filter_map(|key| self.map.remove(key).map(|(_, value)| value))
            .collect();
        let count = removed.len();
        drop(removed);
        count
    }
}
