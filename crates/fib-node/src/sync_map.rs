//! Keyed index that only grows through explicit inserts.
//!
//! The FIB finds shared objects again by key: a prefix names its entry, a
//! path set its path-list, a neighbour its adjacency. Looking up a key that
//! is not there must not leave anything behind, or an object nobody created
//! would show up in the tables and never be freed.

use std::collections::HashMap;
use std::hash::Hash;

/// A map whose lookups never insert.
///
/// ```
/// use fib_node::SyncMap;
///
/// let mut table: SyncMap<&str, u32> = SyncMap::new();
/// assert!(table.get(&"10.0.0.0/8").is_none());
/// assert!(table.is_empty());
///
/// table.insert("10.0.0.0/8", 7);
/// assert_eq!(table.get(&"10.0.0.0/8"), Some(&7));
/// ```
#[derive(Debug, Clone)]
pub struct SyncMap<K, V> {
    inner: HashMap<K, V>,
}

impl<K: Eq + Hash, V> SyncMap<K, V> {
    pub fn new() -> Self {
        Self {
            inner: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.inner.get_mut(key)
    }

    /// Returns the value previously stored under `key`.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.inner.insert(key, value)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.inner.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.inner.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.inner.values()
    }

    pub fn retain<F>(&mut self, f: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        self.inner.retain(f);
    }
}

impl<K: Eq + Hash, V> Default for SyncMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lookup_never_creates() {
        let mut map: SyncMap<u32, u32> = SyncMap::new();
        assert!(map.get(&1).is_none());
        assert!(map.get_mut(&1).is_none());
        assert!(!map.contains_key(&1));
        assert!(map.is_empty());

        assert_eq!(map.insert(1, 10), None);
        assert_eq!(map.insert(1, 11), Some(10));
        assert_eq!(map.len(), 1);
        assert_eq!(map.remove(&1), Some(11));
        assert!(map.is_empty());
    }

    #[test]
    fn test_retain_by_key() {
        let mut map: SyncMap<(u8, u32), u32> = SyncMap::new();
        for itf in 0..4 {
            map.insert((4, itf), itf * 10);
            map.insert((6, itf), itf * 10);
        }
        map.retain(|(_, itf), _| *itf != 2);

        assert_eq!(map.len(), 6);
        assert!(!map.contains_key(&(4, 2)));
        assert!(!map.contains_key(&(6, 2)));
        let mut values: Vec<u32> = map.values().copied().collect();
        values.sort();
        assert_eq!(values, vec![0, 0, 10, 10, 30, 30]);
    }
}
