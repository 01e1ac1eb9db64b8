//! Bounded concurrent cache
//!
//! A size-capped cache for values that are cheap to recompute, such as a
//! principal's resolved synchronization root set. When the capacity is
//! exceeded the oldest inserted entry is evicted; eviction only forces
//! recomputation, never a wrong answer.

use std::collections::VecDeque;
use std::hash::Hash;
use std::sync::Mutex;

use dashmap::DashMap;

/// A concurrent map capped at a fixed number of entries.
#[derive(Debug)]
pub struct BoundedCache<K: Eq + Hash + Clone, V: Clone> {
    map: DashMap<K, V>,
    order: Mutex<VecDeque<K>>,
    capacity: usize,
}

impl<K: Eq + Hash + Clone, V: Clone> BoundedCache<K, V> {
    /// Creates a cache holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            map: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Returns a clone of the cached value, if present
    pub fn get(&self, key: &K) -> Option<V> {
        self.map.get(key).map(|entry| entry.value().clone())
    }

    /// Inserts a value, evicting the oldest entry when over capacity
    pub fn insert(&self, key: K, value: V) {
        let mut order = self.order.lock().expect("cache order lock poisoned");
        if self.map.insert(key.clone(), value).is_none() {
            order.push_back(key);
        }
        while self.map.len() > self.capacity {
            match order.pop_front() {
                Some(oldest) => {
                    self.map.remove(&oldest);
                }
                None => break,
            }
        }
    }

    /// Drops a single entry
    pub fn invalidate(&self, key: &K) {
        self.map.remove(key);
        let mut order = self.order.lock().expect("cache order lock poisoned");
        order.retain(|k| k != key);
    }

    /// Drops all entries
    pub fn clear(&self) {
        self.map.clear();
        self.order
            .lock()
            .expect("cache order lock poisoned")
            .clear();
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True when no entries are cached
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
