// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A least-recently-used cache bounded by bytes.
//!
//! [`LruCache`] charges every entry `key.len() + value.weight()` bytes against a
//! fixed budget. Whenever an [`add`](LruCache::add) pushes the running total over
//! the budget, entries are evicted from the least-recently-used end until the
//! cache fits again. A budget of zero means the cache never evicts.
//!
//! Recency is the only eviction criterion: both [`add`](LruCache::add) and a
//! successful [`get`](LruCache::get) move the entry to the most-recently-used
//! position.
//!
//! The cache is a plain data structure and is not synchronized. Callers that
//! share it between threads wrap it in a mutex.
//!
//! # Example
//!
//! ```
//! use peercache_lru::LruCache;
//!
//! let mut cache = LruCache::<String>::new(10);
//! cache.add("k1", "aaaa".to_string()); // 6 bytes
//! cache.add("k2", "bb".to_string()); // 4 bytes
//!
//! // Touching k1 makes k2 the eviction candidate.
//! assert!(cache.get("k1").is_some());
//! cache.add("k3", "c".to_string()); // 3 bytes, evicts k2
//!
//! assert!(cache.get("k2").is_none());
//! assert_eq!(cache.len(), 2);
//! assert_eq!(cache.bytes(), 9);
//! ```

mod weight;

use std::collections::HashMap;
use std::fmt::{self, Debug};

#[doc(inline)]
pub use weight::Weight;

/// Callback invoked with every entry the cache evicts.
pub type OnEvicted<V> = Box<dyn FnMut(String, V) + Send>;

#[derive(Debug)]
struct Node<V> {
    key: String,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// A byte-bounded least-recently-used cache.
///
/// Nodes live in a contiguous vector and are linked by index, most recently
/// used first. Removing a node swaps the last node into its slot so the vector
/// never has holes.
pub struct LruCache<V> {
    max_bytes: usize,
    used_bytes: usize,
    index: HashMap<String, usize>,
    nodes: Vec<Node<V>>,
    head: Option<usize>,
    tail: Option<usize>,
    on_evicted: Option<OnEvicted<V>>,
}

impl<V: Weight> LruCache<V> {
    /// Creates a cache that holds at most `max_bytes` bytes.
    ///
    /// A budget of zero creates an unbounded cache.
    #[must_use]
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            used_bytes: 0,
            index: HashMap::new(),
            nodes: Vec::new(),
            head: None,
            tail: None,
            on_evicted: None,
        }
    }

    /// Registers a callback that receives every evicted entry.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::{Arc, Mutex};
    ///
    /// use peercache_lru::LruCache;
    ///
    /// let evicted = Arc::new(Mutex::new(Vec::new()));
    /// let sink = Arc::clone(&evicted);
    /// let mut cache = LruCache::<Vec<u8>>::new(4).with_on_evicted(move |key, _value| {
    ///     sink.lock().unwrap().push(key);
    /// });
    ///
    /// cache.add("a", vec![1]);
    /// cache.add("b", vec![2]);
    /// cache.add("c", vec![3]);
    ///
    /// assert_eq!(*evicted.lock().unwrap(), vec!["a".to_string()]);
    /// ```
    #[must_use]
    pub fn with_on_evicted(mut self, on_evicted: impl FnMut(String, V) + Send + 'static) -> Self {
        self.on_evicted = Some(Box::new(on_evicted));
        self
    }

    /// Inserts or replaces the value stored under `key` and marks it most recently used.
    ///
    /// Replacing a value only changes the accounted size by the difference between the
    /// new and the old value weight. Afterwards, least-recently-used entries are evicted
    /// until the cache is back within its budget.
    pub fn add(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();

        if let Some(&idx) = self.index.get(&key) {
            self.unlink(idx);
            self.push_front(idx);
            let new_weight = value.weight();
            let old = std::mem::replace(&mut self.nodes[idx].value, value);
            self.used_bytes = self.used_bytes + new_weight - old.weight();
        } else {
            self.used_bytes += key.len() + value.weight();
            let idx = self.nodes.len();
            self.nodes.push(Node {
                key: key.clone(),
                value,
                prev: None,
                next: None,
            });
            self.push_front(idx);
            self.index.insert(key, idx);
        }

        while self.max_bytes != 0 && self.used_bytes > self.max_bytes {
            if !self.remove_oldest() {
                break;
            }
        }
    }

    /// Looks up `key` and, on a hit, marks the entry most recently used.
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let idx = *self.index.get(key)?;
        self.unlink(idx);
        self.push_front(idx);
        Some(&self.nodes[idx].value)
    }

    /// Evicts the least recently used entry.
    ///
    /// Returns `false` when the cache is empty.
    pub fn remove_oldest(&mut self) -> bool {
        let Some(idx) = self.tail else {
            return false;
        };

        let node = self.remove_node(idx);
        self.index.remove(&node.key);
        self.used_bytes -= node.key.len() + node.value.weight();

        if let Some(on_evicted) = self.on_evicted.as_mut() {
            on_evicted(node.key, node.value);
        }
        true
    }
}

impl<V> LruCache<V> {
    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the number of bytes currently accounted to entries.
    #[must_use]
    pub fn bytes(&self) -> usize {
        self.used_bytes
    }

    /// Returns the byte budget. Zero means unbounded.
    #[must_use]
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Iterates over keys from most to least recently used.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        std::iter::successors(self.head, |&idx| self.nodes[idx].next).map(|idx| self.nodes[idx].key.as_str())
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
        self.nodes[idx].prev = None;
        self.nodes[idx].next = None;
    }

    fn push_front(&mut self, idx: usize) {
        self.nodes[idx].next = self.head;
        match self.head {
            Some(h) => self.nodes[h].prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
    }

    fn remove_node(&mut self, idx: usize) -> Node<V> {
        self.unlink(idx);
        let node = self.nodes.swap_remove(idx);

        // The former last node now lives at `idx`; repoint everything that referenced it.
        if idx < self.nodes.len() {
            let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
            match prev {
                Some(p) => self.nodes[p].next = Some(idx),
                None => self.head = Some(idx),
            }
            match next {
                Some(n) => self.nodes[n].prev = Some(idx),
                None => self.tail = Some(idx),
            }
            if let Some(slot) = self.index.get_mut(&self.nodes[idx].key) {
                *slot = idx;
            }
        }

        node
    }
}

impl<V> Debug for LruCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("max_bytes", &self.max_bytes)
            .field("used_bytes", &self.used_bytes)
            .field("len", &self.nodes.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(cache: &LruCache<String>) -> Vec<&str> {
        cache.keys().collect()
    }

    #[test]
    fn get_hit_and_miss() {
        let mut cache = LruCache::<String>::new(0);
        cache.add("myKey", "1234".to_string());

        assert_eq!(cache.get("myKey").map(String::as_str), Some("1234"));
        assert!(cache.get("nonsense").is_none());
    }

    #[test]
    fn get_does_not_change_accounting() {
        let mut cache = LruCache::<String>::new(0);
        cache.add("key", "value".to_string());
        let before = cache.bytes();

        assert!(cache.get("key").is_some());
        assert_eq!(cache.bytes(), before);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn overwrite_applies_value_delta_only() {
        let mut cache = LruCache::<String>::new(0);
        cache.add("key", "12345".to_string());
        assert_eq!(cache.bytes(), 8);

        cache.add("key", "12".to_string());
        assert_eq!(cache.bytes(), 5);
        assert_eq!(cache.len(), 1);

        cache.add("key", "1234567890".to_string());
        assert_eq!(cache.bytes(), 13);
    }

    #[test]
    fn overwrite_promotes_entry() {
        let mut cache = LruCache::<String>::new(0);
        cache.add("a", "1".to_string());
        cache.add("b", "2".to_string());
        cache.add("a", "3".to_string());

        assert_eq!(keys(&cache), vec!["a", "b"]);
    }

    #[test]
    fn evicts_least_recently_used() {
        let (k1, k2, k3) = ("key1", "key2", "k3");
        let (v1, v2, v3) = ("value1", "value2", "v3");
        let budget = k1.len() + k2.len() + v1.len() + v2.len();
        let mut cache = LruCache::<String>::new(budget);

        cache.add(k1, v1.to_string());
        cache.add(k2, v2.to_string());
        cache.add(k3, v3.to_string());

        assert!(cache.get(k1).is_none());
        assert_eq!(cache.len(), 2);
        assert!(cache.bytes() <= budget);
    }

    #[test]
    fn get_protects_entry_from_eviction() {
        let mut cache = LruCache::<Vec<u8>>::new(2048);
        cache.add("A", vec![0; 1000]);
        cache.add("B", vec![0; 1000]);
        cache.add("C", vec![0; 1000]);

        assert!(cache.get("A").is_none());

        assert!(cache.get("B").is_some());
        cache.add("D", vec![0; 1000]);

        assert!(cache.get("B").is_some());
        assert!(cache.get("C").is_none());
        assert!(cache.get("D").is_some());
    }

    #[test]
    fn oversized_entry_evicts_everything() {
        let mut cache = LruCache::<Vec<u8>>::new(10);
        cache.add("a", vec![0; 2]);
        cache.add("huge", vec![0; 20]);

        assert!(cache.is_empty());
        assert_eq!(cache.bytes(), 0);
    }

    #[test]
    fn zero_budget_never_evicts() {
        let mut cache = LruCache::<Vec<u8>>::new(0);
        for i in 0..1000 {
            cache.add(format!("key{i}"), vec![0; 64]);
        }
        assert_eq!(cache.len(), 1000);
    }

    #[test]
    fn remove_oldest_on_empty_cache() {
        let mut cache = LruCache::<String>::new(0);
        assert!(!cache.remove_oldest());
    }

    #[test]
    fn on_evicted_receives_entries_in_lru_order() {
        let evicted = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = std::sync::Arc::clone(&evicted);
        let mut cache = LruCache::<String>::new(10).with_on_evicted(move |key, value| {
            sink.lock().expect("poisoned").push((key, value));
        });

        cache.add("key1", "123456".to_string());
        cache.add("k2", "k2".to_string());
        cache.add("k3", "k3".to_string());
        cache.add("k4", "k4".to_string());

        let evicted = evicted.lock().expect("poisoned");
        assert_eq!(
            *evicted,
            vec![("key1".to_string(), "123456".to_string()), ("k2".to_string(), "k2".to_string())]
        );
    }

    #[test]
    fn swap_remove_keeps_links_consistent() {
        let mut cache = LruCache::<String>::new(0);
        for key in ["a", "b", "c", "d"] {
            cache.add(key, String::new());
        }
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());

        // Order is now c, a, d, b; evicting b moves the last slot into its place.
        assert!(cache.remove_oldest());
        assert_eq!(keys(&cache), vec!["c", "a", "d"]);
        assert!(cache.remove_oldest());
        assert_eq!(keys(&cache), vec!["c", "a"]);
        assert!(cache.get("a").is_some());
        assert_eq!(keys(&cache), vec!["a", "c"]);
    }
}
