// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Thread-safe wrapper around the byte-bounded LRU.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use peercache_lru::LruCache;

use crate::ByteView;
#[cfg(any(feature = "metrics", test))]
use crate::stats::GroupEvent;
#[cfg(any(feature = "metrics", test))]
use crate::telemetry::GroupMetrics;

/// A point-in-time snapshot of a group's local cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Bytes accounted to cached keys and values.
    pub bytes: usize,
    /// Number of cached entries.
    pub items: usize,
    /// Number of lookups.
    pub gets: u64,
    /// Number of lookups that found an entry.
    pub hits: u64,
    /// Number of entries evicted to stay within the byte budget.
    pub evictions: u64,
}

#[derive(Debug, Default)]
struct Inner {
    // Allocated on first insert so that groups which never cache anything stay empty.
    lru: Option<LruCache<ByteView>>,
    gets: u64,
    hits: u64,
}

/// An [`LruCache`] guarded by a single mutex.
///
/// The lock is held for the duration of one `get` or `add` and never across an
/// `.await`.
#[derive(Debug)]
pub(crate) struct BoundedCache {
    max_bytes: usize,
    inner: Mutex<Inner>,
    evictions: Arc<AtomicU64>,
    #[cfg(any(feature = "metrics", test))]
    metrics: Option<GroupMetrics>,
}

impl BoundedCache {
    pub(crate) fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            inner: Mutex::new(Inner::default()),
            evictions: Arc::default(),
            #[cfg(any(feature = "metrics", test))]
            metrics: None,
        }
    }

    #[cfg(any(feature = "metrics", test))]
    pub(crate) fn with_metrics(max_bytes: usize, metrics: Option<GroupMetrics>) -> Self {
        Self {
            metrics,
            ..Self::new(max_bytes)
        }
    }

    pub(crate) fn get(&self, key: &str) -> Option<ByteView> {
        let mut inner = self.inner.lock();
        inner.gets += 1;
        let value = inner.lru.as_mut()?.get(key).cloned();
        if value.is_some() {
            inner.hits += 1;
        }
        value
    }

    pub(crate) fn add(&self, key: &str, value: ByteView) {
        let mut inner = self.inner.lock();
        let lru = inner.lru.get_or_insert_with(|| {
            let evictions = Arc::clone(&self.evictions);
            #[cfg(any(feature = "metrics", test))]
            let metrics = self.metrics.clone();
            LruCache::new(self.max_bytes).with_on_evicted(move |_, _| {
                evictions.fetch_add(1, Ordering::Relaxed);
                #[cfg(any(feature = "metrics", test))]
                if let Some(metrics) = &metrics {
                    metrics.record(GroupEvent::Eviction);
                }
            })
        });
        lru.add(key, value);
    }

    pub(crate) fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let (bytes, items) = inner.lru.as_ref().map_or((0, 0), |lru| (lru.bytes(), lru.len()));
        CacheStats {
            bytes,
            items,
            gets: inner.gets,
            hits: inner.hits,
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
