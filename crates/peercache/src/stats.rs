// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(any(feature = "metrics", test))]
use crate::telemetry::GroupMetrics;

/// Counters describing the traffic a group has handled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GroupStats {
    /// Calls to [`Group::get`](crate::Group::get), including invalid ones.
    pub gets: u64,
    /// Reads answered by the local cache.
    pub cache_hits: u64,
    /// Values fetched from a remote peer.
    pub peer_loads: u64,
    /// Failed peer fetches that fell back to the loader.
    pub peer_errors: u64,
    /// Cache misses, before deduplication.
    pub loads: u64,
    /// Cache misses that actually ran, after deduplication.
    pub loads_deduped: u64,
    /// Successful loader calls.
    pub local_loads: u64,
    /// Failed loader calls.
    pub local_load_errs: u64,
    /// Requests that arrived from other peers.
    pub server_requests: u64,
}

/// Something that happened to a group, counted in [`GroupStats`] and, with the
/// `metrics` feature, reported as an OpenTelemetry counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum GroupEvent {
    Get,
    CacheHit,
    PeerLoad,
    PeerError,
    Load,
    LoadDeduped,
    LocalLoad,
    LocalLoadErr,
    ServerRequest,
    #[cfg_attr(not(any(feature = "metrics", test)), expect(dead_code, reason = "only reported as a metric"))]
    Eviction,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    gets: AtomicU64,
    cache_hits: AtomicU64,
    peer_loads: AtomicU64,
    peer_errors: AtomicU64,
    loads: AtomicU64,
    loads_deduped: AtomicU64,
    local_loads: AtomicU64,
    local_load_errs: AtomicU64,
    server_requests: AtomicU64,
    #[cfg(any(feature = "metrics", test))]
    metrics: Option<GroupMetrics>,
}

impl Counters {
    #[cfg(any(feature = "metrics", test))]
    pub(crate) fn with_metrics(metrics: Option<GroupMetrics>) -> Self {
        Self {
            metrics,
            ..Self::default()
        }
    }

    pub(crate) fn record(&self, event: GroupEvent) {
        if let Some(counter) = self.counter(event) {
            counter.fetch_add(1, Ordering::Relaxed);
        }

        #[cfg(any(feature = "metrics", test))]
        if let Some(metrics) = &self.metrics {
            metrics.record(event);
        }
    }

    fn counter(&self, event: GroupEvent) -> Option<&AtomicU64> {
        match event {
            GroupEvent::Get => Some(&self.gets),
            GroupEvent::CacheHit => Some(&self.cache_hits),
            GroupEvent::PeerLoad => Some(&self.peer_loads),
            GroupEvent::PeerError => Some(&self.peer_errors),
            GroupEvent::Load => Some(&self.loads),
            GroupEvent::LoadDeduped => Some(&self.loads_deduped),
            GroupEvent::LocalLoad => Some(&self.local_loads),
            GroupEvent::LocalLoadErr => Some(&self.local_load_errs),
            GroupEvent::ServerRequest => Some(&self.server_requests),
            // Counted by the cache, see `CacheStats::evictions`.
            GroupEvent::Eviction => None,
        }
    }

    pub(crate) fn snapshot(&self) -> GroupStats {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        GroupStats {
            gets: load(&self.gets),
            cache_hits: load(&self.cache_hits),
            peer_loads: load(&self.peer_loads),
            peer_errors: load(&self.peer_errors),
            loads: load(&self.loads),
            loads_deduped: load(&self.loads_deduped),
            local_loads: load(&self.local_loads),
            local_load_errs: load(&self.local_load_errs),
            server_requests: load(&self.server_requests),
        }
    }
}
