// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The read path tying the local cache, peers, and loader together.

use std::fmt::{self, Debug};
use std::sync::{Arc, OnceLock};

#[cfg(any(feature = "metrics", test))]
use opentelemetry::metrics::MeterProvider;
use peercache_flight::Flight;

use crate::ByteView;
use crate::cache::{BoundedCache, CacheStats};
use crate::error::{Error, PeerError, Result};
use crate::getter::Getter;
use crate::peers::{PeerGetter, PeerPicker};
use crate::stats::{Counters, GroupEvent, GroupStats};
#[cfg(any(feature = "metrics", test))]
use crate::telemetry::GroupMetrics;

/// A named cache namespace.
///
/// A group answers [`get`](Self::get) from its local cache when it can. On a miss it
/// asks the owning peer, if one is registered and the key belongs elsewhere, and
/// otherwise calls its [`Getter`]. Concurrent misses for one key share a single
/// trip to the peer or loader. Whatever comes back is cached locally.
///
/// # Examples
///
/// ```
/// use peercache::{Group, GetterFn};
///
/// # futures_util::FutureExt::now_or_never(async {
/// let group = Group::new(
///     "scores",
///     2 << 10,
///     GetterFn::new(|key: String| async move {
///         match key.as_str() {
///             "Tom" => Ok(b"630".to_vec()),
///             _ => Err(format!("{key} not exist")),
///         }
///     }),
/// );
///
/// assert_eq!(group.get("Tom").await.unwrap(), "630");
/// assert!(group.get("Sam").await.is_err());
/// # });
/// ```
pub struct Group {
    name: String,
    getter: Box<dyn Getter>,
    peers: OnceLock<Arc<dyn PeerPicker>>,
    main_cache: BoundedCache,
    flight: Flight<String, Result<ByteView>>,
    counters: Counters,
}

impl Group {
    /// Creates a group whose local cache holds at most `cache_bytes` bytes of keys
    /// and values. A budget of zero leaves the cache unbounded.
    #[must_use]
    pub fn new(name: impl Into<String>, cache_bytes: usize, getter: impl Getter + 'static) -> Self {
        Self::from_parts(
            name.into(),
            Box::new(getter),
            BoundedCache::new(cache_bytes),
            Counters::default(),
        )
    }

    /// Starts building a group named `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> GroupBuilder {
        GroupBuilder {
            name: name.into(),
            cache_bytes: 0,
            getter: None,
            #[cfg(any(feature = "metrics", test))]
            metrics: None,
        }
    }

    fn from_parts(name: String, getter: Box<dyn Getter>, main_cache: BoundedCache, counters: Counters) -> Self {
        Self {
            name,
            getter,
            peers: OnceLock::new(),
            main_cache,
            flight: Flight::new(),
            counters,
        }
    }

    /// Returns the group's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Installs the capability used to find the peer owning a key.
    ///
    /// # Panics
    ///
    /// Panics if peers were already registered for this group.
    pub fn register_peers(&self, peers: Arc<dyn PeerPicker>) {
        assert!(
            self.peers.set(peers).is_ok(),
            "peers already registered for group {}",
            self.name
        );
    }

    /// Returns the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKey`] if `key` is empty, and [`Error::Load`] if the
    /// loader fails. Loader failures are not cached; the next call tries again.
    /// Failures of the owning peer are never returned: the group loads the value
    /// itself instead.
    pub async fn get(&self, key: &str) -> Result<ByteView> {
        self.counters.record(GroupEvent::Get);
        if key.is_empty() {
            return Err(Error::InvalidKey);
        }

        if let Some(value) = self.main_cache.get(key) {
            self.counters.record(GroupEvent::CacheHit);
            tracing::debug!(group = %self.name, key, "cache hit");
            return Ok(value);
        }

        self.load(key).await
    }

    async fn load(&self, key: &str) -> Result<ByteView> {
        self.counters.record(GroupEvent::Load);
        self.flight
            .work(key.to_owned(), || async {
                // The previous call for this key may have finished between our miss and
                // joining the flight.
                if let Some(value) = self.main_cache.get(key) {
                    self.counters.record(GroupEvent::CacheHit);
                    return Ok(value);
                }
                self.counters.record(GroupEvent::LoadDeduped);

                if let Some(peer) = self.peers.get().and_then(|picker| picker.pick_peer(key)) {
                    match self.get_from_peer(peer.as_ref(), key).await {
                        Ok(value) => return Ok(value),
                        Err(error) => {
                            self.counters.record(GroupEvent::PeerError);
                            tracing::warn!(group = %self.name, key, ?peer, %error, "peer fetch failed, loading locally");
                        }
                    }
                }

                self.get_locally(key).await
            })
            .await
    }

    async fn get_from_peer(&self, peer: &dyn PeerGetter, key: &str) -> std::result::Result<ByteView, PeerError> {
        let value = ByteView::from(peer.get(&self.name, key).await?);
        self.counters.record(GroupEvent::PeerLoad);
        self.main_cache.add(key, value.clone());
        Ok(value)
    }

    async fn get_locally(&self, key: &str) -> Result<ByteView> {
        match self.getter.get(key).await {
            Ok(bytes) => {
                self.counters.record(GroupEvent::LocalLoad);
                let value = ByteView::from(bytes);
                self.main_cache.add(key, value.clone());
                Ok(value)
            }
            Err(cause) => {
                self.counters.record(GroupEvent::LocalLoadErr);
                Err(Error::load(cause))
            }
        }
    }

    /// Returns a snapshot of the group's counters.
    #[must_use]
    pub fn stats(&self) -> GroupStats {
        self.counters.snapshot()
    }

    /// Returns a snapshot of the group's local cache.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.main_cache.stats()
    }

    pub(crate) fn record_server_request(&self) {
        self.counters.record(GroupEvent::ServerRequest);
    }
}

impl Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("cache", &self.main_cache.stats())
            .field("peers", &self.peers.get().is_some())
            .field("in_flight", &self.flight.in_flight())
            .finish_non_exhaustive()
    }
}

/// Builds a [`Group`].
///
/// # Examples
///
/// ```
/// use peercache::{Group, GetterFn};
///
/// let group = Group::builder("scores")
///     .cache_bytes(64 << 20)
///     .getter(GetterFn::new(|key: String| async move { Ok::<_, std::io::Error>(key.into_bytes()) }))
///     .build();
/// assert_eq!(group.name(), "scores");
/// ```
pub struct GroupBuilder {
    name: String,
    cache_bytes: usize,
    getter: Option<Box<dyn Getter>>,
    #[cfg(any(feature = "metrics", test))]
    metrics: Option<GroupMetrics>,
}

impl GroupBuilder {
    /// Sets the byte budget of the local cache. Defaults to zero, which leaves the
    /// cache unbounded.
    #[must_use]
    pub fn cache_bytes(mut self, cache_bytes: usize) -> Self {
        self.cache_bytes = cache_bytes;
        self
    }

    /// Sets the loader called on a true miss.
    #[must_use]
    pub fn getter(mut self, getter: impl Getter + 'static) -> Self {
        self.getter = Some(Box::new(getter));
        self
    }

    /// Reports the group's events as OpenTelemetry metrics through `meter_provider`.
    ///
    /// Every event counted in [`GroupStats`], and every cache eviction, adds one to the
    /// `peercache.group.event.count` counter, tagged with `peercache.group.name` and
    /// `peercache.group.event`.
    #[cfg(any(feature = "metrics", test))]
    #[must_use]
    pub fn metrics(mut self, meter_provider: &dyn MeterProvider) -> Self {
        self.metrics = Some(GroupMetrics::new(&self.name, meter_provider));
        self
    }

    /// Builds the group.
    ///
    /// # Panics
    ///
    /// Panics if no getter was set.
    #[must_use]
    #[expect(clippy::panic, reason = "a group without a loader is a configuration error")]
    pub fn build(self) -> Group {
        let Some(getter) = self.getter else {
            panic!("group {} has no getter", self.name);
        };

        #[cfg(any(feature = "metrics", test))]
        let (main_cache, counters) = (
            BoundedCache::with_metrics(self.cache_bytes, self.metrics.clone()),
            Counters::with_metrics(self.metrics),
        );
        #[cfg(not(any(feature = "metrics", test)))]
        let (main_cache, counters) = (BoundedCache::new(self.cache_bytes), Counters::default());

        Group::from_parts(self.name, getter, main_cache, counters)
    }
}

impl Debug for GroupBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupBuilder")
            .field("name", &self.name)
            .field("cache_bytes", &self.cache_bytes)
            .field("getter", &self.getter.is_some())
            .finish_non_exhaustive()
    }
}
