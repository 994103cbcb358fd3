// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A distributed read-through cache shared by a fleet of equal peers.
//!
//! Every process holds a set of named [`Group`]s. A group keeps a byte-bounded
//! local cache and, on a miss, either fetches the value from the peer that owns
//! the key or calls its [`Getter`] to load it from the source of truth. Key
//! ownership follows a consistent hash ring, so every peer agrees on who owns
//! what without a coordinator, and concurrent misses for one key inside a
//! process collapse into a single load.
//!
//! The crate is transport agnostic. A transport plugs in through two traits:
//! [`PeerPicker`] decides which peer owns a key, and [`PeerGetter`] fetches a key
//! from that peer. [`PeerRing`] is a ready-made picker over any peer handle type;
//! the `peercache_http` crate builds an HTTP transport on top of it. Inbound
//! requests are answered through [`Registry::serve`].
//!
//! # Read path
//!
//! 1. A hit in the local cache returns immediately.
//! 2. Otherwise the call joins any in-flight load for the same key.
//! 3. The load asks the owning peer if it is remote. A peer failure is logged at
//!    `warn` level and the load continues locally.
//! 4. The loader runs if no peer answered. Loader errors are returned to every
//!    waiter and are not cached.
//! 5. The value is cached locally, whether it came from a peer or the loader.
//!
//! # Metrics
//!
//! [`Group::stats`] and [`Group::cache_stats`] are always available. With the
//! `metrics` feature, `GroupBuilder::metrics` additionally reports every group
//! event to an OpenTelemetry `MeterProvider` as the `peercache.group.event.count`
//! counter.
//!
//! # Example
//!
//! ```
//! use peercache::{GetterFn, Registry};
//!
//! # futures_util::FutureExt::now_or_never(async {
//! let registry = Registry::new();
//! let scores = registry.new_group(
//!     "scores",
//!     2 << 10,
//!     GetterFn::new(|key: String| async move {
//!         match key.as_str() {
//!             "Tom" => Ok(b"630".to_vec()),
//!             "Jack" => Ok(b"589".to_vec()),
//!             _ => Err(format!("{key} not exist")),
//!         }
//!     }),
//! );
//!
//! assert_eq!(scores.get("Tom").await.unwrap(), "630");
//! assert_eq!(scores.cache_stats().items, 1);
//! # });
//! ```

mod byte_view;
mod cache;
mod error;
mod getter;
mod group;
mod peers;
mod registry;
mod stats;
#[cfg(any(feature = "metrics", test))]
mod telemetry;

pub use byte_view::ByteView;
pub use cache::CacheStats;
pub use error::{BoxError, Error, PeerError, Result};
pub use getter::{Getter, GetterFn};
pub use group::{Group, GroupBuilder};
pub use peers::{PeerGetter, PeerPicker, PeerRing};
pub use registry::Registry;
pub use stats::GroupStats;
