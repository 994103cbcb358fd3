// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Capabilities for locating and reaching the peer that owns a key.

use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use peercache_ring::{DEFAULT_REPLICAS, HashFn, HashRing, crc32};

use crate::error::PeerError;

/// Chooses the peer that owns a key.
pub trait PeerPicker: Send + Sync {
    /// Returns the owning peer, or `None` if this process owns `key` itself
    /// or no peers are known.
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>>;
}

/// Fetches a value from a remote peer.
pub trait PeerGetter: Send + Sync + Debug {
    /// Requests `key` of `group` from the peer.
    fn get<'a>(&'a self, group: &'a str, key: &'a str) -> BoxFuture<'a, Result<Bytes, PeerError>>;
}

struct Topology<P> {
    ring: HashRing,
    peers: HashMap<String, Arc<P>>,
}

/// A [`PeerPicker`] placing keys on a consistent hash ring of peer identifiers.
///
/// `PeerRing` keeps the ring and the handle of every peer together and replaces
/// both at once in [`set`](Self::set), so a concurrent pick never pairs the ring of
/// one configuration with the handles of another.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use futures_util::future::BoxFuture;
/// use peercache::{PeerError, PeerGetter, PeerRing};
///
/// #[derive(Debug)]
/// struct Loopback(String);
///
/// impl PeerGetter for Loopback {
///     fn get<'a>(&'a self, _group: &'a str, key: &'a str) -> BoxFuture<'a, Result<Bytes, PeerError>> {
///         Box::pin(async move { Ok(Bytes::from(format!("{}:{key}", self.0))) })
///     }
/// }
///
/// let ring = PeerRing::new("node-a");
/// ring.set(["node-a", "node-b", "node-c"], |id| Loopback(id.to_owned()));
///
/// // Keys owned by node-a are served locally, everything else has a handle.
/// let owner = ring.owner_of("Tom").unwrap();
/// assert_eq!(ring.pick("Tom").is_some(), owner != "node-a");
/// ```
pub struct PeerRing<P> {
    self_id: String,
    replicas: usize,
    hash: HashFn,
    topology: RwLock<Topology<P>>,
}

impl<P> PeerRing<P> {
    /// Creates an empty ring for the process identified by `self_id`, using
    /// [`DEFAULT_REPLICAS`] virtual nodes per peer and CRC-32.
    #[must_use]
    pub fn new(self_id: impl Into<String>) -> Self {
        Self::with_hash(self_id, DEFAULT_REPLICAS, crc32)
    }

    /// Creates an empty ring with a custom replica count and hash function.
    ///
    /// # Panics
    ///
    /// Panics if `replicas` is zero.
    #[must_use]
    pub fn with_hash(self_id: impl Into<String>, replicas: usize, hash: HashFn) -> Self {
        Self {
            self_id: self_id.into(),
            replicas,
            hash,
            topology: RwLock::new(Topology {
                ring: HashRing::new(replicas, hash),
                peers: HashMap::new(),
            }),
        }
    }

    /// Returns the identifier of this process.
    #[must_use]
    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    /// Replaces the peer list, creating a handle for every peer with `connect`.
    ///
    /// The list may include this process; keys it owns are then served locally.
    pub fn set<I, S>(&self, peers: I, mut connect: impl FnMut(&str) -> P)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = peers.into_iter().map(Into::into).collect();

        let mut ring = HashRing::new(self.replicas, self.hash);
        ring.configure(&ids);
        let peers = ids.iter().map(|id| (id.clone(), Arc::new(connect(id)))).collect();

        *self.topology.write() = Topology { ring, peers };
        tracing::info!(self_id = %self.self_id, peers = ids.len(), "peer ring reconfigured");
    }

    /// Returns the identifier of the peer owning `key`, which may be this process.
    #[must_use]
    pub fn owner_of(&self, key: &str) -> Option<String> {
        self.topology.read().ring.owner_of(key).map(str::to_owned)
    }

    /// Returns the handle of the remote peer owning `key`.
    ///
    /// Returns `None` when the ring is empty or this process owns the key.
    #[must_use]
    pub fn pick(&self, key: &str) -> Option<Arc<P>> {
        let topology = self.topology.read();
        let owner = topology.ring.owner_of(key)?;
        if owner == self.self_id {
            return None;
        }
        topology.peers.get(owner).cloned()
    }
}

impl<P: PeerGetter + 'static> PeerPicker for PeerRing<P> {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>> {
        let peer = self.pick(key)?;
        tracing::debug!(key, ?peer, "picked peer");
        Some(peer as Arc<dyn PeerGetter>)
    }
}

impl<P> Debug for PeerRing<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let topology = self.topology.read();
        f.debug_struct("PeerRing")
            .field("self_id", &self.self_id)
            .field("ring", &topology.ring)
            .field("peers", &topology.peers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Handle(String);

    impl PeerGetter for Handle {
        fn get<'a>(&'a self, _group: &'a str, _key: &'a str) -> BoxFuture<'a, Result<Bytes, PeerError>> {
            Box::pin(async { Err(PeerError::Status(503)) })
        }
    }

    #[test]
    fn empty_ring_picks_nobody() {
        let ring: PeerRing<Handle> = PeerRing::new("self");
        assert!(ring.pick("key").is_none());
        assert!(ring.owner_of("key").is_none());
    }

    #[test]
    fn single_self_peer_serves_everything_locally() {
        let ring = PeerRing::new("self");
        ring.set(["self"], |id| Handle(id.to_owned()));

        for i in 0..100 {
            let key = format!("key{i}");
            assert_eq!(ring.owner_of(&key).as_deref(), Some("self"));
            assert!(ring.pick(&key).is_none());
        }
    }

    #[test]
    fn remote_owner_returns_its_handle() {
        let ring = PeerRing::new("a");
        ring.set(["a", "b"], |id| Handle(id.to_owned()));

        for i in 0..100 {
            let key = format!("key{i}");
            let owner = ring.owner_of(&key).expect("ring has peers");
            match ring.pick(&key) {
                Some(handle) => assert_eq!(handle.0, owner),
                None => assert_eq!(owner, "a"),
            }
        }
    }

    #[test]
    fn set_replaces_handles() {
        let ring = PeerRing::new("self");
        ring.set(["old"], |id| Handle(id.to_owned()));
        ring.set(["new"], |id| Handle(id.to_owned()));

        let handle = ring.pick("anything").expect("remote owner");
        assert_eq!(handle.0, "new");
    }
}
