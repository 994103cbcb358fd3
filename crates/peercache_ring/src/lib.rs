// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Consistent hashing with virtual nodes.
//!
//! [`HashRing`] maps arbitrary keys onto one of a fixed set of peer identifiers.
//! Every peer is represented by `replicas` virtual positions on a 32-bit ring,
//! computed as `hash(i + peer)` for each replica index `i`. A key is owned by the
//! peer at the first position greater than or equal to `hash(key)`, wrapping to
//! the lowest position when no larger one exists.
//!
//! Ownership is a pure function of the peer list, the replica count and the hash
//! function, so independently configured rings agree on every key.
//!
//! # Example
//!
//! ```
//! use peercache_ring::HashRing;
//!
//! let mut ring = HashRing::default();
//! ring.configure(["http://10.0.0.1:8001", "http://10.0.0.2:8001", "http://10.0.0.3:8001"]);
//!
//! let owner = ring.owner_of("Tom").expect("ring has peers");
//! assert_eq!(ring.owner_of("Tom"), Some(owner));
//! ```

use std::collections::HashMap;
use std::fmt::{self, Debug};

/// Number of virtual positions per peer used by [`HashRing::default`].
pub const DEFAULT_REPLICAS: usize = 50;

/// A hash function placing keys and virtual nodes on the ring.
///
/// The function must be deterministic and identical on every peer.
pub type HashFn = fn(&[u8]) -> u32;

/// CRC-32 (IEEE) checksum, the default [`HashFn`].
#[must_use]
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// A consistent hash ring over peer identifiers.
#[derive(Clone)]
pub struct HashRing {
    hash: HashFn,
    replicas: usize,
    positions: Vec<u32>,
    owners: HashMap<u32, String>,
}

impl HashRing {
    /// Creates an empty ring placing `replicas` virtual nodes per peer.
    ///
    /// # Panics
    ///
    /// Panics if `replicas` is zero.
    #[must_use]
    pub fn new(replicas: usize, hash: HashFn) -> Self {
        assert!(replicas > 0, "a hash ring needs at least one replica per peer");
        Self {
            hash,
            replicas,
            positions: Vec::new(),
            owners: HashMap::new(),
        }
    }

    /// Replaces the ring contents with `peers`.
    ///
    /// The previous positions are discarded, so the ring always reflects exactly
    /// the most recently declared peer list.
    pub fn configure<I, S>(&mut self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.positions.clear();
        self.owners.clear();

        for peer in peers {
            let peer = peer.as_ref();
            for i in 0..self.replicas {
                let position = (self.hash)(format!("{i}{peer}").as_bytes());
                self.positions.push(position);
                self.owners.insert(position, peer.to_owned());
            }
        }

        // Colliding virtual nodes share one position; the peer added last owns it.
        self.positions.sort_unstable();
        self.positions.dedup();
    }

    /// Returns the peer owning `key`, or `None` if the ring is empty.
    #[must_use]
    pub fn owner_of(&self, key: &str) -> Option<&str> {
        if self.positions.is_empty() {
            return None;
        }

        let hash = (self.hash)(key.as_bytes());
        let idx = self.positions.partition_point(|&position| position < hash);
        let position = self.positions[idx % self.positions.len()];
        self.owners.get(&position).map(String::as_str)
    }

    /// Returns the number of virtual positions per peer.
    #[must_use]
    pub fn replicas(&self) -> usize {
        self.replicas
    }

    /// Returns the number of occupied positions on the ring.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns `true` if no peer is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl Default for HashRing {
    /// Creates an empty ring with [`DEFAULT_REPLICAS`] and [`crc32`].
    fn default() -> Self {
        Self::new(DEFAULT_REPLICAS, crc32)
    }
}

impl Debug for HashRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashRing")
            .field("replicas", &self.replicas)
            .field("positions", &self.positions.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Treats the input as a decimal number so positions are easy to reason about.
    fn decimal(data: &[u8]) -> u32 {
        std::str::from_utf8(data)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    #[test]
    fn lookup_walks_clockwise() {
        let mut ring = HashRing::new(3, decimal);
        // Positions: 2, 4, 6, 12, 14, 16, 22, 24, 26
        ring.configure(["6", "4", "2"]);

        let cases = [("2", "2"), ("11", "2"), ("23", "4"), ("27", "2")];
        for (key, owner) in cases {
            assert_eq!(ring.owner_of(key), Some(owner), "asking for {key}");
        }
    }

    #[test]
    fn configure_replaces_previous_peers() {
        let mut ring = HashRing::new(3, decimal);
        ring.configure(["6", "4", "2"]);
        ring.configure(["8", "2"]);

        // Positions: 2, 8, 12, 18, 22, 28
        let cases = [("2", "2"), ("5", "8"), ("11", "2"), ("23", "8"), ("27", "8"), ("29", "2")];
        for (key, owner) in cases {
            assert_eq!(ring.owner_of(key), Some(owner), "asking for {key}");
        }
        assert_eq!(ring.len(), 6);
    }

    #[test]
    fn empty_ring_has_no_owner() {
        let ring = HashRing::default();
        assert!(ring.is_empty());
        assert_eq!(ring.owner_of("anything"), None);
    }

    #[test]
    fn reconfigure_to_empty_clears_ring() {
        let mut ring = HashRing::default();
        ring.configure(["a", "b"]);
        ring.configure(std::iter::empty::<&str>());
        assert_eq!(ring.owner_of("key"), None);
    }

    #[test]
    fn default_uses_crc32() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(HashRing::default().replicas(), DEFAULT_REPLICAS);
    }

    #[test]
    #[should_panic]
    fn zero_replicas_is_rejected() {
        let _ = HashRing::new(0, crc32);
    }
}
