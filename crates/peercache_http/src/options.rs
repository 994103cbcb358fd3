// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Debug};

use peercache_ring::{DEFAULT_REPLICAS, HashFn, crc32};

/// The path prefix under which peers serve each other by default.
pub const DEFAULT_BASE_PATH: &str = "/_peercache/";

/// Settings of an [`HttpPool`](crate::HttpPool).
///
/// Every peer of a deployment must use the same options, otherwise peers disagree
/// on key ownership or on the URLs they request from each other.
///
/// With the `serde` feature enabled the options can be read from a configuration
/// file. The hash function is not serializable and always takes its default.
///
/// # Examples
///
/// ```
/// use peercache_http::HttpPoolOptions;
///
/// let options = HttpPoolOptions {
///     replicas: 100,
///     ..HttpPoolOptions::default()
/// };
/// assert_eq!(options.base_path, "/_peercache/");
/// ```
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HttpPoolOptions {
    /// Path prefix of the peer endpoint. Must start and end with `/`.
    pub base_path: String,

    /// Virtual nodes per peer on the hash ring.
    pub replicas: usize,

    /// Hash function placing keys and peers on the ring.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub hash: HashFn,
}

impl Default for HttpPoolOptions {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_BASE_PATH.to_owned(),
            replicas: DEFAULT_REPLICAS,
            hash: crc32,
        }
    }
}

impl Debug for HttpPoolOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpPoolOptions")
            .field("base_path", &self.base_path)
            .field("replicas", &self.replicas)
            .finish_non_exhaustive()
    }
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let options: HttpPoolOptions = serde_json::from_str(r#"{ "replicas": 7 }"#).unwrap();
        assert_eq!(options.replicas, 7);
        assert_eq!(options.base_path, DEFAULT_BASE_PATH);
        assert_eq!((options.hash)(b"abc"), crc32(b"abc"));
    }

    #[test]
    fn hash_is_not_serialized() {
        let json = serde_json::to_string(&HttpPoolOptions::default()).unwrap();
        assert_eq!(json, r#"{"base_path":"/_peercache/","replicas":50}"#);
    }
}
