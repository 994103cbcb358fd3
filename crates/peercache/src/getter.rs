// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The loader a group calls on a true miss.

use std::fmt::{self, Debug};

use futures_util::future::BoxFuture;

use crate::error::BoxError;

/// Loads the authoritative value for a key.
///
/// A group calls its getter when a key is neither cached locally nor fetched from
/// the owning peer. Concurrent misses for the same key are coalesced, so the getter
/// runs at most once per key at a time within a process.
pub trait Getter: Send + Sync {
    /// Produces the bytes stored under `key`.
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Vec<u8>, BoxError>>;
}

/// Adapts an async closure into a [`Getter`].
///
/// # Examples
///
/// ```
/// use peercache::{Getter, GetterFn};
///
/// # futures_util::FutureExt::now_or_never(async {
/// let getter = GetterFn::new(|key: String| async move { Ok::<_, std::io::Error>(key.into_bytes()) });
/// assert_eq!(getter.get("Tom").await.unwrap(), b"Tom");
/// # });
/// ```
pub struct GetterFn<F>(F);

impl<F> GetterFn<F> {
    /// Wraps `f`, which receives an owned copy of the requested key.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F, Fut, E> Getter for GetterFn<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<u8>, E>> + Send + 'static,
    E: Into<BoxError>,
{
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Vec<u8>, BoxError>> {
        let fut = (self.0)(key.to_owned());
        Box::pin(async move { fut.await.map_err(Into::into) })
    }
}

impl<F> Debug for GetterFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GetterFn").finish_non_exhaustive()
    }
}
