// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for group reads and peer fetches.

use std::sync::Arc;

use thiserror::Error;

/// A boxed error as returned by loaders and transports.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// An error returned by [`Group::get`](crate::Group::get) and [`Registry::serve`](crate::Registry::serve).
///
/// The variants stay distinguishable so a transport can map them onto its own
/// status codes. The type is cheap to clone because one result is shared by
/// every caller waiting on the same key.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The requested key was empty.
    #[error("key is required")]
    InvalidKey,

    /// No group is registered under the requested name.
    #[error("no such group: {0}")]
    NoSuchGroup(String),

    /// The loader failed to produce a value. The loader's error is kept as is.
    #[error(transparent)]
    Load(Arc<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wraps a loader failure.
    ///
    /// # Examples
    ///
    /// ```
    /// use peercache::Error;
    ///
    /// let error = Error::load("Sam not exist");
    /// assert_eq!(error.to_string(), "Sam not exist");
    /// ```
    pub fn load(cause: impl Into<BoxError>) -> Self {
        Self::Load(Arc::from(cause.into()))
    }
}

/// A specialized [`Result`] type for group reads.
pub type Result<T> = std::result::Result<T, Error>;

/// A failed fetch from a peer.
///
/// Groups never surface this error to their callers; a failed peer fetch falls
/// back to the local loader.
#[derive(Debug, Error)]
pub enum PeerError {
    /// The peer answered with a non-success status.
    #[error("peer responded with status {0}")]
    Status(u16),

    /// The request did not complete, or its response could not be read.
    #[error("peer request failed: {0}")]
    Transport(#[source] BoxError),
}

impl PeerError {
    /// Wraps a transport-level failure.
    pub fn transport(cause: impl Into<BoxError>) -> Self {
        Self::Transport(cause.into())
    }
}
