// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use thiserror::Error;

/// An error raised while configuring or running an [`HttpPool`](crate::HttpPool).
#[derive(Debug, Error)]
pub enum Error {
    /// A peer address could not be turned into an absolute URL.
    #[error("invalid peer url: {0}")]
    InvalidPeerUrl(String),

    /// The listener failed.
    #[error("peer server I/O error")]
    Io(#[from] std::io::Error),
}
