// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! HTTP transport for [`peercache`].
//!
//! Every peer runs an [`HttpPool`]. The pool knows the base URLs of all peers,
//! decides which one owns a key, and serves the values this process owns to the
//! others at `GET {base_path}{group}/{key}`. Outgoing fetches go through an
//! [`HttpGetter`] per remote peer.
//!
//! Peers are plain HTTP/1.1 endpoints served with `hyper`, and values travel as
//! raw `application/octet-stream` bodies. Peer traffic is not authenticated.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use peercache::{GetterFn, Registry};
//! use peercache_http::{HttpPool, HttpPoolOptions};
//! use tokio::net::TcpListener;
//!
//! # async fn run() -> Result<(), peercache_http::Error> {
//! let registry = Arc::new(Registry::new());
//! let users = registry.new_group(
//!     "users",
//!     64 << 20,
//!     GetterFn::new(|id: String| async move { Ok::<_, std::io::Error>(format!("user {id}").into_bytes()) }),
//! );
//!
//! let options = HttpPoolOptions {
//!     base_path: "/_cache/".to_owned(),
//!     ..HttpPoolOptions::default()
//! };
//! let pool = Arc::new(HttpPool::with_options("http://10.0.0.1:9000", Arc::clone(&registry), options));
//! pool.set(["http://10.0.0.1:9000", "http://10.0.0.2:9000"])?;
//! users.register_peers(Arc::<HttpPool>::clone(&pool));
//!
//! pool.serve(TcpListener::bind("0.0.0.0:9000").await?).await
//! # }
//! ```

mod error;
mod getter;
mod options;
mod pool;

pub use error::Error;
pub use getter::HttpGetter;
pub use options::{DEFAULT_BASE_PATH, HttpPoolOptions};
pub use pool::HttpPool;
