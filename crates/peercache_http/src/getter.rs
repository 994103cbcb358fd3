// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Debug};

use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::{Request, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use pct_str::{PctString, UriReserved};
use peercache::{PeerError, PeerGetter};

pub(crate) type HttpClient = Client<HttpConnector, Full<Bytes>>;

pub(crate) fn new_client() -> HttpClient {
    Client::builder(TokioExecutor::new()).build_http()
}

/// Percent-encodes a path segment, including any `/` it contains.
pub(crate) fn encode_segment(segment: &str) -> String {
    PctString::encode(segment.chars(), UriReserved::Any).into_string()
}

/// Fetches values from one remote peer over HTTP.
///
/// A request for `key` of `group` is sent as `GET {base_url}{group}/{key}` with
/// both segments percent-encoded. Any status other than `200 OK` is reported as
/// [`PeerError::Status`].
#[derive(Clone)]
pub struct HttpGetter {
    base_url: String,
    client: HttpClient,
}

impl HttpGetter {
    /// Creates a getter for the peer endpoint at `base_url`, such as
    /// `http://10.0.0.2:8001/_peercache/`.
    ///
    /// The getter must be used from within a Tokio runtime.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url.into(), new_client())
    }

    pub(crate) fn with_client(base_url: String, client: HttpClient) -> Self {
        Self { base_url, client }
    }

    /// Returns the endpoint this getter sends requests to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, group: &str, key: &str) -> String {
        format!("{}{}/{}", self.base_url, encode_segment(group), encode_segment(key))
    }

    async fn fetch(&self, group: &str, key: &str) -> Result<Bytes, PeerError> {
        let request = Request::get(self.url_for(group, key))
            .body(Full::new(Bytes::new()))
            .map_err(PeerError::transport)?;

        let response = self.client.request(request).await.map_err(PeerError::transport)?;
        if response.status() != StatusCode::OK {
            return Err(PeerError::Status(response.status().as_u16()));
        }

        let body = response.into_body().collect().await.map_err(PeerError::transport)?;
        Ok(body.to_bytes())
    }
}

impl PeerGetter for HttpGetter {
    fn get<'a>(&'a self, group: &'a str, key: &'a str) -> BoxFuture<'a, Result<Bytes, PeerError>> {
        Box::pin(self.fetch(group, key))
    }
}

impl Debug for HttpGetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpGetter").field("base_url", &self.base_url).finish_non_exhaustive()
    }
}
