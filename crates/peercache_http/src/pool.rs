// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::convert::Infallible;
use std::fmt::{self, Debug};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderValue};
use http::{Method, Request, Response, StatusCode, Uri};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use pct_str::PctStr;
use peercache::{Error as GroupError, PeerGetter, PeerPicker, PeerRing, Registry};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};

use crate::getter::{HttpClient, HttpGetter, new_client};
use crate::{Error, HttpPoolOptions};

/// Pause after a failed accept, so a full file table is not spun on.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// A source of inbound peer connections.
trait Acceptor {
    type Io: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    async fn accept(&mut self) -> io::Result<(Self::Io, SocketAddr)>;
}

impl Acceptor for TcpListener {
    type Io = TcpStream;

    async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }
}

/// The HTTP side of a peer: picks owners for outgoing fetches and answers
/// requests from other peers.
///
/// A pool is identified by its own base URL, such as `http://10.0.0.1:8001`, which
/// must appear verbatim in the peer list given to [`set`](Self::set) for keys owned
/// by this process to be served locally. Register the pool with every group that
/// should use it via [`Group::register_peers`](peercache::Group::register_peers),
/// and run [`serve`](Self::serve) to answer the other peers.
///
/// Requests are routed as follows:
///
/// | Request | Response |
/// | ------- | -------- |
/// | `GET {base_path}{group}/{key}` | `200` with the value as `application/octet-stream` |
/// | empty key, or no `/` after the group | `400` |
/// | unknown group, or a path outside `base_path` | `404` |
/// | loader failure | `500` |
/// | any method but `GET` | `405` |
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use peercache::{GetterFn, Registry};
/// use peercache_http::HttpPool;
/// use tokio::net::TcpListener;
///
/// # async fn run() -> Result<(), peercache_http::Error> {
/// let registry = Arc::new(Registry::new());
/// let scores = registry.new_group(
///     "scores",
///     64 << 20,
///     GetterFn::new(|key: String| async move { Ok::<_, std::io::Error>(key.into_bytes()) }),
/// );
///
/// let pool = Arc::new(HttpPool::new("http://10.0.0.1:8001", Arc::clone(&registry)));
/// pool.set(["http://10.0.0.1:8001", "http://10.0.0.2:8001", "http://10.0.0.3:8001"])?;
/// scores.register_peers(Arc::<HttpPool>::clone(&pool));
///
/// pool.serve(TcpListener::bind("0.0.0.0:8001").await?).await
/// # }
/// ```
pub struct HttpPool {
    self_url: String,
    base_path: String,
    registry: Arc<Registry>,
    ring: PeerRing<HttpGetter>,
    client: HttpClient,
}

impl HttpPool {
    /// Creates a pool with default options.
    #[must_use]
    pub fn new(self_url: impl Into<String>, registry: Arc<Registry>) -> Self {
        Self::with_options(self_url, registry, HttpPoolOptions::default())
    }

    /// Creates a pool with custom options.
    ///
    /// # Panics
    ///
    /// Panics if `options.base_path` does not start and end with `/`, or if
    /// `options.replicas` is zero.
    #[must_use]
    pub fn with_options(self_url: impl Into<String>, registry: Arc<Registry>, options: HttpPoolOptions) -> Self {
        let HttpPoolOptions {
            base_path,
            replicas,
            hash,
        } = options;
        assert!(
            base_path.starts_with('/') && base_path.ends_with('/'),
            "base path {base_path:?} must start and end with '/'"
        );

        let self_url = self_url.into();
        Self {
            ring: PeerRing::with_hash(self_url.clone(), replicas, hash),
            self_url,
            base_path,
            registry,
            client: new_client(),
        }
    }

    /// Returns this peer's own base URL.
    #[must_use]
    pub fn self_url(&self) -> &str {
        &self.self_url
    }

    /// Replaces the set of peers, each given by its base URL such as
    /// `http://10.0.0.2:8001`.
    ///
    /// The new ring and its peer handles become visible together.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPeerUrl`] and leaves the current peers in place if any
    /// entry is not an absolute `http://` URL.
    pub fn set<I, S>(&self, peers: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let peers: Vec<String> = peers.into_iter().map(Into::into).collect();
        for peer in &peers {
            let valid = format!("{peer}{}", self.base_path)
                .parse::<Uri>()
                .is_ok_and(|uri| uri.scheme_str() == Some("http") && uri.authority().is_some());
            if !valid {
                return Err(Error::InvalidPeerUrl(peer.clone()));
            }
        }

        self.ring.set(peers, |peer| {
            HttpGetter::with_client(format!("{peer}{}", self.base_path), self.client.clone())
        });
        Ok(())
    }

    /// Answers one request from another peer.
    pub async fn handle<B>(&self, request: Request<B>) -> Response<Full<Bytes>> {
        tracing::debug!(self_url = %self.self_url, method = %request.method(), path = request.uri().path(), "inbound request");

        if request.method() != Method::GET {
            return text(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
        }

        let Some(rest) = request.uri().path().strip_prefix(&self.base_path) else {
            return text(StatusCode::NOT_FOUND, "unexpected path");
        };
        let Some((group, key)) = rest.split_once('/') else {
            return text(StatusCode::BAD_REQUEST, "bad request");
        };
        let (Some(group), Some(key)) = (decode_segment(group), decode_segment(key)) else {
            return text(StatusCode::BAD_REQUEST, "malformed percent-encoding");
        };
        drop(request);

        match self.registry.serve(&group, &key).await {
            Ok(value) => {
                let mut response = Response::new(Full::new(value.to_bytes()));
                response
                    .headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
                response
            }
            Err(error @ GroupError::InvalidKey) => text(StatusCode::BAD_REQUEST, error.to_string()),
            Err(error @ GroupError::NoSuchGroup(_)) => text(StatusCode::NOT_FOUND, error.to_string()),
            Err(error @ GroupError::Load(_)) => text(StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
        }
    }

    /// Serves other peers on `listener`. The returned future only completes on error.
    ///
    /// Each connection is handled on its own Tokio task. A failed accept is logged
    /// and retried after a short pause.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the listener's local address cannot be read.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<(), Error> {
        tracing::info!(self_url = %self.self_url, addr = %listener.local_addr()?, base_path = %self.base_path, "peer server listening");
        self.accept_loop(listener).await;
        Ok(())
    }

    async fn accept_loop(self: Arc<Self>, mut acceptor: impl Acceptor) {
        loop {
            let (stream, remote) = match acceptor.accept().await {
                Ok(accepted) => accepted,
                Err(error) => {
                    tracing::warn!(self_url = %self.self_url, %error, "failed to accept peer connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };
            let io = TokioIo::new(stream);
            let pool = Arc::clone(&self);

            tokio::spawn(async move {
                let service = service_fn(move |request: Request<Incoming>| {
                    let pool = Arc::clone(&pool);
                    async move { Ok::<_, Infallible>(pool.handle(request).await) }
                });
                if let Err(error) = http1::Builder::new().serve_connection(io, service).await {
                    tracing::debug!(%remote, %error, "peer connection failed");
                }
            });
        }
    }
}

impl PeerPicker for HttpPool {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>> {
        self.ring.pick_peer(key)
    }
}

impl Debug for HttpPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpPool")
            .field("self_url", &self.self_url)
            .field("base_path", &self.base_path)
            .field("ring", &self.ring)
            .finish_non_exhaustive()
    }
}

fn decode_segment(segment: &str) -> Option<String> {
    PctStr::new(segment).ok().map(PctStr::decode)
}

fn text(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;
    use peercache::GetterFn;
    use tracing_test::traced_test;

    use super::*;

    fn pool() -> HttpPool {
        let registry = Arc::new(Registry::new());
        registry.new_group(
            "scores",
            1 << 10,
            GetterFn::new(|key: String| async move {
                match key.as_str() {
                    "Tom" => Ok(b"630".to_vec()),
                    "a/b" => Ok(b"slash".to_vec()),
                    _ => Err(format!("{key} not exist")),
                }
            }),
        );
        HttpPool::new("http://127.0.0.1:8001", registry)
    }

    async fn call(pool: &HttpPool, method: Method, path: &str) -> (StatusCode, String) {
        let request = Request::builder().method(method).uri(path).body(()).unwrap();
        let response = pool.handle(request).await;
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn serves_values() {
        let pool = pool();
        let request = Request::get("/_peercache/scores/Tom").body(()).unwrap();
        let response = pool.handle(request).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/octet-stream");
        assert_eq!(response.into_body().collect().await.unwrap().to_bytes(), "630");
    }

    #[tokio::test]
    async fn decodes_escaped_keys() {
        let pool = pool();
        assert_eq!(
            call(&pool, Method::GET, "/_peercache/scores/a%2Fb").await,
            (StatusCode::OK, "slash".to_owned())
        );
    }

    #[tokio::test]
    async fn maps_failures_to_statuses() {
        let pool = pool();

        assert_eq!(call(&pool, Method::GET, "/elsewhere/scores/Tom").await.0, StatusCode::NOT_FOUND);
        assert_eq!(call(&pool, Method::GET, "/_peercache/scores").await.0, StatusCode::BAD_REQUEST);
        assert_eq!(call(&pool, Method::GET, "/_peercache/scores/").await.0, StatusCode::BAD_REQUEST);
        assert_eq!(call(&pool, Method::GET, "/_peercache/users/Tom").await.0, StatusCode::NOT_FOUND);
        assert_eq!(call(&pool, Method::POST, "/_peercache/scores/Tom").await.0, StatusCode::METHOD_NOT_ALLOWED);

        let (status, body) = call(&pool, Method::GET, "/_peercache/scores/Sam").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Sam not exist");
    }

    #[test]
    fn rejects_invalid_peer_urls() {
        let pool = pool();
        assert!(matches!(pool.set(["not a url"]), Err(Error::InvalidPeerUrl(url)) if url == "not a url"));
        assert!(matches!(pool.set(["10.0.0.1:8001"]), Err(Error::InvalidPeerUrl(_))));
        assert!(pool.set(["http://10.0.0.1:8001", "http://10.0.0.2:8001"]).is_ok());
    }

    #[test]
    fn rejects_schemes_the_client_cannot_speak() {
        let pool = pool();
        pool.set(["http://10.0.0.1:8001", "http://10.0.0.2:8001"]).unwrap();

        let result = pool.set(["http://10.0.0.1:8001", "https://10.0.0.2:8001"]);
        assert!(matches!(result, Err(Error::InvalidPeerUrl(url)) if url == "https://10.0.0.2:8001"));
        assert!(matches!(pool.set(["ftp://10.0.0.1:8001"]), Err(Error::InvalidPeerUrl(_))));

        // The earlier peers stay in place.
        assert!((0..100).any(|i| pool.pick_peer(&format!("key{i}")).is_some()));
        assert!(pool.set(["http://10.0.0.1:8001", "http://10.0.0.2:8001"]).is_ok());
    }

    #[test]
    #[should_panic(expected = "must start and end with '/'")]
    fn base_path_needs_slashes() {
        let options = HttpPoolOptions {
            base_path: "_peercache".to_owned(),
            ..HttpPoolOptions::default()
        };
        let _ = HttpPool::with_options("http://127.0.0.1:8001", Arc::new(Registry::new()), options);
    }

    #[test]
    fn keys_owned_by_self_are_not_picked() {
        let pool = pool();
        pool.set(["http://127.0.0.1:8001"]).unwrap();
        assert!(pool.pick_peer("Tom").is_none());
    }

    /// Fails the first `failures` accepts, then hands out real connections.
    struct FlakyListener {
        listener: TcpListener,
        failures: usize,
    }

    impl Acceptor for FlakyListener {
        type Io = TcpStream;

        async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(io::ErrorKind::ConnectionAborted.into());
            }
            self.listener.accept().await
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn keeps_serving_after_failed_accepts() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let pool = Arc::new(pool());
        tokio::spawn(pool.accept_loop(FlakyListener { listener, failures: 2 }));

        let getter = HttpGetter::new(format!("http://{addr}/_peercache/"));
        assert_eq!(getter.get("scores", "Tom").await.unwrap(), "630");
        assert!(logs_contain("failed to accept peer connection"));
    }
}
