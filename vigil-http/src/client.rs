use bytes::Bytes;
use http_body_util::{BodyExt as _, Empty};
use hyper::Request;
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::connect::{ConnectLog, TimedConnector};
use super::{HttpRequest, HttpResponse, Result};

type Connector = TimedConnector<HttpsConnector<HttpConnector>>;

#[derive(Debug, Clone, Copy)]
pub struct ClientOptions {
    pub connect_timeout: Option<Duration>,
    /// Idle connections kept per host. Load cycles size this to their concurrency.
    pub max_idle_per_host: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            // The OS-level TCP connect timeout can be tens of seconds; an unreachable
            // target should fail well within one cycle.
            connect_timeout: Some(Duration::from_secs(3)),
            max_idle_per_host: usize::MAX,
        }
    }
}

/// HTTP/1.1 client over plain TCP or rustls, with keep-alive pooling and
/// connection-setup timing.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client<Connector, Empty<Bytes>>,
    connects: Arc<ConnectLog>,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(ClientOptions::default())
    }
}

impl HttpClient {
    #[must_use]
    pub fn new(opts: ClientOptions) -> Self {
        let mut http_connector = HttpConnector::new();
        http_connector.enforce_http(false);
        http_connector.set_nodelay(true);
        http_connector.set_connect_timeout(opts.connect_timeout);

        let https_connector = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector);

        let connects = Arc::new(ConnectLog::default());
        let connector = TimedConnector::new(https_connector, connects.clone());

        let inner = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(opts.max_idle_per_host)
            .build(connector);

        Self { inner, connects }
    }

    pub async fn request(&self, req: &HttpRequest) -> Result<HttpResponse> {
        let mut builder = Request::builder()
            .method(req.method.clone())
            .uri(req.uri.clone())
            .header(http::header::HOST, req.host.clone());
        if let Some(headers) = builder.headers_mut() {
            headers.extend(req.headers.clone());
        }
        let hyper_req: Request<Empty<Bytes>> = builder.body(Empty::new())?;

        let send = async {
            let res: hyper::Response<Incoming> = self.inner.request(hyper_req).await?;
            let (parts, body) = res.into_parts();
            // Draining the body lets the connection go back to the pool.
            let body = body.collect().await?.to_bytes();
            Ok::<_, super::Error>((parts, body))
        };

        let (parts, body) = match req.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, send).await {
                Ok(res) => res?,
                Err(_) => return Err(super::Error::Timeout(timeout)),
            },
            None => send.await?,
        };

        // Normalize headers to lowercase keys; repeated headers are joined with ", ".
        let mut merged: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in parts.headers.iter() {
            let key = name.as_str().to_ascii_lowercase();
            let v = String::from_utf8_lossy(value.as_bytes()).to_string();
            merged
                .entry(key)
                .and_modify(|cur| {
                    if !cur.is_empty() {
                        cur.push_str(", ");
                    }
                    cur.push_str(&v);
                })
                .or_insert(v);
        }

        Ok(HttpResponse {
            status: parts.status.as_u16(),
            headers: merged.into_iter().collect(),
            body,
        })
    }

    /// Connection-setup durations observed since the last call.
    pub fn take_connect_times(&self) -> Vec<Duration> {
        self.connects.drain()
    }
}
