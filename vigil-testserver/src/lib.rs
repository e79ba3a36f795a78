//! Local HTTP target for end-to-end tests of the load engine and exporter.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};

pub const PATH_HELLO: &str = "/hello";
pub const PATH_SLOW: &str = "/slow";
pub const PATH_HOST: &str = "/host";
pub const PATH_STATUS: &str = "/status";

const SLOW_DELAY: Duration = Duration::from_millis(50);

/// Counters shared by every clone; read them from the test while the server runs.
#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    inner: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    tagged: AtomicU64,
}

impl TestServerStats {
    pub fn requests_total(&self) -> u64 {
        self.inner.requests.load(Ordering::Relaxed)
    }

    /// Requests that carried `x-test: 1`.
    pub fn saw_test_header(&self) -> u64 {
        self.inner.tagged.load(Ordering::Relaxed)
    }
}

async fn count_requests(State(stats): State<TestServerStats>, req: Request, next: Next) -> Response {
    stats.inner.requests.fetch_add(1, Ordering::Relaxed);
    if req.headers().get("x-test").is_some_and(|v| v.as_bytes() == b"1") {
        stats.inner.tagged.fetch_add(1, Ordering::Relaxed);
    }
    next.run(req).await
}

#[derive(Debug, Clone)]
pub struct TestServerUrls {
    pub base_url: String,
    pub hello: String,
    pub slow: String,
    pub host: String,
}

impl TestServerUrls {
    fn for_addr(addr: SocketAddr) -> Self {
        let base_url = format!("http://{addr}");
        Self {
            hello: format!("{base_url}{PATH_HELLO}"),
            slow: format!("{base_url}{PATH_SLOW}"),
            host: format!("{base_url}{PATH_HOST}"),
            base_url,
        }
    }

    /// URL that always answers with `code`.
    pub fn status(&self, code: u16) -> String {
        format!("{}{PATH_STATUS}/{code}", self.base_url)
    }
}

async fn slow() -> &'static str {
    sleep(SLOW_DELAY).await;
    "slow"
}

/// Echoes the `Host` header the client sent.
async fn echo_host(headers: HeaderMap) -> String {
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_default()
}

async fn fixed_status(Path(code): Path<u16>) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

pub fn router(stats: TestServerStats) -> Router {
    Router::new()
        .route(PATH_HELLO, get(|| async { "Hello World!" }))
        .route(PATH_SLOW, get(slow))
        .route(PATH_HOST, get(echo_host))
        .route(&format!("{PATH_STATUS}/{{code}}"), get(fixed_status))
        .layer(middleware::from_fn_with_state(stats, count_requests))
}

/// Server bound to an ephemeral loopback port. Aborted on drop unless
/// [`TestServer::shutdown`] ran first.
pub struct TestServer {
    addr: SocketAddr,
    urls: TestServerUrls,
    stats: TestServerStats,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();
        let app = router(stats.clone());

        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stopped.await;
                })
                .await;
        });

        Ok(Self {
            addr,
            urls: TestServerUrls::for_addr(addr),
            stats,
            stop: Some(stop),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn urls(&self) -> &TestServerUrls {
        &self.urls
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
