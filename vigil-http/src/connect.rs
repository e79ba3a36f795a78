use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use hyper::Uri;
use parking_lot::Mutex;
use tower_service::Service;

/// Connection-setup samples recorded by [`TimedConnector`].
#[derive(Debug, Default)]
pub(crate) struct ConnectLog {
    samples: Mutex<Vec<Duration>>,
}

impl ConnectLog {
    fn record(&self, d: Duration) {
        self.samples.lock().push(d);
    }

    pub(crate) fn drain(&self) -> Vec<Duration> {
        std::mem::take(&mut *self.samples.lock())
    }
}

/// Wraps a connector and records how long each successful connect took
/// (TCP, plus TLS when the inner connector does the handshake).
#[derive(Debug, Clone)]
pub(crate) struct TimedConnector<C> {
    inner: C,
    log: Arc<ConnectLog>,
}

impl<C> TimedConnector<C> {
    pub(crate) fn new(inner: C, log: Arc<ConnectLog>) -> Self {
        Self { inner, log }
    }
}

impl<C> Service<Uri> for TimedConnector<C>
where
    C: Service<Uri>,
    C::Future: Send + 'static,
    C::Response: Send + 'static,
    C::Error: Send + 'static,
{
    type Response = C::Response;
    type Error = C::Error;
    type Future = Pin<Box<dyn Future<Output = Result<C::Response, C::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let started = Instant::now();
        let fut = self.inner.call(dst);
        let log = self.log.clone();
        Box::pin(async move {
            let res = fut.await;
            if res.is_ok() {
                log.record(started.elapsed());
            }
            res
        })
    }
}
