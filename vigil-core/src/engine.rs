mod pacer;
mod stats;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use vigil_http::{ClientOptions, HttpClient, HttpRequest};

use crate::cycle::{CycleExecutor, CycleResult};
use crate::error::CycleError;
use crate::target::CyclePlan;

use pacer::{NextSend, Pacer};
use stats::CycleStats;

/// Lower bound for the per-request timeout near the end of a cycle.
const MIN_REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// HTTP load engine: `concurrency` workers issue `GET` requests against the
/// plan's URL until the cycle deadline.
///
/// Each cycle gets a fresh client so connection setup is measured per cycle.
#[derive(Debug, Clone, Default)]
pub struct HttpCycleEngine {
    client_options: ClientOptions,
}

impl HttpCycleEngine {
    pub fn new(client_options: ClientOptions) -> Self {
        Self { client_options }
    }
}

impl CycleExecutor for HttpCycleEngine {
    async fn run_cycle(&self, plan: &CyclePlan) -> Result<CycleResult, CycleError> {
        let request = plan.http_request()?;
        let client = Arc::new(HttpClient::new(ClientOptions {
            max_idle_per_host: plan.concurrency as usize,
            ..self.client_options
        }));

        let started = Instant::now();
        let deadline = started.checked_add(plan.duration).ok_or_else(|| {
            CycleError::Engine(format!("cycle duration {:?} is out of range", plan.duration))
        })?;

        let mut workers = Vec::with_capacity(plan.concurrency as usize);
        for worker in 0..plan.concurrency {
            let client = client.clone();
            let request = request.clone();
            let pacer = Pacer::new(plan, worker);
            workers.push(tokio::spawn(run_worker(client, request, pacer, deadline)));
        }

        let mut stats = CycleStats::new()?;
        for handle in workers {
            stats.merge(handle.await??)?;
        }
        let elapsed = started.elapsed();

        stats.finish(plan.duration, elapsed, &client.take_connect_times())
    }
}

async fn run_worker(
    client: Arc<HttpClient>,
    request: HttpRequest,
    pacer: Pacer,
    deadline: Instant,
) -> Result<CycleStats, CycleError> {
    let mut stats = CycleStats::new()?;

    let mut scheduled = match Instant::now().checked_add(pacer.start_offset()) {
        Some(at) if at < deadline => at,
        _ => return Ok(stats),
    };
    tokio::time::sleep_until(scheduled).await;

    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }

        let timeout = deadline
            .saturating_duration_since(now)
            .max(MIN_REQUEST_TIMEOUT);
        let req = request.clone().with_timeout(timeout);

        let sent = Instant::now();
        match client.request(&req).await {
            Ok(res) => stats.record_response(res.status, sent.elapsed()),
            Err(err) => {
                tracing::trace!(error = %err, "request failed");
                stats.record_error(&err);
            }
        }

        match pacer.next_after(scheduled) {
            NextSend::Now => scheduled = Instant::now(),
            NextSend::At(at) if at < deadline => {
                scheduled = at;
                tokio::time::sleep_until(at).await;
            }
            NextSend::At(_) | NextSend::Never => break,
        }
    }

    Ok(stats)
}
