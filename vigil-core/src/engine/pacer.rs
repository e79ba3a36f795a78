use std::time::Duration;

use rand::Rng as _;
use tokio::time::Instant;

use crate::target::CyclePlan;

/// Relative spread of a jittered pacing interval (±10%).
const JITTER_FRACTION: f64 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NextSend {
    Now,
    At(Instant),
    /// The next send would fall past any representable instant.
    Never,
}

/// Send schedule of one worker.
///
/// A paced worker targets `qps / concurrency` requests per second. Sends are
/// scheduled from the previous *scheduled* time rather than the time the
/// response arrived, so a worker that falls behind catches up.
#[derive(Debug, Clone)]
pub(crate) struct Pacer {
    period: Option<Duration>,
    start_offset: Duration,
    jitter: bool,
}

impl Pacer {
    pub(crate) fn new(plan: &CyclePlan, worker: u32) -> Self {
        let period = worker_period(plan.qps, plan.concurrency);
        let start_offset = match period {
            Some(period) if plan.uniform && plan.concurrency > 1 => period
                .mul_f64(f64::from(worker) / f64::from(plan.concurrency))
                .min(plan.duration),
            _ => Duration::ZERO,
        };

        Self {
            period,
            start_offset,
            jitter: plan.jitter,
        }
    }

    pub(crate) fn start_offset(&self) -> Duration {
        self.start_offset
    }

    pub(crate) fn next_after(&self, scheduled: Instant) -> NextSend {
        let Some(period) = self.period else {
            return NextSend::Now;
        };
        let period = if self.jitter { jittered(period) } else { period };
        match scheduled.checked_add(period) {
            Some(at) => NextSend::At(at),
            None => NextSend::Never,
        }
    }
}

fn worker_period(qps: f64, concurrency: u32) -> Option<Duration> {
    if !(qps.is_finite() && qps > 0.0) || concurrency == 0 {
        return None;
    }
    let per_worker = qps / f64::from(concurrency);
    // Rates too low to represent never send a second request within a cycle.
    Some(Duration::try_from_secs_f64(1.0 / per_worker).unwrap_or(Duration::MAX))
}

fn jittered(period: Duration) -> Duration {
    let factor = rand::rng().random_range((1.0 - JITTER_FRACTION)..=(1.0 + JITTER_FRACTION));
    Duration::try_from_secs_f64(period.as_secs_f64() * factor).unwrap_or(period)
}
