use std::collections::BTreeMap;
use std::time::Duration;

use hdrhistogram::Histogram;

use crate::cycle::{CycleResult, DistributionSummary};
use crate::error::CycleError;

// Track up to 60s in microseconds (with 3 sigfigs); longer samples saturate.
const MAX_TRACKED_US: u64 = 60_000_000;

fn new_histogram() -> Result<Histogram<u64>, CycleError> {
    Histogram::<u64>::new_with_bounds(1, MAX_TRACKED_US, 3)
        .map_err(|err| CycleError::Engine(format!("failed to init histogram: {err}")))
}

fn record_us(h: &mut Histogram<u64>, d: Duration) {
    let us = u64::try_from(d.as_micros()).unwrap_or(u64::MAX).max(1);
    h.saturating_record(us);
}

/// Samples collected by one worker over one cycle. Workers own their stats and
/// hand them back when they finish, so recording never contends.
#[derive(Debug)]
pub(crate) struct CycleStats {
    latency_us: Histogram<u64>,
    success: u64,
    failure: u64,
    status_codes: BTreeMap<u16, u64>,
    last_error: Option<String>,
}

impl CycleStats {
    pub(crate) fn new() -> Result<Self, CycleError> {
        Ok(Self {
            latency_us: new_histogram()?,
            success: 0,
            failure: 0,
            status_codes: BTreeMap::new(),
            last_error: None,
        })
    }

    /// A response arrived. Only 2xx counts as success.
    pub(crate) fn record_response(&mut self, status: u16, elapsed: Duration) {
        record_us(&mut self.latency_us, elapsed);
        *self.status_codes.entry(status).or_insert(0) += 1;
        if (200..300).contains(&status) {
            self.success += 1;
        } else {
            self.failure += 1;
        }
    }

    /// The request failed before a response arrived.
    pub(crate) fn record_error(&mut self, err: &vigil_http::Error) {
        self.failure += 1;
        self.last_error = Some(err.to_string());
    }

    pub(crate) fn merge(&mut self, other: CycleStats) -> Result<(), CycleError> {
        self.latency_us
            .add(&other.latency_us)
            .map_err(|err| CycleError::Engine(format!("failed to merge histograms: {err}")))?;
        self.success += other.success;
        self.failure += other.failure;
        for (code, count) in other.status_codes {
            *self.status_codes.entry(code).or_insert(0) += count;
        }
        if other.last_error.is_some() {
            self.last_error = other.last_error;
        }
        Ok(())
    }

    fn responses(&self) -> u64 {
        self.status_codes.values().sum()
    }

    /// Builds the cycle result. A cycle in which no request got a response is
    /// an error rather than an all-zero result.
    pub(crate) fn finish(
        self,
        planned: Duration,
        elapsed: Duration,
        connects: &[Duration],
    ) -> Result<CycleResult, CycleError> {
        let attempted = self.success + self.failure;
        if self.responses() == 0 {
            return Err(CycleError::NoRequestsCompleted {
                duration: planned,
                attempted,
                last_error: self
                    .last_error
                    .unwrap_or_else(|| "no request was sent".to_string()),
            });
        }

        let connection = if connects.is_empty() {
            None
        } else {
            let mut h = new_histogram()?;
            for d in connects {
                record_us(&mut h, *d);
            }
            Some(DistributionSummary::from_micros(&h))
        };

        let secs = elapsed.as_secs_f64();
        let actual_qps = if secs > 0.0 { attempted as f64 / secs } else { 0.0 };

        Ok(CycleResult {
            latency: DistributionSummary::from_micros(&self.latency_us),
            connection,
            actual_qps,
            success: self.success,
            failure: self.failure,
            status_codes: self.status_codes,
        })
    }
}
