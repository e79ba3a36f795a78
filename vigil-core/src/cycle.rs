use std::collections::BTreeMap;
use std::future::Future;

use hdrhistogram::Histogram;

use crate::error::CycleError;
use crate::target::CyclePlan;

/// Average and selected percentiles of a distribution, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DistributionSummary {
    pub count: u64,
    pub avg: f64,
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
}

impl DistributionSummary {
    /// Summarizes a histogram of microsecond samples.
    pub fn from_micros(h: &Histogram<u64>) -> Self {
        if h.is_empty() {
            return Self::default();
        }

        let secs = |us: u64| us as f64 / 1_000_000.0;
        Self {
            count: h.len(),
            avg: h.mean() / 1_000_000.0,
            p50: secs(h.value_at_quantile(0.50)),
            p90: secs(h.value_at_quantile(0.90)),
            p99: secs(h.value_at_quantile(0.99)),
        }
    }
}

/// Outcome of one completed test cycle. Counts are scoped to the cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleResult {
    pub latency: DistributionSummary,
    /// `None` when the engine did not observe any connection setup.
    pub connection: Option<DistributionSummary>,
    pub actual_qps: f64,
    pub success: u64,
    pub failure: u64,
    pub status_codes: BTreeMap<u16, u64>,
}

/// Runs one bounded-duration load test against a target.
pub trait CycleExecutor: Send + Sync + 'static {
    fn run_cycle(
        &self,
        plan: &CyclePlan,
    ) -> impl Future<Output = Result<CycleResult, CycleError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_histogram_summarizes_to_zero() {
        let h = Histogram::<u64>::new(3).unwrap_or_else(|e| panic!("histogram: {e}"));
        assert_eq!(DistributionSummary::from_micros(&h), DistributionSummary::default());
    }

    #[test]
    fn summary_is_reported_in_seconds() {
        let mut h = Histogram::<u64>::new_with_bounds(1, 60_000_000, 3)
            .unwrap_or_else(|e| panic!("histogram: {e}"));
        for _ in 0..100 {
            h.record(250_000).unwrap_or_else(|e| panic!("record: {e}"));
        }

        let s = DistributionSummary::from_micros(&h);
        assert_eq!(s.count, 100);
        assert!((s.avg - 0.25).abs() < 0.001, "avg={}", s.avg);
        assert!((s.p50 - 0.25).abs() < 0.001, "p50={}", s.p50);
        assert!((s.p99 - 0.25).abs() < 0.001, "p99={}", s.p99);
    }
}
