use std::collections::BTreeSet;
use std::sync::Arc;

use crate::catalog::{self, LABEL_STATUS_CODE, LABEL_TEST_NAME};
use crate::cycle::{CycleExecutor, CycleResult, DistributionSummary};
use crate::sink::MetricSink;
use crate::target::CyclePlan;

/// Drives the endless cycle loop of one target and keeps its series current.
///
/// A supervisor is the only writer of its `test_name` label value.
pub(crate) struct TestSupervisor<E, S> {
    plan: CyclePlan,
    executor: Arc<E>,
    sink: Arc<S>,
    // status codes ever published for this target
    published_codes: BTreeSet<u16>,
}

impl<E, S> TestSupervisor<E, S>
where
    E: CycleExecutor,
    S: MetricSink,
{
    pub(crate) fn new(plan: CyclePlan, executor: Arc<E>, sink: Arc<S>) -> Self {
        Self {
            plan,
            executor,
            sink,
            published_codes: BTreeSet::new(),
        }
    }

    /// Publishes the configuration gauges. These never change afterwards.
    pub(crate) fn publish_static(&self) {
        let labels = [(LABEL_TEST_NAME, &*self.plan.target)];
        let sink = &*self.sink;

        sink.set_gauge(catalog::CONFIG_QPS, &labels, self.plan.qps);
        sink.set_gauge(
            catalog::CONFIG_CONCURRENCY,
            &labels,
            f64::from(self.plan.concurrency),
        );
        sink.set_gauge(
            catalog::CONFIG_DURATION_SECONDS,
            &labels,
            self.plan.duration.as_secs_f64(),
        );
        sink.set_gauge(catalog::CONFIG_JITTER, &labels, flag(self.plan.jitter));
        sink.set_gauge(catalog::CONFIG_UNIFORM, &labels, flag(self.plan.uniform));
    }

    pub(crate) async fn run(mut self) {
        tracing::info!(
            url = %self.plan.url,
            qps = self.plan.qps,
            concurrency = self.plan.concurrency,
            duration = ?self.plan.duration,
            "starting test loop"
        );

        loop {
            if !self.run_once().await {
                // Let other targets run even if this executor fails without awaiting.
                tokio::task::yield_now().await;
            }
        }
    }

    /// Runs one cycle and publishes its outcome. Returns whether the cycle succeeded.
    pub(crate) async fn run_once(&mut self) -> bool {
        self.sink.add_counter(
            catalog::TEST_RUNS_TOTAL,
            &[(LABEL_TEST_NAME, &*self.plan.target)],
            1,
        );

        match self.executor.run_cycle(&self.plan).await {
            Ok(result) => {
                tracing::debug!(
                    success = result.success,
                    failure = result.failure,
                    actual_qps = result.actual_qps,
                    p99 = result.latency.p99,
                    "test cycle completed"
                );
                self.publish_result(&result);
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "test cycle failed");
                self.sink.add_counter(
                    catalog::TEST_FAILURES_TOTAL,
                    &[(LABEL_TEST_NAME, &*self.plan.target)],
                    1,
                );
                false
            }
        }
    }

    fn publish_result(&mut self, result: &CycleResult) {
        let name = &*self.plan.target;
        let labels = [(LABEL_TEST_NAME, name)];
        let sink = &*self.sink;

        publish_summary(
            sink,
            &labels,
            [
                catalog::REQUEST_DURATION_AVG,
                catalog::REQUEST_DURATION_P50,
                catalog::REQUEST_DURATION_P90,
                catalog::REQUEST_DURATION_P99,
            ],
            &result.latency,
        );
        if let Some(connection) = &result.connection {
            publish_summary(
                sink,
                &labels,
                [
                    catalog::CONNECTION_DURATION_AVG,
                    catalog::CONNECTION_DURATION_P50,
                    catalog::CONNECTION_DURATION_P90,
                    catalog::CONNECTION_DURATION_P99,
                ],
                connection,
            );
        }

        sink.set_gauge(catalog::ACTUAL_QPS, &labels, result.actual_qps);
        sink.set_gauge(catalog::REQUESTS_SUCCESS, &labels, result.success as f64);
        sink.set_gauge(catalog::REQUESTS_FAILURE, &labels, result.failure as f64);

        for (code, count) in &result.status_codes {
            let code = code.to_string();
            sink.set_gauge(
                catalog::HTTP_RESPONSE_CODE_COUNT,
                &[(LABEL_TEST_NAME, name), (LABEL_STATUS_CODE, &code)],
                *count as f64,
            );
        }

        // Codes seen in earlier cycles but not in this one drop to zero.
        for code in &self.published_codes {
            if result.status_codes.contains_key(code) {
                continue;
            }
            let code = code.to_string();
            sink.set_gauge(
                catalog::HTTP_RESPONSE_CODE_COUNT,
                &[(LABEL_TEST_NAME, name), (LABEL_STATUS_CODE, &code)],
                0.0,
            );
        }
        self.published_codes.extend(result.status_codes.keys().copied());
    }
}

fn publish_summary<S: MetricSink>(
    sink: &S,
    labels: &[(&str, &str)],
    names: [&str; 4],
    summary: &DistributionSummary,
) {
    let [avg, p50, p90, p99] = names;
    sink.set_gauge(avg, labels, summary.avg);
    sink.set_gauge(p50, labels, summary.p50);
    sink.set_gauge(p90, labels, summary.p90);
    sink.set_gauge(p99, labels, summary.p99);
}

fn flag(v: bool) -> f64 {
    if v { 1.0 } else { 0.0 }
}
