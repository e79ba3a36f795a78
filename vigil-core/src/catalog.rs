//! Names and descriptions of every exported instrument.
//!
//! The `fortio_` names are kept so existing dashboards keep working.

use vigil_metrics::MetricKind;

use crate::error::StartupError;
use crate::sink::{Instrument, MetricSink};

pub const LABEL_TEST_NAME: &str = "test_name";
pub const LABEL_STATUS_CODE: &str = "status_code";

pub const REQUEST_DURATION_AVG: &str = "fortio_request_duration_seconds_avg";
pub const REQUEST_DURATION_P50: &str = "fortio_request_duration_seconds_p50";
pub const REQUEST_DURATION_P90: &str = "fortio_request_duration_seconds_p90";
pub const REQUEST_DURATION_P99: &str = "fortio_request_duration_seconds_p99";
pub const CONNECTION_DURATION_AVG: &str = "fortio_connection_duration_seconds_avg";
pub const CONNECTION_DURATION_P50: &str = "fortio_connection_duration_seconds_p50";
pub const CONNECTION_DURATION_P90: &str = "fortio_connection_duration_seconds_p90";
pub const CONNECTION_DURATION_P99: &str = "fortio_connection_duration_seconds_p99";
pub const ACTUAL_QPS: &str = "fortio_actual_qps";
pub const REQUESTS_SUCCESS: &str = "fortio_requests_success";
pub const REQUESTS_FAILURE: &str = "fortio_requests_failure";
pub const HTTP_RESPONSE_CODE_COUNT: &str = "fortio_http_response_code_count";
pub const CONFIG_QPS: &str = "fortio_test_config_qps";
pub const CONFIG_CONCURRENCY: &str = "fortio_test_config_concurrency";
pub const CONFIG_DURATION_SECONDS: &str = "fortio_test_config_duration_seconds";
pub const CONFIG_JITTER: &str = "fortio_test_config_jitter";
pub const CONFIG_UNIFORM: &str = "fortio_test_config_uniform";
pub const TEST_RUNS_TOTAL: &str = "fortio_test_runs_total";
pub const TEST_FAILURES_TOTAL: &str = "fortio_test_failures_total";

const BY_TEST: &[&str] = &[LABEL_TEST_NAME];
const BY_TEST_AND_CODE: &[&str] = &[LABEL_TEST_NAME, LABEL_STATUS_CODE];

const fn gauge(name: &'static str, help: &'static str) -> Instrument {
    Instrument {
        name,
        help,
        kind: MetricKind::Gauge,
        labels: BY_TEST,
    }
}

const fn counter(name: &'static str, help: &'static str) -> Instrument {
    Instrument {
        name,
        help,
        kind: MetricKind::Counter,
        labels: BY_TEST,
    }
}

pub const INSTRUMENTS: &[Instrument] = &[
    gauge(REQUEST_DURATION_AVG, "Average request latency in seconds in the last test run"),
    gauge(REQUEST_DURATION_P50, "50th percentile request latency in seconds in the last test run"),
    gauge(REQUEST_DURATION_P90, "90th percentile request latency in seconds in the last test run"),
    gauge(REQUEST_DURATION_P99, "99th percentile request latency in seconds in the last test run"),
    gauge(CONNECTION_DURATION_AVG, "Average connection setup time in seconds (TCP + TLS handshake)"),
    gauge(
        CONNECTION_DURATION_P50,
        "50th percentile connection setup time in seconds (TCP + TLS handshake)",
    ),
    gauge(
        CONNECTION_DURATION_P90,
        "90th percentile connection setup time in seconds (TCP + TLS handshake)",
    ),
    gauge(
        CONNECTION_DURATION_P99,
        "99th percentile connection setup time in seconds (TCP + TLS handshake)",
    ),
    gauge(ACTUAL_QPS, "Actual queries per second observed in the last test run"),
    gauge(REQUESTS_SUCCESS, "Number of successful requests in the last test run"),
    gauge(REQUESTS_FAILURE, "Number of failed requests in the last test run"),
    Instrument {
        name: HTTP_RESPONSE_CODE_COUNT,
        help: "Number of HTTP responses per status code in the last test run",
        kind: MetricKind::Gauge,
        labels: BY_TEST_AND_CODE,
    },
    gauge(CONFIG_QPS, "Configured QPS for the test"),
    gauge(CONFIG_CONCURRENCY, "Configured concurrency for the test"),
    gauge(CONFIG_DURATION_SECONDS, "Configured duration (seconds) for one test run"),
    gauge(CONFIG_JITTER, "Whether jitter is enabled for the test (1 = true)"),
    gauge(CONFIG_UNIFORM, "Whether uniform staggering is enabled for the test (1 = true)"),
    counter(TEST_RUNS_TOTAL, "Total number of test runs attempted"),
    counter(TEST_FAILURES_TOTAL, "Total number of test runs that failed to produce a result"),
];

/// Registers every instrument. Safe to call more than once.
pub fn register_all<S: MetricSink + ?Sized>(sink: &S) -> Result<(), StartupError> {
    for instrument in INSTRUMENTS {
        sink.register_instrument(instrument)?;
    }
    Ok(())
}
