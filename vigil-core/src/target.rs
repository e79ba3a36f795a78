use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use http::header::{HeaderName, HeaderValue};
use vigil_http::HttpRequest;

use crate::error::{CycleError, StartupError};

/// One configured load-test target, as read from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSpec {
    pub name: String,
    pub url: String,
    /// Requests per second across all workers. `0` runs unpaced.
    pub qps: f64,
    pub concurrency: u32,
    /// Per-target cycle duration; falls back to the global duration when unset.
    pub duration: Option<Duration>,
    pub headers: BTreeMap<String, String>,
    pub jitter: bool,
    pub uniform: bool,
}

impl TargetSpec {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            qps: 0.0,
            concurrency: 1,
            duration: None,
            headers: BTreeMap::new(),
            jitter: false,
            uniform: false,
        }
    }
}

/// Execution parameters of one target, resolved once before its supervisor
/// starts and then reused unchanged for every cycle.
#[derive(Debug, Clone)]
pub struct CyclePlan {
    pub target: Arc<str>,
    pub url: String,
    pub qps: f64,
    pub concurrency: u32,
    pub duration: Duration,
    pub jitter: bool,
    pub uniform: bool,
    pub headers: Vec<(HeaderName, HeaderValue)>,
    /// Value of a configured `Host` header. Sent as the request authority while
    /// the connection still goes to the URL's host.
    pub host_override: Option<String>,
}

impl CyclePlan {
    pub fn resolve(spec: &TargetSpec, global_duration: Option<Duration>) -> Result<Self, StartupError> {
        if !spec.qps.is_finite() || spec.qps < 0.0 {
            return Err(StartupError::InvalidQps {
                name: spec.name.clone(),
                qps: spec.qps,
            });
        }
        if spec.concurrency == 0 {
            return Err(StartupError::InvalidConcurrency(spec.name.clone()));
        }

        let duration = spec
            .duration
            .or(global_duration)
            .ok_or_else(|| StartupError::MissingDuration(spec.name.clone()))?;
        if duration.is_zero() {
            return Err(StartupError::ZeroDuration(spec.name.clone()));
        }

        let mut headers = Vec::with_capacity(spec.headers.len());
        let mut host_override = None;
        for (name, value) in &spec.headers {
            let Ok(parsed_value) = HeaderValue::from_str(value) else {
                tracing::warn!(target_name = %spec.name, header = %name, "skipping header with invalid value");
                continue;
            };

            if name.eq_ignore_ascii_case("host") {
                host_override = Some(value.clone());
                continue;
            }

            match HeaderName::from_bytes(name.as_bytes()) {
                Ok(parsed_name) => headers.push((parsed_name, parsed_value)),
                Err(_) => {
                    tracing::warn!(target_name = %spec.name, header = %name, "skipping header with invalid name");
                }
            }
        }

        Ok(Self {
            target: Arc::from(spec.name.as_str()),
            url: spec.url.clone(),
            qps: spec.qps,
            concurrency: spec.concurrency,
            duration,
            jitter: spec.jitter,
            uniform: spec.uniform,
            headers,
            host_override,
        })
    }

    /// The `GET` request every cycle of this target sends.
    pub fn http_request(&self) -> Result<HttpRequest, CycleError> {
        let mut request = HttpRequest::get(&self.url)?;
        for (name, value) in &self.headers {
            request = request.with_header(name.clone(), value.clone());
        }
        if let Some(host) = &self.host_override {
            request = request.with_host(host)?;
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> TargetSpec {
        TargetSpec::new("api", "http://127.0.0.1:8080/")
    }

    #[test]
    fn target_duration_overrides_global() {
        let mut s = spec();
        s.duration = Some(Duration::from_secs(5));

        let plan = CyclePlan::resolve(&s, Some(Duration::from_secs(60)))
            .unwrap_or_else(|e| panic!("resolve: {e}"));
        assert_eq!(plan.duration, Duration::from_secs(5));

        let plan = CyclePlan::resolve(&spec(), Some(Duration::from_secs(60)))
            .unwrap_or_else(|e| panic!("resolve: {e}"));
        assert_eq!(plan.duration, Duration::from_secs(60));
    }

    #[test]
    fn missing_or_zero_duration_is_rejected() {
        assert!(matches!(
            CyclePlan::resolve(&spec(), None),
            Err(StartupError::MissingDuration(name)) if name == "api"
        ));
        assert!(matches!(
            CyclePlan::resolve(&spec(), Some(Duration::ZERO)),
            Err(StartupError::ZeroDuration(_))
        ));
    }

    #[test]
    fn invalid_rate_and_concurrency_are_rejected() {
        let mut s = spec();
        s.qps = -1.0;
        assert!(matches!(
            CyclePlan::resolve(&s, Some(Duration::from_secs(1))),
            Err(StartupError::InvalidQps { .. })
        ));

        let mut s = spec();
        s.qps = f64::NAN;
        assert!(matches!(
            CyclePlan::resolve(&s, Some(Duration::from_secs(1))),
            Err(StartupError::InvalidQps { .. })
        ));

        let mut s = spec();
        s.concurrency = 0;
        assert!(matches!(
            CyclePlan::resolve(&s, Some(Duration::from_secs(1))),
            Err(StartupError::InvalidConcurrency(_))
        ));
    }

    #[test]
    fn host_header_becomes_override_and_bad_headers_are_skipped() {
        let mut s = spec();
        s.headers.insert("HoSt".to_string(), "api.internal".to_string());
        s.headers.insert("X-Token".to_string(), "abc".to_string());
        s.headers.insert("bad header".to_string(), "x".to_string());
        s.headers.insert("X-Bad-Value".to_string(), "a\nb".to_string());

        let plan = CyclePlan::resolve(&s, Some(Duration::from_secs(1)))
            .unwrap_or_else(|e| panic!("resolve: {e}"));

        assert_eq!(plan.host_override.as_deref(), Some("api.internal"));
        assert_eq!(plan.headers.len(), 1);
        assert_eq!(plan.headers[0].0.as_str(), "x-token");
        assert_eq!(plan.headers[0].1, "abc");
    }
}
