use std::collections::HashMap;
use std::fmt;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use prometheus::core::Collector as _;
use prometheus::proto::{self, MetricFamily};
use prometheus::{Gauge, GaugeVec, IntCounter, IntCounterVec, Opts};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum MetricKind {
    /// Monotonically increasing integer.
    Counter,
    /// Last written value wins.
    Gauge,
}

enum Family {
    Gauge(GaugeVec),
    Counter(IntCounterVec),
}

impl Family {
    fn kind(&self) -> MetricKind {
        match self {
            Self::Gauge(_) => MetricKind::Gauge,
            Self::Counter(_) => MetricKind::Counter,
        }
    }
}

struct Registered {
    family: Family,
    // sorted
    labels: Vec<String>,
}

/// A [`prometheus::Registry`] whose vectors can be looked up by metric name.
///
/// Every metric declares its label names up front; a series is created the
/// first time [`Registry::gauge`] or [`Registry::counter`] is called for a
/// concrete set of label values.
pub struct Registry {
    inner: prometheus::Registry,
    families: DashMap<String, Registered>,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            inner: prometheus::Registry::new(),
            families: DashMap::new(),
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("families", &self.families.len())
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// Registers a metric. Registering the same name again with the same kind
    /// and label names is a no-op.
    pub fn register(
        &self,
        name: &str,
        help: &str,
        kind: MetricKind,
        label_names: &[&str],
    ) -> Result<()> {
        let mut labels: Vec<String> = label_names.iter().map(|l| (*l).to_string()).collect();
        labels.sort_unstable();
        labels.dedup();

        match self.families.entry(name.to_string()) {
            Entry::Occupied(existing) => {
                let existing = existing.get();
                if existing.family.kind() != kind {
                    return Err(Error::KindMismatch {
                        name: name.to_string(),
                        existing: existing.family.kind(),
                    });
                }
                if existing.labels != labels {
                    return Err(Error::LabelMismatch {
                        name: name.to_string(),
                        existing: existing.labels.clone(),
                    });
                }
                Ok(())
            }
            Entry::Vacant(slot) => {
                let opts = Opts::new(name, help);
                let family = match kind {
                    MetricKind::Gauge => {
                        let vec = GaugeVec::new(opts, label_names)?;
                        self.inner.register(Box::new(vec.clone()))?;
                        Family::Gauge(vec)
                    }
                    MetricKind::Counter => {
                        let vec = IntCounterVec::new(opts, label_names)?;
                        self.inner.register(Box::new(vec.clone()))?;
                        Family::Counter(vec)
                    }
                };
                slot.insert(Registered { family, labels });
                Ok(())
            }
        }
    }

    /// Gauge series for `labels`, created on first use.
    ///
    /// `labels` must name exactly the label set the metric was registered with.
    pub fn gauge(&self, name: &str, labels: &[(&str, &str)]) -> Result<Gauge> {
        let registered = self
            .families
            .get(name)
            .ok_or_else(|| Error::Unknown(name.to_string()))?;
        match &registered.family {
            Family::Gauge(vec) => Ok(vec.get_metric_with(&label_map(labels))?),
            other => Err(Error::KindMismatch {
                name: name.to_string(),
                existing: other.kind(),
            }),
        }
    }

    /// Counter series for `labels`, created on first use.
    pub fn counter(&self, name: &str, labels: &[(&str, &str)]) -> Result<IntCounter> {
        let registered = self
            .families
            .get(name)
            .ok_or_else(|| Error::Unknown(name.to_string()))?;
        match &registered.family {
            Family::Counter(vec) => Ok(vec.get_metric_with(&label_map(labels))?),
            other => Err(Error::KindMismatch {
                name: name.to_string(),
                existing: other.kind(),
            }),
        }
    }

    /// Current value of one gauge series. Never creates the series.
    pub fn read_gauge(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        let registered = self.families.get(name)?;
        let Family::Gauge(vec) = &registered.family else {
            return None;
        };
        find_series(&vec.collect(), labels).map(|m| m.gauge.value())
    }

    /// Current value of one counter series. Never creates the series.
    pub fn read_counter(&self, name: &str, labels: &[(&str, &str)]) -> Option<u64> {
        let registered = self.families.get(name)?;
        let Family::Counter(vec) = &registered.family else {
            return None;
        };
        find_series(&vec.collect(), labels).map(|m| m.counter.value() as u64)
    }

    /// Snapshot of every family that has at least one series, ready for
    /// [`prometheus::TextEncoder`].
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.inner.gather()
    }
}

fn label_map<'a>(labels: &[(&'a str, &'a str)]) -> HashMap<&'a str, &'a str> {
    labels.iter().copied().collect()
}

fn find_series<'a>(families: &'a [MetricFamily], labels: &[(&str, &str)]) -> Option<&'a proto::Metric> {
    families.iter().flat_map(|f| f.metric.iter()).find(|m| {
        m.label.len() == labels.len()
            && labels
                .iter()
                .all(|(k, v)| m.label.iter().any(|p| p.name() == *k && p.value() == *v))
    })
}

#[cfg(test)]
mod tests {
    use prometheus::{Encoder as _, TextEncoder};

    use super::*;

    fn registry_with_gauge() -> Registry {
        let reg = Registry::default();
        reg.register("latency_avg", "Average latency", MetricKind::Gauge, &["test_name"])
            .unwrap_or_else(|err| panic!("register failed: {err}"));
        reg
    }

    fn render(reg: &Registry) -> String {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&reg.gather(), &mut buf)
            .unwrap_or_else(|err| panic!("encode failed: {err}"));
        String::from_utf8_lossy(&buf).into_owned()
    }

    #[test]
    fn register_is_idempotent_for_identical_definitions() {
        let reg = registry_with_gauge();
        assert!(
            reg.register("latency_avg", "Average latency", MetricKind::Gauge, &["test_name"])
                .is_ok()
        );
    }

    #[test]
    fn register_rejects_conflicting_definitions() {
        let reg = registry_with_gauge();
        assert!(matches!(
            reg.register("latency_avg", "", MetricKind::Counter, &["test_name"]),
            Err(Error::KindMismatch { .. })
        ));
        assert!(matches!(
            reg.register("latency_avg", "", MetricKind::Gauge, &["other"]),
            Err(Error::LabelMismatch { .. })
        ));
        assert!(matches!(
            reg.register("9bad", "Bad", MetricKind::Gauge, &[]),
            Err(Error::Prometheus(_))
        ));
        assert!(matches!(
            reg.register("ok_name", "Ok", MetricKind::Gauge, &["bad-label"]),
            Err(Error::Prometheus(_))
        ));
    }

    #[test]
    fn series_require_exact_label_names() {
        let reg = registry_with_gauge();
        assert!(reg.gauge("latency_avg", &[("test_name", "a")]).is_ok());
        assert!(reg.gauge("latency_avg", &[]).is_err());
        assert!(reg.gauge("latency_avg", &[("other", "a")]).is_err());
        assert!(
            reg.gauge("latency_avg", &[("test_name", "a"), ("status_code", "200")])
                .is_err()
        );
        assert!(matches!(
            reg.counter("latency_avg", &[("test_name", "a")]),
            Err(Error::KindMismatch { .. })
        ));
        assert!(matches!(reg.gauge("nope", &[]), Err(Error::Unknown(_))));
    }

    #[test]
    fn series_are_independent_per_label_value() {
        let reg = registry_with_gauge();
        reg.gauge("latency_avg", &[("test_name", "a")])
            .unwrap_or_else(|err| panic!("series a: {err}"))
            .set(1.5);
        reg.gauge("latency_avg", &[("test_name", "b")])
            .unwrap_or_else(|err| panic!("series b: {err}"))
            .set(7.0);

        assert_eq!(reg.read_gauge("latency_avg", &[("test_name", "a")]), Some(1.5));
        assert_eq!(reg.read_gauge("latency_avg", &[("test_name", "b")]), Some(7.0));
        assert_eq!(reg.read_gauge("latency_avg", &[("test_name", "c")]), None);
        assert_eq!(reg.read_counter("latency_avg", &[("test_name", "a")]), None);
    }

    #[test]
    fn reads_do_not_create_series() {
        let reg = registry_with_gauge();
        assert_eq!(reg.read_gauge("latency_avg", &[("test_name", "a")]), None);
        assert!(reg.gather().is_empty());
    }

    #[test]
    fn text_output_sorts_labels_and_escapes_values() {
        let reg = Registry::default();
        reg.register(
            "code_count",
            "Responses per code",
            MetricKind::Gauge,
            &["test_name", "status_code"],
        )
        .unwrap_or_else(|err| panic!("register failed: {err}"));
        reg.register("runs_total", "Runs", MetricKind::Counter, &["test_name"])
            .unwrap_or_else(|err| panic!("register failed: {err}"));

        reg.gauge("code_count", &[("status_code", "503"), ("test_name", "a\"b")])
            .unwrap_or_else(|err| panic!("series: {err}"))
            .set(2.0);
        reg.counter("runs_total", &[("test_name", "a")])
            .unwrap_or_else(|err| panic!("series: {err}"))
            .inc_by(3);

        let text = render(&reg);
        assert!(text.contains("# TYPE code_count gauge"), "{text}");
        assert!(
            text.contains("code_count{status_code=\"503\",test_name=\"a\\\"b\"} 2"),
            "{text}"
        );
        assert!(text.contains("# HELP runs_total Runs"), "{text}");
        assert!(text.contains("runs_total{test_name=\"a\"} 3"), "{text}");
        assert_eq!(reg.read_counter("runs_total", &[("test_name", "a")]), Some(3));
    }
}
