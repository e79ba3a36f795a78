use vigil_metrics::{MetricKind, Registry};

/// Static description of one metric instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instrument {
    pub name: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
    pub labels: &'static [&'static str],
}

/// Where supervisors publish their results.
///
/// Labels are `(name, value)` pairs and must name exactly the label set the
/// instrument was registered with. Writes to unknown series are dropped.
pub trait MetricSink: Send + Sync + 'static {
    fn register_instrument(&self, instrument: &Instrument) -> vigil_metrics::Result<()>;

    fn set_gauge(&self, name: &str, labels: &[(&str, &str)], value: f64);

    fn add_counter(&self, name: &str, labels: &[(&str, &str)], delta: u64);
}

impl MetricSink for Registry {
    fn register_instrument(&self, instrument: &Instrument) -> vigil_metrics::Result<()> {
        self.register(instrument.name, instrument.help, instrument.kind, instrument.labels)
    }

    fn set_gauge(&self, name: &str, labels: &[(&str, &str)], value: f64) {
        match self.gauge(name, labels) {
            Ok(gauge) => gauge.set(value),
            Err(err) => tracing::warn!(metric = name, error = %err, "dropping gauge write"),
        }
    }

    fn add_counter(&self, name: &str, labels: &[(&str, &str)], delta: u64) {
        match self.counter(name, labels) {
            Ok(counter) => counter.inc_by(delta),
            Err(err) => tracing::warn!(metric = name, error = %err, "dropping counter write"),
        }
    }
}
