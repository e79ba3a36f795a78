pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("metric `{name}` is already registered as a {existing}")]
    KindMismatch {
        name: String,
        existing: crate::MetricKind,
    },

    #[error("metric `{name}` is already registered with labels {existing:?}")]
    LabelMismatch { name: String, existing: Vec<String> },

    #[error("metric `{0}` is not registered")]
    Unknown(String),

    #[error(transparent)]
    Prometheus(#[from] prometheus::Error),
}
