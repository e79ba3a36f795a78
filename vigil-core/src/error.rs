use std::time::Duration;

/// Configuration problems detected before any target starts. All of them are fatal.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("no test targets configured (`tests` is empty)")]
    NoTargets,

    #[error("test target #{index} has an empty `name`")]
    BlankName { index: usize },

    #[error("duplicate test target name `{0}`")]
    DuplicateTarget(String),

    #[error("test target `{0}` has no duration (set `duration` on the target or at the top level)")]
    MissingDuration(String),

    #[error("test target `{0}`: `duration` must be greater than zero")]
    ZeroDuration(String),

    #[error("test target `{0}`: `concurrency` must be a positive integer")]
    InvalidConcurrency(String),

    #[error("test target `{name}`: `qps` must be a finite number >= 0 (got {qps})")]
    InvalidQps { name: String, qps: f64 },

    #[error("failed to register metric instruments: {0}")]
    Metrics(#[from] vigil_metrics::Error),
}

/// Why a single test cycle produced no result.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("unsupported url scheme (expected http or https): {0}")]
    UnsupportedScheme(String),

    #[error("no request completed within {duration:?} ({attempted} attempted, last error: {last_error})")]
    NoRequestsCompleted {
        duration: Duration,
        attempted: u64,
        last_error: String,
    },

    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("load engine error: {0}")]
    Engine(String),
}

impl From<vigil_http::Error> for CycleError {
    fn from(err: vigil_http::Error) -> Self {
        match err {
            vigil_http::Error::InvalidUrl(url) => Self::InvalidUrl(url),
            vigil_http::Error::UnsupportedScheme(url) => Self::UnsupportedScheme(url),
            other => Self::Engine(other.to_string()),
        }
    }
}
