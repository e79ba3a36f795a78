pub mod error;
pub mod registry;

pub use error::{Error, Result};
pub use registry::{MetricKind, Registry};
