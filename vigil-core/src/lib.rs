pub mod catalog;

mod cycle;
mod engine;
mod error;
mod orchestrator;
mod sink;
mod supervisor;
mod target;

pub use cycle::{CycleExecutor, CycleResult, DistributionSummary};
pub use engine::HttpCycleEngine;
pub use error::{CycleError, StartupError};
pub use orchestrator::{Orchestrator, RunningTargets, shutdown_signal};
pub use sink::{Instrument, MetricSink};
pub use target::{CyclePlan, TargetSpec};
