use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::Instrument as _;

use crate::catalog;
use crate::cycle::CycleExecutor;
use crate::error::StartupError;
use crate::sink::MetricSink;
use crate::supervisor::TestSupervisor;
use crate::target::{CyclePlan, TargetSpec};

/// Validated set of targets, ready to be started.
///
/// Construction checks every target up front, so a configuration error is
/// reported before any metric is registered or any loop is spawned.
pub struct Orchestrator<E, S> {
    plans: Vec<CyclePlan>,
    executor: Arc<E>,
    sink: Arc<S>,
}

impl<E, S> Orchestrator<E, S>
where
    E: CycleExecutor,
    S: MetricSink,
{
    pub fn new(
        targets: Vec<TargetSpec>,
        global_duration: Option<Duration>,
        executor: Arc<E>,
        sink: Arc<S>,
    ) -> Result<Self, StartupError> {
        if targets.is_empty() {
            return Err(StartupError::NoTargets);
        }

        let mut seen: HashSet<&str> = HashSet::with_capacity(targets.len());
        let mut plans = Vec::with_capacity(targets.len());
        for (index, target) in targets.iter().enumerate() {
            if target.name.trim().is_empty() {
                return Err(StartupError::BlankName { index });
            }
            if !seen.insert(target.name.as_str()) {
                return Err(StartupError::DuplicateTarget(target.name.clone()));
            }
            plans.push(CyclePlan::resolve(target, global_duration)?);
        }

        Ok(Self {
            plans,
            executor,
            sink,
        })
    }

    pub fn plans(&self) -> &[CyclePlan] {
        &self.plans
    }

    /// Registers the instrument catalog, publishes each target's static
    /// configuration, then spawns one supervisor task per target.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> Result<RunningTargets, StartupError> {
        catalog::register_all(&*self.sink)?;

        let mut tasks = Vec::with_capacity(self.plans.len());
        for plan in self.plans {
            let span = tracing::info_span!("target", name = %plan.target);
            let supervisor = TestSupervisor::new(plan, self.executor.clone(), self.sink.clone());
            supervisor.publish_static();
            tasks.push(tokio::spawn(supervisor.run().instrument(span)));
        }

        tracing::info!(targets = tasks.len(), "test supervisors started");
        Ok(RunningTargets { tasks })
    }
}

/// Handles of the spawned supervisor loops. The loops never finish on their
/// own; dropping this value leaves them running.
#[derive(Debug)]
pub struct RunningTargets {
    tasks: Vec<JoinHandle<()>>,
}

impl RunningTargets {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn abort_all(self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Resolves when the process receives an interrupt (ctrl-c).
pub async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
