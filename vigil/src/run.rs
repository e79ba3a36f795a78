use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Context as _;
use tokio::net::TcpListener;
use tracing::info;
use vigil_core::{HttpCycleEngine, Orchestrator, shutdown_signal};
use vigil_metrics::Registry;

use crate::cli::Cli;
use crate::exit_codes::ExitCode;
use crate::exposition::{self, AllowedOrigins};
use crate::run_error::RunError;
use crate::{config, logging, probe};

pub async fn run(cli: Cli) -> Result<ExitCode, RunError> {
    let cfg = config::load(&cli.config)
        .await
        .map_err(RunError::invalid_input)?;
    logging::init(cfg.log_level.as_deref())
        .context("failed to initialize logging")
        .map_err(RunError::invalid_input)?;

    let registry = Arc::new(Registry::default());
    let orchestrator = Orchestrator::new(
        cfg.target_specs(),
        cfg.global_duration(),
        Arc::new(HttpCycleEngine::default()),
        registry.clone(),
    )
    .with_context(|| format!("invalid config: {}", cli.config.display()))
    .map_err(RunError::invalid_input)?;

    let listener = TcpListener::bind(cli.metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics endpoint: {}", cli.metrics_addr))
        .map_err(RunError::runtime)?;
    let addr = listener
        .local_addr()
        .context("failed to resolve metrics address")
        .map_err(RunError::runtime)?;

    let interrupt = shutdown_signal();
    tokio::pin!(interrupt);

    if !cli.no_probe {
        let checked = unless_interrupted(probe::run(orchestrator.plans()), interrupt.as_mut())
            .await
            .context("failed to listen for interrupt")
            .map_err(RunError::runtime)?;
        if checked.is_none() {
            info!("interrupt received before serving, exiting");
            return Ok(ExitCode::Success);
        }
    }

    let _running = orchestrator
        .start()
        .context("failed to start test loops")
        .map_err(RunError::runtime)?;

    let app = exposition::router(
        registry,
        &cli.metrics_path,
        AllowedOrigins::parse(&cli.cors_origins),
    );
    info!(%addr, path = %cli.metrics_path, "serving metrics");

    let served = unless_interrupted(axum::serve(listener, app).into_future(), interrupt.as_mut())
        .await
        .context("failed to listen for interrupt")
        .map_err(RunError::runtime)?;
    match served {
        Some(res) => {
            res.context("metrics server failed").map_err(RunError::runtime)?;
        }
        None => info!("interrupt received, exiting"),
    }
    Ok(ExitCode::Success)
}

/// Drives `work` to completion unless `interrupt` fires first, in which case
/// `work` is dropped and `Ok(None)` is returned.
async fn unless_interrupted<T, I>(
    work: impl Future<Output = T>,
    interrupt: Pin<&mut I>,
) -> std::io::Result<Option<T>>
where
    I: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        // Polled first so the signal handler is installed before `work` starts.
        biased;
        res = interrupt => res.map(|()| None),
        out = work => Ok(Some(out)),
    }
}
