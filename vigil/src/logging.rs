use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

const DEFAULT_LEVEL: &str = "info";

/// Maps a configured `log_level` onto a tracing level directive.
pub fn level_directive(raw: &str) -> anyhow::Result<&'static str> {
    let level = match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" | "verbose" => "debug",
        "info" => "info",
        "warn" | "warning" => "warn",
        "error" | "critical" | "fatal" => "error",
        _ => anyhow::bail!("invalid log_level '{raw}' (expected trace, debug, info, warn or error)"),
    };
    Ok(level)
}

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init(log_level: Option<&str>) -> anyhow::Result<()> {
    let fallback = match log_level {
        Some(raw) => level_directive(raw)?,
        None => DEFAULT_LEVEL,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()?;

    Ok(())
}
