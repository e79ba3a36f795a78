use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

fn parse_metrics_path(input: &str) -> Result<String, String> {
    let s = input.trim();
    if !s.starts_with('/') {
        return Err(format!("metrics path '{s}' must start with '/'"));
    }
    Ok(s.to_string())
}

#[derive(Debug, Parser)]
#[command(
    name = "vigil",
    author,
    version,
    about = "Continuous HTTP load-test exporter",
    long_about = "vigil runs one bounded load test per configured target in an endless loop and publishes the latest results as Prometheus metrics.\n\nTargets are read from a YAML configuration file. Each target is labelled by its name (`test_name`).",
    after_help = "Examples:\n  vigil --config config.yaml\n  vigil --config config.yaml --metrics-addr 127.0.0.1:9090 --cors-origins https://grafana.example\n  VIGIL_CONFIG=/etc/vigil.yaml vigil --no-probe"
)]
pub struct Cli {
    /// Address the metrics endpoint listens on
    #[arg(long, env = "VIGIL_METRICS_ADDR", default_value = "0.0.0.0:9090")]
    pub metrics_addr: SocketAddr,

    /// Path the metrics are served under
    #[arg(long, env = "VIGIL_METRICS_PATH", default_value = "/metrics", value_parser = parse_metrics_path)]
    pub metrics_path: String,

    /// Path to the YAML configuration file
    #[arg(long, env = "VIGIL_CONFIG", default_value = "config.yaml")]
    pub config: PathBuf,

    /// Comma-separated origins allowed to read metrics cross-origin (`*` allows all)
    #[arg(long, env = "VIGIL_CORS_ORIGINS", default_value = "*")]
    pub cors_origins: String,

    /// Skip the one-off request per target made before the test loops start
    #[arg(long)]
    pub no_probe: bool,
}
