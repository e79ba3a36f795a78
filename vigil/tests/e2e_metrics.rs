use std::io::Write as _;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use anyhow::Context as _;
use vigil_http::{HttpClient, HttpRequest};
use vigil_testserver::TestServer;

struct KillOnDrop(Child);

impl Drop for KillOnDrop {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn free_addr() -> anyhow::Result<String> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").context("bind free port")?;
    Ok(listener.local_addr().context("local addr")?.to_string())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn binary_serves_per_target_metrics() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;

    let mut cfg = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .context("create temp config")?;
    write!(
        cfg,
        "duration: 200ms\nlog_level: warn\ntests:\n  - name: hello\n    url: {}\n    qps: 50\n    concurrency: 2\n    jitter: true\n",
        server.urls().hello
    )
    .context("write temp config")?;

    let addr = free_addr()?;
    let child = Command::new(env!("CARGO_BIN_EXE_vigil"))
        .arg("--config")
        .arg(cfg.path())
        .arg("--metrics-addr")
        .arg(&addr)
        .arg("--metrics-path")
        .arg("/stats")
        .arg("--cors-origins")
        .arg("https://a.example")
        .env_remove("RUST_LOG")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("spawn vigil")?;
    let _child = KillOnDrop(child);

    let client = HttpClient::default();
    let req = HttpRequest::get(&format!("http://{addr}/stats"))?
        .with_header(
            http::header::ORIGIN,
            http::HeaderValue::from_static("https://a.example"),
        )
        .with_timeout(Duration::from_secs(2));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(15);
    let res = loop {
        anyhow::ensure!(
            tokio::time::Instant::now() < deadline,
            "metrics never showed a completed cycle"
        );
        if let Ok(res) = client.request(&req).await {
            let ready = res
                .body_utf8()
                .is_some_and(|b| b.contains("fortio_requests_success{test_name=\"hello\"}"));
            if ready {
                break res;
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    };

    anyhow::ensure!(res.status == 200);
    anyhow::ensure!(res.header("access-control-allow-origin") == Some("https://a.example"));

    let body = res.body_utf8().unwrap_or_default();
    for needle in [
        "fortio_test_config_qps{test_name=\"hello\"} 50",
        "fortio_test_config_concurrency{test_name=\"hello\"} 2",
        "fortio_test_config_duration_seconds{test_name=\"hello\"} 0.2",
        "fortio_test_config_jitter{test_name=\"hello\"} 1",
        "fortio_test_config_uniform{test_name=\"hello\"} 0",
        "fortio_http_response_code_count{status_code=\"200\",test_name=\"hello\"}",
        "# TYPE fortio_test_runs_total counter",
    ] {
        anyhow::ensure!(body.contains(needle), "missing `{needle}` in:\n{body}");
    }
    anyhow::ensure!(server.stats().requests_total() > 0);

    server.shutdown().await;
    Ok(())
}
