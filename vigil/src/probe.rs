use std::time::Duration;

use tracing::{info, warn};
use vigil_core::CyclePlan;
use vigil_http::{ClientOptions, HttpClient, HttpResponse};

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const BODY_PREVIEW_BYTES: usize = 1024;

/// Sends one request per target and logs what came back. Never fails.
pub async fn run(plans: &[CyclePlan]) {
    info!(targets = plans.len(), "checking targets before the first cycle");
    let client = HttpClient::new(ClientOptions {
        max_idle_per_host: 0,
        ..ClientOptions::default()
    });

    for plan in plans {
        let request = match plan.http_request() {
            Ok(req) => req.with_timeout(PROBE_TIMEOUT),
            Err(err) => {
                warn!(target_name = %plan.target, url = %plan.url, error = %err, "startup probe skipped");
                continue;
            }
        };

        match client.request(&request).await {
            Ok(res) => log_response(plan, &res),
            Err(err) => {
                warn!(target_name = %plan.target, url = %plan.url, error = %err, "startup probe failed");
            }
        }
    }
}

fn log_response(plan: &CyclePlan, res: &HttpResponse) {
    info!(target_name = %plan.target, url = %plan.url, status = res.status, "startup probe response");
    for (name, value) in &res.headers {
        info!(target_name = %plan.target, header = %name, value = %value, "startup probe header");
    }
    info!(target_name = %plan.target, body = %body_preview(&res.body), "startup probe body");
}

fn body_preview(body: &[u8]) -> String {
    let end = body.len().min(BODY_PREVIEW_BYTES);
    let mut preview = String::from_utf8_lossy(&body[..end]).into_owned();
    if body.len() > end {
        preview.push_str(&format!("... ({} bytes total)", body.len()));
    }
    preview
}
