use std::sync::Arc;

use axum::Router;
use axum::extract::{Request, State};
use axum::http::header::{self, HeaderValue};
use axum::http::{Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use prometheus::{Encoder as _, TextEncoder};
use vigil_metrics::Registry;

const ALLOW_METHODS: &str = "GET, OPTIONS";
const ALLOW_HEADERS: &str = "Accept, Accept-Encoding, Authorization, Content-Type";

/// Origins allowed to read the metrics from a browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<HeaderValue>),
}

impl AllowedOrigins {
    /// Parses a comma-separated list. A `*` entry allows every origin.
    pub fn parse(raw: &str) -> Self {
        let mut list = Vec::new();
        for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if entry == "*" {
                return Self::Any;
            }
            match HeaderValue::from_str(entry) {
                Ok(v) => list.push(v),
                Err(_) => tracing::warn!(origin = entry, "ignoring invalid CORS origin"),
            }
        }
        Self::List(list)
    }

    fn allow_origin(&self, origin: Option<&HeaderValue>) -> Option<HeaderValue> {
        match self {
            Self::Any => Some(HeaderValue::from_static("*")),
            Self::List(list) => origin.filter(|o| list.contains(o)).cloned(),
        }
    }
}

pub fn router(registry: Arc<Registry>, path: &str, origins: AllowedOrigins) -> Router {
    Router::new()
        .route(path, get(metrics))
        .with_state(registry)
        .layer(middleware::from_fn_with_state(Arc::new(origins), cors))
}

async fn metrics(State(registry): State<Arc<Registry>>) -> Response {
    let encoder = TextEncoder::new();
    let mut body = Vec::new();
    match encoder.encode(&registry.gather(), &mut body) {
        Ok(()) => ([(header::CONTENT_TYPE, encoder.format_type().to_owned())], body).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response()
        }
    }
}

async fn cors(State(origins): State<Arc<AllowedOrigins>>, req: Request, next: Next) -> Response {
    let allow_origin = origins.allow_origin(req.headers().get(header::ORIGIN));

    let mut res = if req.method() == Method::OPTIONS {
        let mut res = StatusCode::NO_CONTENT.into_response();
        let headers = res.headers_mut();
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
        res
    } else {
        next.run(req).await
    };

    let headers = res.headers_mut();
    if let Some(origin) = allow_origin {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    }
    if matches!(*origins, AllowedOrigins::List(_)) {
        headers.append(header::VARY, HeaderValue::from_static("Origin"));
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use prometheus::Encoder as _;
    use tower::ServiceExt as _;
    use vigil_metrics::MetricKind;

    fn registry() -> Arc<Registry> {
        let registry = Arc::new(Registry::default());
        registry
            .register("target_up", "Target reachable", MetricKind::Gauge, &["test_name"])
            .unwrap_or_else(|err| panic!("register: {err}"));
        registry
            .gauge("target_up", &[("test_name", "api")])
            .unwrap_or_else(|err| panic!("series: {err}"))
            .set(1.0);
        registry
    }

    async fn send(app: Router, method: Method, origin: Option<&str>) -> Response {
        let mut builder = axum::http::Request::builder().method(method).uri("/metrics");
        if let Some(origin) = origin {
            builder = builder.header(header::ORIGIN, origin);
        }
        let req = builder
            .body(Body::empty())
            .unwrap_or_else(|e| panic!("build request: {e}"));
        match app.oneshot(req).await {
            Ok(res) => res,
            Err(err) => match err {},
        }
    }

    async fn body_text(res: Response) -> String {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap_or_else(|e| panic!("read body: {e}"));
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn list(origins: &str) -> Router {
        router(registry(), "/metrics", AllowedOrigins::parse(origins))
    }

    #[test]
    fn parse_origins() {
        assert_eq!(AllowedOrigins::parse("*"), AllowedOrigins::Any);
        assert_eq!(AllowedOrigins::parse(" https://a.example , *"), AllowedOrigins::Any);
        assert_eq!(
            AllowedOrigins::parse("https://a.example, ,https://b.example"),
            AllowedOrigins::List(vec![
                HeaderValue::from_static("https://a.example"),
                HeaderValue::from_static("https://b.example"),
            ])
        );
        assert_eq!(AllowedOrigins::parse(""), AllowedOrigins::List(Vec::new()));
    }

    #[tokio::test]
    async fn listed_origin_is_echoed() {
        let res = send(list("https://a.example"), Method::GET, Some("https://a.example")).await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&HeaderValue::from_static("https://a.example"))
        );
        assert_eq!(res.headers().get(header::VARY), Some(&HeaderValue::from_static("Origin")));
        assert_eq!(
            res.headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(|v| v == TextEncoder::new().format_type()),
            Some(true)
        );
        assert!(body_text(res).await.contains("target_up{test_name=\"api\"} 1"));
    }

    #[tokio::test]
    async fn unlisted_origin_gets_body_without_allow_origin() {
        let res = send(list("https://a.example"), Method::GET, Some("https://b.example")).await;

        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        assert_eq!(res.headers().get(header::VARY), Some(&HeaderValue::from_static("Origin")));
        assert!(body_text(res).await.contains("target_up"));
    }

    #[tokio::test]
    async fn wildcard_allows_any_origin() {
        let res = send(list("*"), Method::GET, Some("https://b.example")).await;

        assert_eq!(
            res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&HeaderValue::from_static("*"))
        );
        assert!(res.headers().get(header::VARY).is_none());

        let res = send(list("*"), Method::GET, None).await;
        assert_eq!(
            res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&HeaderValue::from_static("*"))
        );
    }

    #[tokio::test]
    async fn preflight_returns_no_content() {
        let res = send(list("https://a.example"), Method::OPTIONS, Some("https://a.example")).await;

        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            res.headers().get(header::ACCESS_CONTROL_ALLOW_METHODS),
            Some(&HeaderValue::from_static(ALLOW_METHODS))
        );
        assert_eq!(
            res.headers().get(header::ACCESS_CONTROL_ALLOW_HEADERS),
            Some(&HeaderValue::from_static(ALLOW_HEADERS))
        );
        assert_eq!(
            res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&HeaderValue::from_static("https://a.example"))
        );
        assert!(body_text(res).await.is_empty());
    }

    #[tokio::test]
    async fn custom_path_is_served() {
        let app = router(registry(), "/stats", AllowedOrigins::Any);
        let req = axum::http::Request::builder()
            .uri("/stats")
            .body(Body::empty())
            .unwrap_or_else(|e| panic!("build request: {e}"));
        let res = match app.oneshot(req).await {
            Ok(res) => res,
            Err(err) => match err {},
        };
        assert_eq!(res.status(), StatusCode::OK);

        let res = send(router(registry(), "/stats", AllowedOrigins::Any), Method::GET, None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
