//! Logging & Observability Middleware
//!
//! Request/latency logging backed by tracing, Prometheus recording for
//! every request, and a security audit pass that flags suspicious URLs.

use std::time::{Duration, Instant};

use axum::{extract::Request, middleware::Next, response::Response};
use once_cell::sync::Lazy;
use regex::Regex;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::infrastructure::metrics;

/// Requests slower than this are logged at WARN.
const SLOW_REQUEST_THRESHOLD: Duration = Duration::from_millis(1000);

/// Create the tower-http trace layer for request spans.
pub fn create_trace_layer(
) -> TraceLayer<tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>>
{
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::DEBUG))
}

/// Paths excluded from request logging.
fn skip_logging(path: &str) -> bool {
    matches!(path, "/health" | "/health/live" | "/health/ready" | "/metrics")
}

/// Request/performance logging middleware.
///
/// Records Prometheus counters and latency histograms for every
/// request, logs the outcome, and flags slow requests.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    metrics::record_http_request(method.as_str(), &path, status, latency.as_secs_f64());

    if !skip_logging(&path) {
        if latency > SLOW_REQUEST_THRESHOLD {
            tracing::warn!(
                method = %method,
                path = %path,
                status,
                latency_ms = latency.as_millis() as u64,
                "Slow request"
            );
        } else {
            tracing::info!(
                method = %method,
                path = %path,
                status,
                latency_ms = latency.as_millis() as u64,
                "Request completed"
            );
        }
    }

    response
}

static XSS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<script>|javascript:|on\w+\s*=|data:").expect("valid regex"));
static SQL_INJECTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(%27)|(')|(--)|(%23)|(#)").expect("valid regex"));
static PATH_TRAVERSAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.\./").expect("valid regex"));

/// Classify a request URI against the suspicious patterns.
///
/// Returns the kinds that fired. Detection only; the request is still
/// served, matching the audit-log behavior.
pub fn classify_suspicious(uri: &str) -> Vec<&'static str> {
    let mut kinds = Vec::new();
    if XSS_RE.is_match(uri) {
        kinds.push("xss");
    }
    if SQL_INJECTION_RE.is_match(uri) {
        kinds.push("sql_injection");
    }
    if PATH_TRAVERSAL_RE.is_match(uri) {
        kinds.push("path_traversal");
    }
    kinds
}

/// Security audit middleware.
///
/// Logs and counts requests whose URL smells like an injection or
/// traversal probe.
pub async fn security_audit(request: Request, next: Next) -> Response {
    let uri = request.uri().to_string();
    let kinds = classify_suspicious(&uri);

    if !kinds.is_empty() {
        let user_agent = request
            .headers()
            .get(axum::http::header::USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("unknown");

        tracing::warn!(
            method = %request.method(),
            uri = %uri,
            user_agent,
            kinds = ?kinds,
            "Suspicious request"
        );
        for kind in kinds {
            metrics::record_security_event(kind);
        }
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_clean_uri() {
        assert!(classify_suspicious("/api/v1/chat/rooms/active").is_empty());
    }

    #[test]
    fn test_classify_xss() {
        assert_eq!(
            classify_suspicious("/search?q=<script>alert(1)</script>"),
            vec!["xss"]
        );
    }

    #[test]
    fn test_classify_path_traversal() {
        assert!(classify_suspicious("/files/../../etc/passwd").contains(&"path_traversal"));
    }

    #[test]
    fn test_classify_sql_injection() {
        assert!(classify_suspicious("/api?id=1'--").contains(&"sql_injection"));
    }

    #[test]
    fn test_skip_logging_paths() {
        assert!(skip_logging("/health"));
        assert!(skip_logging("/metrics"));
        assert!(!skip_logging("/api/v1/chat/rooms"));
    }
}
