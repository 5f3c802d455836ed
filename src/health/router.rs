//! Http surface of the health aggregator.
//!
//! Plain-text endpoints, all GET:
//!
//! | Path     | 200 when            | otherwise |
//! |----------|---------------------|-----------|
//! | `/ready` | listener is ready   | 503       |
//! | `/alive` | process is alive    | 503       |
//! | `/ping`  | always (side effect: heartbeat reset) | — |
//! | other    | never               | 404       |
//!
//! Non-GET methods on registered paths answer 405. Handlers only read the
//! atomic snapshot or push into the ping channel; they never hold the
//! aggregator loop up.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tokio::sync::mpsc;

use crate::health::state::HealthState;

/// Handler context: the shared snapshot plus the heartbeat-reset channel.
#[derive(Clone)]
pub(crate) struct Endpoints {
    pub health: Arc<HealthState>,
    pub ping: mpsc::Sender<()>,
}

/// Builds the health router over the given snapshot and ping channel.
pub(crate) fn build_router(health: Arc<HealthState>, ping: mpsc::Sender<()>) -> Router {
    Router::new()
        .route("/ready", get(ready))
        .route("/alive", get(alive))
        .route("/ping", get(ping_handler))
        .fallback(not_found)
        .layer(middleware::from_fn(trace_requests))
        .with_state(Endpoints { health, ping })
}

async fn ready(State(ep): State<Endpoints>) -> (StatusCode, String) {
    status_response(ep.health.is_ready())
}

async fn alive(State(ep): State<Endpoints>) -> (StatusCode, String) {
    status_response(ep.health.is_alive())
}

async fn ping_handler(State(ep): State<Endpoints>) -> (StatusCode, String) {
    // Bounded wait: the aggregator loop always returns to its select point.
    // A closed channel means shutdown is underway; the 200 is still honest.
    let _ = ep.ping.send(()).await;
    text(StatusCode::OK)
}

async fn not_found() -> (StatusCode, String) {
    text(StatusCode::NOT_FOUND)
}

fn status_response(ok: bool) -> (StatusCode, String) {
    if ok {
        text(StatusCode::OK)
    } else {
        text(StatusCode::SERVICE_UNAVAILABLE)
    }
}

fn text(status: StatusCode) -> (StatusCode, String) {
    (
        status,
        status.canonical_reason().unwrap_or_default().to_string(),
    )
}

async fn trace_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(req).await;

    tracing::debug!(
        %method,
        path,
        status = %response.status(),
        elapsed = ?started.elapsed(),
        "http request"
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::util::ServiceExt;

    fn harness() -> (Router, Arc<HealthState>, mpsc::Receiver<()>) {
        let health = Arc::new(HealthState::default());
        let (ping_tx, ping_rx) = mpsc::channel(1);
        let router = build_router(health.clone(), ping_tx);
        (router, health, ping_rx)
    }

    async fn send(router: &Router, method: &str, path: &str) -> (StatusCode, String) {
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(path)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8_lossy(&body).to_string())
    }

    #[tokio::test]
    async fn test_ready_reflects_snapshot() {
        let (router, health, _ping) = harness();

        let (status, _) = send(&router, "GET", "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        health.set_ready(true);
        let (status, body) = send(&router, "GET", "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
    }

    #[tokio::test]
    async fn test_alive_reflects_snapshot() {
        let (router, health, _ping) = harness();

        let (status, body) = send(&router, "GET", "/alive").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, "Service Unavailable");

        health.set_alive(true);
        let (status, _) = send(&router, "GET", "/alive").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ping_always_succeeds_and_signals() {
        let (router, _health, mut ping_rx) = harness();

        let (status, _) = send(&router, "GET", "/ping").await;
        assert_eq!(status, StatusCode::OK);
        assert!(ping_rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let (router, _health, _ping) = harness();
        let (status, _) = send(&router, "GET", "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_non_get_is_405() {
        let (router, _health, _ping) = harness();
        for path in ["/ready", "/alive", "/ping"] {
            let (status, _) = send(&router, "POST", path).await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{path}");
        }
    }

    #[tokio::test]
    async fn test_content_type_is_plain_text() {
        let (router, health, _ping) = harness();
        health.set_ready(true);

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/ready")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let content_type = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(content_type.starts_with("text/plain"));
    }
}
