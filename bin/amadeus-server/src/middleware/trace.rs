//! Per-request span and `x-trace-id` propagation.
//!
//! Bodies are never buffered here: upload bodies are large and chat
//! responses are long-lived SSE streams.

use std::time::Instant;

use axum::{
    body::Body,
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

pub static X_TRACE_ID: &str = "x-trace-id";

pub async fn trace_middleware(mut req: Request<Body>, next: Next) -> Response {
    let start_time = Instant::now();

    let trace_id = req
        .headers()
        .get(X_TRACE_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);
    let header = HeaderValue::from_str(&trace_id.to_string()).ok();

    let span = info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        info!("→ request started");
        if let Some(value) = &header {
            req.headers_mut().insert(X_TRACE_ID, value.clone());
        }

        let mut response = next.run(req).await;

        if let Some(value) = header {
            response.headers_mut().insert(X_TRACE_ID, value);
        }
        // For SSE this is time to first byte, not stream duration.
        info!(
            status = response.status().as_u16(),
            latency_ms = start_time.elapsed().as_millis(),
            "← response started"
        );
        response
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod test {
    use axum::Router;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use tower::ServiceExt;

    use super::*;

    fn app() -> Router {
        Router::new()
            .route(
                "/",
                get(|req: Request<Body>| async move {
                    req.headers()
                        .get(X_TRACE_ID)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_owned()
                }),
            )
            .layer(axum::middleware::from_fn(trace_middleware))
    }

    #[tokio::test]
    async fn echoes_incoming_trace_id() {
        let id = "6f1c1c84-5a51-4f49-9b5e-2a0c0e7d3b11";
        let response = app()
            .oneshot(Request::get("/").header(X_TRACE_ID, id).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[X_TRACE_ID], id);
    }

    #[tokio::test]
    async fn replaces_malformed_trace_id() {
        let response = app()
            .oneshot(Request::get("/").header(X_TRACE_ID, "not-a-uuid").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let echoed = response.headers()[X_TRACE_ID].to_str().unwrap();
        assert!(Uuid::parse_str(echoed).is_ok());
    }
}
