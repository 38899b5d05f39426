//! Streaming chat routes, one per persona.
//!
//! Each request builds an [`AgentSession`] for the persona, runs one turn
//! on the given thread and forwards the normalised events as SSE `data:`
//! frames. The stream ends after the terminal `complete` or `error` event.
//! Dropping the response body (client disconnect) drops the agent stream
//! and with it the outbound provider request.

use std::sync::Arc;

use amadeus_agent::{AgentError, AgentSession, Persona, thread_id_or_default};
use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use futures::StreamExt;
use tracing::{info, warn};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::chat::{GenerateRequest, StreamEventSchema};
use crate::state::AppState;

pub const MISSING_KEY_MESSAGE: &str = "ANTHROPIC_API_KEY not configured on server";

#[derive(OpenApi)]
#[openapi(
    paths(generate, galileo),
    components(schemas(GenerateRequest, StreamEventSchema))
)]
pub struct GenerateApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/generate", post(generate))
        .route("/galileo", post(galileo))
}

/// Chat with the Amadeus instructor (`POST /api/generate`).
#[utoipa::path(
    post,
    path = "/api/generate",
    tag = "chat",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "SSE stream of `data: <StreamEvent>` frames", content_type = "text/event-stream", body = StreamEventSchema),
        (status = 400, description = "Message is required"),
        (status = 500, description = "ANTHROPIC_API_KEY not configured on server"),
    )
)]
pub async fn generate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateRequest>,
) -> Result<Response, ServerError> {
    stream_turn(&state, Persona::Amadeus, req)
}

/// Chat with the Galileo instructor (`POST /api/galileo`).
#[utoipa::path(
    post,
    path = "/api/galileo",
    tag = "chat",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "SSE stream of `data: <StreamEvent>` frames", content_type = "text/event-stream", body = StreamEventSchema),
        (status = 400, description = "Message is required"),
        (status = 500, description = "ANTHROPIC_API_KEY not configured on server"),
    )
)]
pub async fn galileo(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateRequest>,
) -> Result<Response, ServerError> {
    stream_turn(&state, Persona::Galileo, req)
}

fn stream_turn(
    state: &AppState,
    persona: Persona,
    req: GenerateRequest,
) -> Result<Response, ServerError> {
    let message = req
        .message()
        .ok_or_else(|| ServerError::BadRequest("Message is required".into()))?;

    if state.config.anthropic_api_key.is_none() {
        return Err(ServerError::NotConfigured(MISSING_KEY_MESSAGE.into()));
    }
    let session = AgentSession::new(state.agent_config(persona), state.agent_deps())
        .map_err(|e| match e {
            AgentError::MissingCredential => ServerError::NotConfigured(MISSING_KEY_MESSAGE.into()),
            other => ServerError::Internal(other.to_string()),
        })?;

    let thread_id = thread_id_or_default(req.thread_id.as_deref());
    info!(%persona, %thread_id, message_len = message.len(), "chat turn");

    let events = session.stream_events(&thread_id, message).map(|event| {
        Event::default().json_data(&event).inspect_err(|e| {
            warn!(error = %e, "failed to encode stream event");
        })
    });

    Ok(Sse::new(events).into_response())
}

#[cfg(test)]
mod test {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::routes::test_support::{fake_provider, state_with};

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let (app, _dir) = state_with(Config {
            anthropic_api_key: Some("sk-ant-test".into()),
            ..Config::default()
        });
        for body in [json!({"message": "  "}), json!({"threadId": "t1"})] {
            let response = app.clone().oneshot(post_json("/api/generate", body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(json_body(response).await, json!({"error": "Message is required"}));
        }
    }

    #[tokio::test]
    async fn missing_key_fails_before_streaming() {
        let (app, _dir) = state_with(Config::default());
        for uri in ["/api/generate", "/api/galileo"] {
            let response = app
                .clone()
                .oneshot(post_json(uri, json!({"message": "hello", "threadId": "t1"})))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_ne!(
                response.headers().get(header::CONTENT_TYPE).unwrap(),
                "text/event-stream"
            );
            assert_eq!(
                json_body(response).await,
                json!({"error": "ANTHROPIC_API_KEY not configured on server"})
            );
        }
    }

    #[tokio::test]
    async fn hello_streams_tokens_then_complete() {
        let endpoint = fake_provider("Hello! Ready to learn Amadeus?").await;
        let (app, _dir) = state_with(Config {
            anthropic_api_key: Some("sk-ant-test".into()),
            anthropic_endpoint: Some(endpoint),
            ..Config::default()
        });

        let response = app
            .oneshot(post_json("/api/generate", json!({"message": "hello", "threadId": "t1"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let frames: Vec<Value> = String::from_utf8(bytes.to_vec())
            .unwrap()
            .lines()
            .filter_map(|line| line.strip_prefix("data: "))
            .map(|data| serde_json::from_str(data).unwrap())
            .collect();

        assert_eq!(
            frames,
            vec![
                json!({"type": "token", "content": "Hello! Ready to learn Amadeus?"}),
                json!({"type": "complete"}),
            ]
        );
    }
}
