//! Health / heartbeat endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use crate::config::EnvironmentReport;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_health), components(schemas(HealthResponse, EnvironmentReport)))]
pub struct HealthApi;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `"ok"`, or `"degraded"` when a required credential is missing.
    pub status: String,
    pub version: String,
    pub environment: EnvironmentReport,
}

/// Register health-check routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(get_health))
}

/// Heartbeat endpoint.
///
/// Always answers 200 so load-balancers can tell "up" from "configured";
/// configuration problems are listed under `environment`.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Server is up", body = HealthResponse)
    )
)]
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let environment = state.config.validate();
    let status = if environment.is_valid { "ok" } else { "degraded" };
    Json(HealthResponse {
        status: status.to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
        environment,
    })
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::routes::test_support::state_with;

    async fn health(config: Config) -> Value {
        let (app, _dir) = state_with(config);
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn reports_missing_credentials() {
        let body = health(Config::default()).await;
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["environment"]["isValid"], false);
        assert!(body["environment"]["errors"][0]
            .as_str()
            .unwrap()
            .contains("ANTHROPIC_API_KEY"));
        assert!(!body["version"].as_str().unwrap_or("").is_empty());
    }

    #[tokio::test]
    async fn ok_when_chat_is_configured() {
        let body = health(Config {
            anthropic_api_key: Some("sk-ant-test".into()),
            ..Config::default()
        })
        .await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["environment"]["errors"].as_array().unwrap().len(), 0);
    }
}
