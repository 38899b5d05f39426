//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (CORS, per-request trace-ID injection)
//! - Optional Swagger UI / OpenAPI document endpoint (disable with `AMADEUS_ENABLE_SWAGGER=false`)
//! - Health / heartbeat route
//! - `/api` chat and knowledge-base routes

pub mod doc;
mod generate;
mod health;
mod upload;

use std::sync::Arc;

use axum::{Router, middleware};
use utoipa_swagger_ui::SwaggerUi;

use crate::middleware::{cors, trace};
use crate::state::AppState;

// ── Router builder ────────────────────────────────────────────────────────────

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .merge(generate::router())
        .merge(upload::router(&state));

    let mut app = Router::new()
        .merge(health::router())
        .nest("/api", api_router);

    if state.config.enable_swagger {
        app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", doc::get_docs()));
    }

    app
        // Outermost layers execute first on the way in.
        .layer(cors::cors_layer(&state))
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use amadeus_agent::MemoryCheckpointer;
    use amadeus_rag::{
        Document, DocumentChunk, Embedder, Ingestor, MemoryStore, MetadataFilter, RagError,
        Retriever, VectorStore,
    };
    use async_trait::async_trait;
    use axum::Router;
    use axum::http::header;
    use axum::routing::post;
    use serde_json::{Value, json};
    use tempfile::TempDir;

    use crate::config::Config;
    use crate::state::AppState;

    /// Letter-frequency vectors; enough for similarity to be meaningful.
    struct LetterEmbedder;

    #[async_trait]
    impl Embedder for LetterEmbedder {
        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
            Ok(texts
                .iter()
                .map(|text| {
                    let mut v = vec![0.0; 26];
                    for c in text.to_ascii_lowercase().bytes().filter(u8::is_ascii_lowercase) {
                        v[usize::from(c - b'a')] += 1.0;
                    }
                    v
                })
                .collect())
        }
    }

    pub struct FailingStore;

    #[async_trait]
    impl VectorStore for FailingStore {
        async fn add_documents(&self, _chunks: Vec<DocumentChunk>) -> Result<usize, RagError> {
            Err(unavailable())
        }

        async fn similarity_search(
            &self,
            _query: &str,
            _k: usize,
            _filter: &MetadataFilter,
        ) -> Result<Vec<Document>, RagError> {
            Err(unavailable())
        }

        async fn list_metadata(&self, _filter: &MetadataFilter) -> Result<Vec<Value>, RagError> {
            Err(unavailable())
        }

        fn kind(&self) -> &'static str {
            "failing"
        }
    }

    fn unavailable() -> RagError {
        RagError::Upstream {
            service: "supabase",
            status: 503,
            body: "unavailable".into(),
        }
    }

    /// Full router over an in-memory knowledge base. Keep the returned
    /// directory alive for as long as uploads may run.
    pub fn state_with(config: Config) -> (Router, TempDir) {
        app_with_store(config, Arc::new(MemoryStore::new(Arc::new(LetterEmbedder))))
    }

    pub fn app_with_store(config: Config, store: Arc<dyn VectorStore>) -> (Router, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(AppState {
            config: Arc::new(config),
            http: reqwest::Client::builder().no_proxy().build().unwrap(),
            retriever: Arc::new(Retriever::new(Arc::clone(&store))),
            ingestor: Arc::new(Ingestor::new(store, dir.path())),
            checkpointer: Arc::new(MemoryCheckpointer::new()),
        });
        (super::build(state), dir)
    }

    /// Serve one canned Anthropic text reply on a local port and return
    /// its messages URL.
    pub async fn fake_provider(reply: &str) -> String {
        let frames = [
            ("message_start", json!({"type": "message_start", "message": {"id": "msg_1", "role": "assistant", "content": []}})),
            ("content_block_start", json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}})),
            ("content_block_delta", json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": reply}})),
            ("content_block_stop", json!({"type": "content_block_stop", "index": 0})),
            ("message_delta", json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}})),
            ("message_stop", json!({"type": "message_stop"})),
        ];
        let body: String = frames
            .iter()
            .map(|(event, data)| format!("event: {event}\ndata: {data}\n\n"))
            .collect();

        let app = Router::new().route(
            "/v1/messages",
            post(move || {
                let body = body.clone();
                async move { ([(header::CONTENT_TYPE, "text/event-stream")], body) }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}/v1/messages")
    }
}
