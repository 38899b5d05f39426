//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use amadeus_agent::{AgentConfig, AgentDeps, Checkpointer, Persona};
use amadeus_rag::{Ingestor, Retriever};

use crate::config::Config;

/// Everything the composition root in `main` builds once and the handlers
/// share.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// One outbound HTTP client for the model provider.
    pub http: reqwest::Client,
    pub retriever: Arc<Retriever>,
    pub ingestor: Arc<Ingestor>,
    /// Per-thread conversation memory, shared by both personas.
    pub checkpointer: Arc<dyn Checkpointer>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("ingestor", &self.ingestor)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Agent settings for `persona`, taken from the server config.
    pub fn agent_config(&self, persona: Persona) -> AgentConfig {
        AgentConfig {
            model: self.config.model.clone(),
            api_key: self.config.anthropic_api_key.clone(),
            endpoint: self.config.anthropic_endpoint.clone(),
            persona,
            enable_web_search: self.config.enable_web_search,
            web_search_max_uses: self.config.web_search_max_uses,
            ..AgentConfig::default()
        }
    }

    pub fn agent_deps(&self) -> AgentDeps {
        AgentDeps {
            http: self.http.clone(),
            retriever: Some(Arc::clone(&self.retriever)),
            checkpointer: Arc::clone(&self.checkpointer),
        }
    }
}
