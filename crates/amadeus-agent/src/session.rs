//! Agent construction and per-request entry points.

use std::sync::Arc;

use amadeus_rag::Retriever;
use chrono::Utc;
use futures::stream::BoxStream;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use strum::{Display, EnumString};
use tracing::debug;

use crate::checkpoint::Checkpointer;
use crate::error::AgentError;
use crate::event::{AgentStream, StreamEvent};
use crate::normalizer::Normalizer;
use crate::prompts::system_prompt;
use crate::provider::{AnthropicClient, ChatModel};
use crate::runtime::{AgentRuntime, RuntimeSettings};
use crate::tools::{RetrievalTool, ToolRegistry};

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Which instructor the session plays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Persona {
    /// Amadeus course; knowledge-base retrieval plus web search.
    #[default]
    Amadeus,
    /// Galileo course; web search only.
    Galileo,
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub model: String,
    /// Overrides `ANTHROPIC_API_KEY`.
    pub api_key: Option<String>,
    /// Messages endpoint override (gateways, proxies).
    pub endpoint: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub persona: Persona,
    pub enable_web_search: bool,
    pub web_search_max_uses: u32,
    pub max_steps: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_owned(),
            api_key: None,
            endpoint: None,
            temperature: 0.1,
            max_tokens: 4096,
            persona: Persona::Amadeus,
            enable_web_search: true,
            web_search_max_uses: 5,
            max_steps: 25,
        }
    }
}

impl AgentConfig {
    /// Provider-native web search tool spec.
    pub fn web_search_tool(&self) -> Value {
        json!({
            "type": "web_search_20250305",
            "name": "web_search",
            "max_uses": self.web_search_max_uses,
        })
    }
}

/// Shared collaborators owned by the composition root.
#[derive(Clone)]
pub struct AgentDeps {
    pub http: Client,
    /// Absent when no knowledge base is wired; the retrieval tool is then
    /// not offered.
    pub retriever: Option<Arc<Retriever>>,
    pub checkpointer: Arc<dyn Checkpointer>,
}

/// A configured agent. Cheap to build per request; conversation state
/// lives in the checkpointer.
pub struct AgentSession {
    runtime: Arc<AgentRuntime>,
    persona: Persona,
}

impl std::fmt::Debug for AgentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSession")
            .field("persona", &self.persona)
            .field("model", &self.runtime.settings().model)
            .field("tools", self.runtime.tools())
            .finish()
    }
}

fn resolve_api_key(configured: Option<&str>) -> Result<String, AgentError> {
    configured
        .map(str::to_owned)
        .or_else(|| std::env::var(API_KEY_ENV).ok())
        .filter(|key| !key.trim().is_empty())
        .ok_or(AgentError::MissingCredential)
}

impl AgentSession {
    /// Build a session backed by the Anthropic API.
    ///
    /// Fails with [`AgentError::MissingCredential`] when neither
    /// `config.api_key` nor `ANTHROPIC_API_KEY` is set.
    pub fn new(config: AgentConfig, deps: AgentDeps) -> Result<Self, AgentError> {
        let api_key = resolve_api_key(config.api_key.as_deref())?;
        let mut client = AnthropicClient::new(deps.http.clone(), api_key);
        if let Some(endpoint) = &config.endpoint {
            client = client.with_endpoint(endpoint.clone());
        }
        Ok(Self::with_model(config, Arc::new(client), deps))
    }

    /// Build a session around any [`ChatModel`].
    pub fn with_model(config: AgentConfig, model: Arc<dyn ChatModel>, deps: AgentDeps) -> Self {
        let mut tools = ToolRegistry::new();
        if config.persona == Persona::Amadeus {
            if let Some(retriever) = deps.retriever {
                tools.register(Arc::new(RetrievalTool::new(retriever)));
            }
        }

        let mut provider_tools = Vec::new();
        if config.enable_web_search {
            provider_tools.push(config.web_search_tool());
        }

        let settings = RuntimeSettings {
            model: config.model,
            system_prompt: system_prompt(config.persona).to_owned(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_steps: config.max_steps,
            provider_tools,
        };
        debug!(persona = %config.persona, tools = ?tools, "agent session ready");

        Self {
            runtime: Arc::new(AgentRuntime::new(model, tools, deps.checkpointer, settings)),
            persona: config.persona,
        }
    }

    pub fn persona(&self) -> Persona {
        self.persona
    }

    /// Raw agent events for one user message.
    pub fn stream(&self, thread_id: &str, message: &str) -> AgentStream {
        Arc::clone(&self.runtime).run(thread_id.to_owned(), message.to_owned())
    }

    /// Normalised wire events for one user message.
    pub fn stream_events(&self, thread_id: &str, message: &str) -> BoxStream<'static, StreamEvent> {
        Normalizer::default().normalize(self.stream(thread_id, message))
    }
}

/// The given thread id, or `default_<unix millis>` when absent or blank.
pub fn thread_id_or_default(thread_id: Option<&str>) -> String {
    match thread_id.map(str::trim) {
        Some(id) if !id.is_empty() => id.to_owned(),
        _ => format!("default_{}", Utc::now().timestamp_millis()),
    }
}
