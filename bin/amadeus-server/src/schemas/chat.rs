use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for `POST /api/generate` and `POST /api/galileo`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// The learner's message. Required and non-blank.
    #[serde(default)]
    pub message: Option<String>,
    /// Conversation thread; a fresh `default_<millis>` thread is used when
    /// omitted.
    #[serde(default)]
    pub thread_id: Option<String>,
}

impl GenerateRequest {
    /// The message, unless it is missing or blank.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref().filter(|m| !m.trim().is_empty())
    }
}

/// One `data:` frame of the generate stream. Mirrors the agent's
/// `StreamEvent` for the OpenAPI document.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
#[allow(dead_code)]
pub enum StreamEventSchema {
    Token { content: String },
    ToolCall { id: String, name: String, args: serde_json::Value },
    ToolResult { name: String, content: String },
    Complete,
    Error { content: String },
}
