//! Chat model abstraction and the Anthropic Messages implementation.

pub mod anthropic;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::event::ToolInvocation;

pub use anthropic::AnthropicClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Content blocks as exchanged with the Messages API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ServerToolUse {
        id: String,
        name: String,
        input: Value,
    },
    WebSearchToolResult {
        tool_use_id: String,
        content: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

/// One message of the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl ChatTurn {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub model: String,
    pub system: String,
    pub messages: Vec<ChatTurn>,
    /// Client tool definitions and provider-native tool specs.
    pub tools: Vec<Value>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A finished assistant message.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelTurn {
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<String>,
}

impl ModelTurn {
    /// Concatenated text blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Client-side tool calls the caller must execute.
    pub fn tool_calls(&self) -> Vec<ToolInvocation> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => Some(ToolInvocation {
                    id: id.clone(),
                    name: name.clone(),
                    args: input.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// The server paused a long-running server tool turn; the same history
    /// must be sent again to let it continue.
    pub fn is_paused(&self) -> bool {
        self.stop_reason.as_deref() == Some("pause_turn")
    }
}

/// Incremental output of one model call.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    TextDelta(String),
    ServerToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ServerToolResult {
        tool_use_id: String,
        name: String,
        content: Value,
    },
    Completed(ModelTurn),
}

pub type ModelStream = Pin<Box<dyn Stream<Item = Result<ModelEvent, ProviderError>> + Send>>;

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Start a streaming completion. Errors before the first byte (bad
    /// credentials, invalid request) are returned here; later failures are
    /// items of the stream.
    async fn stream(&self, request: ModelRequest) -> Result<ModelStream, ProviderError>;
}
