//! Event alphabets on both sides of the normaliser.
//!
//! [`AgentEvent`] is what the agent loop produces: coarse per-step
//! [`AgentEvent::Update`]s and fine-grained [`AgentEvent::Message`] chunks.
//! [`StreamEvent`] is the wire contract sent to chat clients as SSE
//! `data:` frames.

use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AgentError;

/// Outward event, serialised as `{"type": "...", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Token { content: String },
    ToolCall { id: String, name: String, args: Value },
    ToolResult { name: String, content: String },
    Complete,
    Error { content: String },
}

impl StreamEvent {
    /// `complete` and `error` end the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete | StreamEvent::Error { .. })
    }
}

/// A client-side tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub args: Value,
}

/// A message in a coarse step update.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentMessage {
    User {
        content: String,
    },
    Assistant {
        content: String,
        tool_calls: Vec<ToolInvocation>,
    },
    Tool {
        tool_call_id: String,
        name: String,
        content: String,
    },
}

/// Who produced a fine-grained chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkSource {
    Model,
    Tool { name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text {
        text: String,
    },
    /// Provider-side tool use (e.g. web search).
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    /// Provider-side tool result.
    ToolResult {
        tool_use_id: String,
        name: String,
        content: Value,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageChunk {
    pub source: ChunkSource,
    pub parts: Vec<ContentPart>,
}

impl MessageChunk {
    pub fn model(parts: Vec<ContentPart>) -> Self {
        Self {
            source: ChunkSource::Model,
            parts,
        }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self::model(vec![ContentPart::Text { text: text.into() }])
    }

    pub fn tool_output(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: ChunkSource::Tool { name: name.into() },
            parts: vec![ContentPart::Text { text: text.into() }],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// State after a graph node finished (`agent` or `tools`).
    Update {
        node: String,
        messages: Vec<AgentMessage>,
    },
    /// Token-level output as it is produced.
    Message { chunk: MessageChunk },
}

pub type AgentStream = Pin<Box<dyn Stream<Item = Result<AgentEvent, AgentError>> + Send>>;

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn stream_events_use_type_tag() {
        let cases = [
            (StreamEvent::Token { content: "Hi".into() }, json!({"type": "token", "content": "Hi"})),
            (StreamEvent::Complete, json!({"type": "complete"})),
            (
                StreamEvent::ToolCall {
                    id: "srvtoolu_1".into(),
                    name: "web_search".into(),
                    args: json!({"query": "amadeus PNR"}),
                },
                json!({"type": "tool_call", "id": "srvtoolu_1", "name": "web_search", "args": {"query": "amadeus PNR"}}),
            ),
            (
                StreamEvent::Error { content: "boom".into() },
                json!({"type": "error", "content": "boom"}),
            ),
        ];
        for (event, expected) in cases {
            assert_eq!(serde_json::to_value(&event).unwrap(), expected);
        }
    }

    #[test]
    fn terminal_events() {
        assert!(StreamEvent::Complete.is_terminal());
        assert!(StreamEvent::Error { content: String::new() }.is_terminal());
        assert!(!StreamEvent::Token { content: "x".into() }.is_terminal());
    }
}
