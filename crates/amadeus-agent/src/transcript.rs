//! Client-side view of a conversation, rebuilt from [`StreamEvent`]s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::event::StreamEvent;
use crate::tools::RETRIEVAL_TOOL_NAME;

/// Shown when the request itself fails (connection refused, non-200, ...).
pub const TRANSPORT_FAILURE_TEXT: &str = "Sorry, I encountered an error while generating a response. Please check the server logs and ensure your API key is configured correctly.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub args: Value,
    pub result: Option<String>,
    pub is_loading: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ChatMessage {
    fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            tool_calls: None,
        }
    }
}

/// Messages of one thread plus the thread id sent with each request.
#[derive(Debug, Clone)]
pub struct Transcript {
    thread_id: String,
    messages: Vec<ChatMessage>,
    /// Index of the assistant message receiving the current stream.
    active: Option<usize>,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    pub fn new() -> Self {
        Self {
            thread_id: new_thread_id(),
            messages: Vec::new(),
            active: None,
        }
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Forget all messages and start a fresh thread.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn push_user(&mut self, content: &str) {
        self.messages.push(ChatMessage::new(ChatRole::User, content.trim()));
        self.active = None;
    }

    fn assistant(&mut self) -> &mut ChatMessage {
        let idx = match self.active {
            Some(idx) => idx,
            None => {
                self.messages.push(ChatMessage::new(ChatRole::Assistant, ""));
                let idx = self.messages.len() - 1;
                self.active = Some(idx);
                idx
            }
        };
        &mut self.messages[idx]
    }

    /// Fold one event into the transcript. Returns `true` once the stream
    /// is over.
    pub fn apply(&mut self, event: &StreamEvent) -> bool {
        match event {
            StreamEvent::Token { content } => {
                if !content.is_empty() {
                    self.assistant().content.push_str(content);
                }
            }
            StreamEvent::ToolCall { id, name, args } => {
                if name != RETRIEVAL_TOOL_NAME {
                    self.assistant()
                        .tool_calls
                        .get_or_insert_with(Vec::new)
                        .push(ToolCall {
                            id: id.clone(),
                            name: name.clone(),
                            args: args.clone(),
                            result: None,
                            is_loading: true,
                        });
                }
            }
            StreamEvent::ToolResult { name, content } => {
                if name != RETRIEVAL_TOOL_NAME {
                    // Results carry no call id; every call with the same
                    // name takes the result.
                    for call in self
                        .assistant()
                        .tool_calls
                        .iter_mut()
                        .flatten()
                        .filter(|call| &call.name == name)
                    {
                        call.result = Some(content.clone());
                        call.is_loading = false;
                    }
                }
            }
            StreamEvent::Complete => {
                self.active = None;
                return true;
            }
            StreamEvent::Error { content } => {
                self.assistant().content = format!("Error: {content}");
                self.active = None;
                return true;
            }
        }
        false
    }

    /// The request failed before or during streaming.
    pub fn fail_transport(&mut self) {
        self.assistant().content = TRANSPORT_FAILURE_TEXT.to_owned();
        self.active = None;
    }
}

fn new_thread_id() -> String {
    format!("thread_{}_{}", Utc::now().timestamp_millis(), Uuid::new_v4().simple())
}
