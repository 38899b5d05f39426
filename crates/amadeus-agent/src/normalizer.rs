//! Agent events → wire events.
//!
//! Both input paths (coarse updates and fine message chunks) run through
//! the same rules:
//!
//! 1. calls and results of suppressed tools (the knowledge retrieval tool)
//!    never leave the server; tool-provenance text is never forwarded;
//! 2. other tool calls and results become `tool_call` / `tool_result`;
//! 3. model text goes through [`should_suppress`] and, if it survives and
//!    is not blank, becomes a `token`;
//! 4. a normal end of input yields one `complete`; the first error yields
//!    one `error` and ends the stream.
//!
//! Coarse-path assistant text is checked but not emitted: the same text was
//! already streamed on the fine path.

use std::collections::{HashSet, VecDeque};

use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde_json::Value;
use tracing::debug;

use crate::error::AgentError;
use crate::event::{AgentEvent, AgentMessage, ChunkSource, ContentPart, StreamEvent};
use crate::tools::RETRIEVAL_TOOL_NAME;

/// Text longer than this is assumed to be leaked document content.
pub const MAX_TOKEN_CHARS: usize = 1000;

/// Phrases from the course material that must never be echoed verbatim.
const BOILERPLATE_PHRASES: &[&str] = &[
    "Page ",
    "Beginner Amadeus Course",
    "Day 1: Basic Encoding",
    "Global Distribution System (GDS)",
    "Key Areas:Global",
    "Welcome to this very basic Amadeus course",
    "IT Solutions: Software for reservations",
];

const BOILERPLATE_PREFIX: &str = "and more. It provides";

/// `true` when `text` looks like raw retrieved material rather than prose
/// written by the model.
pub fn should_suppress(text: &str) -> bool {
    text.chars().count() > MAX_TOKEN_CHARS
        || text.starts_with(BOILERPLATE_PREFIX)
        || BOILERPLATE_PHRASES.iter().any(|p| text.contains(p))
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    suppressed_tools: HashSet<String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new([RETRIEVAL_TOOL_NAME])
    }
}

impl Normalizer {
    pub fn new<I, S>(suppressed_tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            suppressed_tools: suppressed_tools.into_iter().map(Into::into).collect(),
        }
    }

    fn is_hidden_tool(&self, name: &str) -> bool {
        self.suppressed_tools.contains(name)
    }

    /// Wire events for one agent event, in order.
    pub fn classify(&self, event: &AgentEvent) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        match event {
            AgentEvent::Update { node, messages } => {
                for message in messages {
                    self.classify_message(node, message, &mut out);
                }
            }
            AgentEvent::Message { chunk } => {
                for part in &chunk.parts {
                    self.classify_part(&chunk.source, part, &mut out);
                }
            }
        }
        out
    }

    fn classify_message(&self, node: &str, message: &AgentMessage, out: &mut Vec<StreamEvent>) {
        match message {
            AgentMessage::User { .. } => {}
            AgentMessage::Assistant { content, tool_calls } => {
                for call in tool_calls {
                    if self.is_hidden_tool(&call.name) {
                        debug!(node, tool = %call.name, "suppressed tool call");
                        continue;
                    }
                    out.push(StreamEvent::ToolCall {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        args: call.args.clone(),
                    });
                }
                if tool_calls.is_empty() && should_suppress(content) {
                    debug!(node, chars = content.chars().count(), "suppressed assistant content");
                }
            }
            AgentMessage::Tool { name, content, .. } => {
                if self.is_hidden_tool(name) {
                    debug!(node, tool = %name, "suppressed tool result");
                    return;
                }
                if !content.is_empty() {
                    out.push(StreamEvent::ToolResult {
                        name: name.clone(),
                        content: content.clone(),
                    });
                }
            }
        }
    }

    fn classify_part(&self, source: &ChunkSource, part: &ContentPart, out: &mut Vec<StreamEvent>) {
        match part {
            ContentPart::Text { text } => {
                if let ChunkSource::Tool { name } = source {
                    debug!(tool = %name, "dropped tool-sourced text");
                    return;
                }
                if should_suppress(text) {
                    debug!(chars = text.chars().count(), "suppressed text token");
                    return;
                }
                if !text.trim().is_empty() {
                    out.push(StreamEvent::Token { content: text.clone() });
                }
            }
            ContentPart::ToolUse { id, name, input } => {
                if self.is_hidden_tool(name) {
                    return;
                }
                out.push(StreamEvent::ToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    args: input.clone(),
                });
            }
            ContentPart::ToolResult { name, content, .. } => {
                if self.is_hidden_tool(name) {
                    return;
                }
                out.push(StreamEvent::ToolResult {
                    name: name.clone(),
                    content: render_tool_content(content),
                });
            }
        }
    }

    /// Normalise a whole agent stream. The output always ends with exactly
    /// one terminal event.
    pub fn normalize<S>(self, events: S) -> BoxStream<'static, StreamEvent>
    where
        S: Stream<Item = Result<AgentEvent, AgentError>> + Send + Unpin + 'static,
    {
        struct State<S> {
            events: S,
            normalizer: Normalizer,
            pending: VecDeque<StreamEvent>,
            finished: bool,
        }

        let state = State {
            events,
            normalizer: self,
            pending: VecDeque::new(),
            finished: false,
        };

        stream::unfold(state, |mut st| async move {
            loop {
                if let Some(event) = st.pending.pop_front() {
                    return Some((event, st));
                }
                if st.finished {
                    return None;
                }
                match st.events.next().await {
                    Some(Ok(event)) => st.pending.extend(st.normalizer.classify(&event)),
                    Some(Err(e)) => {
                        st.finished = true;
                        st.pending.push_back(StreamEvent::Error { content: e.to_string() });
                    }
                    None => {
                        st.finished = true;
                        st.pending.push_back(StreamEvent::Complete);
                    }
                }
            }
        })
        .boxed()
    }
}

/// Flatten a provider-side tool result (web search hits, an error object,
/// or plain text) into one display string.
fn render_tool_content(content: &Value) -> String {
    match content {
        Value::String(s) if !s.is_empty() => s.clone(),
        Value::Array(items) => {
            let lines: Vec<String> = items
                .iter()
                .filter_map(|item| {
                    let title = item.get("title").and_then(Value::as_str);
                    let url = item.get("url").and_then(Value::as_str);
                    match (title, url) {
                        (Some(t), Some(u)) => Some(format!("- {t} ({u})")),
                        (Some(t), None) => Some(format!("- {t}")),
                        (None, Some(u)) => Some(format!("- {u}")),
                        (None, None) => None,
                    }
                })
                .collect();
            if lines.is_empty() {
                "Search completed".to_owned()
            } else {
                lines.join("\n")
            }
        }
        Value::Object(obj) => match obj.get("error_code").and_then(Value::as_str) {
            Some(code) => format!("Search failed: {code}"),
            None => "Search completed".to_owned(),
        },
        _ => "Search completed".to_owned(),
    }
}
