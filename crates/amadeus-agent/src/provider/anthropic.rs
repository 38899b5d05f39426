//! Anthropic Messages API over streaming SSE.

use std::collections::{BTreeMap, HashMap, VecDeque};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::error::ProviderError;
use crate::provider::{ChatModel, ContentBlock, ModelEvent, ModelRequest, ModelStream, ModelTurn};
use crate::sse::{SseDecoder, SseFrame};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

#[derive(Clone)]
pub struct AnthropicClient {
    http: Client,
    api_key: String,
    endpoint: String,
}

impl std::fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl AnthropicClient {
    pub fn new(http: Client, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            endpoint: MESSAGES_URL.to_owned(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

fn request_body(request: &ModelRequest) -> Value {
    let mut body = json!({
        "model": request.model,
        "system": request.system,
        "messages": request.messages,
        "max_tokens": request.max_tokens,
        "temperature": request.temperature,
        "stream": true,
    });
    if !request.tools.is_empty() {
        body["tools"] = Value::Array(request.tools.clone());
    }
    body
}

#[async_trait]
impl ChatModel for AnthropicClient {
    async fn stream(&self, request: ModelRequest) -> Result<ModelStream, ProviderError> {
        info!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "calling anthropic messages API"
        );
        let response = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request_body(&request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(decode_stream(response.bytes_stream().boxed()))
    }
}

/// Turn raw SSE bytes into model events. The stream ends after
/// `message_stop`, after the first error, or with
/// [`ProviderError::Truncated`] if the body ends early.
fn decode_stream(bytes: BoxStream<'static, Result<Bytes, reqwest::Error>>) -> ModelStream {
    struct State {
        bytes: BoxStream<'static, Result<Bytes, reqwest::Error>>,
        decoder: SseDecoder,
        assembler: TurnAssembler,
        pending: VecDeque<Result<ModelEvent, ProviderError>>,
        done: bool,
    }

    impl State {
        fn absorb(&mut self, frames: Vec<SseFrame>) {
            for frame in frames {
                match self.assembler.process(&frame) {
                    Ok(events) => self.pending.extend(events.into_iter().map(Ok)),
                    Err(e) => {
                        self.pending.push_back(Err(e));
                        self.done = true;
                        return;
                    }
                }
                if self.assembler.is_finished() {
                    self.done = true;
                    return;
                }
            }
        }
    }

    let state = State {
        bytes,
        decoder: SseDecoder::new(),
        assembler: TurnAssembler::default(),
        pending: VecDeque::new(),
        done: false,
    };

    Box::pin(stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                return Some((item, st));
            }
            if st.done {
                return None;
            }
            match st.bytes.next().await {
                Some(Ok(chunk)) => {
                    let frames = st.decoder.feed(&chunk);
                    st.absorb(frames);
                }
                Some(Err(e)) => {
                    st.done = true;
                    st.pending.push_back(Err(e.into()));
                }
                None => {
                    let tail: Vec<SseFrame> = st.decoder.finish().into_iter().collect();
                    st.absorb(tail);
                    if !st.done {
                        st.done = true;
                        st.pending.push_back(Err(ProviderError::Truncated));
                    }
                }
            }
        }
    }))
}

// ── Event payloads ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct BlockStart {
    index: usize,
    content_block: Value,
}

#[derive(Deserialize)]
struct BlockDelta {
    index: usize,
    delta: Delta,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct BlockStop {
    index: usize,
}

#[derive(Deserialize)]
struct MessageDelta {
    delta: MessageDeltaBody,
}

#[derive(Deserialize)]
struct MessageDeltaBody {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEvent {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

// ── Assembler ───────────────────────────────────────────────────────────────

struct PartialBlock {
    block: ContentBlock,
    input_json: String,
}

/// Rebuilds the assistant message from streaming events while emitting
/// incremental [`ModelEvent`]s.
#[derive(Default)]
pub struct TurnAssembler {
    open: BTreeMap<usize, PartialBlock>,
    closed: BTreeMap<usize, ContentBlock>,
    server_tool_names: HashMap<String, String>,
    stop_reason: Option<String>,
    finished: bool,
}

impl TurnAssembler {
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn process(&mut self, frame: &SseFrame) -> Result<Vec<ModelEvent>, ProviderError> {
        let payload: Value = serde_json::from_str(&frame.data)?;
        let kind = frame
            .event
            .clone()
            .or_else(|| payload.get("type").and_then(Value::as_str).map(str::to_owned))
            .unwrap_or_default();

        let mut events = Vec::new();
        match kind.as_str() {
            "content_block_start" => {
                let start: BlockStart = serde_json::from_value(payload)?;
                match serde_json::from_value::<ContentBlock>(start.content_block.clone()) {
                    Ok(block) => {
                        if let ContentBlock::Text { text } = &block {
                            if !text.is_empty() {
                                events.push(ModelEvent::TextDelta(text.clone()));
                            }
                        }
                        self.open.insert(
                            start.index,
                            PartialBlock {
                                block,
                                input_json: String::new(),
                            },
                        );
                    }
                    Err(_) => {
                        debug!(block = %start.content_block, "ignoring unsupported content block");
                    }
                }
            }
            "content_block_delta" => {
                let delta: BlockDelta = serde_json::from_value(payload)?;
                if let Some(partial) = self.open.get_mut(&delta.index) {
                    match delta.delta {
                        Delta::TextDelta { text } => {
                            if let ContentBlock::Text { text: buf } = &mut partial.block {
                                buf.push_str(&text);
                            }
                            events.push(ModelEvent::TextDelta(text));
                        }
                        Delta::InputJsonDelta { partial_json } => {
                            partial.input_json.push_str(&partial_json);
                        }
                        Delta::Other => {}
                    }
                }
            }
            "content_block_stop" => {
                let stop: BlockStop = serde_json::from_value(payload)?;
                if let Some(partial) = self.open.remove(&stop.index) {
                    let block = self.close_block(partial)?;
                    events.extend(self.announce(&block));
                    self.closed.insert(stop.index, block);
                }
            }
            "message_delta" => {
                let delta: MessageDelta = serde_json::from_value(payload)?;
                if delta.delta.stop_reason.is_some() {
                    self.stop_reason = delta.delta.stop_reason;
                }
            }
            "message_stop" => {
                self.finished = true;
                events.push(ModelEvent::Completed(self.take_turn()));
            }
            "error" => {
                let err: ErrorEvent = serde_json::from_value(payload)?;
                return Err(ProviderError::Api {
                    kind: err.error.kind,
                    message: err.error.message,
                });
            }
            "message_start" | "ping" => {}
            other => debug!(event = other, "ignoring unknown stream event"),
        }
        Ok(events)
    }

    fn close_block(&mut self, partial: PartialBlock) -> Result<ContentBlock, ProviderError> {
        let PartialBlock { mut block, input_json } = partial;
        if let ContentBlock::ToolUse { input, .. } | ContentBlock::ServerToolUse { input, .. } = &mut block {
            *input = if input_json.trim().is_empty() {
                if input.is_null() { json!({}) } else { input.take() }
            } else {
                serde_json::from_str(&input_json)?
            };
        }
        if let ContentBlock::ServerToolUse { id, name, .. } = &block {
            self.server_tool_names.insert(id.clone(), name.clone());
        }
        Ok(block)
    }

    fn announce(&self, block: &ContentBlock) -> Option<ModelEvent> {
        match block {
            ContentBlock::ServerToolUse { id, name, input } => Some(ModelEvent::ServerToolUse {
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            }),
            ContentBlock::WebSearchToolResult { tool_use_id, content } => {
                Some(ModelEvent::ServerToolResult {
                    tool_use_id: tool_use_id.clone(),
                    name: self
                        .server_tool_names
                        .get(tool_use_id)
                        .cloned()
                        .unwrap_or_else(|| "web_search".to_owned()),
                    content: content.clone(),
                })
            }
            _ => None,
        }
    }

    fn take_turn(&mut self) -> ModelTurn {
        let content = std::mem::take(&mut self.closed)
            .into_values()
            .filter(|block| !matches!(block, ContentBlock::Text { text } if text.is_empty()))
            .collect();
        ModelTurn {
            content,
            stop_reason: self.stop_reason.take(),
        }
    }
}
