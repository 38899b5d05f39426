//! ReAct loop: call the model, run requested tools, repeat until the model
//! answers without tool calls.
//!
//! The loop runs on its own task and hands events to the caller through a
//! bounded channel. Dropping the returned stream closes the channel; the
//! next send fails and the task stops, which also drops the in-flight
//! provider request.

use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::checkpoint::Checkpointer;
use crate::error::AgentError;
use crate::event::{AgentEvent, AgentMessage, AgentStream, ContentPart, MessageChunk};
use crate::provider::{ChatModel, ChatTurn, ContentBlock, ModelEvent, ModelRequest, Role};
use crate::tools::ToolRegistry;

const EVENT_BUFFER: usize = 64;

/// Fixed per-session model parameters.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub model: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_steps: usize,
    /// Provider-native tool specs (e.g. web search) sent verbatim.
    pub provider_tools: Vec<Value>,
}

pub struct AgentRuntime {
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    checkpointer: Arc<dyn Checkpointer>,
    settings: RuntimeSettings,
}

type EventSender = mpsc::Sender<Result<AgentEvent, AgentError>>;

async fn emit(tx: &EventSender, event: AgentEvent) -> Result<(), AgentError> {
    tx.send(Ok(event)).await.map_err(|_| AgentError::Disconnected)
}

impl AgentRuntime {
    pub fn new(
        model: Arc<dyn ChatModel>,
        tools: ToolRegistry,
        checkpointer: Arc<dyn Checkpointer>,
        settings: RuntimeSettings,
    ) -> Self {
        Self {
            model,
            tools,
            checkpointer,
            settings,
        }
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Start a run for `message` on `thread_id`.
    pub fn run(self: Arc<Self>, thread_id: String, message: String) -> AgentStream {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let span = info_span!("agent_run", thread_id = %thread_id);

        tokio::spawn(
            async move {
                match self.drive(&thread_id, message, &tx).await {
                    Ok(()) => {}
                    Err(AgentError::Disconnected) => debug!("consumer went away; run abandoned"),
                    Err(e) => {
                        warn!(error = %e, "agent run failed");
                        let _ = tx.send(Err(e)).await;
                    }
                }
            }
            .instrument(span),
        );

        Box::pin(ReceiverStream::new(rx))
    }

    fn request(&self, history: &[ChatTurn]) -> ModelRequest {
        let mut tools = self.tools.definitions();
        tools.extend(self.settings.provider_tools.iter().cloned());
        ModelRequest {
            model: self.settings.model.clone(),
            system: self.settings.system_prompt.clone(),
            messages: history.to_vec(),
            tools,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        }
    }

    async fn drive(&self, thread_id: &str, message: String, tx: &EventSender) -> Result<(), AgentError> {
        let mut history = self.checkpointer.load(thread_id).await?;
        info!(prior_turns = history.len(), "starting agent run");
        history.push(ChatTurn::user_text(message));

        for step in 1..=self.settings.max_steps {
            let mut stream = self.model.stream(self.request(&history)).await?;
            let mut completed = None;

            while let Some(event) = stream.next().await {
                match event? {
                    ModelEvent::TextDelta(text) => {
                        emit(tx, AgentEvent::Message { chunk: MessageChunk::model_text(text) }).await?;
                    }
                    ModelEvent::ServerToolUse { id, name, input } => {
                        let part = ContentPart::ToolUse { id, name, input };
                        emit(tx, AgentEvent::Message { chunk: MessageChunk::model(vec![part]) }).await?;
                    }
                    ModelEvent::ServerToolResult { tool_use_id, name, content } => {
                        let part = ContentPart::ToolResult { tool_use_id, name, content };
                        emit(tx, AgentEvent::Message { chunk: MessageChunk::model(vec![part]) }).await?;
                    }
                    ModelEvent::Completed(turn) => {
                        completed = Some(turn);
                        break;
                    }
                }
            }
            let turn = completed.ok_or(AgentError::IncompleteTurn)?;

            let calls = turn.tool_calls();
            emit(
                tx,
                AgentEvent::Update {
                    node: "agent".into(),
                    messages: vec![AgentMessage::Assistant {
                        content: turn.text(),
                        tool_calls: calls.clone(),
                    }],
                },
            )
            .await?;

            let paused = turn.is_paused();
            debug!(step, tool_calls = calls.len(), stop_reason = ?turn.stop_reason, "model turn finished");
            if !turn.content.is_empty() {
                history.push(ChatTurn {
                    role: Role::Assistant,
                    content: turn.content,
                });
            }

            if calls.is_empty() {
                if paused {
                    continue;
                }
                self.checkpointer.save(thread_id, history).await?;
                info!(steps = step, "agent run complete");
                return Ok(());
            }

            let mut results = Vec::with_capacity(calls.len());
            let mut tool_messages = Vec::with_capacity(calls.len());
            for call in calls {
                let output = self.tools.call(&call.name, call.args).await;
                emit(
                    tx,
                    AgentEvent::Message {
                        chunk: MessageChunk::tool_output(call.name.clone(), output.content.clone()),
                    },
                )
                .await?;
                tool_messages.push(AgentMessage::Tool {
                    tool_call_id: call.id.clone(),
                    name: call.name,
                    content: output.content.clone(),
                });
                results.push(ContentBlock::ToolResult {
                    tool_use_id: call.id,
                    content: output.content,
                    is_error: output.is_error,
                });
            }
            emit(
                tx,
                AgentEvent::Update {
                    node: "tools".into(),
                    messages: tool_messages,
                },
            )
            .await?;
            history.push(ChatTurn {
                role: Role::User,
                content: results,
            });
        }

        Err(AgentError::StepLimit(self.settings.max_steps))
    }
}
