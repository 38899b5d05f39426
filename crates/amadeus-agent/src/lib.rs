//! Tool-augmented tutoring agent.
//!
//! [`session::AgentSession`] binds a persona prompt, the knowledge-base
//! retrieval tool and provider web search to a ReAct loop
//! ([`runtime::AgentRuntime`]) with per-thread memory
//! ([`checkpoint::Checkpointer`]). Its raw [`event::AgentEvent`]s go through
//! [`normalizer::Normalizer`] to become the [`event::StreamEvent`]s clients
//! see; [`transcript::Transcript`] folds those back into chat messages.

pub mod checkpoint;
pub mod error;
pub mod event;
pub mod normalizer;
pub mod prompts;
pub mod provider;
pub mod runtime;
pub mod session;
pub mod sse;
pub mod tools;
pub mod transcript;

pub use checkpoint::{Checkpointer, MemoryCheckpointer};
pub use error::{AgentError, ProviderError};
pub use event::{AgentEvent, AgentMessage, AgentStream, StreamEvent};
pub use normalizer::{Normalizer, should_suppress};
pub use session::{AgentConfig, AgentDeps, AgentSession, Persona, thread_id_or_default};
pub use sse::{SseDecoder, SseFrame};
pub use tools::RETRIEVAL_TOOL_NAME;
pub use transcript::{ChatMessage, ChatRole, ToolCall, Transcript};
