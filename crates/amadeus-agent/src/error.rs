use thiserror::Error;

/// Failures talking to the LLM provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response before streaming started.
    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// An `error` event inside the stream.
    #[error("{kind}: {message}")]
    Api { kind: String, message: String },

    #[error("malformed provider event: {0}")]
    Json(#[from] serde_json::Error),

    /// The connection closed before `message_stop`.
    #[error("provider stream ended before the message was complete")]
    Truncated,
}

/// Errors surfaced by an agent session.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(
        "Anthropic API key is required. Set ANTHROPIC_API_KEY environment variable or pass an API key in the agent config."
    )]
    MissingCredential,

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("agent stopped after {0} steps without a final answer")]
    StepLimit(usize),

    #[error("model stream ended without a completed turn")]
    IncompleteTurn,

    #[error("checkpoint store failure: {0}")]
    Checkpoint(String),

    /// The consumer dropped the event stream.
    #[error("event consumer disconnected")]
    Disconnected,
}
