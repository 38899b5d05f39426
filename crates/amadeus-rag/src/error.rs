use thiserror::Error;

/// Errors raised by ingestion, embedding and vector-store operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// An HTTP request failed (network error, TLS, body decode, ...).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote service answered with a non-2xx status.
    #[error("{service} returned HTTP {status}: {body}")]
    Upstream {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// A filesystem I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize or deserialize JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An OOXML container (docx/pptx) could not be opened.
    #[error("ZIP archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A CSV file could not be parsed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The document parsed but yielded nothing usable.
    #[error("failed to parse {file_type} document: {message}")]
    Parse { file_type: String, message: String },

    /// A required credential or endpoint is missing.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// The embedding provider returned an unexpected payload.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// The in-process store is unusable (its lock was poisoned).
    #[error("vector store error: {0}")]
    Store(String),

    /// A blocking parser task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
