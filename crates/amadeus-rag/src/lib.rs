//! Knowledge-base plumbing for the learning assistant.
//!
//! Two halves share this crate:
//!
//! - **Ingestion** ([`ingest::Ingestor`]): validates uploaded files, runs
//!   the format parser, splits text into overlapping chunks, sanitises them
//!   and hands them to a [`store::VectorStore`].
//! - **Retrieval** ([`retrieval::Retriever`]): similarity search with
//!   optional metadata filters, rendered as plain text for the model.
//!
//! The vector store and the embedding provider sit behind traits so the
//! server can wire Supabase + OpenAI in production and an in-memory store
//! in development or tests.

pub mod embeddings;
pub mod error;
pub mod ingest;
pub mod loader;
pub mod retrieval;
pub mod sanitize;
pub mod splitter;
pub mod store;
pub mod types;

pub use embeddings::{Embedder, OpenAiEmbedder};
pub use error::RagError;
pub use ingest::{
    DocumentListing, DocumentSummary, FileOutcome, FileUpload, Ingestor, UploadReport, UploadSummary,
};
pub use retrieval::{RetrievalQuery, Retriever};
pub use store::{memory::MemoryStore, supabase::SupabaseStore, VectorStore};
pub use types::{Category, ChunkMetadata, Document, DocumentChunk, FileType, MetadataFilter};
