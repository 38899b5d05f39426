//! Vector store abstraction.
//!
//! [`VectorStore`] is the seam between the adapters and the hosted
//! database. [`supabase::SupabaseStore`] talks to a PostgREST `documents`
//! table; [`memory::MemoryStore`] keeps everything in-process.

pub mod memory;
pub mod supabase;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RagError;
use crate::types::{Document, DocumentChunk, MetadataFilter};

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Embed and persist `chunks`. Returns how many rows were written.
    async fn add_documents(&self, chunks: Vec<DocumentChunk>) -> Result<usize, RagError>;

    /// Top-`k` passages most similar to `query` whose metadata contains
    /// every entry of `filter`.
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<Document>, RagError>;

    /// Raw metadata of every stored chunk matching `filter`.
    async fn list_metadata(&self, filter: &MetadataFilter) -> Result<Vec<Value>, RagError>;

    /// Short backend name for logs and health output.
    fn kind(&self) -> &'static str;
}
