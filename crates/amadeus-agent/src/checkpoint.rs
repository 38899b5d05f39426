//! Conversation memory keyed by thread id.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::AgentError;
use crate::provider::ChatTurn;

#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// History stored for `thread_id`; empty for a new thread.
    async fn load(&self, thread_id: &str) -> Result<Vec<ChatTurn>, AgentError>;

    /// Replace the stored history of `thread_id`.
    async fn save(&self, thread_id: &str, history: Vec<ChatTurn>) -> Result<(), AgentError>;
}

/// Process-local checkpoint store. Lost on restart.
///
/// Concurrent runs on the same thread are not serialised; the last one to
/// finish overwrites the other.
#[derive(Debug, Default)]
pub struct MemoryCheckpointer {
    threads: Mutex<HashMap<String, Vec<ChatTurn>>>,
}

impl MemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn thread_count(&self) -> usize {
        self.threads.lock().map(|t| t.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Checkpointer for MemoryCheckpointer {
    async fn load(&self, thread_id: &str) -> Result<Vec<ChatTurn>, AgentError> {
        let threads = self
            .threads
            .lock()
            .map_err(|e| AgentError::Checkpoint(e.to_string()))?;
        Ok(threads.get(thread_id).cloned().unwrap_or_default())
    }

    async fn save(&self, thread_id: &str, history: Vec<ChatTurn>) -> Result<(), AgentError> {
        let mut threads = self
            .threads
            .lock()
            .map_err(|e| AgentError::Checkpoint(e.to_string()))?;
        threads.insert(thread_id.to_owned(), history);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn threads_are_isolated() {
        let store = MemoryCheckpointer::new();
        store.save("t1", vec![ChatTurn::user_text("hi")]).await.unwrap();

        assert_eq!(store.load("t1").await.unwrap().len(), 1);
        assert!(store.load("t2").await.unwrap().is_empty());
        assert_eq!(store.thread_count(), 1);
    }

    #[tokio::test]
    async fn save_replaces_history() {
        let store = MemoryCheckpointer::new();
        store.save("t1", vec![ChatTurn::user_text("a")]).await.unwrap();
        store
            .save("t1", vec![ChatTurn::user_text("a"), ChatTurn::user_text("b")])
            .await
            .unwrap();
        assert_eq!(store.load("t1").await.unwrap().len(), 2);
    }
}
