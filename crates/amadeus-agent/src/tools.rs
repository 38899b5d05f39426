//! Client-side tools the model may call.

use std::collections::BTreeMap;
use std::sync::Arc;

use amadeus_rag::{RetrievalQuery, Retriever};
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, warn};

pub const RETRIEVAL_TOOL_NAME: &str = "retrieve_knowledge";

/// Outcome of a tool call, fed back to the model as a `tool_result`.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(content: impl Into<String>) -> Self {
        Self { content: content.into(), is_error: false }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self { content: content.into(), is_error: true }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema of the `input` object.
    fn input_schema(&self) -> Value;
    async fn call(&self, input: Value) -> ToolOutput;
}

/// Knowledge-base search over uploaded course material.
pub struct RetrievalTool {
    retriever: Arc<Retriever>,
}

impl RetrievalTool {
    pub fn new(retriever: Arc<Retriever>) -> Self {
        Self { retriever }
    }
}

#[async_trait]
impl Tool for RetrievalTool {
    fn name(&self) -> &str {
        RETRIEVAL_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Search and retrieve relevant documents from the Amadeus knowledge base. \
         Use this tool to find documentation and reference materials. \
         Always use this tool when a student asks questions that might be answered by uploaded documents."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query to find relevant documents"
                },
                "category": {
                    "type": "string",
                    "description": "Filter by document category (tutorial, reference, example, documentation)"
                },
                "fileType": {
                    "type": "string",
                    "description": "Filter by file type (pdf, docx, txt, csv, pptx)"
                },
                "limit": {
                    "type": "number",
                    "default": 5,
                    "description": "Maximum number of documents to retrieve (default: 5)"
                }
            },
            "required": ["query"]
        })
    }

    async fn call(&self, input: Value) -> ToolOutput {
        match serde_json::from_value::<RetrievalQuery>(input) {
            Ok(query) => ToolOutput::ok(self.retriever.retrieve(&query).await),
            Err(e) => ToolOutput::error(format!("Invalid arguments for {RETRIEVAL_TOOL_NAME}: {e}")),
        }
    }
}

/// Named set of tools, advertised to the model in a stable order.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.tools.keys()).finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_owned(), tool);
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    /// Tool definitions in the provider's `tools` format.
    pub fn definitions(&self) -> Vec<Value> {
        self.tools
            .values()
            .map(|tool| {
                json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "input_schema": tool.input_schema(),
                })
            })
            .collect()
    }

    pub async fn call(&self, name: &str, input: Value) -> ToolOutput {
        let Some(tool) = self.tools.get(name) else {
            warn!(tool = name, "model requested an unknown tool");
            return ToolOutput::error(format!("Unknown tool: {name}"));
        };
        let output = tool.call(input).await;
        debug!(tool = name, chars = output.content.len(), is_error = output.is_error, "tool finished");
        output
    }
}

#[cfg(test)]
mod test {
    use amadeus_rag::{MemoryStore, RagError, VectorStore};

    use super::*;

    struct NoEmbeddings;

    #[async_trait]
    impl amadeus_rag::Embedder for NoEmbeddings {
        async fn embed_documents(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
            Err(RagError::NotConfigured("OPENAI_API_KEY"))
        }
    }

    fn registry() -> ToolRegistry {
        let store: Arc<dyn VectorStore> = Arc::new(MemoryStore::new(Arc::new(NoEmbeddings)));
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(RetrievalTool::new(Arc::new(Retriever::new(store)))));
        registry
    }

    #[test]
    fn advertises_retrieval_schema() {
        let defs = registry().definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0]["name"], RETRIEVAL_TOOL_NAME);
        assert_eq!(defs[0]["input_schema"]["required"], json!(["query"]));
        assert_eq!(defs[0]["input_schema"]["properties"]["limit"]["default"], 5);
    }

    #[tokio::test]
    async fn retrieval_failure_comes_back_as_text() {
        let out = registry()
            .call(RETRIEVAL_TOOL_NAME, json!({"query": "fare rules"}))
            .await;
        assert!(!out.is_error);
        assert_eq!(
            out.content,
            "Error retrieving documents: OPENAI_API_KEY is not configured. Please try rephrasing your query."
        );
    }

    #[tokio::test]
    async fn bad_arguments_and_unknown_tools_are_errors() {
        let registry = registry();
        assert!(registry.call(RETRIEVAL_TOOL_NAME, json!({"limit": 2})).await.is_error);
        let unknown = registry.call("calculator", json!({})).await;
        assert!(unknown.is_error);
        assert_eq!(unknown.content, "Unknown tool: calculator");
    }
}
