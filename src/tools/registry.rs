//! Tool registry
//!
//! Holds the tools offered to one batch call and turns them into
//! `ToolDefinition`s for the `LLMClient`.

use std::sync::Arc;

use super::activity_tools::{
    GetCommitTool, ListBatchCommitsTool, ListIssuesTool, ListPullRequestsTool, ToolScope,
};
use super::trait_def::Tool;
use crate::llm::ToolDefinition;

pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Registry with every activity tool bound to `scope`.
    pub fn for_scope(scope: Arc<ToolScope>) -> Self {
        let tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(ListBatchCommitsTool::new(Arc::clone(&scope))),
            Arc::new(GetCommitTool::new(Arc::clone(&scope))),
            Arc::new(ListPullRequestsTool::new(Arc::clone(&scope))),
            Arc::new(ListIssuesTool::new(scope)),
        ];

        Self { tools }
    }

    pub fn as_tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.schema(),
            })
            .collect()
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
