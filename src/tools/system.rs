use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use super::activity_tools::ToolScope;
use super::registry::ToolRegistry;
use super::trait_def::ToolError;
use crate::llm::ToolDefinition;

/// Executes tool calls for one batch.
pub struct ToolSystem {
    registry: ToolRegistry,
}

impl ToolSystem {
    pub fn new(scope: ToolScope) -> Self {
        Self {
            registry: ToolRegistry::for_scope(Arc::new(scope)),
        }
    }

    pub async fn execute(&self, tool_name: &str, arguments: Value) -> Result<Value, ToolError> {
        debug!(tool = tool_name, args = ?arguments, "Executing tool");

        let tool = self
            .registry
            .get_tool(tool_name)
            .ok_or_else(|| ToolError::UnknownTool(tool_name.to_string()))?;

        let result = tool.execute(arguments).await;
        if let Err(e) = &result {
            warn!(tool = tool_name, error = %e, "Tool execution failed");
        }
        result
    }

    /// Like `execute`, but failures become a JSON error the model can read.
    pub async fn execute_for_model(&self, tool_name: &str, arguments: Value) -> Value {
        match self.execute(tool_name, arguments).await {
            Ok(value) => value,
            Err(e) => json!({ "error": e.to_string() }),
        }
    }

    pub fn as_tool_definitions(&self) -> Vec<ToolDefinition> {
        self.registry.as_tool_definitions()
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.registry.tool_names()
    }

    pub fn tool_count(&self) -> usize {
        self.registry.len()
    }
}
