//! Inference request/response types
//!
//! Provider-neutral shapes shared by every `LLMClient` implementation.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instructions
    System,
    /// User message
    User,
    /// Assistant (LLM) response
    Assistant,
    /// Tool response
    Tool,
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender
    pub role: MessageRole,
    /// Text content of the message
    pub content: String,
    /// Tool calls made by the assistant (only for Assistant role)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Tool call ID this message responds to (only for Tool role)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    /// Creates a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Creates a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Creates an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Creates an assistant message with tool calls
    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    /// Creates a tool response message
    pub fn tool_response(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
        }
    }
}

/// A tool call requested by the LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    pub call_id: String,
    /// Name of the tool to call
    pub name: String,
    /// Arguments to pass to the tool (JSON object)
    pub arguments: serde_json::Value,
}

/// Definition of a tool available to the LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Name of the tool
    pub name: String,
    /// Description of what the tool does
    pub description: String,
    /// JSON Schema for the tool's parameters
    pub parameters: serde_json::Value,
}

/// Request to send to the LLM
#[derive(Debug, Clone)]
pub struct LLMRequest {
    /// Conversation messages
    pub messages: Vec<ChatMessage>,
    /// Tools available for the LLM to use
    pub tools: Vec<ToolDefinition>,
    /// Temperature for response generation (0.0 - 1.0)
    pub temperature: Option<f32>,
    /// When false the provider must not be offered any tools, even if `tools`
    /// is populated. Used by synthesis-only calls.
    pub allow_tools: bool,
}

impl LLMRequest {
    /// Creates a new request with messages
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            tools: Vec::new(),
            temperature: None,
            allow_tools: true,
        }
    }

    /// Adds tools to the request
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Sets the temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Disables tool use for this request
    pub fn without_tools(mut self) -> Self {
        self.tools.clear();
        self.allow_tools = false;
        self
    }

    /// Tools that may actually be sent to the provider
    pub fn effective_tools(&self) -> &[ToolDefinition] {
        if self.allow_tools {
            &self.tools
        } else {
            &[]
        }
    }
}

/// Response from the LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    /// Text content of the response
    pub content: String,
    /// Tool calls requested by the LLM
    pub tool_calls: Vec<ToolCall>,
    /// Time taken for the request
    pub response_time: Duration,
}

impl LLMResponse {
    /// Creates a new response with just content
    pub fn text(content: impl Into<String>, response_time: Duration) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
            response_time,
        }
    }

    /// Creates a new response with tool calls
    pub fn with_tool_calls(
        content: impl Into<String>,
        tool_calls: Vec<ToolCall>,
        response_time: Duration,
    ) -> Self {
        Self {
            content: content.into(),
            tool_calls,
            response_time,
        }
    }

    /// Returns true if the response contains tool calls
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}
