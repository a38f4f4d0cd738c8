use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::decode::decode;
use crate::llm::{ChatMessage, LLMClient, LLMRequest};
use crate::report::ValidationError;
use crate::retry::ActionError;
use crate::tools::ToolSystem;

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Inference backend error: {0}")]
    Backend(#[from] crate::llm::BackendError),

    #[error("Invalid model output: {0}")]
    Validation(#[from] ValidationError),

    #[error("No narrative produced within {steps} tool steps")]
    StepLimit { steps: usize },

    #[error("Model returned an empty response")]
    EmptyResponse,
}

impl InferenceError {
    /// Timeouts, rate limits, bad output and step exhaustion are worth a retry;
    /// authentication and configuration problems are not.
    pub fn is_transient(&self) -> bool {
        match self {
            InferenceError::Backend(e) => e.is_transient(),
            _ => true,
        }
    }
}

impl From<InferenceError> for ActionError {
    fn from(error: InferenceError) -> Self {
        if error.is_transient() {
            ActionError::Transient(error.to_string())
        } else {
            ActionError::Permanent(error.to_string())
        }
    }
}

/// Drive a tool-using conversation for at most `max_steps` model calls.
///
/// Each step is one `chat` call. Tool calls are answered from `tools` and fed
/// back; the first response without tool calls ends the loop. If the budget
/// runs out the last non-empty text seen is returned instead.
pub async fn run_tool_loop(
    client: &dyn LLMClient,
    mut messages: Vec<ChatMessage>,
    tools: &ToolSystem,
    max_steps: usize,
) -> Result<String, InferenceError> {
    let definitions = tools.as_tool_definitions();
    let mut last_text = String::new();

    for step in 1..=max_steps {
        let request = LLMRequest::new(messages.clone())
            .with_tools(definitions.clone())
            .with_temperature(0.3);

        let response = client.chat(request).await?;
        debug!(step, max_steps, tool_calls = response.tool_calls.len(), "Tool loop step");

        if !response.content.trim().is_empty() {
            last_text = response.content.trim().to_string();
        }

        if !response.has_tool_calls() {
            return if last_text.is_empty() {
                Err(InferenceError::EmptyResponse)
            } else {
                Ok(last_text)
            };
        }

        messages.push(ChatMessage::assistant_with_tools(
            &response.content,
            response.tool_calls.clone(),
        ));

        for call in &response.tool_calls {
            let output = tools
                .execute_for_model(&call.name, call.arguments.clone())
                .await;
            messages.push(ChatMessage::tool_response(&call.call_id, output.to_string()));
        }
    }

    if last_text.is_empty() {
        warn!(max_steps, "Tool loop exhausted without narrative");
        Err(InferenceError::StepLimit { steps: max_steps })
    } else {
        warn!(max_steps, "Tool loop exhausted, using last narrative");
        Ok(last_text)
    }
}

/// One tool-free call decoded into `T`.
pub async fn complete_structured<T: DeserializeOwned>(
    client: &dyn LLMClient,
    request: LLMRequest,
) -> Result<T, InferenceError> {
    let response = client.chat(request.without_tools()).await?;
    if response.content.trim().is_empty() {
        return Err(InferenceError::EmptyResponse);
    }
    Ok(decode(&response.content)?)
}
