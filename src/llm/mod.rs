//! Inference service abstraction
//!
//! The pipeline only ever talks to `dyn LLMClient`. Concrete backends are the
//! genai-backed client for real providers and a scripted mock for tests.

mod client;
mod error;
mod genai;
mod mock;
mod selector;
mod types;

pub use client::LLMClient;
pub use error::BackendError;
pub use genai::GenAIClient;
pub use mock::{MockLLMClient, MockResponse};
pub use selector::{parse_provider, select_llm_client, SelectedClient};
pub use types::{ChatMessage, LLMRequest, LLMResponse, MessageRole, ToolCall, ToolDefinition};
