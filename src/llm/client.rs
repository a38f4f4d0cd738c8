use super::error::BackendError;
use super::types::{LLMRequest, LLMResponse};
use async_trait::async_trait;

/// The inference service as seen by the pipeline.
///
/// Implementations either return a response or fail; they never retry on
/// their own. Retries, caching and fallbacks live in the layers above.
#[async_trait]
pub trait LLMClient: Send + Sync {
    async fn chat(&self, request: LLMRequest) -> Result<LLMResponse, BackendError>;

    fn name(&self) -> &str;

    /// Model identifier, folded into cache fingerprints when present.
    fn model_info(&self) -> Option<String> {
        None
    }
}
