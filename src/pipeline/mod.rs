pub mod analyzer;
pub mod context;
pub mod patterns;
pub mod prompts;
pub mod synthesis;

pub use analyzer::{
    batch_digest, AnalysisError, AnalysisRequest, BatchFailure, RepositoryAnalysisStep,
    RepositoryAnalyzer, RepositoryOutcome, SUMMARY_ACTION,
};
pub use context::{AnalyzerPolicy, CacheVersions, PipelineContext, DEFAULT_MAX_TOOL_STEPS};
pub use patterns::{PatternDetection, PatternDetector, PatternError};
pub use synthesis::{GlobalSynthesizer, Synthesis, SynthesisOutcome, SYNTHESIS_ACTION};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use super::PipelineContext;
    use crate::cache::{ActionCache, CachePolicy, MemoryCacheStore};
    use crate::llm::{LLMRequest, MockLLMClient};
    use crate::retry::{PollPolicy, RetryController, RetryPolicy};

    /// Context with millisecond backoff and polling and two attempts.
    pub fn context(client: Arc<MockLLMClient>) -> PipelineContext {
        let retry = RetryPolicy::default()
            .with_max_attempts(2)
            .with_initial_backoff(Duration::from_millis(1));
        let poll = PollPolicy::default()
            .with_initial_interval(Duration::from_millis(5))
            .with_step(Duration::from_millis(5))
            .with_max_interval(Duration::from_millis(20))
            .with_max_polls(500);
        PipelineContext::new(
            client,
            Arc::new(ActionCache::new(
                Arc::new(MemoryCacheStore::new()),
                CachePolicy::default(),
            )),
            Arc::new(RetryController::new(retry)),
        )
        .with_poll(poll)
    }

    pub fn is_task(request: &LLMRequest, task: &str) -> bool {
        request
            .messages
            .first()
            .map(|m| m.content.starts_with(task))
            .unwrap_or(false)
    }
}
