//! Pattern Detector
//!
//! Tool-free: it only reads summaries the analyzer already produced. Minor
//! shape problems are defaulted by `PatternSet` itself; a response that is
//! not JSON at all is an error for the engine to absorb.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use super::context::PipelineContext;
use super::prompts;
use crate::inference::{complete_structured, SessionLog};
use crate::llm::LLMRequest;
use crate::report::{PatternSet, RepositoryAnalysis};
use crate::retry::{ActionError, RetryError};

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("Pattern detection failed: {0}")]
    Inference(#[from] RetryError),

    #[error("Pattern response could not be decoded: {0}")]
    Decode(String),
}

#[async_trait]
pub trait PatternDetection: Send + Sync {
    async fn detect(
        &self,
        analyses: &[RepositoryAnalysis],
        date: &str,
        instructions: Option<&str>,
        sessions: &SessionLog,
    ) -> Result<PatternSet, PatternError>;
}

pub struct PatternDetector {
    context: PipelineContext,
}

impl PatternDetector {
    pub fn new(context: PipelineContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl PatternDetection for PatternDetector {
    async fn detect(
        &self,
        analyses: &[RepositoryAnalysis],
        date: &str,
        instructions: Option<&str>,
        sessions: &SessionLog,
    ) -> Result<PatternSet, PatternError> {
        if analyses.is_empty() {
            debug!("No repository summaries, skipping pattern detection");
            return Ok(PatternSet::default());
        }

        let messages = prompts::pattern_messages(instructions, analyses, date);
        let client = self.context.llm_client.clone();
        sessions.begin("patterns");

        let value = self
            .context
            .retry
            .execute("patterns", &self.context.poll, move |_attempt| {
                let client = client.clone();
                let messages = messages.clone();
                async move {
                    let request = LLMRequest::new(messages).with_temperature(0.3);
                    let patterns: PatternSet = complete_structured(client.as_ref(), request).await?;
                    serde_json::to_value(patterns).map_err(|e| ActionError::permanent(e.to_string()))
                }
            })
            .await?;

        let patterns: PatternSet =
            serde_json::from_value(value).map_err(|e| PatternError::Decode(e.to_string()))?;
        info!(patterns = patterns.patterns.len(), themes = patterns.themes.len(), "Detected patterns");
        Ok(patterns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockLLMClient, MockResponse};
    use crate::pipeline::test_support::context;
    use std::sync::Arc;

    fn analyses() -> Vec<RepositoryAnalysis> {
        vec![
            RepositoryAnalysis::fallback("api", 4),
            RepositoryAnalysis::fallback("web", 2),
        ]
    }

    #[tokio::test]
    async fn test_missing_fields_default() {
        let client = Arc::new(MockLLMClient::new());
        client.add_response(MockResponse::text(
            "```json\n{\"patterns\": [\"shared retry work\"], \"themes\": null}\n```",
        ));
        let detector = PatternDetector::new(context(client.clone()));

        let patterns = detector
            .detect(&analyses(), "2024-05-01", None, &SessionLog::new())
            .await
            .unwrap();

        assert_eq!(patterns.patterns, vec!["shared retry work".to_string()]);
        assert!(patterns.themes.is_empty());
        assert!(patterns.stack_trends.is_empty());
        assert_eq!(patterns.balance_assessment, "");
        assert!(client.requests()[0].effective_tools().is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_response_is_an_error() {
        let client = Arc::new(
            MockLLMClient::new().with_responder(|_| MockResponse::text("I could not find any patterns.")),
        );
        let detector = PatternDetector::new(context(client));

        let result = detector
            .detect(&analyses(), "2024-05-01", None, &SessionLog::new())
            .await;
        assert!(matches!(result, Err(PatternError::Inference(_))));
    }

    #[tokio::test]
    async fn test_no_summaries_skips_inference() {
        let client = Arc::new(MockLLMClient::new());
        let detector = PatternDetector::new(context(client.clone()));
        let patterns = detector
            .detect(&[], "2024-05-01", None, &SessionLog::new())
            .await
            .unwrap();
        assert!(patterns.is_empty());
        assert_eq!(client.call_count(), 0);
    }
}
