//! Global Synthesizer
//!
//! Always yields a report: the cached and retried inference path when it
//! validates, otherwise the statistical fallback.

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use super::analyzer::AnalysisError;
use super::context::PipelineContext;
use super::prompts;
use crate::inference::{complete_structured, InferenceError, SessionLog};
use crate::llm::LLMRequest;
use crate::report::{GlobalSynthesis, SynthesisInputs, SynthesisPayload};
use crate::retry::ActionError;

pub const SYNTHESIS_ACTION: &str = "global_synthesis";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisOutcome {
    pub report: GlobalSynthesis,
    pub used_fallback: bool,
}

#[async_trait]
pub trait Synthesis: Send + Sync {
    async fn synthesize(
        &self,
        inputs: SynthesisInputs<'_>,
        instructions: Option<&str>,
        sessions: &SessionLog,
    ) -> SynthesisOutcome;
}

pub struct GlobalSynthesizer {
    context: PipelineContext,
}

impl GlobalSynthesizer {
    pub fn new(context: PipelineContext) -> Self {
        Self { context }
    }

    async fn infer(
        &self,
        inputs: SynthesisInputs<'_>,
        instructions: Option<&str>,
        sessions: &SessionLog,
    ) -> Result<GlobalSynthesis, AnalysisError> {
        let summaries: Vec<String> = inputs.analyses.iter().map(|a| a.compact()).collect();
        let args = json!({
            "model": self.context.model_id(),
            "date": inputs.date,
            "stats": inputs.stats,
            "summaries": summaries,
            "patterns": inputs.patterns,
            "instructions": instructions,
        });
        let messages = prompts::synthesis_messages(instructions, inputs);
        let client = self.context.llm_client.clone();
        let retry = self.context.retry.clone();
        let poll = self.context.poll;

        let payload: SynthesisPayload = self
            .context
            .cache
            .fetch(SYNTHESIS_ACTION, &self.context.versions.synthesis, &args, || async move {
                sessions.begin("synthesis");
                let value = retry
                    .execute("synthesis", &poll, move |_attempt| {
                        let client = client.clone();
                        let messages = messages.clone();
                        async move {
                            let request = LLMRequest::new(messages).with_temperature(0.4);
                            let payload: SynthesisPayload =
                                complete_structured(client.as_ref(), request).await?;
                            payload
                                .validate()
                                .map_err(|e| ActionError::from(InferenceError::Validation(e)))?;
                            serde_json::to_value(payload).map_err(|e| ActionError::permanent(e.to_string()))
                        }
                    })
                    .await?;
                serde_json::from_value::<SynthesisPayload>(value)
                    .map_err(|e| AnalysisError::Decode(e.to_string()))
            })
            .await?;

        let report = payload.into_synthesis(inputs);
        report
            .validate()
            .map_err(|e| AnalysisError::Decode(e.to_string()))?;
        Ok(report)
    }
}

#[async_trait]
impl Synthesis for GlobalSynthesizer {
    async fn synthesize(
        &self,
        inputs: SynthesisInputs<'_>,
        instructions: Option<&str>,
        sessions: &SessionLog,
    ) -> SynthesisOutcome {
        if inputs.stats.total_commits == 0 {
            info!(date = inputs.date, "No commits, using statistical report");
            return SynthesisOutcome {
                report: GlobalSynthesis::fallback(inputs),
                used_fallback: true,
            };
        }

        match self.infer(inputs, instructions, sessions).await {
            Ok(report) => SynthesisOutcome {
                report,
                used_fallback: false,
            },
            Err(e) => {
                warn!(date = inputs.date, error = %e, "Synthesis failed, using statistical report");
                SynthesisOutcome {
                    report: GlobalSynthesis::fallback(inputs),
                    used_fallback: true,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockLLMClient, MockResponse};
    use crate::pipeline::test_support::context;
    use crate::report::{ActivityStats, PatternSet, RepositoryAnalysis};
    use std::sync::Arc;

    fn stats(total_commits: usize) -> ActivityStats {
        ActivityStats {
            total_commits,
            total_repos: 2,
            ..Default::default()
        }
    }

    fn inputs<'a>(
        analyses: &'a [RepositoryAnalysis],
        patterns: &'a PatternSet,
        stats: &'a ActivityStats,
    ) -> SynthesisInputs<'a> {
        SynthesisInputs {
            date: "2024-05-01",
            analyses,
            patterns,
            stats,
            primary_languages: &[],
        }
    }

    #[tokio::test]
    async fn test_partial_suggestion_empties_the_list() {
        let client = Arc::new(MockLLMClient::new());
        client.add_response(MockResponse::json(json!({
            "title": "A focused day",
            "narrative": "Retry and cache work landed.",
            "highlights": ["retry"],
            "suggestions": [
                {"id": "s1", "title": "Add metrics", "category": "ops", "priority": "low"},
                {"id": "s2", "title": "", "category": "ops", "priority": "high"}
            ],
            "metrics": {"productivityScore": 14}
        })));
        let synthesizer = GlobalSynthesizer::new(context(client));
        let analyses = vec![RepositoryAnalysis::fallback("api", 25)];
        let patterns = PatternSet::default();
        let stats = stats(25);

        let outcome = synthesizer
            .synthesize(inputs(&analyses, &patterns, &stats), None, &SessionLog::new())
            .await;

        assert!(!outcome.used_fallback);
        assert_eq!(outcome.report.title, "A focused day");
        assert!(outcome.report.suggestions.is_empty());
        assert_eq!(outcome.report.metrics.productivity_score, 10);
        assert_eq!(outcome.report.metrics.total_commits, 25);
        assert_eq!(outcome.report.repo_summaries, analyses);
    }

    #[tokio::test]
    async fn test_exhausted_inference_uses_fallback() {
        let client = Arc::new(MockLLMClient::new().with_responder(|_| MockResponse::text("not json")));
        let synthesizer = GlobalSynthesizer::new(context(client.clone()));
        let analyses = vec![
            RepositoryAnalysis::fallback("api", 25),
            RepositoryAnalysis::fallback("web", 4),
        ];
        let patterns = PatternSet::default();
        let stats = stats(29);

        let outcome = synthesizer
            .synthesize(inputs(&analyses, &patterns, &stats), None, &SessionLog::new())
            .await;

        assert!(outcome.used_fallback);
        assert_eq!(outcome.report.highlights[0], "api: 25 commits — updates and fixes");
        assert_eq!(outcome.report.metrics.productivity_score, 3);
        assert_eq!(outcome.report.metrics.code_quality_trend, "stable");
        assert!(outcome.report.suggestions.is_empty());
        assert!(outcome.report.validate().is_ok());
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn test_empty_day_skips_inference() {
        let client = Arc::new(MockLLMClient::new());
        let synthesizer = GlobalSynthesizer::new(context(client.clone()));
        let patterns = PatternSet::default();
        let stats = ActivityStats::default();

        let outcome = synthesizer
            .synthesize(inputs(&[], &patterns, &stats), None, &SessionLog::new())
            .await;

        assert!(outcome.used_fallback);
        assert_eq!(outcome.report.metrics.total_commits, 0);
        assert_eq!(outcome.report.metrics.productivity_score, 1);
        assert_eq!(client.call_count(), 0);
    }
}
