//! Repository Analyzer
//!
//! One repository at a time: every batch gets a retried, step-bounded tool
//! loop, then the batch notes are condensed into a cached and retried
//! structured summary. Whatever happens to the summary call, the analyzer
//! returns a summary; exhausted inference ends in the deterministic fallback.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::context::PipelineContext;
use super::prompts;
use crate::activity::{CommitBatch, CommitRecord, IssueRecord, PullRequestRecord};
use crate::inference::{complete_structured, run_tool_loop, InferenceError, SessionLog};
use crate::llm::LLMRequest;
use crate::report::{RepositoryAnalysis, RepositoryStats, SummaryPayload};
use crate::retry::{ActionError, RetryError};
use crate::tools::{ToolScope, ToolSystem};

pub const SUMMARY_ACTION: &str = "repository_summary";

#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    #[error("Analysis of {repository} failed: {message}")]
    Failed { repository: String, message: String },

    #[error("Analysis of {repository} timed out after {seconds}s")]
    Timeout { repository: String, seconds: u64 },

    #[error(transparent)]
    Retry(#[from] RetryError),

    #[error("Cached summary could not be decoded: {0}")]
    Decode(String),
}

/// Everything the analyzer needs for one repository.
#[derive(Clone, Copy)]
pub struct AnalysisRequest<'a> {
    pub repository: &'a str,
    pub batches: &'a [CommitBatch],
    pub date: &'a str,
    pub pull_requests: &'a [PullRequestRecord],
    pub issues: &'a [IssueRecord],
    pub instructions: &'a str,
    pub sessions: &'a SessionLog,
}

impl AnalysisRequest<'_> {
    pub fn commit_count(&self) -> usize {
        self.batches.iter().map(CommitBatch::len).sum()
    }

    fn commits(&self) -> Vec<CommitRecord> {
        self.batches
            .iter()
            .flat_map(|b| b.commits.iter().cloned())
            .collect()
    }

    fn stats(&self) -> RepositoryStats {
        let authors: BTreeSet<&str> = self
            .batches
            .iter()
            .flat_map(|b| b.commits.iter())
            .map(|c| c.author.trim())
            .filter(|a| !a.is_empty())
            .collect();
        RepositoryStats {
            pull_requests: self.pull_requests.len(),
            issues: self.issues.len(),
            authors: authors.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub index: usize,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryOutcome {
    pub analysis: RepositoryAnalysis,
    /// Batches whose retries ran out; their digest stood in for a narrative.
    pub failed_batches: Vec<BatchFailure>,
    pub used_fallback: bool,
}

/// Seam the workflow engine drives, one call per repository.
#[async_trait]
pub trait RepositoryAnalysisStep: Send + Sync {
    async fn analyze(&self, request: AnalysisRequest<'_>) -> Result<RepositoryOutcome, AnalysisError>;
}

pub struct RepositoryAnalyzer {
    context: PipelineContext,
}

impl RepositoryAnalyzer {
    pub fn new(context: PipelineContext) -> Self {
        Self { context }
    }

    async fn narrate_batch(
        &self,
        request: &AnalysisRequest<'_>,
        batch: &CommitBatch,
        commits: &[CommitRecord],
    ) -> Result<String, RetryError> {
        let scope = ToolScope {
            repository: request.repository.to_string(),
            batch: batch.clone(),
            commits: commits.to_vec(),
            pull_requests: request.pull_requests.to_vec(),
            issues: request.issues.to_vec(),
        };
        let messages =
            prompts::batch_messages(request.instructions, &scope, request.date, request.batches.len());
        let tools = Arc::new(ToolSystem::new(scope));
        let client = self.context.llm_client.clone();
        let max_steps = self.context.analyzer.max_tool_steps;

        let name = format!("batch:{}:{}", request.repository, batch.index);
        request.sessions.begin(name.clone());

        let value = self
            .context
            .retry
            .execute(&name, &self.context.poll, move |attempt| {
                let client = client.clone();
                let tools = tools.clone();
                let messages = messages.clone();
                async move {
                    debug!(attempt, "Batch inference attempt");
                    let text = run_tool_loop(client.as_ref(), messages, &tools, max_steps).await?;
                    Ok(Value::String(text))
                }
            })
            .await?;

        Ok(match value {
            Value::String(text) => text,
            other => other.to_string(),
        })
    }

    async fn summarize(
        &self,
        request: &AnalysisRequest<'_>,
        commit_count: usize,
        narratives: &[String],
    ) -> Result<SummaryPayload, AnalysisError> {
        let args = json!({
            "model": self.context.model_id(),
            "repository": request.repository,
            "date": request.date,
            "commitCount": commit_count,
            "instructions": request.instructions,
            "narratives": narratives,
        });
        let messages = prompts::summary_messages(
            request.instructions,
            request.repository,
            request.date,
            commit_count,
            narratives,
        );
        let client = self.context.llm_client.clone();
        let retry = self.context.retry.clone();
        let poll = self.context.poll;
        let name = format!("summary:{}", request.repository);
        let sessions = request.sessions;

        self.context
            .cache
            .fetch(SUMMARY_ACTION, &self.context.versions.summary, &args, || async move {
                sessions.begin(name.clone());
                let value = retry
                    .execute(&name, &poll, move |_attempt| {
                        let client = client.clone();
                        let messages = messages.clone();
                        async move {
                            let request = LLMRequest::new(messages).with_temperature(0.2);
                            let payload: SummaryPayload =
                                complete_structured(client.as_ref(), request).await?;
                            payload
                                .validate()
                                .map_err(|e| ActionError::from(InferenceError::Validation(e)))?;
                            serde_json::to_value(payload).map_err(|e| ActionError::permanent(e.to_string()))
                        }
                    })
                    .await?;
                serde_json::from_value::<SummaryPayload>(value)
                    .map_err(|e| AnalysisError::Decode(e.to_string()))
            })
            .await
    }
}

#[async_trait]
impl RepositoryAnalysisStep for RepositoryAnalyzer {
    async fn analyze(&self, request: AnalysisRequest<'_>) -> Result<RepositoryOutcome, AnalysisError> {
        let repository = request.repository;
        let commits = request.commits();
        let commit_count = commits.len();
        info!(repository, commits = commit_count, batches = request.batches.len(), "Analyzing repository");

        let mut narratives = Vec::with_capacity(request.batches.len());
        let mut failed_batches = Vec::new();
        for batch in request.batches {
            match self.narrate_batch(&request, batch, &commits).await {
                Ok(text) => narratives.push(text),
                Err(e) => {
                    warn!(repository, batch = batch.index, error = %e, "Batch inference exhausted, using digest");
                    failed_batches.push(BatchFailure {
                        index: batch.index,
                        error: e.to_string(),
                    });
                    narratives.push(batch_digest(batch));
                }
            }
        }

        let outcome = match self.summarize(&request, commit_count, &narratives).await {
            Ok(payload) => RepositoryOutcome {
                analysis: payload
                    .into_analysis(repository, commit_count)
                    .with_stats(request.stats()),
                failed_batches,
                used_fallback: false,
            },
            Err(e) => {
                warn!(repository, error = %e, "Summary failed, using fallback");
                RepositoryOutcome {
                    analysis: RepositoryAnalysis::fallback(repository, commit_count),
                    failed_batches,
                    used_fallback: true,
                }
            }
        };
        Ok(outcome)
    }
}

/// Stand-in narrative for a batch whose inference ran out of retries.
pub fn batch_digest(batch: &CommitBatch) -> String {
    let headlines: Vec<&str> = batch.commits.iter().map(CommitRecord::headline).collect();
    format!("{} commits: {}", batch.len(), headlines.join("; "))
}
