//! Shared fixtures for the workflow integration tests.
#![allow(dead_code)]

use chrono::{NaiveDate, TimeZone, Utc};
use devpulse::activity::{CommitRecord, DailyActivity, InMemoryActivitySource};
use devpulse::cache::{ActionCache, CachePolicy, MemoryCacheStore};
use devpulse::llm::{LLMRequest, MockLLMClient, MockResponse};
use devpulse::persistence::PersistenceSink;
use devpulse::pipeline::prompts::{PATTERN_TASK, SUMMARY_TASK, SYNTHESIS_TASK};
use devpulse::pipeline::PipelineContext;
use devpulse::retry::{PollPolicy, RetryController, RetryPolicy};
use devpulse::settings::{InMemorySettingsStore, DAILY_INSTRUCTIONS_KEY};
use devpulse::workflow::WorkflowEngine;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

pub fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
}

/// Two attempts, millisecond backoff and polling.
pub fn fast_retry() -> RetryController {
    RetryController::new(
        RetryPolicy::default()
            .with_max_attempts(2)
            .with_initial_backoff(Duration::from_millis(1)),
    )
}

pub fn fast_poll() -> PollPolicy {
    PollPolicy::default()
        .with_initial_interval(Duration::from_millis(5))
        .with_step(Duration::from_millis(5))
        .with_max_interval(Duration::from_millis(20))
        .with_max_polls(500)
}

pub fn context_with_cache(client: Arc<MockLLMClient>, cache: Arc<ActionCache>) -> PipelineContext {
    PipelineContext::new(client, cache, Arc::new(fast_retry())).with_poll(fast_poll())
}

pub fn memory_cache() -> Arc<ActionCache> {
    Arc::new(ActionCache::new(
        Arc::new(MemoryCacheStore::new()),
        CachePolicy::default(),
    ))
}

pub fn context(client: Arc<MockLLMClient>) -> PipelineContext {
    context_with_cache(client, memory_cache())
}

pub fn commit(repository: &str, i: u32) -> CommitRecord {
    CommitRecord {
        sha: format!("{:040x}", (i as u64 + 1) * 7919),
        message: format!("feat: {} change {}\n\ndetails", repository, i),
        repository: repository.to_string(),
        timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 9, i % 60, 0).unwrap(),
        author: "dev".to_string(),
        url: String::new(),
    }
}

pub fn commits(repository: &str, n: u32) -> Vec<CommitRecord> {
    (0..n).map(|i| commit(repository, i)).collect()
}

pub fn is_task(request: &LLMRequest, task: &str) -> bool {
    request
        .messages
        .first()
        .map(|m| m.content.starts_with(task))
        .unwrap_or(false)
}

pub fn summary_response() -> MockResponse {
    MockResponse::json(json!({
        "mainFocus": "API hardening",
        "progress": "Shipped the retry controller",
        "technicalHighlights": ["bounded polling"],
        "concerns": [],
        "nextSteps": ["add metrics"],
    }))
}

pub fn pattern_response() -> MockResponse {
    MockResponse::json(json!({
        "patterns": ["retry logic everywhere"],
        "themes": ["reliability"],
        "stackTrends": [],
        "methodologyInsights": [],
        "balanceAssessment": "balanced",
    }))
}

pub fn synthesis_response() -> MockResponse {
    MockResponse::json(json!({
        "title": "A reliable day",
        "narrative": "Most work went into reliability.",
        "highlights": ["retry controller landed"],
        "suggestions": [
            {"id": "s1", "title": "Add metrics", "category": "observability", "priority": "medium"}
        ],
        "metrics": {"productivityScore": 7, "codeQualityTrend": "improving"},
    }))
}

/// Answers every task with a well-formed response.
pub fn healthy_responder(request: &LLMRequest) -> MockResponse {
    if is_task(request, SUMMARY_TASK) {
        summary_response()
    } else if is_task(request, PATTERN_TASK) {
        pattern_response()
    } else if is_task(request, SYNTHESIS_TASK) {
        synthesis_response()
    } else {
        MockResponse::text("Reworked error handling across the service.")
    }
}

pub fn healthy_client() -> Arc<MockLLMClient> {
    Arc::new(MockLLMClient::new().with_responder(healthy_responder))
}

pub fn settings() -> Arc<InMemorySettingsStore> {
    Arc::new(InMemorySettingsStore::new().with(DAILY_INSTRUCTIONS_KEY, "Summarize the day"))
}

pub fn engine(
    client: Arc<MockLLMClient>,
    activity: DailyActivity,
    sink: Arc<dyn PersistenceSink>,
) -> WorkflowEngine {
    WorkflowEngine::new(
        context(client),
        Arc::new(InMemoryActivitySource::new().with_day(date(), activity)),
        settings(),
        sink,
    )
}
