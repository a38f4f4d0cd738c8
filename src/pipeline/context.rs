//! Long-lived dependencies shared by the pipeline stages

use std::sync::Arc;

use crate::cache::ActionCache;
use crate::llm::LLMClient;
use crate::retry::{PollPolicy, RetryController};

pub const DEFAULT_MAX_TOOL_STEPS: usize = 15;
pub const DEFAULT_CACHE_VERSION: &str = "v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyzerPolicy {
    /// Model calls allowed per batch before the tool loop gives up.
    pub max_tool_steps: usize,
}

impl Default for AnalyzerPolicy {
    fn default() -> Self {
        Self {
            max_tool_steps: DEFAULT_MAX_TOOL_STEPS,
        }
    }
}

impl AnalyzerPolicy {
    pub fn with_max_tool_steps(mut self, steps: usize) -> Self {
        self.max_tool_steps = steps;
        self
    }
}

/// Version tags of the cached inference actions. Bump one whenever its
/// prompt changes so old entries stop matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheVersions {
    pub summary: String,
    pub synthesis: String,
}

impl Default for CacheVersions {
    fn default() -> Self {
        Self {
            summary: DEFAULT_CACHE_VERSION.to_string(),
            synthesis: DEFAULT_CACHE_VERSION.to_string(),
        }
    }
}

/// Context that owns the inference client, cache and retry controller.
///
/// Built once per process and shared by reference; nothing in the pipeline
/// reaches for global state.
#[derive(Clone)]
pub struct PipelineContext {
    pub llm_client: Arc<dyn LLMClient>,
    pub cache: Arc<ActionCache>,
    pub retry: Arc<RetryController>,
    pub poll: PollPolicy,
    pub analyzer: AnalyzerPolicy,
    pub versions: CacheVersions,
}

impl PipelineContext {
    pub fn new(
        llm_client: Arc<dyn LLMClient>,
        cache: Arc<ActionCache>,
        retry: Arc<RetryController>,
    ) -> Self {
        Self {
            llm_client,
            cache,
            retry,
            poll: PollPolicy::default(),
            analyzer: AnalyzerPolicy::default(),
            versions: CacheVersions::default(),
        }
    }

    pub fn with_poll(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_analyzer(mut self, analyzer: AnalyzerPolicy) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_versions(mut self, versions: CacheVersions) -> Self {
        self.versions = versions;
        self
    }

    /// Model identifier folded into every fingerprint, so switching models
    /// never serves answers produced by the previous one.
    pub fn model_id(&self) -> String {
        self.llm_client
            .model_info()
            .unwrap_or_else(|| self.llm_client.name().to_string())
    }
}
