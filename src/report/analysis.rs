use super::validation::{lenient_strings, require_text, ValidationError};
use serde::{Deserialize, Serialize};

pub const FALLBACK_MAIN_FOCUS: &str = "updates and fixes";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryStats {
    pub pull_requests: usize,
    pub issues: usize,
    pub authors: usize,
}

/// Summary of one repository's day.
///
/// `commit_count` is always the number of commits handed to the analyzer,
/// whatever the model claimed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryAnalysis {
    pub repository: String,
    pub commit_count: usize,
    pub main_focus: String,
    pub progress: String,
    #[serde(default)]
    pub technical_highlights: Vec<String>,
    #[serde(default)]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub next_steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<RepositoryStats>,
}

impl RepositoryAnalysis {
    /// Deterministic summary used when inference is exhausted.
    pub fn fallback(repository: &str, commit_count: usize) -> Self {
        Self {
            repository: repository.to_string(),
            commit_count,
            main_focus: FALLBACK_MAIN_FOCUS.to_string(),
            progress: format!("landed {} commits", commit_count),
            technical_highlights: Vec::new(),
            concerns: Vec::new(),
            next_steps: Vec::new(),
            stats: None,
        }
    }

    pub fn with_stats(mut self, stats: RepositoryStats) -> Self {
        self.stats = Some(stats);
        self
    }

    /// One-line form used in prompts and in stored raw data.
    pub fn compact(&self) -> String {
        format!(
            "{} ({} commits): {}. {}",
            self.repository, self.commit_count, self.main_focus, self.progress
        )
    }
}

/// What the model must return for a repository summary.
///
/// `mainFocus` and `progress` are required; the lists default to empty.
/// Repository name and commit count are never taken from the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryPayload {
    pub main_focus: String,
    pub progress: String,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub technical_highlights: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub concerns: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub next_steps: Vec<String>,
}

impl SummaryPayload {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("mainFocus", &self.main_focus)?;
        require_text("progress", &self.progress)
    }

    pub fn into_analysis(self, repository: &str, commit_count: usize) -> RepositoryAnalysis {
        RepositoryAnalysis {
            repository: repository.to_string(),
            commit_count,
            main_focus: self.main_focus.trim().to_string(),
            progress: self.progress.trim().to_string(),
            technical_highlights: self.technical_highlights,
            concerns: self.concerns,
            next_steps: self.next_steps,
            stats: None,
        }
    }
}
