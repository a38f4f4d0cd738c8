use super::analysis::RepositoryAnalysis;
use super::patterns::PatternSet;
use super::validation::{lenient_strings, require_text, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const FALLBACK_HIGHLIGHT_LIMIT: usize = 8;
pub const DEFAULT_QUALITY_TREND: &str = "stable";

/// Day-level counts shared by the synthesizer and the stored raw data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityStats {
    pub total_commits: usize,
    pub total_repos: usize,
    pub pull_requests: usize,
    pub issues: usize,
    #[serde(default)]
    pub commits_by_repository: Vec<RepositoryCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryCount {
    pub repository: String,
    pub commits: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub id: String,
    pub title: String,
    pub category: String,
    pub priority: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl Suggestion {
    fn from_value(value: &Value) -> Option<Self> {
        let field = |name: &str| {
            value
                .get(name)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Some(Self {
            id: field("id")?,
            title: field("title")?,
            category: field("category")?,
            priority: field("priority")?,
            description: field("description").unwrap_or_default(),
        })
    }

    pub fn is_complete(&self) -> bool {
        [&self.id, &self.title, &self.category, &self.priority]
            .iter()
            .all(|f| !f.trim().is_empty())
    }
}

/// All-or-nothing suggestion filter.
///
/// Returns every suggestion when each one carries a non-empty id, title,
/// category and priority; otherwise returns an empty list.
pub fn validate_suggestions(raw: &[Value]) -> Vec<Suggestion> {
    raw.iter()
        .map(Suggestion::from_value)
        .collect::<Option<Vec<_>>>()
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub total_commits: usize,
    pub total_repos: usize,
    pub primary_languages: Vec<String>,
    pub code_quality_trend: String,
    pub productivity_score: u8,
}

/// `clamp(round(total_commits / 10), 1, 10)`
pub fn productivity_score(total_commits: usize) -> u8 {
    let score = (total_commits as f64 / 10.0).round();
    score.clamp(1.0, 10.0) as u8
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSynthesis {
    pub date: String,
    pub title: String,
    pub narrative: String,
    pub highlights: Vec<String>,
    pub repo_summaries: Vec<RepositoryAnalysis>,
    pub cross_repo_patterns: Vec<String>,
    pub technical_themes: Vec<String>,
    pub suggestions: Vec<Suggestion>,
    pub metrics: Metrics,
}

/// Inputs shared by the primary and fallback synthesis paths.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInputs<'a> {
    pub date: &'a str,
    pub analyses: &'a [RepositoryAnalysis],
    pub patterns: &'a PatternSet,
    pub stats: &'a ActivityStats,
    pub primary_languages: &'a [String],
}

impl GlobalSynthesis {
    /// Report built from statistics alone. Valid by construction.
    pub fn fallback(inputs: SynthesisInputs<'_>) -> Self {
        let stats = inputs.stats;
        let highlights = inputs
            .analyses
            .iter()
            .take(FALLBACK_HIGHLIGHT_LIMIT)
            .map(|a| format!("{}: {} commits — {}", a.repository, a.commit_count, a.main_focus))
            .collect();

        let narrative = if stats.total_commits == 0 {
            format!("No commits were recorded on {}.", inputs.date)
        } else {
            format!(
                "{} commits landed across {} repositories, with {} pull requests and {} issues touched.",
                stats.total_commits, stats.total_repos, stats.pull_requests, stats.issues
            )
        };

        Self {
            date: inputs.date.to_string(),
            title: format!("Development activity for {}", inputs.date),
            narrative,
            highlights,
            repo_summaries: inputs.analyses.to_vec(),
            cross_repo_patterns: inputs.patterns.patterns.clone(),
            technical_themes: inputs.patterns.themes.clone(),
            suggestions: Vec::new(),
            metrics: Metrics {
                total_commits: stats.total_commits,
                total_repos: stats.total_repos,
                primary_languages: inputs.primary_languages.to_vec(),
                code_quality_trend: DEFAULT_QUALITY_TREND.to_string(),
                productivity_score: productivity_score(stats.total_commits),
            },
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title)?;
        require_text("narrative", &self.narrative)?;
        if !self.suggestions.iter().all(Suggestion::is_complete) {
            return Err(ValidationError::InvalidField {
                field: "suggestions",
                reason: "every suggestion needs id, title, category and priority".to_string(),
            });
        }
        if !(1..=10).contains(&self.metrics.productivity_score) {
            return Err(ValidationError::InvalidField {
                field: "metrics.productivityScore",
                reason: format!("{} is outside 1..=10", self.metrics.productivity_score),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsPayload {
    #[serde(default, deserialize_with = "lenient_strings")]
    pub primary_languages: Vec<String>,
    #[serde(default)]
    pub code_quality_trend: Option<String>,
    #[serde(default)]
    pub productivity_score: Option<f64>,
}

/// What the model must return for the global synthesis.
///
/// `title` and `narrative` are required. Counts, repository summaries,
/// patterns and themes are always taken from the pipeline, never the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisPayload {
    pub title: String,
    pub narrative: String,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub suggestions: Option<Vec<Value>>,
    #[serde(default)]
    pub metrics: Option<MetricsPayload>,
}

impl SynthesisPayload {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title)?;
        require_text("narrative", &self.narrative)
    }

    pub fn into_synthesis(self, inputs: SynthesisInputs<'_>) -> GlobalSynthesis {
        let metrics = self.metrics.unwrap_or_default();
        let productivity = metrics
            .productivity_score
            .filter(|s| s.is_finite())
            .map(|s| s.round().clamp(1.0, 10.0) as u8)
            .unwrap_or_else(|| productivity_score(inputs.stats.total_commits));
        let trend = metrics
            .code_quality_trend
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_QUALITY_TREND.to_string());
        let languages = if metrics.primary_languages.is_empty() {
            inputs.primary_languages.to_vec()
        } else {
            metrics.primary_languages
        };

        GlobalSynthesis {
            date: inputs.date.to_string(),
            title: self.title.trim().to_string(),
            narrative: self.narrative.trim().to_string(),
            highlights: self.highlights,
            repo_summaries: inputs.analyses.to_vec(),
            cross_repo_patterns: inputs.patterns.patterns.clone(),
            technical_themes: inputs.patterns.themes.clone(),
            suggestions: validate_suggestions(self.suggestions.as_deref().unwrap_or(&[])),
            metrics: Metrics {
                total_commits: inputs.stats.total_commits,
                total_repos: inputs.stats.total_repos,
                primary_languages: languages,
                code_quality_trend: trend,
                productivity_score: productivity,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stats(total: usize) -> ActivityStats {
        ActivityStats {
            total_commits: total,
            total_repos: 2,
            pull_requests: 1,
            issues: 0,
            commits_by_repository: Vec::new(),
        }
    }

    #[test]
    fn test_productivity_score() {
        assert_eq!(productivity_score(0), 1);
        assert_eq!(productivity_score(4), 1);
        assert_eq!(productivity_score(15), 2);
        assert_eq!(productivity_score(54), 5);
        assert_eq!(productivity_score(500), 10);
    }

    #[test]
    fn test_partial_suggestion_empties_the_list() {
        let raw = vec![
            json!({"id": "s1", "title": "Add tests", "category": "quality", "priority": "high"}),
            json!({"id": "s2", "title": "Refactor", "category": "", "priority": "low"}),
        ];
        assert!(validate_suggestions(&raw).is_empty());

        let raw = vec![json!({"id": "s1", "title": "Add tests", "category": "quality", "priority": "high"})];
        let kept = validate_suggestions(&raw);
        assert_eq!(kept.len(), 1);
        assert!(kept[0].is_complete());

        let raw = vec![json!({"id": 1, "title": "x", "category": "y", "priority": "z"})];
        assert!(validate_suggestions(&raw).is_empty());
    }

    #[test]
    fn test_fallback_highlights_and_metrics() {
        let analyses: Vec<_> = (0..10)
            .map(|i| RepositoryAnalysis::fallback(&format!("repo{}", i), i + 1))
            .collect();
        let patterns = PatternSet {
            patterns: vec!["p".to_string()],
            themes: vec!["t".to_string()],
            ..Default::default()
        };
        let stats = stats(55);
        let languages = vec!["Rust".to_string()];

        let report = GlobalSynthesis::fallback(SynthesisInputs {
            date: "2024-05-01",
            analyses: &analyses,
            patterns: &patterns,
            stats: &stats,
            primary_languages: &languages,
        });

        assert_eq!(report.highlights.len(), 8);
        assert_eq!(report.highlights[0], "repo0: 1 commits — updates and fixes");
        assert_eq!(report.repo_summaries.len(), 10);
        assert_eq!(report.metrics.productivity_score, 6);
        assert_eq!(report.metrics.code_quality_trend, "stable");
        assert_eq!(report.metrics.primary_languages, languages);
        assert_eq!(report.cross_repo_patterns, vec!["p"]);
        assert!(report.suggestions.is_empty());
        assert!(report.validate().is_ok());
    }

    #[test]
    fn test_payload_overrides_counts_and_clamps_score() {
        let payload: SynthesisPayload = serde_json::from_value(json!({
            "title": "Busy day",
            "narrative": "Lots happened",
            "highlights": ["api: cache"],
            "suggestions": [{"id": "s1", "title": "t", "category": "c", "priority": "p"}],
            "metrics": {"totalCommits": 1, "productivityScore": 42, "codeQualityTrend": "improving"},
            "repoSummaries": [{"repository": "invented"}]
        }))
        .unwrap();
        assert!(payload.validate().is_ok());

        let patterns = PatternSet::default();
        let stats = stats(30);
        let report = payload.into_synthesis(SynthesisInputs {
            date: "2024-05-01",
            analyses: &[],
            patterns: &patterns,
            stats: &stats,
            primary_languages: &[],
        });

        assert_eq!(report.metrics.total_commits, 30);
        assert_eq!(report.metrics.productivity_score, 10);
        assert_eq!(report.metrics.code_quality_trend, "improving");
        assert!(report.repo_summaries.is_empty());
        assert_eq!(report.suggestions.len(), 1);
        assert!(report.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_incomplete_suggestion() {
        let patterns = PatternSet::default();
        let stats = stats(3);
        let mut report = GlobalSynthesis::fallback(SynthesisInputs {
            date: "2024-05-01",
            analyses: &[],
            patterns: &patterns,
            stats: &stats,
            primary_languages: &[],
        });
        report.suggestions.push(Suggestion {
            id: "s1".to_string(),
            title: String::new(),
            category: "c".to_string(),
            priority: "p".to_string(),
            description: String::new(),
        });
        assert!(report.validate().is_err());
    }
}
