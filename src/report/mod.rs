//! Report data model and its validation rules.

mod analysis;
mod patterns;
mod synthesis;
mod validation;

pub use analysis::{RepositoryAnalysis, RepositoryStats, SummaryPayload, FALLBACK_MAIN_FOCUS};
pub use patterns::PatternSet;
pub use synthesis::{
    productivity_score, validate_suggestions, ActivityStats, GlobalSynthesis, Metrics,
    MetricsPayload, RepositoryCount, Suggestion, SynthesisInputs, SynthesisPayload,
    DEFAULT_QUALITY_TREND, FALLBACK_HIGHLIGHT_LIMIT,
};
pub use validation::{require_text, ValidationError};
