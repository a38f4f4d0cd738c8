use super::validation::{lenient_strings, lenient_text};
use serde::{Deserialize, Serialize};

/// Cross-repository patterns. Every field defaults instead of failing:
/// missing or `null` lists become empty, missing text becomes "".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternSet {
    #[serde(default, deserialize_with = "lenient_strings")]
    pub patterns: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub themes: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub stack_trends: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub methodology_insights: Vec<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub balance_assessment: String,
}

impl PatternSet {
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
            && self.themes.is_empty()
            && self.stack_trends.is_empty()
            && self.methodology_insights.is_empty()
            && self.balance_assessment.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} patterns, {} themes{}",
            self.patterns.len(),
            self.themes.len(),
            if self.balance_assessment.is_empty() {
                String::new()
            } else {
                format!("; {}", self.balance_assessment)
            }
        )
    }
}
