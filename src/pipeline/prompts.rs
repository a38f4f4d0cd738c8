//! Prompt construction for the three inference stages
//!
//! Each system prompt opens with a task line so logs (and scripted test
//! clients) can tell the calls apart.

use serde_json::json;

use crate::llm::ChatMessage;
use crate::report::{RepositoryAnalysis, SynthesisInputs};
use crate::tools::ToolScope;

pub const BATCH_TASK: &str = "TASK: review a batch of commits";
pub const SUMMARY_TASK: &str = "TASK: summarize a repository";
pub const PATTERN_TASK: &str = "TASK: detect cross-repository patterns";
pub const SYNTHESIS_TASK: &str = "TASK: write the daily report";

const DEFAULT_PATTERN_INSTRUCTIONS: &str =
    "Look for recurring work across repositories: shared themes, stack trends and how effort was balanced.";
const DEFAULT_SYNTHESIS_INSTRUCTIONS: &str =
    "Write a concise report of the day for the developer, grounded only in the summaries given.";

pub fn batch_messages(instructions: &str, scope: &ToolScope, date: &str, batch_count: usize) -> Vec<ChatMessage> {
    let system = format!(
        "{}\n{}\n\nUse the tools to inspect commits when the headline is not enough. \
         Reply with a short plain-text narrative of what this batch accomplished.",
        BATCH_TASK, instructions
    );
    let user = format!(
        "Repository: {}\nDate: {}\nBatch {} of {} ({} commits, {} pull requests and {} issues touched today).",
        scope.repository,
        date,
        scope.batch.index + 1,
        batch_count,
        scope.batch.len(),
        scope.pull_requests.len(),
        scope.issues.len(),
    );
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

pub fn summary_messages(
    instructions: &str,
    repository: &str,
    date: &str,
    commit_count: usize,
    narratives: &[String],
) -> Vec<ChatMessage> {
    let system = format!(
        "{}\n{}\n\nRespond with JSON only: {}",
        SUMMARY_TASK,
        instructions,
        json!({
            "mainFocus": "string",
            "progress": "string",
            "technicalHighlights": ["string"],
            "concerns": ["string"],
            "nextSteps": ["string"],
        })
    );
    let mut user = format!(
        "Repository: {}\nDate: {}\nCommits: {}\n\nBatch notes:\n",
        repository, date, commit_count
    );
    for (i, narrative) in narratives.iter().enumerate() {
        user.push_str(&format!("{}. {}\n", i + 1, narrative));
    }
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

pub fn pattern_messages(
    instructions: Option<&str>,
    analyses: &[RepositoryAnalysis],
    date: &str,
) -> Vec<ChatMessage> {
    let system = format!(
        "{}\n{}\n\nRespond with JSON only: {}",
        PATTERN_TASK,
        instructions.unwrap_or(DEFAULT_PATTERN_INSTRUCTIONS),
        json!({
            "patterns": ["string"],
            "themes": ["string"],
            "stackTrends": ["string"],
            "methodologyInsights": ["string"],
            "balanceAssessment": "string",
        })
    );
    vec![
        ChatMessage::system(system),
        ChatMessage::user(format!("Date: {}\n\n{}", date, summaries_block(analyses))),
    ]
}

pub fn synthesis_messages(instructions: Option<&str>, inputs: SynthesisInputs<'_>) -> Vec<ChatMessage> {
    let system = format!(
        "{}\n{}\n\nRespond with JSON only: {}\nEvery suggestion needs id, title, category and priority.",
        SYNTHESIS_TASK,
        instructions.unwrap_or(DEFAULT_SYNTHESIS_INSTRUCTIONS),
        json!({
            "title": "string",
            "narrative": "string",
            "highlights": ["string"],
            "suggestions": [{
                "id": "string",
                "title": "string",
                "category": "string",
                "priority": "low|medium|high",
                "description": "string",
            }],
            "metrics": {
                "primaryLanguages": ["string"],
                "codeQualityTrend": "improving|stable|declining",
                "productivityScore": "1-10",
            },
        })
    );

    let stats = inputs.stats;
    let mut user = format!(
        "Date: {}\nCommits: {} across {} repositories, {} pull requests, {} issues.\n\n{}",
        inputs.date,
        stats.total_commits,
        stats.total_repos,
        stats.pull_requests,
        stats.issues,
        summaries_block(inputs.analyses),
    );
    if !inputs.patterns.is_empty() {
        user.push_str(&format!(
            "\nPatterns: {}\nThemes: {}\n",
            inputs.patterns.patterns.join("; "),
            inputs.patterns.themes.join("; ")
        ));
    }
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

fn summaries_block(analyses: &[RepositoryAnalysis]) -> String {
    let mut block = String::from("Repository summaries:\n");
    for analysis in analyses {
        block.push_str("- ");
        block.push_str(&analysis.compact());
        block.push('\n');
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::activity_tools::test_support::scope;

    #[test]
    fn test_each_prompt_starts_with_its_task() {
        let batch = batch_messages("Be brief", &scope(), "2024-05-01", 1);
        assert!(batch[0].content.starts_with(BATCH_TASK));
        assert!(batch[1].content.contains("Batch 1 of 1"));

        let summary = summary_messages("Be brief", "api", "2024-05-01", 3, &["did things".to_string()]);
        assert!(summary[0].content.starts_with(SUMMARY_TASK));
        assert!(summary[1].content.contains("1. did things"));

        let analyses = vec![RepositoryAnalysis::fallback("api", 3)];
        let patterns = pattern_messages(None, &analyses, "2024-05-01");
        assert!(patterns[0].content.starts_with(PATTERN_TASK));
        assert!(patterns[1].content.contains("api (3 commits)"));
    }
}
