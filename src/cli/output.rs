//! Output formatting for CLI commands
//!
//! JSON is the machine-readable form; human output is a short boxed summary.

use anyhow::{Context, Result};
use std::collections::BTreeMap;

use crate::workflow::{StepEvent, StepEventKind, WorkflowReport};

const RULE: &str = "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Human,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_report(&self, report: &WorkflowReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report)
                .context("Failed to serialize workflow report to JSON"),
            OutputFormat::Human => Ok(format_report_human(report)),
        }
    }

    pub fn format_events(&self, events: &[StepEvent]) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(events).context("Failed to serialize events to JSON")
            }
            OutputFormat::Human => Ok(format_events_human(events)),
        }
    }

    pub fn format_config(&self, config: &BTreeMap<String, String>) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(config).context("Failed to serialize config to JSON")
            }
            OutputFormat::Human => {
                let width = config.keys().map(|k| k.len()).max().unwrap_or(0);
                let mut output = String::from("devpulse configuration\n");
                output.push_str(RULE);
                output.push('\n');
                for (key, value) in config {
                    output.push_str(&format!("{:width$}  {}\n", key, value, width = width));
                }
                Ok(output)
            }
        }
    }
}

fn format_report_human(report: &WorkflowReport) -> String {
    let synthesis = &report.report;
    let mut output = String::new();

    output.push_str(&format!("\u{2713} {}\n", synthesis.title));
    output.push_str(RULE);
    output.push_str("\n\n");

    output.push_str(&format!("Date:          {}\n", synthesis.date));
    output.push_str(&format!("Workflow:      {}\n", report.workflow_id));
    output.push_str(&format!("Stored as:     {}\n", report.log_id));
    output.push_str(&format!(
        "Activity:      {} commits across {} repositories\n",
        synthesis.metrics.total_commits, synthesis.metrics.total_repos
    ));
    output.push_str(&format!(
        "Productivity:  {}/10\n\n",
        synthesis.metrics.productivity_score
    ));

    output.push_str(&synthesis.narrative);
    output.push_str("\n\n");

    push_list(&mut output, "Highlights", &synthesis.highlights);
    push_list(&mut output, "Cross-repository patterns", &synthesis.cross_repo_patterns);

    if !synthesis.suggestions.is_empty() {
        output.push_str("Suggestions:\n");
        for (i, suggestion) in synthesis.suggestions.iter().enumerate() {
            let connector = tree_connector(i, synthesis.suggestions.len());
            output.push_str(&format!(
                "{}\u{2500} [{}/{}] {}\n",
                connector, suggestion.category, suggestion.priority, suggestion.title
            ));
        }
        output.push('\n');
    }

    if !report.failed_repositories.is_empty() {
        output.push_str(&format!(
            "\u{26A0} Failed repositories: {}\n",
            report.failed_repositories.join(", ")
        ));
    }

    output
}

fn format_events_human(events: &[StepEvent]) -> String {
    let mut output = String::new();
    for event in events {
        let marker = match event.kind {
            StepEventKind::Started => "\u{25B6}",
            StepEventKind::Completed => "\u{2713}",
            StepEventKind::Failed => "\u{2717}",
        };
        output.push_str(&format!("{:>4} {} {}  {}", event.seq, marker, event.ts, event.step));
        if !event.details.is_null() {
            output.push_str(&format!("  {}", event.details));
        }
        output.push('\n');
    }
    output
}

fn push_list(output: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    output.push_str(&format!("{}:\n", heading));
    for (i, item) in items.iter().enumerate() {
        output.push_str(&format!("{}\u{2500} {}\n", tree_connector(i, items.len()), item));
    }
    output.push('\n');
}

fn tree_connector(index: usize, len: usize) -> &'static str {
    if index + 1 == len {
        "\u{2514}"
    } else {
        "\u{251C}"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{ActivityStats, GlobalSynthesis, PatternSet, SynthesisInputs};
    use serde_json::json;

    fn report() -> WorkflowReport {
        let stats = ActivityStats {
            total_commits: 3,
            total_repos: 1,
            ..Default::default()
        };
        let synthesis = GlobalSynthesis::fallback(SynthesisInputs {
            date: "2024-05-01",
            analyses: &[],
            patterns: &PatternSet::default(),
            stats: &stats,
            primary_languages: &[],
        });
        WorkflowReport {
            workflow_id: "wf_2024-05-01_abc123".to_string(),
            log_id: "2024-05-01-v1".to_string(),
            version: 1,
            report: synthesis,
            failed_repositories: vec!["acme/broken".to_string()],
        }
    }

    #[test]
    fn test_report_json_is_camel_case() {
        let output = OutputFormatter::new(OutputFormat::Json)
            .format_report(&report())
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["workflowId"], "wf_2024-05-01_abc123");
        assert_eq!(value["logId"], "2024-05-01-v1");
        assert_eq!(value["failedRepositories"][0], "acme/broken");
    }

    #[test]
    fn test_report_human() {
        let output = OutputFormatter::new(OutputFormat::Human)
            .format_report(&report())
            .unwrap();
        assert!(output.contains("2024-05-01-v1"));
        assert!(output.contains("3 commits across 1 repositories"));
        assert!(output.contains("Failed repositories: acme/broken"));
    }

    #[test]
    fn test_events_human() {
        let events = vec![
            StepEvent {
                seq: 1,
                kind: StepEventKind::Started,
                step: "workflow".to_string(),
                details: serde_json::Value::Null,
                ts: "2024-05-02T06:00:00Z".to_string(),
            },
            StepEvent {
                seq: 2,
                kind: StepEventKind::Failed,
                step: "analyze:acme/api".to_string(),
                details: json!({"error": "timeout"}),
                ts: "2024-05-02T06:00:01Z".to_string(),
            },
        ];
        let output = OutputFormatter::new(OutputFormat::Human)
            .format_events(&events)
            .unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("workflow"));
        assert!(lines[1].contains("analyze:acme/api"));
        assert!(lines[1].contains("timeout"));
    }

    #[test]
    fn test_config_human_aligns_keys() {
        let mut config = BTreeMap::new();
        config.insert("model".to_string(), "gpt-4o-mini".to_string());
        config.insert("batch_size".to_string(), "20".to_string());
        let output = OutputFormatter::new(OutputFormat::Human)
            .format_config(&config)
            .unwrap();
        assert!(output.contains("batch_size  20"));
        assert!(output.contains("model       gpt-4o-mini"));
    }
}
