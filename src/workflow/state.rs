use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::WorkflowError;

// ── Stages ──

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    Started,
    FetchingActivity,
    AnalyzingRepositories,
    DetectingPatterns,
    Synthesizing,
    StoringResult,
    Completed,
    Failed,
}

impl WorkflowStage {
    /// Step name used in the event log.
    pub fn step(self) -> &'static str {
        match self {
            WorkflowStage::Started => "workflow",
            WorkflowStage::FetchingActivity => "fetch_activity",
            WorkflowStage::AnalyzingRepositories => "analyze_repositories",
            WorkflowStage::DetectingPatterns => "detect_patterns",
            WorkflowStage::Synthesizing => "synthesize",
            WorkflowStage::StoringResult => "store_result",
            WorkflowStage::Completed => "completed",
            WorkflowStage::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowStage::Completed | WorkflowStage::Failed)
    }
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.step())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Running,
    Completed,
    Failed,
}

// ── Valid transitions ──

// Failed is reachable from every non-terminal stage
const VALID_TRANSITIONS: &[(WorkflowStage, &[WorkflowStage])] = &[
    (WorkflowStage::Started, &[WorkflowStage::FetchingActivity]),
    (
        WorkflowStage::FetchingActivity,
        &[WorkflowStage::AnalyzingRepositories],
    ),
    (
        WorkflowStage::AnalyzingRepositories,
        &[WorkflowStage::DetectingPatterns],
    ),
    (
        WorkflowStage::DetectingPatterns,
        &[WorkflowStage::Synthesizing],
    ),
    (WorkflowStage::Synthesizing, &[WorkflowStage::StoringResult]),
    (WorkflowStage::StoringResult, &[WorkflowStage::Completed]),
];

pub fn is_valid_transition(from: WorkflowStage, to: WorkflowStage) -> bool {
    if to == WorkflowStage::Failed {
        return !from.is_terminal();
    }
    VALID_TRANSITIONS
        .iter()
        .any(|(f, targets)| *f == from && targets.contains(&to))
}

// ── Run record ──

/// One end-to-end execution for a date. Only the engine mutates it, and
/// never after it reaches a terminal stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRun {
    pub id: String,
    pub date: String,
    pub stage: WorkflowStage,
    pub status: WorkflowStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_id: Option<String>,
    #[serde(default)]
    pub failed_repositories: Vec<String>,
}

impl WorkflowRun {
    pub fn new(id: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            date: date.into(),
            stage: WorkflowStage::Started,
            status: WorkflowStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            error: None,
            log_id: None,
            failed_repositories: Vec::new(),
        }
    }

    pub fn advance(&mut self, to: WorkflowStage) -> Result<(), WorkflowError> {
        if !is_valid_transition(self.stage, to) {
            return Err(WorkflowError::InvalidTransition {
                from: self.stage,
                to,
            });
        }
        self.stage = to;
        match to {
            WorkflowStage::Completed => {
                self.status = WorkflowStatus::Completed;
                self.finished_at = Some(Utc::now());
            }
            WorkflowStage::Failed => {
                self.status = WorkflowStatus::Failed;
                self.finished_at = Some(Utc::now());
            }
            _ => {}
        }
        Ok(())
    }

    /// Move to `Failed`, keeping the error. A terminal run is left alone.
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.advance(WorkflowStage::Failed).is_ok() {
            self.error = Some(error.into());
        }
    }
}
