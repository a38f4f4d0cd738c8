//! Append-only step events for one workflow run.
//!
//! Events live in memory for the registry and are mirrored as JSONL to
//! `{events_dir}/{workflow_id}.jsonl` when a directory is configured.
//! Ordering comes from `seq`, a logical clock; `ts` is informational.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepEventKind {
    Started,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepEvent {
    pub seq: u64,
    #[serde(rename = "type")]
    pub kind: StepEventKind,
    pub step: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub details: Value,
    pub ts: String,
}

pub struct EventLog {
    workflow_id: String,
    events: Mutex<Vec<StepEvent>>,
    jsonl_path: Option<PathBuf>,
}

impl EventLog {
    /// In-memory log only.
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            events: Mutex::new(Vec::new()),
            jsonl_path: None,
        }
    }

    /// Log mirrored to `{dir}/{workflow_id}.jsonl`.
    pub fn with_mirror(workflow_id: impl Into<String>, dir: &Path) -> Self {
        let workflow_id = workflow_id.into();
        let jsonl_path = Some(jsonl_path(dir, &workflow_id));
        Self {
            workflow_id,
            events: Mutex::new(Vec::new()),
            jsonl_path,
        }
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn jsonl_path(&self) -> Option<&Path> {
        self.jsonl_path.as_deref()
    }

    pub fn record(&self, kind: StepEventKind, step: impl Into<String>, details: Value) -> StepEvent {
        let event = {
            let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
            let event = StepEvent {
                seq: events.len() as u64,
                kind,
                step: step.into(),
                details,
                ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            };
            events.push(event.clone());
            event
        };

        if let Some(path) = &self.jsonl_path {
            // Best-effort: the in-memory log stays authoritative
            let written = serde_json::to_string(&event)
                .map_err(std::io::Error::other)
                .and_then(|line| append_line(path, &line));
            if let Err(e) = written {
                warn!(workflow_id = %self.workflow_id, path = %path.display(), error = %e, "Event mirror write failed");
            }
        }
        event
    }

    pub fn started(&self, step: impl Into<String>) -> StepEvent {
        self.record(StepEventKind::Started, step, Value::Null)
    }

    pub fn completed(&self, step: impl Into<String>, details: Value) -> StepEvent {
        self.record(StepEventKind::Completed, step, details)
    }

    pub fn failed(&self, step: impl Into<String>, error: impl ToString) -> StepEvent {
        self.record(
            StepEventKind::Failed,
            step,
            serde_json::json!({ "error": error.to_string() }),
        )
    }

    pub fn events(&self) -> Vec<StepEvent> {
        self.events
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn jsonl_path(dir: &Path, workflow_id: &str) -> PathBuf {
    dir.join(format!("{}.jsonl", workflow_id))
}

/// Read a mirrored log back. Blank lines are skipped.
pub fn read_jsonl(path: &Path) -> std::io::Result<Vec<StepEvent>> {
    let content = fs::read_to_string(path)?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(std::io::Error::other))
        .collect()
}

/// Append a single line to a file, creating parent dirs if needed.
fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")
}
