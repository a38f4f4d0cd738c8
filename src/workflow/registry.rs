use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::event_log::{EventLog, StepEvent};
use super::state::WorkflowRun;

struct Entry {
    run: WorkflowRun,
    events: Arc<EventLog>,
}

/// Runs started by this process, queryable by id.
#[derive(Default)]
pub struct WorkflowRegistry {
    entries: RwLock<HashMap<String, Entry>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, run: WorkflowRun, events: Arc<EventLog>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(run.id.clone(), Entry { run, events });
    }

    /// Replace the stored snapshot of a registered run.
    pub fn update(&self, run: &WorkflowRun) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.get_mut(&run.id) {
            entry.run = run.clone();
        }
    }

    pub fn get(&self, id: &str) -> Option<WorkflowRun> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(id).map(|e| e.run.clone())
    }

    pub fn events(&self, id: &str) -> Option<Vec<StepEvent>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(id).map(|e| e.events.events())
    }

    /// All runs, most recently started first.
    pub fn list(&self) -> Vec<WorkflowRun> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut runs: Vec<WorkflowRun> = entries.values().map(|e| e.run.clone()).collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
