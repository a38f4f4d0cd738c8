use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceSession {
    pub id: String,
    /// What the session was for, e.g. `summary:api`.
    pub purpose: String,
    pub started_at: DateTime<Utc>,
}

/// Inference sessions opened during one workflow run, in order.
#[derive(Debug, Default)]
pub struct SessionLog {
    sessions: Mutex<Vec<InferenceSession>>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session and return its id.
    pub fn begin(&self, purpose: impl Into<String>) -> String {
        let id = format!("sess_{}", &Uuid::new_v4().simple().to_string()[..12]);
        let session = InferenceSession {
            id: id.clone(),
            purpose: purpose.into(),
            started_at: Utc::now(),
        };
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(session);
        id
    }

    pub fn sessions(&self) -> Vec<InferenceSession> {
        self.sessions
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn ids(&self) -> Vec<String> {
        self.sessions().into_iter().map(|s| s.id).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
