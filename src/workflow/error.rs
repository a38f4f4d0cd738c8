use thiserror::Error;

use super::state::WorkflowStage;
use crate::activity::ActivityError;
use crate::persistence::StorageError;
use crate::settings::SettingsError;

/// Errors that end a workflow run. Everything else is recovered inside the
/// stage that raised it.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] SettingsError),

    #[error("Activity fetch failed: {0}")]
    Activity(#[from] ActivityError),

    #[error("Storing the report failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid workflow transition from {from} to {to}")]
    InvalidTransition {
        from: WorkflowStage,
        to: WorkflowStage,
    },
}
