//! Workflow runs: state machine, step events, registry and the engine that
//! drives a run from activity to stored report.

pub mod engine;
pub mod error;
pub mod event_log;
pub mod registry;
pub mod state;

pub use engine::{RegisteredRun, WorkflowEngine, WorkflowReport, DEFAULT_REPO_TIMEOUT};
pub use error::WorkflowError;
pub use event_log::{read_jsonl, EventLog, StepEvent, StepEventKind};
pub use registry::WorkflowRegistry;
pub use state::{WorkflowRun, WorkflowStage, WorkflowStatus};
