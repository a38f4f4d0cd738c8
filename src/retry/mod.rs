//! Retry Controller: bounded exponential backoff with pollable run status.

mod controller;
mod policy;

pub use controller::{
    ActionError, AttemptOutcome, RetryAttempt, RetryController, RetryError, RunId, RunState,
    RunStatus,
};
pub use policy::{PollPolicy, RetryPolicy};
