use super::policy::{PollPolicy, RetryPolicy};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Failure of one attempt of a retried action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// Worth another attempt (timeouts, rate limits, invalid output).
    #[error("{0}")]
    Transient(String),

    /// Retrying cannot help; the run fails immediately.
    #[error("{0}")]
    Permanent(String),
}

impl ActionError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent(message.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

#[derive(Debug, Clone, Error)]
pub enum RetryError {
    #[error("Unknown run {0}")]
    UnknownRun(RunId),

    #[error("{action} failed after {attempts} attempt(s): {last_error}")]
    Failed {
        action: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Timed out waiting for run {run_id} after {polls} polls")]
    Timeout { run_id: RunId, polls: u32 },

    #[error("Run {0} stopped without reaching a terminal state")]
    Abandoned(RunId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Completed,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunState::Running)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AttemptOutcome {
    Succeeded,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryAttempt {
    pub attempt_number: u32,
    /// Delay slept after this attempt; zero for the final attempt.
    pub backoff_ms: u64,
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatus {
    pub action: String,
    pub state: RunState,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub attempts: Vec<RetryAttempt>,
}

impl RunStatus {
    fn running(action: &str) -> Self {
        Self {
            action: action.to_string(),
            state: RunState::Running,
            result: None,
            error: None,
            attempts: Vec::new(),
        }
    }
}

struct RunSlot {
    status: Arc<watch::Sender<RunStatus>>,
    task: AbortHandle,
}

/// Runs actions with bounded retries in the background and reports status.
///
/// `run` returns immediately with a `RunId`; `status` reads the latest state;
/// `wait` blocks on state changes (never spinning) for at most the poll
/// budget; `execute` is `run` followed by `wait`, and cancels the run when
/// the wait gives up or the caller stops awaiting it.
pub struct RetryController {
    policy: RetryPolicy,
    runs: Mutex<HashMap<RunId, RunSlot>>,
    next_id: AtomicU64,
}

impl RetryController {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            runs: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Start `action` in the background. The closure receives the 1-based
    /// attempt number.
    pub fn run<F, Fut>(&self, name: &str, action: F) -> RunId
    where
        F: Fn(u32) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ActionError>> + Send + 'static,
    {
        let run_id = RunId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (tx, _rx) = watch::channel(RunStatus::running(name));
        let status = Arc::new(tx);

        // Hold the lock across the spawn so `status` never misses the slot
        let mut runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        let policy = self.policy;
        let name = name.to_string();
        let tx = Arc::clone(&status);
        let task = tokio::spawn(async move {
            drive(run_id, &name, policy, action, &tx).await;
        })
        .abort_handle();
        runs.insert(run_id, RunSlot { status, task });

        run_id
    }

    pub fn status(&self, run_id: RunId) -> Result<RunStatus, RetryError> {
        let runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        runs.get(&run_id)
            .map(|slot| slot.status.borrow().clone())
            .ok_or(RetryError::UnknownRun(run_id))
    }

    /// Block until `run_id` is terminal or the poll budget runs out.
    pub async fn wait(&self, run_id: RunId, poll: &PollPolicy) -> Result<RunStatus, RetryError> {
        let (mut rx, task) = {
            let runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
            let slot = runs.get(&run_id).ok_or(RetryError::UnknownRun(run_id))?;
            (slot.status.subscribe(), slot.task.clone())
        };

        for attempt in 0..poll.max_polls {
            let current = rx.borrow_and_update().clone();
            if current.state.is_terminal() {
                return Ok(current);
            }
            if task.is_finished() {
                return settled(run_id, &rx);
            }

            match timeout(poll.interval_for(attempt), rx.changed()).await {
                Ok(Ok(())) | Err(_) => {}
                Ok(Err(_)) => return settled(run_id, &rx),
            }
        }

        let last = rx.borrow().clone();
        if last.state.is_terminal() {
            return Ok(last);
        }
        warn!(run = %run_id, polls = poll.max_polls, "Gave up waiting for run");
        Err(RetryError::Timeout {
            run_id,
            polls: poll.max_polls,
        })
    }

    /// Run `action` to completion and return its value.
    ///
    /// The background run never outlives this future: a poll timeout or a
    /// dropped caller cancels it.
    pub async fn execute<F, Fut>(
        &self,
        name: &str,
        poll: &PollPolicy,
        action: F,
    ) -> Result<Value, RetryError>
    where
        F: Fn(u32) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ActionError>> + Send + 'static,
    {
        let run = RunGuard {
            controller: self,
            run_id: self.run(name, action),
        };
        let outcome = self.wait(run.run_id, poll).await;
        drop(run);

        let status = outcome?;
        match (status.state, status.result) {
            (RunState::Completed, Some(value)) => Ok(value),
            (_, _) => Err(RetryError::Failed {
                action: name.to_string(),
                attempts: status.attempts.len() as u32,
                last_error: status.error.unwrap_or_else(|| "no result".to_string()),
            }),
        }
    }

    /// Stop a run that is still going and mark it failed. Finished runs are
    /// left untouched.
    pub fn cancel(&self, run_id: RunId) -> Result<RunStatus, RetryError> {
        let runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        let slot = runs.get(&run_id).ok_or(RetryError::UnknownRun(run_id))?;
        slot.task.abort();
        let cancelled = slot.status.send_if_modified(|status| {
            if status.state.is_terminal() {
                return false;
            }
            status.state = RunState::Failed;
            status.error = Some("cancelled before reaching a terminal state".to_string());
            true
        });
        if cancelled {
            debug!(run = %run_id, "Cancelled run");
        }
        let current = slot.status.borrow().clone();
        Ok(current)
    }

    /// Drop the record of a run, cancelling it first if it is still going.
    pub fn forget(&self, run_id: RunId) {
        let slot = self
            .runs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&run_id);
        if let Some(slot) = slot {
            slot.task.abort();
        }
    }

    pub fn tracked_runs(&self) -> usize {
        self.runs.lock().map(|r| r.len()).unwrap_or(0)
    }
}

/// Latest status of a run whose task is gone.
fn settled(run_id: RunId, rx: &watch::Receiver<RunStatus>) -> Result<RunStatus, RetryError> {
    let last = rx.borrow().clone();
    if last.state.is_terminal() {
        Ok(last)
    } else {
        Err(RetryError::Abandoned(run_id))
    }
}

/// Forgets (and so cancels) its run when dropped.
struct RunGuard<'a> {
    controller: &'a RetryController,
    run_id: RunId,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.controller.forget(self.run_id);
    }
}

async fn drive<F, Fut>(
    run_id: RunId,
    name: &str,
    policy: RetryPolicy,
    action: F,
    tx: &watch::Sender<RunStatus>,
) where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<Value, ActionError>>,
{
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match action(attempt).await {
            Ok(value) => {
                debug!(run = %run_id, action = name, attempt, "Attempt succeeded");
                tx.send_modify(|status| {
                    status.attempts.push(RetryAttempt {
                        attempt_number: attempt,
                        backoff_ms: 0,
                        outcome: AttemptOutcome::Succeeded,
                    });
                    status.result = Some(value);
                    status.error = None;
                    status.state = RunState::Completed;
                });
                return;
            }
            Err(error) => {
                let last = attempt == max_attempts || !error.is_transient();
                let backoff = if last {
                    std::time::Duration::ZERO
                } else {
                    policy.backoff_after(attempt)
                };

                debug!(
                    run = %run_id,
                    action = name,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %error,
                    "Attempt failed"
                );

                tx.send_modify(|status| {
                    status.attempts.push(RetryAttempt {
                        attempt_number: attempt,
                        backoff_ms: backoff.as_millis() as u64,
                        outcome: AttemptOutcome::Failed {
                            error: error.to_string(),
                        },
                    });
                    status.error = Some(error.to_string());
                    if last {
                        status.state = RunState::Failed;
                    }
                });

                if last {
                    warn!(run = %run_id, action = name, attempts = attempt, "Retries exhausted");
                    return;
                }
                tokio::time::sleep(backoff).await;
            }
        }
    }
}
