//! devpulse - daily developer activity analysis
//!
//! Turns one day of commits, pull requests and issues across many
//! repositories into a single structured report. Language-model inference
//! drives the per-repository summaries, the cross-repository patterns and the
//! final synthesis; every inference call goes through the action cache and
//! the retry controller, and every stage has a deterministic fallback.
//!
//! # Project Structure
//!
//! - [`activity`]: activity sources, grouping by repository and batch splitting
//! - [`cache`]: content-addressed action cache
//! - [`retry`]: bounded retry with exponential backoff and status polling
//! - [`llm`] / [`inference`] / [`tools`]: inference clients, the tool-calling loop
//!   and the read-only activity tools the model may call
//! - [`pipeline`]: repository analyzer, pattern detector and global synthesizer
//! - [`workflow`]: the run state machine, step event log and engine
//! - [`orchestrator`] / [`server`]: trigger surfaces (scheduler and HTTP)
//! - [`persistence`]: versioned report storage
//!
//! # Example Usage
//!
//! ```no_run
//! use devpulse::config::DevpulseConfig;
//! use devpulse::orchestrator::Orchestrator;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = DevpulseConfig::from_env()?;
//! config.validate()?;
//!
//! let orchestrator = Orchestrator::from_config(&config)?;
//! let report = orchestrator.run_now(None).await?;
//! println!("{}", report.report.title);
//! # Ok(())
//! # }
//! ```

pub mod activity;
pub mod cache;
pub mod cli;
pub mod config;
pub mod inference;
pub mod llm;
pub mod orchestrator;
pub mod persistence;
pub mod pipeline;
pub mod report;
pub mod retry;
pub mod server;
pub mod settings;
pub mod tools;
pub mod util;
pub mod workflow;

pub use config::{ConfigError, DevpulseConfig, Environment};
pub use llm::{BackendError, LLMClient};
pub use orchestrator::{Orchestrator, TriggerOutcome};
pub use report::{GlobalSynthesis, PatternSet, RepositoryAnalysis};
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};
pub use workflow::{WorkflowEngine, WorkflowError, WorkflowReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
