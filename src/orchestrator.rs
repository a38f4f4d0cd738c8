//! Per-process orchestrator
//!
//! Built once at startup from explicit configuration and shared by reference
//! with the HTTP server, the scheduler and the CLI. Triggers return as soon
//! as the run is spawned; completion shows up in the event log and the
//! stored report.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::activity::{ActivityError, ActivitySource, HttpActivitySource, JsonFileActivitySource};
use crate::cache::{ActionCache, CacheError, CacheStore, FileCacheStore, MemoryCacheStore};
use crate::config::{DevpulseConfig, Environment};
use crate::llm::{select_llm_client, BackendError, LLMClient};
use crate::persistence::FileSink;
use crate::pipeline::{CacheVersions, PipelineContext};
use crate::retry::RetryController;
use crate::settings::TomlSettingsStore;
use crate::workflow::{WorkflowEngine, WorkflowError, WorkflowRegistry, WorkflowReport};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Inference client unavailable: {0}")]
    Backend(#[from] BackendError),

    #[error("Cache store unavailable: {0}")]
    Cache(#[from] CacheError),

    #[error("Activity source unavailable: {0}")]
    Activity(#[from] ActivityError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    Started { workflow_id: String, date: NaiveDate },
    Skipped { reason: String },
}

pub struct Orchestrator {
    engine: Arc<WorkflowEngine>,
    environment: Environment,
    cache: Option<Arc<ActionCache>>,
}

impl Orchestrator {
    pub fn new(engine: WorkflowEngine, environment: Environment) -> Self {
        Self {
            engine: Arc::new(engine),
            environment,
            cache: None,
        }
    }

    /// Cache purged by the scheduler before each daily run.
    pub fn with_cache(mut self, cache: Arc<ActionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Wire every collaborator from configuration.
    pub fn from_config(config: &DevpulseConfig) -> Result<Self, OrchestratorError> {
        let selected = select_llm_client(config)?;
        info!(client = %selected.description, "Inference client ready");
        Self::with_client(config, selected.client)
    }

    /// Like `from_config`, with an already constructed inference client.
    pub fn with_client(
        config: &DevpulseConfig,
        client: Arc<dyn LLMClient>,
    ) -> Result<Self, OrchestratorError> {
        let store: Arc<dyn CacheStore> = if config.cache.persist {
            Arc::new(FileCacheStore::new(config.cache_dir())?)
        } else {
            Arc::new(MemoryCacheStore::new())
        };
        let cache = Arc::new(ActionCache::new(store, config.cache));
        let retry = Arc::new(RetryController::new(config.retry));

        let context = PipelineContext::new(client, cache.clone(), retry)
            .with_poll(config.poll)
            .with_analyzer(config.analyzer)
            .with_versions(CacheVersions {
                summary: config.summary_cache_version.clone(),
                synthesis: config.synthesis_cache_version.clone(),
            });

        let activity: Arc<dyn ActivitySource> = match &config.activity_url {
            Some(url) => Arc::new(HttpActivitySource::new(
                url.clone(),
                Duration::from_secs(config.request_timeout_secs),
            )?),
            None => Arc::new(JsonFileActivitySource::new(config.activity_dir())),
        };
        debug!(source = activity.name(), "Activity source ready");

        let engine = WorkflowEngine::new(
            context,
            activity,
            Arc::new(TomlSettingsStore::new(config.settings_path())),
            Arc::new(FileSink::new(config.reports_dir())),
        )
        .with_batch_policy(config.batch)
        .with_repo_timeout(config.repo_timeout())
        .with_events_dir(config.events_dir());

        Ok(Self::new(engine, config.environment).with_cache(cache))
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn registry(&self) -> &Arc<WorkflowRegistry> {
        self.engine.registry()
    }

    /// Internal trigger: spawn a run for `date` (yesterday UTC when omitted)
    /// and return its id without waiting. Skipped entirely in development.
    pub fn trigger(&self, date: Option<NaiveDate>) -> TriggerOutcome {
        if self.environment == Environment::Development {
            info!("Development environment, daily analysis skipped");
            return TriggerOutcome::Skipped {
                reason: "development environment".to_string(),
            };
        }

        let date = date.unwrap_or_else(yesterday_utc);
        let workflow_id = workflow_id(date);
        let registered = self.engine.register(&workflow_id, date);
        let engine = self.engine.clone();
        tokio::spawn(async move {
            let id = registered.workflow_id().to_string();
            // Failures are already recorded in the event log
            if let Err(e) = engine.run_registered(registered).await {
                debug!(workflow_id = %id, error = %e, "Spawned run ended with error");
            }
        });

        info!(workflow_id = %workflow_id, %date, "Daily analysis triggered");
        TriggerOutcome::Started { workflow_id, date }
    }

    /// Run to completion in the caller's task, regardless of environment.
    pub async fn run_now(&self, date: Option<NaiveDate>) -> Result<WorkflowReport, WorkflowError> {
        let date = date.unwrap_or_else(yesterday_utc);
        self.engine.run(&workflow_id(date), date).await
    }

    /// Fire the internal trigger every day at `hour` UTC.
    pub fn spawn_scheduler(self: Arc<Self>, hour: u32) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let next = next_run_after(now, hour);
                let wait = (next - now).to_std().unwrap_or(Duration::from_secs(60));
                info!(next = %next.to_rfc3339(), "Next scheduled analysis");
                tokio::time::sleep(wait).await;

                if let Some(cache) = &self.cache {
                    if let Err(e) = cache.purge_expired().await {
                        warn!(error = %e, "Cache purge failed");
                    }
                }
                if let TriggerOutcome::Skipped { reason } = self.trigger(None) {
                    debug!(%reason, "Scheduled analysis skipped");
                }
            }
        })
    }
}

/// `wf_{date}_{random6}`
pub fn workflow_id(date: NaiveDate) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("wf_{}_{}", date, &suffix[..6])
}

pub fn yesterday_utc() -> NaiveDate {
    (Utc::now() - ChronoDuration::days(1)).date_naive()
}

/// First instant strictly after `now` at `hour`:00 UTC.
pub fn next_run_after(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let hour = hour.min(23);
    let today = now.date_naive();
    let at = |day: NaiveDate| {
        day.and_hms_opt(hour, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive))
    };
    match at(today) {
        Some(candidate) if candidate > now => candidate,
        _ => at(today + ChronoDuration::days(1)).unwrap_or_else(|| {
            error!(hour, "Could not compute next schedule, retrying in an hour");
            now + ChronoDuration::hours(1)
        }),
    }
}
