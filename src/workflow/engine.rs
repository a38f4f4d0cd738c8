//! Workflow Engine
//!
//! Sequences one run: settings, activity, per-repository analysis, patterns,
//! synthesis, storage. Repositories are analyzed one after another so a
//! failing repository is logged and skipped without losing earlier results.
//! Only missing settings, an activity fetch failure and a storage failure end
//! the run early.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::error::WorkflowError;
use super::event_log::EventLog;
use super::registry::WorkflowRegistry;
use super::state::{WorkflowRun, WorkflowStage};
use crate::activity::{
    group_by_repository, split_into_batches, ActivitySource, BatchPolicy, DailyActivity,
};
use crate::inference::SessionLog;
use crate::persistence::{PersistenceSink, RawData, StoredAnalysis};
use crate::pipeline::{
    AnalysisError, AnalysisRequest, GlobalSynthesizer, PatternDetection, PatternDetector,
    PipelineContext, RepositoryAnalysisStep, RepositoryAnalyzer, Synthesis,
};
use crate::report::{GlobalSynthesis, PatternSet, RepositoryAnalysis, SynthesisInputs};
use crate::settings::{Instructions, SettingsStore};

pub const DEFAULT_REPO_TIMEOUT: Duration = Duration::from_secs(600);

/// Result of a completed run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowReport {
    pub workflow_id: String,
    pub log_id: String,
    pub version: u32,
    pub report: GlobalSynthesis,
    pub failed_repositories: Vec<String>,
}

/// A run that is visible in the registry but not started yet.
pub struct RegisteredRun {
    run: WorkflowRun,
    events: Arc<EventLog>,
    date: NaiveDate,
}

impl RegisteredRun {
    pub fn workflow_id(&self) -> &str {
        &self.run.id
    }
}

pub struct WorkflowEngine {
    activity: Arc<dyn ActivitySource>,
    settings: Arc<dyn SettingsStore>,
    sink: Arc<dyn PersistenceSink>,
    analyzer: Arc<dyn RepositoryAnalysisStep>,
    patterns: Arc<dyn PatternDetection>,
    synthesizer: Arc<dyn Synthesis>,
    batch: BatchPolicy,
    repo_timeout: Duration,
    registry: Arc<WorkflowRegistry>,
    events_dir: Option<PathBuf>,
}

impl WorkflowEngine {
    pub fn new(
        context: PipelineContext,
        activity: Arc<dyn ActivitySource>,
        settings: Arc<dyn SettingsStore>,
        sink: Arc<dyn PersistenceSink>,
    ) -> Self {
        Self {
            activity,
            settings,
            sink,
            analyzer: Arc::new(RepositoryAnalyzer::new(context.clone())),
            patterns: Arc::new(PatternDetector::new(context.clone())),
            synthesizer: Arc::new(GlobalSynthesizer::new(context)),
            batch: BatchPolicy::default(),
            repo_timeout: DEFAULT_REPO_TIMEOUT,
            registry: Arc::new(WorkflowRegistry::new()),
            events_dir: None,
        }
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn RepositoryAnalysisStep>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_pattern_detector(mut self, patterns: Arc<dyn PatternDetection>) -> Self {
        self.patterns = patterns;
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn Synthesis>) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    pub fn with_batch_policy(mut self, batch: BatchPolicy) -> Self {
        self.batch = batch;
        self
    }

    pub fn with_repo_timeout(mut self, timeout: Duration) -> Self {
        self.repo_timeout = timeout;
        self
    }

    pub fn with_registry(mut self, registry: Arc<WorkflowRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Mirror every run's events to `{dir}/{workflow_id}.jsonl`.
    pub fn with_events_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.events_dir = Some(dir.into());
        self
    }

    pub fn registry(&self) -> &Arc<WorkflowRegistry> {
        &self.registry
    }

    /// Execute one run to completion.
    pub async fn run(&self, workflow_id: &str, date: NaiveDate) -> Result<WorkflowReport, WorkflowError> {
        let registered = self.register(workflow_id, date);
        self.run_registered(registered).await
    }

    /// Record a new run in the registry without starting it, so it can be
    /// queried before `run_registered` gets scheduled.
    pub fn register(&self, workflow_id: &str, date: NaiveDate) -> RegisteredRun {
        let events = Arc::new(match &self.events_dir {
            Some(dir) => EventLog::with_mirror(workflow_id, dir),
            None => EventLog::new(workflow_id),
        });
        let run = WorkflowRun::new(workflow_id, date.to_string());
        self.registry.register(run.clone(), events.clone());
        RegisteredRun { run, events, date }
    }

    pub async fn run_registered(&self, registered: RegisteredRun) -> Result<WorkflowReport, WorkflowError> {
        let RegisteredRun {
            mut run,
            events,
            date,
        } = registered;
        let workflow_id = run.id.clone();

        info!(workflow_id = %workflow_id, %date, "Workflow started");
        events.started(WorkflowStage::Started.step());

        match self.execute(&mut run, &events, date).await {
            Ok(report) => {
                events.completed(
                    WorkflowStage::Started.step(),
                    json!({ "logId": report.log_id, "failedRepositories": report.failed_repositories }),
                );
                run.log_id = Some(report.log_id.clone());
                run.failed_repositories = report.failed_repositories.clone();
                self.transition(&mut run, WorkflowStage::Completed)?;
                info!(workflow_id = %workflow_id, log_id = %report.log_id, "Workflow completed");
                Ok(report)
            }
            Err(e) => {
                error!(workflow_id = %workflow_id, stage = %run.stage, error = %e, "Workflow failed");
                events.failed(WorkflowStage::Started.step(), &e);
                run.fail(e.to_string());
                self.registry.update(&run);
                Err(e)
            }
        }
    }

    fn transition(&self, run: &mut WorkflowRun, to: WorkflowStage) -> Result<(), WorkflowError> {
        run.advance(to)?;
        self.registry.update(run);
        Ok(())
    }

    async fn execute(
        &self,
        run: &mut WorkflowRun,
        events: &EventLog,
        date: NaiveDate,
    ) -> Result<WorkflowReport, WorkflowError> {
        let date_str = date.to_string();
        let sessions = SessionLog::new();

        // Fail fast before any inference cost
        events.started("load_settings");
        let instructions = match Instructions::load(self.settings.as_ref()).await {
            Ok(instructions) => instructions,
            Err(e) => {
                events.failed("load_settings", &e);
                return Err(e.into());
            }
        };
        events.completed("load_settings", serde_json::Value::Null);

        // ── Activity ──
        self.transition(run, WorkflowStage::FetchingActivity)?;
        let step = WorkflowStage::FetchingActivity.step();
        events.started(step);
        let activity = match self.activity.fetch_daily_activity(date).await {
            Ok(activity) => activity.normalized(),
            Err(e) => {
                events.failed(step, &e);
                return Err(e.into());
            }
        };
        events.completed(
            step,
            json!({ "totalCommits": activity.total_commits, "totalRepos": activity.total_repos }),
        );

        // ── Repositories ──
        self.transition(run, WorkflowStage::AnalyzingRepositories)?;
        let step = WorkflowStage::AnalyzingRepositories.step();
        events.started(step);
        let (analyses, failed_repositories) = self
            .analyze_repositories(&activity, &date_str, &instructions, events, &sessions)
            .await;
        events.completed(
            step,
            json!({ "analyzed": analyses.len(), "failed": failed_repositories }),
        );

        // ── Patterns ──
        self.transition(run, WorkflowStage::DetectingPatterns)?;
        let step = WorkflowStage::DetectingPatterns.step();
        events.started(step);
        let patterns = match self
            .patterns
            .detect(&analyses, &date_str, instructions.patterns.as_deref(), &sessions)
            .await
        {
            Ok(patterns) => {
                events.completed(step, json!({ "summary": patterns.summary() }));
                patterns
            }
            Err(e) => {
                warn!(workflow_id = %run.id, error = %e, "Pattern detection failed, continuing without patterns");
                events.failed(step, &e);
                PatternSet::default()
            }
        };

        // ── Synthesis ──
        self.transition(run, WorkflowStage::Synthesizing)?;
        let step = WorkflowStage::Synthesizing.step();
        events.started(step);
        let stats = activity.stats();
        let primary_languages = activity.primary_languages();
        let inputs = SynthesisInputs {
            date: &date_str,
            analyses: &analyses,
            patterns: &patterns,
            stats: &stats,
            primary_languages: &primary_languages,
        };
        let outcome = self
            .synthesizer
            .synthesize(inputs, instructions.synthesis.as_deref(), &sessions)
            .await;
        events.completed(step, json!({ "usedFallback": outcome.used_fallback }));

        // ── Storage ──
        self.transition(run, WorkflowStage::StoringResult)?;
        let step = WorkflowStage::StoringResult.step();
        events.started(step);
        let stored = StoredAnalysis {
            report: outcome.report,
            raw_data: RawData {
                stats,
                repo_summaries: analyses.iter().map(RepositoryAnalysis::compact).collect(),
                pattern_summary: patterns.summary(),
                workflow_id: run.id.clone(),
                sessions: sessions.sessions(),
                failed_repositories: failed_repositories.clone(),
                used_fallback: outcome.used_fallback,
            },
            stored_at: Utc::now(),
        };
        let receipt = match self.sink.store_analysis(&stored).await {
            Ok(receipt) => receipt,
            Err(e) => {
                events.failed(step, &e);
                return Err(e.into());
            }
        };
        events.completed(step, json!({ "logId": receipt.log_id, "version": receipt.version }));

        Ok(WorkflowReport {
            workflow_id: run.id.clone(),
            log_id: receipt.log_id,
            version: receipt.version,
            report: stored.report,
            failed_repositories,
        })
    }

    async fn analyze_repositories(
        &self,
        activity: &DailyActivity,
        date: &str,
        instructions: &Instructions,
        events: &EventLog,
        sessions: &SessionLog,
    ) -> (Vec<RepositoryAnalysis>, Vec<String>) {
        let mut analyses = Vec::new();
        let mut failed = Vec::new();

        for group in group_by_repository(&activity.commits) {
            let repository = group.repository.as_str();
            let step = format!("analyze:{}", repository);
            events.started(step.as_str());

            let batches = split_into_batches(repository, &group.commits, self.batch.batch_size);
            let pull_requests: Vec<_> = activity.pull_requests_for(repository).cloned().collect();
            let issues: Vec<_> = activity.issues_for(repository).cloned().collect();
            let request = AnalysisRequest {
                repository,
                batches: &batches,
                date,
                pull_requests: &pull_requests,
                issues: &issues,
                instructions: &instructions.daily,
                sessions,
            };

            let result = match tokio::time::timeout(self.repo_timeout, self.analyzer.analyze(request)).await {
                Ok(result) => result,
                Err(_) => Err(AnalysisError::Timeout {
                    repository: repository.to_string(),
                    seconds: self.repo_timeout.as_secs(),
                }),
            };

            match result {
                Ok(outcome) => {
                    for batch in &outcome.failed_batches {
                        events.failed(format!("{}:batch:{}", step, batch.index), &batch.error);
                    }
                    events.completed(
                        step,
                        json!({
                            "commitCount": outcome.analysis.commit_count,
                            "usedFallback": outcome.used_fallback,
                        }),
                    );
                    analyses.push(outcome.analysis);
                }
                Err(e) => {
                    warn!(repository, error = %e, "Repository analysis failed, skipping");
                    events.failed(step, &e);
                    failed.push(repository.to_string());
                }
            }
        }

        (analyses, failed)
    }
}
