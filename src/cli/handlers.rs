//! Command handlers. Each returns the process exit code.

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::{error, info};

use super::commands::{ConfigArgs, EventsArgs, RunArgs, ServeArgs};
use super::output::OutputFormatter;
use crate::config::DevpulseConfig;
use crate::orchestrator::Orchestrator;
use crate::server::{self, ServeConfig};
use crate::workflow::event_log::jsonl_path;
use crate::workflow::read_jsonl;

fn load_config() -> Result<DevpulseConfig> {
    let config = DevpulseConfig::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn report_failure(command: &str, err: anyhow::Error) -> i32 {
    error!(command, error = %format!("{:#}", err), "Command failed");
    eprintln!("Error: {:#}", err);
    1
}

pub async fn handle_serve(args: &ServeArgs) -> i32 {
    match serve(args).await {
        Ok(()) => 0,
        Err(e) => report_failure("serve", e),
    }
}

async fn serve(args: &ServeArgs) -> Result<()> {
    let mut config = load_config()?;
    if let Some(bind) = &args.bind {
        config.bind = bind.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    let Some(cron_secret) = config.cron_secret.clone().filter(|s| !s.trim().is_empty()) else {
        bail!("DEVPULSE_CRON_SECRET must be set to serve the HTTP trigger");
    };

    let orchestrator =
        Arc::new(Orchestrator::from_config(&config).context("Failed to build orchestrator")?);

    if let Some(hour) = config.schedule_hour_utc {
        info!(hour, "Built-in daily schedule enabled");
        orchestrator.clone().spawn_scheduler(hour);
    }

    server::serve(
        orchestrator,
        ServeConfig {
            bind: config.bind.clone(),
            port: config.port,
            cron_secret,
        },
    )
    .await
}

pub async fn handle_run(args: &RunArgs) -> i32 {
    match run(args).await {
        Ok(output) => {
            println!("{}", output);
            0
        }
        Err(e) => report_failure("run", e),
    }
}

async fn run(args: &RunArgs) -> Result<String> {
    let config = load_config()?;
    let orchestrator = Orchestrator::from_config(&config).context("Failed to build orchestrator")?;

    let report = orchestrator
        .run_now(args.date)
        .await
        .context("Daily analysis failed")?;
    info!(workflow_id = %report.workflow_id, log_id = %report.log_id, "Daily analysis stored");

    OutputFormatter::new(args.format.into()).format_report(&report)
}

pub fn handle_events(args: &EventsArgs) -> i32 {
    let result = load_config().and_then(|config| {
        let path = jsonl_path(&config.events_dir(), &args.workflow_id);
        let events = read_jsonl(&path)
            .with_context(|| format!("No event log for {} at {}", args.workflow_id, path.display()))?;
        OutputFormatter::new(args.format.into()).format_events(&events)
    });

    match result {
        Ok(output) => {
            print!("{}", output);
            0
        }
        Err(e) => report_failure("events", e),
    }
}

pub fn handle_config(args: &ConfigArgs) -> i32 {
    let result = DevpulseConfig::from_env()
        .context("Failed to load configuration")
        .and_then(|config| {
            let output = OutputFormatter::new(args.format.into()).format_config(&config.to_display_map())?;
            if let Err(e) = config.validate() {
                eprintln!("\u{26A0} {}", e);
            }
            Ok(output)
        });

    match result {
        Ok(output) => {
            print!("{}", output);
            0
        }
        Err(e) => report_failure("config", e),
    }
}
