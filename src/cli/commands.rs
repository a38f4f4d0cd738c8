use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};

/// Daily developer activity analysis
#[derive(Parser, Debug)]
#[command(
    name = "devpulse",
    about = "Daily developer activity analysis",
    version,
    author,
    long_about = "devpulse turns a day of commits, pull requests and issues across many \
                  repositories into one structured report. Every inference call is cached, \
                  retried with backoff and falls back to a deterministic summary when it \
                  cannot succeed."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Serve the HTTP trigger",
        long_about = "Starts the HTTP server with POST /cron/daily-analysis and the workflow \
                      query endpoints. Requires DEVPULSE_CRON_SECRET. When \
                      DEVPULSE_SCHEDULE_HOUR_UTC is set, also runs the daily trigger in-process.\n\n\
                      Examples:\n  \
                      devpulse serve\n  \
                      devpulse serve --port 9000"
    )]
    Serve(ServeArgs),

    #[command(
        about = "Run the analysis for one day and wait for the report",
        long_about = "Runs the full workflow in the foreground and prints the stored report.\n\n\
                      Examples:\n  \
                      devpulse run\n  \
                      devpulse run --date 2024-05-01 --format json"
    )]
    Run(RunArgs),

    #[command(about = "Print the step events of a workflow run")]
    Events(EventsArgs),

    #[command(about = "Show the effective configuration")]
    Config(ConfigArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, value_name = "ADDR", help = "Bind address (overrides DEVPULSE_BIND)")]
    pub bind: Option<String>,

    #[arg(short = 'p', long, value_name = "PORT", help = "Port (overrides DEVPULSE_PORT)")]
    pub port: Option<u16>,
}

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    #[arg(
        short = 'd',
        long,
        value_parser = parse_date,
        help = "Day to analyze as YYYY-MM-DD (defaults to yesterday UTC)"
    )]
    pub date: Option<NaiveDate>,

    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct EventsArgs {
    #[arg(value_name = "WORKFLOW_ID", help = "Workflow id, e.g. wf_2024-05-01_a1b2c3")]
    pub workflow_id: String,

    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct ConfigArgs {
    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| format!("Invalid date '{}': {} (expected YYYY-MM-DD)", s, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_args_verify() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_run_defaults() {
        let args = CliArgs::parse_from(["devpulse", "run"]);
        match args.command {
            Commands::Run(run) => {
                assert!(run.date.is_none());
                assert_eq!(run.format, OutputFormatArg::Human);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_run_with_date() {
        let args = CliArgs::parse_from(["devpulse", "run", "--date", "2024-05-01", "-f", "json"]);
        match args.command {
            Commands::Run(run) => {
                assert_eq!(run.date, NaiveDate::from_ymd_opt(2024, 5, 1));
                assert_eq!(run.format, OutputFormatArg::Json);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_invalid_date_is_rejected() {
        assert!(CliArgs::try_parse_from(["devpulse", "run", "--date", "yesterday"]).is_err());
    }

    #[test]
    fn test_events_requires_id() {
        assert!(CliArgs::try_parse_from(["devpulse", "events"]).is_err());
        let args = CliArgs::parse_from(["devpulse", "events", "wf_2024-05-01_abc123"]);
        assert!(matches!(args.command, Commands::Events(ref e) if e.workflow_id == "wf_2024-05-01_abc123"));
    }

    #[test]
    fn test_global_flags() {
        let args = CliArgs::parse_from(["devpulse", "serve", "--verbose", "--port", "9000"]);
        assert!(args.verbose);
        match args.command {
            Commands::Serve(serve) => assert_eq!(serve.port, Some(9000)),
            _ => panic!("Expected Serve command"),
        }
        assert!(CliArgs::try_parse_from(["devpulse", "config", "-v", "-q"]).is_err());
    }
}
