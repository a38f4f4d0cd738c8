use devpulse::cli::commands::{CliArgs, Commands};
use devpulse::cli::handlers::{handle_config, handle_events, handle_run, handle_serve};
use devpulse::util::logging::{init_logging, parse_level, LoggingConfig};
use devpulse::VERSION;

use clap::Parser;
use std::env;
use tracing::{debug, Level};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("devpulse v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Serve(serve_args) => handle_serve(serve_args).await,
        Commands::Run(run_args) => handle_run(run_args).await,
        Commands::Events(events_args) => handle_events(events_args),
        Commands::Config(config_args) => handle_config(config_args),
    };

    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let level = if let Some(level_str) = &args.log_level {
        parse_level(level_str)
    } else if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::ERROR
    } else {
        let level_str = env::var("DEVPULSE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        parse_level(&level_str)
    };

    // JSON lines only make sense for the long-running server
    let use_json = matches!(args.command, Commands::Serve(_))
        && env::var("DEVPULSE_LOG_JSON")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);

    let config = if use_json {
        LoggingConfig {
            level,
            ..LoggingConfig::production()
        }
    } else {
        LoggingConfig::with_level(level)
    };
    init_logging(config);
}
