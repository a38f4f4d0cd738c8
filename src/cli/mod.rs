pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{CliArgs, Commands, ConfigArgs, EventsArgs, OutputFormatArg, RunArgs, ServeArgs};
pub use output::{OutputFormat, OutputFormatter};
