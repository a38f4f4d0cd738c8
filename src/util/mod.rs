//! Utility modules for devpulse
//!
//! Currently only the structured logging setup shared by the CLI and the
//! server process.

pub mod logging;

pub use logging::{init_default, init_from_env, init_logging, LoggingConfig};
