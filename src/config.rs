//! Configuration management for devpulse
//!
//! Settings are loaded from environment variables with defaults matching the
//! pipeline policies. The result is validated once at startup and then handed
//! to the `Orchestrator`; nothing reads the environment after that.
//!
//! # Environment Variables
//!
//! ## Inference
//! - `DEVPULSE_PROVIDER`: genai provider (ollama|openai|anthropic|gemini|xai|groq) - default: "ollama"
//! - `DEVPULSE_MODEL`: model name - default: provider specific
//! - `DEVPULSE_REQUEST_TIMEOUT`: per-request timeout in seconds - default: "60"
//! - `DEVPULSE_MAX_TOOL_STEPS`: tool-call steps per batch call - default: "15"
//!
//! ## Pipeline policy
//! - `DEVPULSE_BATCH_SIZE`: commits per batch - default: "10"
//! - `DEVPULSE_MAX_ATTEMPTS`: attempts per retried action - default: "3"
//! - `DEVPULSE_INITIAL_BACKOFF_MS` / `DEVPULSE_BACKOFF_BASE`: retry backoff - default: "1000" / "2"
//! - `DEVPULSE_POLL_INITIAL_MS` / `DEVPULSE_POLL_STEP_MS` / `DEVPULSE_POLL_MAX_MS` / `DEVPULSE_POLL_MAX_COUNT`:
//!   status polling schedule - default: "250" / "250" / "2000" / "60"
//! - `DEVPULSE_REPO_TIMEOUT_SECS`: upper bound for one repository - default: "600"
//! - `DEVPULSE_CACHE_TTL_SECS`: cache entry lifetime - default: "86400"
//! - `DEVPULSE_CACHE_PERSIST`: keep cache entries on disk - default: "true"
//! - `DEVPULSE_SUMMARY_CACHE_VERSION` / `DEVPULSE_SYNTHESIS_CACHE_VERSION`: cache version tags - default: "v1"
//!
//! ## Service
//! - `DEVPULSE_ENVIRONMENT`: production|development - default: "production"
//! - `DEVPULSE_CRON_SECRET`: bearer secret for the HTTP trigger
//! - `DEVPULSE_BIND` / `DEVPULSE_PORT`: listen address - default: "127.0.0.1" / "8787"
//! - `DEVPULSE_DATA_DIR`: root for activity, settings, cache, reports and event logs
//! - `DEVPULSE_ACTIVITY_URL`: HTTP activity endpoint (otherwise JSON files under the data dir)
//! - `DEVPULSE_SCHEDULE_HOUR_UTC`: hour for the built-in daily trigger
//! - `DEVPULSE_LOG_LEVEL` / `DEVPULSE_LOG_JSON`: logging

use crate::activity::BatchPolicy;
use crate::cache::CachePolicy;
use crate::llm::parse_provider;
use crate::pipeline::AnalyzerPolicy;
use crate::retry::{PollPolicy, RetryPolicy};
use genai::adapter::AdapterKind;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_OLLAMA_MODEL: &str = "qwen2.5-coder:7b";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_REPO_TIMEOUT_SECS: u64 = 600;
const DEFAULT_BIND: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8787;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid provider name
    #[error("Invalid provider: {0}. Valid options: ollama, openai, anthropic, gemini, xai, groq")]
    InvalidProvider(String),

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// Failed to parse configuration value
    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },
}

/// Deployment environment. The scheduled trigger is disabled outside
/// production so development machines never incur inference cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "development" | "dev" => Ok(Environment::Development),
            other => Err(ConfigError::ParseError {
                field: "DEVPULSE_ENVIRONMENT".to_string(),
                error: format!("unknown environment '{}'", other),
            }),
        }
    }
}

/// Main configuration structure for devpulse
#[derive(Debug, Clone)]
pub struct DevpulseConfig {
    pub provider: AdapterKind,
    pub model: String,
    pub request_timeout_secs: u64,
    pub environment: Environment,
    pub cron_secret: Option<String>,
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub activity_url: Option<String>,
    pub schedule_hour_utc: Option<u32>,
    pub batch: BatchPolicy,
    pub retry: RetryPolicy,
    pub poll: PollPolicy,
    pub cache: CachePolicy,
    pub analyzer: AnalyzerPolicy,
    pub repo_timeout_secs: u64,
    pub summary_cache_version: String,
    pub synthesis_cache_version: String,
    pub log_level: String,
    pub log_json: bool,
}

impl Default for DevpulseConfig {
    /// Policy defaults, independent of the process environment.
    fn default() -> Self {
        Self {
            provider: AdapterKind::Ollama,
            model: DEFAULT_OLLAMA_MODEL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            environment: Environment::Production,
            cron_secret: None,
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            data_dir: default_data_dir(),
            activity_url: None,
            schedule_hour_utc: None,
            batch: BatchPolicy::default(),
            retry: RetryPolicy::default(),
            poll: PollPolicy::default(),
            cache: CachePolicy::default(),
            analyzer: AnalyzerPolicy::default(),
            repo_timeout_secs: DEFAULT_REPO_TIMEOUT_SECS,
            summary_cache_version: "v1".to_string(),
            synthesis_cache_version: "v1".to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_json: false,
        }
    }
}

impl DevpulseConfig {
    /// Load configuration from `DEVPULSE_*` variables on top of the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(name) = env::var("DEVPULSE_PROVIDER") {
            config.provider =
                parse_provider(&name).ok_or_else(|| ConfigError::InvalidProvider(name.clone()))?;
            if config.provider != AdapterKind::Ollama {
                config.model = String::new();
            }
        }
        if let Ok(model) = env::var("DEVPULSE_MODEL") {
            config.model = model;
        }

        config.request_timeout_secs = parse_var("DEVPULSE_REQUEST_TIMEOUT", config.request_timeout_secs)?;
        config.repo_timeout_secs = parse_var("DEVPULSE_REPO_TIMEOUT_SECS", config.repo_timeout_secs)?;

        if let Ok(value) = env::var("DEVPULSE_ENVIRONMENT") {
            config.environment = value.parse()?;
        }
        config.cron_secret = env::var("DEVPULSE_CRON_SECRET").ok().filter(|s| !s.is_empty());
        if let Ok(bind) = env::var("DEVPULSE_BIND") {
            config.bind = bind;
        }
        config.port = parse_var("DEVPULSE_PORT", config.port)?;
        if let Ok(dir) = env::var("DEVPULSE_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        config.activity_url = env::var("DEVPULSE_ACTIVITY_URL").ok().filter(|s| !s.is_empty());
        config.schedule_hour_utc = match env::var("DEVPULSE_SCHEDULE_HOUR_UTC") {
            Ok(v) => Some(parse_value("DEVPULSE_SCHEDULE_HOUR_UTC", &v)?),
            Err(_) => None,
        };

        config.batch.batch_size = parse_var("DEVPULSE_BATCH_SIZE", config.batch.batch_size)?;

        config.retry.max_attempts = parse_var("DEVPULSE_MAX_ATTEMPTS", config.retry.max_attempts)?;
        config.retry.initial_backoff = Duration::from_millis(parse_var(
            "DEVPULSE_INITIAL_BACKOFF_MS",
            config.retry.initial_backoff.as_millis() as u64,
        )?);
        config.retry.backoff_base = parse_var("DEVPULSE_BACKOFF_BASE", config.retry.backoff_base)?;

        config.poll.initial_interval = Duration::from_millis(parse_var(
            "DEVPULSE_POLL_INITIAL_MS",
            config.poll.initial_interval.as_millis() as u64,
        )?);
        config.poll.step = Duration::from_millis(parse_var(
            "DEVPULSE_POLL_STEP_MS",
            config.poll.step.as_millis() as u64,
        )?);
        config.poll.max_interval = Duration::from_millis(parse_var(
            "DEVPULSE_POLL_MAX_MS",
            config.poll.max_interval.as_millis() as u64,
        )?);
        config.poll.max_polls = parse_var("DEVPULSE_POLL_MAX_COUNT", config.poll.max_polls)?;

        config.cache.ttl = Duration::from_secs(parse_var(
            "DEVPULSE_CACHE_TTL_SECS",
            config.cache.ttl.as_secs(),
        )?);
        config.cache.persist = parse_var("DEVPULSE_CACHE_PERSIST", config.cache.persist)?;

        config.analyzer.max_tool_steps =
            parse_var("DEVPULSE_MAX_TOOL_STEPS", config.analyzer.max_tool_steps)?;

        if let Ok(v) = env::var("DEVPULSE_SUMMARY_CACHE_VERSION") {
            config.summary_cache_version = v;
        }
        if let Ok(v) = env::var("DEVPULSE_SYNTHESIS_CACHE_VERSION") {
            config.synthesis_cache_version = v;
        }

        config.log_level = env::var("DEVPULSE_LOG_LEVEL")
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
            .to_lowercase();
        config.log_json = parse_var("DEVPULSE_LOG_JSON", config.log_json)?;

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn fail(msg: impl Into<String>) -> Result<(), ConfigError> {
            Err(ConfigError::ValidationFailed(msg.into()))
        }

        if self.model.trim().is_empty() {
            return fail("DEVPULSE_MODEL must be set for non-Ollama providers");
        }
        if self.request_timeout_secs == 0 || self.request_timeout_secs > 600 {
            return fail("Request timeout must be between 1 second and 10 minutes");
        }
        if self.repo_timeout_secs == 0 {
            return fail("Repository timeout must be at least 1 second");
        }
        if self.batch.batch_size == 0 {
            return fail("Batch size must be at least 1");
        }
        if self.retry.max_attempts == 0 {
            return fail("Max attempts must be at least 1");
        }
        if self.retry.backoff_base < 1.0 {
            return fail("Backoff base must be >= 1");
        }
        if self.poll.max_polls == 0 {
            return fail("Poll count must be at least 1");
        }
        if self.poll.initial_interval.is_zero() || self.poll.max_interval < self.poll.initial_interval {
            return fail("Poll max interval must be >= a non-zero initial interval");
        }
        if self.analyzer.max_tool_steps == 0 {
            return fail("Max tool steps must be at least 1");
        }
        if self.summary_cache_version.trim().is_empty() || self.synthesis_cache_version.trim().is_empty() {
            return fail("Cache version tags must not be empty");
        }
        if let Some(hour) = self.schedule_hour_utc {
            if hour > 23 {
                return fail(format!("Schedule hour {} is not a valid UTC hour", hour));
            }
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return fail(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                ))
            }
        }

        Ok(())
    }

    pub fn repo_timeout(&self) -> Duration {
        Duration::from_secs(self.repo_timeout_secs)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    pub fn activity_dir(&self) -> PathBuf {
        self.data_dir.join("activity")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.data_dir.join("reports")
    }

    pub fn events_dir(&self) -> PathBuf {
        self.data_dir.join("events")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.toml")
    }

    /// Converts configuration to a display map for output formatting
    pub fn to_display_map(&self) -> std::collections::BTreeMap<String, String> {
        let mut map = std::collections::BTreeMap::new();

        map.insert("provider".to_string(), self.provider.as_str().to_string());
        map.insert("model".to_string(), self.model.clone());
        map.insert("environment".to_string(), format!("{:?}", self.environment).to_lowercase());
        map.insert("data_dir".to_string(), self.data_dir.display().to_string());
        map.insert("listen".to_string(), format!("{}:{}", self.bind, self.port));
        map.insert(
            "cron_secret".to_string(),
            if self.cron_secret.is_some() { "set" } else { "unset" }.to_string(),
        );
        map.insert("batch_size".to_string(), self.batch.batch_size.to_string());
        map.insert("max_attempts".to_string(), self.retry.max_attempts.to_string());
        map.insert("cache_ttl_secs".to_string(), self.cache.ttl.as_secs().to_string());
        map.insert("max_tool_steps".to_string(), self.analyzer.max_tool_steps.to_string());
        map.insert("summary_cache_version".to_string(), self.summary_cache_version.clone());
        map.insert("synthesis_cache_version".to_string(), self.synthesis_cache_version.clone());
        map.insert("log_level".to_string(), self.log_level.clone());

        map
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(env::temp_dir)
        .join("devpulse")
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => parse_value(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: FromStr>(name: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::ParseError {
        field: name.to_string(),
        error: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "DEVPULSE_PROVIDER",
        "DEVPULSE_MODEL",
        "DEVPULSE_BATCH_SIZE",
        "DEVPULSE_ENVIRONMENT",
        "DEVPULSE_MAX_ATTEMPTS",
        "DEVPULSE_POLL_MAX_COUNT",
        "DEVPULSE_CACHE_TTL_SECS",
        "DEVPULSE_SCHEDULE_HOUR_UTC",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_default_matches_policy_defaults() {
        let config = DevpulseConfig::default();
        assert_eq!(config.batch.batch_size, 10);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.poll.max_polls, 60);
        assert_eq!(config.poll.initial_interval, Duration::from_millis(250));
        assert_eq!(config.poll.max_interval, Duration::from_millis(2000));
        assert_eq!(config.cache.ttl, Duration::from_secs(24 * 60 * 60));
        assert_eq!(config.analyzer.max_tool_steps, 15);
        assert_eq!(config.environment, Environment::Production);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        env::set_var("DEVPULSE_BATCH_SIZE", "25");
        env::set_var("DEVPULSE_ENVIRONMENT", "development");
        env::set_var("DEVPULSE_MAX_ATTEMPTS", "5");
        env::set_var("DEVPULSE_CACHE_TTL_SECS", "60");

        let config = DevpulseConfig::from_env().unwrap();
        assert_eq!(config.batch.batch_size, 25);
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.cache.ttl, Duration::from_secs(60));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_garbage() {
        clear_env();
        env::set_var("DEVPULSE_BATCH_SIZE", "ten");
        let err = DevpulseConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { ref field, .. } if field == "DEVPULSE_BATCH_SIZE"));
        clear_env();

        env::set_var("DEVPULSE_PROVIDER", "carrier-pigeon");
        assert!(matches!(
            DevpulseConfig::from_env(),
            Err(ConfigError::InvalidProvider(_))
        ));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_cloud_provider_requires_model() {
        clear_env();
        env::set_var("DEVPULSE_PROVIDER", "openai");
        let config = DevpulseConfig::from_env().unwrap();
        assert!(config.validate().is_err());

        env::set_var("DEVPULSE_MODEL", "gpt-4o-mini");
        let config = DevpulseConfig::from_env().unwrap();
        assert!(config.validate().is_ok());
        clear_env();
    }

    #[test]
    fn test_validation_failures() {
        let mut config = DevpulseConfig::default();
        config.batch.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = DevpulseConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = DevpulseConfig::default();
        config.poll.max_interval = Duration::from_millis(10);
        assert!(config.validate().is_err());

        let mut config = DevpulseConfig::default();
        config.schedule_hour_utc = Some(24);
        assert!(config.validate().is_err());

        let mut config = DevpulseConfig::default();
        config.log_level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("Development".parse::<Environment>().unwrap(), Environment::Development);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn test_display_map_hides_secret() {
        let mut config = DevpulseConfig::default();
        config.cron_secret = Some("hunter2".to_string());
        let map = config.to_display_map();
        assert_eq!(map.get("cron_secret").map(String::as_str), Some("set"));
        assert!(!map.values().any(|v| v.contains("hunter2")));
    }
}
