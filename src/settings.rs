//! Settings store collaborator
//!
//! Prompt instructions are operator-owned settings, not code. The daily
//! instructions key is required: a run without it aborts before any inference.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

pub const DAILY_INSTRUCTIONS_KEY: &str = "daily_analysis.instructions";
pub const PATTERN_INSTRUCTIONS_KEY: &str = "daily_analysis.pattern_instructions";
pub const SYNTHESIS_INSTRUCTIONS_KEY: &str = "daily_analysis.synthesis_instructions";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Required setting '{0}' is missing")]
    Missing(String),

    #[error("Failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Settings file {path} is not valid TOML: {message}")]
    Parse { path: PathBuf, message: String },
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_by_key(&self, key: &str) -> Result<Option<String>, SettingsError>;
}

/// Instructions used by one workflow run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instructions {
    pub daily: String,
    pub patterns: Option<String>,
    pub synthesis: Option<String>,
}

impl Instructions {
    /// Load instructions, failing when the required key is absent or blank.
    pub async fn load(store: &dyn SettingsStore) -> Result<Self, SettingsError> {
        let daily = store
            .get_by_key(DAILY_INSTRUCTIONS_KEY)
            .await?
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| SettingsError::Missing(DAILY_INSTRUCTIONS_KEY.to_string()))?;

        let optional = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        Ok(Self {
            daily,
            patterns: optional(store.get_by_key(PATTERN_INSTRUCTIONS_KEY).await?),
            synthesis: optional(store.get_by_key(SYNTHESIS_INSTRUCTIONS_KEY).await?),
        })
    }
}

#[derive(Debug, Default)]
pub struct InMemorySettingsStore {
    values: HashMap<String, String>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn get_by_key(&self, key: &str) -> Result<Option<String>, SettingsError> {
        Ok(self.values.get(key).cloned())
    }
}

/// Reads a TOML file on every lookup, so edits apply to the next run.
///
/// Dotted keys address nested tables: `daily_analysis.instructions` is the
/// `instructions` entry of the `[daily_analysis]` table. A missing file is
/// the same as an empty one.
pub struct TomlSettingsStore {
    path: PathBuf,
}

impl TomlSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn load(&self) -> Result<Option<toml::Table>, SettingsError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Settings file not found");
                return Ok(None);
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        raw.parse::<toml::Table>()
            .map(Some)
            .map_err(|e| SettingsError::Parse {
                path: self.path.clone(),
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl SettingsStore for TomlSettingsStore {
    async fn get_by_key(&self, key: &str) -> Result<Option<String>, SettingsError> {
        let Some(table) = self.load().await? else {
            return Ok(None);
        };

        let mut parts = key.split('.').peekable();
        let mut current = &table;
        while let Some(part) = parts.next() {
            let value = match current.get(part) {
                Some(value) => value,
                None => return Ok(None),
            };
            if parts.peek().is_none() {
                return Ok(match value {
                    toml::Value::String(s) => Some(s.clone()),
                    other => Some(other.to_string()),
                });
            }
            match value.as_table() {
                Some(table) => current = table,
                None => return Ok(None),
            }
        }
        Ok(None)
    }
}
