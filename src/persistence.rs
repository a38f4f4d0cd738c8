//! Persistence sink for finished reports
//!
//! The file sink keeps every run: `{root}/{date}/v{n}.json`, where `n` grows
//! by one each time the same date is stored again.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tracing::info;

use crate::inference::InferenceSession;
use crate::report::{ActivityStats, GlobalSynthesis};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Report could not be encoded: {0}")]
    Serialization(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Inputs behind a report, kept for debugging and observability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawData {
    pub stats: ActivityStats,
    /// One line per analyzed repository.
    pub repo_summaries: Vec<String>,
    pub pattern_summary: String,
    pub workflow_id: String,
    pub sessions: Vec<InferenceSession>,
    #[serde(default)]
    pub failed_repositories: Vec<String>,
    #[serde(default)]
    pub used_fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAnalysis {
    #[serde(flatten)]
    pub report: GlobalSynthesis,
    pub raw_data: RawData,
    pub stored_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreReceipt {
    pub log_id: String,
    pub version: u32,
    pub stored: bool,
}

#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn store_analysis(&self, analysis: &StoredAnalysis) -> Result<StoreReceipt, StorageError>;

    /// Most recent stored report for `date`.
    async fn latest(&self, date: &str) -> Result<Option<StoredAnalysis>, StorageError>;
}

pub struct FileSink {
    root: PathBuf,
    // Serializes version allocation within the process
    write_lock: AsyncMutex<()>,
}

impl FileSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: AsyncMutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn date_dir(&self, date: &str) -> PathBuf {
        self.root.join(date)
    }

    async fn versions(&self, date: &str) -> Result<Vec<u32>, StorageError> {
        let dir = self.date_dir(date);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StorageError::Io { path: dir, source }),
        };

        let mut versions = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| StorageError::Io {
                path: dir.clone(),
                source,
            })?
        {
            if let Some(version) = parse_version(&entry.file_name().to_string_lossy()) {
                versions.push(version);
            }
        }
        versions.sort_unstable();
        Ok(versions)
    }
}

fn parse_version(file_name: &str) -> Option<u32> {
    file_name
        .strip_prefix('v')?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

#[async_trait]
impl PersistenceSink for FileSink {
    async fn store_analysis(&self, analysis: &StoredAnalysis) -> Result<StoreReceipt, StorageError> {
        let _guard = self.write_lock.lock().await;
        let date = analysis.report.date.as_str();
        let dir = self.date_dir(date);

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| StorageError::Io {
                path: dir.clone(),
                source,
            })?;

        let version = self.versions(date).await?.last().copied().unwrap_or(0) + 1;
        let path = dir.join(format!("v{}.json", version));
        let tmp = dir.join(format!(".v{}.json.tmp", version));

        let json = serde_json::to_string_pretty(analysis)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|source| StorageError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| StorageError::Io {
                path: path.clone(),
                source,
            })?;

        let log_id = format!("{}-v{}", date, version);
        info!(log_id = %log_id, path = %path.display(), "Stored analysis");
        Ok(StoreReceipt {
            log_id,
            version,
            stored: true,
        })
    }

    async fn latest(&self, date: &str) -> Result<Option<StoredAnalysis>, StorageError> {
        let Some(version) = self.versions(date).await?.last().copied() else {
            return Ok(None);
        };
        let path = self.date_dir(date).join(format!("v{}.json", version));
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| StorageError::Io {
                path: path.clone(),
                source,
            })?;
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

/// Keeps stored reports in memory; can be told to fail every write.
#[derive(Default)]
pub struct InMemorySink {
    stored: Mutex<Vec<StoredAnalysis>>,
    failure: Option<String>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            stored: Mutex::new(Vec::new()),
            failure: Some(message.into()),
        }
    }

    pub fn stored(&self) -> Vec<StoredAnalysis> {
        self.stored.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PersistenceSink for InMemorySink {
    async fn store_analysis(&self, analysis: &StoredAnalysis) -> Result<StoreReceipt, StorageError> {
        if let Some(message) = &self.failure {
            return Err(StorageError::Unavailable(message.clone()));
        }
        let mut stored = self
            .stored
            .lock()
            .map_err(|_| StorageError::Unavailable("sink poisoned".to_string()))?;
        let version = stored
            .iter()
            .filter(|s| s.report.date == analysis.report.date)
            .count() as u32
            + 1;
        stored.push(analysis.clone());
        Ok(StoreReceipt {
            log_id: format!("{}-v{}", analysis.report.date, version),
            version,
            stored: true,
        })
    }

    async fn latest(&self, date: &str) -> Result<Option<StoredAnalysis>, StorageError> {
        let stored = self
            .stored
            .lock()
            .map_err(|_| StorageError::Unavailable("sink poisoned".to_string()))?;
        Ok(stored.iter().rev().find(|s| s.report.date == date).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{PatternSet, SynthesisInputs};
    use tempfile::TempDir;

    fn analysis(date: &str) -> StoredAnalysis {
        let stats = ActivityStats::default();
        let patterns = PatternSet::default();
        StoredAnalysis {
            report: GlobalSynthesis::fallback(SynthesisInputs {
                date,
                analyses: &[],
                patterns: &patterns,
                stats: &stats,
                primary_languages: &[],
            }),
            raw_data: RawData {
                stats,
                repo_summaries: Vec::new(),
                pattern_summary: String::new(),
                workflow_id: format!("wf_{}_abc123", date),
                sessions: Vec::new(),
                failed_repositories: Vec::new(),
                used_fallback: true,
            },
            stored_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_file_sink_versions_per_date() {
        let dir = TempDir::new().unwrap();
        let sink = FileSink::new(dir.path());

        let first = sink.store_analysis(&analysis("2024-05-01")).await.unwrap();
        let second = sink.store_analysis(&analysis("2024-05-01")).await.unwrap();
        let other = sink.store_analysis(&analysis("2024-05-02")).await.unwrap();

        assert_eq!(first.log_id, "2024-05-01-v1");
        assert_eq!(second.version, 2);
        assert_eq!(other.version, 1);
        assert!(dir.path().join("2024-05-01/v2.json").exists());

        let latest = sink.latest("2024-05-01").await.unwrap().unwrap();
        assert_eq!(latest.raw_data.workflow_id, "wf_2024-05-01_abc123");
        assert!(sink.latest("2024-01-01").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stored_document_is_flat() {
        let dir = TempDir::new().unwrap();
        let sink = FileSink::new(dir.path());
        sink.store_analysis(&analysis("2024-05-01")).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join("2024-05-01/v1.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["date"], "2024-05-01");
        assert!(value["metrics"].is_object());
        assert!(value["rawData"]["workflowId"].is_string());
    }

    #[tokio::test]
    async fn test_in_memory_sink() {
        let sink = InMemorySink::new();
        let receipt = sink.store_analysis(&analysis("2024-05-01")).await.unwrap();
        assert_eq!(receipt.version, 1);
        assert_eq!(sink.stored().len(), 1);

        let failing = InMemorySink::failing("disk full");
        assert!(failing.store_analysis(&analysis("2024-05-01")).await.is_err());
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("v12.json"), Some(12));
        assert_eq!(parse_version(".v3.json.tmp"), None);
        assert_eq!(parse_version("notes.json"), None);
    }
}
