//! Activity source collaborators
//!
//! The engine only sees `dyn ActivitySource`. Deployments either drop one JSON
//! document per day into `{data_dir}/activity/` or point devpulse at an HTTP
//! endpoint that answers `GET {url}?date=YYYY-MM-DD`.

use super::types::DailyActivity;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ActivityError {
    #[error("No activity recorded for {date}")]
    NotFound { date: NaiveDate },

    #[error("Failed to read activity file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed activity document: {0}")]
    Malformed(String),

    #[error("Activity endpoint returned {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Activity request failed: {0}")]
    Network(String),

    #[error("Activity source unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// All commits, pull requests and issues for `date`.
    async fn fetch_daily_activity(&self, date: NaiveDate) -> Result<DailyActivity, ActivityError>;

    fn name(&self) -> &str;
}

/// Reads `{dir}/{date}.json`.
pub struct JsonFileActivitySource {
    dir: PathBuf,
}

impl JsonFileActivitySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.json", date.format("%Y-%m-%d")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ActivitySource for JsonFileActivitySource {
    async fn fetch_daily_activity(&self, date: NaiveDate) -> Result<DailyActivity, ActivityError> {
        let path = self.path_for(date);
        debug!(path = %path.display(), "Reading activity file");

        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ActivityError::NotFound { date })
            }
            Err(source) => return Err(ActivityError::Io { path, source }),
        };

        let activity: DailyActivity =
            serde_json::from_str(&raw).map_err(|e| ActivityError::Malformed(e.to_string()))?;
        Ok(activity.normalized())
    }

    fn name(&self) -> &str {
        "json-file"
    }
}

/// Fetches activity from an HTTP endpoint.
pub struct HttpActivitySource {
    client: reqwest::Client,
    url: String,
}

impl HttpActivitySource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ActivityError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("devpulse/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ActivityError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ActivitySource for HttpActivitySource {
    async fn fetch_daily_activity(&self, date: NaiveDate) -> Result<DailyActivity, ActivityError> {
        let date_param = date.format("%Y-%m-%d").to_string();
        debug!(url = %self.url, date = %date_param, "Fetching activity");

        let response = self
            .client
            .get(&self.url)
            .query(&[("date", date_param.as_str())])
            .send()
            .await
            .map_err(|e| ActivityError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ActivityError::NotFound { date });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ActivityError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let activity: DailyActivity = response
            .json()
            .await
            .map_err(|e| ActivityError::Malformed(e.to_string()))?;
        Ok(activity.normalized())
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Fixed activity keyed by date. Unknown dates yield an empty day.
#[derive(Default)]
pub struct InMemoryActivitySource {
    days: RwLock<HashMap<NaiveDate, DailyActivity>>,
    failure: Option<String>,
}

impl InMemoryActivitySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_day(self, date: NaiveDate, activity: DailyActivity) -> Self {
        if let Ok(mut days) = self.days.write() {
            days.insert(date, activity.normalized());
        }
        self
    }

    /// Every fetch fails with `ActivityError::Unavailable(message)`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            days: RwLock::new(HashMap::new()),
            failure: Some(message.into()),
        }
    }
}

#[async_trait]
impl ActivitySource for InMemoryActivitySource {
    async fn fetch_daily_activity(&self, date: NaiveDate) -> Result<DailyActivity, ActivityError> {
        if let Some(message) = &self.failure {
            return Err(ActivityError::Unavailable(message.clone()));
        }
        let days = self
            .days
            .read()
            .map_err(|_| ActivityError::Unavailable("activity store poisoned".to_string()))?;
        Ok(days.get(&date).cloned().unwrap_or_default())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[tokio::test]
    async fn test_json_file_source_reads_day() {
        let dir = TempDir::new().unwrap();
        let source = JsonFileActivitySource::new(dir.path());
        std::fs::write(
            source.path_for(date()),
            r#"{
                "commits": [{
                    "sha": "abc1234",
                    "message": "fix: handle empty batches",
                    "repository": "api",
                    "timestamp": "2024-05-01T10:00:00Z",
                    "author": "dev"
                }],
                "pullRequests": [{"number": 3, "title": "Batching", "repository": "api"}]
            }"#,
        )
        .unwrap();

        let day = source.fetch_daily_activity(date()).await.unwrap();
        assert_eq!(day.commits.len(), 1);
        assert_eq!(day.pull_requests.len(), 1);
        assert_eq!(day.total_commits, 1);
        assert_eq!(day.total_repos, 1);
    }

    #[tokio::test]
    async fn test_json_file_source_missing_day() {
        let dir = TempDir::new().unwrap();
        let source = JsonFileActivitySource::new(dir.path());
        let err = source.fetch_daily_activity(date()).await.unwrap_err();
        assert!(matches!(err, ActivityError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_json_file_source_malformed() {
        let dir = TempDir::new().unwrap();
        let source = JsonFileActivitySource::new(dir.path());
        std::fs::write(source.path_for(date()), "{ not json").unwrap();
        let err = source.fetch_daily_activity(date()).await.unwrap_err();
        assert!(matches!(err, ActivityError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_in_memory_source() {
        let source = InMemoryActivitySource::new().with_day(date(), DailyActivity::empty());
        let day = source.fetch_daily_activity(date()).await.unwrap();
        assert!(day.is_empty());

        let failing = InMemoryActivitySource::failing("down");
        assert!(failing.fetch_daily_activity(date()).await.is_err());
    }

    #[test]
    fn test_http_source_builds() {
        let source = HttpActivitySource::new("http://localhost:9/activity", Duration::from_secs(1));
        assert!(source.is_ok());
    }
}
