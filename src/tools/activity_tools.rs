//! Tools answered from already-fetched activity
//!
//! None of these touch the network: the model can only look closer at the
//! commits, pull requests and issues the engine already holds for the
//! repository being analyzed.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::trait_def::{Tool, ToolError};
use crate::activity::{CommitBatch, CommitRecord, IssueRecord, PullRequestRecord};

const MAX_MESSAGE_CHARS: usize = 4000;

/// What the tools of one batch call can see.
#[derive(Debug, Clone)]
pub struct ToolScope {
    pub repository: String,
    pub batch: CommitBatch,
    /// Every commit of the repository for the day, for `get_commit` lookups
    /// outside the current batch.
    pub commits: Vec<CommitRecord>,
    pub pull_requests: Vec<PullRequestRecord>,
    pub issues: Vec<IssueRecord>,
}

impl ToolScope {
    fn find_commit(&self, sha: &str) -> Option<&CommitRecord> {
        let sha = sha.trim();
        if sha.len() < 4 {
            return None;
        }
        self.commits.iter().find(|c| c.sha.starts_with(sha))
    }
}

fn commit_line(commit: &CommitRecord) -> Value {
    json!({
        "sha": commit.short_sha(),
        "headline": commit.headline(),
        "author": commit.author,
        "timestamp": commit.timestamp.to_rfc3339(),
    })
}

pub struct ListBatchCommitsTool {
    scope: Arc<ToolScope>,
}

impl ListBatchCommitsTool {
    pub fn new(scope: Arc<ToolScope>) -> Self {
        Self { scope }
    }
}

#[async_trait]
impl Tool for ListBatchCommitsTool {
    fn name(&self) -> &'static str {
        "list_batch_commits"
    }

    fn description(&self) -> &'static str {
        "List the commits in the batch under analysis (short sha, headline, author, time)"
    }

    fn schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _arguments: Value) -> Result<Value, ToolError> {
        let commits: Vec<Value> = self.scope.batch.commits.iter().map(commit_line).collect();
        Ok(json!({
            "repository": self.scope.repository,
            "batch": self.scope.batch.index + 1,
            "commits": commits,
        }))
    }
}

pub struct GetCommitTool {
    scope: Arc<ToolScope>,
}

impl GetCommitTool {
    pub fn new(scope: Arc<ToolScope>) -> Self {
        Self { scope }
    }
}

#[async_trait]
impl Tool for GetCommitTool {
    fn name(&self) -> &'static str {
        "get_commit"
    }

    fn description(&self) -> &'static str {
        "Get the full message and metadata of one commit by sha or sha prefix (at least 4 characters)"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "sha": { "type": "string", "description": "Commit sha or unique prefix" }
            },
            "required": ["sha"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        let sha = arguments
            .get("sha")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: self.name().to_string(),
                message: "missing string field 'sha'".to_string(),
            })?;

        let commit = self
            .scope
            .find_commit(sha)
            .ok_or_else(|| ToolError::NotFound(format!("No commit matching '{}'", sha)))?;

        let message: String = commit.message.chars().take(MAX_MESSAGE_CHARS).collect();
        Ok(json!({
            "sha": commit.sha,
            "message": message,
            "author": commit.author,
            "timestamp": commit.timestamp.to_rfc3339(),
            "url": commit.url,
        }))
    }
}

pub struct ListPullRequestsTool {
    scope: Arc<ToolScope>,
}

impl ListPullRequestsTool {
    pub fn new(scope: Arc<ToolScope>) -> Self {
        Self { scope }
    }
}

#[async_trait]
impl Tool for ListPullRequestsTool {
    fn name(&self) -> &'static str {
        "list_pull_requests"
    }

    fn description(&self) -> &'static str {
        "List pull requests opened, updated or merged in this repository today"
    }

    fn schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _arguments: Value) -> Result<Value, ToolError> {
        let prs: Vec<Value> = self
            .scope
            .pull_requests
            .iter()
            .map(|pr| {
                json!({
                    "number": pr.number,
                    "title": pr.title,
                    "state": pr.state,
                    "merged": pr.merged,
                    "author": pr.author,
                })
            })
            .collect();
        Ok(json!({ "pullRequests": prs }))
    }
}

pub struct ListIssuesTool {
    scope: Arc<ToolScope>,
}

impl ListIssuesTool {
    pub fn new(scope: Arc<ToolScope>) -> Self {
        Self { scope }
    }
}

#[async_trait]
impl Tool for ListIssuesTool {
    fn name(&self) -> &'static str {
        "list_issues"
    }

    fn description(&self) -> &'static str {
        "List issues opened, updated or closed in this repository today"
    }

    fn schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _arguments: Value) -> Result<Value, ToolError> {
        let issues: Vec<Value> = self
            .scope
            .issues
            .iter()
            .map(|issue| {
                json!({
                    "number": issue.number,
                    "title": issue.title,
                    "state": issue.state,
                    "author": issue.author,
                })
            })
            .collect();
        Ok(json!({ "issues": issues }))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::{TimeZone, Utc};

    pub fn scope() -> Arc<ToolScope> {
        let commits: Vec<CommitRecord> = (0..3)
            .map(|i| CommitRecord {
                sha: format!("abcd{}000000000000000000000000000000000", i),
                message: format!("feat: step {}\n\nDetails for step {}", i, i),
                repository: "api".to_string(),
                timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 9 + i, 0, 0).unwrap(),
                author: "dev".to_string(),
                url: format!("https://example.test/api/commit/{}", i),
            })
            .collect();

        Arc::new(ToolScope {
            repository: "api".to_string(),
            batch: CommitBatch {
                repository: "api".to_string(),
                index: 0,
                commits: commits[..2].to_vec(),
            },
            commits,
            pull_requests: vec![PullRequestRecord {
                number: 12,
                title: "Single-flight cache".to_string(),
                repository: "api".to_string(),
                state: "merged".to_string(),
                author: "dev".to_string(),
                url: String::new(),
                merged: true,
            }],
            issues: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::scope;
    use super::*;

    #[tokio::test]
    async fn test_list_batch_commits_only_lists_batch() {
        let tool = ListBatchCommitsTool::new(scope());
        let result = tool.execute(json!({})).await.unwrap();
        assert_eq!(result["commits"].as_array().unwrap().len(), 2);
        assert_eq!(result["commits"][0]["headline"], "feat: step 0");
        assert_eq!(result["batch"], 1);
    }

    #[tokio::test]
    async fn test_get_commit_by_prefix() {
        let tool = GetCommitTool::new(scope());
        let result = tool.execute(json!({"sha": "abcd2"})).await.unwrap();
        assert!(result["message"].as_str().unwrap().contains("Details for step 2"));
    }

    #[tokio::test]
    async fn test_get_commit_errors() {
        let tool = GetCommitTool::new(scope());
        assert!(matches!(
            tool.execute(json!({})).await,
            Err(ToolError::InvalidArguments { .. })
        ));
        assert!(matches!(
            tool.execute(json!({"sha": "ffff"})).await,
            Err(ToolError::NotFound(_))
        ));
        assert!(matches!(
            tool.execute(json!({"sha": "ab"})).await,
            Err(ToolError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_pull_requests_and_issues() {
        let prs = ListPullRequestsTool::new(scope()).execute(json!({})).await.unwrap();
        assert_eq!(prs["pullRequests"][0]["number"], 12);

        let issues = ListIssuesTool::new(scope()).execute(json!({})).await.unwrap();
        assert!(issues["issues"].as_array().unwrap().is_empty());
    }
}
