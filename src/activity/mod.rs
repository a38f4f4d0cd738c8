//! Daily developer activity: records, grouping, batching and sources.

mod batch;
mod grouper;
mod source;
mod types;

pub use batch::{split_into_batches, BatchPolicy, CommitBatch, DEFAULT_BATCH_SIZE};
pub use grouper::{group_by_repository, RepositoryCommits};
pub use source::{
    ActivityError, ActivitySource, HttpActivitySource, InMemoryActivitySource,
    JsonFileActivitySource,
};
pub use types::{CommitRecord, DailyActivity, IssueRecord, PullRequestRecord, RepositoryInfo};
