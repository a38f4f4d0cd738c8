use super::types::CommitRecord;

pub const DEFAULT_BATCH_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    pub batch_size: usize,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl BatchPolicy {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

/// Ordered, size-bounded slice of one repository's commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitBatch {
    pub repository: String,
    /// Zero-based position of this batch.
    pub index: usize,
    pub commits: Vec<CommitRecord>,
}

impl CommitBatch {
    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }
}

/// Chunk `commits` into `ceil(N / batch_size)` batches without reordering.
///
/// A `batch_size` of zero is treated as one.
pub fn split_into_batches(
    repository: &str,
    commits: &[CommitRecord],
    batch_size: usize,
) -> Vec<CommitBatch> {
    commits
        .chunks(batch_size.max(1))
        .enumerate()
        .map(|(index, chunk)| CommitBatch {
            repository: repository.to_string(),
            index,
            commits: chunk.to_vec(),
        })
        .collect()
}
