use super::types::CommitRecord;
use std::collections::HashMap;

/// Commits of one repository, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryCommits {
    pub repository: String,
    pub commits: Vec<CommitRecord>,
}

/// Partition commits by repository.
///
/// Repositories appear in the order their first commit was seen; commits keep
/// their arrival order inside each group.
pub fn group_by_repository(commits: &[CommitRecord]) -> Vec<RepositoryCommits> {
    let mut groups: Vec<RepositoryCommits> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for commit in commits {
        let slot = *index.entry(commit.repository.as_str()).or_insert_with(|| {
            groups.push(RepositoryCommits {
                repository: commit.repository.clone(),
                commits: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].commits.push(commit.clone());
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn commit(sha: &str, repo: &str) -> CommitRecord {
        CommitRecord {
            sha: sha.to_string(),
            message: sha.to_string(),
            repository: repo.to_string(),
            timestamp: Utc::now(),
            author: "dev".to_string(),
            url: String::new(),
        }
    }

    #[test]
    fn test_first_seen_order() {
        let commits = vec![
            commit("1", "web"),
            commit("2", "api"),
            commit("3", "web"),
            commit("4", "cli"),
            commit("5", "api"),
        ];

        let groups = group_by_repository(&commits);
        let names: Vec<_> = groups.iter().map(|g| g.repository.as_str()).collect();
        assert_eq!(names, vec!["web", "api", "cli"]);

        let web: Vec<_> = groups[0].commits.iter().map(|c| c.sha.as_str()).collect();
        assert_eq!(web, vec!["1", "3"]);
        let api: Vec<_> = groups[1].commits.iter().map(|c| c.sha.as_str()).collect();
        assert_eq!(api, vec!["2", "5"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(group_by_repository(&[]).is_empty());
    }

    #[test]
    fn test_no_commit_lost() {
        let commits: Vec<_> = (0..23)
            .map(|i| commit(&i.to_string(), ["a", "b", "c"][i % 3]))
            .collect();
        let total: usize = group_by_repository(&commits)
            .iter()
            .map(|g| g.commits.len())
            .sum();
        assert_eq!(total, 23);
    }
}
