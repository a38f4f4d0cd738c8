use crate::report::{ActivityStats, RepositoryCount};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single commit as delivered by the activity source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub sha: String,
    pub message: String,
    pub repository: String,
    pub timestamp: DateTime<Utc>,
    pub author: String,
    #[serde(default)]
    pub url: String,
}

impl CommitRecord {
    /// First line of the commit message.
    pub fn headline(&self) -> &str {
        self.message.lines().next().unwrap_or("").trim()
    }

    pub fn short_sha(&self) -> &str {
        let end = self.sha.len().min(7);
        self.sha.get(..end).unwrap_or(&self.sha)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestRecord {
    pub number: u64,
    pub title: String,
    pub repository: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub merged: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRecord {
    pub number: u64,
    pub title: String,
    pub repository: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub url: String,
}

/// Repository metadata. Sources may send either a bare name or an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RepositoryRepr")]
pub struct RepositoryInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl RepositoryInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            language: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RepositoryRepr {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        language: Option<String>,
    },
}

impl From<RepositoryRepr> for RepositoryInfo {
    fn from(repr: RepositoryRepr) -> Self {
        match repr {
            RepositoryRepr::Name(name) => RepositoryInfo::named(name),
            RepositoryRepr::Full { name, language } => RepositoryInfo { name, language },
        }
    }
}

/// Everything the activity source knows about one day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyActivity {
    #[serde(default)]
    pub commits: Vec<CommitRecord>,
    #[serde(default)]
    pub pull_requests: Vec<PullRequestRecord>,
    #[serde(default)]
    pub issues: Vec<IssueRecord>,
    #[serde(default)]
    pub total_commits: usize,
    #[serde(default)]
    pub total_repos: usize,
    #[serde(default)]
    pub repositories: Vec<RepositoryInfo>,
}

impl DailyActivity {
    /// Build a day from raw records, deriving totals and the repository list.
    pub fn new(
        commits: Vec<CommitRecord>,
        pull_requests: Vec<PullRequestRecord>,
        issues: Vec<IssueRecord>,
    ) -> Self {
        Self {
            commits,
            pull_requests,
            issues,
            ..Default::default()
        }
        .normalized()
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_repositories(mut self, repositories: Vec<RepositoryInfo>) -> Self {
        self.repositories = repositories;
        self.normalized()
    }

    /// Reconcile totals with the records actually present.
    ///
    /// Sources are allowed to omit `totalCommits`/`totalRepos`/`repositories`;
    /// the counts never drop below what the commit list proves.
    pub fn normalized(mut self) -> Self {
        for commit in &self.commits {
            if !self.repositories.iter().any(|r| r.name == commit.repository) {
                self.repositories.push(RepositoryInfo::named(&commit.repository));
            }
        }
        self.total_commits = self.total_commits.max(self.commits.len());
        self.total_repos = self.total_repos.max(self.repositories.len());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    pub fn pull_requests_for<'a>(
        &'a self,
        repository: &'a str,
    ) -> impl Iterator<Item = &'a PullRequestRecord> + 'a {
        self.pull_requests
            .iter()
            .filter(move |pr| pr.repository == repository)
    }

    pub fn issues_for<'a>(&'a self, repository: &'a str) -> impl Iterator<Item = &'a IssueRecord> + 'a {
        self.issues.iter().filter(move |i| i.repository == repository)
    }

    /// Day-level counts; per-repository commit counts follow first-seen order.
    pub fn stats(&self) -> ActivityStats {
        let commits_by_repository = super::group_by_repository(&self.commits)
            .into_iter()
            .map(|group| RepositoryCount {
                repository: group.repository,
                commits: group.commits.len(),
            })
            .collect();

        ActivityStats {
            total_commits: self.total_commits,
            total_repos: self.total_repos,
            pull_requests: self.pull_requests.len(),
            issues: self.issues.len(),
            commits_by_repository,
        }
    }

    /// Distinct languages from repository metadata, in first-seen order.
    pub fn primary_languages(&self) -> Vec<String> {
        let mut languages: Vec<String> = Vec::new();
        for language in self.repositories.iter().filter_map(|r| r.language.as_deref()) {
            let language = language.trim();
            if !language.is_empty() && !languages.iter().any(|l| l == language) {
                languages.push(language.to_string());
            }
        }
        languages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn commit(sha: &str, repo: &str) -> CommitRecord {
        CommitRecord {
            sha: sha.to_string(),
            message: format!("change {}\n\nbody", sha),
            repository: repo.to_string(),
            timestamp: Utc::now(),
            author: "dev".to_string(),
            url: String::new(),
        }
    }

    #[test]
    fn test_headline_and_short_sha() {
        let c = commit("0123456789abcdef", "api");
        assert_eq!(c.headline(), "change 0123456789abcdef");
        assert_eq!(c.short_sha(), "0123456");

        let short = commit("ab", "api");
        assert_eq!(short.short_sha(), "ab");
    }

    #[test]
    fn test_new_derives_totals() {
        let day = DailyActivity::new(
            vec![commit("a", "api"), commit("b", "web"), commit("c", "api")],
            vec![],
            vec![],
        );
        assert_eq!(day.total_commits, 3);
        assert_eq!(day.total_repos, 2);
        assert_eq!(day.repositories[0].name, "api");
        assert_eq!(day.repositories[1].name, "web");
    }

    #[test]
    fn test_stats() {
        let day = DailyActivity::new(
            vec![commit("a", "web"), commit("b", "api"), commit("c", "web")],
            vec![],
            vec![],
        );
        let stats = day.stats();
        assert_eq!(stats.total_commits, 3);
        assert_eq!(stats.total_repos, 2);
        assert_eq!(stats.commits_by_repository[0].repository, "web");
        assert_eq!(stats.commits_by_repository[0].commits, 2);
    }

    #[test]
    fn test_deserialize_mixed_repository_shapes() {
        let raw = json!({
            "commits": [],
            "repositories": ["api", {"name": "web", "language": "TypeScript"}]
        });
        let day: DailyActivity = serde_json::from_value(raw).unwrap();
        let day = day.normalized();

        assert_eq!(day.total_commits, 0);
        assert_eq!(day.total_repos, 2);
        assert_eq!(day.primary_languages(), vec!["TypeScript".to_string()]);
    }

    #[test]
    fn test_primary_languages_deduplicates() {
        let day = DailyActivity::empty().with_repositories(vec![
            RepositoryInfo::named("a").with_language("Rust"),
            RepositoryInfo::named("b").with_language("Rust"),
            RepositoryInfo::named("c").with_language("Go"),
            RepositoryInfo::named("d"),
        ]);
        assert_eq!(day.primary_languages(), vec!["Rust", "Go"]);
    }

    #[test]
    fn test_scoped_pull_requests_and_issues() {
        let mut day = DailyActivity::empty();
        day.pull_requests.push(PullRequestRecord {
            number: 1,
            title: "Add cache".to_string(),
            repository: "api".to_string(),
            state: "open".to_string(),
            author: "dev".to_string(),
            url: String::new(),
            merged: false,
        });
        day.issues.push(IssueRecord {
            number: 7,
            title: "Crash on empty day".to_string(),
            repository: "web".to_string(),
            state: "closed".to_string(),
            author: "dev".to_string(),
            url: String::new(),
        });

        assert_eq!(day.pull_requests_for("api").count(), 1);
        assert_eq!(day.pull_requests_for("web").count(), 0);
        assert_eq!(day.issues_for("web").count(), 1);
    }
}
