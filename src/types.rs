//! Flat activity records produced by the collectors.
//!
//! Every record names its owning repository through a [`RepoId`], which is derived from the
//! record's API resource URL when the record is collected. Records serialize to flat JSON
//! objects so that a record set can be stored one row per line.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A unique identifier for a GitHub repository.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoId {
    /// The owner of the repository (e.g., "rust-lang").
    pub owner: String,
    /// The name of the repository (e.g., "cargo").
    pub repo: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Extracts the repository from an API resource URL.
    ///
    /// Expected shape: `<scheme>://<host>[/<prefix>]/repos/<owner>/<repo>[/...]`. Both
    /// `https://api.github.com/repos/acme/widgets/pulls/7` and an Enterprise URL with an
    /// `/api/v3` prefix are accepted.
    pub fn from_api_url(url: &str) -> Result<Self> {
        let segments = path_segments(url)?;
        let start = segments
            .iter()
            .position(|segment| segment == "repos")
            .ok_or_else(|| malformed(url, "no 'repos' segment"))?;

        match (segments.get(start + 1), segments.get(start + 2)) {
            (Some(owner), Some(repo)) if !owner.is_empty() && !repo.is_empty() => {
                Ok(Self::new(owner.as_str(), repo.as_str()))
            }
            _ => Err(malformed(url, "missing owner or repository after 'repos'")),
        }
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl FromStr for RepoId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().split_once('/') {
            Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
                Ok(Self::new(owner, repo))
            }
            _ => Err(Error::InvalidRepoId(s.to_string())),
        }
    }
}

impl TryFrom<String> for RepoId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RepoId> for String {
    fn from(value: RepoId) -> Self {
        value.to_string()
    }
}

/// Extracts `(repository, sha)` from a commit resource URL such as
/// `https://api.github.com/repos/acme/widgets/commits/3f2a...` or the
/// `.../git/commits/<sha>` form.
pub fn parse_commit_url(url: &str) -> Result<(RepoId, String)> {
    let repo = RepoId::from_api_url(url)?;
    let segments = path_segments(url)?;
    let sha = segments
        .iter()
        .rposition(|segment| segment == "commits")
        .and_then(|i| segments.get(i + 1))
        .filter(|sha| !sha.is_empty())
        .ok_or_else(|| malformed(url, "no commit SHA after 'commits'"))?;

    Ok((repo, sha.clone()))
}

fn path_segments(url: &str) -> Result<Vec<String>> {
    let uri: http::Uri = url
        .parse()
        .map_err(|_| malformed(url, "not a valid URI"))?;

    Ok(uri
        .path()
        .trim_matches('/')
        .split('/')
        .map(str::to_owned)
        .collect())
}

fn malformed(url: &str, reason: &'static str) -> Error {
    Error::MalformedUrl {
        url: url.to_string(),
        reason,
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    /// Organization-qualified name.
    pub full_name: RepoId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    pub id: u64,
    pub number: u64,
    pub repo: RepoId,
    pub author: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub comments_url: String,
    pub review_comments_url: String,
    pub commits_url: String,
}

/// A review or discussion comment left on a pull request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub repo: RepoId,
    /// `None` for comments whose author account no longer exists.
    pub author: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub sha: String,
    pub repo: RepoId,
    pub url: String,
    pub author: Option<String>,
    pub committer: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommitStats {
    pub sha: String,
    pub repo: RepoId,
    pub additions: u64,
    pub deletions: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    pub repo: RepoId,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub status: Option<String>,
    /// `success`, `failure`, `cancelled`, ... or `None` while the run is in progress.
    pub conclusion: Option<String>,
}

impl WorkflowRun {
    pub fn succeeded(&self) -> bool {
        self.conclusion.as_deref() == Some("success")
    }

    pub fn failed(&self) -> bool {
        self.conclusion.as_deref() == Some("failure")
    }
}

/// A workflow definition (`.github/workflows/*.yml`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: u64,
    pub repo: RepoId,
    pub name: String,
    pub path: String,
    pub state: String,
}
