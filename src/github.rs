//! GitHub REST access: a paginated fetcher and the typed collectors built on it.
//!
//! Responses are decoded into `Raw*` wire types that carry only the fields this crate reads.
//! Required fields are not optional, so a response missing one fails at this boundary instead
//! of surfacing later as a half-filled record. The wire types are then converted into the
//! flat records from [`crate::types`].

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::types::{
    parse_commit_url, Comment, CommitRecord, CommitStats, PullRequest, RepoId, Repository,
    Workflow, WorkflowRun,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::header::HeaderName;
use octocrab::{Octocrab, Page};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Read access to the resources the collector needs.
///
/// Every method issues one or more GET requests and fails on the first transport or HTTP
/// error. Nothing is retried.
#[async_trait]
pub trait GitHubApi: Send + Sync {
    /// All repositories of an organization.
    async fn fetch_org_repos(&self, org: &str) -> Result<Vec<Repository>>;

    /// Pull requests of a repository, newest first. Pagination stops at the first page that
    /// ends before the since-date, so the result may still contain older entries.
    async fn fetch_prs(&self, repo: &RepoId) -> Result<Vec<PullRequest>>;

    /// Review or issue comments behind a pre-built comments URL.
    async fn fetch_comments(&self, url: &str) -> Result<Vec<Comment>>;

    /// Commits behind a pull request's `commits_url`.
    async fn fetch_commits(&self, url: &str) -> Result<Vec<CommitRecord>>;

    /// Additions and deletions of a single commit.
    async fn get_commit_details(&self, repo: &RepoId, sha: &str) -> Result<CommitStats>;

    async fn fetch_workflows(&self, repo: &RepoId) -> Result<Vec<Workflow>>;

    /// Workflow runs created on or after the since-date.
    async fn fetch_workflow_runs(&self, repo: &RepoId) -> Result<Vec<WorkflowRun>>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Serialize)]
struct PullListParams {
    state: &'static str,
    sort: &'static str,
    direction: SortDirection,
    per_page: u8,
}

impl PullListParams {
    fn newest_first(per_page: u8) -> Self {
        Self {
            state: "all",
            sort: "created",
            direction: SortDirection::Desc,
            per_page,
        }
    }

    /// A page whose last entry predates the window can only end pagination when pages are
    /// ordered by creation time, newest first.
    fn allows_early_stop(&self) -> bool {
        self.sort == "created" && self.direction == SortDirection::Desc
    }
}

#[derive(Debug, Serialize)]
struct ListParams<'a> {
    per_page: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    since: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct RunListParams {
    per_page: u8,
    created: String,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawRepository {
    full_name: String,
    name: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct RawPullRequest {
    id: u64,
    number: u64,
    url: String,
    user: RawUser,
    #[serde(default)]
    title: Option<String>,
    created_at: DateTime<Utc>,
    comments_url: String,
    review_comments_url: String,
    commits_url: String,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    id: u64,
    url: String,
    user: Option<RawUser>,
    #[serde(default)]
    body: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct RawCommit {
    sha: String,
    url: String,
    author: Option<RawUser>,
    committer: Option<RawUser>,
}

#[derive(Debug, Deserialize)]
struct RawCommitDetail {
    sha: String,
    url: String,
    stats: RawCommitStats,
}

#[derive(Debug, Deserialize)]
struct RawCommitStats {
    additions: u64,
    deletions: u64,
}

#[derive(Debug, Deserialize)]
struct RawWorkflowRun {
    id: u64,
    url: String,
    name: Option<String>,
    status: Option<String>,
    conclusion: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct RawWorkflow {
    id: u64,
    url: String,
    name: String,
    path: String,
    state: String,
}

impl TryFrom<RawRepository> for Repository {
    type Error = Error;

    fn try_from(raw: RawRepository) -> Result<Self> {
        Ok(Self {
            full_name: raw.full_name.parse()?,
            name: raw.name,
            created_at: raw.created_at,
        })
    }
}

impl TryFrom<RawPullRequest> for PullRequest {
    type Error = Error;

    fn try_from(raw: RawPullRequest) -> Result<Self> {
        Ok(Self {
            id: raw.id,
            number: raw.number,
            repo: RepoId::from_api_url(&raw.url)?,
            author: raw.user.login,
            title: raw.title.unwrap_or_default(),
            created_at: raw.created_at,
            comments_url: raw.comments_url,
            review_comments_url: raw.review_comments_url,
            commits_url: raw.commits_url,
        })
    }
}

impl TryFrom<RawComment> for Comment {
    type Error = Error;

    fn try_from(raw: RawComment) -> Result<Self> {
        Ok(Self {
            id: raw.id,
            repo: RepoId::from_api_url(&raw.url)?,
            author: raw.user.map(|user| user.login),
            body: raw.body.unwrap_or_default(),
            created_at: raw.created_at,
        })
    }
}

impl TryFrom<RawCommit> for CommitRecord {
    type Error = Error;

    fn try_from(raw: RawCommit) -> Result<Self> {
        Ok(Self {
            repo: RepoId::from_api_url(&raw.url)?,
            sha: raw.sha,
            url: raw.url,
            author: raw.author.map(|user| user.login),
            committer: raw.committer.map(|user| user.login),
        })
    }
}

impl TryFrom<RawCommitDetail> for CommitStats {
    type Error = Error;

    fn try_from(raw: RawCommitDetail) -> Result<Self> {
        let (repo, _) = parse_commit_url(&raw.url)?;
        Ok(Self {
            sha: raw.sha,
            repo,
            additions: raw.stats.additions,
            deletions: raw.stats.deletions,
        })
    }
}

impl TryFrom<RawWorkflowRun> for WorkflowRun {
    type Error = Error;

    fn try_from(raw: RawWorkflowRun) -> Result<Self> {
        Ok(Self {
            id: raw.id,
            repo: RepoId::from_api_url(&raw.url)?,
            name: raw.name,
            created_at: raw.created_at,
            status: raw.status,
            conclusion: raw.conclusion,
        })
    }
}

impl TryFrom<RawWorkflow> for Workflow {
    type Error = Error;

    fn try_from(raw: RawWorkflow) -> Result<Self> {
        Ok(Self {
            id: raw.id,
            repo: RepoId::from_api_url(&raw.url)?,
            name: raw.name,
            path: raw.path,
            state: raw.state,
        })
    }
}

fn convert_all<R, T>(raw: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = Error>,
{
    raw.into_iter().map(T::try_from).collect()
}

/// Octocrab-backed implementation of [`GitHubApi`].
#[derive(Clone)]
pub struct GitHubClient {
    octocrab: Octocrab,
    per_page: u8,
    since: DateTime<Utc>,
    since_param: String,
}

impl GitHubClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let mut builder = Octocrab::builder()
            .personal_token(config.github_token.clone())
            .add_header(
                HeaderName::from_static("x-github-api-version"),
                config.github_api_version.clone(),
            );
        if let Some(base_uri) = &config.github_api_url {
            builder = builder.base_uri(base_uri.as_str())?;
        }

        Ok(Self {
            octocrab: builder.build()?,
            per_page: config.per_page,
            since: config.since_date,
            since_param: config.since_param(),
        })
    }

    /// Requests `route` and follows `next` links until none is left, concatenating the items
    /// of every page in order.
    ///
    /// `stop` sees each page's items after they are fetched; returning `true` ends pagination
    /// with that page included.
    async fn paginate<T, P>(
        &self,
        route: &str,
        params: &P,
        mut stop: impl FnMut(&[T]) -> bool,
    ) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        let mut page: Page<T> = self.octocrab.get(route, Some(params)).await?;
        let mut items = Vec::new();
        let mut page_count = 1;

        loop {
            let next = page.next.take();
            let halt = stop(&page.items);
            tracing::debug!(route, page = page_count, items = page.items.len(), "Fetched page");
            items.append(&mut page.items);

            if halt {
                tracing::debug!(route, "Stopping pagination early");
                break;
            }

            match self.octocrab.get_page::<T>(&next).await? {
                Some(next_page) => {
                    page = next_page;
                    page_count += 1;
                }
                None => break,
            }
        }

        Ok(items)
    }

    async fn paginate_all<T, P>(&self, route: &str, params: &P) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        self.paginate(route, params, |_| false).await
    }

    fn list_params(&self, since: bool) -> ListParams<'_> {
        ListParams {
            per_page: self.per_page,
            since: since.then_some(self.since_param.as_str()),
        }
    }
}

#[async_trait]
impl GitHubApi for GitHubClient {
    async fn fetch_org_repos(&self, org: &str) -> Result<Vec<Repository>> {
        let raw: Vec<RawRepository> = self
            .paginate_all(&format!("/orgs/{org}/repos"), &self.list_params(false))
            .await?;
        convert_all(raw)
    }

    async fn fetch_prs(&self, repo: &RepoId) -> Result<Vec<PullRequest>> {
        let params = PullListParams::newest_first(self.per_page);
        let early_stop = params.allows_early_stop();
        let since = self.since;

        let raw: Vec<RawPullRequest> = self
            .paginate(&format!("/repos/{repo}/pulls"), &params, |page: &[RawPullRequest]| {
                early_stop && page.last().is_some_and(|pr| pr.created_at < since)
            })
            .await?;
        convert_all(raw)
    }

    async fn fetch_comments(&self, url: &str) -> Result<Vec<Comment>> {
        let raw: Vec<RawComment> = self.paginate_all(url, &self.list_params(true)).await?;
        convert_all(raw)
    }

    async fn fetch_commits(&self, url: &str) -> Result<Vec<CommitRecord>> {
        let raw: Vec<RawCommit> = self.paginate_all(url, &self.list_params(false)).await?;
        convert_all(raw)
    }

    async fn get_commit_details(&self, repo: &RepoId, sha: &str) -> Result<CommitStats> {
        let raw: RawCommitDetail = self
            .octocrab
            .get(format!("/repos/{repo}/commits/{sha}"), None::<&()>)
            .await?;
        CommitStats::try_from(raw)
    }

    async fn fetch_workflows(&self, repo: &RepoId) -> Result<Vec<Workflow>> {
        let raw: Vec<RawWorkflow> = self
            .paginate_all(
                &format!("/repos/{repo}/actions/workflows"),
                &self.list_params(false),
            )
            .await?;
        convert_all(raw)
    }

    async fn fetch_workflow_runs(&self, repo: &RepoId) -> Result<Vec<WorkflowRun>> {
        let params = RunListParams {
            per_page: self.per_page,
            created: format!(">={}", self.since.format("%Y-%m-%d")),
        };
        let raw: Vec<RawWorkflowRun> = self
            .paginate_all(&format!("/repos/{repo}/actions/runs"), &params)
            .await?;
        convert_all(raw)
    }
}
