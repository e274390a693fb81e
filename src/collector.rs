//! Collection orchestrator.
//!
//! This module implements `Collector`, which walks every repository of the configured
//! organization one at a time. For each repository it:
//! 1. Fetches pull requests and narrows them to the window and the team.
//! 2. Fetches review comments, issue comments and commits for every surviving pull request.
//! 3. Fetches workflow runs; a failure here is logged and ignored.
//! 4. Accepts the repository if any pull request survived and paces before the next one.
//!
//! A failing repository is logged and skipped. Once every repository has been visited, a second
//! pass fetches additions and deletions for each collected commit.

use crate::config::AppConfig;
use crate::error::Result;
use crate::filter::{filter_prs_by_collaborators, filter_prs_by_date};
use crate::github::GitHubApi;
use crate::throttle::Throttle;
use crate::types::{
    parse_commit_url, Comment, CommitRecord, CommitStats, PullRequest, RepoId, Repository,
    WorkflowRun,
};
use std::fmt;

/// Progress of a single repository through the collection loop. The intermediate states record
/// how far an errored repository got.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepoState {
    Pending,
    PrsFetched,
    CommentsFetched,
    WorkflowFetched,
    /// At least one team pull request in the window.
    Accepted,
    /// No team pull request in the window. Workflow runs are still kept.
    Rejected,
    Errored,
}

impl fmt::Display for RepoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::PrsFetched => "prs-fetched",
            Self::CommentsFetched => "comments-fetched",
            Self::WorkflowFetched => "workflow-fetched",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Errored => "errored",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepoOutcome {
    pub repo: RepoId,
    pub state: RepoState,
    /// Last step completed before the error, for errored repositories.
    pub failed_after: Option<RepoState>,
}

/// Every record set gathered during one run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollectedData {
    /// Accepted repositories only.
    pub repos: Vec<Repository>,
    pub pull_requests: Vec<PullRequest>,
    pub comments: Vec<Comment>,
    pub commits: Vec<CommitRecord>,
    pub commit_stats: Vec<CommitStats>,
    /// Runs from every repository that finished without error, accepted or not.
    pub workflow_runs: Vec<WorkflowRun>,
    /// Final state of every visited repository. Not persisted.
    pub outcomes: Vec<RepoOutcome>,
}

impl CollectedData {
    pub fn outcome(&self, repo: &RepoId) -> Option<RepoState> {
        self.find_outcome(repo).map(|outcome| outcome.state)
    }

    pub fn find_outcome(&self, repo: &RepoId) -> Option<&RepoOutcome> {
        self.outcomes.iter().find(|outcome| &outcome.repo == repo)
    }
}

/// Records gathered for one repository, merged into [`CollectedData`] only once the
/// repository finished without error.
#[derive(Default)]
struct RepoRecords {
    pull_requests: Vec<PullRequest>,
    comments: Vec<Comment>,
    commits: Vec<CommitRecord>,
    workflow_runs: Vec<WorkflowRun>,
}

pub struct Collector<'a> {
    api: &'a dyn GitHubApi,
    throttle: &'a dyn Throttle,
    config: &'a AppConfig,
    commit_stats: bool,
}

impl<'a> Collector<'a> {
    pub fn new(api: &'a dyn GitHubApi, throttle: &'a dyn Throttle, config: &'a AppConfig) -> Self {
        Self {
            api,
            throttle,
            config,
            commit_stats: true,
        }
    }

    /// Skips the per-commit stats pass. Additions and deletions then report as unknown.
    pub fn without_commit_stats(mut self) -> Self {
        self.commit_stats = false;
        self
    }

    /// Runs the full collection. Only failing to list the organization's repositories is fatal.
    pub async fn collect(&self) -> Result<CollectedData> {
        tracing::info!(org = %self.config.github_org, "Fetching organization repositories");
        let repos = self.api.fetch_org_repos(&self.config.github_org).await?;
        tracing::info!(count = repos.len(), "Found repositories in the organization");

        let mut data = CollectedData::default();
        let total = repos.len();

        for (index, repo) in repos.iter().enumerate() {
            tracing::info!("[{}/{}] {}", index + 1, total, repo.full_name);

            let mut progress = RepoState::Pending;
            let (state, failed_after) = match self.collect_repo(repo, &mut progress).await {
                Ok(records) => (self.accept_or_reject(repo, records, &mut data).await, None),
                Err(e) => {
                    tracing::error!(
                        repo = %repo.full_name,
                        after = %progress,
                        error = %e,
                        "Error processing repository"
                    );
                    (RepoState::Errored, Some(progress))
                }
            };

            tracing::debug!(repo = %repo.full_name, %state, "Repository finished");
            data.outcomes.push(RepoOutcome {
                repo: repo.full_name.clone(),
                state,
                failed_after,
            });
        }

        if self.commit_stats {
            tracing::info!(
                commits = data.commits.len(),
                "Collecting commit statistics (this may take a while)"
            );
            data.commit_stats = self.collect_commit_stats(&data.commits).await;
        } else {
            tracing::info!("Skipping commit statistics");
        }

        Ok(data)
    }

    /// Gathers one repository's records, advancing `progress` as each step completes.
    async fn collect_repo(&self, repo: &Repository, progress: &mut RepoState) -> Result<RepoRecords> {
        let id = &repo.full_name;

        let prs = self.api.fetch_prs(id).await?;
        let prs = filter_prs_by_date(&prs, self.config.since_date);
        let prs = filter_prs_by_collaborators(&prs, &self.config.team_members);
        *progress = RepoState::PrsFetched;
        tracing::debug!(repo = %id, matching = prs.len(), "Pull requests fetched");

        let mut records = RepoRecords::default();
        for pr in &prs {
            records
                .comments
                .extend(self.api.fetch_comments(&pr.review_comments_url).await?);
            records
                .comments
                .extend(self.api.fetch_comments(&pr.comments_url).await?);
            records
                .commits
                .extend(self.api.fetch_commits(&pr.commits_url).await?);
        }
        records.pull_requests = prs;
        *progress = RepoState::CommentsFetched;
        tracing::debug!(
            repo = %id,
            comments = records.comments.len(),
            commits = records.commits.len(),
            "Comments and commits fetched"
        );

        // Listed for every repository: runs of since-deleted workflow files still count.
        match self.api.fetch_workflow_runs(id).await {
            Ok(runs) => records.workflow_runs = runs,
            Err(e) => tracing::warn!(repo = %id, error = %e, "Could not fetch workflow runs"),
        }
        *progress = RepoState::WorkflowFetched;
        tracing::debug!(repo = %id, runs = records.workflow_runs.len(), "Workflow runs fetched");

        Ok(records)
    }

    async fn accept_or_reject(
        &self,
        repo: &Repository,
        records: RepoRecords,
        data: &mut CollectedData,
    ) -> RepoState {
        data.workflow_runs.extend(records.workflow_runs);

        if records.pull_requests.is_empty() {
            return RepoState::Rejected;
        }

        tracing::info!(
            repo = %repo.full_name,
            prs = records.pull_requests.len(),
            "Repository has team contributions"
        );
        data.repos.push(repo.clone());
        data.pull_requests.extend(records.pull_requests);
        data.comments.extend(records.comments);
        data.commits.extend(records.commits);

        self.throttle.wait().await;
        RepoState::Accepted
    }

    /// Fetches stats for every commit. A commit whose URL cannot be parsed or whose details
    /// cannot be fetched is logged and left out.
    pub async fn collect_commit_stats(&self, commits: &[CommitRecord]) -> Vec<CommitStats> {
        let mut stats = Vec::with_capacity(commits.len());

        for commit in commits {
            let result = match parse_commit_url(&commit.url) {
                Ok((repo, sha)) => self.api.get_commit_details(&repo, &sha).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(commit_stats) => stats.push(commit_stats),
                Err(e) => {
                    tracing::warn!(sha = %commit.sha, error = %e, "Error collecting stats for commit")
                }
            }
        }

        stats
    }
}
