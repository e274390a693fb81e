use crate::collector::CollectedData;
use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::fmt;

const NOT_AVAILABLE: &str = "N/A";

/// Phrases that count a comment as an approval, matched case-insensitively.
const APPROVAL_PHRASES: [&str; 2] = ["lgtm", "looks good"];

/// Keys ranked by how often they occur, most frequent first.
///
/// Ties keep the order in which keys were first seen.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ranking(pub Vec<(String, usize)>);

impl Ranking {
    /// Counts `keys` and keeps the `limit` most frequent.
    pub fn top<I, K>(keys: I, limit: usize) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let mut counts: IndexMap<String, usize> = IndexMap::new();
        for key in keys {
            *counts.entry(key.into()).or_default() += 1;
        }

        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        // Stable sort keeps first-seen order among equal counts.
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(limit);
        Self(ranked)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<(&str, usize)> {
        self.0.first().map(|(key, count)| (key.as_str(), *count))
    }

    /// Renders entries as `key: count<suffix>` joined by commas, or `N/A` when empty.
    pub fn render(&self, suffix: &str) -> String {
        if self.0.is_empty() {
            return NOT_AVAILABLE.to_string();
        }
        self.0
            .iter()
            .map(|(key, count)| format!("{key}: {count}{suffix}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Ranking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(""))
    }
}

impl Serialize for Ranking {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// A line total that is only known when commit stats were collected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineCount {
    Unknown,
    Lines(u64),
}

impl LineCount {
    pub fn lines_or_zero(self) -> u64 {
        match self {
            Self::Unknown => 0,
            Self::Lines(lines) => lines,
        }
    }
}

impl fmt::Display for LineCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("?"),
            Self::Lines(lines) => f.write_str(&group_thousands(*lines)),
        }
    }
}

impl Serialize for LineCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unknown => serializer.serialize_none(),
            Self::Lines(lines) => serializer.serialize_u64(*lines),
        }
    }
}

/// Formats `1234567` as `1,234,567`.
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}

/// The "wrapped" summary of one collection run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WrappedMetrics {
    pub total_repos: usize,
    pub total_prs: usize,
    /// Names of repositories created after the since-date.
    pub new_repos: Vec<String>,
    /// Month name with the most pull requests opened, or `(None, 0)`.
    pub top_month: (Option<String>, usize),
    pub top_3_pr_dates: Ranking,
    pub top_5_pr_openers: Ranking,
    pub top_3_repos: Ranking,
    pub top_3_commenters: Ranking,
    pub total_comments: usize,
    pub lgtm_count: usize,
    pub total_commits: usize,
    pub total_additions: LineCount,
    pub total_deletions: LineCount,
    pub total_workflow_runs: usize,
    pub successful_workflow_runs: usize,
    pub failed_workflow_runs: usize,
}

impl WrappedMetrics {
    /// Flat metric-name to value mapping.
    pub fn to_map(&self) -> serde_json::Result<serde_json::Map<String, serde_json::Value>> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(serde::ser::Error::custom(format!(
                "metrics serialized to a non-object value: {other}"
            ))),
        }
    }
}

/// Aggregates collected records into the wrapped summary.
///
/// Empty inputs produce zero counts, `(None, 0)` and `N/A` rankings; line totals are
/// [`LineCount::Unknown`] when no commit stats were collected.
pub fn calculate_metrics(data: &CollectedData, since: DateTime<Utc>) -> WrappedMetrics {
    let prs = &data.pull_requests;

    let new_repos = data
        .repos
        .iter()
        .filter(|repo| repo.created_at > since)
        .map(|repo| repo.name.clone())
        .collect();

    let months = Ranking::top(prs.iter().map(|pr| month_name(pr.created_at)), 1);
    let top_month = match months.first() {
        Some((month, count)) => (Some(month.to_string()), count),
        None => (None, 0),
    };

    let top_3_pr_dates = Ranking::top(
        prs.iter()
            .map(|pr| pr.created_at.date_naive())
            .map(|date: NaiveDate| date.format("%Y-%m-%d").to_string()),
        3,
    );

    let top_3_commenters = Ranking::top(
        data.comments
            .iter()
            .filter_map(|comment| comment.author.clone()),
        3,
    );

    let lgtm_count = data
        .comments
        .iter()
        .filter(|comment| is_approval(&comment.body))
        .count();

    let (total_additions, total_deletions) = if data.commit_stats.is_empty() {
        (LineCount::Unknown, LineCount::Unknown)
    } else {
        (
            LineCount::Lines(data.commit_stats.iter().map(|s| s.additions).sum()),
            LineCount::Lines(data.commit_stats.iter().map(|s| s.deletions).sum()),
        )
    };

    WrappedMetrics {
        total_repos: data.repos.len(),
        total_prs: prs.len(),
        new_repos,
        top_month,
        top_3_pr_dates,
        top_5_pr_openers: Ranking::top(prs.iter().map(|pr| pr.author.clone()), 5),
        top_3_repos: Ranking::top(prs.iter().map(|pr| pr.repo.repo.clone()), 3),
        top_3_commenters,
        total_comments: data.comments.len(),
        lgtm_count,
        total_commits: data.commits.len(),
        total_additions,
        total_deletions,
        total_workflow_runs: data.workflow_runs.len(),
        successful_workflow_runs: data.workflow_runs.iter().filter(|r| r.succeeded()).count(),
        failed_workflow_runs: data.workflow_runs.iter().filter(|r| r.failed()).count(),
    }
}

fn month_name(created_at: DateTime<Utc>) -> String {
    created_at.format("%B").to_string()
}

fn is_approval(body: &str) -> bool {
    let body = body.to_lowercase();
    APPROVAL_PHRASES.iter().any(|phrase| body.contains(phrase))
}

/// The fixed-key document read by the web page.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WebStats {
    pub team_size: usize,
    pub repo_count: usize,
    pub total_prs: usize,
    pub top_contributor: String,
    pub top_contributor_prs: usize,
    pub total_additions: u64,
    pub total_deletions: u64,
    pub total_commits: usize,
    pub total_comments: usize,
    pub busiest_month: String,
    pub busiest_month_prs: usize,
    pub most_active_repo: String,
    pub most_active_repo_prs: usize,
    pub total_workflow_runs: usize,
    pub successful_workflow_runs: usize,
    pub failed_workflow_runs: usize,
}

impl WebStats {
    /// Unknown line totals become `0` because the page expects numbers.
    pub fn new(metrics: &WrappedMetrics, team_size: usize) -> Self {
        let (top_contributor, top_contributor_prs) = leader(&metrics.top_5_pr_openers);
        let (most_active_repo, most_active_repo_prs) = leader(&metrics.top_3_repos);
        let (busiest_month, busiest_month_prs) = match &metrics.top_month {
            (Some(month), count) => (month.clone(), *count),
            (None, _) => (NOT_AVAILABLE.to_string(), 0),
        };

        Self {
            team_size,
            repo_count: metrics.total_repos,
            total_prs: metrics.total_prs,
            top_contributor,
            top_contributor_prs,
            total_additions: metrics.total_additions.lines_or_zero(),
            total_deletions: metrics.total_deletions.lines_or_zero(),
            total_commits: metrics.total_commits,
            total_comments: metrics.total_comments,
            busiest_month,
            busiest_month_prs,
            most_active_repo,
            most_active_repo_prs,
            total_workflow_runs: metrics.total_workflow_runs,
            successful_workflow_runs: metrics.successful_workflow_runs,
            failed_workflow_runs: metrics.failed_workflow_runs,
        }
    }
}

fn leader(ranking: &Ranking) -> (String, usize) {
    match ranking.first() {
        Some((key, count)) => (key.to_string(), count),
        None => (NOT_AVAILABLE.to_string(), 0),
    }
}
