//! Pure narrowing functions over collected pull requests.
//!
//! Both filters return a new list in the original order and look at disjoint fields, so they
//! compose in either order.

use crate::types::PullRequest;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Keeps pull requests created at or after `since`.
pub fn filter_prs_by_date(prs: &[PullRequest], since: DateTime<Utc>) -> Vec<PullRequest> {
    prs.iter()
        .filter(|pr| pr.created_at >= since)
        .cloned()
        .collect()
}

/// Keeps pull requests opened by one of `members`.
pub fn filter_prs_by_collaborators(
    prs: &[PullRequest],
    members: &HashSet<String>,
) -> Vec<PullRequest> {
    prs.iter()
        .filter(|pr| members.contains(&pr.author))
        .cloned()
        .collect()
}
