use crate::metrics::WrappedMetrics;
use std::fmt;

const RULE_WIDTH: usize = 60;

/// Console rendering of the wrapped summary.
pub struct Report<'a>(pub &'a WrappedMetrics);

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.0;
        let rule = "=".repeat(RULE_WIDTH);

        writeln!(f, "{rule}")?;
        writeln!(f, "GITHUB TEAM WRAPPED")?;
        writeln!(f, "{rule}")?;
        writeln!(f)?;
        writeln!(f, "Total number of repos worked on this year: {}", m.total_repos)?;
        writeln!(f, "Total PRs open this year: {}", m.total_prs)?;

        if let (Some(month), count) = &m.top_month {
            writeln!(f, "Most active month - {month} with {count} PRs open")?;
        }

        if m.new_repos.is_empty() {
            writeln!(f, "0 new repositories created this year")?;
        } else {
            writeln!(
                f,
                "{} new repositories created - {}",
                m.new_repos.len(),
                m.new_repos.join(", ")
            )?;
        }

        writeln!(f, "Top 3 days with most PRs opened: {}", m.top_3_pr_dates)?;
        writeln!(f, "Top 5 PR openers: {}", m.top_5_pr_openers)?;
        writeln!(f, "Most dynamic repositories: {}", m.top_3_repos.render(" PRs opened"))?;
        writeln!(
            f,
            "{} comments left! Top commenters: {}",
            m.total_comments,
            m.top_3_commenters.render(" comments")
        )?;
        writeln!(f, "{} LGTMs given", m.lgtm_count)?;
        writeln!(f, "{} commits created", m.total_commits)?;
        writeln!(f, "Lines of code written: +{}", m.total_additions)?;
        writeln!(f, "Lines of code deleted: -{}", m.total_deletions)?;
        writeln!(
            f,
            "Workflow runs: {} total ({} successful, {} failed)",
            m.total_workflow_runs, m.successful_workflow_runs, m.failed_workflow_runs
        )?;
        writeln!(f)?;
        write!(f, "{rule}")
    }
}
