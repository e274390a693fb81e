//! Team activity "wrapped" for a GitHub organization.
//!
//! Collects pull requests, comments, commits and workflow runs authored by a set of team
//! members since a given date, then aggregates them into a year-in-review summary.

pub mod collector;
pub mod config;
pub mod error;
pub mod filter;
pub mod github;
pub mod metrics;
pub mod report;
pub mod store;
pub mod throttle;
pub mod types;

pub use collector::{CollectedData, Collector, RepoOutcome, RepoState};
pub use config::AppConfig;
pub use error::{Error, Result};
pub use github::{GitHubApi, GitHubClient};
pub use metrics::{calculate_metrics, WebStats, WrappedMetrics};
