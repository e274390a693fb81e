//! Application configuration and environment variable parsing.
//!
//! This module handles loading configuration settings from the environment (e.g., .env file).
//! It defines the `AppConfig` struct which governs which organization is scanned, whose
//! pull requests count, where the collection window starts, and how hard the GitHub API is hit.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration as StdDuration;

/// Application configuration loaded from environment variables.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    /// GitHub Personal Access Token used as a bearer token on every request.
    pub github_token: String,

    /// The organization whose repositories are scanned.
    pub github_org: String,

    /// Logins whose pull requests are counted.
    /// Expected format: comma-separated string of logins.
    /// Example: "octocat,hubot"
    #[serde(deserialize_with = "deserialize_team_members")]
    pub team_members: HashSet<String>,

    /// Inclusive start of the collection window, RFC 3339 in UTC (e.g. "2025-01-01T00:00:00Z").
    pub since_date: DateTime<Utc>,

    /// Value sent in the `X-GitHub-Api-Version` header.
    #[serde(default = "default_api_version")]
    pub github_api_version: String,

    /// Base URI override, for GitHub Enterprise installations.
    pub github_api_url: Option<String>,

    /// Page size for every listing request. GitHub caps this at 100.
    #[serde(default = "default_per_page")]
    pub per_page: u8,

    /// Pause inserted after each repository that produced matching pull requests.
    #[serde(default = "default_repo_pacing_seconds")]
    pub repo_pacing_seconds: u64,

    /// Directory the collected record sets are written to and read back from.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Destination of the JSON document consumed by the web page.
    #[serde(default = "default_web_stats_path")]
    pub web_stats_path: PathBuf,
}

fn default_api_version() -> String {
    "2022-11-28".to_string()
}

fn default_per_page() -> u8 {
    100
}

fn default_repo_pacing_seconds() -> u64 {
    30
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_web_stats_path() -> PathBuf {
    PathBuf::from("web/stats.json")
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn repo_pacing(&self) -> StdDuration {
        StdDuration::from_secs(self.repo_pacing_seconds)
    }

    /// The since-date in the `YYYY-MM-DDTHH:MM:SSZ` form GitHub expects in `since` parameters.
    pub fn since_param(&self) -> String {
        self.since_date.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

fn deserialize_team_members<'de, D>(deserializer: D) -> Result<HashSet<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Ok(parse_team_members(&s))
}

fn parse_team_members(s: &str) -> HashSet<String> {
    s.split(',')
        .map(str::trim)
        .filter(|login| !login.is_empty())
        .map(str::to_string)
        .collect()
}
