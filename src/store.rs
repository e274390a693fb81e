//! Persistence of collected record sets.
//!
//! Each record set is a JSON Lines file, one flat record per line, so a later run can
//! recompute metrics without hitting the API again.

use crate::collector::CollectedData;
use crate::error::{Error, Result};
use crate::metrics::WebStats;
use crate::types::WorkflowRun;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const REPOS_FILE: &str = "repos.jsonl";
const PULL_REQUESTS_FILE: &str = "pull_requests.jsonl";
const COMMENTS_FILE: &str = "comments.jsonl";
const COMMITS_FILE: &str = "commits.jsonl";
const COMMIT_STATS_FILE: &str = "commit_stats.jsonl";
const WORKFLOW_RUNS_FILE: &str = "workflow_runs.jsonl";

#[derive(Clone, Debug)]
pub struct RecordStore {
    dir: PathBuf,
}

impl RecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save(&self, data: &CollectedData) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        self.write_records(REPOS_FILE, &data.repos)?;
        self.write_records(PULL_REQUESTS_FILE, &data.pull_requests)?;
        self.write_records(COMMENTS_FILE, &data.comments)?;
        self.write_records(COMMITS_FILE, &data.commits)?;
        self.write_records(COMMIT_STATS_FILE, &data.commit_stats)?;
        self.write_records(WORKFLOW_RUNS_FILE, &data.workflow_runs)?;

        Ok(())
    }

    /// Loads every record set. Data sets written before workflow runs were collected have no
    /// runs file; it loads as empty.
    pub fn load(&self) -> Result<CollectedData> {
        let workflow_runs: Vec<WorkflowRun> = match self.read_records(WORKFLOW_RUNS_FILE) {
            Err(Error::MissingRecords { path }) => {
                tracing::info!(%path, "No workflow runs stored, skipping workflow stats");
                Vec::new()
            }
            other => other?,
        };

        Ok(CollectedData {
            repos: self.read_records(REPOS_FILE)?,
            pull_requests: self.read_records(PULL_REQUESTS_FILE)?,
            comments: self.read_records(COMMENTS_FILE)?,
            commits: self.read_records(COMMITS_FILE)?,
            commit_stats: self.read_records(COMMIT_STATS_FILE)?,
            workflow_runs,
            outcomes: Vec::new(),
        })
    }

    fn write_records<T: Serialize>(&self, file: &str, records: &[T]) -> Result<()> {
        let path = self.dir.join(file);
        let mut writer = BufWriter::new(File::create(&path)?);
        for record in records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        tracing::info!(path = %path.display(), records = records.len(), "Saved records");
        Ok(())
    }

    fn read_records<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>> {
        let path = self.dir.join(file);
        if !path.exists() {
            return Err(Error::MissingRecords {
                path: path.display().to_string(),
            });
        }

        let reader = BufReader::new(File::open(&path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }
}

/// Writes the web page's `stats.json`, creating parent directories as needed.
pub fn write_web_stats(path: &Path, stats: &WebStats) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(stats)?;
    fs::write(path, json)?;

    tracing::info!(path = %path.display(), "Generated web stats");
    Ok(())
}
