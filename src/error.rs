use thiserror::Error;

/// Errors raised while collecting, storing or aggregating activity records.
#[derive(Error, Debug)]
pub enum Error {
    #[error("GitHub request failed: {0}")]
    GitHub(#[from] octocrab::Error),

    #[error("Malformed resource URL '{url}': {reason}")]
    MalformedUrl { url: String, reason: &'static str },

    #[error("Invalid repository identifier '{0}', expected 'owner/name'")]
    InvalidRepoId(String),

    #[error("Record file {path} is missing")]
    MissingRecords { path: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
