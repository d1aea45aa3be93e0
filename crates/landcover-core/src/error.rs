//! Error types shared across the pipeline.

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Failures surfaced to the caller of a series run.
///
/// Per-window query faults never appear here unless they are fatal: transient
/// faults degrade to a gap-filled window instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid category: {0}")]
    InvalidCategory(String),

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("query service rejected window {window} ({label}): {message}")]
    QueryFatal {
        window: usize,
        label: String,
        message: String,
    },

    #[error("run cancelled before completion")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

/// Outcome of a single archive query attempt.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    /// Network fault, timeout or throttling. Safe to retry.
    #[error("transient query failure: {0}")]
    Transient(String),

    /// Malformed request or permanent rejection. Never retried.
    #[error("fatal query failure: {0}")]
    Fatal(String),
}

impl QueryError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, QueryError::Transient(_))
    }
}

/// Errors raised while reading a pipeline configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config value `{key}`: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Errors raised while reading a region file.
#[derive(Debug, Error)]
pub enum RegionLoadError {
    #[error("cannot read region {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode region {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised while loading scene files into an in-memory archive.
#[derive(Debug, Error)]
pub enum ArchiveLoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode scene {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("scene {id} is malformed: {message}")]
    Malformed { id: String, message: String },
}
