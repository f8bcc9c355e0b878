//! Error types for the litmerge reconciliation pipeline.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`IdentifierError`] - Compound identifier parsing errors
//! - [`RecordError`] - Fatal-per-record rejections (record excluded, run continues)
//! - [`LoadError`] - Infrastructure input errors (catalogs, payloads, authoritative store)
//! - [`StoreError`] - Fingerprint snapshot persistence errors
//! - [`OutputError`] - Partition and report write errors
//! - [`PipelineError`] - Top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// Identifier Errors
// =============================================================================

/// Errors while splitting a compound identifier.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentifierError {
    /// Identifier contains neither `:` nor `-`.
    #[error("Identifier '{0}' does not contain ':' or '-'")]
    Malformed(String),
}

// =============================================================================
// Record Errors (fatal per record)
// =============================================================================

/// Reasons a single submitted record is excluded from the output.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordError {
    /// The primary id or a cross-reference id cannot be split.
    #[error("Malformed identifier: {0}")]
    MalformedIdentifier(String),

    /// More than one distinct value for the same cross-reference prefix.
    #[error("Too many identifiers for {prefix}: {}", values.join(", "))]
    TooManyIdentifiersForType { prefix: String, values: Vec<String> },

    /// The entry does not have the shape of a submission.
    #[error("Invalid submission: {0}")]
    InvalidSubmission(String),
}

impl From<IdentifierError> for RecordError {
    fn from(err: IdentifierError) -> Self {
        match err {
            IdentifierError::Malformed(id) => RecordError::MalformedIdentifier(id),
        }
    }
}

// =============================================================================
// Load Errors (infrastructure)
// =============================================================================

/// Errors while reading pipeline inputs.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Failed to read a file or directory.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File content is not the expected JSON.
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Claim index TSV could not be parsed.
    #[error("Invalid claim index {path}: {message}")]
    ClaimIndex { path: PathBuf, message: String },

    /// A required input is absent.
    #[error("Required input not found: {0}")]
    Missing(PathBuf),
}

impl LoadError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LoadError::Io { path: path.into(), source }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        LoadError::Json { path: path.into(), source }
    }
}

// =============================================================================
// Fingerprint Store Errors
// =============================================================================

/// Errors from the fingerprint snapshot.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error.
    #[error("Fingerprint store IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error.
    #[error("Fingerprint store JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

// =============================================================================
// Output Errors
// =============================================================================

/// Errors while writing partitions, reports or the run manifest.
#[derive(Debug, Error)]
pub enum OutputError {
    /// IO error.
    #[error("Output IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error.
    #[error("Output JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// TSV writer error.
    #[error("Output TSV error: {0}")]
    CsvError(#[from] csv::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// Only infrastructure failures end up here; per-record problems are
/// reported as diagnostics and never abort a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input loading error.
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// Fingerprint store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Output error.
    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    /// A worker task panicked or was aborted.
    #[error("Worker for {organization} failed: {message}")]
    WorkerFailed { organization: String, message: String },

    /// The run was cancelled between organization batches.
    #[error("Run cancelled")]
    Cancelled,

    /// Configuration could not be read.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for record-level operations.
pub type RecordResult<T> = Result<T, RecordError>;

/// Result type for input loading.
pub type LoadResult<T> = Result<T, LoadError>;

/// Result type for fingerprint store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for output operations.
pub type OutputResult<T> = Result<T, OutputError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
