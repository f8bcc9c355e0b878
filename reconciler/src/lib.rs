//! # litmerge - bibliographic submission reconciliation
//!
//! litmerge takes reference records submitted independently by several
//! curating organizations, reconciles them against authoritative metadata
//! keyed by an external id (PMID), resolves their journals, merges records
//! several organizations claim, and writes only what changed since the last
//! run into bounded output partitions.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐   ┌──────────────┐   ┌─────────────┐
//! │ Payloads    │──▶│ Xref        │──▶│ Field merge  │──▶│ Consolidate  │──▶│ Partitions  │
//! │ (any enc.)  │   │ sanitizer   │   │ + journals   │   │ (multi-org)  │   │ + reports   │
//! └─────────────┘   └─────────────┘   └──────────────┘   └──────────────┘   └─────────────┘
//!                          ▲                  ▲                                    │
//!                   claim index      authoritative store             fingerprint commit
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use litmerge::{Pipeline, PipelineConfig, RunOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let pipeline = Pipeline::open(PipelineConfig::default()).unwrap();
//!     let manifest = pipeline.run(RunOptions::default()).await.unwrap();
//!     println!("Emitted {} records", manifest.emitted());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`identifier`] - Compound identifier splitting
//! - [`models`] - Submissions, authoritative records, reconciled output
//! - [`parser`] - Input loading with encoding detection
//! - [`validation`] - Submission schema checks
//! - [`cache`] - Content fingerprints
//! - [`transform`] - Sanitizing, reconciliation, consolidation, partitioning
//! - [`diagnostics`] / [`report`] - Per-record diagnostics and report files
//! - [`config`] - Pipeline configuration
//! - [`logs`] - Run progress logging

// Core modules
pub mod config;
pub mod error;
pub mod identifier;
pub mod models;

// Parsing
pub mod parser;

// Validation
pub mod validation;

// Fingerprints
pub mod cache;

// Transformation
pub mod transform;

// Diagnostics and reports
pub mod diagnostics;
pub mod report;

// Logging
pub mod logs;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    IdentifierError, LoadError, OutputError, PipelineError, PipelineResult, RecordError, StoreError,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{FingerprintPolicy, PartitionLimits, PathsConfig, PipelineConfig, XrefPolicy};

// =============================================================================
// Re-exports - Identifiers
// =============================================================================

pub use identifier::{split_identifier, try_split_identifier, CompoundId, Separator};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    AuthoritativeRecord, CrossReference, JournalIdentity, LocalJournal, MatchState, RawSubmission,
    ReconciledRecord,
};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{decode_content, detect_encoding, load_payload, AuthoritativeStore, ClaimIndex};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{is_valid_submission, unexpected_properties, validate_submission};

// =============================================================================
// Re-exports - Fingerprints
// =============================================================================

pub use cache::{
    FingerprintRegistry, FingerprintSnapshot, FingerprintStore, Fingerprinter, PendingFingerprint,
};

// =============================================================================
// Re-exports - Diagnostics
// =============================================================================

pub use diagnostics::{Diagnostic, DiagnosticKind, ReportKind, Severity};
pub use report::{ReportSet, ReportWriter};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::{
    JournalCatalog, JournalResolution, JournalResolver, Pipeline, RunManifest, RunOptions, XrefSanitizer,
};
