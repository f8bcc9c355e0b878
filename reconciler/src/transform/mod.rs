//! Reconciliation stages.
//!
//! - `journal`: journal identity resolution
//! - `xref`: cross-reference sanitizing and promotion
//! - `reconciler`: per-record merge with authoritative data
//! - `consolidate`: multi-organization merge
//! - `partition`: bounded output partitions
//! - `pipeline`: run orchestration

pub mod consolidate;
pub mod journal;
pub mod partition;
pub mod pipeline;
pub mod reconciler;
pub mod xref;

pub use consolidate::{consolidate_all, Consolidated, ConsolidationBuilder, Contribution};
pub use journal::{JournalCatalog, JournalResolution, JournalResolver, LocalJournalCatalog};
pub use partition::{JsonDirSink, Partition, PartitionGroup, PartitionSink, PartitionSummary, Partitioner};
pub use pipeline::{fetch, reconcile_organization, Pipeline, RunManifest, RunOptions};
pub use reconciler::{FieldReconciler, Reconciled};
pub use xref::{SanitizedXrefs, XrefSanitizer};
