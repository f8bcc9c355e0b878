//! Run orchestration.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │ Fetch phase  │──▶│ Workers, one per   │──▶│ Consolidation of │──▶│ Partitions,  │
//! │ (all I/O)    │   │ organization       │   │ multi-org ids    │   │ fingerprints,│
//! │              │   │ sanitize/reconcile │   │                  │   │ reports      │
//! └──────────────┘   └────────────────────┘   └──────────────────┘   └──────────────┘
//! ```
//!
//! The fetch phase reads every payload, the journal catalogs, the
//! authoritative records and the previous fingerprints into [`ReferenceData`].
//! Workers only read that snapshot. Nothing is written until every worker has
//! finished, so a cancelled run leaves the output directory untouched.
//!
//! # Example
//!
//! ```rust,ignore
//! use litmerge::config::PipelineConfig;
//! use litmerge::transform::pipeline::{Pipeline, RunOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = Pipeline::open(PipelineConfig::from_env()?)?;
//!     let manifest = pipeline.run(RunOptions::default()).await?;
//!     println!("{} partitions written", manifest.partitions.len());
//!     Ok(())
//! }
//! ```

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

use crate::cache::{FingerprintRegistry, FingerprintSnapshot, FingerprintStore, Fingerprinter, PendingFingerprint};
use crate::config::PipelineConfig;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Severity};
use crate::error::{OutputError, PipelineError, PipelineResult};
use crate::logs::{log_info, log_org_info, log_org_success, log_org_warning, log_success, log_warning};
use crate::models::{RawSubmission, ReconciledRecord};
use crate::parser::{load_journal_catalog, load_local_journals, load_payload, AuthoritativeStore, ClaimIndex};
use crate::report::{ReportSet, ReportWriter};
use crate::transform::consolidate::{consolidate_all, Contribution};
use crate::transform::journal::{JournalCatalog, JournalResolver, LocalJournalCatalog};
use crate::transform::partition::{JsonDirSink, PartitionGroup, PartitionSink, PartitionSummary, Partitioner};
use crate::transform::reconciler::FieldReconciler;
use crate::transform::xref::XrefSanitizer;
use crate::validation::submission_diagnostics;

// =============================================================================
// Options and results
// =============================================================================

/// Per-run switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Ignore previous fingerprints and emit everything.
    pub full: bool,
}

/// Counters for one organization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationStats {
    pub organization: String,
    pub total: usize,
    pub rejected: usize,
    pub unchanged: usize,
    pub emitted_matched: usize,
    pub emitted_unmatched: usize,
    /// Routed to multi-organization consolidation.
    pub consolidated: usize,
}

impl OrganizationStats {
    fn new(organization: &str) -> Self {
        Self {
            organization: organization.to_string(),
            ..Self::default()
        }
    }
}

/// Counters for multi-organization external ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidationStats {
    pub external_ids: usize,
    pub emitted: usize,
    pub unchanged: usize,
    pub conflicts: usize,
}

/// `manifest.json`, written next to the partitions.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunManifest {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub full: bool,
    pub partitions: Vec<PartitionSummary>,
    pub organizations: Vec<OrganizationStats>,
    pub consolidation: ConsolidationStats,
    pub warnings: usize,
    pub flagged: usize,
    pub rejected: usize,
}

impl RunManifest {
    pub fn emitted(&self) -> usize {
        self.partitions.iter().map(|p| p.records).sum()
    }
}

// =============================================================================
// Fetch phase
// =============================================================================

/// Read-only snapshot shared by all workers.
pub struct ReferenceData {
    pub config: PipelineConfig,
    pub sanitizer: XrefSanitizer,
    pub fingerprinter: Fingerprinter,
    pub catalog: JournalCatalog,
    pub local_catalogs: HashMap<String, LocalJournalCatalog>,
    pub claims: ClaimIndex,
    pub authoritative: AuthoritativeStore,
    pub previous: FingerprintSnapshot,
}

/// Everything the fetch phase read.
pub struct FetchedInputs {
    pub data: ReferenceData,
    /// `(organization, entries)` in configured order; organizations without a payload are absent.
    pub payloads: Vec<(String, Vec<Value>)>,
}

/// Read every input. Fails only on infrastructure problems.
pub fn fetch(config: &PipelineConfig, previous: FingerprintSnapshot) -> PipelineResult<FetchedInputs> {
    let paths = &config.paths;
    let catalog = JournalCatalog::new(load_journal_catalog(&paths.journal_catalog())?);
    log_info(format!("Journal catalog: {} identities", catalog.len()));

    let mut payloads = Vec::new();
    let mut local_catalogs = HashMap::new();
    for organization in &config.organizations {
        let Some(entries) = load_payload(&paths.submission_file(organization))? else {
            log_org_warning(organization, "No submission payload, skipping");
            continue;
        };
        let local = load_local_journals(&paths.local_journal_file(organization))?;
        log_org_info(
            organization,
            format!("{} submissions, {} local journals", entries.len(), local.len()),
        );
        local_catalogs.insert(organization.clone(), LocalJournalCatalog::new(local, &catalog));
        payloads.push((organization.clone(), entries));
    }

    let sanitizer = XrefSanitizer::new(config);
    let claims = ClaimIndex::build(
        payloads.iter().map(|(org, entries)| (org.as_str(), entries.as_slice())),
        &sanitizer,
    );
    log_info(format!(
        "Claim index: {} external ids, {} claimed by several organizations",
        claims.len(),
        claims.multi_count()
    ));

    let authoritative = AuthoritativeStore::load(&paths.authoritative_dir(), claims.external_ids())?;
    log_info(format!("Authoritative records: {} found", authoritative.len()));

    let data = ReferenceData {
        config: config.clone(),
        sanitizer,
        fingerprinter: Fingerprinter::new(&config.fingerprint),
        catalog,
        local_catalogs,
        claims,
        authoritative,
        previous,
    };
    Ok(FetchedInputs { data, payloads })
}

// =============================================================================
// Per-organization reconciliation
// =============================================================================

/// What one worker produced.
#[derive(Debug, Default)]
pub struct OrganizationOutcome {
    pub stats: OrganizationStats,
    pub diagnostics: Vec<Diagnostic>,
    pub emitted: Vec<(PartitionGroup, ReconciledRecord)>,
    pub contributions: Vec<Contribution>,
    pub pending: Vec<PendingFingerprint>,
}

/// Reconcile every entry of one organization's payload.
pub fn reconcile_organization(data: &ReferenceData, organization: &str, entries: &[Value]) -> OrganizationOutcome {
    let resolver = JournalResolver::new(&data.catalog, data.local_catalogs.get(organization));
    let reconciler = FieldReconciler::new(&data.config, &data.sanitizer, &data.catalog, resolver);

    let mut out = OrganizationOutcome {
        stats: OrganizationStats::new(organization),
        ..OrganizationOutcome::default()
    };

    for entry in entries {
        out.stats.total += 1;
        let submitted_id = entry.get("primaryId").and_then(Value::as_str).unwrap_or_default().to_string();
        let mut report = |kind: DiagnosticKind| out.diagnostics.push(Diagnostic::new(organization, &submitted_id, kind));

        for kind in submission_diagnostics(entry) {
            report(kind);
        }

        let submission = match RawSubmission::from_value(organization, entry.clone()) {
            Ok(s) => s,
            Err(e) => {
                report(DiagnosticKind::InvalidSubmission { message: e.to_string() });
                out.stats.rejected += 1;
                continue;
            }
        };

        let xrefs = match data.sanitizer.sanitize(&submission.primary_id, &submission.cross_references) {
            Ok(x) => x,
            Err(e) => {
                report(e.into());
                out.stats.rejected += 1;
                continue;
            }
        };

        let authoritative = xrefs.external_id.as_deref().and_then(|id| data.authoritative.get(id));
        let fingerprint = match data.fingerprinter.fingerprint(&submission, authoritative.is_some()) {
            Ok(fp) => fp,
            Err(e) => {
                report(DiagnosticKind::InvalidSubmission { message: e.to_string() });
                out.stats.rejected += 1;
                continue;
            }
        };
        let changed = data.previous.has_changed(organization, &submission.primary_id, &fingerprint);
        let multi = authoritative.is_some()
            && xrefs.external_id.as_deref().is_some_and(|id| data.claims.is_multi(id));

        if !multi && !changed {
            out.stats.unchanged += 1;
            continue;
        }

        let reconciled = reconciler.reconcile(&submission, xrefs, authoritative, fingerprint.clone());
        for kind in reconciled.diagnostics {
            report(kind);
        }
        let record = reconciled.record;

        if multi {
            out.stats.consolidated += 1;
            out.contributions.push(Contribution {
                organization: organization.to_string(),
                submitted_id: submission.primary_id.clone(),
                fingerprint,
                changed,
                record,
            });
            continue;
        }

        if record.is_matched() {
            out.stats.emitted_matched += 1;
        } else {
            out.stats.emitted_unmatched += 1;
        }
        out.pending.push(PendingFingerprint {
            organization: organization.to_string(),
            primary_id: submission.primary_id.clone(),
            fingerprint,
        });
        out.emitted.push((PartitionGroup::for_record(organization, &record), record));
    }

    debug!(
        organization = organization,
        total = out.stats.total,
        rejected = out.stats.rejected,
        unchanged = out.stats.unchanged,
        "organization reconciled"
    );
    out
}

// =============================================================================
// Pipeline
// =============================================================================

/// A configured pipeline over a fingerprint store.
pub struct Pipeline<S: FingerprintStore> {
    config: PipelineConfig,
    store: Mutex<S>,
    cancel: Arc<AtomicBool>,
}

impl Pipeline<FingerprintRegistry> {
    /// Pipeline over the on-disk fingerprint registry of `config`.
    pub fn open(config: PipelineConfig) -> PipelineResult<Self> {
        let registry = FingerprintRegistry::with_dir(config.paths.fingerprint_dir())?;
        Ok(Self::with_store(config, registry))
    }
}

impl<S: FingerprintStore> Pipeline<S> {
    pub fn with_store(config: PipelineConfig, store: S) -> Self {
        Self {
            config,
            store: Mutex::new(store),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Setting the returned flag stops the run at the next organization boundary.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn snapshot(&self) -> FingerprintSnapshot {
        self.store.lock().unwrap_or_else(|e| e.into_inner()).snapshot()
    }

    fn commit(&self, pending: &[PendingFingerprint]) -> PipelineResult<()> {
        self.store.lock().unwrap_or_else(|e| e.into_inner()).commit(pending)?;
        Ok(())
    }

    /// Run the whole pipeline.
    pub async fn run(&self, options: RunOptions) -> PipelineResult<RunManifest> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();
        info!(run_id = %run_id, full = options.full, "run started");

        let previous = if options.full {
            FingerprintSnapshot::default()
        } else {
            self.snapshot()
        };
        let FetchedInputs { data, payloads } = fetch(&self.config, previous)?;
        let data = Arc::new(data);

        data.claims.write_tsv(&self.config.paths.claim_index())?;

        let outcomes = self.reconcile_all(&data, payloads).await?;
        if self.cancelled() {
            log_warning("Run cancelled, nothing written");
            return Err(PipelineError::Cancelled);
        }

        let mut partitioner = Partitioner::new(self.config.partitions);
        let mut reports = ReportSet::new();
        let mut pending = Vec::new();
        let mut contributions = Vec::new();
        let mut organizations = Vec::new();
        for outcome in outcomes {
            for (group, record) in outcome.emitted {
                partitioner.push(group, record);
            }
            reports.extend(outcome.diagnostics);
            pending.extend(outcome.pending);
            contributions.extend(outcome.contributions);
            organizations.push(outcome.stats);
        }

        let mut consolidation = ConsolidationStats::default();
        for consolidated in consolidate_all(contributions) {
            consolidation.external_ids += 1;
            consolidation.conflicts += consolidated.conflicts.len();
            reports.extend(consolidated.conflicts);
            if !consolidated.changed {
                consolidation.unchanged += 1;
                continue;
            }
            consolidation.emitted += 1;
            pending.extend(consolidated.fingerprints.into_iter().map(
                |(organization, primary_id, fingerprint)| PendingFingerprint {
                    organization,
                    primary_id,
                    fingerprint,
                },
            ));
            partitioner.push(PartitionGroup::MultiSource, consolidated.record);
        }

        let mut sink = JsonDirSink::new(self.config.paths.output_dir())?;
        let stale = sink.clear_partitions()?;
        if stale > 0 {
            debug!(removed = stale, "cleared previous partitions");
        }
        let partitions = partitioner
            .finish()
            .iter()
            .map(|partition| sink.write_partition(partition))
            .collect::<Result<Vec<_>, _>>()?;

        self.commit(&pending)?;

        ReportWriter::new(self.config.paths.reports_dir()).write(&reports, &self.config.organizations)?;

        let manifest = RunManifest {
            run_id,
            started_at,
            finished_at: Utc::now(),
            full: options.full,
            partitions,
            organizations,
            consolidation,
            warnings: reports.count(Severity::Warning),
            flagged: reports.count(Severity::Flagged),
            rejected: reports.count(Severity::Fatal),
        };
        write_manifest(&self.config, &manifest)?;

        log_success(format!(
            "Run {} done: {} records in {} partitions, {} fingerprints committed",
            run_id,
            manifest.emitted(),
            manifest.partitions.len(),
            pending.len()
        ));
        Ok(manifest)
    }

    /// Fan organizations out over blocking worker tasks, `workers` at a time.
    async fn reconcile_all(
        &self,
        data: &Arc<ReferenceData>,
        payloads: Vec<(String, Vec<Value>)>,
    ) -> PipelineResult<Vec<OrganizationOutcome>> {
        let workers = self.config.workers.max(1);
        let tasks = payloads.into_iter().map(|(organization, entries)| {
            let data = Arc::clone(data);
            let cancel = Arc::clone(&self.cancel);
            async move {
                if cancel.load(Ordering::SeqCst) {
                    return Ok(None);
                }
                let org = organization.clone();
                let outcome = tokio::task::spawn_blocking(move || reconcile_organization(&data, &org, &entries))
                    .await
                    .map_err(|e| PipelineError::WorkerFailed {
                        organization: organization.clone(),
                        message: e.to_string(),
                    })?;
                log_org_success(
                    &organization,
                    format!(
                        "{} entries: {} rejected, {} unchanged, {} emitted, {} to consolidation",
                        outcome.stats.total,
                        outcome.stats.rejected,
                        outcome.stats.unchanged,
                        outcome.stats.emitted_matched + outcome.stats.emitted_unmatched,
                        outcome.stats.consolidated
                    ),
                );
                Ok::<_, PipelineError>(Some(outcome))
            }
        });

        let results: Vec<PipelineResult<Option<OrganizationOutcome>>> =
            stream::iter(tasks).buffered(workers).collect().await;

        let mut outcomes = Vec::new();
        for result in results {
            if let Some(outcome) = result? {
                outcomes.push(outcome);
            }
        }
        Ok(outcomes)
    }
}

fn write_manifest(config: &PipelineConfig, manifest: &RunManifest) -> PipelineResult<()> {
    let dir = config.paths.output_dir();
    fs::create_dir_all(&dir).map_err(OutputError::from)?;
    let content = serde_json::to_string_pretty(manifest).map_err(OutputError::from)?;
    fs::write(dir.join("manifest.json"), content).map_err(OutputError::from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuthoritativeRecord, JournalIdentity};
    use serde_json::json;

    fn reference_data(claims: ClaimIndex, authoritative: AuthoritativeStore) -> ReferenceData {
        let config = PipelineConfig::default();
        let catalog = JournalCatalog::new(vec![JournalIdentity {
            primary_id: "NLM:0410462".into(),
            nlm: Some("0410462".into()),
            title: Some("Genetics".into()),
            iso_abbreviation: Some("Genetics".into()),
            ..JournalIdentity::default()
        }]);
        ReferenceData {
            sanitizer: XrefSanitizer::new(&config),
            fingerprinter: Fingerprinter::new(&config.fingerprint),
            config,
            catalog,
            local_catalogs: HashMap::new(),
            claims,
            authoritative,
            previous: FingerprintSnapshot::default(),
        }
    }

    fn authoritative(title: &str) -> AuthoritativeRecord {
        AuthoritativeRecord {
            title: Some(title.into()),
            nlm: Some("0410462".into()),
            ..AuthoritativeRecord::default()
        }
    }

    #[test]
    fn test_rejected_and_emitted_counts() {
        let mut store = AuthoritativeStore::new();
        store.insert("PMID:1001", authoritative("Gene X"));
        let data = reference_data(ClaimIndex::new(), store);

        let entries = vec![
            json!({ "primaryId": "FB:FBrf01", "crossReferences": [{ "id": "PMID:1001", "pages": ["PubMed"] }] }),
            json!({ "primaryId": "FBrf02" }),
            json!({ "primaryId": "FB:FBrf03", "resourceAbbreviation": "Genetics",
                    "crossReferences": [{ "id": "FB:FBrf03", "pages": ["reference"] }] }),
            json!("not an object"),
        ];
        let out = reconcile_organization(&data, "FB", &entries);

        assert_eq!(out.stats.total, 4);
        assert_eq!(out.stats.rejected, 2);
        assert_eq!(out.stats.emitted_matched, 1);
        assert_eq!(out.stats.emitted_unmatched, 1);
        assert_eq!(out.pending.len(), 2);

        let (group, record) = &out.emitted[0];
        assert_eq!(group, &PartitionGroup::Matched("FB".into()));
        assert_eq!(record.primary_id, "PMID:1001");
        assert_eq!(record.governed.title.as_deref(), Some("Gene X"));
        // fingerprints are keyed by the submitted id
        assert_eq!(out.pending[0].primary_id, "FB:FBrf01");

        assert!(out
            .diagnostics
            .iter()
            .any(|d| d.primary_id == "FBrf02" && d.severity() == Severity::Fatal));
    }

    #[test]
    fn test_unchanged_entries_are_skipped() {
        let mut data = reference_data(ClaimIndex::new(), AuthoritativeStore::new());
        let entry = json!({ "primaryId": "WB:WBPaper1", "title": "Worms" });
        let first = reconcile_organization(&data, "WB", std::slice::from_ref(&entry));
        let fp = &first.pending[0].fingerprint;

        data.previous.insert("WB", "WB:WBPaper1", fp);
        let second = reconcile_organization(&data, "WB", &[entry]);
        assert_eq!(second.stats.unchanged, 1);
        assert!(second.emitted.is_empty());
        assert!(second.pending.is_empty());
    }

    #[test]
    fn test_multi_claimed_always_contributes() {
        let mut claims = ClaimIndex::new();
        claims.add("PMID:2002", "FB");
        claims.add("PMID:2002", "WB");
        let mut store = AuthoritativeStore::new();
        store.insert("PMID:2002", authoritative("Shared"));
        let mut data = reference_data(claims, store);

        let entry = json!({ "primaryId": "PMID:2002", "allianceCategory": "review" });
        let first = reconcile_organization(&data, "WB", std::slice::from_ref(&entry));
        assert_eq!(first.stats.consolidated, 1);
        assert!(first.contributions[0].changed);

        data.previous.insert("WB", "PMID:2002", &first.contributions[0].fingerprint);
        let second = reconcile_organization(&data, "WB", &[entry]);
        assert_eq!(second.contributions.len(), 1);
        assert!(!second.contributions[0].changed);
        assert!(second.emitted.is_empty());
    }
}
