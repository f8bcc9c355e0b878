//! Diagnostic report files.
//!
//! Per organization: one TSV per [`ReportKind`] (`<ORG>_main`,
//! `<ORG>_resource_unmatched`, ...) plus `<ORG>_resource_unmatched_summary`
//! with a count per unmatched journal abbreviation. Shared:
//! `multi_org_conflicts` and the deduplicated
//! `resource_abbreviation_not_matched` list.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::diagnostics::{Diagnostic, DiagnosticKind, ReportKind, Severity};
use crate::error::OutputResult;

const HEADER: [&str; 5] = ["organization", "primary_id", "severity", "kind", "message"];

/// Every diagnostic of a run.
#[derive(Debug, Clone, Default)]
pub struct ReportSet {
    diagnostics: Vec<Diagnostic>,
}

impl ReportSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics.iter().filter(|d| d.severity() == severity).count()
    }

    /// Unmatched journal abbreviations and how often each was seen, per organization.
    pub fn unmatched_abbreviations(&self) -> BTreeMap<&str, BTreeMap<&str, usize>> {
        let mut counts: BTreeMap<&str, BTreeMap<&str, usize>> = BTreeMap::new();
        for d in &self.diagnostics {
            if let DiagnosticKind::JournalNotFound { abbreviation } = &d.kind {
                *counts
                    .entry(d.organization.as_str())
                    .or_default()
                    .entry(abbreviation.as_str())
                    .or_default() += 1;
            }
        }
        counts
    }
}

/// Writes a [`ReportSet`] into a directory.
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Write all report files; returns the paths written.
    pub fn write(&self, reports: &ReportSet, organizations: &[String]) -> OutputResult<Vec<PathBuf>> {
        fs::create_dir_all(&self.dir)?;
        let mut written = Vec::new();

        for organization in organizations {
            for kind in ReportKind::PER_ORGANIZATION {
                let rows = reports
                    .diagnostics
                    .iter()
                    .filter(|d| &d.organization == organization && d.report() == kind);
                let path = self.dir.join(format!("{}_{}", organization, kind.suffix()));
                write_diagnostics(&path, rows)?;
                written.push(path);
            }
        }

        let conflicts = reports
            .diagnostics
            .iter()
            .filter(|d| d.report() == ReportKind::MultiOrgConflicts);
        let path = self.dir.join(ReportKind::MultiOrgConflicts.suffix());
        write_diagnostics(&path, conflicts)?;
        written.push(path);

        let unmatched = reports.unmatched_abbreviations();
        for (organization, counts) in &unmatched {
            let path = self.dir.join(format!("{}_resource_unmatched_summary", organization));
            let mut writer = tsv_writer(&path)?;
            writer.write_record(["abbreviation", "count"])?;
            for (abbreviation, count) in counts {
                writer.write_record([abbreviation.to_string(), count.to_string()])?;
            }
            writer.flush()?;
            written.push(path);
        }

        let distinct: BTreeSet<&str> = unmatched.values().flat_map(|c| c.keys().copied()).collect();
        let path = self.dir.join("resource_abbreviation_not_matched");
        let mut writer = tsv_writer(&path)?;
        for abbreviation in distinct {
            writer.write_record([abbreviation])?;
        }
        writer.flush()?;
        written.push(path);

        Ok(written)
    }
}

fn tsv_writer(path: &Path) -> OutputResult<csv::Writer<fs::File>> {
    Ok(csv::WriterBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_path(path)?)
}

fn write_diagnostics<'a>(path: &Path, rows: impl Iterator<Item = &'a Diagnostic>) -> OutputResult<()> {
    let mut writer = tsv_writer(path)?;
    writer.write_record(HEADER)?;
    for d in rows {
        let severity = match d.severity() {
            Severity::Warning => "warning",
            Severity::Flagged => "flagged",
            Severity::Fatal => "fatal",
        };
        let kind = serde_json::to_value(&d.kind)
            .ok()
            .and_then(|v| v.get("kind").and_then(|k| k.as_str()).map(str::to_string))
            .unwrap_or_default();
        writer.write_record([
            d.organization.as_str(),
            d.primary_id.as_str(),
            severity,
            kind.as_str(),
            d.kind.to_string().as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
