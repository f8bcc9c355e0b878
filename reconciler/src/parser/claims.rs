//! Claim index: which organizations submitted each external id.
//!
//! Built from every payload before reconciliation, using the same rule the
//! sanitizer uses to find a record's external id. Stored as TSV:
//! `external_id<TAB>count<TAB>ORG, ORG`.

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::error::{LoadError, LoadResult, OutputResult};
use crate::models::RawSubmission;
use crate::transform::xref::XrefSanitizer;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimIndex {
    claims: BTreeMap<String, BTreeSet<String>>,
}

impl ClaimIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(organization, payload entries)` pairs.
    ///
    /// Entries that would be rejected by the sanitizer claim nothing.
    pub fn build<'a>(
        payloads: impl IntoIterator<Item = (&'a str, &'a [Value])>,
        sanitizer: &XrefSanitizer,
    ) -> Self {
        let mut index = Self::new();
        for (organization, entries) in payloads {
            for entry in entries {
                let Ok(submission) = RawSubmission::from_value(organization, entry.clone()) else {
                    continue;
                };
                if let Ok(sanitized) = sanitizer.sanitize(&submission.primary_id, &submission.cross_references) {
                    if let Some(external_id) = sanitized.external_id {
                        index.add(&external_id, organization);
                    }
                }
            }
        }
        index
    }

    pub fn add(&mut self, external_id: &str, organization: &str) {
        self.claims
            .entry(external_id.to_string())
            .or_default()
            .insert(organization.to_string());
    }

    pub fn organizations(&self, external_id: &str) -> Option<&BTreeSet<String>> {
        self.claims.get(external_id)
    }

    /// Claimed by more than one organization.
    pub fn is_multi(&self, external_id: &str) -> bool {
        self.organizations(external_id).is_some_and(|orgs| orgs.len() > 1)
    }

    pub fn external_ids(&self) -> impl Iterator<Item = &str> {
        self.claims.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    pub fn multi_count(&self) -> usize {
        self.claims.values().filter(|orgs| orgs.len() > 1).count()
    }

    pub fn write_tsv(&self, path: &Path) -> OutputResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_path(path)?;
        for (external_id, organizations) in &self.claims {
            let orgs: Vec<&str> = organizations.iter().map(String::as_str).collect();
            writer.write_record([
                external_id.as_str(),
                organizations.len().to_string().as_str(),
                orgs.join(", ").as_str(),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn read_tsv(path: &Path) -> LoadResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(|e| claim_error(path, e.to_string()))?;

        let mut index = Self::new();
        for (line, row) in reader.records().enumerate() {
            let row = row.map_err(|e| claim_error(path, e.to_string()))?;
            let (Some(external_id), Some(organizations)) = (row.get(0), row.get(2)) else {
                return Err(claim_error(path, format!("line {}: expected 3 columns", line + 1)));
            };
            for organization in organizations.split(',').map(str::trim).filter(|o| !o.is_empty()) {
                index.add(external_id, organization);
            }
        }
        Ok(index)
    }
}

fn claim_error(path: &Path, message: String) -> LoadError {
    LoadError::ClaimIndex {
        path: path.to_path_buf(),
        message,
    }
}
