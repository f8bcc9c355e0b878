//! Output partitioning.
//!
//! Records are grouped by match state and organization (or into the single
//! multi-source group) and sealed into partitions of at most `limit`
//! records. Sealed partitions are handed to a [`PartitionSink`] once the run
//! is known to complete, so a cancelled run writes nothing. A completed run
//! first removes the previous run's partitions, so the directory only ever
//! holds what the latest run emitted.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::PartitionLimits;
use crate::error::OutputResult;
use crate::models::ReconciledRecord;

/// Partition group of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PartitionGroup {
    Unmatched(String),
    Matched(String),
    MultiSource,
}

impl PartitionGroup {
    pub fn for_record(organization: &str, record: &ReconciledRecord) -> Self {
        if record.is_matched() {
            PartitionGroup::Matched(organization.to_string())
        } else {
            PartitionGroup::Unmatched(organization.to_string())
        }
    }

    /// File name stem, e.g. `REFERENCE_PUBMED_FB`.
    pub fn stem(&self) -> String {
        match self {
            PartitionGroup::Unmatched(org) => format!("REFERENCE_PUBMOD_{}", org),
            PartitionGroup::Matched(org) => format!("REFERENCE_PUBMED_{}", org),
            PartitionGroup::MultiSource => "REFERENCE_PUBMED_MULTI".to_string(),
        }
    }

    pub fn limit(&self, limits: &PartitionLimits) -> usize {
        match self {
            PartitionGroup::Unmatched(_) => limits.unmatched,
            PartitionGroup::Matched(_) => limits.matched,
            PartitionGroup::MultiSource => limits.multi_source,
        }
        .max(1)
    }
}

/// A sealed partition.
#[derive(Debug, Clone)]
pub struct Partition {
    pub group: PartitionGroup,
    /// 1-based sequence number within the group.
    pub sequence: usize,
    pub records: Vec<ReconciledRecord>,
}

impl Partition {
    /// `REFERENCE_PUBMED_FB_1.json`
    pub fn file_name(&self) -> String {
        format!("{}_{}.json", self.group.stem(), self.sequence)
    }
}

/// Accumulates records and seals bounded partitions.
///
/// One partitioner per writer; groups are never shared between partitioners.
#[derive(Debug)]
pub struct Partitioner {
    limits: PartitionLimits,
    open: BTreeMap<PartitionGroup, Vec<ReconciledRecord>>,
    sequences: BTreeMap<PartitionGroup, usize>,
    sealed: Vec<Partition>,
}

impl Partitioner {
    pub fn new(limits: PartitionLimits) -> Self {
        Self {
            limits,
            open: BTreeMap::new(),
            sequences: BTreeMap::new(),
            sealed: Vec::new(),
        }
    }

    pub fn push(&mut self, group: PartitionGroup, record: ReconciledRecord) {
        let limit = group.limit(&self.limits);
        let buffer = self.open.entry(group.clone()).or_default();
        buffer.push(record);
        if buffer.len() >= limit {
            let records = std::mem::take(buffer);
            self.seal(group, records);
        }
    }

    fn seal(&mut self, group: PartitionGroup, records: Vec<ReconciledRecord>) {
        let sequence = self.sequences.entry(group.clone()).or_insert(0);
        *sequence += 1;
        self.sealed.push(Partition {
            group,
            sequence: *sequence,
            records,
        });
    }

    /// Seal what is left and return every partition.
    pub fn finish(mut self) -> Vec<Partition> {
        let open = std::mem::take(&mut self.open);
        for (group, records) in open {
            if !records.is_empty() {
                self.seal(group, records);
            }
        }
        self.sealed
    }
}

/// Where sealed partitions go.
pub trait PartitionSink {
    fn write_partition(&mut self, partition: &Partition) -> OutputResult<PartitionSummary>;
}

/// What was written for one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionSummary {
    pub file: String,
    pub records: usize,
}

/// Writes each partition as a pretty JSON array into a directory.
pub struct JsonDirSink {
    dir: PathBuf,
}

impl JsonDirSink {
    pub fn new(dir: impl AsRef<Path>) -> OutputResult<Self> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    /// Remove every `REFERENCE_*.json` partition left in the directory.
    /// Other files (the manifest, anything foreign) are kept.
    pub fn clear_partitions(&self) -> OutputResult<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_partition = path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("REFERENCE_") && n.ends_with(".json"));
            if is_partition {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl PartitionSink for JsonDirSink {
    fn write_partition(&mut self, partition: &Partition) -> OutputResult<PartitionSummary> {
        let file = partition.file_name();
        let content = serde_json::to_string_pretty(&partition.records)?;
        fs::write(self.dir.join(&file), content)?;
        Ok(PartitionSummary {
            file,
            records: partition.records.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GovernedFields, LocalFields, MatchState};
    use tempfile::tempdir;

    fn record(id: &str, matched: bool) -> ReconciledRecord {
        ReconciledRecord {
            primary_id: id.into(),
            match_state: if matched {
                MatchState::Matched { external_id: id.into() }
            } else {
                MatchState::Unmatched
            },
            contributing_organizations: vec!["FB".into()],
            governed: GovernedFields::default(),
            local: LocalFields::default(),
            keywords: vec![],
            cross_references: vec![],
            journal: None,
            journal_ambiguous: false,
            journal_candidates: vec![],
            conflict_unresolved: false,
            content_fingerprint: "fp".into(),
        }
    }

    fn limits(n: usize) -> PartitionLimits {
        PartitionLimits { unmatched: n, matched: n, multi_source: n }
    }

    #[test]
    fn test_partitions_are_bounded() {
        let mut partitioner = Partitioner::new(limits(2));
        for i in 0..5 {
            let r = record(&format!("PMID:{}", i), true);
            partitioner.push(PartitionGroup::for_record("FB", &r), r);
        }
        let parts = partitioner.finish();
        let sizes: Vec<usize> = parts.iter().map(|p| p.records.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        let names: Vec<String> = parts.iter().map(Partition::file_name).collect();
        assert_eq!(
            names,
            vec!["REFERENCE_PUBMED_FB_1.json", "REFERENCE_PUBMED_FB_2.json", "REFERENCE_PUBMED_FB_3.json"]
        );
    }

    #[test]
    fn test_groups_are_separate() {
        let mut partitioner = Partitioner::new(limits(10));
        partitioner.push(PartitionGroup::Unmatched("FB".into()), record("FB:FBrf1", false));
        partitioner.push(PartitionGroup::Matched("FB".into()), record("PMID:1", true));
        partitioner.push(PartitionGroup::MultiSource, record("PMID:2", true));
        let mut names: Vec<String> = partitioner.finish().iter().map(Partition::file_name).collect();
        names.sort();
        assert_eq!(
            names,
            vec!["REFERENCE_PUBMED_FB_1.json", "REFERENCE_PUBMED_MULTI_1.json", "REFERENCE_PUBMOD_FB_1.json"]
        );
    }

    #[test]
    fn test_json_dir_sink() {
        let dir = tempdir().unwrap();
        let mut sink = JsonDirSink::new(dir.path().join("out")).unwrap();
        let mut partitioner = Partitioner::new(limits(10));
        partitioner.push(PartitionGroup::MultiSource, record("PMID:2", true));
        let part = partitioner.finish().remove(0);

        let summary = sink.write_partition(&part).unwrap();
        assert_eq!(summary.records, 1);
        let text = fs::read_to_string(dir.path().join("out").join(&summary.file)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value[0]["primaryId"], "PMID:2");
        assert_eq!(value[0]["matchState"]["state"], "matched");
    }

    #[test]
    fn test_clear_partitions_keeps_other_files() {
        let dir = tempdir().unwrap();
        let sink = JsonDirSink::new(dir.path()).unwrap();
        fs::write(dir.path().join("REFERENCE_PUBMOD_SGD_1.json"), "[]").unwrap();
        fs::write(dir.path().join("REFERENCE_PUBMED_MULTI_2.json"), "[]").unwrap();
        fs::write(dir.path().join("manifest.json"), "{}").unwrap();

        assert_eq!(sink.clear_partitions().unwrap(), 2);
        let left: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(left, vec!["manifest.json"]);
    }
}
