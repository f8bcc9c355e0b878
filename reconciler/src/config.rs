//! Pipeline configuration.
//!
//! Every value has a default matching the production layout, so an empty
//! JSON object is a valid configuration. Values can be overridden from a JSON
//! file ([`PipelineConfig::from_file`]) or from `LITMERGE_*` environment
//! variables ([`PipelineConfig::from_env`]).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

/// Default organizations, in processing order.
pub const DEFAULT_ORGANIZATIONS: &[&str] = &["RGD", "MGI", "SGD", "FB", "ZFIN", "WB", "XB"];

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    /// Input and output locations.
    pub paths: PathsConfig,

    /// Organizations to process, in order.
    pub organizations: Vec<String>,

    /// Prefix of the external identifier that points at the authoritative source.
    pub authoritative_prefix: String,

    /// Context tag marking a cross-reference as "this is the authoritative record".
    pub authoritative_context: String,

    /// Prefix of canonical journal identities (`NLM:8000640`).
    pub journal_id_prefix: String,

    /// Organizations that pack all keywords into the first list element.
    pub packed_keyword_organizations: Vec<String>,

    /// Cross-reference policy.
    pub xref: XrefPolicy,

    /// Partition size bounds.
    pub partitions: PartitionLimits,

    /// Fingerprint policy.
    pub fingerprint: FingerprintPolicy,

    /// Number of organizations reconciled concurrently.
    pub workers: usize,
}

/// Input and output locations, relative to `base_dir` unless absolute.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PathsConfig {
    pub base_dir: PathBuf,
    /// Directory with `REFERENCE_<ORG>.json` and `RESOURCE_<ORG>.json` payloads.
    pub submissions_dir: PathBuf,
    /// Directory with one `<value>.json` per authoritative record.
    pub authoritative_dir: PathBuf,
    /// Canonical journal catalog (JSON array).
    pub journal_catalog: PathBuf,
    pub output_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub fingerprint_dir: PathBuf,
    /// Claim index TSV written by the `claims` command.
    pub claim_index: PathBuf,
}

/// Which cross-reference types are expected, excluded, or allowed without context tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct XrefPolicy {
    /// Known cross-reference types, e.g. `PMID:` or `WB:WBPaper` (case-insensitive).
    pub expected_types: Vec<String>,
    /// Types dropped from records (case-insensitive).
    pub excluded_types: Vec<String>,
    /// Prefixes that need no context tag.
    pub context_optional_prefixes: Vec<String>,
}

/// Maximum number of records per output partition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartitionLimits {
    pub unmatched: usize,
    pub matched: usize,
    pub multi_source: usize,
}

/// Fields left out of the fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FingerprintPolicy {
    /// Never part of the fingerprint.
    pub ignored_fields: Vec<String>,
    /// Dropped from the fingerprint when the record is authoritative-matched.
    pub authoritative_fields: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            organizations: DEFAULT_ORGANIZATIONS.iter().map(|s| s.to_string()).collect(),
            authoritative_prefix: "PMID".to_string(),
            authoritative_context: "PubMed".to_string(),
            journal_id_prefix: "NLM".to_string(),
            packed_keyword_organizations: vec!["ZFIN".to_string()],
            xref: XrefPolicy::default(),
            partitions: PartitionLimits::default(),
            fingerprint: FingerprintPolicy::default(),
            workers: 4,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            submissions_dir: PathBuf::from("dqm_data"),
            authoritative_dir: PathBuf::from("pubmed_json"),
            journal_catalog: PathBuf::from("pubmed_resource_json/resource_pubmed_all.json"),
            output_dir: PathBuf::from("sanitized_reference_json"),
            reports_dir: PathBuf::from("report_files"),
            fingerprint_dir: PathBuf::from("fingerprints"),
            claim_index: PathBuf::from("pmids_by_mods"),
        }
    }
}

impl Default for XrefPolicy {
    fn default() -> Self {
        let strings = |v: &[&str]| v.iter().map(|s| s.to_string()).collect();
        Self {
            expected_types: strings(&[
                "PMID:", "PMCID:PMC", "DOI:", "DOI:/S", "DOI:IJIv", "WB:WBPaper", "SGD:S", "RGD:",
                "MGI:", "ISBN:", "FB:FBrf", "ZFIN:ZDB-PUB-", "Xenbase:XB-ART-", "NLM:", "ISSN:",
            ]),
            excluded_types: strings(&[
                "WB:WBTransgene",
                "WB:WBGene",
                "WB:WBVar",
                "Xenbase:XB-GENEPAGE-",
            ]),
            context_optional_prefixes: strings(&["DOI", "PMID", "PMC", "PMCID", "ISBN"]),
        }
    }
}

impl Default for PartitionLimits {
    fn default() -> Self {
        Self {
            unmatched: 50_000,
            matched: 50_000,
            multi_source: 100_000,
        }
    }
}

impl Default for FingerprintPolicy {
    fn default() -> Self {
        let strings = |v: &[&str]| v.iter().map(|s| s.to_string()).collect();
        Self {
            ignored_fields: strings(&["dateLastModified", "issueDate", "citation", "keywords", "tags"]),
            authoritative_fields: strings(&[
                "authors",
                "volume",
                "title",
                "pages",
                "issueName",
                "issueDate",
                "datePublished",
                "dateArrivedInPubmed",
                "dateLastModified",
                "abstract",
                "pubMedType",
                "publisher",
                "meshTerms",
                "plainLanguageAbstract",
                "pubmedAbstractLanguages",
                "publicationStatus",
            ]),
        }
    }
}

impl XrefPolicy {
    pub fn expected_set(&self) -> BTreeSet<String> {
        self.expected_types.iter().map(|t| t.to_lowercase()).collect()
    }

    pub fn excluded_set(&self) -> BTreeSet<String> {
        self.excluded_types.iter().map(|t| t.to_lowercase()).collect()
    }

    pub fn context_optional(&self, prefix: &str) -> bool {
        self.context_optional_prefixes
            .iter()
            .any(|p| p.eq_ignore_ascii_case(prefix))
    }
}

impl PathsConfig {
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn submissions_dir(&self) -> PathBuf {
        self.resolve(&self.submissions_dir)
    }

    pub fn authoritative_dir(&self) -> PathBuf {
        self.resolve(&self.authoritative_dir)
    }

    pub fn journal_catalog(&self) -> PathBuf {
        self.resolve(&self.journal_catalog)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.output_dir)
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.resolve(&self.reports_dir)
    }

    pub fn fingerprint_dir(&self) -> PathBuf {
        self.resolve(&self.fingerprint_dir)
    }

    pub fn claim_index(&self) -> PathBuf {
        self.resolve(&self.claim_index)
    }

    /// `REFERENCE_<ORG>.json`
    pub fn submission_file(&self, organization: &str) -> PathBuf {
        self.submissions_dir()
            .join(format!("REFERENCE_{}.json", organization))
    }

    /// `RESOURCE_<ORG>.json`
    pub fn local_journal_file(&self, organization: &str) -> PathBuf {
        self.submissions_dir()
            .join(format!("RESOURCE_{}.json", organization))
    }
}

impl PipelineConfig {
    /// Read a JSON configuration file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Defaults overridden by `LITMERGE_*` environment variables.
    ///
    /// Recognized: `LITMERGE_BASE_DIR`, `LITMERGE_ORGANIZATIONS` (comma separated),
    /// `LITMERGE_WORKERS`, `LITMERGE_PARTITION_SIZE`, `LITMERGE_MULTI_PARTITION_SIZE`.
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::default().with_env_overrides()
    }

    /// Apply `LITMERGE_*` overrides on top of `self`.
    pub fn with_env_overrides(mut self) -> Result<Self, PipelineError> {
        if let Ok(dir) = std::env::var("LITMERGE_BASE_DIR") {
            self.paths.base_dir = PathBuf::from(dir);
        }
        if let Ok(orgs) = std::env::var("LITMERGE_ORGANIZATIONS") {
            self.organizations = orgs
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(workers) = env_usize("LITMERGE_WORKERS")? {
            self.workers = workers.max(1);
        }
        if let Some(size) = env_usize("LITMERGE_PARTITION_SIZE")? {
            self.partitions.matched = size.max(1);
            self.partitions.unmatched = size.max(1);
        }
        if let Some(size) = env_usize("LITMERGE_MULTI_PARTITION_SIZE")? {
            self.partitions.multi_source = size.max(1);
        }
        Ok(self)
    }

    /// Restrict the run to one organization.
    pub fn only_organization(mut self, organization: &str) -> Self {
        self.organizations = vec![organization.to_string()];
        self
    }
}

fn env_usize(key: &str) -> Result<Option<usize>, PipelineError> {
    match std::env::var(key) {
        Ok(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| PipelineError::Config(format!("{} must be a positive integer, got '{}'", key, v))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.authoritative_prefix, "PMID");
        assert_eq!(config.organizations.first().map(String::as_str), Some("RGD"));
        assert_eq!(config.partitions.multi_source, 100_000);
        assert!(config.xref.excluded_set().contains("wb:wbgene"));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "organizations": ["WB"], "partitions": { "matched": 10 } }"#).unwrap();
        assert_eq!(config.organizations, vec!["WB"]);
        assert_eq!(config.partitions.matched, 10);
        assert_eq!(config.partitions.unmatched, 50_000);
        assert_eq!(config.journal_id_prefix, "NLM");
    }

    #[test]
    fn test_paths_resolve_against_base_dir() {
        let mut paths = PathsConfig::default();
        paths.base_dir = PathBuf::from("/data");
        assert_eq!(paths.submission_file("WB"), PathBuf::from("/data/dqm_data/REFERENCE_WB.json"));
        assert_eq!(paths.output_dir(), PathBuf::from("/data/sanitized_reference_json"));
    }

    #[test]
    fn test_context_optional_is_case_insensitive() {
        let policy = XrefPolicy::default();
        assert!(policy.context_optional("doi"));
        assert!(!policy.context_optional("WB"));
    }
}
