//! Fingerprint Registry - Persist content fingerprints between runs
//!
//! One JSON file per organization (`<ORG>_fingerprints.json`) maps submitted
//! primary ids to the fingerprint of their last emitted content. Runs read an
//! immutable [`FingerprintSnapshot`] before any worker starts and commit new
//! fingerprints only after the partitions were written.

pub mod fingerprint;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::StoreResult;

pub use fingerprint::{canonical_json, hash_canonical_json_hex, Fingerprinter};

const FILE_SUFFIX: &str = "_fingerprints.json";

/// On-disk form of one organization's fingerprints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFingerprints {
    pub organization: String,
    /// RFC 3339 timestamp of the last commit.
    pub updated_at: String,
    pub entries: BTreeMap<String, String>,
}

/// Read-only view of all fingerprints, shared by workers.
#[derive(Debug, Clone, Default)]
pub struct FingerprintSnapshot {
    by_organization: HashMap<String, BTreeMap<String, String>>,
}

impl FingerprintSnapshot {
    pub fn get(&self, organization: &str, primary_id: &str) -> Option<&str> {
        self.by_organization
            .get(organization)
            .and_then(|entries| entries.get(primary_id))
            .map(String::as_str)
    }

    /// True when no fingerprint is stored or it differs.
    pub fn has_changed(&self, organization: &str, primary_id: &str, fingerprint: &str) -> bool {
        self.get(organization, primary_id) != Some(fingerprint)
    }

    pub fn insert(&mut self, organization: &str, primary_id: &str, fingerprint: &str) {
        self.by_organization
            .entry(organization.to_string())
            .or_default()
            .insert(primary_id.to_string(), fingerprint.to_string());
    }

    pub fn len(&self) -> usize {
        self.by_organization.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One fingerprint waiting to be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFingerprint {
    pub organization: String,
    pub primary_id: String,
    pub fingerprint: String,
}

/// Key-value persistence for fingerprints.
pub trait FingerprintStore: Send {
    /// Current contents, copied out for the workers.
    fn snapshot(&self) -> FingerprintSnapshot;

    /// Record fingerprints and persist them.
    fn commit(&mut self, pending: &[PendingFingerprint]) -> StoreResult<()>;
}

/// Disk-backed fingerprint store.
pub struct FingerprintRegistry {
    registry_dir: PathBuf,
    snapshot: FingerprintSnapshot,
}

impl FingerprintRegistry {
    /// Open a registry directory, loading every `<ORG>_fingerprints.json`.
    ///
    /// A missing directory is an empty snapshot. A corrupt file is skipped
    /// with a warning, which makes its organization re-emit everything.
    pub fn with_dir(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let mut registry = Self {
            registry_dir: dir.as_ref().to_path_buf(),
            snapshot: FingerprintSnapshot::default(),
        };
        registry.load_all()?;
        Ok(registry)
    }

    fn load_all(&mut self) -> StoreResult<()> {
        if !self.registry_dir.exists() {
            return Ok(());
        }

        for entry in fs::read_dir(&self.registry_dir)?.flatten() {
            let path = entry.path();
            let is_snapshot = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(FILE_SUFFIX));
            if !is_snapshot {
                continue;
            }

            let content = fs::read_to_string(&path)?;
            match serde_json::from_str::<StoredFingerprints>(&content) {
                Ok(stored) => {
                    debug!(organization = %stored.organization, count = stored.entries.len(), "loaded fingerprints");
                    for (id, fp) in &stored.entries {
                        self.snapshot.insert(&stored.organization, id, fp);
                    }
                }
                Err(e) => warn!(path = %path.display(), error = %e, "ignoring corrupt fingerprint file"),
            }
        }
        Ok(())
    }

    fn file_for(&self, organization: &str) -> PathBuf {
        self.registry_dir.join(format!("{}{}", organization, FILE_SUFFIX))
    }

    fn save(&self, organization: &str) -> StoreResult<()> {
        fs::create_dir_all(&self.registry_dir)?;

        let stored = StoredFingerprints {
            organization: organization.to_string(),
            updated_at: Utc::now().to_rfc3339(),
            entries: self
                .snapshot
                .by_organization
                .get(organization)
                .cloned()
                .unwrap_or_default(),
        };

        // Write then rename.
        let path = self.file_for(organization);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&stored)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl FingerprintStore for FingerprintRegistry {
    fn snapshot(&self) -> FingerprintSnapshot {
        self.snapshot.clone()
    }

    fn commit(&mut self, pending: &[PendingFingerprint]) -> StoreResult<()> {
        let mut touched: Vec<&str> = Vec::new();
        for p in pending {
            self.snapshot.insert(&p.organization, &p.primary_id, &p.fingerprint);
            if !touched.contains(&p.organization.as_str()) {
                touched.push(&p.organization);
            }
        }
        for organization in touched {
            self.save(organization)?;
        }
        Ok(())
    }
}
