//! Authoritative record store.
//!
//! Filled once in the fetch phase from a directory holding one
//! `<value>.json` per external id (`1001.json` for `PMID:1001`). A missing
//! file is an absent record, which is an expected state.

use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{LoadError, LoadResult};
use crate::identifier::try_split_identifier;
use crate::models::AuthoritativeRecord;
use crate::parser::read_json_file;

#[derive(Debug, Clone, Default)]
pub struct AuthoritativeStore {
    records: HashMap<String, AuthoritativeRecord>,
}

impl AuthoritativeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the records for `external_ids` from `dir`.
    ///
    /// An unreadable directory is an error; a malformed file is logged and
    /// treated as absent.
    pub fn load<'a>(dir: &Path, external_ids: impl IntoIterator<Item = &'a str>) -> LoadResult<Self> {
        let mut store = Self::new();
        let mut ids = external_ids.into_iter().peekable();
        if ids.peek().is_none() {
            return Ok(store);
        }

        std::fs::read_dir(dir).map_err(|e| LoadError::io(dir, e))?;

        let mut missing = 0usize;
        for external_id in ids {
            let Some(id) = try_split_identifier(external_id) else {
                continue;
            };
            let path = dir.join(format!("{}.json", id.value));
            if !path.exists() {
                missing += 1;
                continue;
            }
            let parsed = read_json_file(&path).and_then(|value| {
                serde_json::from_value::<AuthoritativeRecord>(value).map_err(|e| LoadError::json(&path, e))
            });
            match parsed {
                Ok(record) => {
                    store.records.insert(external_id.to_string(), record);
                }
                Err(e) => warn!(external_id = external_id, error = %e, "unusable authoritative record"),
            }
        }

        debug!(loaded = store.records.len(), missing, "authoritative records fetched");
        Ok(store)
    }

    pub fn get(&self, external_id: &str) -> Option<&AuthoritativeRecord> {
        self.records.get(external_id)
    }

    pub fn insert(&mut self, external_id: impl Into<String>, record: AuthoritativeRecord) {
        self.records.insert(external_id.into(), record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
