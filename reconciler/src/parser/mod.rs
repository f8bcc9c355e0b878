//! Input loading with encoding auto-detection.
//!
//! Payloads arrive from many curating organizations and not all of them are
//! UTF-8. Files are read as bytes, decoded, then parsed as JSON.
//!
//! - [`load_payload`] - `REFERENCE_<ORG>.json` (`{"data": [...]}` or a bare array)
//! - [`load_journal_catalog`] - canonical journal catalog
//! - [`load_local_journals`] - `RESOURCE_<ORG>.json`
//! - [`claims`] - claim index (external id -> organizations)
//! - [`authoritative`] - authoritative record store

pub mod authoritative;
pub mod claims;

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{LoadError, LoadResult};
use crate::models::{JournalIdentity, LocalJournal};

pub use authoritative::AuthoritativeStore;
pub use claims::ClaimIndex;

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes with the given encoding; unknown encodings decode as lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8_lossy(bytes).into_owned(),
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Decode bytes, detecting the encoding only when they are not valid UTF-8.
pub fn decode_auto(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            let bytes = e.into_bytes();
            let encoding = detect_encoding(&bytes);
            debug!(encoding = %encoding, "decoding non UTF-8 input");
            decode_content(&bytes, &encoding)
        }
    }
}

/// Read and parse a JSON file of any encoding.
pub fn read_json_file(path: &Path) -> LoadResult<Value> {
    let bytes = std::fs::read(path).map_err(|e| LoadError::io(path, e))?;
    let text = decode_auto(bytes);
    serde_json::from_str(text.trim_start_matches('\u{feff}')).map_err(|e| LoadError::json(path, e))
}

/// Entries of `{"data": [...]}` or of a bare array.
fn data_entries(path: &Path, value: Value) -> LoadResult<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(LoadError::json(
                path,
                <serde_json::Error as serde::de::Error>::custom("expected a \"data\" array"),
            )),
        },
        _ => Err(LoadError::json(
            path,
            <serde_json::Error as serde::de::Error>::custom("expected an array or an object"),
        )),
    }
}

/// Load an organization's submission payload.
///
/// A missing file means the organization submitted nothing this run.
pub fn load_payload(path: &Path) -> LoadResult<Option<Vec<Value>>> {
    if !path.exists() {
        debug!(path = %path.display(), "no payload");
        return Ok(None);
    }
    let value = read_json_file(path)?;
    data_entries(path, value).map(Some)
}

/// Deserialize entries one by one, skipping (and logging) bad ones.
fn typed_entries<T: DeserializeOwned>(path: &Path, entries: Vec<Value>) -> Vec<T> {
    entries
        .into_iter()
        .enumerate()
        .filter_map(|(i, entry)| match serde_json::from_value(entry) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(path = %path.display(), index = i, error = %e, "skipping malformed entry");
                None
            }
        })
        .collect()
}

/// Load the canonical journal catalog. Missing or unreadable is fatal.
pub fn load_journal_catalog(path: &Path) -> LoadResult<Vec<JournalIdentity>> {
    if !path.exists() {
        return Err(LoadError::Missing(path.to_path_buf()));
    }
    let value = read_json_file(path)?;
    let entries = data_entries(path, value)?;
    Ok(typed_entries(path, entries))
}

/// Load an organization's own journals; a missing file is an empty catalog.
pub fn load_local_journals(path: &Path) -> LoadResult<Vec<LocalJournal>> {
    match load_payload(path)? {
        Some(entries) => Ok(typed_entries(path, entries)),
        None => Ok(Vec::new()),
    }
}
