//! JSON Schema validation for submission entries.
//!
//! The submission schema (draft 7) is embedded at compile time from
//! `schemas/reference-submission.json`. Schema problems never reject a
//! record: the pipeline reports them as warnings and lets deserialization
//! decide whether the entry is usable.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use litmerge::validation::{is_valid_submission, unexpected_properties};
//!
//! let entry = json!({ "primaryId": "FB:FBrf0001", "title": "Gene X", "colour": "blue" });
//! assert!(is_valid_submission(&entry));
//! assert_eq!(unexpected_properties(&entry), vec!["colour".to_string()]);
//! ```

use jsonschema::Validator;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::BTreeSet;

use crate::diagnostics::DiagnosticKind;

const SUBMISSION_SCHEMA: &str = include_str!("../../schemas/reference-submission.json");

static SCHEMA: Lazy<Value> =
    Lazy::new(|| serde_json::from_str(SUBMISSION_SCHEMA).expect("Invalid embedded schema"));

static VALIDATOR: Lazy<Validator> =
    Lazy::new(|| jsonschema::draft7::new(&SCHEMA).expect("Invalid embedded schema"));

static KNOWN_PROPERTIES: Lazy<BTreeSet<String>> = Lazy::new(|| {
    SCHEMA
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| props.keys().cloned().collect())
        .unwrap_or_default()
});

/// Validate a submission entry against the embedded schema.
pub fn validate_submission(data: &Value) -> Result<(), Vec<String>> {
    let errors: Vec<String> = VALIDATOR.iter_errors(data).map(|e| e.to_string()).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn is_valid_submission(data: &Value) -> bool {
    VALIDATOR.is_valid(data)
}

/// Top-level keys the submission schema does not describe, sorted.
pub fn unexpected_properties(data: &Value) -> Vec<String> {
    let Some(object) = data.as_object() else {
        return Vec::new();
    };
    let mut names: Vec<String> = object
        .keys()
        .filter(|k| !KNOWN_PROPERTIES.contains(k.as_str()))
        .cloned()
        .collect();
    names.sort();
    names
}

/// Schema violations and unknown properties as warning diagnostics.
pub fn submission_diagnostics(data: &Value) -> Vec<DiagnosticKind> {
    let mut out: Vec<DiagnosticKind> = unexpected_properties(data)
        .into_iter()
        .map(|name| DiagnosticKind::UnexpectedProperty { name })
        .collect();
    if let Err(errors) = validate_submission(data) {
        out.extend(errors.into_iter().map(|message| DiagnosticKind::SchemaViolation { message }));
    }
    out
}
