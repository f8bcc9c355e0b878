//! Cross-reference sanitizing.
//!
//! Runs on every submission before anything else:
//!
//! 1. split every id (a malformed id rejects the record)
//! 2. collapse exact duplicates, unioning their pages
//! 3. page checks (multiple pages, missing pages)
//! 4. promote a unique authoritative cross-reference tagged only with the
//!    authoritative context to primary id
//! 5. drop excluded types, warn on unexpected types
//! 6. reject the record if a prefix still has more than one distinct value
//!
//! Sanitizing an already-sanitized list returns it unchanged.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};

use crate::config::PipelineConfig;
use crate::diagnostics::DiagnosticKind;
use crate::error::{RecordError, RecordResult};
use crate::identifier::{split_identifier, CompoundId};
use crate::models::CrossReference;

/// Everything up to the first digit, e.g. `WB:WBGene` for `WB:WBGene00001`.
static XREF_TYPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([^0-9]+)[0-9]").expect("valid xref type regex"));

/// Output of [`XrefSanitizer::sanitize`].
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizedXrefs {
    /// Primary id after promotion.
    pub primary_id: String,
    /// Submitted primary id, when it was replaced.
    pub promoted_from: Option<String>,
    /// Authoritative external id of the record, if any.
    pub external_id: Option<String>,
    pub cross_references: Vec<CrossReference>,
    pub warnings: Vec<DiagnosticKind>,
}

/// Cross-reference sanitizer configured from a [`PipelineConfig`].
#[derive(Debug, Clone)]
pub struct XrefSanitizer {
    expected: BTreeSet<String>,
    excluded: BTreeSet<String>,
    context_optional: Vec<String>,
    authoritative_prefix: String,
    authoritative_context: String,
}

impl XrefSanitizer {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            expected: config.xref.expected_set(),
            excluded: config.xref.excluded_set(),
            context_optional: config.xref.context_optional_prefixes.clone(),
            authoritative_prefix: config.authoritative_prefix.clone(),
            authoritative_context: config.authoritative_context.clone(),
        }
    }

    /// Lower-cased type key of an id, `None` if it has no digit.
    pub fn type_key(id: &str) -> Option<String> {
        XREF_TYPE.captures(id).map(|c| c[1].to_lowercase())
    }

    /// `PMID:<digits>` style id pointing at the authoritative source.
    pub fn is_external_id(&self, id: &CompoundId) -> bool {
        id.has_prefix(&self.authoritative_prefix)
            && !id.value.is_empty()
            && id.value.chars().all(|c| c.is_ascii_digit())
    }

    /// `PMID:<digits>` whatever prefix casing was submitted.
    fn canonical_external_id(&self, id: &CompoundId) -> String {
        CompoundId::colon(self.authoritative_prefix.as_str(), id.value.as_str()).to_string()
    }

    pub fn is_excluded(&self, id: &str) -> bool {
        Self::type_key(id).is_some_and(|key| self.excluded.contains(&key))
    }

    pub fn sanitize(&self, primary_id: &str, xrefs: &[CrossReference]) -> RecordResult<SanitizedXrefs> {
        let primary = split_identifier(primary_id)?;
        let mut warnings = Vec::new();

        if xrefs.is_empty() {
            warnings.push(DiagnosticKind::NoCrossReferences);
        }

        // Split and collapse exact duplicates.
        let mut unique: Vec<(CompoundId, CrossReference)> = Vec::with_capacity(xrefs.len());
        for xref in xrefs {
            let id = split_identifier(&xref.id)?;
            match unique.iter_mut().find(|(_, kept)| kept.id == xref.id) {
                Some((_, kept)) => {
                    for page in &xref.pages {
                        if !kept.pages.contains(page) {
                            kept.pages.push(page.clone());
                        }
                    }
                }
                None => unique.push((id, xref.clone())),
            }
        }

        for (id, xref) in &unique {
            if xref.pages.len() > 1 {
                warnings.push(DiagnosticKind::MultipleContextTags {
                    id: xref.id.clone(),
                    pages: xref.pages.clone(),
                });
            } else if xref.pages.is_empty() && !self.context_optional.iter().any(|p| id.has_prefix(p)) {
                warnings.push(DiagnosticKind::MissingContextTag { id: xref.id.clone() });
            }
        }

        let (primary_id, promoted_from) = if self.is_external_id(&primary) {
            (self.canonical_external_id(&primary), None)
        } else {
            let candidates: BTreeSet<String> = unique
                .iter()
                .filter(|(id, xref)| {
                    self.is_external_id(id)
                        && matches!(xref.pages.as_slice(), [page] if page == &self.authoritative_context)
                })
                .map(|(id, _)| self.canonical_external_id(id))
                .collect();
            match candidates.len() {
                1 => (
                    candidates.into_iter().next().unwrap_or_default(),
                    Some(primary_id.to_string()),
                ),
                _ => (primary_id.to_string(), None),
            }
        };

        let mut kept = Vec::with_capacity(unique.len());
        let mut values_by_prefix: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (id, xref) in unique {
            match Self::type_key(&xref.id) {
                Some(key) if self.excluded.contains(&key) => continue,
                Some(key) if self.expected.contains(&key) => {}
                _ => warnings.push(DiagnosticKind::UnrecognizedCrossReferenceType { id: xref.id.clone() }),
            }
            values_by_prefix.entry(id.prefix.clone()).or_default().insert(id.value.clone());
            kept.push(xref);
        }

        if let Some((prefix, values)) = values_by_prefix.into_iter().find(|(_, v)| v.len() > 1) {
            return Err(RecordError::TooManyIdentifiersForType {
                prefix,
                values: values.into_iter().collect(),
            });
        }

        let external_id = split_identifier(&primary_id)
            .ok()
            .filter(|id| self.is_external_id(id))
            .map(|id| self.canonical_external_id(&id));

        Ok(SanitizedXrefs {
            primary_id,
            promoted_from,
            external_id,
            cross_references: kept,
            warnings,
        })
    }
}

impl Default for XrefSanitizer {
    fn default() -> Self {
        Self::new(&PipelineConfig::default())
    }
}
