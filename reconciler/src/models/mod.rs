//! Domain models for the litmerge pipeline.
//!
//! Input side:
//!
//! - [`RawSubmission`] - One organization's claim about one publication
//! - [`AuthoritativeRecord`] - Authoritative metadata for one external id
//! - [`JournalIdentity`] / [`LocalJournal`] - Canonical and organization-local venues
//!
//! Output side lives in [`record`]: [`ReconciledRecord`] and its parts.
//!
//! Submitted payloads are messy, so string fields go through lenient
//! deserializers: blank strings become `None`, numbers become strings, and
//! list fields accept a bare string.

pub mod record;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub use record::{
    GovernedFields, JournalRef, LocalFields, MatchState, ReconciledAuthor, ReconciledRecord,
    ResolutionSource,
};

// =============================================================================
// Cross References
// =============================================================================

/// A compound identifier attached to a record, with optional context tags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CrossReference {
    pub id: String,
    /// Context ("page") tags, e.g. `["PubMed"]` or `["reference"]`.
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "string_or_list")]
    pub pages: Vec<String>,
}

impl CrossReference {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), pages: Vec::new() }
    }

    pub fn with_page(mut self, page: impl Into<String>) -> Self {
        self.pages.push(page.into());
        self
    }
}

// =============================================================================
// Authors
// =============================================================================

/// An author as submitted by an organization or the authoritative source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, alias = "firstname", deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, alias = "lastname", deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_rank", skip_serializing_if = "Option::is_none")]
    pub author_rank: Option<u32>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corresponding_author: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_author: Option<bool>,
    /// ORCID, affiliations and anything else.
    #[serde(flatten)]
    pub additional: BTreeMap<String, Value>,
}

/// MeSH-style subject term.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MeshTerm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh_heading_term: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh_qualifier_term: Option<String>,
}

/// Organization-specific reference type, e.g. `{"referenceType": "Journal", "source": "WB"}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub struct ModReferenceType {
    pub reference_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Organization-category tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub tag_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_source: Option<String>,
}

// =============================================================================
// Raw Submission
// =============================================================================

/// One organization's claim about one publication.
///
/// Never mutated by the pipeline; every stage builds new values from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawSubmission {
    /// Set by the loader, not part of the payload.
    #[serde(skip)]
    pub organization_id: String,

    pub primary_id: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cross_references: Vec<CrossReference>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<Author>,

    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub pages: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub issue_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub issue_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub date_published: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub date_arrived_in_pubmed: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub date_last_modified: Option<String>,
    #[serde(rename = "abstract", default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(default, deserialize_with = "string_or_list", skip_serializing_if = "Vec::is_empty")]
    pub pub_med_type: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mesh_terms: Vec<MeshTerm>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub plain_language_abstract: Option<String>,
    #[serde(default, deserialize_with = "string_or_list", skip_serializing_if = "Vec::is_empty")]
    pub pubmed_abstract_languages: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub publication_status: Option<String>,

    /// `None` when the payload has no `keywords` key at all.
    #[serde(default, deserialize_with = "optional_string_list", skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,

    /// Category / classification, single-valued.
    #[serde(rename = "allianceCategory", default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(rename = "MODReferenceTypes", default, skip_serializing_if = "Vec::is_empty")]
    pub mod_reference_types: Vec<ModReferenceType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub resource_abbreviation: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub citation: Option<String>,

    /// Free-form fields the authoritative source never carries.
    #[serde(flatten)]
    pub additional: BTreeMap<String, Value>,
}

impl RawSubmission {
    /// Deserialize a payload entry for `organization_id`.
    pub fn from_value(organization_id: &str, value: Value) -> Result<Self, serde_json::Error> {
        let mut submission: RawSubmission = serde_json::from_value(value)?;
        submission.organization_id = organization_id.to_string();
        Ok(submission)
    }
}

// =============================================================================
// Authoritative Record
// =============================================================================

/// Date split into parts by the authoritative source.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct PubDate {
    pub date_string: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day: Option<String>,
}

impl<'de> Deserialize<'de> for PubDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Parts {
            #[serde(default)]
            date_string: Option<String>,
            #[serde(default, deserialize_with = "lenient_string")]
            year: Option<String>,
            #[serde(default, deserialize_with = "lenient_string")]
            month: Option<String>,
            #[serde(default, deserialize_with = "lenient_string")]
            day: Option<String>,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Parts(Parts),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Text(date_string) => PubDate { date_string, ..PubDate::default() },
            Repr::Parts(p) => {
                let date_string = p.date_string.unwrap_or_else(|| {
                    [&p.year, &p.month, &p.day]
                        .iter()
                        .filter_map(|part| part.as_deref())
                        .collect::<Vec<_>>()
                        .join("-")
                });
                PubDate { date_string, year: p.year, month: p.month, day: p.day }
            }
        })
    }
}

/// Authoritative metadata for one external identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AuthoritativeRecord {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<Author>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub pages: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub issue_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub issue_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub date_published: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_arrived_in_pubmed: Option<PubDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_last_modified: Option<PubDate>,
    #[serde(rename = "abstract", default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(default, deserialize_with = "string_or_list", skip_serializing_if = "Vec::is_empty")]
    pub pub_med_type: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mesh_terms: Vec<MeshTerm>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub plain_language_abstract: Option<String>,
    #[serde(default, deserialize_with = "string_or_list", skip_serializing_if = "Vec::is_empty")]
    pub pubmed_abstract_languages: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub publication_status: Option<String>,
    #[serde(default, deserialize_with = "string_or_list", skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cross_references: Vec<CrossReference>,
    /// Journal catalog number, without prefix.
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub nlm: Option<String>,
    #[serde(rename = "is_journal", default, skip_serializing_if = "Option::is_none")]
    pub is_journal: Option<bool>,
}

// =============================================================================
// Journals
// =============================================================================

/// Canonical venue record from the authoritative journal catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct JournalIdentity {
    /// Canonical id, e.g. `NLM:0372516`.
    pub primary_id: String,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub nlm: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub iso_abbreviation: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub medline_abbreviation: Option<String>,
    #[serde(rename = "printISSN", default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub print_issn: Option<String>,
    #[serde(rename = "onlineISSN", default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub online_issn: Option<String>,
    #[serde(rename = "abbreviationSynonyms", default, deserialize_with = "string_or_list", skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl JournalIdentity {
    /// Every text an abbreviation may be matched against.
    pub fn match_texts(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_id.as_str())
            .chain(self.nlm.as_deref())
            .chain(self.title.as_deref())
            .chain(self.iso_abbreviation.as_deref())
            .chain(self.medline_abbreviation.as_deref())
            .chain(self.print_issn.as_deref())
            .chain(self.online_issn.as_deref())
            .chain(self.aliases.iter().map(String::as_str))
    }

    pub fn issns(&self) -> impl Iterator<Item = &str> {
        self.print_issn.as_deref().into_iter().chain(self.online_issn.as_deref())
    }
}

/// A journal an organization submitted in its own resource file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LocalJournal {
    #[serde(flatten)]
    pub identity: JournalIdentity,
    /// `ISSN:` entries here are the organization's ISSN evidence.
    #[serde(default)]
    pub cross_references: Vec<CrossReference>,
}

// =============================================================================
// Lenient deserializers
// =============================================================================

fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Blank strings and nulls become `None`, numbers become strings.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(value_to_string))
}

/// Accepts a list, a single string, or null.
fn string_or_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(optional_string_list(deserializer)?.unwrap_or_default())
}

fn optional_string_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Vec<String>>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::Array(items)) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    other => value_to_string(other),
                })
                .collect(),
        ),
        Some(other) => Some(value_to_string(other).into_iter().collect()),
    })
}

/// Ranks arrive as numbers or numeric strings.
fn lenient_rank<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_submission_blank_fields_are_absent() {
        let sub = RawSubmission::from_value(
            "WB",
            json!({
                "primaryId": "WB:WBPaper00000003",
                "title": "  ",
                "volume": 12,
                "crossReferences": [{ "id": "PMID:1001", "pages": ["PubMed"] }]
            }),
        )
        .unwrap();

        assert_eq!(sub.organization_id, "WB");
        assert_eq!(sub.title, None);
        assert_eq!(sub.volume.as_deref(), Some("12"));
        assert_eq!(sub.cross_references[0].pages, vec!["PubMed"]);
        assert_eq!(sub.keywords, None);
    }

    #[test]
    fn test_submission_keeps_unknown_fields() {
        let sub = RawSubmission::from_value(
            "SGD",
            json!({ "primaryId": "SGD:S1", "language": "English", "allianceCategory": "Research Article" }),
        )
        .unwrap();
        assert_eq!(sub.category.as_deref(), Some("Research Article"));
        assert_eq!(sub.additional.get("language"), Some(&json!("English")));
    }

    #[test]
    fn test_author_aliases_and_rank() {
        let author: Author =
            serde_json::from_value(json!({ "name": "Brun J", "firstname": "J", "authorRank": "2" })).unwrap();
        assert_eq!(author.first_name.as_deref(), Some("J"));
        assert_eq!(author.author_rank, Some(2));
    }

    #[test]
    fn test_pub_date_from_parts_and_text() {
        let parts: PubDate = serde_json::from_value(json!({ "year": "2020", "month": "01", "day": "05" })).unwrap();
        assert_eq!(parts.date_string, "2020-01-05");

        let text: PubDate = serde_json::from_value(json!("2019-12-31")).unwrap();
        assert_eq!(text.date_string, "2019-12-31");
        assert_eq!(text.year, None);
    }

    #[test]
    fn test_journal_match_texts() {
        let journal: JournalIdentity = serde_json::from_value(json!({
            "primaryId": "NLM:0372516",
            "title": "Journal of Cell Biology",
            "medlineAbbreviation": "J Cell Biol",
            "printISSN": "0021-9525",
            "abbreviationSynonyms": ["JCB"]
        }))
        .unwrap();
        let texts: Vec<&str> = journal.match_texts().collect();
        assert!(texts.contains(&"J Cell Biol"));
        assert!(texts.contains(&"JCB"));
        assert_eq!(journal.issns().collect::<Vec<_>>(), vec!["0021-9525"]);
    }
}
