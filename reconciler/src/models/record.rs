//! Reconciled output records.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::{Author, CrossReference, MeshTerm, ModReferenceType, Tag};

/// Whether the record was reconciled against an authoritative record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum MatchState {
    Unmatched,
    Matched {
        #[serde(rename = "externalId")]
        external_id: String,
    },
}

impl MatchState {
    pub fn is_matched(&self) -> bool {
        matches!(self, MatchState::Matched { .. })
    }

    pub fn external_id(&self) -> Option<&str> {
        match self {
            MatchState::Matched { external_id } => Some(external_id),
            MatchState::Unmatched => None,
        }
    }
}

/// Author with rank and flags always set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledAuthor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub author_rank: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    pub corresponding_author: bool,
    pub first_author: bool,
    #[serde(flatten)]
    pub additional: BTreeMap<String, Value>,
}

impl ReconciledAuthor {
    /// Rank and flag a list of authors.
    ///
    /// Explicit ranks are kept only when every author carries one; otherwise
    /// the whole list is ranked by position, starting at 1.
    pub fn rank_all(authors: Vec<Author>) -> Vec<ReconciledAuthor> {
        let fully_ranked = authors.iter().all(|a| a.author_rank.is_some());
        authors
            .into_iter()
            .enumerate()
            .map(|(index, author)| {
                let position = u32::try_from(index + 1).unwrap_or(u32::MAX);
                ReconciledAuthor {
                    name: author.name,
                    first_name: author.first_name,
                    last_name: author.last_name,
                    author_rank: if fully_ranked {
                        author.author_rank.unwrap_or(position)
                    } else {
                        position
                    },
                    reference_id: author.reference_id,
                    corresponding_author: author.corresponding_author.unwrap_or(false),
                    first_author: author.first_author.unwrap_or(false),
                    additional: author.additional,
                }
            })
            .collect()
    }
}

/// Fields the authoritative source governs for matched records.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernedFields {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<ReconciledAuthor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_published: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_arrived_in_pubmed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_last_modified: Option<String>,
    #[serde(rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pub_med_type: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mesh_terms: Vec<MeshTerm>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plain_language_abstract: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pubmed_abstract_languages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_status: Option<String>,
}

/// Organization-owned fields, never overridden by the authoritative source.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct LocalFields {
    #[serde(rename = "allianceCategory", skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(rename = "MODReferenceTypes", skip_serializing_if = "Vec::is_empty")]
    pub mod_reference_types: Vec<ModReferenceType>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    #[serde(rename = "resourceAbbreviation", skip_serializing_if = "Option::is_none")]
    pub resource_abbreviation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citation: Option<String>,
    #[serde(flatten)]
    pub additional: BTreeMap<String, Value>,
}

/// How a journal reference was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// Catalog reference carried by the authoritative record.
    Authoritative,
    /// Organization ISSN evidence.
    IssnEvidence,
    /// Canonical catalog text match.
    Canonical,
    /// Organization-local journal catalog.
    Local,
}

/// Resolved journal of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JournalRef {
    pub id: String,
    pub source: ResolutionSource,
}

/// One canonical record per publication, written to the partitions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledRecord {
    pub primary_id: String,
    pub match_state: MatchState,
    /// Organizations whose submissions went into this record, sorted.
    pub contributing_organizations: Vec<String>,

    #[serde(flatten)]
    pub governed: GovernedFields,
    #[serde(flatten)]
    pub local: LocalFields,

    /// Union of organization and authoritative keywords.
    pub keywords: Vec<String>,
    pub cross_references: Vec<CrossReference>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal: Option<JournalRef>,
    pub journal_ambiguous: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub journal_candidates: Vec<String>,

    pub conflict_unresolved: bool,
    pub content_fingerprint: String,
}

impl ReconciledRecord {
    pub fn is_matched(&self) -> bool {
        self.match_state.is_matched()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author(name: &str, rank: Option<u32>) -> Author {
        Author {
            name: Some(name.to_string()),
            author_rank: rank,
            ..Author::default()
        }
    }

    #[test]
    fn test_rank_by_position_when_missing() {
        let ranked = ReconciledAuthor::rank_all(vec![author("A", None), author("B", None)]);
        assert_eq!(ranked[0].author_rank, 1);
        assert_eq!(ranked[1].author_rank, 2);
        assert!(!ranked[0].corresponding_author);
        assert!(!ranked[1].first_author);
    }

    #[test]
    fn test_explicit_ranks_kept() {
        let ranked = ReconciledAuthor::rank_all(vec![author("A", Some(2)), author("B", Some(1))]);
        assert_eq!(ranked[0].author_rank, 2);
        assert_eq!(ranked[1].author_rank, 1);
    }

    #[test]
    fn test_partial_ranks_reassigned() {
        let ranked = ReconciledAuthor::rank_all(vec![author("A", Some(5)), author("B", None)]);
        assert_eq!(ranked[0].author_rank, 1);
        assert_eq!(ranked[1].author_rank, 2);
    }

    #[test]
    fn test_match_state_serialization() {
        let state = MatchState::Matched { external_id: "PMID:1001".into() };
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["state"], "matched");
        assert_eq!(value["externalId"], "PMID:1001");
        assert_eq!(state.external_id(), Some("PMID:1001"));
    }
}
