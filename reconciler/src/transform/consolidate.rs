//! Merge records several organizations submitted for the same external id.
//!
//! # Architecture
//!
//! ```text
//! Reconciled per organization         →  One consolidated record
//! ┌─────────────────────────────┐       ┌──────────────────────────────┐
//! │ PMID:2002  FB  research_art │       │ PMID:2002                    │
//! │ PMID:2002  WB  review       │  →    │ organizations: [FB, WB]      │
//! │ PMID:3003  SGD ...          │       │ category: research_art (!)   │
//! └─────────────────────────────┘       ├──────────────────────────────┤
//!                                       │ PMID:3003 ...                │
//!                                       └──────────────────────────────┘
//! ```
//!
//! List fields are unioned. Single-valued organization fields that disagree
//! are reported once per (organization, field, value); the first non-empty
//! value in sorted organization-id order wins and the record is flagged
//! `conflictUnresolved`.

use std::collections::{BTreeMap, BTreeSet};

use crate::cache::Fingerprinter;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::identifier::try_split_identifier;
use crate::models::{CrossReference, ReconciledRecord};
use crate::transform::reconciler::merge_keywords;

/// One organization's reconciled record for a multi-organization external id.
#[derive(Debug, Clone)]
pub struct Contribution {
    pub organization: String,
    /// Primary id as submitted, the fingerprint key.
    pub submitted_id: String,
    pub fingerprint: String,
    /// Fingerprint differs from the previous run.
    pub changed: bool,
    pub record: ReconciledRecord,
}

/// Output of consolidation for one external id.
#[derive(Debug, Clone)]
pub struct Consolidated {
    pub record: ReconciledRecord,
    pub conflicts: Vec<Diagnostic>,
    /// At least one contribution changed since the previous run.
    pub changed: bool,
    /// `(organization, submitted id, fingerprint)` of every contributor.
    pub fingerprints: Vec<(String, String, String)>,
}

/// Consolidate all contributions, grouped by external id.
pub fn consolidate_all(contributions: Vec<Contribution>) -> Vec<Consolidated> {
    let mut groups: BTreeMap<String, ConsolidationBuilder> = BTreeMap::new();

    for contribution in contributions {
        let external_id = contribution
            .record
            .match_state
            .external_id()
            .unwrap_or(&contribution.record.primary_id)
            .to_string();
        groups
            .entry(external_id.clone())
            .or_insert_with(|| ConsolidationBuilder::new(external_id))
            .add(contribution);
    }

    groups
        .into_values()
        .filter_map(ConsolidationBuilder::build)
        .collect()
}

/// Builder accumulating contributions for one external id.
pub struct ConsolidationBuilder {
    external_id: String,
    contributions: Vec<Contribution>,
}

impl ConsolidationBuilder {
    pub fn new(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            contributions: Vec::new(),
        }
    }

    pub fn add(&mut self, contribution: Contribution) {
        self.contributions.push(contribution);
    }

    /// `None` when nothing was added. Contributions are taken in organization-id order.
    pub fn build(mut self) -> Option<Consolidated> {
        self.contributions.sort_by(|a, b| a.organization.cmp(&b.organization));

        let mut contributions = self.contributions.into_iter();
        let first = contributions.next()?;
        let rest: Vec<Contribution> = contributions.collect();
        let all: Vec<&Contribution> = std::iter::once(&first).chain(rest.iter()).collect();

        let mut conflicts = Vec::new();
        let category = pick_single(&self.external_id, "allianceCategory", &all, |r| r.local.category.as_deref(), &mut conflicts);
        let date_published = pick_single(
            &self.external_id,
            "datePublished",
            &all,
            |r| r.governed.date_published.as_deref(),
            &mut conflicts,
        );

        let mut keywords = first.record.keywords.clone();
        let mut mod_reference_types = first.record.local.mod_reference_types.clone();
        let mut tags = first.record.local.tags.clone();
        let mut cross_references = first.record.cross_references.clone();
        let mut record = first.record.clone();

        for other in &rest {
            let r = &other.record;
            keywords = merge_keywords(keywords, &r.keywords);
            push_unique(&mut mod_reference_types, &r.local.mod_reference_types);
            push_unique(&mut tags, &r.local.tags);
            merge_cross_references(&mut cross_references, &r.cross_references);

            if record.journal.is_none() && r.journal.is_some() {
                record.journal = r.journal.clone();
                record.journal_ambiguous = false;
                record.journal_candidates.clear();
            }
            if record.local.resource_abbreviation.is_none() {
                record.local.resource_abbreviation = r.local.resource_abbreviation.clone();
            }
            if record.local.citation.is_none() {
                record.local.citation = r.local.citation.clone();
            }
            for (key, value) in &r.local.additional {
                record.local.additional.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }

        let fingerprints: Vec<(String, String, String)> = all
            .iter()
            .map(|c| (c.organization.clone(), c.submitted_id.clone(), c.fingerprint.clone()))
            .collect();

        record.primary_id = self.external_id.clone();
        record.contributing_organizations = all.iter().map(|c| c.organization.clone()).collect::<BTreeSet<_>>().into_iter().collect();
        record.keywords = keywords;
        record.local.mod_reference_types = mod_reference_types;
        record.local.tags = tags;
        record.local.category = category;
        record.governed.date_published = date_published;
        record.cross_references = cross_references;
        record.conflict_unresolved = !conflicts.is_empty();
        record.content_fingerprint =
            Fingerprinter::combine(fingerprints.iter().map(|(org, _, fp)| (org.as_str(), fp.as_str())));

        Some(Consolidated {
            changed: all.iter().any(|c| c.changed),
            record,
            conflicts,
            fingerprints,
        })
    }
}

/// First non-empty value in order; disagreement reports every contributor's value.
fn pick_single<'a>(
    external_id: &str,
    field: &str,
    contributions: &[&'a Contribution],
    get: impl Fn(&'a ReconciledRecord) -> Option<&'a str>,
    conflicts: &mut Vec<Diagnostic>,
) -> Option<String> {
    let values: Vec<(&str, &str)> = contributions
        .iter()
        .filter_map(|c| get(&c.record).filter(|v| !v.trim().is_empty()).map(|v| (c.organization.as_str(), v)))
        .collect();

    let distinct: BTreeSet<&str> = values.iter().map(|(_, v)| *v).collect();
    if distinct.len() > 1 {
        for (organization, value) in &values {
            conflicts.push(Diagnostic::new(
                organization,
                external_id,
                DiagnosticKind::MultiOrgFieldConflict {
                    field: field.to_string(),
                    value: value.to_string(),
                },
            ));
        }
    }

    values.first().map(|(_, v)| v.to_string())
}

fn push_unique<T: Clone + PartialEq>(into: &mut Vec<T>, from: &[T]) {
    for item in from {
        if !into.contains(item) {
            into.push(item.clone());
        }
    }
}

/// Union keyed by normalized identifier; pages are unioned.
fn merge_cross_references(into: &mut Vec<CrossReference>, from: &[CrossReference]) {
    let key = |x: &CrossReference| {
        try_split_identifier(&x.id)
            .map(|id| id.normalized())
            .unwrap_or_else(|| x.id.to_lowercase())
    };
    for xref in from {
        let k = key(xref);
        match into.iter_mut().find(|existing| key(existing) == k) {
            Some(existing) => push_unique(&mut existing.pages, &xref.pages),
            None => into.push(xref.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GovernedFields, LocalFields, MatchState, Tag};

    fn record(org: &str, category: &str, keywords: &[&str], xrefs: &[&str]) -> ReconciledRecord {
        ReconciledRecord {
            primary_id: "PMID:2002".into(),
            match_state: MatchState::Matched { external_id: "PMID:2002".into() },
            contributing_organizations: vec![org.into()],
            governed: GovernedFields {
                title: Some("Shared".into()),
                ..GovernedFields::default()
            },
            local: LocalFields {
                category: Some(category.into()),
                tags: vec![Tag { tag_name: format!("{}_tag", org), tag_source: Some(org.into()) }],
                ..LocalFields::default()
            },
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            cross_references: xrefs.iter().map(|x| CrossReference::new(*x)).collect(),
            journal: None,
            journal_ambiguous: false,
            journal_candidates: vec![],
            conflict_unresolved: false,
            content_fingerprint: String::new(),
        }
    }

    fn contribution(org: &str, changed: bool, record: ReconciledRecord) -> Contribution {
        Contribution {
            organization: org.into(),
            submitted_id: format!("{}:1", org),
            fingerprint: format!("fp-{}", org),
            changed,
            record,
        }
    }

    #[test]
    fn test_conflicting_category_reported_and_flagged() {
        let out = consolidate_all(
            vec![
                contribution("WB", false, record("WB", "review", &["rna"], &["PMID:2002", "WB:WBPaper1"])),
                contribution("FB", true, record("FB", "research_article", &["RNA", "fly"], &["PMID:2002", "FB:FBrf1"])),
            ],
        );

        assert_eq!(out.len(), 1);
        let c = &out[0];
        assert!(c.changed);
        assert!(c.record.conflict_unresolved);
        // FB sorts before WB
        assert_eq!(c.record.local.category.as_deref(), Some("research_article"));
        assert_eq!(c.record.contributing_organizations, vec!["FB", "WB"]);
        assert_eq!(c.conflicts.len(), 2);
        let orgs: Vec<&str> = c.conflicts.iter().map(|d| d.organization.as_str()).collect();
        assert_eq!(orgs, vec!["FB", "WB"]);

        assert_eq!(c.record.keywords, vec!["RNA", "fly"]);
        assert_eq!(c.record.local.tags.len(), 2);
        let ids: Vec<&str> = c.record.cross_references.iter().map(|x| x.id.as_str()).collect();
        assert_eq!(ids, vec!["PMID:2002", "FB:FBrf1", "WB:WBPaper1"]);
    }

    #[test]
    fn test_conflict_winner_is_alphabetical_not_configured_order() {
        // MGI is configured before FB
        let out = consolidate_all(vec![
            contribution("MGI", false, record("MGI", "review", &[], &["PMID:2002"])),
            contribution("FB", false, record("FB", "research_article", &[], &["PMID:2002"])),
        ]);
        let c = &out[0];
        assert_eq!(c.record.local.category.as_deref(), Some("research_article"));
        assert_eq!(c.record.contributing_organizations, vec!["FB", "MGI"]);
        assert!(c.record.conflict_unresolved);
    }

    #[test]
    fn test_agreeing_contributions_are_clean() {
        let out = consolidate_all(
            vec![
                contribution("SGD", false, record("SGD", "review", &[], &["PMID:2002"])),
                contribution("MGI", false, record("MGI", "review", &[], &["pmid:2002"])),
            ],
        );
        let c = &out[0];
        assert!(!c.changed);
        assert!(!c.record.conflict_unresolved);
        assert!(c.conflicts.is_empty());
        assert_eq!(c.record.cross_references.len(), 1);
    }

    #[test]
    fn test_fingerprint_combines_contributors() {
        let build = |orgs: &[&str]| {
            consolidate_all(
                orgs.iter().map(|o| contribution(o, false, record(o, "review", &[], &[]))).collect(),
            )
            .remove(0)
        };
        let a = build(&["FB", "WB"]);
        let b = build(&["WB", "FB"]);
        assert_eq!(a.record.content_fingerprint, b.record.content_fingerprint);
        assert_eq!(a.fingerprints.len(), 2);
    }
}
