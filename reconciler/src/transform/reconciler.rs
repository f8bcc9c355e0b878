//! Field Reconciler - Merge one submission with its authoritative record
//!
//! Matched records take every authoritative-governed field from the
//! authoritative record; the publication date alone falls back to the
//! organization value, and the resource abbreviation becomes the catalog
//! title of the authoritative journal. Unmatched records keep the
//! organization fields and get their journal from the [`JournalResolver`].

use scraper::Html;
use std::collections::BTreeSet;

use crate::config::PipelineConfig;
use crate::diagnostics::DiagnosticKind;
use crate::identifier::try_split_identifier;
use crate::models::{
    AuthoritativeRecord, CrossReference, GovernedFields, JournalRef, LocalFields, MatchState,
    RawSubmission, ReconciledAuthor, ReconciledRecord, ResolutionSource,
};
use crate::transform::journal::{strip_markup, JournalCatalog, JournalResolution, JournalResolver};
use crate::transform::xref::{SanitizedXrefs, XrefSanitizer};

/// A reconciled record and what was noticed on the way.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub record: ReconciledRecord,
    pub diagnostics: Vec<DiagnosticKind>,
}

/// Merges submissions with authoritative data for one organization.
pub struct FieldReconciler<'a> {
    config: &'a PipelineConfig,
    sanitizer: &'a XrefSanitizer,
    catalog: &'a JournalCatalog,
    journals: JournalResolver<'a>,
}

impl<'a> FieldReconciler<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        sanitizer: &'a XrefSanitizer,
        catalog: &'a JournalCatalog,
        journals: JournalResolver<'a>,
    ) -> Self {
        Self { config, sanitizer, catalog, journals }
    }

    /// Reconcile one sanitized submission.
    ///
    /// `authoritative` is the record found for `xrefs.external_id`, if any.
    pub fn reconcile(
        &self,
        submission: &RawSubmission,
        xrefs: SanitizedXrefs,
        authoritative: Option<&AuthoritativeRecord>,
        fingerprint: String,
    ) -> Reconciled {
        let SanitizedXrefs {
            primary_id,
            promoted_from,
            external_id,
            cross_references,
            warnings,
        } = xrefs;
        let mut diagnostics = warnings;

        let mut authors = submission.authors.clone();
        if promoted_from.is_some() {
            for author in &mut authors {
                author.reference_id = Some(primary_id.clone());
            }
        }

        let org_keywords = self.unpack_keywords(&submission.organization_id, submission.keywords.as_deref());
        let mut local = local_fields(submission);

        let record = match (external_id, authoritative) {
            (Some(external_id), Some(auth)) => {
                diagnostics.extend(compare_governed(submission, auth));

                let mut governed = governed_from_authoritative(auth);
                if governed.date_published.is_none() {
                    governed.date_published = submission.date_published.clone();
                }

                let cross_references = self.merge_cross_references(
                    &external_id,
                    &auth.cross_references,
                    cross_references,
                    &mut diagnostics,
                );
                let (journal, journal_candidates) = self.matched_journal(submission, auth, &mut diagnostics);
                if let Some(title) = journal
                    .as_ref()
                    .and_then(|j| self.catalog.get(&j.id))
                    .and_then(|identity| identity.title.clone())
                {
                    local.resource_abbreviation = Some(title);
                }

                ReconciledRecord {
                    primary_id,
                    match_state: MatchState::Matched { external_id },
                    contributing_organizations: vec![submission.organization_id.clone()],
                    governed,
                    local,
                    keywords: merge_keywords(org_keywords, &auth.keywords),
                    cross_references,
                    journal_ambiguous: !journal_candidates.is_empty(),
                    journal,
                    journal_candidates,
                    conflict_unresolved: false,
                    content_fingerprint: fingerprint,
                }
            }
            (external_id, _) => {
                if let Some(external_id) = external_id {
                    diagnostics.push(DiagnosticKind::AuthoritativeRecordMissing { external_id });
                }

                // Authoritative ids without an authoritative record are dangling.
                let cross_references: Vec<CrossReference> = cross_references
                    .into_iter()
                    .filter(|x| {
                        try_split_identifier(&x.id).map_or(true, |id| !self.sanitizer.is_external_id(&id))
                    })
                    .collect();

                let mut governed = governed_from_submission(submission);
                governed.authors = ReconciledAuthor::rank_all(authors);

                let (journal, journal_candidates) =
                    self.resolve_journal(submission.resource_abbreviation.as_deref(), true, &mut diagnostics);

                ReconciledRecord {
                    primary_id,
                    match_state: MatchState::Unmatched,
                    contributing_organizations: vec![submission.organization_id.clone()],
                    governed,
                    local,
                    keywords: merge_keywords(org_keywords, &[]),
                    cross_references,
                    journal_ambiguous: !journal_candidates.is_empty(),
                    journal,
                    journal_candidates,
                    conflict_unresolved: false,
                    content_fingerprint: fingerprint,
                }
            }
        };

        Reconciled { record, diagnostics }
    }

    /// Split packed keywords for organizations that send them in one string.
    pub fn unpack_keywords(&self, organization: &str, keywords: Option<&[String]>) -> Vec<String> {
        let keywords = keywords.unwrap_or_default();
        let packed = self
            .config
            .packed_keyword_organizations
            .iter()
            .any(|o| o == organization);
        if !packed {
            return keywords.to_vec();
        }

        let first = match keywords.first() {
            Some(first) if !first.trim().is_empty() => html_text(first),
            _ => return Vec::new(),
        };
        let commas = if first.contains(", ") { first.matches(',').count() } else { 0 };
        let semicolons = if first.contains("; ") { first.matches(';').count() } else { 0 };
        if commas == 0 && semicolons == 0 {
            vec![first]
        } else if commas >= semicolons {
            first.split(", ").map(str::to_string).collect()
        } else {
            first.split("; ").map(str::to_string).collect()
        }
    }

    /// Authoritative cross-references win per prefix; organization prefixes
    /// the authoritative record lacks are kept.
    fn merge_cross_references(
        &self,
        external_id: &str,
        authoritative: &[CrossReference],
        submitted: Vec<CrossReference>,
        diagnostics: &mut Vec<DiagnosticKind>,
    ) -> Vec<CrossReference> {
        let mut merged: Vec<(String, String, CrossReference)> = Vec::new();
        for xref in authoritative {
            if let Some(id) = try_split_identifier(&xref.id) {
                if !merged.iter().any(|(prefix, _, _)| prefix == &id.prefix) {
                    merged.push((id.prefix, id.value, xref.clone()));
                }
            }
        }

        for xref in submitted {
            let Some(id) = try_split_identifier(&xref.id) else { continue };
            match merged.iter().find(|(prefix, _, _)| prefix == &id.prefix) {
                Some((prefix, value, _)) => {
                    if !value.eq_ignore_ascii_case(&id.value) {
                        diagnostics.push(DiagnosticKind::CrossReferenceDisagrees {
                            prefix: prefix.clone(),
                            submitted: xref.id.clone(),
                            authoritative: value.clone(),
                        });
                    }
                }
                None => merged.push((id.prefix, id.value, xref)),
            }
        }

        let mut out: Vec<CrossReference> = merged.into_iter().map(|(_, _, xref)| xref).collect();
        if !out.iter().any(|x| x.id == external_id) {
            out.insert(
                0,
                CrossReference::new(external_id).with_page(self.config.authoritative_context.as_str()),
            );
        }
        out
    }

    /// Journal of a matched record: the authoritative catalog reference,
    /// else the organization abbreviation.
    fn matched_journal(
        &self,
        submission: &RawSubmission,
        auth: &AuthoritativeRecord,
        diagnostics: &mut Vec<DiagnosticKind>,
    ) -> (Option<JournalRef>, Vec<String>) {
        if let Some(nlm) = &auth.nlm {
            let id = format!("{}:{}", self.config.journal_id_prefix, nlm);
            if self.catalog.contains(&id) {
                return (
                    Some(JournalRef { id, source: ResolutionSource::Authoritative }),
                    Vec::new(),
                );
            }
            diagnostics.push(DiagnosticKind::UnknownJournalReference { id });
        }
        self.resolve_journal(submission.resource_abbreviation.as_deref(), false, diagnostics)
    }

    fn resolve_journal(
        &self,
        abbreviation: Option<&str>,
        report_missing: bool,
        diagnostics: &mut Vec<DiagnosticKind>,
    ) -> (Option<JournalRef>, Vec<String>) {
        match self.journals.resolve(abbreviation) {
            JournalResolution::Resolved { id, source } => (Some(JournalRef { id, source }), Vec::new()),
            JournalResolution::Ambiguous { candidates } => {
                diagnostics.push(DiagnosticKind::AmbiguousJournalMatch {
                    abbreviation: abbreviation.unwrap_or_default().to_string(),
                    candidates: candidates.clone(),
                });
                (None, candidates)
            }
            JournalResolution::NotFound => {
                diagnostics.push(DiagnosticKind::JournalNotFound {
                    abbreviation: abbreviation.unwrap_or_default().to_string(),
                });
                (None, Vec::new())
            }
            JournalResolution::Missing => {
                if report_missing {
                    diagnostics.push(DiagnosticKind::MissingJournalAbbreviation);
                }
                (None, Vec::new())
            }
        }
    }
}

/// Text content of an HTML fragment: tags dropped, entities decoded.
fn html_text(fragment: &str) -> String {
    Html::parse_fragment(fragment).root_element().text().collect()
}

/// Case-insensitive union, first spelling wins.
pub fn merge_keywords(organization: Vec<String>, authoritative: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    organization
        .into_iter()
        .chain(authoritative.iter().cloned())
        .filter(|k| !k.trim().is_empty())
        .filter(|k| seen.insert(k.to_uppercase()))
        .collect()
}

fn local_fields(submission: &RawSubmission) -> LocalFields {
    LocalFields {
        category: submission.category.clone(),
        mod_reference_types: submission.mod_reference_types.clone(),
        tags: submission.tags.clone(),
        resource_abbreviation: submission.resource_abbreviation.clone(),
        citation: submission.citation.clone(),
        additional: submission.additional.clone(),
    }
}

fn governed_from_authoritative(auth: &AuthoritativeRecord) -> GovernedFields {
    GovernedFields {
        authors: ReconciledAuthor::rank_all(auth.authors.clone()),
        title: auth.title.clone(),
        volume: auth.volume.clone(),
        pages: auth.pages.clone(),
        issue_name: auth.issue_name.clone(),
        issue_date: auth.issue_date.clone(),
        date_published: auth.date_published.clone(),
        date_arrived_in_pubmed: auth.date_arrived_in_pubmed.as_ref().map(|d| d.date_string.clone()),
        date_last_modified: auth.date_last_modified.as_ref().map(|d| d.date_string.clone()),
        abstract_text: auth.abstract_text.clone(),
        pub_med_type: auth.pub_med_type.clone(),
        publisher: auth.publisher.clone(),
        mesh_terms: auth.mesh_terms.clone(),
        plain_language_abstract: auth.plain_language_abstract.clone(),
        pubmed_abstract_languages: auth.pubmed_abstract_languages.clone(),
        publication_status: auth.publication_status.clone(),
    }
}

fn governed_from_submission(submission: &RawSubmission) -> GovernedFields {
    GovernedFields {
        authors: Vec::new(),
        title: submission.title.clone(),
        volume: submission.volume.clone(),
        pages: submission.pages.clone(),
        issue_name: submission.issue_name.clone(),
        issue_date: submission.issue_date.clone(),
        date_published: submission.date_published.clone(),
        date_arrived_in_pubmed: submission.date_arrived_in_pubmed.clone(),
        date_last_modified: submission.date_last_modified.clone(),
        abstract_text: submission.abstract_text.clone(),
        pub_med_type: submission.pub_med_type.clone(),
        publisher: submission.publisher.clone(),
        mesh_terms: submission.mesh_terms.clone(),
        plain_language_abstract: submission.plain_language_abstract.clone(),
        pubmed_abstract_languages: submission.pubmed_abstract_languages.clone(),
        publication_status: submission.publication_status.clone(),
    }
}

/// Letters only, lower-case, markup removed.
fn letters_only(text: &str) -> String {
    strip_markup(text)
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Governed single-valued fields the organization also supplied and that
/// differ from the authoritative value.
fn compare_governed(submission: &RawSubmission, auth: &AuthoritativeRecord) -> Vec<DiagnosticKind> {
    let date = |d: &Option<crate::models::PubDate>| d.as_ref().map(|d| d.date_string.clone());
    let pairs: [(&str, &Option<String>, Option<String>); 12] = [
        ("title", &submission.title, auth.title.clone()),
        ("volume", &submission.volume, auth.volume.clone()),
        ("pages", &submission.pages, auth.pages.clone()),
        ("issueName", &submission.issue_name, auth.issue_name.clone()),
        ("issueDate", &submission.issue_date, auth.issue_date.clone()),
        ("datePublished", &submission.date_published, auth.date_published.clone()),
        ("dateArrivedInPubmed", &submission.date_arrived_in_pubmed, date(&auth.date_arrived_in_pubmed)),
        ("dateLastModified", &submission.date_last_modified, date(&auth.date_last_modified)),
        ("abstract", &submission.abstract_text, auth.abstract_text.clone()),
        ("publisher", &submission.publisher, auth.publisher.clone()),
        ("plainLanguageAbstract", &submission.plain_language_abstract, auth.plain_language_abstract.clone()),
        ("publicationStatus", &submission.publication_status, auth.publication_status.clone()),
    ];

    pairs
        .into_iter()
        .filter_map(|(field, submitted, authoritative)| {
            let submitted = submitted.as_deref()?;
            let authoritative = authoritative.unwrap_or_default();
            (letters_only(submitted) != letters_only(&authoritative)).then(|| {
                DiagnosticKind::AuthoritativeFieldDiffers {
                    field: field.to_string(),
                    submitted: submitted.to_string(),
                    authoritative,
                }
            })
        })
        .collect()
}
