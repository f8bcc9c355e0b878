//! Journal identity resolution.
//!
//! Maps a free-text journal abbreviation to a canonical journal id.
//! Precedence is fixed: organization ISSN evidence, then the canonical
//! catalog, then the organization's own journal catalog. More than one
//! candidate at a level is ambiguous and nothing is picked.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::identifier::try_split_identifier;
use crate::models::{JournalIdentity, LocalJournal, ResolutionSource};

static MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid markup regex"));

/// Remove `<tag>`s.
pub fn strip_markup(text: &str) -> Cow<'_, str> {
    MARKUP.replace_all(text, "")
}

/// Strip markup and non-alphanumeric characters, lower-case.
///
/// ```
/// use litmerge::transform::journal::normalize_journal_text;
/// assert_eq!(normalize_journal_text("J. <i>Cell</i> Biol."), "jcellbiol");
/// ```
pub fn normalize_journal_text(text: &str) -> String {
    strip_markup(text)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Result of resolving one abbreviation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalResolution {
    Resolved { id: String, source: ResolutionSource },
    Ambiguous { candidates: Vec<String> },
    NotFound,
    /// No abbreviation, or nothing left after normalization.
    Missing,
}

/// The canonical journal catalog, indexed for lookup.
#[derive(Debug, Clone, Default)]
pub struct JournalCatalog {
    journals: BTreeMap<String, JournalIdentity>,
    by_text: HashMap<String, BTreeSet<String>>,
    by_issn: HashMap<String, BTreeSet<String>>,
}

impl JournalCatalog {
    pub fn new(identities: Vec<JournalIdentity>) -> Self {
        let mut catalog = Self::default();
        for journal in identities {
            let id = journal.primary_id.clone();
            for text in journal.match_texts() {
                let key = normalize_journal_text(text);
                if !key.is_empty() {
                    catalog.by_text.entry(key).or_default().insert(id.clone());
                }
            }
            for issn in journal.issns() {
                let key = normalize_journal_text(issn);
                if !key.is_empty() {
                    catalog.by_issn.entry(key).or_default().insert(id.clone());
                }
            }
            catalog.journals.insert(id, journal);
        }
        catalog
    }

    pub fn len(&self) -> usize {
        self.journals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.journals.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&JournalIdentity> {
        self.journals.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.journals.contains_key(id)
    }

    /// Canonical ids whose title, abbreviations, ISSNs or aliases normalize to `key`.
    pub fn candidates(&self, key: &str) -> Option<&BTreeSet<String>> {
        self.by_text.get(key)
    }

    /// Canonical ids carrying this ISSN.
    pub fn by_issn(&self, issn: &str) -> Option<&BTreeSet<String>> {
        self.by_issn.get(&normalize_journal_text(issn))
    }
}

/// One organization's own journals.
#[derive(Debug, Clone, Default)]
pub struct LocalJournalCatalog {
    /// Normalized text -> local journal ids.
    by_text: HashMap<String, BTreeSet<String>>,
    /// Normalized text -> canonical ids reached through ISSN evidence.
    issn_evidence: HashMap<String, BTreeSet<String>>,
}

impl LocalJournalCatalog {
    /// Index local journals, linking their ISSNs to `canonical`.
    pub fn new(journals: Vec<LocalJournal>, canonical: &JournalCatalog) -> Self {
        let mut local = Self::default();
        for journal in journals {
            let identity = &journal.identity;

            let mut evidence = BTreeSet::new();
            let xref_issns = journal
                .cross_references
                .iter()
                .filter_map(|x| try_split_identifier(&x.id))
                .filter(|id| id.has_prefix("ISSN"))
                .map(|id| id.value);
            let issns: Vec<String> = identity.issns().map(str::to_string).chain(xref_issns).collect();
            for issn in &issns {
                if let Some(ids) = canonical.by_issn(issn) {
                    evidence.extend(ids.iter().cloned());
                }
            }

            for text in identity.match_texts() {
                let key = normalize_journal_text(text);
                if key.is_empty() {
                    continue;
                }
                local
                    .by_text
                    .entry(key.clone())
                    .or_default()
                    .insert(identity.primary_id.clone());
                if !evidence.is_empty() {
                    local.issn_evidence.entry(key).or_default().extend(evidence.iter().cloned());
                }
            }
        }
        local
    }

    pub fn candidates(&self, key: &str) -> Option<&BTreeSet<String>> {
        self.by_text.get(key)
    }

    pub fn issn_evidence(&self, key: &str) -> Option<&BTreeSet<String>> {
        self.issn_evidence.get(key)
    }
}

/// Resolves abbreviations against the canonical and one local catalog.
#[derive(Debug, Clone, Copy)]
pub struct JournalResolver<'a> {
    canonical: &'a JournalCatalog,
    local: Option<&'a LocalJournalCatalog>,
}

impl<'a> JournalResolver<'a> {
    pub fn new(canonical: &'a JournalCatalog, local: Option<&'a LocalJournalCatalog>) -> Self {
        Self { canonical, local }
    }

    pub fn resolve(&self, abbreviation: Option<&str>) -> JournalResolution {
        let key = match abbreviation.map(normalize_journal_text) {
            Some(key) if !key.is_empty() => key,
            _ => return JournalResolution::Missing,
        };

        if let Some(ids) = self.local.and_then(|l| l.issn_evidence(&key)) {
            if ids.len() == 1 {
                if let Some(id) = ids.iter().next() {
                    return JournalResolution::Resolved {
                        id: id.clone(),
                        source: ResolutionSource::IssnEvidence,
                    };
                }
            }
        }

        if let Some(outcome) = pick(self.canonical.candidates(&key), ResolutionSource::Canonical) {
            return outcome;
        }

        if let Some(outcome) = pick(self.local.and_then(|l| l.candidates(&key)), ResolutionSource::Local) {
            return outcome;
        }

        JournalResolution::NotFound
    }
}

fn pick(ids: Option<&BTreeSet<String>>, source: ResolutionSource) -> Option<JournalResolution> {
    let ids = ids.filter(|ids| !ids.is_empty())?;
    if ids.len() == 1 {
        ids.iter().next().map(|id| JournalResolution::Resolved { id: id.clone(), source })
    } else {
        Some(JournalResolution::Ambiguous {
            candidates: ids.iter().cloned().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CrossReference;

    fn journal(id: &str, title: &str, abbr: &str, issn: Option<&str>) -> JournalIdentity {
        JournalIdentity {
            primary_id: id.into(),
            title: Some(title.into()),
            medline_abbreviation: Some(abbr.into()),
            print_issn: issn.map(String::from),
            ..JournalIdentity::default()
        }
    }

    fn catalog() -> JournalCatalog {
        JournalCatalog::new(vec![
            journal("NLM:0372516", "The Journal of cell biology", "J Cell Biol", Some("0021-9525")),
            journal("NLM:9999999", "Journal of Cellular Biology", "J Cell Biol", Some("1111-2222")),
            journal("NLM:0410462", "Nature", "Nature", Some("0028-0836")),
        ])
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_journal_text("  Proc. Natl. Acad. Sci. U.S.A. "), "procnatlacadsciusa");
        assert_eq!(normalize_journal_text("<b></b>"), "");
    }

    #[test]
    fn test_unique_canonical_match() {
        let catalog = catalog();
        let resolver = JournalResolver::new(&catalog, None);
        assert_eq!(
            resolver.resolve(Some("nature")),
            JournalResolution::Resolved { id: "NLM:0410462".into(), source: ResolutionSource::Canonical }
        );
        assert_eq!(
            resolver.resolve(Some("0028-0836")),
            JournalResolution::Resolved { id: "NLM:0410462".into(), source: ResolutionSource::Canonical }
        );
    }

    #[test]
    fn test_ambiguous_without_issn_evidence() {
        let catalog = catalog();
        let resolver = JournalResolver::new(&catalog, None);
        assert_eq!(
            resolver.resolve(Some("J Cell Biol")),
            JournalResolution::Ambiguous {
                candidates: vec!["NLM:0372516".into(), "NLM:9999999".into()]
            }
        );
    }

    #[test]
    fn test_issn_evidence_wins_over_ambiguity() {
        let catalog = catalog();
        let local = LocalJournalCatalog::new(
            vec![LocalJournal {
                identity: JournalIdentity {
                    primary_id: "FB:FBmultipub_1".into(),
                    iso_abbreviation: Some("J. Cell Biol.".into()),
                    ..JournalIdentity::default()
                },
                cross_references: vec![CrossReference::new("ISSN:0021-9525")],
            }],
            &catalog,
        );
        let resolver = JournalResolver::new(&catalog, Some(&local));
        assert_eq!(
            resolver.resolve(Some("J Cell Biol")),
            JournalResolution::Resolved { id: "NLM:0372516".into(), source: ResolutionSource::IssnEvidence }
        );
    }

    #[test]
    fn test_local_fallback_and_not_found() {
        let catalog = catalog();
        let local = LocalJournalCatalog::new(
            vec![LocalJournal {
                identity: JournalIdentity {
                    primary_id: "ZFIN:ZDB-JRNL-1".into(),
                    title: Some("Zebrafish Notes".into()),
                    ..JournalIdentity::default()
                },
                cross_references: vec![],
            }],
            &catalog,
        );
        let resolver = JournalResolver::new(&catalog, Some(&local));
        assert_eq!(
            resolver.resolve(Some("Zebrafish notes")),
            JournalResolution::Resolved { id: "ZFIN:ZDB-JRNL-1".into(), source: ResolutionSource::Local }
        );
        assert_eq!(resolver.resolve(Some("Unknown Gazette")), JournalResolution::NotFound);
        assert_eq!(resolver.resolve(Some(" . ")), JournalResolution::Missing);
        assert_eq!(resolver.resolve(None), JournalResolution::Missing);
    }
}
