//! Per-record diagnostics.
//!
//! Components never abort a run for one record. They return their value plus
//! zero or more [`DiagnosticKind`]s; the pipeline attaches the organization
//! and record id and routes each diagnostic to its report.

use serde::Serialize;
use std::fmt;

use crate::error::RecordError;

/// How bad a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    /// Record emitted with a flag set.
    Flagged,
    /// Record excluded from the output.
    Fatal,
}

/// Report file a diagnostic is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReportKind {
    Main,
    ResourceUnmatched,
    ReferenceNoResource,
    AmbiguousJournal,
    TooManyIdentifiers,
    XrefWarnings,
    DifferTitle,
    DifferOther,
    /// Shared by all organizations.
    MultiOrgConflicts,
}

impl ReportKind {
    pub const PER_ORGANIZATION: [ReportKind; 8] = [
        ReportKind::Main,
        ReportKind::ResourceUnmatched,
        ReportKind::ReferenceNoResource,
        ReportKind::AmbiguousJournal,
        ReportKind::TooManyIdentifiers,
        ReportKind::XrefWarnings,
        ReportKind::DifferTitle,
        ReportKind::DifferOther,
    ];

    /// File name suffix, `<ORG>_<suffix>`.
    pub fn suffix(self) -> &'static str {
        match self {
            ReportKind::Main => "main",
            ReportKind::ResourceUnmatched => "resource_unmatched",
            ReportKind::ReferenceNoResource => "reference_no_resource",
            ReportKind::AmbiguousJournal => "ambiguous_journal",
            ReportKind::TooManyIdentifiers => "too_many_identifiers",
            ReportKind::XrefWarnings => "xref_warnings",
            ReportKind::DifferTitle => "dqm_pubmed_differ_title",
            ReportKind::DifferOther => "dqm_pubmed_differ_other",
            ReportKind::MultiOrgConflicts => "multi_org_conflicts",
        }
    }
}

/// What went wrong with a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticKind {
    // Fatal
    MalformedIdentifier { id: String },
    TooManyIdentifiersForType { prefix: String, values: Vec<String> },
    InvalidSubmission { message: String },

    // Flagged
    AmbiguousJournalMatch { abbreviation: String, candidates: Vec<String> },
    JournalNotFound { abbreviation: String },
    MultiOrgFieldConflict { field: String, value: String },

    // Warnings
    UnrecognizedCrossReferenceType { id: String },
    MultipleContextTags { id: String, pages: Vec<String> },
    MissingContextTag { id: String },
    NoCrossReferences,
    SchemaViolation { message: String },
    UnexpectedProperty { name: String },
    CrossReferenceDisagrees { prefix: String, submitted: String, authoritative: String },
    UnknownJournalReference { id: String },
    AuthoritativeFieldDiffers { field: String, submitted: String, authoritative: String },
    AuthoritativeRecordMissing { external_id: String },
    MissingJournalAbbreviation,
}

impl DiagnosticKind {
    pub fn severity(&self) -> Severity {
        use DiagnosticKind::*;
        match self {
            MalformedIdentifier { .. } | TooManyIdentifiersForType { .. } | InvalidSubmission { .. } => {
                Severity::Fatal
            }
            AmbiguousJournalMatch { .. } | JournalNotFound { .. } | MultiOrgFieldConflict { .. } => {
                Severity::Flagged
            }
            _ => Severity::Warning,
        }
    }

    pub fn report(&self) -> ReportKind {
        use DiagnosticKind::*;
        match self {
            TooManyIdentifiersForType { .. } => ReportKind::TooManyIdentifiers,
            AmbiguousJournalMatch { .. } => ReportKind::AmbiguousJournal,
            JournalNotFound { .. } | UnknownJournalReference { .. } => ReportKind::ResourceUnmatched,
            MissingJournalAbbreviation => ReportKind::ReferenceNoResource,
            MultiOrgFieldConflict { .. } => ReportKind::MultiOrgConflicts,
            UnrecognizedCrossReferenceType { .. }
            | MultipleContextTags { .. }
            | MissingContextTag { .. }
            | CrossReferenceDisagrees { .. } => ReportKind::XrefWarnings,
            AuthoritativeFieldDiffers { field, .. } if field == "title" => ReportKind::DifferTitle,
            AuthoritativeFieldDiffers { .. } => ReportKind::DifferOther,
            MalformedIdentifier { .. }
            | InvalidSubmission { .. }
            | NoCrossReferences
            | SchemaViolation { .. }
            | UnexpectedProperty { .. }
            | AuthoritativeRecordMissing { .. } => ReportKind::Main,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use DiagnosticKind::*;
        match self {
            MalformedIdentifier { id } => write!(f, "malformed identifier {}", id),
            TooManyIdentifiersForType { prefix, values } => {
                write!(f, "too many {} identifiers: {}", prefix, values.join(", "))
            }
            InvalidSubmission { message } => write!(f, "invalid submission: {}", message),
            AmbiguousJournalMatch { abbreviation, candidates } => {
                write!(f, "journal '{}' matches {}", abbreviation, candidates.join(", "))
            }
            JournalNotFound { abbreviation } => write!(f, "journal '{}' not found", abbreviation),
            MultiOrgFieldConflict { field, value } => write!(f, "{} = {}", field, value),
            UnrecognizedCrossReferenceType { id } => write!(f, "unexpected cross reference type {}", id),
            MultipleContextTags { id, pages } => write!(f, "{} has pages {}", id, pages.join(", ")),
            MissingContextTag { id } => write!(f, "{} has no pages", id),
            NoCrossReferences => write!(f, "no cross references"),
            SchemaViolation { message } => write!(f, "schema: {}", message),
            UnexpectedProperty { name } => write!(f, "unexpected property {}", name),
            CrossReferenceDisagrees { prefix, submitted, authoritative } => write!(
                f,
                "{} differs: submitted {} authoritative {}",
                prefix, submitted, authoritative
            ),
            UnknownJournalReference { id } => write!(f, "journal {} not in catalog", id),
            AuthoritativeFieldDiffers { field, submitted, authoritative } => write!(
                f,
                "{} differs: submitted '{}' authoritative '{}'",
                field, submitted, authoritative
            ),
            AuthoritativeRecordMissing { external_id } => {
                write!(f, "no authoritative record for {}", external_id)
            }
            MissingJournalAbbreviation => write!(f, "no journal abbreviation"),
        }
    }
}

impl From<RecordError> for DiagnosticKind {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::MalformedIdentifier(id) => DiagnosticKind::MalformedIdentifier { id },
            RecordError::TooManyIdentifiersForType { prefix, values } => {
                DiagnosticKind::TooManyIdentifiersForType { prefix, values }
            }
            RecordError::InvalidSubmission(message) => DiagnosticKind::InvalidSubmission { message },
        }
    }
}

/// A diagnostic attached to one record of one organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub organization: String,
    pub primary_id: String,
    #[serde(flatten)]
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn new(organization: &str, primary_id: &str, kind: DiagnosticKind) -> Self {
        Self {
            organization: organization.to_string(),
            primary_id: primary_id.to_string(),
            kind,
        }
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    pub fn report(&self) -> ReportKind {
        self.kind.report()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.organization, self.primary_id, self.kind)
    }
}
