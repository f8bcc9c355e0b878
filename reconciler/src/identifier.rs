//! Compound identifier parsing.
//!
//! Every id handled by the pipeline has the shape `PREFIX:VALUE` or
//! `PREFIX-VALUE` (`PMID:1001`, `FB:FBrf0221304`, `Xenbase:XB-ART-1`).
//! `:` always wins over `-`, so `ZFIN:ZDB-PUB-020604-2` splits into
//! `ZFIN` / `ZDB-PUB-020604-2`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::IdentifierError;

/// Separator found between prefix and value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Separator {
    Colon,
    Dash,
}

impl Separator {
    pub fn as_char(self) -> char {
        match self {
            Separator::Colon => ':',
            Separator::Dash => '-',
        }
    }
}

/// A split compound identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompoundId {
    pub prefix: String,
    pub value: String,
    pub separator: Separator,
}

impl CompoundId {
    /// Build an id from parts, e.g. `CompoundId::colon("PMID", "1001")`.
    pub fn colon(prefix: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            value: value.into(),
            separator: Separator::Colon,
        }
    }

    /// Case-insensitive comparison of the prefix.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.prefix.eq_ignore_ascii_case(prefix)
    }

    /// Lower-cased `prefix + separator + value`, used as a dedupe key.
    pub fn normalized(&self) -> String {
        format!("{}{}{}", self.prefix, self.separator.as_char(), self.value).to_lowercase()
    }
}

impl fmt::Display for CompoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.prefix, self.separator.as_char(), self.value)
    }
}

impl FromStr for CompoundId {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        split_identifier(s)
    }
}

/// Split an identifier on the first `:`, else on the first `-`.
///
/// # Example
/// ```
/// use litmerge::identifier::{split_identifier, Separator};
///
/// let id = split_identifier("ZFIN:ZDB-PUB-020604-2").unwrap();
/// assert_eq!(id.prefix, "ZFIN");
/// assert_eq!(id.value, "ZDB-PUB-020604-2");
/// assert_eq!(id.separator, Separator::Colon);
///
/// assert!(split_identifier("FBrf0001").is_err());
/// ```
pub fn split_identifier(id: &str) -> Result<CompoundId, IdentifierError> {
    try_split_identifier(id).ok_or_else(|| IdentifierError::Malformed(id.to_string()))
}

/// Same split as [`split_identifier`], returning `None` instead of an error.
pub fn try_split_identifier(id: &str) -> Option<CompoundId> {
    let (prefix, value, separator) = if let Some((p, v)) = id.split_once(':') {
        (p, v, Separator::Colon)
    } else if let Some((p, v)) = id.split_once('-') {
        (p, v, Separator::Dash)
    } else {
        return None;
    };

    Some(CompoundId {
        prefix: prefix.to_string(),
        value: value.to_string(),
        separator,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_colon_split() {
        let id = split_identifier("PMID:1001").unwrap();
        assert_eq!(id.prefix, "PMID");
        assert_eq!(id.value, "1001");
        assert_eq!(id.separator, Separator::Colon);
        assert_eq!(id.to_string(), "PMID:1001");
    }

    #[test]
    fn test_dash_split() {
        let id = split_identifier("PMCID-PMC123").unwrap();
        assert_eq!(id.prefix, "PMCID");
        assert_eq!(id.value, "PMC123");
        assert_eq!(id.separator, Separator::Dash);
    }

    #[test]
    fn test_colon_has_priority_over_earlier_dash() {
        let id = split_identifier("Xenbase-X:XB-ART-1").unwrap();
        assert_eq!(id.prefix, "Xenbase-X");
        assert_eq!(id.value, "XB-ART-1");
    }

    #[test]
    fn test_value_keeps_later_colons() {
        let id = split_identifier("DOI:10.1000:abc").unwrap();
        assert_eq!(id.value, "10.1000:abc");
    }

    #[test]
    fn test_malformed() {
        assert_eq!(
            split_identifier("FBrf0001"),
            Err(IdentifierError::Malformed("FBrf0001".into()))
        );
        assert!(try_split_identifier("FBrf0001").is_none());
    }

    #[test]
    fn test_normalized_key() {
        let id = split_identifier("DOI:10.1/ABC").unwrap();
        assert_eq!(id.normalized(), "doi:10.1/abc");
        assert!(id.has_prefix("doi"));
    }

    proptest! {
        #[test]
        fn colon_ids_never_split_on_dash(
            prefix in "[A-Za-z-]{0,8}",
            value in "[A-Za-z0-9:-]{0,12}",
        ) {
            let raw = format!("{}:{}", prefix, value);
            let id = split_identifier(&raw).unwrap();
            prop_assert_eq!(id.separator, Separator::Colon);
            prop_assert_eq!(id.prefix, prefix);
            prop_assert_eq!(id.value, value);
        }
    }
}
