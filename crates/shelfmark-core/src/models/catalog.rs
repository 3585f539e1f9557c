use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Catalog-wide identifier assigned once, when an entry is persisted.
///
/// Displayed in the `b0000042x` form used on the physical labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessionNo(u64);

impl AccessionNo {
    pub const FIRST: AccessionNo = AccessionNo(1);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for AccessionNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{:07}x", self.0)
    }
}

impl FromStr for AccessionNo {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix(['b', 'B'])
            .and_then(|rest| rest.strip_suffix(['x', 'X']))
            .unwrap_or(trimmed);
        digits
            .parse::<u64>()
            .ok()
            .filter(|n| *n > 0)
            .map(Self)
            .ok_or_else(|| CoreError::ConfigError(format!("invalid accession number: {s}")))
    }
}

/// A catalog row: the fixed-column projection of a canonical record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "TITLE", default)]
    pub title: String,

    #[serde(rename = "AUTHOR", default)]
    pub author: String,

    #[serde(rename = "PUBLISHED", default)]
    pub published: String,

    #[serde(rename = "YEAR", default)]
    pub year: String,

    #[serde(rename = "OCLC_NO", default)]
    pub oclc_no: String,

    #[serde(rename = "LC_NO", default)]
    pub lc_no: String,

    #[serde(rename = "ISBN", default)]
    pub isbn: String,

    /// `None` until the catalog repository persists the entry.
    #[serde(rename = "ACCESSION_NO", default, skip_serializing_if = "Option::is_none")]
    pub accession_no: Option<AccessionNo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
}

impl CatalogEntry {
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            ..Default::default()
        }
    }

    pub fn with_isbn(mut self, isbn: impl Into<String>) -> Self {
        self.isbn = isbn.into();
        self
    }

    pub fn is_persisted(&self) -> bool {
        self.accession_no.is_some()
    }

    /// True when no descriptive column carries a value.
    pub fn is_blank(&self) -> bool {
        [
            &self.title,
            &self.author,
            &self.published,
            &self.year,
            &self.oclc_no,
            &self.lc_no,
            &self.isbn,
        ]
        .iter()
        .all(|v| v.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accession_display_and_parse() {
        let no = AccessionNo::new(42);
        assert_eq!(no.to_string(), "b0000042x");
        assert_eq!("b0000042x".parse::<AccessionNo>().unwrap(), no);
        assert_eq!("42".parse::<AccessionNo>().unwrap(), no);
        assert!("b0000000x".parse::<AccessionNo>().is_err());
        assert!("abc".parse::<AccessionNo>().is_err());
        assert_eq!(no.next().value(), 43);
    }

    #[test]
    fn test_entry_columns_serialize_uppercase() {
        let entry = CatalogEntry::new("Emma", "Jane Austen").with_isbn("9780141439587");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["TITLE"], "Emma");
        assert_eq!(json["ISBN"], "9780141439587");
        assert!(json.get("ACCESSION_NO").is_none());
    }

    #[test]
    fn test_blank_entry() {
        assert!(CatalogEntry::default().is_blank());
        assert!(!CatalogEntry::new("", "Anon").is_blank());
    }
}
