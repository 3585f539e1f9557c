//! Projection of canonical records onto the fixed catalog columns.

use shelfmark_core::{CanonicalRecord, CatalogEntry, Field};

use crate::normalize::{extract_year, normalize_isbn};

/// The catalog row a canonical record would be stored as. No accession number
/// is assigned here.
pub fn catalog_entry(record: &CanonicalRecord) -> CatalogEntry {
    let publisher = record.text(Field::Publisher);
    let date = record.text(Field::PublishedDate);
    let published = match (publisher, date) {
        (Some(p), Some(d)) => format!("{p}: {d}"),
        (Some(v), None) | (None, Some(v)) => v.to_string(),
        (None, None) => String::new(),
    };

    CatalogEntry {
        title: record.text(Field::Title).unwrap_or_default().to_string(),
        author: record.author_names().join(", "),
        published,
        year: date.map(extract_year).unwrap_or_default(),
        oclc_no: record.text(Field::OclcNo).unwrap_or_default().to_string(),
        lc_no: record.text(Field::Lccn).unwrap_or_default().to_string(),
        isbn: record.preferred_isbn().map(normalize_isbn).unwrap_or_default(),
        accession_no: None,
        added_at: None,
    }
}
