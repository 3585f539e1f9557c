//! Import of existing catalog spreadsheets exported as CSV/TSV.
//!
//! Exports from other cataloguing tools name their columns inconsistently
//! ("Book Title", "Creator", "ISBN-13", "LC no."), so columns are mapped onto
//! the catalog layout by case-insensitive substring matching.

use std::io::Read;
use std::path::Path;

use crate::error::{CoreError, Result};
use crate::models::CatalogEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Title,
    Author,
    Published,
    Year,
    OclcNo,
    LcNo,
    Isbn,
}

/// Resolution order matters: identifiers claim their headers before the
/// looser needles ("lc", "pub", "date") get a chance to match them.
const NEEDLES: [(Column, &[&str]); 7] = [
    (Column::Isbn, &["isbn13", "isbn-13", "isbn10", "isbn-10", "isbn"]),
    (Column::OclcNo, &["oclc"]),
    (Column::LcNo, &["lccn", "lc no", "lc_no", "library of congress", "lc"]),
    (Column::Year, &["year", "d.o. pub", "date"]),
    (Column::Published, &["published", "publisher", "publishing", "pub"]),
    (Column::Author, &["author", "creator", "writer", "by"]),
    (Column::Title, &["title", "name"]),
];

/// Which source column feeds each catalog column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    pub title: Option<usize>,
    pub author: Option<usize>,
    pub published: Option<usize>,
    pub year: Option<usize>,
    pub oclc_no: Option<usize>,
    pub lc_no: Option<usize>,
    pub isbn: Option<usize>,
}

impl ColumnMapping {
    pub fn from_headers<S: AsRef<str>>(headers: &[S]) -> Self {
        let lowered: Vec<String> = headers
            .iter()
            .map(|h| h.as_ref().trim().to_lowercase())
            .collect();
        let mut claimed = vec![false; lowered.len()];
        let mut mapping = Self::default();

        for (column, needles) in NEEDLES {
            let found = needles.iter().find_map(|needle| {
                lowered
                    .iter()
                    .enumerate()
                    .find(|(idx, header)| !claimed[*idx] && header.contains(needle))
                    .map(|(idx, _)| idx)
            });
            if let Some(idx) = found {
                claimed[idx] = true;
                *mapping.slot(column) = Some(idx);
            }
        }
        mapping
    }

    fn slot(&mut self, column: Column) -> &mut Option<usize> {
        match column {
            Column::Title => &mut self.title,
            Column::Author => &mut self.author,
            Column::Published => &mut self.published,
            Column::Year => &mut self.year,
            Column::OclcNo => &mut self.oclc_no,
            Column::LcNo => &mut self.lc_no,
            Column::Isbn => &mut self.isbn,
        }
    }

    pub fn is_usable(&self) -> bool {
        self.title.is_some() || self.author.is_some() || self.isbn.is_some()
    }

    fn entry_from(&self, record: &csv::StringRecord) -> CatalogEntry {
        let cell = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        };
        CatalogEntry {
            title: cell(self.title),
            author: cell(self.author),
            published: cell(self.published),
            year: cell(self.year),
            oclc_no: cell(self.oclc_no),
            lc_no: cell(self.lc_no),
            isbn: cell(self.isbn),
            accession_no: None,
            added_at: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub mapping: ColumnMapping,
    /// Entries without accession numbers, ready for `append_entry`.
    pub entries: Vec<CatalogEntry>,
    pub skipped_rows: usize,
}

pub fn import_csv<R: Read>(reader: R, delimiter: u8, origin: &str) -> Result<ImportReport> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
    let mapping = ColumnMapping::from_headers(&headers);
    if !mapping.is_usable() {
        return Err(CoreError::Import {
            path: origin.to_string(),
            message: format!("no title, author or ISBN column among {headers:?}"),
        });
    }

    let mut report = ImportReport {
        mapping,
        ..Default::default()
    };
    for (line, record) in csv_reader.records().enumerate() {
        match record {
            Ok(record) => {
                let entry = report.mapping.entry_from(&record);
                if entry.is_blank() {
                    report.skipped_rows += 1;
                } else {
                    report.entries.push(entry);
                }
            }
            Err(e) => {
                tracing::warn!(origin, row = line + 2, error = %e, "skipping unreadable row");
                report.skipped_rows += 1;
            }
        }
    }

    tracing::info!(
        origin,
        entries = report.entries.len(),
        skipped = report.skipped_rows,
        "catalog spreadsheet read"
    );
    Ok(report)
}

/// Reads a `.csv` or `.tsv` file; the delimiter follows the extension.
pub fn import_csv_path(path: &Path) -> Result<ImportReport> {
    let delimiter = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
        _ => b',',
    };
    let file = std::fs::File::open(path)?;
    import_csv(file, delimiter, &path.to_string_lossy())
}
