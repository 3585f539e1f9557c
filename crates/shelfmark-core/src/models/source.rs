use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CoreError;

/// Where a piece of metadata came from.
///
/// `Vision` (extraction from the photographed cover) is the primary source:
/// it is the only one trusted for ISBNs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataSource {
    Vision,
    GoogleBooks,
    OpenLibrary,
    LibraryOfCongress,
    Isbnlib,
    Worldcat,
    Manual,
}

impl MetadataSource {
    pub const ALL: [MetadataSource; 7] = [
        Self::Vision,
        Self::GoogleBooks,
        Self::OpenLibrary,
        Self::LibraryOfCongress,
        Self::Isbnlib,
        Self::Worldcat,
        Self::Manual,
    ];

    pub const PRIMARY: MetadataSource = Self::Vision;

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vision => "vision",
            Self::GoogleBooks => "google_books",
            Self::OpenLibrary => "open_library",
            Self::LibraryOfCongress => "library_of_congress",
            Self::Isbnlib => "isbnlib",
            Self::Worldcat => "worldcat",
            Self::Manual => "manual",
        }
    }

    pub fn is_primary(&self) -> bool {
        *self == Self::PRIMARY
    }
}

impl fmt::Display for MetadataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetadataSource {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|source| source.as_str() == key)
            .ok_or_else(|| CoreError::UnknownSource(s.to_string()))
    }
}

/// Keys of the bibliographic field vocabulary shared by source and canonical records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    Authors,
    Publisher,
    PublishedDate,
    Edition,
    Series,
    Genre,
    Language,
    Isbn,
    Isbn10,
    Isbn13,
    Lccn,
    OclcNo,
    AdditionalText,
}

impl Field {
    pub const ALL: [Field; 14] = [
        Self::Title,
        Self::Authors,
        Self::Publisher,
        Self::PublishedDate,
        Self::Edition,
        Self::Series,
        Self::Genre,
        Self::Language,
        Self::Isbn,
        Self::Isbn10,
        Self::Isbn13,
        Self::Lccn,
        Self::OclcNo,
        Self::AdditionalText,
    ];

    /// Identifiers only ever taken from the primary source.
    pub const ISBN_FAMILY: [Field; 3] = [Self::Isbn, Self::Isbn10, Self::Isbn13];

    /// Fields resolved by first non-empty value in source priority order.
    pub const BY_PRIORITY: [Field; 10] = [
        Self::Title,
        Self::Authors,
        Self::Publisher,
        Self::PublishedDate,
        Self::Edition,
        Self::Series,
        Self::Genre,
        Self::Language,
        Self::OclcNo,
        Self::AdditionalText,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Authors => "authors",
            Self::Publisher => "publisher",
            Self::PublishedDate => "published_date",
            Self::Edition => "edition",
            Self::Series => "series",
            Self::Genre => "genre",
            Self::Language => "language",
            Self::Isbn => "isbn",
            Self::Isbn10 => "isbn10",
            Self::Isbn13 => "isbn13",
            Self::Lccn => "lccn",
            Self::OclcNo => "oclc_no",
            Self::AdditionalText => "additional_text",
        }
    }

    pub fn is_isbn(&self) -> bool {
        Self::ISBN_FAMILY.contains(self)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The bibliographic field vocabulary. Every field is optional; empty strings
/// are normalized to `None` on deserialization.
///
/// Adapters spell some keys differently (`author`, `year`, `isbn_10`,
/// `isbn_13`) and a few send both spellings at once. Both are read; the
/// canonical key wins when both carry a value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawBookMetadata")]
pub struct BookMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub edition: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn10: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn13: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lccn: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub oclc_no: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_text: Option<String>,
}

/// Wire shape of [`BookMetadata`], with the adapter spellings kept apart.
#[derive(Deserialize)]
struct RawBookMetadata {
    #[serde(default, deserialize_with = "text")]
    title: Option<String>,
    #[serde(default, deserialize_with = "author_list")]
    authors: Vec<String>,
    #[serde(default, deserialize_with = "author_list")]
    author: Vec<String>,
    #[serde(default, deserialize_with = "text")]
    publisher: Option<String>,
    #[serde(default, deserialize_with = "text")]
    published_date: Option<String>,
    #[serde(default, deserialize_with = "text")]
    year: Option<String>,
    #[serde(default, deserialize_with = "text")]
    edition: Option<String>,
    #[serde(default, deserialize_with = "text")]
    series: Option<String>,
    #[serde(default, deserialize_with = "text")]
    genre: Option<String>,
    #[serde(default, deserialize_with = "text")]
    language: Option<String>,
    #[serde(default, deserialize_with = "text")]
    isbn: Option<String>,
    #[serde(default, deserialize_with = "text")]
    isbn10: Option<String>,
    #[serde(default, deserialize_with = "text")]
    isbn_10: Option<String>,
    #[serde(default, deserialize_with = "text")]
    isbn13: Option<String>,
    #[serde(default, deserialize_with = "text")]
    isbn_13: Option<String>,
    #[serde(default, deserialize_with = "text")]
    lccn: Option<String>,
    #[serde(default, deserialize_with = "text")]
    oclc_no: Option<String>,
    #[serde(default, deserialize_with = "text")]
    additional_text: Option<String>,
}

impl From<RawBookMetadata> for BookMetadata {
    fn from(raw: RawBookMetadata) -> Self {
        Self {
            title: raw.title,
            authors: if raw.authors.is_empty() { raw.author } else { raw.authors },
            publisher: raw.publisher,
            published_date: raw.published_date.or(raw.year),
            edition: raw.edition,
            series: raw.series,
            genre: raw.genre,
            language: raw.language,
            isbn: raw.isbn,
            isbn10: raw.isbn10.or(raw.isbn_10),
            isbn13: raw.isbn13.or(raw.isbn_13),
            lccn: raw.lccn,
            oclc_no: raw.oclc_no,
            additional_text: raw.additional_text,
        }
    }
}

impl BookMetadata {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: non_empty(title.into()),
            ..Default::default()
        }
    }

    /// Text value of a scalar field. `Field::Authors` is a list and always yields `None`.
    pub fn text(&self, field: Field) -> Option<&str> {
        let value = match field {
            Field::Title => &self.title,
            Field::Authors => return None,
            Field::Publisher => &self.publisher,
            Field::PublishedDate => &self.published_date,
            Field::Edition => &self.edition,
            Field::Series => &self.series,
            Field::Genre => &self.genre,
            Field::Language => &self.language,
            Field::Isbn => &self.isbn,
            Field::Isbn10 => &self.isbn10,
            Field::Isbn13 => &self.isbn13,
            Field::Lccn => &self.lccn,
            Field::OclcNo => &self.oclc_no,
            Field::AdditionalText => &self.additional_text,
        };
        value.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    fn slot_mut(&mut self, field: Field) -> Option<&mut Option<String>> {
        Some(match field {
            Field::Title => &mut self.title,
            Field::Authors => return None,
            Field::Publisher => &mut self.publisher,
            Field::PublishedDate => &mut self.published_date,
            Field::Edition => &mut self.edition,
            Field::Series => &mut self.series,
            Field::Genre => &mut self.genre,
            Field::Language => &mut self.language,
            Field::Isbn => &mut self.isbn,
            Field::Isbn10 => &mut self.isbn10,
            Field::Isbn13 => &mut self.isbn13,
            Field::Lccn => &mut self.lccn,
            Field::OclcNo => &mut self.oclc_no,
            Field::AdditionalText => &mut self.additional_text,
        })
    }

    /// Sets a scalar field; blank values clear it. Ignored for `Field::Authors`.
    pub fn set_text(&mut self, field: Field, value: Option<&str>) {
        if let Some(slot) = self.slot_mut(field) {
            *slot = value.and_then(|v| non_empty(v.to_string()));
        }
    }

    /// Author names with blank entries removed.
    pub fn author_names(&self) -> Vec<&str> {
        self.authors
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .collect()
    }

    pub fn has(&self, field: Field) -> bool {
        match field {
            Field::Authors => !self.author_names().is_empty(),
            other => self.text(other).is_some(),
        }
    }

    pub fn populated_fields(&self) -> Vec<Field> {
        Field::ALL.into_iter().filter(|f| self.has(*f)).collect()
    }

    pub fn is_empty(&self) -> bool {
        Field::ALL.iter().all(|f| !self.has(*f))
    }

    /// The first populated ISBN, preferring the generic `isbn` field, then ISBN-13, then ISBN-10.
    pub fn preferred_isbn(&self) -> Option<&str> {
        self.text(Field::Isbn)
            .or_else(|| self.text(Field::Isbn13))
            .or_else(|| self.text(Field::Isbn10))
    }
}

/// One adapter's view of a book, tagged with its source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub source: MetadataSource,

    #[serde(flatten)]
    pub metadata: BookMetadata,
}

impl SourceRecord {
    pub fn new(source: MetadataSource, metadata: BookMetadata) -> Self {
        Self { source, metadata }
    }

    /// A source that returned nothing. Adapters hand these back on failure.
    pub fn empty(source: MetadataSource) -> Self {
        Self::new(source, BookMetadata::default())
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }
}

pub(crate) fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == value.len() {
        Some(value)
    } else {
        Some(trimmed.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawText {
    Text(String),
    Integer(i64),
    Float(f64),
    List(Vec<Option<RawText>>),
}

impl RawText {
    fn into_text(self) -> Option<String> {
        match self {
            Self::Text(s) => non_empty(s),
            Self::Integer(n) => Some(n.to_string()),
            Self::Float(n) => Some(n.to_string()),
            Self::List(items) => {
                let parts: Vec<String> = items
                    .into_iter()
                    .flatten()
                    .filter_map(RawText::into_text)
                    .collect();
                non_empty(parts.join("; "))
            }
        }
    }
}

fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawText>::deserialize(deserializer)?;
    Ok(raw.and_then(RawText::into_text))
}

fn author_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawText>::deserialize(deserializer)?;
    let authors = match raw {
        None => Vec::new(),
        Some(RawText::List(items)) => items
            .into_iter()
            .flatten()
            .filter_map(RawText::into_text)
            .collect(),
        Some(other) => other.into_text().into_iter().collect(),
    };
    Ok(authors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_record_from_adapter_json() {
        let json = r#"{
            "source": "google_books",
            "title": "  Dune ",
            "author": "Frank Herbert",
            "year": 1965,
            "isbn_13": "9780441172719",
            "publisher": "",
            "genre": null
        }"#;
        let record: SourceRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.source, MetadataSource::GoogleBooks);
        assert_eq!(record.metadata.title.as_deref(), Some("Dune"));
        assert_eq!(record.metadata.authors, vec!["Frank Herbert"]);
        assert_eq!(record.metadata.published_date.as_deref(), Some("1965"));
        assert_eq!(record.metadata.isbn13.as_deref(), Some("9780441172719"));
        assert!(record.metadata.publisher.is_none());
        assert!(record.metadata.genre.is_none());
    }

    #[test]
    fn test_both_spellings_of_a_field() {
        let json = r#"{
            "source": "isbnlib",
            "title": "Matilda",
            "author": "Roald Dahl",
            "authors": ["Roald Dahl", "Quentin Blake"],
            "publisher": "Puffin",
            "published_date": "",
            "year": "1988",
            "isbn_13": "9780140328721",
            "isbn13": "978-0-14-032872-1",
            "isbn_10": "0140328726"
        }"#;
        let record: SourceRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.metadata.authors, vec!["Roald Dahl", "Quentin Blake"]);
        assert_eq!(record.metadata.published_date.as_deref(), Some("1988"));
        assert_eq!(record.metadata.isbn13.as_deref(), Some("978-0-14-032872-1"));
        assert_eq!(record.metadata.isbn10.as_deref(), Some("0140328726"));

        let written = serde_json::to_value(&record).unwrap();
        assert!(written.get("author").is_none());
        assert!(written.get("year").is_none());
        assert_eq!(written["published_date"], "1988");
    }

    #[test]
    fn test_authors_list_skips_blanks() {
        let json = r#"{"source": "vision", "authors": ["Jane Austen", "", null]}"#;
        let record: SourceRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.metadata.authors, vec!["Jane Austen"]);
    }

    #[test]
    fn test_isbn_list_is_joined() {
        let json = r#"{"source": "open_library", "isbn": ["0441172717", "9780441172719"]}"#;
        let record: SourceRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.metadata.isbn.as_deref(), Some("0441172717; 9780441172719"));
    }

    #[test]
    fn test_empty_record() {
        let record: SourceRecord = serde_json::from_str(r#"{"source": "worldcat"}"#).unwrap();
        assert!(record.is_empty());
        assert!(SourceRecord::empty(MetadataSource::Isbnlib).is_empty());
    }

    #[test]
    fn test_populated_fields_and_set_text() {
        let mut meta = BookMetadata::new("Emma");
        meta.set_text(Field::Publisher, Some("  "));
        meta.set_text(Field::Lccn, Some("2001012345"));
        meta.set_text(Field::Authors, Some("ignored"));
        assert_eq!(meta.populated_fields(), vec![Field::Title, Field::Lccn]);
        assert!(meta.authors.is_empty());
    }

    #[test]
    fn test_preferred_isbn_order() {
        let meta = BookMetadata {
            isbn10: Some("0306406152".to_string()),
            isbn13: Some("9780306406157".to_string()),
            ..Default::default()
        };
        assert_eq!(meta.preferred_isbn(), Some("9780306406157"));
    }

    #[test]
    fn test_field_groups_cover_vocabulary_once() {
        for field in Field::ALL {
            let groups = [field.is_isbn(), field == Field::Lccn, Field::BY_PRIORITY.contains(&field)];
            assert_eq!(groups.iter().filter(|g| **g).count(), 1, "{field}");
        }
    }

    #[test]
    fn test_source_from_str() {
        assert_eq!("Open-Library".parse::<MetadataSource>().unwrap(), MetadataSource::OpenLibrary);
        assert!("goodreads".parse::<MetadataSource>().is_err());
        assert!(MetadataSource::Vision.is_primary());
    }
}
