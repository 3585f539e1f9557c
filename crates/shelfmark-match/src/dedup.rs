//! Duplicate detection of a candidate book against the existing catalog.
//!
//! A candidate is a duplicate when its ISBN matches an entry exactly, or when
//! both its title and author tokens overlap an entry's strongly enough.

use std::collections::HashMap;

use serde::Serialize;
use shelfmark_core::{AccessionNo, CanonicalRecord, CatalogEntry, MatchingConfig};

use crate::normalize::{author_tokens, jaccard, normalize_isbn, title_tokens, TokenSet};
use crate::record::catalog_entry;

/// Comparison key of a book. Derived on demand and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedKey {
    pub isbn_digits: String,
    pub title_tokens: TokenSet,
    pub author_tokens: TokenSet,
}

impl NormalizedKey {
    pub fn from_entry(entry: &CatalogEntry) -> Self {
        Self {
            isbn_digits: normalize_isbn(&entry.isbn),
            title_tokens: title_tokens(&entry.title),
            author_tokens: author_tokens(entry.author.as_str()),
        }
    }

    /// Normalizes a canonical record through its catalog projection, so that
    /// candidates and stored entries are compared on the same terms.
    pub fn from_record(record: &CanonicalRecord) -> Self {
        Self::from_entry(&catalog_entry(record))
    }

    fn supports_fuzzy(&self) -> bool {
        !self.title_tokens.is_empty() && !self.author_tokens.is_empty()
    }
}

#[derive(Debug, Clone)]
struct IndexedEntry {
    accession_no: Option<AccessionNo>,
    title: String,
    key: NormalizedKey,
}

/// Catalog entries with their comparison keys computed once.
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    entries: Vec<IndexedEntry>,
    by_isbn: HashMap<String, usize>,
}

impl CatalogIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build<'a>(entries: impl IntoIterator<Item = &'a CatalogEntry>) -> Self {
        let mut index = Self::new();
        for entry in entries {
            index.insert(entry);
        }
        index
    }

    pub fn insert(&mut self, entry: &CatalogEntry) {
        let key = NormalizedKey::from_entry(entry);
        let position = self.entries.len();
        if !key.isbn_digits.is_empty() {
            self.by_isbn.entry(key.isbn_digits.clone()).or_insert(position);
        }
        self.entries.push(IndexedEntry {
            accession_no: entry.accession_no,
            title: entry.title.clone(),
            key,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fuzzy match thresholds on Jaccard similarity.
///
/// The defaults were carried over untuned from manual cataloguing practice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchThresholds {
    pub title: f64,
    pub author: f64,
    pub strong_title: f64,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            title: 0.6,
            author: 0.5,
            strong_title: 0.75,
        }
    }
}

impl MatchThresholds {
    pub fn from_config(config: &MatchingConfig) -> Self {
        Self::default()
            .with_title(config.title_threshold)
            .with_author(config.author_threshold)
            .with_strong_title(config.strong_title_threshold)
    }

    pub fn with_title(mut self, threshold: f64) -> Self {
        self.title = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_author(mut self, threshold: f64) -> Self {
        self.author = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_strong_title(mut self, threshold: f64) -> Self {
        self.strong_title = threshold.clamp(0.0, 1.0);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchReason {
    Isbn,
    TokenOverlap { title_sim: f64, author_sim: f64 },
    StrongTitle { title_sim: f64 },
}

impl std::fmt::Display for MatchReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Isbn => f.write_str("same ISBN"),
            Self::TokenOverlap { title_sim, author_sim } => {
                write!(f, "title {title_sim:.2} and author {author_sim:.2} overlap")
            }
            Self::StrongTitle { title_sim } => write!(f, "title {title_sim:.2} overlap with a shared author"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateMatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accession_no: Option<AccessionNo>,
    pub title: String,
    pub reason: MatchReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Duplicate(DuplicateMatch),
    Unique,
}

impl Verdict {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct DuplicateDetector {
    thresholds: MatchThresholds,
}

impl DuplicateDetector {
    pub fn new(thresholds: MatchThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> MatchThresholds {
        self.thresholds
    }

    /// Exact ISBN first, then title/author token overlap against every entry
    /// in catalog order. The first matching entry wins.
    pub fn check(&self, candidate: &NormalizedKey, index: &CatalogIndex) -> Verdict {
        if !candidate.isbn_digits.is_empty()
            && let Some(&position) = index.by_isbn.get(&candidate.isbn_digits)
        {
            return duplicate(&index.entries[position], MatchReason::Isbn);
        }

        if !candidate.supports_fuzzy() {
            return Verdict::Unique;
        }

        for entry in &index.entries {
            if let Some(reason) = self.fuzzy_reason(candidate, &entry.key) {
                return duplicate(entry, reason);
            }
        }
        Verdict::Unique
    }

    pub fn is_duplicate(&self, candidate: &NormalizedKey, index: &CatalogIndex) -> bool {
        self.check(candidate, index).is_duplicate()
    }

    fn fuzzy_reason(&self, candidate: &NormalizedKey, existing: &NormalizedKey) -> Option<MatchReason> {
        let title_sim = jaccard(&candidate.title_tokens, &existing.title_tokens);
        let author_sim = jaccard(&candidate.author_tokens, &existing.author_tokens);

        if title_sim >= self.thresholds.title && author_sim >= self.thresholds.author {
            return Some(MatchReason::TokenOverlap { title_sim, author_sim });
        }
        let authors_intersect = !candidate.author_tokens.is_disjoint(&existing.author_tokens);
        if title_sim >= self.thresholds.strong_title && authors_intersect {
            return Some(MatchReason::StrongTitle { title_sim });
        }
        None
    }
}

fn duplicate(entry: &IndexedEntry, reason: MatchReason) -> Verdict {
    tracing::debug!(
        accession_no = ?entry.accession_no,
        title = %entry.title,
        ?reason,
        "duplicate found"
    );
    Verdict::Duplicate(DuplicateMatch {
        accession_no: entry.accession_no,
        title: entry.title.clone(),
        reason,
    })
}
