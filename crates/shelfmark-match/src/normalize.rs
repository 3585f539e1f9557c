//! String and identifier canonicalization shared by merging and duplicate detection.
//!
//! Every function here is total: malformed or missing input yields an empty
//! string or set, never an error.

use std::borrow::Cow;
use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

static BRACKETED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\([^)]*\)|\[[^\]]*\]").expect("valid bracketed-text regex"));

static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"1[0-9]{3}|20[0-9]{2}").expect("valid year regex"));

pub type TokenSet = HashSet<String>;

/// Anything that can be read as an author string: a single name string or a list of names.
pub trait AuthorText {
    fn author_text(&self) -> Cow<'_, str>;
}

impl AuthorText for str {
    fn author_text(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl AuthorText for String {
    fn author_text(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}

impl<S: AsRef<str>> AuthorText for [S] {
    fn author_text(&self) -> Cow<'_, str> {
        let names: Vec<&str> = self
            .iter()
            .map(|name| name.as_ref().trim())
            .filter(|name| !name.is_empty())
            .collect();
        Cow::Owned(names.join(", "))
    }
}

impl<S: AsRef<str>> AuthorText for Vec<S> {
    fn author_text(&self) -> Cow<'_, str> {
        self.as_slice().author_text()
    }
}

/// Lower-cases, drops `(...)`/`[...]` asides and any subtitle after the first
/// colon, turns punctuation into spaces and collapses whitespace.
pub fn normalize_title(title: &str) -> String {
    let lowercase = title.to_lowercase();
    let without_asides = BRACKETED_RE.replace_all(&lowercase, " ");
    let main_title = without_asides.split(':').next().unwrap_or_default();
    collapse_alphanumeric(main_title)
}

/// Joins author lists with `", "`, then lower-cases and trims.
pub fn normalize_author<T: AuthorText + ?Sized>(authors: &T) -> String {
    authors.author_text().trim().to_lowercase()
}

/// Whitespace tokens of the normalized title.
pub fn title_tokens(title: &str) -> TokenSet {
    normalize_title(title)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Name tokens of an author string.
///
/// Names are split on `,`, `&` and `" and "` and the pieces are pooled into
/// one set, so "Austen, Jane" and "Jane Austen" tokenize identically, as do
/// co-authors listed in a different order.
pub fn author_tokens<T: AuthorText + ?Sized>(authors: &T) -> TokenSet {
    let normalized = normalize_author(authors);
    normalized
        .replace('&', ",")
        .replace(" and ", ",")
        .split(',')
        .flat_map(words)
        .collect()
}

/// Keeps the digits and `X` check characters of an ISBN-like string, in order.
///
/// No checksum validation is done; a non-empty result is not a valid ISBN
/// guarantee.
pub fn normalize_isbn(isbn: &str) -> String {
    isbn.chars()
        .filter_map(|c| match c {
            '0'..='9' | 'X' => Some(c),
            'x' => Some('X'),
            _ => None,
        })
        .collect()
}

/// First year-like run of four digits (`1000`–`2099`) anywhere in the text.
pub fn extract_year(text: &str) -> String {
    YEAR_RE
        .find(text)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// `|A ∩ B| / |A ∪ B|`, or `0.0` when either side is empty.
pub fn jaccard(a: &TokenSet, b: &TokenSet) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

fn collapse_alphanumeric(text: &str) -> String {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
