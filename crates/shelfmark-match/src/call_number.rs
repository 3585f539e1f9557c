//! Library of Congress style call numbers for merged records.
//!
//! A [`CallNumberDelegate`] (typically a cataloguing assistant) is asked
//! first. When there is none, or it fails or answers nothing usable, a
//! provisional number is built offline from genre, author, title and year
//! so that a book can always be shelved.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use shelfmark_core::{CanonicalRecord, Field};

use crate::error::Result;
use crate::merge::FallbackReason;

static LEADING_ARTICLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(a|an|the)\s+").expect("valid article regex"));
static FOUR_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}").expect("valid year regex"));
static LABEL_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^call\s*number\s*[:\-]?\s*").expect("valid label regex"));

/// Genre keywords per LC class. Later rows win over earlier ones.
const CLASSES: &[(&str, &[&str])] = &[
    ("D", &["history", "civilization"]),
    ("B", &["philosophy", "ethics", "logic"]),
    ("BL", &["religion", "islam", "christian", "jewish"]),
    ("HB", &["econom", "finance", "business"]),
    ("K", &["law", "legal"]),
    ("J", &["politic", "government", "intl relations"]),
    ("HM", &["sociol", "anthrop", "social"]),
    ("BF", &["psychol"]),
    ("Q", &["science", "physics", "chemistry", "math"]),
    ("QA", &["computer", "ai", "programming", "data"]),
    ("PN", &["literature", "novel", "poetry", "fiction", "mystery", "thriller"]),
];

/// Class for books whose genre says nothing (general works).
const DEFAULT_CLASS: &str = "Z";

/// External service able to propose a call number for a record.
pub trait CallNumberDelegate: Send + Sync {
    fn name(&self) -> &str;
    fn suggest(&self, record: &CanonicalRecord) -> Result<Option<String>>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum CallNumberOrigin {
    Delegate { delegate: String },
    Provisional { reason: FallbackReason },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallNumber {
    pub value: String,
    #[serde(flatten)]
    pub origin: CallNumberOrigin,
}

impl CallNumber {
    pub fn is_provisional(&self) -> bool {
        matches!(self.origin, CallNumberOrigin::Provisional { .. })
    }
}

#[derive(Default)]
pub struct CallNumberGenerator {
    preferred: Option<Box<dyn CallNumberDelegate>>,
}

impl CallNumberGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delegate(mut self, delegate: impl CallNumberDelegate + 'static) -> Self {
        self.preferred = Some(Box::new(delegate));
        self
    }

    /// Never fails: falls back to [`provisional_call_number`].
    pub fn assign(&self, record: &CanonicalRecord) -> CallNumber {
        let reason = match self.preferred.as_deref() {
            None => FallbackReason::NoPreferredStrategy,
            Some(delegate) => match delegate.suggest(record) {
                Ok(Some(raw)) => match clean_call_number(&raw) {
                    Some(value) => {
                        return CallNumber {
                            value,
                            origin: CallNumberOrigin::Delegate {
                                delegate: delegate.name().to_string(),
                            },
                        };
                    }
                    None => FallbackReason::EmptyResult {
                        strategy: delegate.name().to_string(),
                    },
                },
                Ok(None) => FallbackReason::EmptyResult {
                    strategy: delegate.name().to_string(),
                },
                Err(e) => FallbackReason::StrategyFailed {
                    strategy: delegate.name().to_string(),
                    error: e.to_string(),
                },
            },
        };

        if reason != FallbackReason::NoPreferredStrategy {
            tracing::warn!(%reason, "using provisional call number");
        }
        CallNumber {
            value: provisional_call_number(record),
            origin: CallNumberOrigin::Provisional { reason },
        }
    }
}

/// Offline LC-style number: `{class} .{author cutter} {title cutter} {year}`,
/// e.g. `PN .DAH MAT 1988`. Good enough to shelve a book until a cataloguer
/// assigns the real one.
pub fn provisional_call_number(record: &CanonicalRecord) -> String {
    let class = lc_class(record.text(Field::Genre).unwrap_or_default());

    let family = record
        .author_names()
        .first()
        .copied()
        .map(family_name)
        .unwrap_or_default();
    let author = cutter(family).unwrap_or_else(|| "AAA".to_string());

    let title = record.text(Field::Title).unwrap_or_default();
    let title = LEADING_ARTICLE.replace(title, "");
    let word = title
        .split_whitespace()
        .next()
        .and_then(cutter)
        .unwrap_or_else(|| "TIT".to_string());

    let year = record
        .text(Field::PublishedDate)
        .and_then(|date| FOUR_DIGITS.find(date))
        .map(|m| m.as_str())
        .unwrap_or_default();

    format!("{class} .{author} {word} {year}").trim_end().to_string()
}

/// Strips labels, quoting and trailing lines from a suggested call number.
pub fn clean_call_number(raw: &str) -> Option<String> {
    let first = raw.trim().lines().next()?;
    let unlabelled = LABEL_PREFIX.replace(first, "");
    let cleaned: String = unlabelled
        .chars()
        .filter(|c| !matches!(c, '`' | '"' | '\'' | '<' | '>'))
        .collect();
    let cleaned = cleaned.trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

fn lc_class(genre: &str) -> &'static str {
    let genre = genre.to_lowercase();
    CLASSES
        .iter()
        .rev()
        .find(|(_, keywords)| keywords.iter().any(|k| mentions(&genre, k)))
        .map(|(class, _)| *class)
        .unwrap_or(DEFAULT_CLASS)
}

/// Keywords under three letters only match whole words ("ai" must not match "fairy").
fn mentions(genre: &str, keyword: &str) -> bool {
    if keyword.len() < 3 {
        genre.split(|c: char| !c.is_alphanumeric()).any(|w| w == keyword)
    } else {
        genre.contains(keyword)
    }
}

/// "Austen, Jane" and "Jane Austen" both give "Austen".
fn family_name(name: &str) -> &str {
    match name.split_once(',') {
        Some((family, _)) if !family.trim().is_empty() => family.trim(),
        _ => name.split_whitespace().last().unwrap_or_default(),
    }
}

/// First three letters (Latin or Arabic), upper-cased.
fn cutter(word: &str) -> Option<String> {
    let letters: String = word
        .chars()
        .filter(|c| c.is_ascii_alphabetic() || ('\u{0600}'..='\u{06FF}').contains(c))
        .take(3)
        .collect::<String>()
        .to_uppercase();
    (!letters.is_empty()).then_some(letters)
}
