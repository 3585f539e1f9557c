use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shelfmark_core::{CanonicalRecord, Field, MetadataSource, Provenance, SourceRecord};

use super::strategy::{MergeInput, MergeStrategy, MergedRecord};
use crate::error::Result;

/// What an external merger hands back.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DelegateResponse {
    #[serde(default)]
    pub merged_metadata: CanonicalRecord,

    /// Claimed winning source per field. Kept raw so that an unknown field or
    /// source name does not make the whole answer unreadable.
    #[serde(default)]
    pub provenance: Option<BTreeMap<String, serde_json::Value>>,
}

impl DelegateResponse {
    fn claimed_source(&self, field: Field) -> Option<MetadataSource> {
        self.provenance
            .as_ref()?
            .get(field.as_str())?
            .as_str()?
            .parse()
            .ok()
    }
}

/// External program or service able to merge source records on its own terms.
pub trait MergeDelegate: Send + Sync {
    fn name(&self) -> &str;
    fn merge(&self, records: &[SourceRecord], want_provenance: bool) -> Result<DelegateResponse>;
}

/// Preferred strategy backed by a [`MergeDelegate`].
///
/// The delegate may restyle a value, but its answer is checked before use:
/// every field must carry the value of the source the priority rules pick,
/// so a delegated merge never disagrees with [`PriorityMerge`] on which
/// source wins.
///
/// [`PriorityMerge`]: super::strategy::PriorityMerge
pub struct DelegatedMerge<D> {
    delegate: D,
}

impl<D: MergeDelegate> DelegatedMerge<D> {
    pub fn new(delegate: D) -> Self {
        Self { delegate }
    }

    pub fn delegate(&self) -> &D {
        &self.delegate
    }
}

impl<D: MergeDelegate> MergeStrategy for DelegatedMerge<D> {
    fn name(&self) -> &str {
        self.delegate.name()
    }

    fn merge(&self, input: &MergeInput<'_>) -> Result<MergedRecord> {
        let response = self.delegate.merge(input.records, input.with_provenance)?;
        Ok(enforce_invariants(input, &response))
    }
}

/// Rebuilds a delegate answer so that it satisfies the same invariants as the
/// rule-based merge.
///
/// Each field takes the winning source's value. The delegate's spelling is
/// kept when it only differs from that value in case or spacing; anything
/// else it proposes is replaced. An empty answer stays empty so the caller
/// can fall back.
pub fn enforce_invariants(input: &MergeInput<'_>, response: &DelegateResponse) -> MergedRecord {
    let proposed = &response.merged_metadata;
    let mut record = CanonicalRecord::default();
    let mut provenance = Provenance::new();

    if proposed.is_empty() {
        tracing::debug!("delegate returned an empty record");
        return MergedRecord {
            record,
            provenance: input.with_provenance.then_some(provenance),
        };
    }

    for field in Field::ALL {
        let Some(winner) = input.winner(field) else {
            if proposed.has(field) {
                tracing::debug!(%field, "dropping value no accepted source supplied");
            }
            continue;
        };

        if field == Field::Authors {
            let ruled = winner.metadata.author_names();
            let offered = proposed.author_names();
            let names = if same_authors(&offered, &ruled) {
                offered
            } else {
                tracing::debug!(proposed = ?offered, ruled = ?ruled, "delegate authors replaced by rule");
                ruled
            };
            record.authors = names.into_iter().map(str::to_string).collect();
        } else {
            let ruled = winner.metadata.text(field);
            let value = match proposed.text(field) {
                Some(offered) if ruled.is_some_and(|r| same_text(offered, r)) => Some(offered),
                offered => {
                    tracing::debug!(%field, proposed = ?offered, ?ruled, "delegate value replaced by rule");
                    ruled
                }
            };
            record.set_text(field, value);
        }

        let source = response
            .claimed_source(field)
            .filter(|claimed| *claimed != winner.source && supplied_same(input, field, *claimed, winner))
            .unwrap_or(winner.source);
        provenance.record(field, source);
    }

    provenance.restrict_to(&record);
    MergedRecord {
        record,
        provenance: input.with_provenance.then_some(provenance),
    }
}

fn same_text(a: &str, b: &str) -> bool {
    let mut left = a.split_whitespace();
    let mut right = b.split_whitespace();
    loop {
        match (left.next(), right.next()) {
            (None, None) => return true,
            (Some(l), Some(r)) if l.to_lowercase() == r.to_lowercase() => {}
            _ => return false,
        }
    }
}

fn same_authors(a: &[&str], b: &[&str]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| same_text(x, y))
}

/// Whether `claimed` is an accepted source holding the same value as the
/// winning record, so crediting it does not change the outcome.
fn supplied_same(input: &MergeInput<'_>, field: Field, claimed: MetadataSource, winner: &SourceRecord) -> bool {
    if !input.accepts(claimed, field) {
        return false;
    }
    input.records.iter().filter(|r| r.source == claimed).any(|r| {
        if field == Field::Authors {
            same_authors(&r.metadata.author_names(), &winner.metadata.author_names())
        } else {
            match (r.metadata.text(field), winner.metadata.text(field)) {
                (Some(a), Some(b)) => same_text(a, b),
                _ => false,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MatchError;
    use crate::merge::priority::SourcePriority;
    use crate::merge::strategy::PriorityMerge;
    use shelfmark_core::BookMetadata;

    struct Canned(DelegateResponse);

    impl MergeDelegate for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        fn merge(&self, _: &[SourceRecord], _: bool) -> Result<DelegateResponse> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    impl MergeDelegate for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn merge(&self, _: &[SourceRecord], _: bool) -> Result<DelegateResponse> {
            Err(MatchError::DelegateFailed("exit status 2".to_string()))
        }
    }

    fn sources() -> Vec<SourceRecord> {
        vec![
            SourceRecord::new(
                MetadataSource::Vision,
                BookMetadata {
                    title: Some("Matilda".to_string()),
                    isbn: Some("9780140328721".to_string()),
                    ..Default::default()
                },
            ),
            SourceRecord::new(
                MetadataSource::GoogleBooks,
                BookMetadata {
                    title: Some("Matilda (Puffin Books)".to_string()),
                    authors: vec!["Roald Dahl".to_string()],
                    isbn: Some("0000000000".to_string()),
                    publisher: Some("Puffin".to_string()),
                    ..Default::default()
                },
            ),
            SourceRecord::new(
                MetadataSource::LibraryOfCongress,
                BookMetadata {
                    lccn: Some("88012345".to_string()),
                    ..Default::default()
                },
            ),
        ]
    }

    #[test]
    fn guard_restores_rule_winners() {
        let records = sources();
        let priority = SourcePriority::default();
        let response = DelegateResponse {
            merged_metadata: BookMetadata {
                title: Some("Matilda (Puffin Books)".to_string()),
                isbn: Some("0000000000".to_string()),
                lccn: Some("wrong".to_string()),
                ..Default::default()
            },
            provenance: Some(BTreeMap::from([("title".to_string(), serde_json::json!("google_books"))])),
        };
        let input = MergeInput::new(&records, &priority).with_provenance(true);
        let merged = DelegatedMerge::new(Canned(response)).merge(&input).unwrap();

        assert_eq!(merged.record.isbn.as_deref(), Some("9780140328721"));
        assert_eq!(merged.record.lccn.as_deref(), Some("88012345"));
        assert_eq!(merged.record.title.as_deref(), Some("Matilda"));
        assert_eq!(merged.record.publisher.as_deref(), Some("Puffin"));
        assert_eq!(merged.record.authors, vec!["Roald Dahl"]);
        let provenance = merged.provenance.unwrap();
        assert_eq!(provenance.source_of(Field::Title), Some(MetadataSource::Vision));
        assert_eq!(provenance.source_of(Field::Isbn), Some(MetadataSource::Vision));
        assert_eq!(provenance.source_of(Field::Publisher), Some(MetadataSource::GoogleBooks));
    }

    #[test]
    fn guard_keeps_restyling_and_drops_invented_values() {
        let records = sources();
        let priority = SourcePriority::default();
        let response = DelegateResponse {
            merged_metadata: BookMetadata {
                title: Some("matilda".to_string()),
                authors: vec!["Roald Dahl".to_string(), "Quentin Blake".to_string()],
                genre: Some("Children's fiction".to_string()),
                ..Default::default()
            },
            provenance: None,
        };
        let input = MergeInput::new(&records, &priority);
        let merged = enforce_invariants(&input, &response);

        assert_eq!(merged.record.title.as_deref(), Some("matilda"));
        assert_eq!(merged.record.authors, vec!["Roald Dahl"]);
        assert!(merged.record.genre.is_none());
        assert!(merged.provenance.is_none());
    }

    #[test]
    fn guard_agrees_with_rule_merge() {
        let records = sources();
        let priority = SourcePriority::default();
        let input = MergeInput::new(&records, &priority).with_provenance(true);
        let response = DelegateResponse {
            merged_metadata: records[1].metadata.clone(),
            provenance: None,
        };

        let guarded = enforce_invariants(&input, &response);
        let ruled = PriorityMerge.merge_records(&input);
        assert_eq!(guarded, ruled);
    }

    #[test]
    fn empty_answer_stays_empty() {
        let records = sources();
        let priority = SourcePriority::default();
        let input = MergeInput::new(&records, &priority).with_provenance(true);
        let merged = enforce_invariants(&input, &DelegateResponse::default());
        assert!(merged.record.is_empty());
        assert_eq!(merged.provenance, Some(Provenance::new()));
    }

    #[test]
    fn claimed_provenance_kept_only_when_true() {
        let records = vec![
            SourceRecord::new(MetadataSource::Vision, BookMetadata::new("Emma")),
            SourceRecord::new(MetadataSource::OpenLibrary, BookMetadata::new("Emma")),
        ];
        let priority = SourcePriority::default();
        let input = MergeInput::new(&records, &priority).with_provenance(true);

        let claims = |source: &str| DelegateResponse {
            merged_metadata: BookMetadata::new("Emma"),
            provenance: Some(BTreeMap::from([("title".to_string(), serde_json::json!(source))])),
        };

        let merged = enforce_invariants(&input, &claims("open_library"));
        assert_eq!(
            merged.provenance.unwrap().source_of(Field::Title),
            Some(MetadataSource::OpenLibrary)
        );

        let merged = enforce_invariants(&input, &claims("worldcat"));
        assert_eq!(
            merged.provenance.unwrap().source_of(Field::Title),
            Some(MetadataSource::Vision)
        );

        let merged = enforce_invariants(&input, &claims("no such source"));
        assert_eq!(
            merged.provenance.unwrap().source_of(Field::Title),
            Some(MetadataSource::Vision)
        );
    }

    #[test]
    fn delegate_error_propagates_to_caller() {
        let records = sources();
        let priority = SourcePriority::default();
        let input = MergeInput::new(&records, &priority);
        assert!(matches!(
            DelegatedMerge::new(Broken).merge(&input),
            Err(MatchError::DelegateFailed(_))
        ));
    }

    #[test]
    fn response_parses_loose_json() {
        let json = r#"{
            "merged_metadata": {"title": "Matilda", "author": "Roald Dahl", "year": 1988},
            "provenance": {"title": "vision", "authors": 3, "cover": "vision"}
        }"#;
        let response: DelegateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.merged_metadata.authors, vec!["Roald Dahl"]);
        assert_eq!(response.claimed_source(Field::Title), Some(MetadataSource::Vision));
        assert_eq!(response.claimed_source(Field::Authors), None);
    }
}
