use serde::Serialize;
use shelfmark_core::{CanonicalRecord, Field, MetadataSource, Provenance, SourceRecord};

use super::priority::SourcePriority;
use crate::error::Result;

/// Everything a merge strategy gets to look at. The record list is complete:
/// all adapters have answered before a merge starts.
#[derive(Debug, Clone, Copy)]
pub struct MergeInput<'a> {
    pub records: &'a [SourceRecord],
    pub priority: &'a SourcePriority,
    pub with_provenance: bool,
}

impl<'a> MergeInput<'a> {
    pub fn new(records: &'a [SourceRecord], priority: &'a SourcePriority) -> Self {
        Self {
            records,
            priority,
            with_provenance: false,
        }
    }

    pub fn with_provenance(mut self, enabled: bool) -> Self {
        self.with_provenance = enabled;
        self
    }

    /// Whether `source` is allowed to supply `field` at all.
    pub fn accepts(&self, source: MetadataSource, field: Field) -> bool {
        match field {
            f if f.is_isbn() => source.is_primary(),
            Field::Lccn => source == self.priority.lccn_source(),
            f => Field::BY_PRIORITY.contains(&f),
        }
    }

    /// The winning record for `field`: the highest-priority accepted source with a value.
    pub fn winner(&self, field: Field) -> Option<&'a SourceRecord> {
        self.priority
            .sort(self.records)
            .into_iter()
            .filter(|r| self.accepts(r.source, field))
            .find(|r| r.metadata.has(field))
    }

    /// True when at least one source supplied a value the merge rules can use.
    pub fn has_mergeable_data(&self) -> bool {
        Field::ALL.iter().any(|f| self.winner(*f).is_some())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergedRecord {
    pub record: CanonicalRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
}

/// One way of turning source records into a canonical record.
pub trait MergeStrategy: Send + Sync {
    fn name(&self) -> &str;
    fn merge(&self, input: &MergeInput<'_>) -> Result<MergedRecord>;
}

/// Deterministic rule-based merge: ISBNs from the primary source, the LCCN
/// from the authoritative source, everything else first-non-empty by priority.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityMerge;

impl PriorityMerge {
    pub const NAME: &'static str = "priority";

    /// Infallible counterpart of [`MergeStrategy::merge`].
    pub fn merge_records(&self, input: &MergeInput<'_>) -> MergedRecord {
        let mut record = CanonicalRecord::default();
        let mut provenance = input.with_provenance.then(Provenance::new);

        for field in Field::ALL {
            let Some(winner) = input.winner(field) else {
                continue;
            };
            if field == Field::Authors {
                record.authors = winner
                    .metadata
                    .author_names()
                    .into_iter()
                    .map(str::to_string)
                    .collect();
            } else {
                record.set_text(field, winner.metadata.text(field));
            }
            if let Some(provenance) = provenance.as_mut() {
                provenance.record(field, winner.source);
            }
        }

        MergedRecord { record, provenance }
    }
}

impl MergeStrategy for PriorityMerge {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn merge(&self, input: &MergeInput<'_>) -> Result<MergedRecord> {
        Ok(self.merge_records(input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelfmark_core::BookMetadata;

    fn record(source: MetadataSource, metadata: BookMetadata) -> SourceRecord {
        SourceRecord::new(source, metadata)
    }

    #[test]
    fn isbn_only_from_primary_and_title_priority() {
        let records = vec![
            record(
                MetadataSource::GoogleBooks,
                BookMetadata {
                    isbn: Some("0000000000".to_string()),
                    title: Some("B".to_string()),
                    publisher: Some("P".to_string()),
                    ..Default::default()
                },
            ),
            record(
                MetadataSource::Vision,
                BookMetadata {
                    isbn: Some("9780140328721".to_string()),
                    title: Some("A".to_string()),
                    ..Default::default()
                },
            ),
        ];
        let priority = SourcePriority::default();
        let merged = PriorityMerge.merge_records(&MergeInput::new(&records, &priority));

        assert_eq!(merged.record.isbn.as_deref(), Some("9780140328721"));
        assert_eq!(merged.record.title.as_deref(), Some("A"));
        assert_eq!(merged.record.publisher.as_deref(), Some("P"));
        assert!(merged.provenance.is_none());
    }

    #[test]
    fn secondary_isbn_is_never_backfilled() {
        let records = vec![
            record(MetadataSource::Vision, BookMetadata::new("Dune")),
            record(
                MetadataSource::OpenLibrary,
                BookMetadata {
                    isbn13: Some("9780441172719".to_string()),
                    isbn10: Some("0441172717".to_string()),
                    ..Default::default()
                },
            ),
        ];
        let priority = SourcePriority::default();
        let merged = PriorityMerge.merge_records(&MergeInput::new(&records, &priority));
        assert!(merged.record.isbn.is_none());
        assert!(merged.record.isbn10.is_none());
        assert!(merged.record.isbn13.is_none());
    }

    #[test]
    fn lccn_only_from_authoritative_source() {
        let lccn = |source, value: &str| {
            record(
                source,
                BookMetadata {
                    lccn: Some(value.to_string()),
                    ..Default::default()
                },
            )
        };
        let records = vec![
            lccn(MetadataSource::Vision, "11111111"),
            lccn(MetadataSource::LibraryOfCongress, "2001012345"),
        ];
        let priority = SourcePriority::default();
        let merged = PriorityMerge.merge_records(&MergeInput::new(&records, &priority));
        assert_eq!(merged.record.lccn.as_deref(), Some("2001012345"));

        let without_loc = vec![lccn(MetadataSource::Vision, "11111111")];
        let merged = PriorityMerge.merge_records(&MergeInput::new(&without_loc, &priority));
        assert!(merged.record.lccn.is_none());
    }

    #[test]
    fn provenance_covers_exactly_populated_fields() {
        let records = vec![
            record(
                MetadataSource::Vision,
                BookMetadata {
                    title: Some("Emma".to_string()),
                    isbn13: Some("9780141439587".to_string()),
                    ..Default::default()
                },
            ),
            record(
                MetadataSource::GoogleBooks,
                BookMetadata {
                    authors: vec!["Jane Austen".to_string()],
                    language: Some("en".to_string()),
                    ..Default::default()
                },
            ),
            SourceRecord::empty(MetadataSource::Worldcat),
        ];
        let priority = SourcePriority::default();
        let input = MergeInput::new(&records, &priority).with_provenance(true);
        let merged = PriorityMerge.merge_records(&input);
        let provenance = merged.provenance.unwrap();

        assert_eq!(provenance.len(), merged.record.populated_fields().len());
        assert_eq!(provenance.source_of(Field::Title), Some(MetadataSource::Vision));
        assert_eq!(provenance.source_of(Field::Authors), Some(MetadataSource::GoogleBooks));
        assert_eq!(provenance.source_of(Field::Isbn13), Some(MetadataSource::Vision));
        assert_eq!(provenance.source_of(Field::Publisher), None);
    }

    #[test]
    fn blank_values_do_not_win() {
        let records = vec![
            record(
                MetadataSource::Vision,
                BookMetadata {
                    title: Some("   ".to_string()),
                    authors: vec![" ".to_string()],
                    ..Default::default()
                },
            ),
            record(
                MetadataSource::OpenLibrary,
                BookMetadata {
                    title: Some("Middlemarch".to_string()),
                    authors: vec!["George Eliot".to_string()],
                    ..Default::default()
                },
            ),
        ];
        let priority = SourcePriority::default();
        let merged = PriorityMerge.merge_records(&MergeInput::new(&records, &priority));
        assert_eq!(merged.record.title.as_deref(), Some("Middlemarch"));
        assert_eq!(merged.record.authors, vec!["George Eliot"]);
    }

    #[test]
    fn no_sources_means_empty_record() {
        let priority = SourcePriority::default();
        let input = MergeInput::new(&[], &priority);
        assert!(!input.has_mergeable_data());
        assert!(PriorityMerge.merge_records(&input).record.is_empty());
    }
}
