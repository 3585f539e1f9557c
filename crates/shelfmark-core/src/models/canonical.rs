use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::source::{BookMetadata, Field, MetadataSource};

/// The single merged record produced from all source records of one book.
pub type CanonicalRecord = BookMetadata;

/// Which source supplied each populated field of a canonical record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Provenance {
    fields: BTreeMap<Field, MetadataSource>,
}

impl Provenance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, field: Field, source: MetadataSource) {
        self.fields.insert(field, source);
    }

    pub fn source_of(&self, field: Field) -> Option<MetadataSource> {
        self.fields.get(&field).copied()
    }

    /// Drops entries for fields the record does not actually carry.
    pub fn restrict_to(&mut self, record: &CanonicalRecord) {
        self.fields.retain(|field, _| record.has(*field));
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, MetadataSource)> + '_ {
        self.fields.iter().map(|(f, s)| (*f, *s))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restrict_to_populated_fields() {
        let record = CanonicalRecord::new("Emma");
        let mut provenance = Provenance::new();
        provenance.record(Field::Title, MetadataSource::Vision);
        provenance.record(Field::Publisher, MetadataSource::GoogleBooks);

        provenance.restrict_to(&record);
        assert_eq!(provenance.len(), 1);
        assert_eq!(provenance.source_of(Field::Title), Some(MetadataSource::Vision));
    }

    #[test]
    fn test_serializes_as_flat_map() {
        let mut provenance = Provenance::new();
        provenance.record(Field::OclcNo, MetadataSource::OpenLibrary);
        let json = serde_json::to_string(&provenance).unwrap();
        assert_eq!(json, r#"{"oclc_no":"open_library"}"#);
    }
}
