use shelfmark_core::{MergeConfig, MetadataSource, SourceRecord};

use crate::error::{MatchError, Result};

/// Total order over metadata sources used to break ties between them.
///
/// The primary (vision) source always ranks first. Sources missing from the
/// configured order rank after every listed one, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePriority {
    order: Vec<MetadataSource>,
    lccn_source: MetadataSource,
}

impl SourcePriority {
    pub fn new(order: Vec<MetadataSource>) -> Result<Self> {
        if order.first() != Some(&MetadataSource::PRIMARY) {
            return Err(MatchError::InvalidPriority(format!(
                "`{}` must be ranked first, got {:?}",
                MetadataSource::PRIMARY,
                order.first()
            )));
        }
        for (idx, source) in order.iter().enumerate() {
            if order[..idx].contains(source) {
                return Err(MatchError::InvalidPriority(format!("`{source}` listed twice")));
            }
        }
        Ok(Self {
            order,
            lccn_source: MetadataSource::LibraryOfCongress,
        })
    }

    pub fn from_config(config: &MergeConfig) -> Result<Self> {
        Ok(Self::new(config.priority.clone())?.with_lccn_source(config.lccn_source))
    }

    pub fn with_lccn_source(mut self, source: MetadataSource) -> Self {
        self.lccn_source = source;
        self
    }

    pub fn lccn_source(&self) -> MetadataSource {
        self.lccn_source
    }

    pub fn order(&self) -> &[MetadataSource] {
        &self.order
    }

    pub fn rank(&self, source: MetadataSource) -> usize {
        match self.order.iter().position(|s| *s == source) {
            Some(idx) => idx,
            None => {
                let declared = MetadataSource::ALL
                    .iter()
                    .position(|s| *s == source)
                    .unwrap_or(MetadataSource::ALL.len());
                self.order.len() + declared
            }
        }
    }

    /// Records in priority order. Records from the same source keep their input order.
    pub fn sort<'a>(&self, records: &'a [SourceRecord]) -> Vec<&'a SourceRecord> {
        let mut sorted: Vec<&SourceRecord> = records.iter().collect();
        sorted.sort_by_key(|r| self.rank(r.source));
        sorted
    }
}

impl Default for SourcePriority {
    fn default() -> Self {
        let config = MergeConfig::default();
        Self {
            order: config.priority,
            lccn_source: config.lccn_source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_primary_first() {
        assert!(SourcePriority::new(vec![MetadataSource::GoogleBooks, MetadataSource::Vision]).is_err());
        assert!(SourcePriority::new(vec![]).is_err());
        assert!(SourcePriority::new(vec![MetadataSource::Vision]).is_ok());
    }

    #[test]
    fn test_rejects_repeated_source() {
        let order = vec![MetadataSource::Vision, MetadataSource::OpenLibrary, MetadataSource::OpenLibrary];
        assert!(matches!(SourcePriority::new(order), Err(MatchError::InvalidPriority(_))));
    }

    #[test]
    fn test_unlisted_sources_rank_last() {
        let priority = SourcePriority::new(vec![MetadataSource::Vision, MetadataSource::Worldcat]).unwrap();
        assert_eq!(priority.rank(MetadataSource::Vision), 0);
        assert_eq!(priority.rank(MetadataSource::Worldcat), 1);
        assert!(priority.rank(MetadataSource::GoogleBooks) < priority.rank(MetadataSource::Manual));
        assert!(priority.rank(MetadataSource::GoogleBooks) > 1);
    }

    #[test]
    fn test_sort_is_stable_within_source() {
        let records = vec![
            SourceRecord::new(MetadataSource::OpenLibrary, shelfmark_core::BookMetadata::new("first")),
            SourceRecord::new(MetadataSource::Vision, shelfmark_core::BookMetadata::new("vision")),
            SourceRecord::new(MetadataSource::OpenLibrary, shelfmark_core::BookMetadata::new("second")),
        ];
        let sorted = SourcePriority::default().sort(&records);
        let titles: Vec<_> = sorted.iter().map(|r| r.metadata.title.as_deref().unwrap()).collect();
        assert_eq!(titles, ["vision", "first", "second"]);
    }
}
