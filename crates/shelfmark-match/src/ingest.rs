//! The merge, check and append pipeline for one catalog.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use shelfmark_core::{AccessionNo, AppConfig, CanonicalRecord, CatalogEntry, CatalogRepository, SourceRecord};

use crate::dedup::{CatalogIndex, DuplicateDetector, DuplicateMatch, MatchThresholds, NormalizedKey, Verdict};
use crate::error::{MatchError, Result};
use crate::merge::{FieldMerger, MergeOutcome};
use crate::record::catalog_entry;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum IngestDecision {
    Appended { accession_no: AccessionNo },
    Rejected { duplicate_of: DuplicateMatch },
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub merge: MergeOutcome,
    pub entry: CatalogEntry,
    #[serde(flatten)]
    pub decision: IngestDecision,
}

impl IngestReport {
    pub fn accession_no(&self) -> Option<AccessionNo> {
        match self.decision {
            IngestDecision::Appended { accession_no } => Some(accession_no),
            IngestDecision::Rejected { .. } => None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.decision, IngestDecision::Rejected { .. })
    }
}

/// Owns one catalog and admits new books into it.
///
/// The duplicate check and the append happen under one lock, so two books
/// ingested concurrently can never both pass the check against a stale index.
pub struct Ingestor<R: CatalogRepository> {
    repository: R,
    merger: FieldMerger,
    detector: DuplicateDetector,
    index: Mutex<CatalogIndex>,
}

impl<R: CatalogRepository> Ingestor<R> {
    pub fn new(repository: R, merger: FieldMerger, detector: DuplicateDetector) -> Result<Self> {
        let index = CatalogIndex::build(&repository.fetch_all_entries()?);
        tracing::debug!(entries = index.len(), "catalog index built");
        Ok(Self {
            repository,
            merger,
            detector,
            index: Mutex::new(index),
        })
    }

    pub fn from_config(repository: R, config: &AppConfig) -> Result<Self> {
        let merger = FieldMerger::from_config(&config.merge)?;
        let detector = DuplicateDetector::new(MatchThresholds::from_config(&config.matching));
        Self::new(repository, merger, detector)
    }

    /// Replaces the field merger, e.g. to plug in a preferred strategy.
    pub fn with_merger(mut self, merger: FieldMerger) -> Self {
        self.merger = merger;
        self
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn merger(&self) -> &FieldMerger {
        &self.merger
    }

    /// Merges the source records and appends the result unless the catalog
    /// already holds the book. A merge that leaves every catalog column
    /// blank is refused without consuming an accession number.
    pub fn ingest(&self, sources: &[SourceRecord]) -> Result<IngestReport> {
        let merge = self.merger.merge(sources);
        let entry = catalog_entry(&merge.merged().record);
        if entry.is_blank() {
            tracing::warn!(sources = sources.len(), "nothing to catalog");
            return Err(MatchError::BlankRecord);
        }
        let key = NormalizedKey::from_entry(&entry);

        let mut index = self.index.lock().unwrap_or_else(PoisonError::into_inner);
        let decision = match self.detector.check(&key, &index) {
            Verdict::Duplicate(found) => {
                tracing::info!(title = %entry.title, duplicate_of = ?found.accession_no, "book rejected as duplicate");
                IngestDecision::Rejected { duplicate_of: found }
            }
            Verdict::Unique => {
                let accession_no = self.repository.append_entry(entry.clone())?;
                let mut stored = entry.clone();
                stored.accession_no = Some(accession_no);
                index.insert(&stored);
                IngestDecision::Appended { accession_no }
            }
        };
        drop(index);

        let entry = match decision {
            IngestDecision::Appended { accession_no } => CatalogEntry {
                accession_no: Some(accession_no),
                ..entry
            },
            IngestDecision::Rejected { .. } => entry,
        };
        Ok(IngestReport { merge, entry, decision })
    }

    /// Verdict for a canonical record without touching the catalog.
    pub fn check(&self, record: &CanonicalRecord) -> Verdict {
        let key = NormalizedKey::from_record(record);
        let index = self.index.lock().unwrap_or_else(PoisonError::into_inner);
        self.detector.check(&key, &index)
    }

    /// Rebuilds the index after the catalog changed behind the ingestor's back.
    pub fn refresh(&self) -> Result<usize> {
        let rebuilt = CatalogIndex::build(&self.repository.fetch_all_entries()?);
        let len = rebuilt.len();
        *self.index.lock().unwrap_or_else(PoisonError::into_inner) = rebuilt;
        Ok(len)
    }
}
