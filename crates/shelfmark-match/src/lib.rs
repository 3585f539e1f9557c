//! Shelfmark match — field merging, normalization and catalog duplicate detection.

pub mod error;
pub mod normalize;
pub mod merge;
pub mod record;
pub mod dedup;
pub mod ingest;
pub mod call_number;

pub use error::{MatchError, Result};
pub use merge::{
    DelegateResponse, DelegatedMerge, FallbackReason, FieldMerger, MergeDelegate, MergeInput,
    MergeOutcome, MergeStrategy, MergedRecord, PriorityMerge, SourcePriority,
};
pub use dedup::{CatalogIndex, DuplicateDetector, DuplicateMatch, MatchReason, MatchThresholds, NormalizedKey, Verdict};
pub use ingest::{IngestDecision, IngestReport, Ingestor};
pub use record::catalog_entry;
pub use call_number::{CallNumber, CallNumberDelegate, CallNumberGenerator, CallNumberOrigin};
