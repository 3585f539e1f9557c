//! Merging of per-source records into one canonical record.

pub mod delegate;
pub mod merger;
pub mod priority;
pub mod strategy;

pub use delegate::{enforce_invariants, DelegateResponse, DelegatedMerge, MergeDelegate};
pub use merger::{FallbackReason, FieldMerger, MergeOutcome};
pub use priority::SourcePriority;
pub use strategy::{MergeInput, MergeStrategy, MergedRecord, PriorityMerge};
