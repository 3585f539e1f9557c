use serde::Serialize;
use shelfmark_core::{MergeConfig, SourceRecord};

use super::priority::SourcePriority;
use super::strategy::{MergeInput, MergeStrategy, MergedRecord, PriorityMerge};
use crate::error::Result;

/// Why the rule-based merge produced the result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FallbackReason {
    NoPreferredStrategy,
    StrategyFailed { strategy: String, error: String },
    EmptyResult { strategy: String },
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoPreferredStrategy => f.write_str("no preferred strategy configured"),
            Self::StrategyFailed { strategy, error } => write!(f, "{strategy} failed: {error}"),
            Self::EmptyResult { strategy } => write!(f, "{strategy} returned an empty record"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MergeOutcome {
    Preferred {
        strategy: String,
        #[serde(flatten)]
        merged: MergedRecord,
    },
    Fallback {
        reason: FallbackReason,
        #[serde(flatten)]
        merged: MergedRecord,
    },
}

impl MergeOutcome {
    pub fn merged(&self) -> &MergedRecord {
        match self {
            Self::Preferred { merged, .. } | Self::Fallback { merged, .. } => merged,
        }
    }

    pub fn into_merged(self) -> MergedRecord {
        match self {
            Self::Preferred { merged, .. } | Self::Fallback { merged, .. } => merged,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Combines the records of all sources for one book into a canonical record.
///
/// An optional preferred strategy is tried first. Whenever it is missing,
/// fails, or comes back empty although some source had usable data, the
/// rule-based [`PriorityMerge`] answers instead. Merging therefore never fails.
pub struct FieldMerger {
    priority: SourcePriority,
    preferred: Option<Box<dyn MergeStrategy>>,
    fallback: PriorityMerge,
    provenance: bool,
}

impl FieldMerger {
    pub fn new(priority: SourcePriority) -> Self {
        Self {
            priority,
            preferred: None,
            fallback: PriorityMerge,
            provenance: false,
        }
    }

    pub fn from_config(config: &MergeConfig) -> Result<Self> {
        Ok(Self::new(SourcePriority::from_config(config)?).with_provenance(config.provenance))
    }

    pub fn with_preferred(mut self, strategy: impl MergeStrategy + 'static) -> Self {
        self.preferred = Some(Box::new(strategy));
        self
    }

    pub fn with_provenance(mut self, enabled: bool) -> Self {
        self.provenance = enabled;
        self
    }

    pub fn priority(&self) -> &SourcePriority {
        &self.priority
    }

    pub fn preferred_name(&self) -> Option<&str> {
        self.preferred.as_deref().map(|s| s.name())
    }

    pub fn merge(&self, records: &[SourceRecord]) -> MergeOutcome {
        let input = MergeInput::new(records, &self.priority).with_provenance(self.provenance);

        let reason = match self.preferred.as_deref() {
            None => FallbackReason::NoPreferredStrategy,
            Some(strategy) => match strategy.merge(&input) {
                Ok(merged) if merged.record.is_empty() && input.has_mergeable_data() => {
                    FallbackReason::EmptyResult {
                        strategy: strategy.name().to_string(),
                    }
                }
                Ok(merged) => {
                    return MergeOutcome::Preferred {
                        strategy: strategy.name().to_string(),
                        merged,
                    };
                }
                Err(e) => FallbackReason::StrategyFailed {
                    strategy: strategy.name().to_string(),
                    error: e.to_string(),
                },
            },
        };

        if reason != FallbackReason::NoPreferredStrategy {
            tracing::warn!(%reason, sources = records.len(), "falling back to priority merge");
        }
        MergeOutcome::Fallback {
            reason,
            merged: self.fallback.merge_records(&input),
        }
    }
}

impl Default for FieldMerger {
    fn default() -> Self {
        Self::new(SourcePriority::default())
    }
}
