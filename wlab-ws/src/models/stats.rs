//! Statistics and precision override types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Nested per-source, per-label statistics: `{source_id: {label_id: T}}`
pub type NestedStats<T> = BTreeMap<String, BTreeMap<String, T>>;

/// Exported statistics: `(source_identifier, label_name) -> {stat: value}`
pub type StatsLookup = BTreeMap<(String, String), BTreeMap<String, f64>>;

/// Agreement of one source with the manual reference for one label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityStats {
    pub true_positives: i64,
    pub false_positives: i64,
    pub false_negatives: i64,
}

/// Coverage of one source for one label, independent of ground truth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityStats {
    pub record_coverage: i64,
    pub source_conflicts: i64,
    pub source_overlaps: i64,
    pub total_hits: i64,
}

/// Caller-supplied precision override
///
/// Deserializes from either a bare number or a `{source_id: precision}` map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrecisionOverride {
    /// One precision broadcast to every source of the task
    Uniform(f64),
    /// Explicit precision per source id
    PerSource(BTreeMap<String, f64>),
}

/// Precision entry of a [`StatsOverride`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrecisionEntry {
    pub precision: f64,
}

/// Synthetic precision lookup keyed by `(source_id, label_id)`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsOverride {
    entries: BTreeMap<(String, String), PrecisionEntry>,
}

impl StatsOverride {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source_id: impl Into<String>, label_id: impl Into<String>, precision: f64) {
        self.entries
            .insert((source_id.into(), label_id.into()), PrecisionEntry { precision });
    }

    pub fn precision(&self, source_id: &str, label_id: &str) -> Option<f64> {
        self.entries
            .get(&(source_id.to_string(), label_id.to_string()))
            .map(|e| e.precision)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(String, String), &PrecisionEntry)> {
        self.entries.iter()
    }

    /// Export shape: every entry becomes `{"precision": value}`
    pub fn to_lookup(&self) -> StatsLookup {
        self.entries
            .iter()
            .map(|(key, entry)| {
                let mut stats = BTreeMap::new();
                stats.insert("precision".to_string(), entry.precision);
                (key.clone(), stats)
            })
            .collect()
    }
}
