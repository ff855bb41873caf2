//! Statistics Translator
//!
//! Reshapes engine rows into `{source_id: {label_id: stats}}`.
//!
//! Classification and extraction differ on purpose: classification quality
//! always stores `false_negatives = 0`, and classification quantity stores
//! `total_hits = record_coverage`. Extraction keeps the engine values.
//! When the engine emits the same (source, label) twice, the first row wins.

use std::collections::BTreeMap;

use crate::engine::{QualityRow, QuantityRow};
use crate::models::{NestedStats, QualityStats, QuantityStats, StatsLookup, TaskType};

pub fn quality_stats(task_type: TaskType, rows: &[QualityRow]) -> NestedStats<QualityStats> {
    let mut stats: NestedStats<QualityStats> = BTreeMap::new();
    for row in rows {
        let false_negatives = match task_type {
            TaskType::Classification => 0,
            TaskType::Extraction => row.false_negatives.unwrap_or(0),
        };
        stats
            .entry(row.identifier.clone())
            .or_default()
            .entry(row.label_name.clone())
            .or_insert(QualityStats {
                true_positives: row.true_positives,
                false_positives: row.false_positives,
                false_negatives,
            });
    }
    stats
}

pub fn quantity_stats(task_type: TaskType, rows: &[QuantityRow]) -> NestedStats<QuantityStats> {
    let mut stats: NestedStats<QuantityStats> = BTreeMap::new();
    for row in rows {
        let total_hits = match task_type {
            TaskType::Classification => row.record_coverage,
            TaskType::Extraction => row.total_hits,
        };
        stats
            .entry(row.identifier.clone())
            .or_default()
            .entry(row.label_name.clone())
            .or_insert(QuantityStats {
                record_coverage: row.record_coverage,
                source_conflicts: row.source_conflicts,
                source_overlaps: row.source_overlaps,
                total_hits,
            });
    }
    stats
}

/// Export shape of computed quality rows
///
/// Every row keeps its counts plus the derived precision; `false_negatives`
/// only when the engine reported it.
pub fn export_lookup(rows: &[QualityRow]) -> StatsLookup {
    let mut lookup = StatsLookup::new();
    for row in rows {
        lookup
            .entry((row.identifier.clone(), row.label_name.clone()))
            .or_insert_with(|| {
                let mut stats = BTreeMap::new();
                stats.insert("true_positives".to_string(), row.true_positives as f64);
                stats.insert("false_positives".to_string(), row.false_positives as f64);
                if let Some(fns) = row.false_negatives {
                    stats.insert("false_negatives".to_string(), fns as f64);
                }
                stats.insert("precision".to_string(), row.precision());
                stats
            });
    }
    lookup
}
