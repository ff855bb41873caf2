//! Data crossing the aggregation engine boundary

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::models::TaskType;

/// Source id under which manual reference labels are grouped
pub const MANUAL_VECTOR_ID: &str = "manual";

/// Whole-record weak label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationAssociation {
    pub record_id: String,
    pub label_id: String,
    pub confidence: Option<f64>,
}

/// Contiguous token span, both ends inclusive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionSpan {
    pub record_id: String,
    pub label_id: String,
    pub start_token_index: i64,
    pub end_token_index: i64,
    pub confidence: Option<f64>,
}

impl ExtractionSpan {
    pub fn intersects(&self, other: &ExtractionSpan) -> bool {
        self.record_id == other.record_id
            && self.start_token_index <= other.end_token_index
            && other.start_token_index <= self.end_token_index
    }
}

/// All associations of one source (or of the manual reference)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceVector<A> {
    pub source_id: String,
    pub is_manual: bool,
    pub associations: Vec<A>,
}

/// Engine input: one vector per distinct source id
#[derive(Debug, Clone, PartialEq)]
pub enum Vectors {
    Classification(Vec<SourceVector<ClassificationAssociation>>),
    Extraction(Vec<SourceVector<ExtractionSpan>>),
}

impl Vectors {
    pub fn task_type(&self) -> TaskType {
        match self {
            Vectors::Classification(_) => TaskType::Classification,
            Vectors::Extraction(_) => TaskType::Extraction,
        }
    }

    /// True when a non-empty manual vector is present
    pub fn has_reference_data(&self) -> bool {
        match self {
            Vectors::Classification(v) => v.iter().any(|s| s.is_manual && !s.associations.is_empty()),
            Vectors::Extraction(v) => v.iter().any(|s| s.is_manual && !s.associations.is_empty()),
        }
    }

    /// Ids of the non-manual sources, in vector order
    pub fn source_ids(&self) -> Vec<&str> {
        match self {
            Vectors::Classification(v) => v
                .iter()
                .filter(|s| !s.is_manual)
                .map(|s| s.source_id.as_str())
                .collect(),
            Vectors::Extraction(v) => v
                .iter()
                .filter(|s| !s.is_manual)
                .map(|s| s.source_id.as_str())
                .collect(),
        }
    }

    /// Distinct records touched by any non-manual source
    pub fn distinct_records(&self) -> usize {
        let records: HashSet<&str> = match self {
            Vectors::Classification(v) => v
                .iter()
                .filter(|s| !s.is_manual)
                .flat_map(|s| s.associations.iter().map(|a| a.record_id.as_str()))
                .collect(),
            Vectors::Extraction(v) => v
                .iter()
                .filter(|s| !s.is_manual)
                .flat_map(|s| s.associations.iter().map(|a| a.record_id.as_str()))
                .collect(),
        };
        records.len()
    }
}

/// Consolidated whole-record label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationPrediction {
    pub label_id: String,
    pub confidence: f64,
}

/// Consolidated span label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanPrediction {
    pub label_id: String,
    pub confidence: f64,
    pub start_token_index: i64,
    pub end_token_index: i64,
}

/// Engine output of `combine`; records without a decision are absent
#[derive(Debug, Clone, PartialEq)]
pub enum Predictions {
    Classification(BTreeMap<String, ClassificationPrediction>),
    Extraction(BTreeMap<String, Vec<SpanPrediction>>),
}

impl Predictions {
    /// Number of predicted labels (spans for extraction)
    pub fn result_count(&self) -> usize {
        match self {
            Predictions::Classification(p) => p.len(),
            Predictions::Extraction(p) => p.values().map(Vec::len).sum(),
        }
    }

    pub fn record_count(&self) -> usize {
        match self {
            Predictions::Classification(p) => p.len(),
            Predictions::Extraction(p) => p.len(),
        }
    }
}

/// Quality metric row; `false_negatives` is only reported for extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityRow {
    pub identifier: String,
    pub label_name: String,
    pub true_positives: i64,
    pub false_positives: i64,
    pub false_negatives: Option<i64>,
}

impl QualityRow {
    /// `tp / (tp + fp)`, 0 when the source never hit a labeled record
    pub fn precision(&self) -> f64 {
        let hits = self.true_positives + self.false_positives;
        if hits == 0 {
            0.0
        } else {
            self.true_positives as f64 / hits as f64
        }
    }
}

/// Quantity metric row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantityRow {
    pub identifier: String,
    pub label_name: String,
    pub record_coverage: i64,
    pub source_conflicts: i64,
    pub source_overlaps: i64,
    pub total_hits: i64,
}
