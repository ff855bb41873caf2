//! Normalized association rows
//!
//! The Data Collector flattens stored associations into these rows. A table
//! is either all whole-record rows or all token rows, never a mix.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::Hash;

use super::task::TaskType;

/// `source_type` of associations produced by an information source
pub const SOURCE_TYPE_INFORMATION_SOURCE: &str = "INFORMATION_SOURCE";
/// `source_type` of human reference labels
pub const SOURCE_TYPE_MANUAL: &str = "MANUAL";
/// `source_type` of consolidated fit/predict results
pub const SOURCE_TYPE_WEAK_SUPERVISION: &str = "WEAK_SUPERVISION";

/// Whole-record association (classification tasks)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRow {
    pub record_id: String,
    /// `None` for manual reference labels
    pub source_id: Option<String>,
    pub source_type: String,
    pub confidence: Option<f64>,
    pub label_id: String,
}

/// Token-level association (extraction tasks)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRow {
    pub record_id: String,
    /// `None` for manual reference labels
    pub source_id: Option<String>,
    pub source_type: String,
    pub confidence: Option<f64>,
    pub label_id: String,
    pub token_index: i64,
    pub is_beginning_token: bool,
}

type ClassificationKey = (String, Option<String>, String, Option<u64>, String);
type TokenKey = (String, Option<String>, String, Option<u64>, String, i64, bool);

impl ClassificationRow {
    /// Exact-match identity; confidence compared bitwise
    fn dedup_key(&self) -> ClassificationKey {
        (
            self.record_id.clone(),
            self.source_id.clone(),
            self.source_type.clone(),
            self.confidence.map(f64::to_bits),
            self.label_id.clone(),
        )
    }
}

impl TokenRow {
    fn dedup_key(&self) -> TokenKey {
        (
            self.record_id.clone(),
            self.source_id.clone(),
            self.source_type.clone(),
            self.confidence.map(f64::to_bits),
            self.label_id.clone(),
            self.token_index,
            self.is_beginning_token,
        )
    }
}

/// Normalized rows of one labeling task
#[derive(Debug, Clone, PartialEq)]
pub enum LabelTable {
    Classification(Vec<ClassificationRow>),
    Extraction(Vec<TokenRow>),
}

impl LabelTable {
    pub fn task_type(&self) -> TaskType {
        match self {
            LabelTable::Classification(_) => TaskType::Classification,
            LabelTable::Extraction(_) => TaskType::Extraction,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            LabelTable::Classification(rows) => rows.len(),
            LabelTable::Extraction(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Collapse exact duplicate rows, keeping the first occurrence in place
    pub fn dedup(&mut self) {
        match self {
            LabelTable::Classification(rows) => dedup_by_key(rows, ClassificationRow::dedup_key),
            LabelTable::Extraction(rows) => dedup_by_key(rows, TokenRow::dedup_key),
        }
    }

    /// Drop every row whose record is in `excluded`
    pub fn exclude_records(&mut self, excluded: &HashSet<String>) {
        if excluded.is_empty() {
            return;
        }
        match self {
            LabelTable::Classification(rows) => rows.retain(|r| !excluded.contains(&r.record_id)),
            LabelTable::Extraction(rows) => rows.retain(|r| !excluded.contains(&r.record_id)),
        }
    }
}

fn dedup_by_key<T, K, F>(rows: &mut Vec<T>, key: F)
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::with_capacity(rows.len());
    rows.retain(|row| seen.insert(key(row)));
}
