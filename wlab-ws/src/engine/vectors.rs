//! Build engine vectors from a normalized label table
//!
//! One vector per distinct source id; manual rows (no source id) collapse
//! into the single vector keyed [`MANUAL_VECTOR_ID`].

use std::collections::BTreeMap;

use super::types::{ClassificationAssociation, SourceVector, Vectors, MANUAL_VECTOR_ID};
use crate::models::LabelTable;
use crate::services::span_reconstructor::reconstruct_spans;

pub fn build_vectors(table: &LabelTable) -> Vectors {
    match table {
        LabelTable::Classification(rows) => {
            let mut by_source: BTreeMap<String, Vec<ClassificationAssociation>> = BTreeMap::new();
            for row in rows {
                let source = row
                    .source_id
                    .clone()
                    .unwrap_or_else(|| MANUAL_VECTOR_ID.to_string());
                by_source.entry(source).or_default().push(ClassificationAssociation {
                    record_id: row.record_id.clone(),
                    label_id: row.label_id.clone(),
                    confidence: row.confidence,
                });
            }
            Vectors::Classification(into_vectors(by_source))
        }
        LabelTable::Extraction(rows) => Vectors::Extraction(into_vectors(reconstruct_spans(rows))),
    }
}

fn into_vectors<A>(by_source: BTreeMap<String, Vec<A>>) -> Vec<SourceVector<A>> {
    by_source
        .into_iter()
        .map(|(source_id, associations)| SourceVector {
            is_manual: source_id == MANUAL_VECTOR_ID,
            source_id,
            associations,
        })
        .collect()
}
