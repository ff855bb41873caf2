//! Span Reconstructor
//!
//! Turns per-token hit rows of extraction tasks into token spans. Rows are
//! grouped by `(source_id, record_id, label_id)` and ordered by
//! `token_index`; a new span starts at every row flagged
//! `is_beginning_token`.
//!
//! All spans of a group carry the confidence of the group's first row, not of
//! the span's own first row. A group whose first row lacks the begin flag
//! still produces a span at the end of the loop; if no row of the group is
//! flagged at all, that span collapses to the last token seen.

use std::collections::BTreeMap;

use crate::engine::{ExtractionSpan, MANUAL_VECTOR_ID};
use crate::models::TokenRow;

/// Reconstruct spans for every group, keyed by source id (`"manual"` for
/// reference rows)
pub fn reconstruct_spans(rows: &[TokenRow]) -> BTreeMap<String, Vec<ExtractionSpan>> {
    let mut groups: BTreeMap<(String, String, String), Vec<&TokenRow>> = BTreeMap::new();
    for row in rows {
        let source = row
            .source_id
            .clone()
            .unwrap_or_else(|| MANUAL_VECTOR_ID.to_string());
        groups
            .entry((source, row.record_id.clone(), row.label_id.clone()))
            .or_default()
            .push(row);
    }

    let mut spans_by_source: BTreeMap<String, Vec<ExtractionSpan>> = BTreeMap::new();
    for ((source, record_id, label_id), mut group) in groups {
        // Stable: equal token indices keep their collection order
        group.sort_by_key(|row| row.token_index);
        let spans = reconstruct_group(&record_id, &label_id, &group);
        spans_by_source.entry(source).or_default().extend(spans);
    }

    spans_by_source
}

/// Spans of one already ordered group
fn reconstruct_group(record_id: &str, label_id: &str, group: &[&TokenRow]) -> Vec<ExtractionSpan> {
    let Some(first) = group.first() else {
        return Vec::new();
    };
    let confidence = first.confidence;

    let make_span = |start: i64, end: i64| ExtractionSpan {
        record_id: record_id.to_string(),
        label_id: label_id.to_string(),
        start_token_index: start,
        end_token_index: end,
        confidence,
    };

    let mut spans = Vec::new();
    let mut open_start: Option<i64> = None;
    let mut open_end: Option<i64> = None;

    for row in group {
        if row.is_beginning_token {
            if let (Some(start), Some(end)) = (open_start, open_end) {
                spans.push(make_span(start, end));
            }
            open_start = Some(row.token_index);
        }
        open_end = Some(row.token_index);
    }

    // Final span is emitted unconditionally
    if let Some(end) = open_end {
        spans.push(make_span(open_start.unwrap_or(end), end));
    }

    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SOURCE_TYPE_INFORMATION_SOURCE, SOURCE_TYPE_MANUAL};

    fn token(source: Option<&str>, record: &str, label: &str, index: i64, begin: bool, confidence: f64) -> TokenRow {
        TokenRow {
            record_id: record.to_string(),
            source_id: source.map(str::to_string),
            source_type: if source.is_some() {
                SOURCE_TYPE_INFORMATION_SOURCE.to_string()
            } else {
                SOURCE_TYPE_MANUAL.to_string()
            },
            confidence: Some(confidence),
            label_id: label.to_string(),
            token_index: index,
            is_beginning_token: begin,
        }
    }

    fn bounds(spans: &[ExtractionSpan]) -> Vec<(i64, i64)> {
        spans
            .iter()
            .map(|s| (s.start_token_index, s.end_token_index))
            .collect()
    }

    #[test]
    fn test_begin_flags_split_spans() {
        let rows = vec![
            token(Some("s1"), "r1", "person", 0, true, 0.9),
            token(Some("s1"), "r1", "person", 1, false, 0.9),
            token(Some("s1"), "r1", "person", 2, true, 0.9),
        ];
        let spans = reconstruct_spans(&rows);
        assert_eq!(bounds(&spans["s1"]), vec![(0, 1), (2, 2)]);
    }

    #[test]
    fn test_rows_are_ordered_by_token_index() {
        let rows = vec![
            token(Some("s1"), "r1", "person", 5, false, 0.9),
            token(Some("s1"), "r1", "person", 4, true, 0.9),
            token(Some("s1"), "r1", "person", 7, true, 0.9),
        ];
        let spans = reconstruct_spans(&rows);
        assert_eq!(bounds(&spans["s1"]), vec![(4, 5), (7, 7)]);
    }

    #[test]
    fn test_confidence_fixed_to_first_row_of_group() {
        let rows = vec![
            token(Some("s1"), "r1", "org", 0, true, 0.4),
            token(Some("s1"), "r1", "org", 3, true, 0.8),
        ];
        let spans = reconstruct_spans(&rows);
        assert_eq!(spans["s1"].len(), 2);
        assert!(spans["s1"].iter().all(|s| s.confidence == Some(0.4)));
    }

    #[test]
    fn test_span_count_matches_begin_flags() {
        let rows = vec![
            token(Some("s1"), "r1", "person", 0, true, 1.0),
            token(Some("s1"), "r1", "person", 1, true, 1.0),
            token(Some("s1"), "r1", "person", 2, false, 1.0),
            token(Some("s1"), "r1", "person", 3, true, 1.0),
            token(Some("s1"), "r2", "person", 0, true, 1.0),
            token(None, "r1", "person", 0, true, 1.0),
        ];
        let spans = reconstruct_spans(&rows);
        assert_eq!(spans["s1"].len(), 4);
        assert_eq!(spans[MANUAL_VECTOR_ID].len(), 1);
    }

    #[test]
    fn test_group_without_begin_flag_emits_single_span() {
        let rows = vec![
            token(Some("s1"), "r1", "person", 3, false, 1.0),
            token(Some("s1"), "r1", "person", 4, false, 1.0),
        ];
        let spans = reconstruct_spans(&rows);
        assert_eq!(bounds(&spans["s1"]), vec![(4, 4)]);
    }

    #[test]
    fn test_leading_rows_before_first_begin_are_dropped() {
        let rows = vec![
            token(Some("s1"), "r1", "person", 0, false, 1.0),
            token(Some("s1"), "r1", "person", 1, true, 1.0),
            token(Some("s1"), "r1", "person", 2, false, 1.0),
        ];
        let spans = reconstruct_spans(&rows);
        assert_eq!(bounds(&spans["s1"]), vec![(1, 2)]);
    }

    #[test]
    fn test_groups_are_independent() {
        let rows = vec![
            token(Some("s1"), "r1", "person", 0, true, 1.0),
            token(Some("s1"), "r1", "org", 1, false, 1.0),
            token(Some("s1"), "r1", "person", 1, false, 1.0),
        ];
        let spans = reconstruct_spans(&rows);
        let mut by_label: Vec<(String, i64, i64)> = spans["s1"]
            .iter()
            .map(|s| (s.label_id.clone(), s.start_token_index, s.end_token_index))
            .collect();
        by_label.sort();
        assert_eq!(
            by_label,
            vec![("org".to_string(), 1, 1), ("person".to_string(), 0, 1)]
        );
    }
}
