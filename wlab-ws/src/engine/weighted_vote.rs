//! Weighted Vote Engine
//!
//! In-process [`AggregationEngine`] implementation.
//!
//! # Source weights
//! - With a stats override: the override precision of (source, label);
//!   sources missing from the override do not vote.
//! - Otherwise: Laplace-smoothed precision `(tp + 1) / (tp + fp + 2)` from
//!   [`AggregationEngine::quality_metrics`].
//!
//! # Classification
//! Every weak association votes `weight × confidence` (missing confidence
//! counts as 1.0) for its label. The winning label's share of the record's
//! total vote becomes the prediction confidence.
//!
//! # Extraction
//! Spans vote on every token they cover. A token is kept when its winning
//! label holds at least `min_token_share` of the token's vote; adjacent kept
//! tokens with the same label form one predicted span whose confidence is
//! the mean token share.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

use super::types::{
    ClassificationAssociation, ClassificationPrediction, ExtractionSpan, Predictions, QualityRow,
    QuantityRow, SourceVector, SpanPrediction, Vectors,
};
use super::{AggregationEngine, EngineError};
use crate::models::StatsOverride;

/// Default minimum vote share for a token to be part of a predicted span
pub const DEFAULT_MIN_TOKEN_SHARE: f64 = 0.5;

/// Weighted voting over source precisions
#[derive(Debug, Clone)]
pub struct WeightedVoteEngine {
    min_token_share: f64,
}

impl WeightedVoteEngine {
    pub fn new() -> Self {
        Self {
            min_token_share: DEFAULT_MIN_TOKEN_SHARE,
        }
    }

    /// Engine with a custom token share threshold (clamped to 0.0-1.0)
    pub fn with_min_token_share(min_token_share: f64) -> Self {
        Self {
            min_token_share: min_token_share.clamp(0.0, 1.0),
        }
    }
}

impl Default for WeightedVoteEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Per (source, label) voting weight
struct Weights<'a> {
    stats_override: Option<&'a StatsOverride>,
    measured: HashMap<(String, String), f64>,
}

impl Weights<'_> {
    fn get(&self, source_id: &str, label_id: &str) -> f64 {
        match self.stats_override {
            Some(o) => o.precision(source_id, label_id).unwrap_or(0.0),
            None => self
                .measured
                .get(&(source_id.to_string(), label_id.to_string()))
                .copied()
                .unwrap_or(0.5),
        }
    }
}

fn manual_vector<A>(vectors: &[SourceVector<A>]) -> Option<&SourceVector<A>> {
    vectors
        .iter()
        .find(|v| v.is_manual && !v.associations.is_empty())
}

fn weak_vectors<A>(vectors: &[SourceVector<A>]) -> impl Iterator<Item = &SourceVector<A>> {
    vectors.iter().filter(|v| !v.is_manual)
}

#[async_trait]
impl AggregationEngine for WeightedVoteEngine {
    fn name(&self) -> &'static str {
        "weighted-vote"
    }

    async fn combine(
        &self,
        vectors: &Vectors,
        stats_override: Option<&StatsOverride>,
    ) -> Result<Predictions, EngineError> {
        let measured = match stats_override {
            Some(_) => HashMap::new(),
            None => self
                .quality_metrics(vectors)
                .await?
                .into_iter()
                .map(|row| {
                    let weight = (row.true_positives as f64 + 1.0)
                        / ((row.true_positives + row.false_positives) as f64 + 2.0);
                    ((row.identifier, row.label_name), weight)
                })
                .collect(),
        };
        let weights = Weights {
            stats_override,
            measured,
        };

        let predictions = match vectors {
            Vectors::Classification(v) => Predictions::Classification(combine_classification(v, &weights)),
            Vectors::Extraction(v) => {
                Predictions::Extraction(combine_extraction(v, &weights, self.min_token_share))
            }
        };

        debug!(
            engine = self.name(),
            records = predictions.record_count(),
            results = predictions.result_count(),
            "Weak labels combined"
        );

        Ok(predictions)
    }

    async fn quality_metrics(&self, vectors: &Vectors) -> Result<Vec<QualityRow>, EngineError> {
        match vectors {
            Vectors::Classification(v) => classification_quality(v),
            Vectors::Extraction(v) => extraction_quality(v),
        }
    }

    async fn quantity_metrics(&self, vectors: &Vectors) -> Result<Vec<QuantityRow>, EngineError> {
        Ok(match vectors {
            Vectors::Classification(v) => classification_quantity(v),
            Vectors::Extraction(v) => extraction_quantity(v),
        })
    }
}

// ============================================================================
// Combine
// ============================================================================

fn combine_classification(
    vectors: &[SourceVector<ClassificationAssociation>],
    weights: &Weights<'_>,
) -> BTreeMap<String, ClassificationPrediction> {
    let mut votes: BTreeMap<&str, BTreeMap<&str, f64>> = BTreeMap::new();
    for source in weak_vectors(vectors) {
        for a in &source.associations {
            let vote = weights.get(&source.source_id, &a.label_id) * a.confidence.unwrap_or(1.0);
            if vote > 0.0 {
                *votes
                    .entry(a.record_id.as_str())
                    .or_default()
                    .entry(a.label_id.as_str())
                    .or_insert(0.0) += vote;
            }
        }
    }

    votes
        .into_iter()
        .filter_map(|(record_id, label_votes)| {
            let (label, share) = winning_share(&label_votes)?;
            Some((
                record_id.to_string(),
                ClassificationPrediction {
                    label_id: label.to_string(),
                    confidence: share,
                },
            ))
        })
        .collect()
}

/// Label with the highest vote and its share of the total; first label wins ties
fn winning_share<'a>(label_votes: &BTreeMap<&'a str, f64>) -> Option<(&'a str, f64)> {
    let total: f64 = label_votes.values().sum();
    if total <= 0.0 {
        return None;
    }

    let mut best: Option<(&str, f64)> = None;
    for (label, vote) in label_votes {
        match best {
            Some((_, best_vote)) if *vote <= best_vote => {}
            _ => best = Some((*label, *vote)),
        }
    }

    best.map(|(label, vote)| (label, vote / total))
}

fn combine_extraction(
    vectors: &[SourceVector<ExtractionSpan>],
    weights: &Weights<'_>,
    min_token_share: f64,
) -> BTreeMap<String, Vec<SpanPrediction>> {
    // record -> token -> label -> vote
    let mut votes: BTreeMap<&str, BTreeMap<i64, BTreeMap<&str, f64>>> = BTreeMap::new();
    for source in weak_vectors(vectors) {
        for span in &source.associations {
            let vote = weights.get(&source.source_id, &span.label_id) * span.confidence.unwrap_or(1.0);
            if vote <= 0.0 {
                continue;
            }
            let tokens = votes.entry(span.record_id.as_str()).or_default();
            for token in span.start_token_index..=span.end_token_index {
                *tokens
                    .entry(token)
                    .or_default()
                    .entry(span.label_id.as_str())
                    .or_insert(0.0) += vote;
            }
        }
    }

    let mut predictions = BTreeMap::new();
    for (record_id, tokens) in votes {
        let mut spans: Vec<SpanPrediction> = Vec::new();
        // (label, start, end, share sum, token count)
        let mut open: Option<(&str, i64, i64, f64, u32)> = None;

        for (token, label_votes) in &tokens {
            let winner = winning_share(label_votes).filter(|(_, share)| *share >= min_token_share);
            open = match (open, winner) {
                (Some((label, start, end, sum, n)), Some((w_label, share)))
                    if label == w_label && *token == end + 1 =>
                {
                    Some((label, start, *token, sum + share, n + 1))
                }
                (previous, winner) => {
                    if let Some(finished) = previous {
                        spans.push(close_span(finished));
                    }
                    winner.map(|(label, share)| (label, *token, *token, share, 1))
                }
            };
        }
        if let Some(finished) = open {
            spans.push(close_span(finished));
        }

        if !spans.is_empty() {
            predictions.insert(record_id.to_string(), spans);
        }
    }

    predictions
}

fn close_span((label, start, end, sum, n): (&str, i64, i64, f64, u32)) -> SpanPrediction {
    SpanPrediction {
        label_id: label.to_string(),
        confidence: sum / f64::from(n),
        start_token_index: start,
        end_token_index: end,
    }
}

// ============================================================================
// Quality
// ============================================================================

fn classification_quality(
    vectors: &[SourceVector<ClassificationAssociation>],
) -> Result<Vec<QualityRow>, EngineError> {
    let manual = manual_vector(vectors).ok_or(EngineError::MissingReferenceData)?;

    let mut reference: HashMap<&str, HashSet<&str>> = HashMap::new();
    for a in &manual.associations {
        reference
            .entry(a.record_id.as_str())
            .or_default()
            .insert(a.label_id.as_str());
    }

    let mut rows = Vec::new();
    for source in weak_vectors(vectors) {
        let mut counts: BTreeMap<&str, (i64, i64)> = BTreeMap::new();
        let mut seen: HashSet<(&str, &str)> = HashSet::new();

        for a in &source.associations {
            if !seen.insert((a.record_id.as_str(), a.label_id.as_str())) {
                continue;
            }
            let entry = counts.entry(a.label_id.as_str()).or_insert((0, 0));
            if let Some(labels) = reference.get(a.record_id.as_str()) {
                if labels.contains(a.label_id.as_str()) {
                    entry.0 += 1;
                } else {
                    entry.1 += 1;
                }
            }
        }

        for (label, (tp, fp)) in counts {
            rows.push(QualityRow {
                identifier: source.source_id.clone(),
                label_name: label.to_string(),
                true_positives: tp,
                false_positives: fp,
                false_negatives: None,
            });
        }
    }

    Ok(rows)
}

type SpanKey<'a> = (&'a str, &'a str, i64, i64);

fn span_key(span: &ExtractionSpan) -> SpanKey<'_> {
    (
        span.record_id.as_str(),
        span.label_id.as_str(),
        span.start_token_index,
        span.end_token_index,
    )
}

fn extraction_quality(vectors: &[SourceVector<ExtractionSpan>]) -> Result<Vec<QualityRow>, EngineError> {
    let manual = manual_vector(vectors).ok_or(EngineError::MissingReferenceData)?;

    let reference: HashSet<SpanKey<'_>> = manual.associations.iter().map(span_key).collect();
    let labeled_records: HashSet<&str> = manual
        .associations
        .iter()
        .map(|s| s.record_id.as_str())
        .collect();

    let mut rows = Vec::new();
    for source in weak_vectors(vectors) {
        let mut produced: HashSet<SpanKey<'_>> = HashSet::new();
        let mut counts: BTreeMap<&str, (i64, i64)> = BTreeMap::new();

        for span in &source.associations {
            let key = span_key(span);
            if !produced.insert(key) {
                continue;
            }
            let entry = counts.entry(span.label_id.as_str()).or_insert((0, 0));
            if labeled_records.contains(span.record_id.as_str()) {
                if reference.contains(&key) {
                    entry.0 += 1;
                } else {
                    entry.1 += 1;
                }
            }
        }

        for (label, (tp, fp)) in counts {
            let missed = reference
                .iter()
                .filter(|key| key.1 == label && !produced.contains(*key))
                .count() as i64;
            rows.push(QualityRow {
                identifier: source.source_id.clone(),
                label_name: label.to_string(),
                true_positives: tp,
                false_positives: fp,
                false_negatives: Some(missed),
            });
        }
    }

    Ok(rows)
}

// ============================================================================
// Quantity
// ============================================================================

#[derive(Default)]
struct QuantityCounter {
    record_coverage: i64,
    source_conflicts: i64,
    source_overlaps: i64,
    total_hits: i64,
}

fn into_rows(source_id: &str, counters: BTreeMap<&str, QuantityCounter>) -> Vec<QuantityRow> {
    counters
        .into_iter()
        .map(|(label, c)| QuantityRow {
            identifier: source_id.to_string(),
            label_name: label.to_string(),
            record_coverage: c.record_coverage,
            source_conflicts: c.source_conflicts,
            source_overlaps: c.source_overlaps,
            total_hits: c.total_hits,
        })
        .collect()
}

fn classification_quantity(vectors: &[SourceVector<ClassificationAssociation>]) -> Vec<QuantityRow> {
    // record -> label -> sources hitting it
    let mut hits: HashMap<&str, HashMap<&str, HashSet<&str>>> = HashMap::new();
    for source in weak_vectors(vectors) {
        for a in &source.associations {
            hits.entry(a.record_id.as_str())
                .or_default()
                .entry(a.label_id.as_str())
                .or_default()
                .insert(source.source_id.as_str());
        }
    }

    let mut rows = Vec::new();
    for source in weak_vectors(vectors) {
        let me = source.source_id.as_str();
        let mut counters: BTreeMap<&str, QuantityCounter> = BTreeMap::new();
        let mut seen: HashSet<(&str, &str)> = HashSet::new();

        for a in &source.associations {
            let counter = counters.entry(a.label_id.as_str()).or_default();
            counter.total_hits += 1;
            if !seen.insert((a.record_id.as_str(), a.label_id.as_str())) {
                continue;
            }
            counter.record_coverage += 1;

            let Some(on_record) = hits.get(a.record_id.as_str()) else {
                continue;
            };
            let others = |sources: &HashSet<&str>| sources.iter().any(|s| *s != me);
            if on_record.get(a.label_id.as_str()).is_some_and(others) {
                counter.source_overlaps += 1;
            }
            if on_record
                .iter()
                .any(|(label, sources)| *label != a.label_id.as_str() && others(sources))
            {
                counter.source_conflicts += 1;
            }
        }

        rows.extend(into_rows(me, counters));
    }

    rows
}

fn extraction_quantity(vectors: &[SourceVector<ExtractionSpan>]) -> Vec<QuantityRow> {
    let mut by_record: HashMap<&str, Vec<(&str, &ExtractionSpan)>> = HashMap::new();
    for source in weak_vectors(vectors) {
        for span in &source.associations {
            by_record
                .entry(span.record_id.as_str())
                .or_default()
                .push((source.source_id.as_str(), span));
        }
    }

    let mut rows = Vec::new();
    for source in weak_vectors(vectors) {
        let me = source.source_id.as_str();
        let mut counters: BTreeMap<&str, QuantityCounter> = BTreeMap::new();
        let mut covered: HashSet<(&str, &str)> = HashSet::new();

        for span in &source.associations {
            let counter = counters.entry(span.label_id.as_str()).or_default();
            counter.total_hits += 1;
            if covered.insert((span.record_id.as_str(), span.label_id.as_str())) {
                counter.record_coverage += 1;
            }

            let neighbours = by_record
                .get(span.record_id.as_str())
                .map(Vec::as_slice)
                .unwrap_or_default();
            let (mut overlap, mut conflict) = (false, false);
            for (_, other) in neighbours
                .iter()
                .filter(|(other_source, other)| *other_source != me && other.intersects(span))
            {
                if other.label_id == span.label_id {
                    overlap = true;
                } else {
                    conflict = true;
                }
            }
            counter.source_overlaps += i64::from(overlap);
            counter.source_conflicts += i64::from(conflict);
        }

        rows.extend(into_rows(me, counters));
    }

    rows
}
