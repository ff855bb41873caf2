//! Aggregation engine boundary
//!
//! The engine combines weak labels into consolidated predictions and
//! computes quality/quantity metrics per (source, label). The workflow only
//! talks to it through [`AggregationEngine`], so tests can substitute a
//! recording implementation and deployments can swap the algorithm.

pub mod types;
pub mod vectors;
pub mod weighted_vote;

pub use types::{
    ClassificationAssociation, ClassificationPrediction, ExtractionSpan, Predictions, QualityRow,
    QuantityRow, SourceVector, SpanPrediction, Vectors, MANUAL_VECTOR_ID,
};
pub use vectors::build_vectors;
pub use weighted_vote::WeightedVoteEngine;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::StatsOverride;

/// Errors raised by an aggregation engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Quality needed but the manual vector is empty and no override was given
    #[error("No manual reference data available")]
    MissingReferenceData,

    #[error("{0}")]
    Computation(String),
}

/// Label aggregation and quality-metric capability
#[async_trait]
pub trait AggregationEngine: Send + Sync {
    /// Engine name for logging
    fn name(&self) -> &'static str;

    /// Consolidate weak labels
    ///
    /// With `stats_override` the supplied precisions weight the sources,
    /// otherwise the engine derives them from the manual vector.
    async fn combine(
        &self,
        vectors: &Vectors,
        stats_override: Option<&StatsOverride>,
    ) -> Result<Predictions, EngineError>;

    /// Agreement of each source with the manual vector, per label
    async fn quality_metrics(&self, vectors: &Vectors) -> Result<Vec<QualityRow>, EngineError>;

    /// Coverage, overlaps and conflicts of each source, per label
    async fn quantity_metrics(&self, vectors: &Vectors) -> Result<Vec<QuantityRow>, EngineError>;
}
