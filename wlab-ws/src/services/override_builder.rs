//! Override Builder
//!
//! Synthesizes the precision lookup used instead of measured quality.
//! Precedence: caller override, then the no-ground-truth fallback, then real
//! computation.

use crate::models::{LabelingTask, PrecisionOverride, StatsOverride};

/// Precision assumed for every source when nothing was labeled manually
pub const DEFAULT_PRECISION: f64 = 0.8;

/// Where the source precisions of a run come from
#[derive(Debug, Clone, PartialEq)]
pub enum StatsSource {
    /// Caller supplied override
    Explicit(StatsOverride),
    /// No manual labels: every source at [`DEFAULT_PRECISION`]
    NoGroundTruth(StatsOverride),
    /// Measured against the manual labels by the engine
    Computed,
}

impl StatsSource {
    pub fn stats_override(&self) -> Option<&StatsOverride> {
        match self {
            StatsSource::Explicit(o) | StatsSource::NoGroundTruth(o) => Some(o),
            StatsSource::Computed => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StatsSource::Explicit(_) => "explicit",
            StatsSource::NoGroundTruth(_) => "no_ground_truth",
            StatsSource::Computed => "computed",
        }
    }
}

/// Expand an override against every label of the task
///
/// A uniform value covers every information source of the task; a
/// per-source map covers exactly the sources it names.
pub fn build_override(task: &LabelingTask, requested: &PrecisionOverride) -> StatsOverride {
    let mut stats_override = StatsOverride::new();

    let mut expand = |source_id: &str, precision: f64| {
        for label in &task.labels {
            stats_override.insert(source_id, label.id.as_str(), precision);
        }
    };

    match requested {
        PrecisionOverride::Uniform(precision) => {
            for source in &task.information_sources {
                expand(&source.id, *precision);
            }
        }
        PrecisionOverride::PerSource(by_source) => {
            for (source_id, precision) in by_source {
                expand(source_id, *precision);
            }
        }
    }

    stats_override
}

pub fn resolve_stats_source(
    task: &LabelingTask,
    requested: Option<&PrecisionOverride>,
    manual_records: i64,
) -> StatsSource {
    if let Some(requested) = requested {
        return StatsSource::Explicit(build_override(task, requested));
    }
    if manual_records == 0 {
        return StatsSource::NoGroundTruth(build_override(
            task,
            &PrecisionOverride::Uniform(DEFAULT_PRECISION),
        ));
    }
    StatsSource::Computed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InformationSource, Label};
    use std::collections::BTreeMap;

    fn task() -> LabelingTask {
        let source = |id: &str| InformationSource {
            id: id.to_string(),
            project_id: "p1".to_string(),
            labeling_task_id: "t1".to_string(),
            name: format!("lf_{}", id),
            is_selected: true,
        };
        LabelingTask {
            id: "t1".to_string(),
            project_id: "p1".to_string(),
            name: "sentiment".to_string(),
            task_type: "MULTICLASS_CLASSIFICATION".to_string(),
            labels: vec![
                Label { id: "neg".to_string(), name: "negative".to_string() },
                Label { id: "pos".to_string(), name: "positive".to_string() },
            ],
            information_sources: vec![source("src1"), source("src2")],
        }
    }

    #[test]
    fn test_uniform_covers_every_source_and_label() {
        let stats_override = build_override(&task(), &PrecisionOverride::Uniform(0.6));
        assert_eq!(stats_override.len(), 4);
        assert_eq!(stats_override.precision("src2", "neg"), Some(0.6));
    }

    #[test]
    fn test_per_source_covers_supplied_sources_only() {
        let by_source: BTreeMap<String, f64> = [("src1".to_string(), 0.9)].into_iter().collect();
        let stats_override = build_override(&task(), &PrecisionOverride::PerSource(by_source));
        assert_eq!(stats_override.len(), 2);
        assert_eq!(stats_override.precision("src1", "pos"), Some(0.9));
        assert_eq!(stats_override.precision("src2", "pos"), None);
    }

    #[test]
    fn test_precedence() {
        let task = task();
        let explicit = PrecisionOverride::Uniform(0.3);

        // Explicit wins even without manual labels
        match resolve_stats_source(&task, Some(&explicit), 0) {
            StatsSource::Explicit(o) => assert_eq!(o.precision("src1", "pos"), Some(0.3)),
            other => panic!("unexpected {:?}", other),
        }

        match resolve_stats_source(&task, None, 0) {
            StatsSource::NoGroundTruth(o) => {
                assert_eq!(o.len(), 4);
                assert!(o.iter().all(|(_, e)| e.precision == DEFAULT_PRECISION));
            }
            other => panic!("unexpected {:?}", other),
        }

        let computed = resolve_stats_source(&task, None, 3);
        assert_eq!(computed, StatsSource::Computed);
        assert!(computed.stats_override().is_none());
    }
}
