//! Data models for wlab-ws

pub mod association;
pub mod stats;
pub mod task;

pub use association::{
    ClassificationRow, LabelTable, TokenRow, SOURCE_TYPE_INFORMATION_SOURCE, SOURCE_TYPE_MANUAL,
    SOURCE_TYPE_WEAK_SUPERVISION,
};
pub use stats::{
    NestedStats, PrecisionEntry, PrecisionOverride, QualityStats, QuantityStats, StatsLookup,
    StatsOverride,
};
pub use task::{
    InformationSource, Label, LabelingTask, PayloadState, TaskType, WeakSupervisionTask,
};
