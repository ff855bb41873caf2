//! Weak supervision pipeline services

pub mod collector;
pub mod notifier;
pub mod override_builder;
pub mod span_reconstructor;
pub mod statistics_translator;

pub use collector::{collect_data, collect_for_task};
pub use notifier::Notifier;
pub use override_builder::{build_override, resolve_stats_source, StatsSource, DEFAULT_PRECISION};
pub use span_reconstructor::reconstruct_spans;
