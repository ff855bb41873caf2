//! Task Orchestrator
//!
//! The request-driven flows of the service:
//! - **fit/predict**: combine weak labels and persist the predictions
//! - **export**: write the source precision lookup of a labeling task
//! - **quality statistics**: per labeling task or per source
//! - **quantity statistics**: coverage of every source, triggered by one source
//!
//! Every flow works on the caller's [`Session`](crate::db::Session) and
//! decides which errors are recovered and which reach the caller.

pub mod export;
pub mod fit_predict;
pub mod statistics;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::engine::AggregationEngine;
use crate::services::Notifier;

pub struct Orchestrator {
    engine: Arc<dyn AggregationEngine>,
    notifier: Notifier,
    inference_dir: PathBuf,
}

impl Orchestrator {
    pub fn new(engine: Arc<dyn AggregationEngine>, notifier: Notifier, inference_dir: PathBuf) -> Self {
        Self {
            engine,
            notifier,
            inference_dir,
        }
    }

    pub fn engine(&self) -> &dyn AggregationEngine {
        self.engine.as_ref()
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn inference_dir(&self) -> &Path {
        &self.inference_dir
    }
}
