//! Shared fixtures for wlab-ws integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use wlab_ws::engine::{
    AggregationEngine, EngineError, Predictions, QualityRow, QuantityRow, Vectors,
    WeightedVoteEngine,
};
use wlab_ws::models::StatsOverride;
use wlab_ws::services::Notifier;
use wlab_ws::workflow::Orchestrator;

pub const CLASSIFICATION: &str = "MULTICLASS_CLASSIFICATION";
pub const EXTRACTION: &str = "INFORMATION_EXTRACTION";

pub const PROJECT: &str = "p1";
pub const ORGANIZATION: &str = "org1";
pub const TASK: &str = "t1";
pub const USER: &str = "u1";

pub async fn setup_db() -> SqlitePool {
    wlab_common::db::init_memory_database()
        .await
        .expect("Failed to create in-memory database")
}

/// Project with one labeling task and the given labels
pub async fn seed_task(pool: &SqlitePool, task_type: &str, labels: &[&str]) {
    sqlx::query("INSERT INTO project (id, organization_id, name) VALUES (?, ?, 'test')")
        .bind(PROJECT)
        .bind(ORGANIZATION)
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO labeling_task (id, project_id, name, task_type) VALUES (?, ?, 'task', ?)")
        .bind(TASK)
        .bind(PROJECT)
        .bind(task_type)
        .execute(pool)
        .await
        .unwrap();
    for label in labels {
        sqlx::query(
            "INSERT INTO labeling_task_label (id, project_id, labeling_task_id, name) VALUES (?, ?, ?, ?)",
        )
        .bind(label)
        .bind(PROJECT)
        .bind(TASK)
        .bind(format!("label {}", label))
        .execute(pool)
        .await
        .unwrap();
    }
}

pub async fn add_source(pool: &SqlitePool, source_id: &str, is_selected: bool) {
    sqlx::query(
        r#"
        INSERT INTO information_source (id, project_id, labeling_task_id, name, is_selected)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(source_id)
    .bind(PROJECT)
    .bind(TASK)
    .bind(format!("lf_{}", source_id))
    .bind(is_selected)
    .execute(pool)
    .await
    .unwrap();
}

/// Whole-record association; `source_id = None` inserts a manual label
pub async fn add_label(
    pool: &SqlitePool,
    record_id: &str,
    label_id: &str,
    source_id: Option<&str>,
    confidence: Option<f64>,
) -> String {
    let id = Uuid::new_v4().to_string();
    let source_type = if source_id.is_some() { "INFORMATION_SOURCE" } else { "MANUAL" };
    sqlx::query(
        r#"
        INSERT INTO record_label_association (
            id, project_id, record_id, labeling_task_label_id, source_id, source_type, confidence
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(PROJECT)
    .bind(record_id)
    .bind(label_id)
    .bind(source_id)
    .bind(source_type)
    .bind(confidence)
    .execute(pool)
    .await
    .unwrap();
    id
}

/// Token association: `tokens` are `(token_index, is_beginning_token)`
pub async fn add_tokens(
    pool: &SqlitePool,
    record_id: &str,
    label_id: &str,
    source_id: Option<&str>,
    tokens: &[(i64, bool)],
) -> String {
    let association_id = add_label(pool, record_id, label_id, source_id, Some(1.0)).await;
    for (token_index, is_beginning_token) in tokens {
        sqlx::query(
            r#"
            INSERT INTO record_label_association_token (
                id, project_id, record_label_association_id, token_index, is_beginning_token
            ) VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(PROJECT)
        .bind(&association_id)
        .bind(token_index)
        .bind(is_beginning_token)
        .execute(pool)
        .await
        .unwrap();
    }
    association_id
}

pub async fn add_exclusion(pool: &SqlitePool, source_id: &str, record_id: &str) {
    sqlx::query(
        r#"
        INSERT INTO information_source_statistics_exclusion (id, project_id, source_id, record_id)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(PROJECT)
    .bind(source_id)
    .bind(record_id)
    .execute(pool)
    .await
    .unwrap();
}

pub async fn count_notifications(pool: &SqlitePool, message: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM notification WHERE user_id = ? AND message = ?")
        .bind(USER)
        .bind(message)
        .fetch_one(pool)
        .await
        .unwrap()
}

/// Engine wrapper counting calls per capability
#[derive(Default)]
pub struct RecordingEngine {
    inner: WeightedVoteEngine,
    pub combine_calls: AtomicUsize,
    pub quality_calls: AtomicUsize,
    pub quantity_calls: AtomicUsize,
    /// Fail `combine` with a computation error
    pub fail_combine: bool,
}

impl RecordingEngine {
    pub fn failing() -> Self {
        Self {
            fail_combine: true,
            ..Self::default()
        }
    }

    pub fn quality_calls(&self) -> usize {
        self.quality_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AggregationEngine for RecordingEngine {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn combine(
        &self,
        vectors: &Vectors,
        stats_override: Option<&StatsOverride>,
    ) -> Result<Predictions, EngineError> {
        self.combine_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_combine {
            return Err(EngineError::Computation("model did not converge".to_string()));
        }
        self.inner.combine(vectors, stats_override).await
    }

    async fn quality_metrics(&self, vectors: &Vectors) -> Result<Vec<QualityRow>, EngineError> {
        self.quality_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.quality_metrics(vectors).await
    }

    async fn quantity_metrics(&self, vectors: &Vectors) -> Result<Vec<QuantityRow>, EngineError> {
        self.quantity_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.quantity_metrics(vectors).await
    }
}

pub fn orchestrator(engine: Arc<dyn AggregationEngine>, inference_dir: &Path) -> Orchestrator {
    Orchestrator::new(
        engine,
        Notifier::new(None).unwrap(),
        inference_dir.to_path_buf(),
    )
}
