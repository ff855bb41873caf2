//! Orchestrator flows against an in-memory database

mod common;

use axum::http::StatusCode;
use std::collections::BTreeMap;
use std::sync::Arc;

use common::*;
use wlab_ws::db::weak_supervision::{self, RunSummary};
use wlab_ws::db::{information_sources, Session};
use wlab_ws::engine::{build_vectors, Predictions, Vectors, WeightedVoteEngine};
use wlab_ws::models::{LabelTable, PayloadState, PrecisionOverride, StatsLookup};
use wlab_ws::services::collect_data;
use wlab_ws::services::notifier::{NO_COVERAGE_DATA_MESSAGE, NO_REFERENCE_DATA_MESSAGE};

async fn create_ws_task(pool: &sqlx::SqlitePool) -> String {
    let mut session = Session::new(pool.clone());
    let task = weak_supervision::create_task(session.conn().await.unwrap(), PROJECT, TASK, Some(USER))
        .await
        .unwrap();
    session.commit().await.unwrap();
    task.id
}

async fn ws_task_state(pool: &sqlx::SqlitePool, id: &str) -> wlab_ws::models::WeakSupervisionTask {
    let mut session = Session::new(pool.clone());
    weak_supervision::get_task(session.conn().await.unwrap(), PROJECT, id)
        .await
        .unwrap()
        .expect("weak supervision task exists")
}

fn read_artifact(path: &std::path::Path) -> StatsLookup {
    let bytes = std::fs::read(path).expect("artifact written");
    rmp_serde::from_slice(&bytes).expect("artifact decodes")
}

fn key(source: &str, label: &str) -> (String, String) {
    (source.to_string(), label.to_string())
}

#[tokio::test]
async fn test_single_agreeing_source_fit_predict_and_quality() {
    let pool = setup_db().await;
    seed_task(&pool, CLASSIFICATION, &["pos", "neg"]).await;
    add_source(&pool, "s1", true).await;
    add_label(&pool, "r1", "pos", Some("s1"), Some(1.0)).await;
    add_label(&pool, "r1", "pos", None, None).await;

    let inference = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(Arc::new(WeightedVoteEngine::default()), inference.path());
    let ws_task_id = create_ws_task(&pool).await;

    let mut session = Session::new(pool.clone());
    orchestrator
        .fit_predict(&mut session, PROJECT, TASK, USER, &ws_task_id, None)
        .await;
    drop(session);

    let task = ws_task_state(&pool, &ws_task_id).await;
    assert_eq!(task.state, PayloadState::Success);
    assert_eq!(task.result_count, Some(1));
    assert_eq!(task.distinct_records, Some(1));
    assert_eq!(task.selected_information_sources.as_deref(), Some("lf_s1"));
    assert!(task.finished_at.is_some());

    let (label, confidence): (String, f64) = sqlx::query_as(
        "SELECT labeling_task_label_id, confidence FROM record_label_association \
         WHERE source_type = 'WEAK_SUPERVISION' AND record_id = 'r1' AND weak_supervision_id = ?",
    )
    .bind(&ws_task_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(label, "pos");
    assert!((confidence - 1.0).abs() < 1e-9);

    let mut session = Session::new(pool.clone());
    orchestrator
        .calculate_quality_statistics_for_labeling_task(&mut session, PROJECT, TASK, USER)
        .await
        .unwrap();
    let stored = information_sources::get_statistics(session.conn().await.unwrap(), "s1")
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].labeling_task_label_id, "pos");
    assert_eq!(stored[0].true_positives, Some(1));
    assert_eq!(stored[0].false_positives, Some(0));
    assert_eq!(stored[0].false_negatives, Some(0));
}

#[tokio::test]
async fn test_rerun_replaces_previous_predictions() {
    let pool = setup_db().await;
    seed_task(&pool, CLASSIFICATION, &["pos", "neg"]).await;
    add_source(&pool, "s1", true).await;
    add_label(&pool, "r1", "pos", Some("s1"), None).await;
    add_label(&pool, "r2", "neg", Some("s1"), None).await;

    let inference = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(Arc::new(WeightedVoteEngine::default()), inference.path());

    for _ in 0..2 {
        let ws_task_id = create_ws_task(&pool).await;
        let mut session = Session::new(pool.clone());
        orchestrator
            .fit_predict(&mut session, PROJECT, TASK, USER, &ws_task_id, None)
            .await;
    }

    let mut session = Session::new(pool.clone());
    let count = weak_supervision::count_results(session.conn().await.unwrap(), TASK)
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn test_extraction_fit_predict_stores_token_spans() {
    let pool = setup_db().await;
    seed_task(&pool, EXTRACTION, &["person"]).await;
    add_source(&pool, "s1", true).await;
    add_tokens(&pool, "r1", "person", Some("s1"), &[(0, true), (1, false), (2, true)]).await;

    let inference = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(Arc::new(WeightedVoteEngine::default()), inference.path());
    let ws_task_id = create_ws_task(&pool).await;

    let mut session = Session::new(pool.clone());
    orchestrator
        .fit_predict(
            &mut session,
            PROJECT,
            TASK,
            USER,
            &ws_task_id,
            Some(&PrecisionOverride::Uniform(0.9)),
        )
        .await;
    drop(session);

    let task = ws_task_state(&pool, &ws_task_id).await;
    assert_eq!(task.state, PayloadState::Success);
    // Spans (0,1) and (2,2) vote on adjacent tokens and merge into one prediction
    assert_eq!(task.result_count, Some(1));

    let tokens: Vec<(i64, bool)> = sqlx::query_as(
        r#"
        SELECT t.token_index, t.is_beginning_token
        FROM record_label_association_token t
        JOIN record_label_association rla ON rla.id = t.record_label_association_id
        WHERE rla.source_type = 'WEAK_SUPERVISION'
        ORDER BY t.token_index
        "#,
    )
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(tokens, vec![(0, true), (1, false), (2, false)]);
}

#[tokio::test]
async fn test_token_rows_reconstruct_into_spans() {
    let pool = setup_db().await;
    seed_task(&pool, EXTRACTION, &["person"]).await;
    add_source(&pool, "s1", true).await;
    add_tokens(&pool, "r1", "person", Some("s1"), &[(0, true), (1, false), (2, true)]).await;

    let mut session = Session::new(pool.clone());
    let (_, table) = collect_data(session.conn().await.unwrap(), PROJECT, TASK, false)
        .await
        .unwrap();

    let Vectors::Extraction(vectors) = build_vectors(&table) else {
        panic!("expected extraction vectors");
    };
    assert_eq!(vectors.len(), 1);
    let bounds: Vec<(i64, i64)> = vectors[0]
        .associations
        .iter()
        .map(|s| (s.start_token_index, s.end_token_index))
        .collect();
    assert_eq!(bounds, vec![(0, 1), (2, 2)]);
}

#[tokio::test]
async fn test_failing_engine_marks_task_failed_and_keeps_old_results() {
    let pool = setup_db().await;
    seed_task(&pool, CLASSIFICATION, &["pos"]).await;
    add_source(&pool, "s1", true).await;
    add_label(&pool, "r1", "pos", Some("s1"), None).await;

    // Earlier successful run
    let previous = create_ws_task(&pool).await;
    {
        let mut session = Session::new(pool.clone());
        let mut predictions = BTreeMap::new();
        predictions.insert(
            "r9".to_string(),
            wlab_ws::engine::ClassificationPrediction {
                label_id: "pos".to_string(),
                confidence: 0.7,
            },
        );
        weak_supervision::store_predictions(
            session.conn().await.unwrap(),
            PROJECT,
            TASK,
            USER,
            &previous,
            &Predictions::Classification(predictions),
            &RunSummary {
                selected_information_sources: "lf_s1".to_string(),
                distinct_records: 1,
            },
        )
        .await
        .unwrap();
        session.commit().await.unwrap();
    }

    let inference = tempfile::tempdir().unwrap();
    let engine = Arc::new(RecordingEngine::failing());
    let orchestrator = orchestrator(engine.clone(), inference.path());
    let ws_task_id = create_ws_task(&pool).await;

    let mut session = Session::new(pool.clone());
    orchestrator
        .fit_predict(
            &mut session,
            PROJECT,
            TASK,
            USER,
            &ws_task_id,
            Some(&PrecisionOverride::Uniform(0.5)),
        )
        .await;
    drop(session);

    assert_eq!(engine.combine_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    let task = ws_task_state(&pool, &ws_task_id).await;
    assert_eq!(task.state, PayloadState::Failed);
    assert!(task.finished_at.is_some());

    let mut session = Session::new(pool.clone());
    let count = weak_supervision::count_results(session.conn().await.unwrap(), TASK)
        .await
        .unwrap();
    assert_eq!(count, 1, "previous predictions survive a failed run");
}

#[tokio::test]
async fn test_unsupported_task_type_fails_fit_predict() {
    let pool = setup_db().await;
    seed_task(&pool, "SEQUENCE_TAGGING", &["pos"]).await;
    add_source(&pool, "s1", true).await;

    let inference = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(Arc::new(WeightedVoteEngine::default()), inference.path());
    let ws_task_id = create_ws_task(&pool).await;

    let mut session = Session::new(pool.clone());
    orchestrator
        .fit_predict(&mut session, PROJECT, TASK, USER, &ws_task_id, None)
        .await;
    drop(session);

    assert_eq!(ws_task_state(&pool, &ws_task_id).await.state, PayloadState::Failed);
}

#[tokio::test]
async fn test_export_with_per_source_override_skips_quality() {
    let pool = setup_db().await;
    seed_task(&pool, CLASSIFICATION, &["pos", "neg"]).await;
    add_source(&pool, "src1", true).await;
    add_source(&pool, "src2", true).await;
    add_label(&pool, "r1", "pos", Some("src1"), None).await;
    add_label(&pool, "r1", "pos", None, None).await;

    let inference = tempfile::tempdir().unwrap();
    let engine = Arc::new(RecordingEngine::default());
    let orchestrator = orchestrator(engine.clone(), inference.path());

    let requested: BTreeMap<String, f64> = [("src1".to_string(), 0.9)].into_iter().collect();
    let mut session = Session::new(pool.clone());
    let (status, message) = orchestrator
        .export_weak_supervision_stats(
            &mut session,
            PROJECT,
            TASK,
            Some(&PrecisionOverride::PerSource(requested)),
        )
        .await;

    assert_eq!((status, message.as_str()), (StatusCode::OK, "OK"));
    assert_eq!(engine.quality_calls(), 0);

    let lookup = read_artifact(&orchestrator.export_path(PROJECT, TASK));
    assert_eq!(lookup.len(), 2);
    for label in ["pos", "neg"] {
        let stats = &lookup[&key("src1", label)];
        assert_eq!(stats.len(), 1);
        assert_eq!(stats["precision"], 0.9);
    }
}

#[tokio::test]
async fn test_export_without_manual_labels_uses_default_precision() {
    let pool = setup_db().await;
    seed_task(&pool, CLASSIFICATION, &["pos", "neg"]).await;
    add_source(&pool, "s1", true).await;
    add_source(&pool, "s2", false).await;
    add_label(&pool, "r1", "pos", Some("s1"), None).await;

    let inference = tempfile::tempdir().unwrap();
    let engine = Arc::new(RecordingEngine::default());
    let orchestrator = orchestrator(engine.clone(), inference.path());

    let mut session = Session::new(pool.clone());
    let (status, _) = orchestrator
        .export_weak_supervision_stats(&mut session, PROJECT, TASK, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(engine.quality_calls(), 0);

    let lookup = read_artifact(&orchestrator.export_path(PROJECT, TASK));
    assert_eq!(lookup.len(), 4);
    assert!(lookup.values().all(|stats| stats["precision"] == 0.8));
    assert!(lookup.contains_key(&key("s2", "neg")));
}

#[tokio::test]
async fn test_export_computed_quality() {
    let pool = setup_db().await;
    seed_task(&pool, CLASSIFICATION, &["pos", "neg"]).await;
    add_source(&pool, "s1", true).await;
    add_label(&pool, "r1", "pos", Some("s1"), None).await;
    add_label(&pool, "r2", "pos", Some("s1"), None).await;
    add_label(&pool, "r1", "pos", None, None).await;
    add_label(&pool, "r2", "neg", None, None).await;

    let inference = tempfile::tempdir().unwrap();
    let engine = Arc::new(RecordingEngine::default());
    let orchestrator = orchestrator(engine.clone(), inference.path());

    let mut session = Session::new(pool.clone());
    let (status, _) = orchestrator
        .export_weak_supervision_stats(&mut session, PROJECT, TASK, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(engine.quality_calls(), 1);

    let path = orchestrator.export_path(PROJECT, TASK);
    assert!(path.ends_with("p1/weak-supervision-t1.msgpack"));
    let lookup = read_artifact(&path);
    let stats = &lookup[&key("s1", "pos")];
    assert_eq!(stats["true_positives"], 1.0);
    assert_eq!(stats["false_positives"], 1.0);
    assert_eq!(stats["precision"], 0.5);
    assert!(!stats.contains_key("false_negatives"));
}

#[tokio::test]
async fn test_export_unsupported_task_type_is_404() {
    let pool = setup_db().await;
    seed_task(&pool, "SEQUENCE_TAGGING", &["pos"]).await;

    let inference = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(Arc::new(WeightedVoteEngine::default()), inference.path());

    let mut session = Session::new(pool.clone());
    let (status, message) = orchestrator
        .export_weak_supervision_stats(&mut session, PROJECT, TASK, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(message, "Task type SEQUENCE_TAGGING not implemented");
    assert!(!orchestrator.export_path(PROJECT, TASK).exists());
}

#[tokio::test]
async fn test_collect_twice_is_identical_and_deduplicated() {
    let pool = setup_db().await;
    seed_task(&pool, CLASSIFICATION, &["pos"]).await;
    add_source(&pool, "s1", true).await;
    add_source(&pool, "s2", false).await;
    add_label(&pool, "r1", "pos", Some("s1"), Some(0.5)).await;
    add_label(&pool, "r1", "pos", Some("s1"), Some(0.5)).await;
    add_label(&pool, "r2", "pos", Some("s2"), None).await;
    add_label(&pool, "r1", "pos", None, None).await;

    let mut session = Session::new(pool.clone());
    let (_, first) = collect_data(session.conn().await.unwrap(), PROJECT, TASK, false)
        .await
        .unwrap();
    let (_, second) = collect_data(session.conn().await.unwrap(), PROJECT, TASK, false)
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);

    // Manual rows survive the selection filter, unselected sources do not
    let (_, selected) = collect_data(session.conn().await.unwrap(), PROJECT, TASK, true)
        .await
        .unwrap();
    let LabelTable::Classification(rows) = selected else {
        panic!("expected classification table");
    };
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().any(|r| r.source_id.is_none()));
    assert!(rows.iter().all(|r| r.source_id.as_deref() != Some("s2")));
}

#[tokio::test]
async fn test_quantity_rewrite_is_a_true_overwrite() {
    let pool = setup_db().await;
    seed_task(&pool, CLASSIFICATION, &["pos", "neg"]).await;
    add_source(&pool, "s1", true).await;
    add_source(&pool, "s2", true).await;
    add_label(&pool, "r1", "pos", Some("s1"), None).await;
    let neg_hit = add_label(&pool, "r2", "neg", Some("s1"), None).await;
    add_label(&pool, "r1", "neg", Some("s2"), None).await;

    let inference = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(Arc::new(WeightedVoteEngine::default()), inference.path());

    let mut session = Session::new(pool.clone());
    let has_coverage = orchestrator
        .calculate_quantity_statistics_for_labeling_task_from_source(&mut session, PROJECT, "s1", USER)
        .await
        .unwrap();
    assert!(has_coverage);
    let stored = information_sources::get_statistics(session.conn().await.unwrap(), "s1")
        .await
        .unwrap();
    assert_eq!(stored.len(), 2);
    let pos = stored.iter().find(|s| s.labeling_task_label_id == "pos").unwrap();
    assert_eq!(pos.record_coverage, Some(1));
    assert_eq!(pos.source_conflicts, Some(1));
    assert_eq!(pos.total_hits, Some(1));
    session.commit().await.unwrap();
    drop(session);

    sqlx::query("DELETE FROM record_label_association WHERE id = ?")
        .bind(&neg_hit)
        .execute(&pool)
        .await
        .unwrap();

    let mut session = Session::new(pool.clone());
    assert!(orchestrator
        .calculate_quantity_statistics_for_labeling_task_from_source(&mut session, PROJECT, "s1", USER)
        .await
        .unwrap());
    let stored = information_sources::get_statistics(session.conn().await.unwrap(), "s1")
        .await
        .unwrap();
    assert_eq!(stored.len(), 1, "stale label entry removed");
    assert_eq!(stored[0].labeling_task_label_id, "pos");
}

#[tokio::test]
async fn test_source_without_hits_reports_no_coverage() {
    let pool = setup_db().await;
    seed_task(&pool, CLASSIFICATION, &["pos"]).await;
    add_source(&pool, "s1", true).await;
    add_source(&pool, "s2", true).await;
    let hit = add_label(&pool, "r1", "pos", Some("s2"), None).await;

    let inference = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(Arc::new(WeightedVoteEngine::default()), inference.path());

    // s2 has stats before its hits vanish
    {
        let mut session = Session::new(pool.clone());
        assert!(orchestrator
            .calculate_quantity_statistics_for_labeling_task_from_source(&mut session, PROJECT, "s2", USER)
            .await
            .unwrap());
    }
    sqlx::query("DELETE FROM record_label_association WHERE id = ?")
        .bind(&hit)
        .execute(&pool)
        .await
        .unwrap();

    let mut session = Session::new(pool.clone());
    let has_coverage = orchestrator
        .calculate_quantity_statistics_for_labeling_task_from_source(&mut session, PROJECT, "s2", USER)
        .await
        .unwrap();
    assert!(!has_coverage);
    let stored = information_sources::get_statistics(session.conn().await.unwrap(), "s2")
        .await
        .unwrap();
    assert!(stored.is_empty());
    session.commit().await.unwrap();
    drop(session);

    assert_eq!(count_notifications(&pool, NO_COVERAGE_DATA_MESSAGE).await, 1);
}

#[tokio::test]
async fn test_quality_without_manual_labels_notifies() {
    let pool = setup_db().await;
    seed_task(&pool, CLASSIFICATION, &["pos"]).await;
    add_source(&pool, "s1", true).await;
    add_label(&pool, "r1", "pos", Some("s1"), None).await;

    let inference = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(Arc::new(WeightedVoteEngine::default()), inference.path());

    let mut session = Session::new(pool.clone());
    orchestrator
        .calculate_quality_statistics_for_labeling_task(&mut session, PROJECT, TASK, USER)
        .await
        .unwrap();
    let stored = information_sources::get_statistics(session.conn().await.unwrap(), "s1")
        .await
        .unwrap();
    assert!(stored.is_empty());
    session.commit().await.unwrap();
    drop(session);

    assert_eq!(count_notifications(&pool, NO_REFERENCE_DATA_MESSAGE).await, 1);
}

#[tokio::test]
async fn test_source_quality_ignores_excluded_records() {
    let pool = setup_db().await;
    seed_task(&pool, CLASSIFICATION, &["pos", "neg"]).await;
    add_source(&pool, "s1", true).await;
    add_source(&pool, "s2", true).await;
    add_label(&pool, "r1", "pos", Some("s1"), None).await;
    add_label(&pool, "r2", "pos", Some("s1"), None).await;
    add_label(&pool, "r1", "pos", Some("s2"), None).await;
    add_label(&pool, "r1", "pos", None, None).await;
    add_label(&pool, "r2", "neg", None, None).await;
    add_exclusion(&pool, "s1", "r2").await;

    let inference = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(Arc::new(WeightedVoteEngine::default()), inference.path());

    let mut session = Session::new(pool.clone());
    orchestrator
        .calculate_quality_statistics_for_source(&mut session, PROJECT, "s1", USER)
        .await
        .unwrap();

    let s1 = information_sources::get_statistics(session.conn().await.unwrap(), "s1")
        .await
        .unwrap();
    assert_eq!(s1.len(), 1);
    assert_eq!(s1[0].true_positives, Some(1));
    assert_eq!(s1[0].false_positives, Some(0));

    // Only the requesting source is written
    let s2 = information_sources::get_statistics(session.conn().await.unwrap(), "s2")
        .await
        .unwrap();
    assert!(s2.is_empty());
}
