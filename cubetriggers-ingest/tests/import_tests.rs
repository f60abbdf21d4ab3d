//! End-to-end import tests over an in-memory database

mod helpers;

use cubetriggers_common::events::{EventBus, TriggerEvent};
use cubetriggers_common::types::{AlgType, ImportStatus};
use cubetriggers_ingest::db::{algorithms, import_runs, ngrams};
use cubetriggers_ingest::jobs::ProcessImportJob;
use cubetriggers_ingest::jobs::ImportProcessor;

use helpers::{create_pending_run, run_import, test_config, test_pool};

#[tokio::test]
async fn import_two_algorithms_completes() {
    let pool = test_pool().await;
    let bus = EventBus::new(64);

    let run = run_import(&pool, &bus, test_config(), "AlgDb", "R U R' U'\nF R F'").await;

    assert_eq!(run.status, ImportStatus::Completed);
    assert_eq!(run.total_algorithms, 2);
    assert_eq!(run.processed_algorithms, 2);
    assert!(run.error_message.is_none());
    assert!(run.ended_at.is_some());

    let algorithm_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM algorithms")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(algorithm_count, 2);

    // "R U" is a 2-gram of the first algorithm, starting at character 0
    let sexy_start = ngrams::get_ngram_by_moves(&pool, "R U")
        .await
        .unwrap()
        .expect("ngram extracted");
    assert_eq!(sexy_start.length, 2);

    let first = algorithms::get_algorithm_by_moves(&pool, "R U R' U'")
        .await
        .unwrap();
    let occurrences = ngrams::occurrences_for_ngram(&pool, sexy_start.id).await.unwrap();
    assert!(occurrences.contains(&(first.id, 0)));
}

#[tokio::test]
async fn reimport_is_idempotent_for_canonical_rows() {
    let pool = test_pool().await;
    let bus = EventBus::new(64);

    let text = "R U R' U'";
    run_import(&pool, &bus, test_config(), "AlgDb", text).await;
    run_import(&pool, &bus, test_config(), "AlgDb", text).await;

    // One canonical algorithm, one occurrence per run
    let alg = algorithms::get_algorithm_by_moves(&pool, "R U R' U'")
        .await
        .unwrap();
    let algorithm_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM algorithms")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(algorithm_count, 1);
    assert_eq!(algorithms::count_occurrences(&pool, alg.id).await.unwrap(), 2);

    // Ngram occurrences are keyed on (ngram, algorithm, position) and must
    // not duplicate across runs
    let ngram = ngrams::get_ngram_by_moves(&pool, "R U")
        .await
        .unwrap()
        .unwrap();
    let positions: Vec<_> = ngrams::occurrences_for_ngram(&pool, ngram.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|(alg_id, _)| *alg_id == alg.id)
        .collect();
    assert_eq!(positions.len(), 1);
}

#[tokio::test]
async fn concurrent_imports_of_identical_text_converge() {
    let dir = tempfile::tempdir().unwrap();
    let pool = cubetriggers_common::db::init_database_pool(&dir.path().join("triggers.db"))
        .await
        .unwrap();
    let bus = EventBus::new(64);

    let (source_a, run_a) = create_pending_run(&pool, "A").await;
    let (source_b, run_b) = create_pending_run(&pool, "B").await;

    // Two different sources race on the same canonical text over one
    // shared database file
    let text = "R U R' U'";
    let processor_a = ImportProcessor::new(pool.clone(), bus.clone(), test_config());
    let processor_b = ImportProcessor::new(pool.clone(), bus.clone(), test_config());
    let job_a = ProcessImportJob {
        import_run_id: run_a.id,
        source_id: source_a.id,
        algorithms_text: text.to_string(),
    };
    let job_b = ProcessImportJob {
        import_run_id: run_b.id,
        source_id: source_b.id,
        algorithms_text: text.to_string(),
    };

    let (done_a, done_b) =
        tokio::join!(processor_a.process(&job_a, true), processor_b.process(&job_b, true));
    done_a.unwrap();
    done_b.unwrap();

    for run_id in [run_a.id, run_b.id] {
        let run = import_runs::require_run(&pool, run_id).await.unwrap();
        assert_eq!(run.status, ImportStatus::Completed);
    }

    // Racing inserts of the same canonical text converge to one row
    let algorithm_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM algorithms")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(algorithm_count, 1);

    let alg = algorithms::get_algorithm_by_moves(&pool, text).await.unwrap();
    assert_eq!(algorithms::count_occurrences(&pool, alg.id).await.unwrap(), 2);

    // One canonical Ngram row per distinct window, one occurrence each
    let ngram_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ngrams")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(ngram_count, 5);

    for moves in ["R U", "U R'", "R' U'", "R U R'", "U R' U'"] {
        let ngram = ngrams::get_ngram_by_moves(&pool, moves)
            .await
            .unwrap()
            .expect("canonical ngram exists");
        assert_eq!(
            ngrams::occurrences_for_ngram(&pool, ngram.id).await.unwrap().len(),
            1
        );
    }
}

#[tokio::test]
async fn labeled_line_is_classified_and_counted() {
    let pool = test_pool().await;
    let bus = EventBus::new(64);

    let run = run_import(
        &pool,
        &bus,
        test_config(),
        "AlgDb",
        "T-Perm: R U R' F' R U R' U' R' F R2 U' R'",
    )
    .await;
    assert_eq!(run.status, ImportStatus::Completed);

    let alg = algorithms::get_algorithm_by_moves(&pool, "R U R' F' R U R' U' R' F R2 U' R'")
        .await
        .unwrap();
    assert_eq!(alg.move_count, 13);

    let (alg_type, case_name): (String, Option<String>) = sqlx::query_as(
        "SELECT alg_type, case_name FROM algorithm_occurrences WHERE algorithm_id = ?",
    )
    .bind(alg.id.to_string())
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(alg_type, AlgType::Pll.as_str());
    assert_eq!(case_name.as_deref(), Some("T-Perm"));
}

#[tokio::test]
async fn blank_and_comment_only_text_completes_empty() {
    let pool = test_pool().await;
    let bus = EventBus::new(64);

    let run = run_import(
        &pool,
        &bus,
        test_config(),
        "AlgDb",
        "\n# heading comment\n// another comment\n   \n",
    )
    .await;

    assert_eq!(run.status, ImportStatus::Completed);
    assert_eq!(run.total_algorithms, 0);
    assert_eq!(run.processed_algorithms, 0);
    assert!(run.error_message.is_none());

    let algorithm_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM algorithms")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(algorithm_count, 0);
}

#[tokio::test]
async fn final_attempt_failure_records_failed_run() {
    let pool = test_pool().await;
    let bus = EventBus::new(64);
    let mut events = bus.subscribe();

    let (source, run) = create_pending_run(&pool, "AlgDb").await;

    // Sabotage persistence so the run fails mid-processing
    sqlx::query("DROP TABLE ngrams").execute(&pool).await.unwrap();

    let processor = ImportProcessor::new(pool.clone(), bus.clone(), test_config());
    let job = ProcessImportJob {
        import_run_id: run.id,
        source_id: source.id,
        algorithms_text: "R U R' U'".to_string(),
    };
    assert!(processor.process(&job, true).await.is_err());

    let reloaded = import_runs::require_run(&pool, run.id).await.unwrap();
    assert_eq!(reloaded.status, ImportStatus::Failed);
    assert!(reloaded.error_message.is_some());
    assert!(reloaded.ended_at.is_some());

    let mut saw_failed = false;
    while let Ok(event) = events.try_recv() {
        if let TriggerEvent::ImportFailed { import_run_id, .. } = event {
            assert_eq!(import_run_id, run.id);
            saw_failed = true;
        }
    }
    assert!(saw_failed);
}

#[tokio::test]
async fn non_final_attempt_failure_leaves_run_retryable() {
    let pool = test_pool().await;
    let bus = EventBus::new(64);
    let mut events = bus.subscribe();

    let (source, run) = create_pending_run(&pool, "AlgDb").await;
    sqlx::query("DROP TABLE ngrams").execute(&pool).await.unwrap();

    let processor = ImportProcessor::new(pool.clone(), bus.clone(), test_config());
    let job = ProcessImportJob {
        import_run_id: run.id,
        source_id: source.id,
        algorithms_text: "R U R' U'".to_string(),
    };
    assert!(processor.process(&job, false).await.is_err());

    // FAILED is only persisted once delivery attempts are exhausted, so a
    // redelivery can still re-enter PROCESSING
    let reloaded = import_runs::require_run(&pool, run.id).await.unwrap();
    assert_eq!(reloaded.status, ImportStatus::Processing);
    assert!(reloaded.error_message.is_none());

    // The failure event itself is emitted on every attempt
    let mut saw_failed = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, TriggerEvent::ImportFailed { .. }) {
            saw_failed = true;
        }
    }
    assert!(saw_failed);
}

#[tokio::test]
async fn progress_events_are_batched_and_monotonic() {
    let pool = test_pool().await;
    let bus = EventBus::new(64);
    let mut events = bus.subscribe();

    let run = run_import(&pool, &bus, test_config(), "AlgDb", "R U R' U'\nF R F'").await;
    assert_eq!(run.status, ImportStatus::Completed);

    let mut percentages = Vec::new();
    let mut completed = None;
    while let Ok(event) = events.try_recv() {
        match event {
            TriggerEvent::ImportProgress { percentage, import_run_id, .. } => {
                assert_eq!(import_run_id, run.id);
                percentages.push(percentage);
            }
            TriggerEvent::ImportCompleted {
                processed_algorithms,
                new_triggers_count,
                ..
            } => {
                completed = Some((processed_algorithms, new_triggers_count));
            }
            _ => {}
        }
    }

    // Parsing setup pins the first update at 5%, then per-algorithm updates
    // with batch size 1: floor(1/2 * 90) + 5 = 50, floor(2/2 * 90) + 5 = 95
    assert_eq!(percentages, vec![5, 50, 95]);

    let (processed, new_triggers) = completed.expect("completion event emitted");
    assert_eq!(processed, 2);
    assert!(new_triggers > 0);
}
