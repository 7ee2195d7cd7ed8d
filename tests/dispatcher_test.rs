//! End-to-end engine tests exercising the scenarios and invariants of
//! spec §8: one-shot success, pause, cron dedup/reschedule, and retry
//! exhaustion. Wall-clock-sensitive scenarios (S2/S3 backoff timing) are
//! exercised at the `backoff` unit-test level instead of here, since the
//! real powers-of-4 table runs into minutes at higher attempt counts.

use std::sync::Arc;
use std::time::Duration;

use poussetaches::config::EngineConfig;
use poussetaches::engine::Engine;
use poussetaches::store::Bucket;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(data_dir: std::path::PathBuf) -> EngineConfig {
    // std::env::var picks up POUSSETACHES_AUTH_KEY from the surrounding
    // process environment (absent in test runs); every other field is
    // sourced from explicit args, so there is no config.toml to race on.
    EngineConfig::new(Some(0), Some(data_dir), Some("error".to_string()), Some(2))
}

/// Poll `engine`'s success bucket until `id` shows up or `timeout` elapses.
async fn wait_for_success(engine: &Engine, id: &str, timeout: Duration) {
    let start = std::time::Instant::now();
    loop {
        if engine
            .list(Bucket::Success)
            .await
            .unwrap()
            .iter()
            .any(|t| t.id == id)
        {
            return;
        }
        if start.elapsed() > timeout {
            panic!("task {id} was not archived within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// S1: one-shot submit, callback returns 200 on the first attempt.
#[tokio::test]
async fn one_shot_success_is_archived() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/t"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let engine = Arc::new(Engine::new(test_config(dir.path().to_path_buf())));
    engine.boot_recover().await.unwrap();
    let id = engine
        .submit(format!("{}/t", server.uri()), b"hi".to_vec(), 200, String::new(), 0)
        .await
        .unwrap();
    engine.resume();

    let handles = poussetaches::workers::spawn_pool(engine.clone());
    wait_for_success(&engine, &id, Duration::from_secs(5)).await;

    let success = engine.list(Bucket::Success).await.unwrap();
    assert_eq!(success.len(), 1);
    assert_eq!(success[0].tries, 1);
    assert_eq!(success[0].last_error_status_code, 0);
    assert!(engine.list(Bucket::Waiting).await.unwrap().is_empty());

    engine.broadcast_shutdown();
    for h in handles {
        let _ = h.await;
    }
}

/// S4: paused engine delivers nothing even past the deadline.
#[tokio::test]
async fn paused_engine_delivers_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/t"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let engine = Arc::new(Engine::new(test_config(dir.path().to_path_buf())));
    engine.boot_recover().await.unwrap();
    for _ in 0..3 {
        engine
            .submit(format!("{}/t", server.uri()), b"hi".to_vec(), 200, String::new(), 0)
            .await
            .unwrap();
    }
    // Engine starts paused (§4.I step 4) — resume() is never called.
    assert!(engine.is_paused());

    let handles = poussetaches::workers::spawn_pool(engine.clone());
    tokio::time::sleep(Duration::from_millis(500)).await;

    let (paused, in_flight) = engine.status();
    assert!(paused);
    assert_eq!(in_flight, 0);
    assert_eq!(engine.list(Bucket::Waiting).await.unwrap().len(), 3);

    engine.broadcast_shutdown();
    for h in handles {
        let _ = h.await;
    }
}

/// S5: repeated cron submissions with identical (url, payload, schedule)
/// return the same id and leave exactly one `waiting` file behind.
#[tokio::test]
async fn cron_submission_is_deduplicated() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(Engine::new(test_config(dir.path().to_path_buf())));
    engine.boot_recover().await.unwrap();

    let first = engine
        .submit(
            "http://example/t".to_string(),
            b"hi".to_vec(),
            200,
            "*/5 * * * *".to_string(),
            0,
        )
        .await
        .unwrap();
    let second = engine
        .submit(
            "http://example/t".to_string(),
            b"hi".to_vec(),
            200,
            "*/5 * * * *".to_string(),
            0,
        )
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(first.len(), 40); // SHA-1 hex content-hash id
    assert_eq!(engine.list_cron().await.unwrap().len(), 1);
}

/// S6: a cron task's successful delivery resets `tries` and advances
/// `next_scheduled_run`, staying in `waiting` rather than moving to `success`.
#[tokio::test]
async fn cron_success_reschedules_instead_of_archiving() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(Engine::new(test_config(dir.path().to_path_buf())));
    engine.boot_recover().await.unwrap();

    engine
        .submit(
            "http://example/t".to_string(),
            b"hi".to_vec(),
            200,
            "*/5 * * * *".to_string(),
            0,
        )
        .await
        .unwrap();

    let mut task = engine.list_cron().await.unwrap().remove(0);
    let first_scheduled_run = task.next_scheduled_run.unwrap();
    task.tries = 3;
    task.last_error_body = Some("boom".to_string());
    task.last_error_status_code = 500;

    engine.finish_success(task).await.unwrap();

    assert!(engine.list(Bucket::Success).await.unwrap().is_empty());
    let rescheduled = engine.list_cron().await.unwrap();
    assert_eq!(rescheduled.len(), 1);
    assert_eq!(rescheduled[0].tries, 0);
    assert!(rescheduled[0].last_error_body.is_none());
    assert_eq!(rescheduled[0].last_error_status_code, 0);
    assert!(rescheduled[0].next_scheduled_run.unwrap() > first_scheduled_run);
}

/// Invariant #3 / S3: a task fails on every attempt and goes straight to
/// `dead` on the attempt where `tries` reaches `MAX_RETRIES`, with no
/// thirteenth retry scheduled (§9 Open Question #1).
#[tokio::test]
async fn exhausted_task_moves_to_dead_without_a_thirteenth_retry() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(Engine::new(test_config(dir.path().to_path_buf())));
    engine.boot_recover().await.unwrap();

    engine
        .submit("http://example/t".to_string(), b"hi".to_vec(), 200, String::new(), 0)
        .await
        .unwrap();

    for attempt in 1..=12u32 {
        let mut task = engine.list(Bucket::Waiting).await.unwrap().remove(0);
        task.tries = attempt;
        engine.finish_failure(task, 500, "boom".to_string()).await.unwrap();

        if attempt < 12 {
            assert!(
                engine.list(Bucket::Waiting).await.unwrap().len() == 1,
                "attempt {attempt} should still be waiting"
            );
            assert!(engine.list(Bucket::Dead).await.unwrap().is_empty());
        }
    }

    assert!(engine.list(Bucket::Waiting).await.unwrap().is_empty());
    let dead = engine.list(Bucket::Dead).await.unwrap();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].tries, 12);
    assert_eq!(dead[0].last_error_status_code, 500);
}

/// Invariant #6: restart drops cron tasks from disk and restores non-cron
/// waiting tasks into the in-memory queue, honoring a past-due deadline as
/// immediately eligible.
#[tokio::test]
async fn restart_drops_cron_and_restores_one_shot_waiting_tasks() {
    let dir = tempfile::tempdir().unwrap();

    {
        let engine = Arc::new(Engine::new(test_config(dir.path().to_path_buf())));
        engine.boot_recover().await.unwrap();
        engine
            .submit("http://example/one".to_string(), b"hi".to_vec(), 200, String::new(), 0)
            .await
            .unwrap();
        engine
            .submit(
                "http://example/cron".to_string(),
                b"hi".to_vec(),
                200,
                "*/5 * * * *".to_string(),
                0,
            )
            .await
            .unwrap();
        assert_eq!(engine.list(Bucket::Waiting).await.unwrap().len(), 2);
    }

    // Simulate a restart against the same data directory.
    let engine = Arc::new(Engine::new(test_config(dir.path().to_path_buf())));
    engine.boot_recover().await.unwrap();

    let waiting = engine.list(Bucket::Waiting).await.unwrap();
    assert_eq!(waiting.len(), 1, "cron entry should have been dropped from disk");
    assert!(!waiting[0].is_cron());
    assert_eq!(engine.queue.len().await, 1);
}
