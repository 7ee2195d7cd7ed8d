//! Fixed-size worker pool: pulls ready tasks, performs the HTTP POST,
//! classifies the outcome, and applies the resulting state transition
//! (spec §4.F).
//!
//! Grounded on the teacher's spawned background-task loops in
//! `run_server` (license refresh, session pruning): `tokio::spawn` +
//! a polling sleep, generalized here into N identical delivery workers
//! sharing one `Arc<Engine>`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::engine::Engine;
use crate::error::EngineError;
use crate::store::task::Envelope;

/// Spawn `engine.config.workers` worker loops, each holding a shutdown
/// subscription. Returns their join handles so the caller can await a
/// graceful drain.
pub fn spawn_pool(engine: Arc<Engine>) -> Vec<tokio::task::JoinHandle<()>> {
    (0..engine.config.workers)
        .map(|idx| {
            let engine = engine.clone();
            tokio::spawn(async move { worker_loop(idx, engine).await })
        })
        .collect()
}

async fn worker_loop(idx: usize, engine: Arc<Engine>) {
    let mut shutdown = engine.subscribe_shutdown();
    let idle_sleep = Duration::from_millis(engine.config.worker_idle_sleep_ms);

    loop {
        if shutdown.try_recv().is_ok() {
            info!(worker = idx, "worker stopping");
            return;
        }

        if engine.is_paused() {
            tokio::time::sleep(idle_sleep).await;
            continue;
        }

        let task = engine.queue.dequeue_ready(Utc::now()).await;
        let Some(mut task) = task else {
            tokio::time::sleep(idle_sleep).await;
            continue;
        };

        engine.rate_limiter.acquire().await;

        engine.mark_in_flight_start();
        task.last_run = Some(Utc::now());
        task.tries += 1;
        let envelope = Envelope::new(task.payload.clone(), task.tries);

        let outcome = deliver(&engine, &task, &envelope).await;
        engine.mark_in_flight_end();

        let task_id = task.id.clone();
        let result = match outcome {
            Outcome::Success => engine.finish_success(task).await,
            Outcome::Failure { status, body } => engine.finish_failure(task, status, body).await,
        };

        if let Err(e) = result {
            warn!(worker = idx, task_id = %task_id, err = %e, "failed to persist delivery outcome");
        }
    }
}

enum Outcome {
    Success,
    Failure { status: i32, body: String },
}

/// POST the envelope to `task.url` and classify the response per §4.F.
async fn deliver(engine: &Engine, task: &crate::store::Task, envelope: &Envelope) -> Outcome {
    let mut request = engine.http.post(&task.url).json(envelope);
    if let Some(key) = &engine.config.auth_key {
        request = request.header("Poussetaches-Auth-Key", key);
    }

    match request.send().await {
        Ok(resp) => {
            let status = resp.status().as_u16();
            if status == task.expected {
                Outcome::Success
            } else {
                let body = resp.text().await.unwrap_or_default();
                Outcome::Failure {
                    status: status as i32,
                    body,
                }
            }
        }
        Err(e) => {
            let err = EngineError::Transport(e);
            warn!(task_id = %task.id, err = %err, "callback delivery transport error");
            Outcome::Failure {
                status: -1,
                body: err.to_string(),
            }
        }
    }
}
