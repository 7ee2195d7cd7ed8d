//! The dispatcher engine: admission/query surface (§4.H) and boot/recovery
//! (§4.I), tied together as one shared aggregate.
//!
//! Grounded on the teacher's `AppContext` — a single value owned by the boot
//! routine and handed as a shareable `Arc` to both the HTTP layer and the
//! worker pool, per spec §9's explicit re-architecture note ("concentrate
//! into a single engine value ... pass a shareable handle").

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::cron;
use crate::error::{EngineError, EngineResult};
use crate::index::ScheduledIndex;
use crate::queue::ReadyQueue;
use crate::ratelimit::RateLimiter;
use crate::store::task::{cron_task_id, random_task_id, Task};
use crate::store::{Bucket, TaskStore};

pub struct Engine {
    pub store: TaskStore,
    pub queue: ReadyQueue,
    pub index: ScheduledIndex,
    pub rate_limiter: RateLimiter,
    pub http: reqwest::Client,
    pub config: EngineConfig,
    paused: AtomicBool,
    in_flight: AtomicU32,
    /// Broadcast stop signal: one message reaches every worker (spec §5
    /// Cancellation). Kept alive for the process lifetime so late-joining
    /// workers can still subscribe.
    shutdown_tx: tokio::sync::broadcast::Sender<()>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let store = TaskStore::new(&config.data_dir);
        let rate_limiter = RateLimiter::new(config.rate_limit_capacity, config.rate_limit_refill_per_sec);
        let (shutdown_tx, _) = tokio::sync::broadcast::channel(16);
        Self {
            store,
            queue: ReadyQueue::new(),
            index: ScheduledIndex::new(),
            rate_limiter,
            http: reqwest::Client::new(),
            config,
            // Workers start paused: an explicit resume() is required (§4.I step 4).
            paused: AtomicBool::new(true),
            in_flight: AtomicU32::new(0),
            shutdown_tx,
        }
    }

    pub fn subscribe_shutdown(&self) -> tokio::sync::broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn broadcast_shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    // ── Boot / Recovery (§4.I) ───────────────────────────────────────────────

    pub async fn boot_recover(&self) -> EngineResult<()> {
        self.store.ensure_dirs().await?;
        self.trim_archive().await?;
        self.replay_waiting().await?;
        info!("boot recovery complete, engine paused until resume() is called");
        Ok(())
    }

    /// Delete oldest `success` entries by `last_run` until at most
    /// `max_success` remain (§4.I step 2). Startup-only enforcement; the
    /// live success path never trims.
    async fn trim_archive(&self) -> EngineResult<()> {
        let mut successes = self.store.list(Bucket::Success).await?;
        if successes.len() <= self.config.max_success {
            return Ok(());
        }
        successes.sort_by_key(|t| t.last_run.unwrap_or(DateTime::<Utc>::MIN_UTC));
        let excess = successes.len() - self.config.max_success;
        for task in &successes[..excess] {
            self.store.remove(&task.id, Bucket::Success).await?;
        }
        info!(removed = excess, "trimmed success archive at boot");
        Ok(())
    }

    /// For each `waiting` entry: cron tasks are deleted from disk and
    /// skipped (operator must resubmit, §9 Open Question #3); non-cron
    /// tasks are enqueued in memory as-is, honoring a past-due `next_run` as
    /// immediately eligible.
    async fn replay_waiting(&self) -> EngineResult<()> {
        let waiting = self.store.list(Bucket::Waiting).await?;
        let mut restored = 0u32;
        let mut dropped_cron = 0u32;
        for task in waiting {
            if task.is_cron() {
                self.store.remove(&task.id, Bucket::Waiting).await?;
                dropped_cron += 1;
            } else {
                self.queue.enqueue(task).await;
                restored += 1;
            }
        }
        info!(restored, dropped_cron, "replayed waiting bucket");
        Ok(())
    }

    // ── Admission / Query (§4.H) ─────────────────────────────────────────────

    /// `initial_delay` is in minutes, per spec §4.G "specified in minutes on
    /// admission".
    #[allow(clippy::too_many_arguments)]
    pub async fn submit(
        &self,
        url: String,
        payload: Vec<u8>,
        expected: u16,
        schedule: String,
        initial_delay_minutes: i64,
    ) -> EngineResult<String> {
        let expected = if expected == 0 { 200 } else { expected };

        if !schedule.is_empty() {
            cron::parse(&schedule).map_err(EngineError::Admission)?;
            let id = cron_task_id(&url, &payload, &schedule);
            if self.index.contains(&id).await {
                return Ok(id);
            }
            let now = Utc::now() + ChronoDuration::minutes(initial_delay_minutes);
            let next_scheduled_run = cron::next_occurrence(&schedule, now)
                .map_err(EngineError::Admission)?;
            let task = Task {
                id: id.clone(),
                url,
                payload,
                expected,
                schedule,
                next_run: next_scheduled_run,
                next_scheduled_run: Some(next_scheduled_run),
                tries: 0,
                last_run: None,
                last_error_body: None,
                last_error_status_code: 0,
            };
            self.store.put(&task, Bucket::Waiting).await?;
            self.index.insert(&id).await;
            self.queue.enqueue(task).await;
            Ok(id)
        } else {
            let id = random_task_id();
            let next_run = Utc::now() + ChronoDuration::minutes(initial_delay_minutes);
            let task = Task {
                id: id.clone(),
                url,
                payload,
                expected,
                schedule,
                next_run,
                next_scheduled_run: None,
                tries: 0,
                last_run: None,
                last_error_body: None,
                last_error_status_code: 0,
            };
            self.store.put(&task, Bucket::Waiting).await?;
            self.queue.enqueue(task).await;
            Ok(id)
        }
    }

    pub fn status(&self) -> (bool, u32) {
        (self.paused.load(Ordering::SeqCst), self.in_flight.load(Ordering::SeqCst))
    }

    pub async fn list(&self, bucket: Bucket) -> EngineResult<Vec<Task>> {
        let mut tasks = self.store.list(bucket).await?;
        tasks.sort_by_key(|t| t.next_run);
        Ok(tasks)
    }

    pub async fn list_cron(&self) -> EngineResult<Vec<Task>> {
        let mut tasks = self.list(Bucket::Waiting).await?;
        tasks.retain(|t| t.is_cron());
        Ok(tasks)
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Clears the scheduled-task index and rebuilds in-memory state from the
    /// `waiting` bucket, dropping every existing cron entry in the process
    /// (§4.H `reload_cron`, same rule as boot replay). The ready queue is
    /// dropped and rebuilt rather than appended to — otherwise every
    /// one-shot task already resident in the queue would be re-enqueued a
    /// second time alongside the fresh replay, handing the same task id to
    /// two workers at once.
    pub async fn reload_cron(&self) -> EngineResult<()> {
        self.index.clear().await;
        self.queue.clear().await;
        self.replay_waiting().await?;
        Ok(())
    }

    // ── In-flight bookkeeping, used by the worker pool (§4.F Liveness) ──────

    pub fn mark_in_flight_start(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    pub fn mark_in_flight_end(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    // ── Outcome application, used by the worker pool (§4.F / §4.G) ──────────

    /// Successful delivery: move to `success`; reschedule if cron (§4.G).
    pub async fn finish_success(&self, mut task: Task) -> EngineResult<()> {
        if task.is_cron() {
            let prev = task.next_scheduled_run.unwrap_or(task.next_run);
            match cron::next_occurrence(&task.schedule, prev) {
                Ok(next) => {
                    task.next_scheduled_run = Some(next);
                    task.next_run = next;
                    task.tries = 0;
                    task.last_error_body = None;
                    task.last_error_status_code = 0;
                    self.store.put(&task, Bucket::Waiting).await?;
                    self.queue.enqueue(task).await;
                    return Ok(());
                }
                Err(e) => {
                    warn!(err = %e, task_id = %task.id, "cron reschedule failed, archiving occurrence instead");
                }
            }
        }
        self.store.move_task(&task, Bucket::Waiting, Bucket::Success).await?;
        Ok(())
    }

    /// Failed delivery: record the error, then either reschedule under
    /// backoff or move to `dead` once `tries + 1 >= MAX_RETRIES` (§4.D, §9
    /// Open Question #1).
    pub async fn finish_failure(
        &self,
        mut task: Task,
        status_code: i32,
        body: String,
    ) -> EngineResult<()> {
        task.last_error_status_code = status_code;
        task.last_error_body = Some(body);

        if crate::backoff::is_exhausted(task.tries) {
            self.store.move_task(&task, Bucket::Waiting, Bucket::Dead).await?;
            warn!(task_id = %task.id, tries = task.tries, "task exhausted retries, moved to dead");
        } else {
            let delay = crate::backoff::next_backoff(task.tries);
            task.next_run = Utc::now() + delay;
            self.store.put(&task, Bucket::Waiting).await?;
            self.queue.enqueue(task).await;
        }
        Ok(())
    }
}
