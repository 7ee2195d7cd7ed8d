//! Layered configuration: CLI/env override TOML override built-in default.
//!
//! Grounded on the teacher's `DaemonConfig::new()` priority chain and
//! `default_data_dir()` platform branching. The teacher's `ConfigWatcher`
//! (`notify`/`notify-debouncer-full` hot-reload) has no counterpart here:
//! the rate limiter and worker pool are sized once at construction, so
//! nothing in this config is safe to change without a restart.

use serde::Deserialize;
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 7991;
const DEFAULT_WORKERS: usize = 2;
const DEFAULT_RATE_LIMIT_CAPACITY: u32 = 5;
const DEFAULT_RATE_LIMIT_REFILL_PER_SEC: u32 = 3;
const DEFAULT_MAX_SUCCESS: usize = 1000;
const DEFAULT_WORKER_IDLE_SLEEP_MS: u64 = 200;

/// `{data_dir}/config.toml` — all fields are optional tuning overrides.
/// Priority: CLI / env > TOML > built-in default.
#[derive(Deserialize, Default)]
struct TomlConfig {
    port: Option<u16>,
    log: Option<String>,
    workers: Option<usize>,
    rate_limit_capacity: Option<u32>,
    rate_limit_refill_per_sec: Option<u32>,
    max_success: Option<usize>,
    worker_idle_sleep_ms: Option<u64>,
}

fn load_toml(data_dir: &std::path::Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            tracing::error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub log: String,
    pub workers: usize,
    pub rate_limit_capacity: u32,
    pub rate_limit_refill_per_sec: u32,
    pub max_success: usize,
    pub worker_idle_sleep_ms: u64,
    /// Shared secret sent as `Poussetaches-Auth-Key` on every callback POST.
    /// Env-only (`POUSSETACHES_AUTH_KEY`) — a secret should not be a
    /// process-list-visible CLI argument.
    pub auth_key: Option<String>,
}

impl EngineConfig {
    pub fn new(
        port: Option<u16>,
        data_dir: Option<PathBuf>,
        log: Option<String>,
        workers: Option<usize>,
    ) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        let toml = load_toml(&data_dir).unwrap_or_default();

        let port = port.or(toml.port).unwrap_or(DEFAULT_PORT);
        let log = log.or(toml.log).unwrap_or_else(|| "info".to_string());
        let workers = workers.or(toml.workers).unwrap_or(DEFAULT_WORKERS);
        let rate_limit_capacity = toml
            .rate_limit_capacity
            .unwrap_or(DEFAULT_RATE_LIMIT_CAPACITY);
        let rate_limit_refill_per_sec = toml
            .rate_limit_refill_per_sec
            .unwrap_or(DEFAULT_RATE_LIMIT_REFILL_PER_SEC);
        let max_success = toml.max_success.unwrap_or(DEFAULT_MAX_SUCCESS);
        let worker_idle_sleep_ms = toml
            .worker_idle_sleep_ms
            .unwrap_or(DEFAULT_WORKER_IDLE_SLEEP_MS);

        let auth_key = std::env::var("POUSSETACHES_AUTH_KEY")
            .ok()
            .filter(|s| !s.is_empty());

        Self {
            port,
            data_dir,
            log,
            workers,
            rate_limit_capacity,
            rate_limit_refill_per_sec,
            max_success,
            worker_idle_sleep_ms,
            auth_key,
        }
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("poussetaches_data");
        }
    }
    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("poussetaches_data");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("poussetaches_data");
        }
    }
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("poussetaches_data");
        }
    }
    PathBuf::from("poussetaches_data")
}
