//! Durable per-task JSON file store, bucketed by state directory (spec §4.A).
//!
//! Grounded on the write-then-move idiom in the teacher's mailbox dead-letter
//! handling, generalized into the spec's explicit two-step contract: write the
//! destination file first, then unlink the source — an interrupted move risks
//! a duplicate, never a loss.

pub mod task;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::EngineResult;
pub use task::Task;

/// One of the three durable states a task file can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Waiting,
    Success,
    Dead,
}

impl Bucket {
    pub fn as_str(self) -> &'static str {
        match self {
            Bucket::Waiting => "waiting",
            Bucket::Success => "success",
            Bucket::Dead => "dead",
        }
    }
}

/// Three bucket directories (`waiting`, `success`, `dead`) under a base path.
pub struct TaskStore {
    base: PathBuf,
}

impl TaskStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn dir(&self, bucket: Bucket) -> PathBuf {
        self.base.join(bucket.as_str())
    }

    fn file(&self, bucket: Bucket, id: &str) -> PathBuf {
        self.dir(bucket).join(id)
    }

    /// Ensure the three bucket directories exist (spec §4.I step 1).
    pub async fn ensure_dirs(&self) -> EngineResult<()> {
        for bucket in [Bucket::Waiting, Bucket::Success, Bucket::Dead] {
            fs::create_dir_all(self.dir(bucket)).await?;
        }
        Ok(())
    }

    /// Write the task's JSON encoding to `<base>/<bucket>/<id>`, mode 0644.
    pub async fn put(&self, task: &Task, bucket: Bucket) -> EngineResult<()> {
        let path = self.file(bucket, &task.id);
        let json = serde_json::to_vec_pretty(task)?;
        fs::write(&path, json).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o644);
            fs::set_permissions(&path, perms).await?;
        }
        Ok(())
    }

    /// Unlink `<base>/<bucket>/<id>`. A missing file is an error to the caller.
    pub async fn remove(&self, id: &str, bucket: Bucket) -> EngineResult<()> {
        let path = self.file(bucket, id);
        fs::remove_file(&path).await?;
        Ok(())
    }

    /// `put(task, to)` followed by `remove(id, from)`. Write the destination
    /// first: an interrupted move therefore risks a duplicate, never a loss.
    pub async fn move_task(&self, task: &Task, from: Bucket, to: Bucket) -> EngineResult<()> {
        self.put(task, to).await?;
        self.remove(&task.id, from).await?;
        Ok(())
    }

    /// Decode every task file in `bucket`. Malformed entries abort the listing
    /// with the underlying error, per spec §4.A failure semantics.
    pub async fn list(&self, bucket: Bucket) -> EngineResult<Vec<Task>> {
        let dir = self.dir(bucket);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut tasks = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let bytes = fs::read(entry.path()).await?;
            let task: Task = serde_json::from_slice(&bytes)?;
            tasks.push(task);
        }
        Ok(tasks)
    }

    pub fn base(&self) -> &Path {
        &self.base
    }
}
