//! Job manager: a process-wide `{id → Worker}` table behind a
//! reader-writer lock, plus the `Worker` capability set that archive and
//! live workers both satisfy.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use puzzle::Puzzle;

/// The capability set the job manager needs from a running job. Archive and
/// live workers are variants; the manager only ever sees this interface.
pub trait Worker: Send + Sync {
    /// Begin the work. Takes `Arc<Self>` so implementations can spawn a
    /// background task holding a clone of the handle.
    fn start(self: Arc<Self>);
    fn is_done(&self) -> bool;
    /// `0.0` before work starts, `1.0` once done.
    fn progress(&self) -> f64;
    fn result(&self) -> Option<Vec<Puzzle>>;
    fn error(&self) -> Option<String>;
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "status")]
pub enum JobReport {
    #[serde(rename = "running")]
    Running { done: bool },
    #[serde(rename = "done")]
    Done { done: bool, result: Vec<Puzzle> },
    #[serde(rename = "failed")]
    Failed { done: bool, error: String },
}

pub struct JobManager {
    jobs: RwLock<HashMap<String, Arc<dyn Worker>>>,
    counter: AtomicU64,
}

impl JobManager {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            counter: AtomicU64::new(0),
        }
    }

    /// Register `worker`, start it, and return its hex-encoded job id.
    pub async fn start_job<W: Worker + 'static>(&self, worker: Arc<W>) -> String {
        let id = self.next_id();
        worker.clone().start();
        self.jobs.write().await.insert(id.clone(), worker);
        id
    }

    /// Report a job's status. Once a job reports `done` (successfully or
    /// not), its entry is deleted — a second call returns `None`.
    pub async fn report(&self, id: &str) -> Option<JobReport> {
        let done = {
            let jobs = self.jobs.read().await;
            let worker = jobs.get(id)?;
            if !worker.is_done() {
                return Some(JobReport::Running { done: false });
            }
            match worker.error() {
                Some(error) => JobReport::Failed { done: true, error },
                None => JobReport::Done {
                    done: true,
                    result: worker.result().unwrap_or_default(),
                },
            }
        };
        self.jobs.write().await.remove(id);
        Some(done)
    }

    fn next_id(&self) -> String {
        let counter = self.counter.fetch_add(1, Ordering::Relaxed);
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        counter.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new()
    }
}
