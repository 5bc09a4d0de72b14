//! Deferred job execution
//!
//! One process-wide instance, constructed at the composition root and
//! shared by every engine through an `Arc`. Jobs are keyed by message id
//! with at most one pending job per id: re-registering a key aborts and
//! replaces the previous timer. Jobs run on tokio's worker pool,
//! independent of whatever context registered them.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::types::ValidationError;

struct JobEntry {
    /// Distinguishes this registration from a replacement under the same
    /// key, so a finished job only removes its own entry.
    token: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
pub struct Scheduler {
    jobs: Mutex<HashMap<String, JobEntry>>,
    next_token: AtomicU64,
}

impl Scheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<String, JobEntry>> {
        // Job tasks never panic while holding the lock; recover anyway.
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a job for `id` firing at `fire_at` (strictly in the
    /// future). An existing job under the same id is replaced, never
    /// duplicated. The handler owns its I/O and must not fail outward.
    pub fn schedule<F, Fut>(
        self: &Arc<Self>,
        id: &str,
        fire_at: DateTime<Utc>,
        handler: F,
    ) -> Result<(), ValidationError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let now = Utc::now();
        if fire_at <= now {
            return Err(ValidationError::PastScheduleTime);
        }
        let delay = (fire_at - now).to_std().unwrap_or_default();

        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let job_id = id.to_string();
        let scheduler = Arc::downgrade(self);

        // Held across spawn and insert so a near-immediate fire blocks in
        // `remove_if_current` until its own entry is registered.
        let mut jobs = self.jobs();

        let handle = tokio::spawn({
            let job_id = job_id.clone();
            async move {
                tokio::time::sleep(delay).await;
                debug!(id = %job_id, "firing scheduled job");
                handler().await;
                if let Some(scheduler) = scheduler.upgrade() {
                    scheduler.remove_if_current(&job_id, token);
                }
            }
        });

        let previous = jobs.insert(job_id.clone(), JobEntry { token, handle });
        if let Some(previous) = previous {
            previous.handle.abort();
            info!(id = %job_id, "replaced previously scheduled job");
        } else {
            info!(id = %job_id, fire_at = %fire_at, "job scheduled");
        }
        Ok(())
    }

    /// Abort a pending job. Returns whether a job was registered.
    pub fn cancel(&self, id: &str) -> bool {
        match self.jobs().remove(id) {
            Some(entry) => {
                entry.handle.abort();
                info!(id = %id, "job cancelled");
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self, id: &str) -> bool {
        self.jobs().contains_key(id)
    }

    pub fn pending_jobs(&self) -> usize {
        self.jobs().len()
    }

    fn remove_if_current(&self, id: &str, token: u64) {
        let mut jobs = self.jobs();
        if jobs.get(id).map(|entry| entry.token) == Some(token) {
            jobs.remove(id);
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for entry in self.jobs().values() {
            entry.handle.abort();
        }
    }
}
