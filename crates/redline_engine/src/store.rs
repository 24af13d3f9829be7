use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use redline_core::{update, Job, JobMsg, JobResultView, JobStatus, JobStatusView};
use tokio::sync::Notify;

use crate::JobId;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Number of jobs in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub error: usize,
}

/// Process-wide job records. Every mutation goes through [`redline_core::update`]
/// under one lock.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: Mutex<HashMap<JobId, Job>>,
    next_id: AtomicU64,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self) -> JobId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        lock(&self.jobs).insert(id, Job::queued(id, Utc::now()));
        id
    }

    pub fn apply(&self, id: JobId, msg: JobMsg) -> Option<JobStatusView> {
        let mut jobs = lock(&self.jobs);
        let job = jobs.remove(&id)?;
        let job = update(job, msg);
        let view = job.view();
        jobs.insert(id, job);
        Some(view)
    }

    pub fn status(&self, id: JobId) -> Option<JobStatusView> {
        lock(&self.jobs).get(&id).map(Job::view)
    }

    pub fn result(&self, id: JobId) -> Option<JobResultView> {
        lock(&self.jobs).get(&id).and_then(Job::result)
    }

    pub fn counts(&self) -> StatusCounts {
        let jobs = lock(&self.jobs);
        let mut counts = StatusCounts::default();
        for job in jobs.values() {
            match job.status {
                JobStatus::Queued => counts.queued += 1,
                JobStatus::Processing => counts.processing += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Error => counts.error += 1,
            }
        }
        counts
    }
}

/// Everything the worker needs to run a submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedJob {
    pub id: JobId,
    pub instruction: String,
    pub filename: String,
    pub upload_path: PathBuf,
}

/// FIFO of submitted jobs. A pop hands an entry to exactly one consumer.
#[derive(Debug, Default)]
pub struct JobQueue {
    items: Mutex<VecDeque<QueuedJob>>,
    notify: Notify,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, job: QueuedJob) {
        lock(&self.items).push_back(job);
        self.notify.notify_one();
    }

    pub fn try_pop(&self) -> Option<QueuedJob> {
        lock(&self.items).pop_front()
    }

    /// Wait up to `timeout` for a job.
    pub async fn pop_timeout(&self, timeout: Duration) -> Option<QueuedJob> {
        if let Some(job) = self.try_pop() {
            return Some(job);
        }
        let _ = tokio::time::timeout(timeout, self.notify.notified()).await;
        self.try_pop()
    }

    pub fn len(&self) -> usize {
        lock(&self.items).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
