//! Queue jobs and the ordered job list.
//!
//! A job tracks one normalized locator from admission to a terminal state.
//! Terminal jobs stay in the queue as an audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::locator::stable_id;

/// Lifecycle state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting to be picked up by a run
    Pending,

    /// Claimed by the active run
    Running,

    /// Transcript archived (or already archived earlier)
    Done,

    /// Gave up after exhausting attempts, or the locator was malformed
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.pad(s)
    }
}

/// One queue entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// `stable_id` of the normalized url
    pub id: String,

    /// Normalized locator
    pub url: String,

    /// When the job was admitted
    pub added_at: DateTime<Utc>,

    /// Current status
    pub status: JobStatus,

    /// Extraction attempts made so far
    #[serde(default)]
    pub attempts: u32,

    /// `"<code>: <detail>"` of the most recent failure, empty otherwise
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_error: String,
}

impl Job {
    /// Create a pending job for an already-normalized url
    pub fn new(normalized_url: impl Into<String>) -> Self {
        let url = normalized_url.into();
        Self {
            id: stable_id(&url),
            url,
            added_at: Utc::now(),
            status: JobStatus::Pending,
            attempts: 0,
            last_error: String::new(),
        }
    }

    /// Put the job back in line as if it were freshly admitted
    pub fn reset_for_retry(&mut self) {
        self.status = JobStatus::Pending;
        self.attempts = 0;
        self.last_error.clear();
    }
}

/// Ordered job list (submission order)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobQueue {
    jobs: Vec<Job>,
}

impl JobQueue {
    pub fn new(jobs: Vec<Job>) -> Self {
        Self { jobs }
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn into_jobs(self) -> Vec<Job> {
        self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Job> {
        self.jobs.iter_mut()
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    pub fn find_by_id_mut(&mut self, id: &str) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.id == id)
    }

    pub fn push(&mut self, job: Job) {
        self.jobs.push(job);
    }

    /// Ids of pending jobs in queue order, capped at `limit`
    pub fn pending_ids(&self, limit: usize) -> Vec<String> {
        self.jobs
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .take(limit)
            .map(|j| j.id.clone())
            .collect()
    }

    /// Jobs that still need work (pending or in flight)
    pub fn active_count(&self) -> usize {
        self.jobs
            .iter()
            .filter(|j| matches!(j.status, JobStatus::Pending | JobStatus::Running))
            .count()
    }
}
