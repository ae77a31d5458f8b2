//! Queue processor: the single-flight run loop.
//!
//! A run walks pending jobs in queue order, hands each to the extraction
//! agent, writes successful transcripts through the sink, and records
//! outcomes in the job queue and history. Attempt failures are recorded on
//! the job and never fail the run; store failures do.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::{DownloadSink, ExtractionAgent};
use crate::domain::{HistoryRecord, Job, JobStatus, Settings};

use super::errors::ErrorCode;
use super::limits::EngineLimits;
use super::locator::{normalize, stable_id};
use super::messages::RunOutcome;
use super::store::{StateStore, StoreError};

/// Hosts accepted by `add_urls` unless configured otherwise
pub const DEFAULT_ALLOWED_DOMAIN: &str = "sharepoint.com";

/// Orchestrates queue runs and the external write paths
pub struct QueueProcessor {
    pub(crate) store: Arc<dyn StateStore>,
    pub(crate) agent: Arc<dyn ExtractionAgent>,
    pub(crate) sink: Arc<dyn DownloadSink>,
    pub(crate) limits: EngineLimits,
    pub(crate) allowed_domain: String,

    /// Held for the whole duration of a run
    run_guard: Mutex<()>,

    /// Held for each read-modify-persist burst on the stored records
    state_lock: Mutex<()>,
}

impl QueueProcessor {
    /// Create a processor with default limits
    pub fn new(
        store: Arc<dyn StateStore>,
        agent: Arc<dyn ExtractionAgent>,
        sink: Arc<dyn DownloadSink>,
    ) -> Self {
        Self {
            store,
            agent,
            sink,
            limits: EngineLimits::default(),
            allowed_domain: DEFAULT_ALLOWED_DOMAIN.to_string(),
            run_guard: Mutex::new(()),
            state_lock: Mutex::new(()),
        }
    }

    pub fn with_limits(mut self, limits: EngineLimits) -> Self {
        self.limits = limits.clamped();
        self
    }

    pub fn with_allowed_domain(mut self, domain: impl Into<String>) -> Self {
        self.allowed_domain = domain.into();
        self
    }

    /// Write default records for anything missing in the store
    pub async fn init(&self) -> Result<(), StoreError> {
        let _state = self.state_lock.lock().await;
        self.store.ensure_defaults().await
    }

    /// Whether a run currently holds the single-flight guard
    pub fn is_running(&self) -> bool {
        self.run_guard.try_lock().is_err()
    }

    /// Process up to `queue_limit_per_run` pending jobs.
    ///
    /// Returns `skipped` without doing anything if another run is active or
    /// the queue is disabled.
    #[instrument(skip(self))]
    pub async fn run_queue(&self) -> Result<RunOutcome> {
        let Ok(_run) = self.run_guard.try_lock() else {
            debug!("Run already active, skipping");
            return Ok(RunOutcome::skipped());
        };

        let settings = self.store.load_settings().await?;
        if !settings.enabled {
            info!("Queue disabled, skipping run");
            return Ok(RunOutcome::skipped());
        }

        self.recover_interrupted().await?;

        let selected = self
            .store
            .list_jobs()
            .await?
            .pending_ids(self.limits.queue_limit_per_run);
        info!(selected = selected.len(), "Starting queue run");

        let mut outcome = RunOutcome::completed();
        for id in &selected {
            self.process_job(id, &settings, &mut outcome).await?;
        }

        info!(
            processed = outcome.processed,
            succeeded = outcome.succeeded,
            retried = outcome.retried,
            failed = outcome.failed,
            already_done = outcome.already_done,
            "Queue run finished"
        );
        Ok(outcome)
    }

    /// Drive one job through a single attempt
    #[instrument(skip(self, settings, outcome))]
    async fn process_job(
        &self,
        id: &str,
        settings: &Settings,
        outcome: &mut RunOutcome,
    ) -> Result<()> {
        let Some(job) = self.store.find_job(id).await? else {
            return Ok(());
        };
        if job.status != JobStatus::Pending {
            debug!(status = %job.status, "Job no longer pending, skipping");
            return Ok(());
        }

        let url = match normalize(&job.url) {
            Ok(url) => url,
            Err(e) => {
                error!(error = %e, "Job url does not parse, failing without retry");
                self.update_job(id, |job| {
                    job.status = JobStatus::Failed;
                    job.last_error = format!("{}: invalid URL", ErrorCode::ParseFailed);
                })
                .await?;
                outcome.failed += 1;
                return Ok(());
            }
        };

        let history_key = stable_id(&url);
        if !settings.allow_redownload && self.store.load_history().await?.is_done(&history_key) {
            debug!(%url, "Already downloaded, marking done");
            self.update_job(id, |job| {
                job.url = url.clone();
                job.status = JobStatus::Done;
            })
            .await?;
            outcome.already_done += 1;
            return Ok(());
        }

        let Some(attempts) = self
            .update_job(id, |job| {
                job.url = url.clone();
                job.status = JobStatus::Running;
                job.attempts += 1;
                job.attempts
            })
            .await?
        else {
            return Ok(());
        };
        outcome.processed += 1;

        match self.attempt(&url, settings.close_tab).await {
            Ok(delivery) => {
                let record = HistoryRecord::done(&url, delivery.transcript_id, &delivery.filename);
                let keys = record.keys(&history_key);
                let settled = self
                    .settle_job(id, attempts, Some((record, keys)), |job| {
                        job.status = JobStatus::Done;
                        job.last_error.clear();
                    })
                    .await?;
                if settled {
                    info!(filename = %delivery.filename, attempts, "Transcript archived");
                    outcome.succeeded += 1;
                }
            }
            Err(failure) if self.limits.should_retry(attempts) => {
                warn!(
                    attempts,
                    code = %failure.code,
                    error = %failure.detail,
                    backoff_ms = self.limits.backoff_ms,
                    "Attempt failed, will retry in a later run"
                );
                let settled = self
                    .settle_job(id, attempts, None, |job| {
                        job.status = JobStatus::Pending;
                        job.last_error = failure.summary();
                    })
                    .await?;
                if settled {
                    outcome.retried += 1;
                }

                // Backoff replaces the throttle pause on the retry path
                tokio::time::sleep(self.limits.backoff()).await;
                return Ok(());
            }
            Err(failure) => {
                error!(
                    attempts,
                    code = %failure.code,
                    error = %failure.detail,
                    "Job failed permanently"
                );
                let history = (
                    HistoryRecord::failed(&url, None, failure.code),
                    vec![history_key.clone()],
                );
                let settled = self
                    .settle_job(id, attempts, Some(history), |job| {
                        job.status = JobStatus::Failed;
                        job.last_error = failure.summary();
                    })
                    .await?;
                if settled {
                    outcome.failed += 1;
                }
            }
        }

        tokio::time::sleep(Duration::from_millis(settings.throttle_ms)).await;
        Ok(())
    }

    /// Settle jobs left `running` by a process that died mid-run
    async fn recover_interrupted(&self) -> Result<(), StoreError> {
        let _state = self.state_lock.lock().await;
        let mut jobs = self.store.list_jobs().await?;
        let mut exhausted = Vec::new();

        let mut recovered = 0usize;
        for job in jobs.iter_mut().filter(|j| j.status == JobStatus::Running) {
            if self.limits.should_retry(job.attempts) {
                job.status = JobStatus::Pending;
            } else {
                job.status = JobStatus::Failed;
                job.last_error = format!("{}: interrupted before completion", ErrorCode::Unknown);
                exhausted.push(job.url.clone());
            }
            recovered += 1;
        }

        if recovered == 0 {
            return Ok(());
        }
        warn!(count = recovered, "Recovered jobs interrupted by an earlier run");

        if !exhausted.is_empty() {
            let mut history = self.store.load_history().await?;
            for url in exhausted {
                let url = normalize(&url).unwrap_or(url);
                let key = stable_id(&url);
                history.put(HistoryRecord::failed(&url, None, ErrorCode::Unknown), vec![key]);
            }
            self.store.save_history(&history).await?;
        }
        self.store.replace_all_jobs(&jobs).await
    }

    /// Record the outcome of the attempt numbered `attempts`.
    ///
    /// Applies `f` and writes `history` in one burst, but only while the
    /// stored job is still the running attempt this run claimed. A job reset
    /// or removed in the meantime is left alone and false is returned.
    async fn settle_job<F>(
        &self,
        id: &str,
        attempts: u32,
        history: Option<(HistoryRecord, Vec<String>)>,
        f: F,
    ) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut Job) + Send,
    {
        let _state = self.state_lock.lock().await;
        let mut jobs = self.store.list_jobs().await?;
        let Some(job) = jobs
            .find_by_id_mut(id)
            .filter(|job| job.status == JobStatus::Running && job.attempts == attempts)
        else {
            warn!(attempts, "Job changed while its attempt was in flight, outcome dropped");
            return Ok(false);
        };

        if let Some((record, keys)) = history {
            let mut stored = self.store.load_history().await?;
            stored.put(record, keys);
            self.store.save_history(&stored).await?;
        }
        f(job);
        self.store.replace_all_jobs(&jobs).await?;
        Ok(true)
    }

    /// Apply `f` to one stored job and persist the whole queue.
    ///
    /// Returns `None` if no job has that id.
    pub(crate) async fn update_job<F, T>(&self, id: &str, f: F) -> Result<Option<T>, StoreError>
    where
        F: FnOnce(&mut Job) -> T + Send,
        T: Send,
    {
        let _state = self.state_lock.lock().await;
        let mut jobs = self.store.list_jobs().await?;
        let Some(job) = jobs.find_by_id_mut(id) else {
            return Ok(None);
        };

        let value = f(job);
        self.store.replace_all_jobs(&jobs).await?;
        Ok(Some(value))
    }

    /// Upsert a history record under every key
    pub(crate) async fn put_history(
        &self,
        record: HistoryRecord,
        keys: Vec<String>,
    ) -> Result<(), StoreError> {
        let _state = self.state_lock.lock().await;
        let mut history = self.store.load_history().await?;
        history.put(record, keys);
        self.store.save_history(&history).await
    }

    /// Run `f` on the stored queue under the state lock, then persist it
    pub(crate) async fn with_queue<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut crate::domain::JobQueue) -> T + Send,
        T: Send,
    {
        let _state = self.state_lock.lock().await;
        let mut jobs = self.store.list_jobs().await?;
        let value = f(&mut jobs);
        self.store.replace_all_jobs(&jobs).await?;
        Ok(value)
    }

    /// Read-modify-persist the settings record under the state lock
    pub(crate) async fn with_settings<F>(&self, f: F) -> Result<Settings, StoreError>
    where
        F: FnOnce(&Settings) -> Settings + Send,
    {
        let _state = self.state_lock.lock().await;
        let current = self.store.load_settings().await?;
        let updated = f(&current);
        self.store.save_settings(&updated).await?;
        Ok(updated)
    }
}
