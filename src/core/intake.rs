//! Operations callers invoke outside of a run: enqueue, retry, status,
//! settings, and the one-off direct download.

use std::collections::HashSet;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::adapters::AgentSession;
use crate::domain::{HistoryRecord, Job, Settings, SettingsPatch};

use super::errors::ErrorCode;
use super::locator::{is_allowed_host, normalize, stable_id};
use super::messages::{AddOutcome, DownloadOutcome, StatusReport};
use super::processor::QueueProcessor;

impl QueueProcessor {
    /// Enqueue locators.
    ///
    /// Blank inputs are ignored. Unparseable or off-domain inputs are
    /// rejected. Locators already tracked, in any status, are dropped
    /// silently, as are repeats within the same batch.
    #[instrument(skip(self, urls), fields(count = urls.len()))]
    pub async fn add_urls(&self, urls: &[String]) -> Result<AddOutcome> {
        let allowed_domain = self.allowed_domain.clone();

        let outcome = self
            .with_queue(|jobs| {
                let mut known: HashSet<String> = jobs
                    .iter()
                    .map(|job| normalize(&job.url).unwrap_or_else(|_| job.url.clone()))
                    .collect();
                let mut outcome = AddOutcome {
                    ok: true,
                    ..Default::default()
                };

                for raw in urls {
                    let candidate = raw.trim();
                    if candidate.is_empty() {
                        continue;
                    }

                    let normalized = match normalize(candidate) {
                        Ok(url) if is_allowed_host(&url, &allowed_domain) => url,
                        _ => {
                            outcome.rejected.push(candidate.to_string());
                            continue;
                        }
                    };

                    if !known.insert(normalized.clone()) {
                        continue;
                    }
                    jobs.push(Job::new(normalized.clone()));
                    outcome.accepted.push(normalized);
                }
                outcome
            })
            .await
            .context("Failed to update the job queue")?;

        info!(
            accepted = outcome.accepted.len(),
            rejected = outcome.rejected.len(),
            "Locators submitted"
        );
        Ok(outcome)
    }

    /// Reset a job to pending with a fresh attempt budget.
    ///
    /// A job reset mid-attempt keeps the reset; the attempt's outcome is
    /// discarded when it lands. Returns false when no job has that id.
    #[instrument(skip(self))]
    pub async fn retry_item(&self, id: &str) -> Result<bool> {
        let found = self
            .update_job(id, |job| job.reset_for_retry())
            .await
            .context("Failed to update the job queue")?
            .is_some();

        if found {
            info!("Job reset for retry");
        } else {
            debug!("No job with that id");
        }
        Ok(found)
    }

    /// Snapshot of settings, queue, and history size
    pub async fn status(&self) -> Result<StatusReport> {
        let settings = self.store.load_settings().await?;
        let jobs = self.store.list_jobs().await?;
        let history = self.store.load_history().await?;

        Ok(StatusReport {
            ok: true,
            settings,
            queue_size: jobs.active_count(),
            history_count: history.len(),
            queue: jobs.into_jobs(),
        })
    }

    /// Overlay `patch` on the default settings and persist the result.
    ///
    /// Fields absent from the patch return to their defaults.
    #[instrument(skip(self))]
    pub async fn save_settings(&self, patch: &SettingsPatch) -> Result<Settings> {
        let settings = self
            .with_settings(|_| Settings::default().merged(patch))
            .await
            .context("Failed to save settings")?;

        info!(
            enabled = settings.enabled,
            throttle_ms = settings.throttle_ms,
            allow_redownload = settings.allow_redownload,
            "Settings saved"
        );
        Ok(settings)
    }

    /// Download one locator immediately, outside the queue.
    ///
    /// Redownload suppression does not apply. A transcript that cannot be
    /// located is reported without touching history.
    #[instrument(skip(self))]
    pub async fn page_download(&self, locator: &str) -> Result<DownloadOutcome> {
        let Ok(url) = normalize(locator) else {
            return Ok(DownloadOutcome::failed(format!(
                "{}: invalid URL",
                ErrorCode::ParseFailed
            )));
        };
        let settings = self.store.load_settings().await?;

        let session = match self.acquire_session(&url).await {
            Ok(session) => session,
            Err(failure) => {
                warn!(code = %failure.code, error = %failure.detail, "Agent session unavailable");
                return Ok(DownloadOutcome::failed(failure.summary()));
            }
        };

        let result = self.download_with_session(&url, &session).await;
        if settings.close_tab {
            self.release_session(session).await;
        }
        result
    }

    async fn download_with_session(&self, url: &str, session: &AgentSession) -> Result<DownloadOutcome> {
        let found = match self.extract(session).await {
            Ok(found) => found,
            Err(failure) => {
                info!(code = %failure.code, "No transcript for direct download");
                return Ok(DownloadOutcome::failed(failure.summary()));
            }
        };

        let history_key = stable_id(url);
        match self.deliver(&found).await {
            Ok(delivery) => {
                let record = HistoryRecord::done(url, delivery.transcript_id, &delivery.filename);
                let keys = record.keys(&history_key);
                self.put_history(record, keys)
                    .await
                    .context("Failed to record download history")?;

                info!(filename = %delivery.filename, "Direct download saved");
                Ok(DownloadOutcome::saved(delivery.filename))
            }
            Err(failure) => {
                // Only the locator key; a transcript id may already mark
                // another locator's successful download
                let record = HistoryRecord::failed(url, found.transcript_id.clone(), failure.code);
                self.put_history(record, vec![history_key])
                    .await
                    .context("Failed to record download history")?;

                warn!(code = %failure.code, error = %failure.detail, "Direct download failed");
                Ok(DownloadOutcome::failed(failure.summary()))
            }
        }
    }
}
