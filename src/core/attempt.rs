//! One extraction attempt: session, extraction, formatting, sink write.

use chrono::Local;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::adapters::{AgentResponse, AgentSession};
use crate::domain::TranscriptFound;

use super::errors::{AttemptFailure, ErrorCode};
use super::format::{build_transcript_filename, format_transcript_text};
use super::processor::QueueProcessor;

/// A transcript that reached the sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Delivery {
    pub filename: String,
    pub transcript_id: Option<String>,
}

impl QueueProcessor {
    /// Run one attempt against `locator`, releasing the session afterwards
    /// when `release_session` is set.
    #[instrument(skip(self), fields(agent = self.agent.name()))]
    pub(crate) async fn attempt(
        &self,
        locator: &str,
        release_session: bool,
    ) -> Result<Delivery, AttemptFailure> {
        let session = self.acquire_session(locator).await?;

        let result = match self.extract(&session).await {
            Ok(found) => self.deliver(&found).await,
            Err(failure) => Err(failure),
        };

        if release_session {
            self.release_session(session).await;
        }
        result
    }

    pub(crate) async fn acquire_session(&self, locator: &str) -> Result<AgentSession, AttemptFailure> {
        match timeout(self.limits.session_ready_timeout(), self.agent.acquire(locator)).await {
            Ok(Ok(session)) => {
                debug!(session = %session.id, "Agent session ready");
                Ok(session)
            }
            Ok(Err(e)) => Err(AttemptFailure::from_error(&e)),
            Err(_) => Err(AttemptFailure::new(
                ErrorCode::Timeout,
                format!(
                    "agent session not ready after {}ms",
                    self.limits.session_ready_timeout_ms
                ),
            )),
        }
    }

    /// Failures here are logged and dropped; the attempt outcome stands.
    pub(crate) async fn release_session(&self, session: AgentSession) {
        let id = session.id;
        if let Err(e) = self.agent.release(session).await {
            warn!(session = %id, error = %e, "Failed to release agent session");
        }
    }

    /// Ask the agent for entries, bounded by the item timeout
    pub(crate) async fn extract(&self, session: &AgentSession) -> Result<TranscriptFound, AttemptFailure> {
        let response = match timeout(self.limits.item_timeout(), self.agent.extract(session)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(AttemptFailure::from_error(&e)),
            Err(_) => {
                return Err(AttemptFailure::new(
                    ErrorCode::Timeout,
                    format!(
                        "no answer from agent within {}ms",
                        self.limits.item_timeout_ms
                    ),
                ))
            }
        };

        match response {
            AgentResponse::TranscriptFound(found) => Ok(found),
            AgentResponse::TranscriptNotFound { reason } => {
                let detail = if reason.trim().is_empty() {
                    "Transcript unavailable".to_string()
                } else {
                    reason
                };
                Err(AttemptFailure::new(ErrorCode::NoTranscript, detail))
            }
            AgentResponse::TranscriptError { reason, detail } => {
                let code = ErrorCode::from_code(&reason);
                let detail = if detail.is_empty() { reason } else { detail };
                Err(AttemptFailure::new(code, detail))
            }
        }
    }

    /// Render the transcript and hand it to the sink
    pub(crate) async fn deliver(&self, found: &TranscriptFound) -> Result<Delivery, AttemptFailure> {
        if found.entries.is_empty() {
            return Err(AttemptFailure::new(
                ErrorCode::NoTranscript,
                "No transcript entries found",
            ));
        }

        let now = Local::now().naive_local();
        let filename = build_transcript_filename(&found.title, &found.scheduled_start, now.date());
        let text = format_transcript_text(&found.title, &found.scheduled_start, &found.entries, now);

        let saved = self
            .sink
            .save(&filename, &text)
            .await
            .map_err(|e| AttemptFailure::new(ErrorCode::DownloadFailed, format!("{:#}", e)))?;

        debug!(filename = %saved.filename, entries = found.entries.len(), "Transcript saved");
        Ok(Delivery {
            filename: saved.filename,
            transcript_id: found
                .transcript_id
                .clone()
                .filter(|id| !id.trim().is_empty()),
        })
    }
}
