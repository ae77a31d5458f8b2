//! Completion history used for redownload suppression.
//!
//! Records are keyed by job id and, when the agent reported one, by the
//! platform's transcript id as well. Both keys point at identical records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::errors::ErrorCode;

/// Terminal outcome stored in history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryStatus {
    Done,
    Failed,
}

/// One terminal outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_id: Option<String>,

    pub downloaded_at: DateTime<Utc>,

    /// Artifact name written by the sink; empty for failures
    #[serde(default)]
    pub filename: String,

    pub status: HistoryStatus,

    /// Error code, only for failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<ErrorCode>,
}

impl HistoryRecord {
    /// Record a successful sink write
    pub fn done(
        url: impl Into<String>,
        transcript_id: Option<String>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            transcript_id,
            downloaded_at: Utc::now(),
            filename: filename.into(),
            status: HistoryStatus::Done,
            reason: None,
        }
    }

    /// Record an exhausted or rejected download; never carries a filename
    pub fn failed(url: impl Into<String>, transcript_id: Option<String>, reason: ErrorCode) -> Self {
        Self {
            url: url.into(),
            transcript_id,
            downloaded_at: Utc::now(),
            filename: String::new(),
            status: HistoryStatus::Failed,
            reason: Some(reason),
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == HistoryStatus::Done
    }

    /// Keys this record is stored under: the job key plus the transcript id
    pub fn keys(&self, job_key: &str) -> Vec<String> {
        let mut keys = vec![job_key.to_string()];
        if let Some(tid) = self.transcript_id.as_deref().filter(|t| !t.is_empty()) {
            if tid != job_key {
                keys.push(tid.to_string());
            }
        }
        keys
    }
}

/// Mapping of key → record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    records: BTreeMap<String, HistoryRecord>,
}

impl History {
    pub fn get(&self, key: &str) -> Option<&HistoryRecord> {
        self.records.get(key)
    }

    /// Whether a successful download is recorded under `key`
    pub fn is_done(&self, key: &str) -> bool {
        self.get(key).map(|r| r.is_done()).unwrap_or(false)
    }

    /// Upsert the same record under every given key
    pub fn put<I, K>(&mut self, record: HistoryRecord, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        for key in keys {
            self.records.insert(key.into(), record.clone());
        }
    }

    /// Number of keys (secondary transcript-id keys included)
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &HistoryRecord)> {
        self.records.iter()
    }
}
