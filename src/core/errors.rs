//! Failure taxonomy for job attempts.
//!
//! Structured agent failures carry a code directly. Free-text failures are
//! classified by substring match, which is best-effort only: the wording of
//! upstream messages is not a compatibility guarantee.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why an attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    AuthRequired,
    NoTranscript,
    NetworkFailure,
    FetchFailed,
    ParseFailed,
    DownloadFailed,
    Timeout,
    Unknown,
}

/// Classification order: first keyword hit wins
const CLASSIFY_ORDER: &[(ErrorCode, &[&str])] = &[
    (ErrorCode::AuthRequired, &["auth"]),
    (ErrorCode::NoTranscript, &["transcript"]),
    (ErrorCode::NetworkFailure, &["network"]),
    (ErrorCode::FetchFailed, &["fetch"]),
    (ErrorCode::ParseFailed, &["parse"]),
    (ErrorCode::DownloadFailed, &["download"]),
    (ErrorCode::Timeout, &["timeout", "timed out"]),
];

impl ErrorCode {
    pub const ALL: [ErrorCode; 8] = [
        Self::AuthRequired,
        Self::NoTranscript,
        Self::NetworkFailure,
        Self::FetchFailed,
        Self::ParseFailed,
        Self::DownloadFailed,
        Self::Timeout,
        Self::Unknown,
    ];

    /// Wire representation, e.g. `no-transcript`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthRequired => "auth-required",
            Self::NoTranscript => "no-transcript",
            Self::NetworkFailure => "network-failure",
            Self::FetchFailed => "fetch-failed",
            Self::ParseFailed => "parse-failed",
            Self::DownloadFailed => "download-failed",
            Self::Timeout => "timeout",
            Self::Unknown => "unknown",
        }
    }

    /// Map a free-text failure message onto a code
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        CLASSIFY_ORDER
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
            .map(|(code, _)| *code)
            .unwrap_or(Self::Unknown)
    }

    /// Interpret a code reported by a collaborator.
    ///
    /// Exact codes map directly; anything else (e.g. `fetch-failed:503`)
    /// goes through `classify`.
    pub fn from_code(code: &str) -> Self {
        let trimmed = code.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(trimmed))
            .unwrap_or_else(|| Self::classify(trimmed))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed job attempt: a code plus human-readable detail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    pub code: ErrorCode,
    pub detail: String,
}

impl AttemptFailure {
    pub fn new(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
        }
    }

    /// Build from an unstructured error, classifying its message chain
    pub fn from_error(err: &anyhow::Error) -> Self {
        let detail = format!("{:#}", err);
        Self::new(ErrorCode::classify(&detail), detail)
    }

    /// `"<code>: <detail>"`, the form stored in `Job::last_error`
    pub fn summary(&self) -> String {
        format!("{}: {}", self.code, self.detail)
    }
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.detail)
    }
}
