//! SharePoint / Stream extraction agent over HTTP.
//!
//! For a recording page `https://<tenant>.sharepoint.com/.../<file>.mp4`
//! the agent lists `<page>/media/transcripts`, picks one transcript and
//! downloads its content as JSON. Only the timed entries are kept.

use std::sync::OnceLock;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use super::{AgentResponse, AgentSession, ExtractionAgent};
use crate::core::errors::ErrorCode;
use crate::core::format::DEFAULT_TITLE;
use crate::domain::{TranscriptEntry, TranscriptFound};

/// Transcript metadata as listed by the platform
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranscriptMeta {
    id: String,
    #[serde(default)]
    is_default: bool,
    #[serde(default)]
    is_visible: bool,
    #[serde(default)]
    temporary_download_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TranscriptList {
    Wrapped { value: Vec<TranscriptMeta> },
    Bare(Vec<TranscriptMeta>),
}

impl TranscriptList {
    fn into_vec(self) -> Vec<TranscriptMeta> {
        match self {
            Self::Wrapped { value } => value,
            Self::Bare(list) => list,
        }
    }
}

/// A failed platform call, already mapped to a wire code
#[derive(Debug)]
struct FetchFailure {
    code: ErrorCode,
    detail: String,
}

impl FetchFailure {
    fn into_response(self) -> AgentResponse {
        AgentResponse::TranscriptError {
            reason: self.code.as_str().to_string(),
            detail: self.detail,
        }
    }
}

/// HTTP agent for SharePoint-hosted recordings
pub struct SharePointAgent {
    client: reqwest::Client,
    token: Option<String>,
}

impl SharePointAgent {
    /// Create an agent, optionally sending a bearer token
    pub fn new(token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("transcript-archiver/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            token: token.filter(|t| !t.is_empty()),
        })
    }

    async fn fetch_json(&self, url: &str) -> Result<Value, FetchFailure> {
        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request
                .bearer_auth(token)
                .header("X-Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await.map_err(|e| FetchFailure {
            code: ErrorCode::NetworkFailure,
            detail: format!("network error: {}", e),
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchFailure {
                code: ErrorCode::AuthRequired,
                detail: "auth-required".to_string(),
            });
        }
        if !status.is_success() {
            return Err(FetchFailure {
                code: ErrorCode::FetchFailed,
                detail: format!("fetch-failed:{}", status.as_u16()),
            });
        }

        response.json::<Value>().await.map_err(|e| FetchFailure {
            code: ErrorCode::ParseFailed,
            detail: format!("parse-failed: {}", e),
        })
    }

    async fn extract_inner(&self, locator: &str) -> Result<AgentResponse, FetchFailure> {
        let base = page_base(locator).map_err(|e| FetchFailure {
            code: ErrorCode::ParseFailed,
            detail: e.to_string(),
        })?;

        let list_url = format!("{}/media/transcripts", base);
        let listing = self.fetch_json(&list_url).await?;
        let transcripts: Vec<TranscriptMeta> = serde_json::from_value::<TranscriptList>(listing)
            .map(TranscriptList::into_vec)
            .map_err(|e| FetchFailure {
                code: ErrorCode::ParseFailed,
                detail: format!("parse-failed: transcript list: {}", e),
            })?;

        let Some(selected) = pick_transcript(&transcripts) else {
            return Ok(AgentResponse::TranscriptNotFound {
                reason: "no transcripts listed for this recording".to_string(),
            });
        };
        debug!(transcript_id = %selected.id, "Selected transcript");

        let content_url = stream_url(&base, selected).map_err(|e| FetchFailure {
            code: ErrorCode::ParseFailed,
            detail: e.to_string(),
        })?;
        let data = self.fetch_json(&content_url).await?;
        let entries = normalize_entries(data).map_err(|e| FetchFailure {
            code: ErrorCode::ParseFailed,
            detail: format!("parse-failed: transcript entries: {}", e),
        })?;

        let (title, scheduled_start) = parse_meeting_meta(&recording_name(locator));

        Ok(AgentResponse::TranscriptFound(TranscriptFound {
            transcript_id: Some(selected.id.clone()),
            title,
            scheduled_start,
            entries,
        }))
    }
}

#[async_trait]
impl ExtractionAgent for SharePointAgent {
    fn name(&self) -> &str {
        "sharepoint"
    }

    async fn acquire(&self, locator: &str) -> Result<AgentSession> {
        // Plain HTTP needs no warm-up; only check the locator is addressable
        page_base(locator)?;
        Ok(AgentSession::new(locator))
    }

    #[instrument(skip(self, session), fields(session = %session.id))]
    async fn extract(&self, session: &AgentSession) -> Result<AgentResponse> {
        match self.extract_inner(&session.locator).await {
            Ok(response) => Ok(response),
            Err(failure) => Ok(failure.into_response()),
        }
    }

    async fn release(&self, _session: AgentSession) -> Result<()> {
        Ok(())
    }
}

/// `<origin><path>` of the page, without query or trailing slash
fn page_base(locator: &str) -> Result<String> {
    let url = Url::parse(locator).with_context(|| format!("parse-failed: invalid URL {}", locator))?;
    let path = url.path().trim_end_matches('/');
    Ok(format!("{}{}", url.origin().ascii_serialization(), path))
}

/// Prefer the default visible transcript, then any visible one, then the first
fn pick_transcript(transcripts: &[TranscriptMeta]) -> Option<&TranscriptMeta> {
    transcripts
        .iter()
        .find(|t| t.is_default && t.is_visible)
        .or_else(|| transcripts.iter().find(|t| t.is_visible))
        .or_else(|| transcripts.first())
}

/// JSON content url for a transcript
fn stream_url(base: &str, transcript: &TranscriptMeta) -> Result<String> {
    let mut url = match transcript.temporary_download_url.as_deref() {
        Some(temporary) if !temporary.is_empty() => {
            Url::parse(temporary).context("parse-failed: temporary download url")?
        }
        _ => Url::parse(&format!(
            "{}/media/transcripts/{}/streamContent",
            base, transcript.id
        ))
        .context("parse-failed: stream content url")?,
    };

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "is" && k != "$format")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("$format", "json");

    Ok(url.to_string())
}

/// Accept either a bare entry array or `{ "entries": [...] }`
fn normalize_entries(data: Value) -> Result<Vec<TranscriptEntry>, serde_json::Error> {
    match data {
        Value::Array(_) => serde_json::from_value(data),
        Value::Object(mut map) => match map.remove("entries") {
            Some(entries @ Value::Array(_)) => serde_json::from_value(entries),
            _ => Ok(Vec::new()),
        },
        _ => Ok(Vec::new()),
    }
}

/// Decoded last path segment of the locator, e.g. the `.mp4` file name
fn recording_name(locator: &str) -> String {
    Url::parse(locator)
        .ok()
        .and_then(|url| {
            url.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .map(|segment| {
            urlencoding::decode(&segment)
                .map(|decoded| decoded.into_owned())
                .unwrap_or(segment)
        })
        .unwrap_or_default()
}

fn stamp_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{8}_\d{6})").expect("static pattern"))
}

fn title_suffix_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(-\d{8}_\d{6}-.*$|-Meeting Transcript\.mp4$|\.mp4$)").expect("static pattern")
    })
}

/// Split a recording name like `Weekly Sync-20260211_093510-Meeting Recording.mp4`
/// into a title and the compact scheduled start.
fn parse_meeting_meta(name: &str) -> (String, String) {
    let scheduled_start = stamp_pattern()
        .captures(name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    let title = title_suffix_pattern().replace(name, "").trim().to_string();
    let title = if title.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        title
    };

    (title, scheduled_start)
}
