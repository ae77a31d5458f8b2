//! Request/response messages accepted by the processor.
//!
//! Requests are JSON objects tagged by `"type"`. A `requestId`, when
//! present, is echoed on the response so callers can match answers sent
//! out of order.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::{Job, Settings, SettingsPatch};

use super::processor::QueueProcessor;

pub const UNSUPPORTED_MESSAGE: &str = "Unsupported message type";

/// A request from a caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    AddUrls {
        #[serde(default)]
        urls: Vec<String>,
    },
    RunQueue,
    GetStatus,
    RetryItem {
        id: String,
    },
    SaveSettings {
        #[serde(default)]
        settings: SettingsPatch,
    },
    PageDownloadRequest {
        url: String,
    },
}

/// Summary of one queue run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    pub processed: usize,
    pub succeeded: usize,
    pub retried: usize,
    pub failed: usize,
    /// Jobs settled from history without an attempt
    #[serde(default)]
    pub already_done: usize,
}

impl RunOutcome {
    pub fn skipped() -> Self {
        Self {
            ok: true,
            skipped: true,
            ..Default::default()
        }
    }

    pub fn completed() -> Self {
        Self {
            ok: true,
            ..Default::default()
        }
    }
}

/// Result of `ADD_URLS`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOutcome {
    pub ok: bool,
    /// Normalized locators that were enqueued
    pub accepted: Vec<String>,
    /// Inputs refused as unparseable or off-domain
    pub rejected: Vec<String>,
}

/// Result of `GET_STATUS`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub ok: bool,
    pub settings: Settings,
    pub queue: Vec<Job>,
    pub queue_size: usize,
    pub history_count: usize,
}

/// Result of `PAGE_DOWNLOAD_REQUEST`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadOutcome {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl DownloadOutcome {
    pub fn saved(filename: impl Into<String>) -> Self {
        Self {
            ok: true,
            reason: None,
            filename: Some(filename.into()),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
            filename: None,
        }
    }
}

/// Answer to one request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Added(AddOutcome),
    Ran(RunOutcome),
    Status(Box<StatusReport>),
    Retried { ok: bool },
    SettingsSaved { ok: bool, settings: Settings },
    Downloaded(DownloadOutcome),
    Failed { ok: bool, reason: String },
}

impl Response {
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failed {
            ok: false,
            reason: reason.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        match self {
            Self::Added(r) => r.ok,
            Self::Ran(r) => r.ok,
            Self::Status(r) => r.ok,
            Self::Retried { ok } | Self::SettingsSaved { ok, .. } | Self::Failed { ok, .. } => *ok,
            Self::Downloaded(r) => r.ok,
        }
    }

    /// JSON form, with `requestId` attached when given
    pub fn to_json(&self, request_id: Option<&Value>) -> Value {
        let mut value = serde_json::to_value(self)
            .unwrap_or_else(|e| serde_json::json!({ "ok": false, "reason": e.to_string() }));
        if let (Some(id), Value::Object(map)) = (request_id, &mut value) {
            map.insert("requestId".to_string(), id.clone());
        }
        value
    }
}

/// Handle one request. Handler errors become `{ok: false, reason}`.
pub async fn dispatch(processor: &QueueProcessor, request: Request) -> Response {
    let result = match request {
        Request::AddUrls { urls } => processor.add_urls(&urls).await.map(Response::Added),
        Request::RunQueue => processor.run_queue().await.map(Response::Ran),
        Request::GetStatus => processor
            .status()
            .await
            .map(|report| Response::Status(Box::new(report))),
        Request::RetryItem { id } => processor
            .retry_item(&id)
            .await
            .map(|ok| Response::Retried { ok }),
        Request::SaveSettings { settings } => processor
            .save_settings(&settings)
            .await
            .map(|settings| Response::SettingsSaved { ok: true, settings }),
        Request::PageDownloadRequest { url } => {
            processor.page_download(&url).await.map(Response::Downloaded)
        }
    };

    result.unwrap_or_else(|e| {
        warn!(error = %format!("{:#}", e), "Request failed");
        Response::failure(format!("{:#}", e))
    })
}

/// Decode and handle one raw JSON message, echoing `requestId`.
///
/// Malformed or unknown messages answer `Unsupported message type`.
pub async fn dispatch_json(processor: &QueueProcessor, raw: &str) -> Value {
    let message: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "Message is not valid JSON");
            return Response::failure(UNSUPPORTED_MESSAGE).to_json(None);
        }
    };
    let request_id = message.get("requestId").cloned();

    let response = match serde_json::from_value::<Request>(message) {
        Ok(request) => dispatch(processor, request).await,
        Err(e) => {
            debug!(error = %e, "Unsupported message");
            Response::failure(UNSUPPORTED_MESSAGE)
        }
    };
    response.to_json(request_id.as_ref())
}
