//! Adapter interfaces for external collaborators.
//!
//! The queue engine talks to two collaborators it does not control:
//! - an extraction agent that fetches transcript entries for a locator
//! - a download sink that stores the rendered text as a named artifact

pub mod directory;
pub mod sharepoint;

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::TranscriptFound;

// Re-export the concrete adapters
pub use directory::DirectorySink;
pub use sharepoint::SharePointAgent;

/// Handle to one agent session scoped to a locator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSession {
    pub id: Uuid,
    pub locator: String,
}

impl AgentSession {
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            locator: locator.into(),
        }
    }
}

/// Answer to an extraction request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentResponse {
    /// Entries were located and fetched
    TranscriptFound(TranscriptFound),

    /// The page has no transcript
    TranscriptNotFound {
        #[serde(default)]
        reason: String,
    },

    /// The platform refused or the response was unusable
    TranscriptError {
        reason: String,
        #[serde(default)]
        detail: String,
    },
}

/// Trait for extraction agents
#[async_trait]
pub trait ExtractionAgent: Send + Sync {
    /// Human-readable agent name
    fn name(&self) -> &str;

    /// Claim a session for `locator`, returning once it can be addressed
    async fn acquire(&self, locator: &str) -> Result<AgentSession>;

    /// Extract the transcript for the session's locator.
    ///
    /// `Err` is reserved for unstructured failures (transport, crashes);
    /// platform outcomes are reported through `AgentResponse`.
    async fn extract(&self, session: &AgentSession) -> Result<AgentResponse>;

    /// Give the session back
    async fn release(&self, session: AgentSession) -> Result<()>;
}

/// Trait for download sinks
#[async_trait]
pub trait DownloadSink: Send + Sync {
    /// Store `text` under (a variant of) `filename`, returning the final name
    async fn save(&self, filename: &str, text: &str) -> Result<SavedArtifact>;
}

/// Where a sink put an artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedArtifact {
    /// Final file name (may differ from the requested one)
    pub filename: String,

    /// Full location, when the sink has one
    pub path: Option<PathBuf>,
}
