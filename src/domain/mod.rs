//! Domain types for the transcript archiver.
//!
//! This module contains the persisted records:
//! - Job / JobQueue: queue entries in submission order
//! - History: terminal outcomes used for dedup
//! - Settings: runtime switches
//! - Transcript: payloads produced by extraction agents

pub mod history;
pub mod job;
pub mod settings;
pub mod transcript;

// Re-export commonly used types
pub use history::{History, HistoryRecord, HistoryStatus};
pub use job::{Job, JobQueue, JobStatus};
pub use settings::{Settings, SettingsPatch};
pub use transcript::{Offset, TranscriptEntry, TranscriptFound};
