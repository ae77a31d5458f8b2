//! Core queue engine.
//!
//! This module contains:
//! - Locator: normalization, host checks and stable identifiers
//! - Store: persistence of settings, queue and history
//! - Processor: the single-flight run loop and per-job attempts
//! - Intake: enqueue, retry, status, settings and direct download
//! - Messages: tagged requests and their JSON answers
//! - Format: transcript text and file naming

mod attempt;
pub mod errors;
pub mod format;
mod intake;
pub mod limits;
pub mod locator;
pub mod messages;
pub mod processor;
pub mod store;

// Re-export commonly used types
pub use errors::{AttemptFailure, ErrorCode};
pub use limits::EngineLimits;
pub use locator::{is_allowed_host, normalize, stable_id, LocatorError};
pub use messages::{
    dispatch, dispatch_json, AddOutcome, DownloadOutcome, Request, Response, RunOutcome,
    StatusReport,
};
pub use processor::{QueueProcessor, DEFAULT_ALLOWED_DOMAIN};
pub use store::{JsonFileStore, MemoryStore, StateStore, StoreError};
