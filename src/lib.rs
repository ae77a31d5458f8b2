//! transcript-archiver - Queue-driven meeting transcript archiver
//!
//! Accepts meeting page URLs, keeps them in a persisted job queue, and
//! processes the queue one job at a time: an extraction agent fetches the
//! transcript, which is rendered to text and written through a download
//! sink. Outcomes land in a history keyed by stable identifiers so a
//! transcript is not downloaded twice.
//!
//! # Architecture
//!
//! - At most one queue run is active at a time (single-flight)
//! - Every state change is persisted before the next step
//! - Failed attempts are retried in later runs, up to a fixed bound
//!
//! # Modules
//!
//! - `adapters`: Extraction agent and download sink (SharePoint, directory)
//! - `core`: Processor, store, locator normalization, formatting
//! - `domain`: Data structures (Job, History, Settings, Transcript)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Queue a meeting page and process it
//! transcript-archiver add "https://contoso.sharepoint.com/sites/team/Recordings/Weekly.mp4"
//! transcript-archiver run
//!
//! # Inspect and retry
//! transcript-archiver status
//! transcript-archiver retry <job-id>
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use crate::core::{QueueProcessor, RunOutcome, StateStore};
pub use domain::{Job, JobStatus, Settings};
