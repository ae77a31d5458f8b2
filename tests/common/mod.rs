//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Notify;

use transcript_archiver::adapters::{
    AgentResponse, AgentSession, DownloadSink, ExtractionAgent, SavedArtifact,
};
use transcript_archiver::core::{EngineLimits, MemoryStore, QueueProcessor, StateStore, StoreError};
use transcript_archiver::domain::{
    History, JobQueue, Offset, Settings, TranscriptEntry, TranscriptFound,
};

/// One scripted agent behaviour
#[derive(Debug, Clone)]
pub enum Step {
    Found(TranscriptFound),
    NotFound(&'static str),
    Error(&'static str, &'static str),
    /// `extract` returns `Err` with this message
    Crash(&'static str),
    /// `acquire` returns `Err` with this message
    AcquireError(&'static str),
    /// `extract` never answers
    Hang,
}

/// Agent answering from per-locator scripts
pub struct ScriptedAgent {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    fallback: Step,
    gate: Option<Arc<Notify>>,
    entered: Arc<Notify>,
    pub extracted: Mutex<Vec<String>>,
    pub released: AtomicUsize,
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback: Step::Found(found("Weekly Sync", Some("tr-1"))),
            gate: None,
            entered: Arc::new(Notify::new()),
            extracted: Mutex::new(Vec::new()),
            released: AtomicUsize::new(0),
        }
    }

    /// Answer with `steps` in order for `locator`, then the fallback
    pub fn script(self, locator: &str, steps: Vec<Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(locator.to_string(), steps.into());
        self
    }

    pub fn fallback(mut self, step: Step) -> Self {
        self.fallback = step;
        self
    }

    /// Hold every `extract` until `gate` is notified
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Notified each time `extract` is entered
    pub fn entered(&self) -> Arc<Notify> {
        Arc::clone(&self.entered)
    }

    pub fn extract_count(&self) -> usize {
        self.extracted.lock().unwrap().len()
    }

    fn peek_is_acquire_error(&self, locator: &str) -> Option<&'static str> {
        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts.get_mut(locator)?;
        match queue.front() {
            Some(Step::AcquireError(msg)) => {
                let msg = *msg;
                queue.pop_front();
                Some(msg)
            }
            _ => None,
        }
    }

    fn next_step(&self, locator: &str) -> Step {
        self.scripts
            .lock()
            .unwrap()
            .get_mut(locator)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl ExtractionAgent for ScriptedAgent {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn acquire(&self, locator: &str) -> Result<AgentSession> {
        if let Some(msg) = self.peek_is_acquire_error(locator) {
            anyhow::bail!("{}", msg);
        }
        Ok(AgentSession::new(locator))
    }

    async fn extract(&self, session: &AgentSession) -> Result<AgentResponse> {
        self.extracted.lock().unwrap().push(session.locator.clone());
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        match self.next_step(&session.locator) {
            Step::Found(found) => Ok(AgentResponse::TranscriptFound(found)),
            Step::NotFound(reason) => Ok(AgentResponse::TranscriptNotFound {
                reason: reason.to_string(),
            }),
            Step::Error(reason, detail) => Ok(AgentResponse::TranscriptError {
                reason: reason.to_string(),
                detail: detail.to_string(),
            }),
            Step::Crash(msg) | Step::AcquireError(msg) => anyhow::bail!("{}", msg),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                anyhow::bail!("hung agent woke up")
            }
        }
    }

    async fn release(&self, _session: AgentSession) -> Result<()> {
        self.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Sink keeping every saved file in memory
#[derive(Default)]
pub struct RecordingSink {
    pub saved: Mutex<Vec<(String, String)>>,
    pub fail: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let sink = Self::default();
        sink.fail.store(true, Ordering::SeqCst);
        sink
    }

    pub fn filenames(&self) -> Vec<String> {
        self.saved
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[async_trait]
impl DownloadSink for RecordingSink {
    async fn save(&self, filename: &str, text: &str) -> Result<SavedArtifact> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("disk full");
        }
        self.saved
            .lock()
            .unwrap()
            .push((filename.to_string(), text.to_string()));
        Ok(SavedArtifact {
            filename: filename.to_string(),
            path: None,
        })
    }
}

/// Memory store whose queue writes can be switched off
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    pub fail_queue_writes: AtomicBool,
}

#[async_trait]
impl StateStore for FlakyStore {
    async fn load_settings(&self) -> Result<Settings, StoreError> {
        self.inner.load_settings().await
    }

    async fn save_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        self.inner.save_settings(settings).await
    }

    async fn list_jobs(&self) -> Result<JobQueue, StoreError> {
        self.inner.list_jobs().await
    }

    async fn replace_all_jobs(&self, jobs: &JobQueue) -> Result<(), StoreError> {
        if self.fail_queue_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("queue write refused".to_string()));
        }
        self.inner.replace_all_jobs(jobs).await
    }

    async fn load_history(&self) -> Result<History, StoreError> {
        self.inner.load_history().await
    }

    async fn save_history(&self, history: &History) -> Result<(), StoreError> {
        self.inner.save_history(history).await
    }
}

/// A transcript with two entries
pub fn found(title: &str, transcript_id: Option<&str>) -> TranscriptFound {
    TranscriptFound {
        transcript_id: transcript_id.map(str::to_string),
        title: title.to_string(),
        scheduled_start: "20260211_093500".to_string(),
        entries: vec![
            TranscriptEntry::new("Ada", Offset::Number(0.0), "Morning all."),
            TranscriptEntry::new("Grace", Offset::Text("00:00:05.120".into()), "Hi."),
        ],
    }
}

/// Settings with no pause between jobs
pub fn fast_settings() -> Settings {
    Settings {
        throttle_ms: 0,
        ..Default::default()
    }
}

/// Default limits without backoff and with short timeouts
pub fn fast_limits() -> EngineLimits {
    EngineLimits {
        backoff_ms: 0,
        item_timeout_ms: 2_000,
        session_ready_timeout_ms: 2_000,
        ..Default::default()
    }
}

pub struct Harness {
    pub processor: Arc<QueueProcessor>,
    pub store: Arc<MemoryStore>,
    pub agent: Arc<ScriptedAgent>,
    pub sink: Arc<RecordingSink>,
}

pub fn harness(agent: ScriptedAgent) -> Harness {
    harness_with(agent, RecordingSink::new(), fast_limits())
}

pub fn harness_with(agent: ScriptedAgent, sink: RecordingSink, limits: EngineLimits) -> Harness {
    let store = Arc::new(MemoryStore::with_settings(fast_settings()));
    let agent = Arc::new(agent);
    let sink = Arc::new(sink);

    let processor = QueueProcessor::new(store.clone(), agent.clone(), sink.clone()).with_limits(limits);

    Harness {
        processor: Arc::new(processor),
        store,
        agent,
        sink,
    }
}

pub fn urls(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
