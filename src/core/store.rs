//! Persistent store for the three named records: settings, queue, history.
//!
//! Each record is written whole. The file-backed store keeps one JSON file
//! per record and replaces it atomically (temp file + rename), so a crash
//! leaves the most recently completed write on disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;

use crate::domain::{History, Job, JobQueue, Settings};

pub const SETTINGS_KEY: &str = "settings";
pub const QUEUE_KEY: &str = "queue";
pub const HISTORY_KEY: &str = "history";

/// Errors raised by store implementations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt '{record}' record: {source}")]
    Corrupt {
        record: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Get/set access to the persisted records
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load_settings(&self) -> Result<Settings, StoreError>;

    async fn save_settings(&self, settings: &Settings) -> Result<(), StoreError>;

    /// The job list in submission order
    async fn list_jobs(&self) -> Result<JobQueue, StoreError>;

    /// Replace the whole job list
    async fn replace_all_jobs(&self, jobs: &JobQueue) -> Result<(), StoreError>;

    async fn load_history(&self) -> Result<History, StoreError>;

    async fn save_history(&self, history: &History) -> Result<(), StoreError>;

    /// Make sure all three records exist, writing defaults where missing
    async fn ensure_defaults(&self) -> Result<(), StoreError> {
        let settings = self.load_settings().await?;
        let jobs = self.list_jobs().await?;
        let history = self.load_history().await?;

        self.save_settings(&settings).await?;
        self.replace_all_jobs(&jobs).await?;
        self.save_history(&history).await?;
        Ok(())
    }

    /// Look up a single job
    async fn find_job(&self, id: &str) -> Result<Option<Job>, StoreError> {
        Ok(self.list_jobs().await?.find_by_id(id).cloned())
    }
}

/// JSON-file store rooted at a state directory
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Use `dir` as the state directory (created if needed)
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    fn record_path(&self, record: &str) -> PathBuf {
        self.dir.join(format!("{}.json", record))
    }

    async fn read_record<T>(&self, record: &'static str) -> Result<T, StoreError>
    where
        T: DeserializeOwned + Default,
    {
        let path = self.record_path(record);
        if !path.exists() {
            return Ok(T::default());
        }

        let content = fs::read_to_string(&path)
            .await
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;

        if content.trim().is_empty() {
            return Ok(T::default());
        }

        serde_json::from_str(&content).map_err(|source| StoreError::Corrupt { record, source })
    }

    async fn write_record<T>(&self, record: &str, value: &T) -> Result<(), StoreError>
    where
        T: Serialize + ?Sized,
    {
        let path = self.record_path(record);
        let content = serde_json::to_vec_pretty(value)?;
        let dir = self.dir.clone();

        let target = path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&dir, &target, &content))
            .await
            .map_err(|e| StoreError::Unavailable(format!("write task failed: {}", e)))?
            .map_err(|source| StoreError::Io { path, source })
    }
}

fn write_atomic(dir: &Path, target: &Path, content: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load_settings(&self) -> Result<Settings, StoreError> {
        self.read_record(SETTINGS_KEY).await
    }

    async fn save_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        self.write_record(SETTINGS_KEY, settings).await
    }

    async fn list_jobs(&self) -> Result<JobQueue, StoreError> {
        self.read_record(QUEUE_KEY).await
    }

    async fn replace_all_jobs(&self, jobs: &JobQueue) -> Result<(), StoreError> {
        self.write_record(QUEUE_KEY, jobs).await
    }

    async fn load_history(&self) -> Result<History, StoreError> {
        self.read_record(HISTORY_KEY).await
    }

    async fn save_history(&self, history: &History) -> Result<(), StoreError> {
        self.write_record(HISTORY_KEY, history).await
    }
}

#[derive(Debug, Default)]
struct MemoryRecords {
    settings: Option<Settings>,
    jobs: JobQueue,
    history: History,
}

/// In-process store; state lives as long as the value
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<MemoryRecords>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the given settings
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            records: RwLock::new(MemoryRecords {
                settings: Some(settings),
                ..Default::default()
            }),
        }
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load_settings(&self) -> Result<Settings, StoreError> {
        Ok(self.records.read().await.settings.clone().unwrap_or_default())
    }

    async fn save_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        self.records.write().await.settings = Some(settings.clone());
        Ok(())
    }

    async fn list_jobs(&self) -> Result<JobQueue, StoreError> {
        Ok(self.records.read().await.jobs.clone())
    }

    async fn replace_all_jobs(&self, jobs: &JobQueue) -> Result<(), StoreError> {
        self.records.write().await.jobs = jobs.clone();
        Ok(())
    }

    async fn load_history(&self) -> Result<History, StoreError> {
        Ok(self.records.read().await.history.clone())
    }

    async fn save_history(&self, history: &History) -> Result<(), StoreError> {
        self.records.write().await.history = history.clone();
        Ok(())
    }
}
