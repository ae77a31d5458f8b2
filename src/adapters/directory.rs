//! Download sink that writes transcripts into a directory.
//!
//! Existing files are never overwritten: a clash becomes `name (1).txt`,
//! `name (2).txt`, and so on.

use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{DownloadSink, SavedArtifact};

/// Upper bound on `(n)` suffixes tried before giving up
const MAX_UNIQUIFY: u32 = 1000;

/// Sink writing UTF-8 text files under `output_dir`
pub struct DirectorySink {
    output_dir: PathBuf,
}

impl DirectorySink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

/// `name.txt` → `name (n).txt`
fn numbered(filename: &str, n: u32) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{} ({}).{}", stem, n, ext),
        _ => format!("{} ({})", filename, n),
    }
}

#[async_trait]
impl DownloadSink for DirectorySink {
    async fn save(&self, filename: &str, text: &str) -> Result<SavedArtifact> {
        if filename.is_empty() || filename.contains(['/', '\\']) {
            anyhow::bail!("Refusing to download to unsafe file name '{}'", filename);
        }

        fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| {
                format!(
                    "Failed to create download directory: {}",
                    self.output_dir.display()
                )
            })?;

        for n in 0..=MAX_UNIQUIFY {
            let candidate = if n == 0 {
                filename.to_string()
            } else {
                numbered(filename, n)
            };
            let path = self.output_dir.join(&candidate);

            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Failed to create download file: {}", path.display())
                    })
                }
            };

            file.write_all(text.as_bytes())
                .await
                .with_context(|| format!("Failed to write download file: {}", path.display()))?;
            file.flush().await.context("Failed to flush download file")?;

            debug!(path = %path.display(), "Transcript written");
            return Ok(SavedArtifact {
                filename: candidate,
                path: Some(path),
            });
        }

        anyhow::bail!(
            "Download failed: too many files named like '{}' in {}",
            filename,
            self.output_dir.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_numbered_names() {
        assert_eq!(numbered("a - b.txt", 1), "a - b (1).txt");
        assert_eq!(numbered("noext", 2), "noext (2)");
        assert_eq!(numbered(".hidden", 3), ".hidden (3)");
    }

    #[tokio::test]
    async fn test_save_writes_file() {
        let temp = TempDir::new().unwrap();
        let sink = DirectorySink::new(temp.path().join("out"));

        let saved = sink.save("2026-02-11 - Weekly Sync.txt", "hello").await.unwrap();
        assert_eq!(saved.filename, "2026-02-11 - Weekly Sync.txt");

        let content = tokio::fs::read_to_string(saved.path.unwrap()).await.unwrap();
        assert_eq!(content, "hello");
    }

    #[tokio::test]
    async fn test_save_uniquifies_on_conflict() {
        let temp = TempDir::new().unwrap();
        let sink = DirectorySink::new(temp.path());

        let first = sink.save("t.txt", "one").await.unwrap();
        let second = sink.save("t.txt", "two").await.unwrap();
        let third = sink.save("t.txt", "three").await.unwrap();

        assert_eq!(first.filename, "t.txt");
        assert_eq!(second.filename, "t (1).txt");
        assert_eq!(third.filename, "t (2).txt");

        let original = tokio::fs::read_to_string(temp.path().join("t.txt")).await.unwrap();
        assert_eq!(original, "one");
    }

    #[tokio::test]
    async fn test_save_rejects_path_separators() {
        let temp = TempDir::new().unwrap();
        let sink = DirectorySink::new(temp.path());

        assert!(sink.save("../escape.txt", "x").await.is_err());
        assert!(sink.save("", "x").await.is_err());
    }
}
