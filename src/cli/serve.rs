//! JSON-lines message loop.
//!
//! One request per input line, one response per output line. Each request
//! runs as its own task, so a `GET_STATUS` sent while `RUN_QUEUE` is busy
//! is answered right away; responses are written in completion order and
//! carry the caller's `requestId`.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::core::{dispatch_json, QueueProcessor};

/// Serve requests from `reader` until it is exhausted, returning `writer`
/// once every response has been written.
pub async fn serve_lines<R, W>(processor: Arc<QueueProcessor>, reader: R, mut writer: W) -> Result<W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Value>();

    let read_loop = async move {
        let mut lines = reader.lines();
        let mut tasks = JoinSet::new();

        while let Some(line) = lines.next_line().await.context("Failed to read request")? {
            if line.trim().is_empty() {
                continue;
            }

            let processor = Arc::clone(&processor);
            let tx = tx.clone();
            tasks.spawn(async move {
                let response = dispatch_json(&processor, &line).await;
                if tx.send(response).is_err() {
                    debug!("Response writer closed, dropping response");
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Request task failed");
            }
        }
        Ok::<_, anyhow::Error>(())
    };

    let write_loop = async {
        let mut written = 0usize;
        while let Some(response) = rx.recv().await {
            let mut line = serde_json::to_vec(&response).context("Failed to encode response")?;
            line.push(b'\n');
            writer.write_all(&line).await.context("Failed to write response")?;
            writer.flush().await.context("Failed to flush response")?;
            written += 1;
        }
        Ok::<_, anyhow::Error>(written)
    };

    let (read, write) = tokio::join!(read_loop, write_loop);
    read?;
    let written = write?;

    info!(responses = written, "Message loop finished");
    Ok(writer)
}
