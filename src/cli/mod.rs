//! Command-line interface for the transcript archiver.
//!
//! Provides commands for enqueueing meeting pages, running the queue,
//! inspecting state, and serving JSON-lines requests.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::{DirectorySink, SharePointAgent};
use crate::config;
use crate::core::{JsonFileStore, QueueProcessor};
use crate::domain::SettingsPatch;

pub mod serve;

/// transcript-archiver - queue-driven meeting transcript downloader
#[derive(Parser, Debug)]
#[command(name = "transcript-archiver")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add meeting page URLs to the queue
    Add {
        /// URLs to enqueue
        urls: Vec<String>,

        /// Read additional URLs from a file, one per line
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Process pending jobs
    Run,

    /// Show settings, queue and history size
    Status {
        /// Print the raw status report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Reset a job so the next run tries it again
    Retry {
        /// Job ID (e.g. h1a2b3c4d)
        id: String,
    },

    /// Update runtime settings (prints the result)
    Settings {
        #[arg(long)]
        enabled: Option<bool>,

        /// Release the agent session after each job
        #[arg(long)]
        close_tab: Option<bool>,

        /// Pause between jobs in milliseconds
        #[arg(long)]
        throttle_ms: Option<u64>,

        #[arg(long)]
        lookback_days: Option<u32>,

        /// Download again even if history says done
        #[arg(long)]
        allow_redownload: Option<bool>,
    },

    /// Download one page immediately, outside the queue
    Download {
        url: String,
    },

    /// Answer JSON requests on stdin, one per line
    Serve,

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Add { urls, file } => add_urls(urls, file).await,
            Commands::Run => run_queue().await,
            Commands::Status { json } => show_status(json).await,
            Commands::Retry { id } => retry_item(&id).await,
            Commands::Settings {
                enabled,
                close_tab,
                throttle_ms,
                lookback_days,
                allow_redownload,
            } => {
                let patch = SettingsPatch {
                    enabled,
                    close_tab,
                    throttle_ms,
                    lookback_days,
                    allow_redownload,
                };
                save_settings(patch).await
            }
            Commands::Download { url } => page_download(&url).await,
            Commands::Serve => serve_stdio().await,
            Commands::Config => show_config(),
        }
    }
}

/// Build a processor over the configured store, agent and sink
async fn open_processor() -> Result<QueueProcessor> {
    let cfg = config::config()?;

    let store = JsonFileStore::open(cfg.state_dir())
        .await
        .with_context(|| format!("Failed to open state directory: {}", cfg.state_dir().display()))?;
    let agent = SharePointAgent::new(cfg.token.clone())?;
    let sink = DirectorySink::new(&cfg.output);

    let processor = QueueProcessor::new(Arc::new(store), Arc::new(agent), Arc::new(sink))
        .with_limits(cfg.limits.clone())
        .with_allowed_domain(cfg.allowed_domain.clone());
    processor
        .init()
        .await
        .context("Failed to initialize state records")?;

    Ok(processor)
}

async fn add_urls(mut urls: Vec<String>, file: Option<PathBuf>) -> Result<()> {
    if let Some(path) = file {
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read URL file: {}", path.display()))?;
        urls.extend(content.lines().map(str::to_string));
    }

    if urls.iter().all(|u| u.trim().is_empty()) {
        anyhow::bail!("No URLs provided. Pass them as arguments or use --file <path>");
    }

    let processor = open_processor().await?;
    let outcome = processor.add_urls(&urls).await?;

    for url in &outcome.accepted {
        println!("queued    {}", url);
    }
    for url in &outcome.rejected {
        println!("rejected  {}", url);
    }
    eprintln!(
        "\n[{} queued, {} rejected]",
        outcome.accepted.len(),
        outcome.rejected.len()
    );

    Ok(())
}

async fn run_queue() -> Result<()> {
    let processor = open_processor().await?;
    let outcome = processor.run_queue().await?;

    if outcome.skipped {
        eprintln!("[Run skipped: queue disabled or another run is active]");
        return Ok(());
    }

    println!("Processed:    {}", outcome.processed);
    println!("Succeeded:    {}", outcome.succeeded);
    println!("Retried:      {}", outcome.retried);
    println!("Failed:       {}", outcome.failed);
    println!("Already done: {}", outcome.already_done);

    Ok(())
}

async fn show_status(json: bool) -> Result<()> {
    let processor = open_processor().await?;
    let report = processor.status().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "Enabled: {}   Throttle: {}ms   Redownload: {}",
        report.settings.enabled, report.settings.throttle_ms, report.settings.allow_redownload
    );
    println!(
        "Queue: {} active, {} total   History: {} keys",
        report.queue_size,
        report.queue.len(),
        report.history_count
    );

    if report.queue.is_empty() {
        println!("\nQueue is empty");
        return Ok(());
    }

    println!();
    println!("{:<11} {:<8} {:<3} {}", "ID", "STATUS", "TRY", "URL");
    println!("{}", "-".repeat(75));
    for job in &report.queue {
        println!("{:<11} {:<8} {:<3} {}", job.id, job.status, job.attempts, job.url);
        if !job.last_error.is_empty() {
            println!("{:<24} {}", "", job.last_error);
        }
    }

    Ok(())
}

async fn retry_item(id: &str) -> Result<()> {
    let processor = open_processor().await?;
    if !processor.retry_item(id).await? {
        anyhow::bail!("No job with ID '{}'", id);
    }

    eprintln!("[Job {} reset to pending]", id);
    Ok(())
}

async fn save_settings(patch: SettingsPatch) -> Result<()> {
    let processor = open_processor().await?;
    let settings = if patch.is_empty() {
        processor.status().await?.settings
    } else {
        processor.save_settings(&patch).await?
    };

    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

async fn page_download(url: &str) -> Result<()> {
    let processor = open_processor().await?;
    let outcome = processor.page_download(url).await?;

    if !outcome.ok {
        anyhow::bail!(
            "Download failed: {}",
            outcome.reason.as_deref().unwrap_or("unknown")
        );
    }

    if let Some(filename) = outcome.filename {
        println!("{}", filename);
    }
    Ok(())
}

async fn serve_stdio() -> Result<()> {
    let processor = Arc::new(open_processor().await?);
    let reader = tokio::io::BufReader::new(tokio::io::stdin());

    serve::serve_lines(processor, reader, tokio::io::stdout()).await?;
    Ok(())
}

/// Show the resolved configuration (for debugging)
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("Transcript Archiver Configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:    {}", cfg.home.display());
    println!("  State:   {}", cfg.state_dir().display());
    println!("  Output:  {}", cfg.output.display());
    println!();
    println!("Platform:");
    println!("  Allowed domain: {}", cfg.allowed_domain);
    println!(
        "  Token:          {}",
        if cfg.token.is_some() { "(set)" } else { "(not set)" }
    );
    println!();
    println!("Engine limits:");
    println!("  Max attempts:        {}", cfg.limits.max_attempts);
    println!("  Jobs per run:        {}", cfg.limits.queue_limit_per_run);
    println!("  Item timeout:        {}ms", cfg.limits.item_timeout_ms);
    println!("  Session timeout:     {}ms", cfg.limits.session_ready_timeout_ms);
    println!("  Retry backoff:       {}ms", cfg.limits.backoff_ms);

    Ok(())
}
