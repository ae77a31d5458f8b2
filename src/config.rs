//! Configuration for the transcript archiver.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (TRANSCRIPT_ARCHIVER_HOME, TRANSCRIPT_ARCHIVER_OUTPUT,
//!    TRANSCRIPT_ARCHIVER_TOKEN)
//! 2. Config file (.transcript-archiver/config.yaml)
//! 3. Defaults (~/.transcript-archiver)
//!
//! Config file discovery:
//! - Searches current directory and parents for .transcript-archiver/config.yaml
//! - `paths.home` is relative to the .transcript-archiver/ directory,
//!   `paths.output` to the project root (its parent)
//!
//! Runtime settings (throttle, redownload, ...) live in the state store,
//! not here.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::{EngineLimits, DEFAULT_ALLOWED_DOMAIN};

pub const CONFIG_DIR: &str = ".transcript-archiver";
pub const ENV_HOME: &str = "TRANSCRIPT_ARCHIVER_HOME";
pub const ENV_OUTPUT: &str = "TRANSCRIPT_ARCHIVER_OUTPUT";
pub const ENV_TOKEN: &str = "TRANSCRIPT_ARCHIVER_TOKEN";

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub engine: EngineLimits,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory root (relative to .transcript-archiver/)
    pub home: Option<String>,
    /// Transcript output directory (relative to the project root)
    pub output: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlatformConfig {
    /// Hosts must end with this domain to be enqueued
    pub allowed_domain: Option<String>,
    /// Bearer token for the meeting platform API
    pub token: Option<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Archiver home (engine state lives under it)
    pub home: PathBuf,
    /// Where transcripts are written
    pub output: PathBuf,
    pub allowed_domain: String,
    pub token: Option<String>,
    pub limits: EngineLimits,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Directory holding settings.json, queue.json and history.json
    pub fn state_dir(&self) -> PathBuf {
        self.home.join("state")
    }
}

/// Find config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Resolve configuration starting the file search at `start`, reading
/// environment overrides through `env`.
fn load_config_from<F>(start: &Path, default_home: PathBuf, env: F) -> Result<ResolvedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let config_file = find_config_file(start);
    let config = match config_file {
        Some(ref path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    // .transcript-archiver/ and the project root containing it
    let config_dir = config_file.as_deref().and_then(Path::parent);
    let project_root = config_dir.and_then(Path::parent);

    let home = if let Some(env_home) = env(ENV_HOME) {
        PathBuf::from(env_home)
    } else if let (Some(home_path), Some(dir)) = (config.paths.home.as_deref(), config_dir) {
        resolve_path(dir, home_path)
    } else {
        default_home
    };

    let output = if let Some(env_output) = env(ENV_OUTPUT) {
        PathBuf::from(env_output)
    } else if let (Some(output_path), Some(root)) = (config.paths.output.as_deref(), project_root) {
        resolve_path(root, output_path)
    } else {
        home.join("transcripts")
    };

    let token = env(ENV_TOKEN)
        .or(config.platform.token)
        .filter(|t| !t.trim().is_empty());

    let allowed_domain = config
        .platform
        .allowed_domain
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ALLOWED_DOMAIN.to_string());

    Ok(ResolvedConfig {
        home,
        output,
        allowed_domain,
        token,
        limits: config.engine,
        config_file,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(CONFIG_DIR);
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;

    load_config_from(&cwd, default_home, |key| std::env::var(key).ok())
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}
