use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub staging: StagingConfig,
    #[serde(default)]
    pub feed: Option<FeedConfig>,
    #[serde(default)]
    pub source: Option<SourceConfig>,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StagingConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    /// `http(s)://` URL, `file://` URL, or a plain path.
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub path: PathBuf,
    /// Delete the payload once its entries are durably committed.
    #[serde(default)]
    pub remove_after_sync: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
        }
    }
}

fn default_user_id() -> String {
    "operator".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

impl Config {
    /// Config rooted at `dir`, with no feed or source configured.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            db: DbConfig {
                path: dir.join("news.sqlite"),
            },
            staging: StagingConfig {
                path: dir.join("backup.json"),
            },
            feed: None,
            source: None,
            pipeline: PipelineConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.db.path.as_os_str().is_empty() {
        anyhow::bail!("db.path must not be empty");
    }

    if config.staging.path.as_os_str().is_empty() {
        anyhow::bail!("staging.path must not be empty");
    }

    if let Some(feed) = &config.feed {
        if feed.url.trim().is_empty() {
            anyhow::bail!("feed.url must not be empty");
        }
        if feed.timeout_secs == 0 {
            anyhow::bail!("feed.timeout_secs must be > 0");
        }
    }

    if let Some(source) = &config.source {
        if source.path.as_os_str().is_empty() {
            anyhow::bail!("source.path must not be empty");
        }
    }

    if config.pipeline.user_id.trim().is_empty() {
        anyhow::bail!("pipeline.user_id must not be empty");
    }

    if config.server.bind.trim().is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    Ok(())
}
