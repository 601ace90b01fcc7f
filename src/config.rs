//! Configuration file loading.
//!
//! The file is JSON; every field has a default so a partial (or missing)
//! file is fine. Application credentials may also come from the
//! environment, which wins over the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

pub const ENV_API_ID: &str = "TGHARVEST_API_ID";
pub const ENV_API_HASH: &str = "TGHARVEST_API_HASH";

/// Telegram caps `upload.getFile` at 1 MiB per request.
const MAX_CHUNK_SIZE: usize = 1024 * 1024;
/// Chunk sizes must be 4 KiB aligned and divide 1 MiB, so no request
/// crosses a 1 MiB boundary.
const CHUNK_ALIGN: usize = 4096;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_id: i32,
    pub api_hash: String,
    pub phone_number: Option<String>,
    pub session_file: Option<String>,
    pub videos_dir: String,
    pub poll: PollSettings,
    pub crawl: CrawlSettings,
    pub completion: CompletionSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub interval_secs: u64,
    pub limit: i32,
    pub seed_from_history: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlSettings {
    pub page_limit: i32,
    pub chunk_size: usize,
    pub pacing_min_minutes: u64,
    pub pacing_max_minutes: u64,
    pub per_channel_dirs: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionSettings {
    /// Reply posted under a command when its crawl starts. `{channel}` is
    /// replaced by the reference. Empty disables the reply.
    pub start_text: String,
    pub success_text: String,
    pub failure_text: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_id: 0,
            api_hash: String::new(),
            phone_number: None,
            session_file: None,
            videos_dir: "videos".to_string(),
            poll: PollSettings::default(),
            crawl: CrawlSettings::default(),
            completion: CompletionSettings::default(),
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            limit: 20,
            seed_from_history: true,
        }
    }
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            page_limit: 50,
            chunk_size: 64 * 1024,
            pacing_min_minutes: 5,
            pacing_max_minutes: 10,
            per_channel_dirs: true,
        }
    }
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            start_text: "Downloading videos from {channel}…".to_string(),
            success_text: "finished".to_string(),
            failure_text: "failed".to_string(),
        }
    }
}

impl Config {
    /// Load the config file at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_json(&raw)
                .with_context(|| format!("Invalid config file {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config file at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read config file {}", path.display()))
            }
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Override credentials from `TGHARVEST_API_ID` / `TGHARVEST_API_HASH`.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(id) = env::var(ENV_API_ID) {
            self.api_id = id
                .trim()
                .parse()
                .with_context(|| format!("{} must be an integer", ENV_API_ID))?;
        }
        if let Ok(hash) = env::var(ENV_API_HASH) {
            self.api_hash = hash.trim().to_string();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let crawl = &self.crawl;
        if crawl.pacing_min_minutes > crawl.pacing_max_minutes {
            anyhow::bail!(
                "crawl.pacing_min_minutes ({}) is greater than crawl.pacing_max_minutes ({})",
                crawl.pacing_min_minutes,
                crawl.pacing_max_minutes
            );
        }
        if crawl.chunk_size == 0
            || crawl.chunk_size % CHUNK_ALIGN != 0
            || crawl.chunk_size > MAX_CHUNK_SIZE
            || MAX_CHUNK_SIZE % crawl.chunk_size != 0
        {
            anyhow::bail!(
                "crawl.chunk_size must be a multiple of {} that divides {} (got {})",
                CHUNK_ALIGN,
                MAX_CHUNK_SIZE,
                crawl.chunk_size
            );
        }
        if !(1..=100).contains(&crawl.page_limit) {
            anyhow::bail!("crawl.page_limit must be between 1 and 100");
        }
        if !(1..=100).contains(&self.poll.limit) {
            anyhow::bail!("poll.limit must be between 1 and 100");
        }
        if self.poll.interval_secs == 0 {
            anyhow::bail!("poll.interval_secs must be at least 1");
        }
        Ok(())
    }

    /// Only commands that talk to Telegram need application credentials.
    pub fn require_credentials(&self) -> Result<()> {
        if self.api_id == 0 || self.api_hash.is_empty() {
            anyhow::bail!(
                "api_id and api_hash are required. Set them in the config file or via {} / {}.",
                ENV_API_ID,
                ENV_API_HASH
            );
        }
        Ok(())
    }

    pub fn session_path(&self, store_dir: &str) -> PathBuf {
        match &self.session_file {
            Some(path) => PathBuf::from(path),
            None => Path::new(store_dir).join("session.db"),
        }
    }

    pub fn videos_dir(&self) -> PathBuf {
        PathBuf::from(&self.videos_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_behaviour() {
        let config = Config::default();
        assert_eq!(config.poll.interval_secs, 10);
        assert_eq!(config.poll.limit, 20);
        assert_eq!(config.crawl.page_limit, 50);
        assert_eq!(config.crawl.chunk_size, 65536);
        assert_eq!(config.crawl.pacing_min_minutes, 5);
        assert_eq!(config.crawl.pacing_max_minutes, 10);
        assert_eq!(config.completion.success_text, "finished");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = Config::from_json(
            r#"{"api_id": 12345, "api_hash": "abc", "videos_dir": "/data/videos",
                "crawl": {"pacing_max_minutes": 7}}"#,
        )
        .unwrap();
        assert_eq!(config.api_id, 12345);
        assert_eq!(config.videos_dir(), PathBuf::from("/data/videos"));
        assert_eq!(config.crawl.pacing_min_minutes, 5);
        assert_eq!(config.crawl.pacing_max_minutes, 7);
        assert_eq!(config.crawl.chunk_size, 65536);
        assert!(config.require_credentials().is_ok());
    }

    #[test]
    fn rejects_inverted_pacing_range() {
        let mut config = Config::default();
        config.crawl.pacing_min_minutes = 11;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unaligned_chunk_size() {
        let mut config = Config::default();
        config.crawl.chunk_size = 65000;
        assert!(config.validate().is_err());
        config.crawl.chunk_size = 2 * 1024 * 1024;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_chunk_size_not_dividing_one_mib() {
        let mut config = Config::default();
        config.crawl.chunk_size = 3 * 4096;
        assert!(config.validate().is_err());
        for size in [4096, 8192, 131072, 524288, 1024 * 1024] {
            config.crawl.chunk_size = size;
            assert!(config.validate().is_ok(), "{} should be accepted", size);
        }
    }

    #[test]
    fn missing_credentials_are_reported() {
        let config = Config::default();
        let err = config.require_credentials().unwrap_err();
        assert!(err.to_string().contains(ENV_API_ID));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.videos_dir, "videos");
    }

    #[test]
    fn session_path_defaults_to_store() {
        let config = Config::default();
        assert_eq!(
            config.session_path("/tmp/store"),
            PathBuf::from("/tmp/store/session.db")
        );
    }
}
