//! Configuration and credential storage

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::{Session, TokenStore};

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:5000/api";
pub const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 15;

const ENV_API_BASE: &str = "STUDY_PLANNER_API_BASE";
const ENV_REFRESH_TIMEOUT: &str = "STUDY_PLANNER_REFRESH_TIMEOUT";

/// Application configuration
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Backend API base URL, e.g. `https://planner.example.com/api`
    pub api_base: Option<String>,
    /// Upper bound on a single `/auth/refresh` call
    pub refresh_timeout_secs: Option<u64>,
    /// Stored access token (short-lived JWT)
    pub access_token: Option<String>,
    /// Stored refresh token
    pub refresh_token: Option<String>,
    /// Cached user id from last `/auth/me`
    pub user_id: Option<i64>,
    /// Cached display name from last `/auth/me`
    pub user_name: Option<String>,
}

impl Config {
    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "study-planner", "study-planner")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;

        // Config file holds tokens
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    /// API base URL: environment, then config file, then default. No trailing slash.
    pub fn api_base(&self) -> String {
        std::env::var(ENV_API_BASE)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.api_base.clone())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    /// Server origin for the real-time channel: the API base minus a trailing `/api`.
    pub fn socket_origin(&self) -> String {
        let base = self.api_base();
        base.strip_suffix("/api").unwrap_or(&base).to_string()
    }

    pub fn refresh_timeout(&self) -> Duration {
        let secs = match std::env::var(ENV_REFRESH_TIMEOUT) {
            Ok(val) => val.parse::<u64>().unwrap_or_else(|_| {
                tracing::warn!("Failed to parse {}: {}, using default", ENV_REFRESH_TIMEOUT, val);
                DEFAULT_REFRESH_TIMEOUT_SECS
            }),
            Err(_) => self
                .refresh_timeout_secs
                .unwrap_or(DEFAULT_REFRESH_TIMEOUT_SECS),
        };
        Duration::from_secs(secs)
    }

    pub fn set_user(&mut self, id: i64, name: &str) {
        self.user_id = Some(id);
        self.user_name = Some(name.to_string());
    }
}

impl TokenStore for Config {
    fn get_access_token(&self) -> Option<String> {
        self.access_token.clone()
    }

    fn get_refresh_token(&self) -> Option<String> {
        self.refresh_token.clone()
    }

    fn set_session(&mut self, session: &Session) {
        self.access_token = Some(session.access_token.clone());
        self.refresh_token = Some(session.refresh_token.clone());
    }

    fn clear_tokens(&mut self) {
        self.access_token = None;
        self.refresh_token = None;
        self.user_id = None;
        self.user_name = None;
    }
}

/// Token store backed by the config file; every mutation can be flushed
/// with `persist`.
#[derive(Debug)]
pub struct FileTokenStore {
    config: Config,
    path: PathBuf,
}

impl FileTokenStore {
    pub fn open(path: PathBuf) -> Result<Self> {
        let config = Config::load_from(&path)?;
        Ok(Self { config, path })
    }

    pub fn open_default() -> Result<Self> {
        Self::open(Config::config_path()?)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl TokenStore for FileTokenStore {
    fn get_access_token(&self) -> Option<String> {
        self.config.get_access_token()
    }

    fn get_refresh_token(&self) -> Option<String> {
        self.config.get_refresh_token()
    }

    fn set_session(&mut self, session: &Session) {
        self.config.set_session(session);
    }

    fn clear_tokens(&mut self) {
        self.config.clear_tokens();
    }

    fn persist(&self) -> Result<()> {
        // Re-read so fields written by other commands (api_base, user) survive.
        let mut on_disk = Config::load_from(&self.path).unwrap_or_default();
        on_disk.access_token = self.config.access_token.clone();
        on_disk.refresh_token = self.config.refresh_token.clone();
        if on_disk.access_token.is_none() && on_disk.refresh_token.is_none() {
            on_disk.user_id = None;
            on_disk.user_name = None;
        }
        on_disk.save_to(&self.path)
    }
}
