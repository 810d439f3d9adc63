//! linkdrop configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/linkdrop/config.toml`
//! - Windows: `%APPDATA%/linkdrop/config.toml`
//!
//! `LINKDROP_CONFIG` overrides the path.

use std::path::{Path, PathBuf};
use std::time::Duration;

use linkdrop_relay::{DEFAULT_MAX_FILE_SIZE, RelayConfig};
use linkdrop_transfer::PROGRESS_BAR_WIDTH;
use serde::{Deserialize, Serialize};

/// linkdrop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Largest file accepted, in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Where transfers are staged while in flight.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Where the console front end delivers finished files.
    #[serde(default = "default_outbox_dir")]
    pub outbox_dir: PathBuf,

    /// Minimum delay between status message edits, in milliseconds.
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,

    #[serde(default = "default_progress_bar_width")]
    pub progress_bar_width: usize,

    /// Offer links whose server does not advertise a size.
    #[serde(default)]
    pub allow_unknown_size: bool,

    /// Evict unanswered prompts after this many seconds (0 = never).
    #[serde(default)]
    pub session_ttl_secs: u64,

    /// Deadline for one transfer, download and upload (0 = none).
    #[serde(default)]
    pub transfer_timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_outbox_dir() -> PathBuf {
    PathBuf::from("outbox")
}

fn default_progress_interval_ms() -> u64 {
    2000
}

fn default_progress_bar_width() -> usize {
    PROGRESS_BAR_WIDTH
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("linkdrop/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            download_dir: default_download_dir(),
            outbox_dir: default_outbox_dir(),
            progress_interval_ms: default_progress_interval_ms(),
            progress_bar_width: default_progress_bar_width(),
            allow_unknown_size: false,
            session_ttl_secs: 0,
            transfer_timeout_secs: 0,
            connect_timeout_secs: default_connect_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Config {
    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path()?)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // Restrict permissions on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Relay settings derived from this configuration.
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            max_file_size: self.max_file_size,
            download_dir: self.download_dir.clone(),
            progress_interval: Duration::from_millis(self.progress_interval_ms),
            progress_bar_width: self.progress_bar_width.max(1),
            allow_unknown_size: self.allow_unknown_size,
            transfer_timeout: non_zero_secs(self.transfer_timeout_secs),
        }
    }

    pub fn session_ttl(&self) -> Option<Duration> {
        non_zero_secs(self.session_ttl_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    if let Some(path) = std::env::var_os("LINKDROP_CONFIG") {
        return Ok(PathBuf::from(path));
    }

    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("linkdrop")
            .join("config.toml"))
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("linkdrop").join("config.toml"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        Ok(PathBuf::from("/tmp/linkdrop/config.toml"))
    }
}
