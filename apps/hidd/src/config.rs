//! Daemon configuration.
//!
//! Configuration is stored as TOML, looked up in order:
//! - the file given with `--config`
//! - `$XDG_CONFIG_HOME/hidd/hidd.toml`
//! - `~/.config/hidd/hidd.toml`
//!
//! A missing file means defaults; nothing is ever written back.

use std::path::{Path, PathBuf};
use std::time::Duration;

use hidd_protocol::AdapterSelector;
use hidd_protocol::constants::{
    DEFAULT_BACKLOG, DEFAULT_IDLE_TIMEOUT_MINUTES, DEFAULT_INQUIRY_LENGTH, DEFAULT_PAIR_WINDOW,
    MAX_INQUIRY_LENGTH,
};
use hidd_session::PairingPolicy;
use serde::{Deserialize, Serialize};

/// How the server matches control and interrupt channels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pairing {
    /// Match by peer address within `pair_window_ms`.
    #[default]
    Correlated,
    /// Accept both channels back to back.
    Immediate,
}

/// Daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Local adapter (`hciN` or address). Any adapter when unset.
    #[serde(default)]
    pub device: Option<AdapterSelector>,

    /// Idle timeout in minutes.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: u32,

    /// Listen backlog for both server channels.
    #[serde(default = "default_backlog")]
    pub backlog: u32,

    #[serde(default)]
    pub pairing: Pairing,

    /// How long a half-pair waits for its partner.
    #[serde(default = "default_pair_window_ms")]
    pub pair_window_ms: u64,

    /// Inquiry length in units of 1.28 s.
    #[serde(default = "default_inquiry_length")]
    pub inquiry_length: u8,

    /// Log filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_idle_timeout() -> u32 {
    DEFAULT_IDLE_TIMEOUT_MINUTES
}

fn default_backlog() -> u32 {
    DEFAULT_BACKLOG
}

fn default_pair_window_ms() -> u64 {
    DEFAULT_PAIR_WINDOW.as_millis() as u64
}

fn default_inquiry_length() -> u8 {
    DEFAULT_INQUIRY_LENGTH
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: None,
            idle_timeout: default_idle_timeout(),
            backlog: default_backlog(),
            pairing: Pairing::default(),
            pair_window_ms: default_pair_window_ms(),
            inquiry_length: default_inquiry_length(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Loads `explicit` (which must exist), else the first default location
    /// that exists, else defaults. Returns the path that was read, if any.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            return Ok((Self::load_from(path)?, Some(path.to_path_buf())));
        }

        match config_path().filter(|p| p.exists()) {
            Some(path) => Ok((Self::load_from(&path)?, Some(path))),
            None => Ok((Self::default(), None)),
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("invalid config {}: {e}", path.display()))?;
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid config {}: {e}", path.display()))?;
        Ok(config)
    }

    /// Rejects values that parse but cannot work.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.pair_window_ms == 0 {
            anyhow::bail!("pair_window_ms must be greater than zero");
        }
        if !(1..=MAX_INQUIRY_LENGTH).contains(&self.inquiry_length) {
            anyhow::bail!(
                "inquiry_length must be between 1 and {MAX_INQUIRY_LENGTH}, got {}",
                self.inquiry_length
            );
        }
        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.idle_timeout) * 60)
    }

    pub fn policy(&self) -> PairingPolicy {
        match self.pairing {
            Pairing::Immediate => PairingPolicy::Immediate,
            Pairing::Correlated => PairingPolicy::Correlated {
                window: Duration::from_millis(self.pair_window_ms),
            },
        }
    }
}

/// Default configuration file location.
fn config_path() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
    Some(base.join("hidd").join("hidd.toml"))
}
