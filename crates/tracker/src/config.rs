use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level tracker configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TrackerConfig {
    #[serde(default)]
    pub tracker: TrackerSettings,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub identity: IdentitySettings,
    #[serde(default)]
    pub bridge: BridgeSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerSettings {
    /// Foreground re-sample period.
    #[serde(default = "default_sample_interval")]
    pub sample_interval_secs: u64,
    /// Distraction-alert evaluation period.
    #[serde(default = "default_alert_interval")]
    pub alert_interval_secs: u64,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            sample_interval_secs: default_sample_interval(),
            alert_interval_secs: default_alert_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_server_url")]
    pub url: String,
    /// Cumulative today-totals push period.
    #[serde(default = "default_sync_interval")]
    pub sync_interval_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            sync_interval_secs: default_sync_interval(),
            max_retries: default_max_retries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IdentitySettings {
    /// Nickname to self-register with on first run. Empty disables the
    /// social features until the user registers.
    #[serde(default)]
    pub nickname: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeSettings {
    /// JSONL file the extension appends browser events to.
    #[serde(default = "default_events_file")]
    pub events_file: String,
    /// JSONL file the daemon appends notification requests to.
    #[serde(default = "default_outbox_file")]
    pub outbox_file: String,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            events_file: default_events_file(),
            outbox_file: default_outbox_file(),
        }
    }
}

fn default_sample_interval() -> u64 {
    focuslog_core::tracker::SAMPLE_INTERVAL_SECS
}

fn default_alert_interval() -> u64 {
    60
}

fn default_server_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_sync_interval() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    3
}

fn default_events_file() -> String {
    "~/.local/share/focuslog/events.jsonl".to_string()
}

fn default_outbox_file() -> String {
    "~/.local/share/focuslog/notifications.jsonl".to_string()
}

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = home_dir()?;
    Ok(home.join(".config").join("focuslog"))
}

/// Get the tracker config file path
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("tracker.toml"))
}

fn home_dir() -> Result<PathBuf> {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .context("Could not determine home directory")
}

/// Load tracker config from disk, defaults when absent.
pub fn load_config(path: Option<&PathBuf>) -> Result<TrackerConfig> {
    let path = match path {
        Some(p) => p.clone(),
        None => config_path()?,
    };
    if !path.exists() {
        return Ok(TrackerConfig::default());
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read tracker config at {}", path.display()))?;
    let config: TrackerConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse tracker config at {}", path.display()))?;
    Ok(config)
}

/// Expand a leading `~/` against the home directory.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = TrackerConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("sample_interval_secs = 10"));
        assert!(toml_str.contains("alert_interval_secs = 60"));
        assert!(toml_str.contains("sync_interval_secs = 300"));
        assert!(toml_str.contains("max_retries = 3"));
        assert!(toml_str.contains("events_file"));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = TrackerConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: TrackerConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.tracker.sample_interval_secs, 10);
        assert_eq!(parsed.tracker.alert_interval_secs, 60);
        assert_eq!(parsed.server.sync_interval_secs, 300);
        assert_eq!(parsed.server.max_retries, 3);
        assert_eq!(parsed.server.url, "http://localhost:3000");
        assert!(parsed.identity.nickname.is_empty());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let parsed: TrackerConfig = toml::from_str(
            "[server]\nurl = \"https://focuslog.example\"\n\n[identity]\nnickname = \"nico\"\n",
        )
        .unwrap();
        assert_eq!(parsed.server.url, "https://focuslog.example");
        assert_eq!(parsed.server.sync_interval_secs, 300);
        assert_eq!(parsed.identity.nickname, "nico");
        assert_eq!(parsed.tracker.sample_interval_secs, 10);
    }
}
