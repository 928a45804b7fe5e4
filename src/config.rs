use std::{path::{Path, PathBuf}, time::Duration};
use serde::Deserialize;

/// Default expiry threshold: three days.
const DEFAULT_THRESHOLD_SECS: u64 = 259_200;
/// Default sweep interval: thirty minutes.
const DEFAULT_SWEEP_SECS: u64 = 1_800;

/// Application configuration.
///
/// Read from a JSON file at start-up. The `BOT_TOKEN` environment variable takes
/// precedence over the `token` field so the secret can stay out of the file.
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default)]
    pub token: String,
    pub app_id: u64,
    /// Directory holding the JSON stores.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// `error`, `warn`, `info`, `debug` or `trace`.
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub expiry: ExpiryConfig,
    /// Register the slash commands on these guilds only. Global registration when empty.
    #[serde(default)]
    pub guild_commands: Vec<u64>,
}

#[derive(Deserialize, Debug, Clone, Copy)]
pub struct ExpiryConfig {
    #[serde(default = "default_threshold")]
    pub threshold_secs: u64,
    #[serde(default = "default_sweep")]
    pub sweep_interval_secs: u64,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            threshold_secs: DEFAULT_THRESHOLD_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_SECS,
        }
    }
}

impl ExpiryConfig {
    pub fn threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.threshold_secs as i64)
    }
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_threshold() -> u64 {
    DEFAULT_THRESHOLD_SECS
}
fn default_sweep() -> u64 {
    DEFAULT_SWEEP_SECS
}

impl Config {
    pub fn load<P: AsRef<Path>>(filepath: P) -> Result<Self, String> {
        let str_config = std::fs::read_to_string(filepath.as_ref())
            .map_err(|e| format!("Unable to read file {}: {}", filepath.as_ref().to_string_lossy(), e))?;
        let mut config = Self::parse(&str_config)
            .map_err(|e| format!("Unable to parse {}: {}", filepath.as_ref().to_string_lossy(), e))?;
        if let Ok(token) = std::env::var("BOT_TOKEN") {
            config.token = token;
        }
        if config.token.is_empty() {
            return Err("No bot token: set `token` in the configuration or the BOT_TOKEN variable".to_string());
        }
        Ok(config)
    }
    fn parse(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }
}
