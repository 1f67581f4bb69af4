use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf, time::Duration};

pub const DEFAULT_ALERT_CHANNEL: &str = "weather-alerts";
pub const DEFAULT_CITY: &str = "Prague";

/// HTTP client settings shared by all upstream adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 5 }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settings for the periodic alert monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between the starts of two ticks.
    pub interval_secs: u64,
    /// Pause between two locations within a tick.
    pub pacing_secs: u64,
    /// Channel name looked up in every destination.
    pub alert_channel: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 600,
            pacing_secs: 2,
            alert_channel: DEFAULT_ALERT_CHANNEL.to_string(),
        }
    }
}

/// A chat server the bot posts alerts to.
///
/// Example TOML:
/// [[destinations]]
/// name = "home"
/// [destinations.channels]
/// weather-alerts = "https://discord.com/api/webhooks/..."
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    pub name: String,
    #[serde(default)]
    pub channels: HashMap<String, String>,
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Language hint passed to geocoding. Defaults to Czech, so local
    /// spellings such as "Praha" and "Plzeň" resolve first.
    pub language: String,

    /// City used by `aqi` without an argument and to seed an empty watch list.
    pub default_city: String,

    /// WAQI API token. `AQI_API_TOKEN` overrides it.
    pub aqi_token: Option<String>,

    /// Where the watch list lives; defaults to the platform data dir.
    pub watch_list_path: Option<PathBuf>,

    pub http: HttpConfig,
    pub monitor: MonitorConfig,
    pub destinations: Vec<DestinationConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            language: "cs".to_string(),
            default_city: DEFAULT_CITY.to_string(),
            aqi_token: None,
            watch_list_path: None,
            http: HttpConfig::default(),
            monitor: MonitorConfig::default(),
            destinations: Vec::new(),
        }
    }
}

impl Config {
    /// Effective configuration: the file (or defaults) with environment
    /// overrides applied on top.
    pub fn load() -> Result<Self> {
        let mut cfg = Self::load_file()?;
        cfg.apply_env(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    /// Load config from disk only, or return defaults if it doesn't exist yet.
    pub fn load_file() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, use defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Override values from the environment. `lookup` is `std::env::var` in
    /// production.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup("AQI_API_TOKEN").filter(|t| !t.trim().is_empty()) {
            self.aqi_token = Some(token);
        }
        if let Some(channel) = lookup("WEATHERWATCH_ALERT_CHANNEL").filter(|c| !c.trim().is_empty()) {
            self.monitor.alert_channel = channel;
        }
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "weatherwatch", "weatherwatch")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Path to the persisted watch list.
    pub fn watch_list_file_path(&self) -> Result<PathBuf> {
        match &self.watch_list_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::project_dirs()?.data_dir().join("watchlist.json")),
        }
    }

    /// Token for the air-quality service, if present and non-blank.
    pub fn aqi_token(&self) -> Option<&str> {
        self.aqi_token.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    pub fn set_aqi_token(&mut self, token: String) {
        self.aqi_token = Some(token);
    }

    /// Set/replace the webhook for `channel` in `destination`, creating the
    /// destination if needed.
    pub fn upsert_destination_channel(&mut self, destination: &str, channel: &str, webhook: String) {
        match self.destinations.iter_mut().find(|d| d.name == destination) {
            Some(dest) => {
                dest.channels.insert(channel.to_string(), webhook);
            }
            None => self.destinations.push(DestinationConfig {
                name: destination.to_string(),
                channels: HashMap::from([(channel.to_string(), webhook)]),
            }),
        }
    }
}
