use anyhow::{Context, Result};
use chrono::NaiveTime;
use chrono_tz::Tz;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::{fs, path::PathBuf};
use tracing::debug;

use crate::core::rate::Target;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SourceConfig {
    pub base_url: String,
    #[serde(default = "default_source_path")]
    pub path: String,
    /// Display names quoted per 100 units; rescaled to per-unit at capture.
    #[serde(default = "default_per_hundred")]
    pub per_hundred: Vec<String>,
}

fn default_source_path() -> String {
    "/exchange-rates".to_string()
}

fn default_per_hundred() -> Vec<String> {
    vec!["YENS(100)".to_string()]
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_true")]
    pub persist: bool,
    pub data_path: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            persist: true,
            data_path: None,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LedgerConfig {
    pub database_url: String,
    #[serde(default = "default_functional_currency")]
    pub functional_currency: String,
    #[serde(default = "default_conversion_type")]
    pub conversion_type: String,
    #[serde(default = "default_user_id")]
    pub user_id: i32,
    #[serde(default = "default_mode_flag")]
    pub mode_flag: String,
    #[serde(default)]
    pub currency_codes: HashMap<String, String>,
}

fn default_functional_currency() -> String {
    "EGP".to_string()
}

fn default_conversion_type() -> String {
    "Corporate".to_string()
}

fn default_user_id() -> i32 {
    1116
}

fn default_mode_flag() -> String {
    "I".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MidrangeConfig {
    pub database_url: String,
    #[serde(default)]
    pub currency_codes: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TargetsConfig {
    pub ledger: LedgerConfig,
    pub midrange: MidrangeConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NotifierConfig {
    pub url: String,
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScheduleConfig {
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u32,
    /// First local hour (inclusive) in which the reconciliation fires.
    #[serde(default = "default_window_start")]
    pub window_start_hour: u32,
    /// Last local hour (inclusive) in which the reconciliation fires.
    #[serde(default = "default_window_end")]
    pub window_end_hour: u32,
    /// Local time of the daily missed-push alert, `HH:MM`.
    #[serde(default = "default_alert_at")]
    pub alert_at: String,
    #[serde(default = "default_alert_targets")]
    pub alert_targets: Vec<Target>,
}

fn default_interval_minutes() -> u32 {
    10
}

fn default_window_start() -> u32 {
    16
}

fn default_window_end() -> u32 {
    21
}

fn default_alert_at() -> String {
    "16:40".to_string()
}

fn default_alert_targets() -> Vec<Target> {
    vec![Target::Ledger]
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        ScheduleConfig {
            interval_minutes: default_interval_minutes(),
            window_start_hour: default_window_start(),
            window_end_hour: default_window_end(),
            alert_at: default_alert_at(),
            alert_targets: default_alert_targets(),
        }
    }
}

impl ScheduleConfig {
    pub fn alert_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.alert_at, "%H:%M")
            .with_context(|| format!("Invalid schedule.alert_at: '{}'", self.alert_at))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub source: SourceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub targets: TargetsConfig,
    pub notifier: Option<NotifierConfig>,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "Africa/Cairo".to_string()
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "ratesync", "ratesync")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.storage.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "ratesync", "ratesync")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    /// Business timezone: defines "today" and the capture timestamps.
    pub fn timezone(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("Invalid timezone '{}': {}", self.timezone, e))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
