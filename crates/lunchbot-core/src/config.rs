use crate::error::Result;
use crate::lunch_time::LunchTime;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

impl ConfigWarning {
    fn warning(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Warning,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Error,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// RemindersConfig
// ---------------------------------------------------------------------------

/// Minutes before the shipment cutoff at which unconfirmed users are
/// reminded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemindersConfig {
    #[serde(default = "default_first_reminder")]
    pub first_minutes: u32,
    #[serde(default = "default_second_reminder")]
    pub second_minutes: u32,
}

fn default_first_reminder() -> u32 {
    30
}

fn default_second_reminder() -> u32 {
    10
}

impl Default for RemindersConfig {
    fn default() -> Self {
        Self {
            first_minutes: default_first_reminder(),
            second_minutes: default_second_reminder(),
        }
    }
}

// ---------------------------------------------------------------------------
// StatisticsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsConfig {
    /// Local hour at which yesterday's report goes out.
    #[serde(default = "default_report_hour")]
    pub report_hour: u32,
    /// Chat ids that receive the reports.
    #[serde(default)]
    pub receivers: Vec<i64>,
}

fn default_report_hour() -> u32 {
    9
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            report_hour: default_report_hour(),
            receivers: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// TelegramConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token. Usually left empty here and supplied through the
    /// environment.
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

fn default_poll_timeout() -> u64 {
    30
}

fn default_api_url() -> String {
    "https://api.telegram.org".to_string()
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            poll_timeout_secs: default_poll_timeout(),
            api_url: default_api_url(),
        }
    }
}

// ---------------------------------------------------------------------------
// MenuConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DishConfig {
    pub name: String,
    pub price: f64,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MenuConfig {
    /// Display order of the category buttons.
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub dishes: Vec<DishConfig>,
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Offset of the bot's local time from UTC.
    #[serde(default)]
    pub timezone_offset_minutes: i32,
    /// Minutes of the hour (UTC) at which dispatchers may start ticking.
    #[serde(default = "default_starting_minutes")]
    pub starting_minutes: Vec<u32>,
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
    /// Orders ship this long before an organization's lunch time; changes
    /// are refused after that.
    #[serde(default = "default_ship_before_lunch")]
    pub ship_before_lunch_minutes: u32,
    #[serde(default = "default_earliest_lunch")]
    pub earliest_lunch: LunchTime,
    #[serde(default = "default_latest_lunch")]
    pub latest_lunch: LunchTime,
    #[serde(default)]
    pub admin_chat_id: i64,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_health_port")]
    pub health_port: u16,
    #[serde(default)]
    pub reminders: RemindersConfig,
    #[serde(default)]
    pub statistics: StatisticsConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub menu: MenuConfig,
}

fn default_starting_minutes() -> Vec<u32> {
    (0..60).collect()
}

fn default_tick_interval() -> u64 {
    60
}

fn default_ship_before_lunch() -> u32 {
    60
}

fn default_earliest_lunch() -> LunchTime {
    LunchTime::new(11, 0).unwrap_or_default()
}

fn default_latest_lunch() -> LunchTime {
    LunchTime::new(16, 0).unwrap_or_default()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("lunchbot.redb")
}

fn default_health_port() -> u16 {
    8080
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone_offset_minutes: 0,
            starting_minutes: default_starting_minutes(),
            tick_interval_secs: default_tick_interval(),
            ship_before_lunch_minutes: default_ship_before_lunch(),
            earliest_lunch: default_earliest_lunch(),
            latest_lunch: default_latest_lunch(),
            admin_chat_id: 0,
            database_path: default_database_path(),
            health_port: default_health_port(),
            reminders: RemindersConfig::default(),
            statistics: StatisticsConfig::default(),
            telegram: TelegramConfig::default(),
            menu: MenuConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn timezone_offset(&self) -> Duration {
        Duration::minutes(i64::from(self.timezone_offset_minutes))
    }

    pub fn ship_offset(&self) -> Duration {
        Duration::minutes(i64::from(self.ship_before_lunch_minutes))
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.tick_interval_secs)
    }

    pub fn first_reminder(&self) -> Duration {
        Duration::minutes(i64::from(self.reminders.first_minutes))
    }

    pub fn second_reminder(&self) -> Duration {
        Duration::minutes(i64::from(self.reminders.second_minutes))
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.timezone_offset_minutes.abs() > 14 * 60 {
            warnings.push(ConfigWarning::error(format!(
                "timezone_offset_minutes={} is outside -840..=840",
                self.timezone_offset_minutes
            )));
        }

        if self.starting_minutes.is_empty() {
            warnings.push(ConfigWarning::error(
                "starting_minutes is empty; dispatchers would never start",
            ));
        }
        for m in self.starting_minutes.iter().filter(|m| **m > 59) {
            warnings.push(ConfigWarning::error(format!(
                "starting minute {m} is greater than 59"
            )));
        }

        if self.tick_interval_secs == 0 {
            warnings.push(ConfigWarning::error("tick_interval_secs must be positive"));
        } else if self.tick_interval_secs % 60 != 0 {
            // Buckets have minute resolution.
            warnings.push(ConfigWarning::warning(format!(
                "tick_interval_secs={} is not a whole number of minutes; \
                 some lunch times may be skipped or served twice",
                self.tick_interval_secs
            )));
        }

        if self.earliest_lunch > self.latest_lunch {
            warnings.push(ConfigWarning::error(format!(
                "earliest_lunch {} is after latest_lunch {}",
                self.earliest_lunch, self.latest_lunch
            )));
        }

        if self.admin_chat_id == 0 {
            warnings.push(ConfigWarning::error("admin_chat_id is not set"));
        }

        if self.telegram.token.trim().is_empty() {
            warnings.push(ConfigWarning::error("telegram.token is not set"));
        }

        if self.reminders.first_minutes == self.reminders.second_minutes {
            warnings.push(ConfigWarning::warning(format!(
                "both reminders fire {} minutes before shipment",
                self.reminders.first_minutes
            )));
        }

        if self.statistics.report_hour > 23 {
            warnings.push(ConfigWarning::error(format!(
                "statistics.report_hour={} is greater than 23",
                self.statistics.report_hour
            )));
        }
        if self.statistics.receivers.is_empty() {
            warnings.push(ConfigWarning::warning(
                "statistics.receivers is empty; reports will not be sent",
            ));
        }

        if self.menu.categories.is_empty() {
            warnings.push(ConfigWarning::warning("menu has no categories"));
        }
        let categories: HashSet<&str> = self.menu.categories.iter().map(String::as_str).collect();
        let mut names = HashSet::new();
        for dish in &self.menu.dishes {
            if !categories.contains(dish.category.as_str()) {
                warnings.push(ConfigWarning::error(format!(
                    "dish '{}' is in unknown category '{}'",
                    dish.name, dish.category
                )));
            }
            if dish.price < 0.0 {
                warnings.push(ConfigWarning::error(format!(
                    "dish '{}' has a negative price",
                    dish.name
                )));
            }
            if !names.insert(dish.name.as_str()) {
                warnings.push(ConfigWarning::warning(format!(
                    "dish '{}' is listed more than once",
                    dish.name
                )));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
