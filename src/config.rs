//! Configuration types for the chore daemon.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::channels::IngestSettings;
use crate::chores::{Calendar, DateLocale};
use crate::scheduler::TriggerTime;

/// Environment variable overriding `telegram.bot_token`.
pub const ENV_TELEGRAM_TOKEN: &str = "CHOREWHEEL_TELEGRAM_TOKEN";
/// Environment variable overriding `notifications.public_url`.
pub const ENV_PUBLIC_URL: &str = "CHOREWHEEL_PUBLIC_URL";

/// Top-level daemon configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChoreConfig {
    /// Daily sweep settings.
    pub scheduler: SchedulerConfig,
    /// Telegram bot settings.
    pub telegram: TelegramConfig,
    /// Outbound notification settings.
    pub notifications: NotificationsConfig,
    /// Persistence backend.
    pub store: StoreConfig,
}

/// Daily sweep configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Whether the sweep loop runs at all.
    pub enabled: bool,
    /// Trigger hour (0-23) in the configured offset.
    pub trigger_hour: u8,
    /// Trigger minute (0-59).
    pub trigger_minute: u8,
    /// Wall-clock zone for the trigger and for day boundaries in
    /// days-left, in minutes east of UTC.
    pub utc_offset_minutes: i32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trigger_hour: 12,
            trigger_minute: 0,
            utc_offset_minutes: 0,
        }
    }
}

/// Telegram Bot API configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Whether the ingest loop and direct messages are enabled.
    pub enabled: bool,
    /// Bot token from BotFather.
    pub bot_token: String,
    /// API root, overridable for tests and self-hosted bot servers.
    pub api_base_url: String,
    /// Long-poll wait per `getUpdates` call.
    pub poll_timeout_secs: u64,
    /// Delay after a failed poll.
    pub retry_backoff_secs: u64,
    /// HTTP timeout; must be longer than the long-poll wait.
    pub request_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bot_token: String::new(),
            api_base_url: "https://api.telegram.org".to_owned(),
            poll_timeout_secs: 25,
            retry_backoff_secs: 5,
            request_timeout_secs: 30,
        }
    }
}

/// Outbound notification configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Public web address, used for digest links and connect deep links.
    pub public_url: String,
    /// HTTP timeout for group webhook posts.
    pub webhook_timeout_secs: u64,
    /// Language of due-date display strings.
    pub date_locale: DateLocale,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            public_url: "http://localhost:3000".to_owned(),
            webhook_timeout_secs: 10,
            date_locale: DateLocale::default(),
        }
    }
}

/// Which persistence backend to open.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// SQLite database file at `store.path`.
    #[default]
    Sqlite,
    /// Process-local maps; everything is lost on exit.
    Memory,
}

/// Persistence configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Database file for the SQLite backend.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("chorewheel")
        .join("chorewheel.db")
}

/// Severity of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSeverity {
    /// Suspicious but the daemon can run.
    Warning,
    /// The daemon refuses to start.
    Error,
}

/// A single finding from [`ChoreConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigIssue {
    pub id: String,
    pub title: String,
    pub severity: ConfigSeverity,
    pub summary: String,
}

impl ConfigIssue {
    fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        severity: ConfigSeverity,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            severity,
            summary: summary.into(),
        }
    }
}

impl ChoreConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::ChoreError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::ChoreError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/chorewheel/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("chorewheel").join("config.toml")
        } else if let Some(home) = dirs::home_dir() {
            home.join(".config").join("chorewheel").join("config.toml")
        } else {
            PathBuf::from("/tmp/chorewheel-config/config.toml")
        }
    }

    /// Apply `CHOREWHEEL_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup. Blank values are ignored.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(token) = non_blank(ENV_TELEGRAM_TOKEN) {
            self.telegram.bot_token = token.trim().to_owned();
        }
        if let Some(url) = non_blank(ENV_PUBLIC_URL) {
            self.notifications.public_url = url.trim().to_owned();
        }
    }

    /// Check the configuration without touching the network.
    #[must_use]
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.telegram.enabled && self.telegram.bot_token.trim().is_empty() {
            issues.push(ConfigIssue::new(
                "telegram.bot_token",
                "Telegram bot token missing",
                ConfigSeverity::Error,
                format!("telegram is enabled but no bot token is set; set {ENV_TELEGRAM_TOKEN} or disable telegram"),
            ));
        }

        if self.trigger_time().is_none() {
            issues.push(ConfigIssue::new(
                "scheduler.trigger",
                "Trigger time out of range",
                ConfigSeverity::Error,
                format!(
                    "{:02}:{:02} is not a valid time of day",
                    self.scheduler.trigger_hour, self.scheduler.trigger_minute
                ),
            ));
        }

        match url::Url::parse(&self.notifications.public_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => issues.push(ConfigIssue::new(
                "notifications.public_url",
                "Public URL is not http(s)",
                ConfigSeverity::Error,
                format!("scheme `{}` cannot be opened from a chat link", url.scheme()),
            )),
            Err(e) => issues.push(ConfigIssue::new(
                "notifications.public_url",
                "Public URL is invalid",
                ConfigSeverity::Error,
                format!("`{}`: {e}", self.notifications.public_url),
            )),
        }

        if self.telegram.enabled
            && self.telegram.request_timeout_secs <= self.telegram.poll_timeout_secs
        {
            issues.push(ConfigIssue::new(
                "telegram.request_timeout_secs",
                "Request timeout shorter than long-poll",
                ConfigSeverity::Warning,
                format!(
                    "request timeout {}s does not exceed poll timeout {}s; idle polls will time out",
                    self.telegram.request_timeout_secs, self.telegram.poll_timeout_secs
                ),
            ));
        }

        if chrono::FixedOffset::east_opt(self.scheduler.utc_offset_minutes.saturating_mul(60))
            .is_none()
        {
            issues.push(ConfigIssue::new(
                "scheduler.utc_offset_minutes",
                "UTC offset out of range",
                ConfigSeverity::Warning,
                format!(
                    "{} minutes is not a valid offset; falling back to UTC",
                    self.scheduler.utc_offset_minutes
                ),
            ));
        }

        issues
    }

    /// Returns `true` when [`validate`](Self::validate) reports any error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.validate()
            .iter()
            .any(|issue| issue.severity == ConfigSeverity::Error)
    }

    /// Calendar used for day boundaries and date display.
    #[must_use]
    pub fn calendar(&self) -> Calendar {
        Calendar::from_offset_minutes(
            self.scheduler.utc_offset_minutes,
            self.notifications.date_locale,
        )
    }

    /// The daily trigger, or `None` when out of range.
    #[must_use]
    pub fn trigger_time(&self) -> Option<TriggerTime> {
        TriggerTime::new(self.scheduler.trigger_hour, self.scheduler.trigger_minute)
    }

    #[must_use]
    pub fn ingest_settings(&self) -> IngestSettings {
        IngestSettings {
            poll_timeout_secs: self.telegram.poll_timeout_secs,
            retry_backoff: Duration::from_secs(self.telegram.retry_backoff_secs),
        }
    }
}
