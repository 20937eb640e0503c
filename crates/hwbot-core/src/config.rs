//! hwbot configuration system.
//!
//! Values come from an optional TOML file, then environment variables
//! (usually loaded from `.env`) override them. The resulting value is passed
//! to every component at construction.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{HwBotError, Result};

pub const ENV_PRACTICUM_TOKEN: &str = "PRACTICUM_TOKEN";
pub const ENV_TELEGRAM_TOKEN: &str = "TELEGRAM_TOKEN";
pub const ENV_TELEGRAM_CHAT_ID: &str = "TELEGRAM_CHAT_ID";
pub const ENV_RETRY_PERIOD: &str = "HWBOT_RETRY_PERIOD";
pub const ENV_PRACTICUM_ENDPOINT: &str = "HWBOT_PRACTICUM_ENDPOINT";
pub const ENV_TELEGRAM_API: &str = "HWBOT_TELEGRAM_API";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HwBotConfig {
    #[serde(default)]
    pub practicum: PracticumConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub poll: PollConfig,
}

impl HwBotConfig {
    /// Load config from `path` (when given) and overlay the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::default(),
        };
        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load config from a specific TOML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| HwBotError::Config(format!("Failed to read config: {e}")))?;
        tracing::debug!("Loaded config from {}", path.display());
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| HwBotError::Config(format!("Failed to parse config: {e}")))
    }

    /// Overlay values from an environment-like lookup. Empty values are ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_PRACTICUM_TOKEN) {
            self.practicum.token = v;
        }
        if let Some(v) = get(ENV_TELEGRAM_TOKEN) {
            self.telegram.bot_token = v;
        }
        if let Some(v) = get(ENV_TELEGRAM_CHAT_ID) {
            self.telegram.chat_id = v;
        }
        if let Some(v) = get(ENV_PRACTICUM_ENDPOINT) {
            self.practicum.endpoint = v;
        }
        if let Some(v) = get(ENV_TELEGRAM_API) {
            self.telegram.api_base = v;
        }
        if let Some(v) = get(ENV_RETRY_PERIOD) {
            self.poll.retry_period_secs = v.trim().parse().map_err(|_| {
                HwBotError::Config(format!("{ENV_RETRY_PERIOD} must be a number of seconds, got '{v}'"))
            })?;
        }
        Ok(())
    }

    pub fn credentials(&self) -> Credentials<'_> {
        Credentials {
            practicum_token: &self.practicum.token,
            telegram_token: &self.telegram.bot_token,
            telegram_chat_id: &self.telegram.chat_id,
        }
    }

    /// Check everything needed before the poll loop may start.
    pub fn validate(&self) -> Result<()> {
        self.credentials().validate()?;
        if self.poll.retry_period_secs == 0 {
            return Err(HwBotError::Config("poll.retry_period_secs must be > 0".into()));
        }
        Ok(())
    }
}

/// The three secrets the bot cannot run without.
#[derive(Clone, Copy)]
pub struct Credentials<'a> {
    pub practicum_token: &'a str,
    pub telegram_token: &'a str,
    pub telegram_chat_id: &'a str,
}

impl Credentials<'_> {
    /// Fails with every missing field named, not just the first.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<String> = [
            (ENV_PRACTICUM_TOKEN, self.practicum_token),
            (ENV_TELEGRAM_TOKEN, self.telegram_token),
            (ENV_TELEGRAM_CHAT_ID, self.telegram_chat_id),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name.to_string())
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(HwBotError::MissingCredentials(missing))
        }
    }
}

/// Review API (Practicum) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PracticumConfig {
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_auth_scheme")]
    pub auth_scheme: String,
    #[serde(default = "default_practicum_timeout")]
    pub request_timeout_secs: u64,
}

fn default_endpoint() -> String { "https://practicum.yandex.ru/api/user_api/homework_statuses/".into() }
fn default_auth_scheme() -> String { "OAuth".into() }
fn default_practicum_timeout() -> u64 { 30 }

impl Default for PracticumConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            endpoint: default_endpoint(),
            auth_scheme: default_auth_scheme(),
            request_timeout_secs: default_practicum_timeout(),
        }
    }
}

/// Telegram Bot API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub chat_id: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "bool_true")]
    pub commands_enabled: bool,
    #[serde(default = "default_long_poll")]
    pub long_poll_secs: u64,
    #[serde(default = "default_telegram_timeout")]
    pub request_timeout_secs: u64,
}

fn bool_true() -> bool { true }
fn default_api_base() -> String { "https://api.telegram.org".into() }
fn default_long_poll() -> u64 { 30 }
fn default_telegram_timeout() -> u64 { 10 }

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            api_base: default_api_base(),
            commands_enabled: true,
            long_poll_secs: default_long_poll(),
            request_timeout_secs: default_telegram_timeout(),
        }
    }
}

/// Poll loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Fixed sleep between cycles.
    #[serde(default = "default_retry_period")]
    pub retry_period_secs: u64,
    /// Also send recoverable failures to the chat (deduplicated).
    #[serde(default = "bool_true")]
    pub report_errors: bool,
    /// Initial `from_date` cursor (unix seconds). Defaults to startup time.
    #[serde(default)]
    pub start_from: Option<i64>,
}

fn default_retry_period() -> u64 { 600 }

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            retry_period_secs: default_retry_period(),
            report_errors: true,
            start_from: None,
        }
    }
}
