//! Error types for hwbot.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HwBotError>;

/// Every failure the bot can run into.
///
/// Only configuration errors are fatal. The rest are caught at the cycle
/// boundary by the poll loop and turned into log lines.
#[derive(Debug, Error)]
pub enum HwBotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required credentials: {}", .0.join(", "))]
    MissingCredentials(Vec<String>),

    #[error("Connectivity error: {0}")]
    Connectivity(String),

    #[error("Review API returned HTTP {status}: {body}")]
    Transport { status: u16, body: String },

    #[error("Unexpected API response: {0}")]
    Parse(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

impl HwBotError {
    /// Whether the poll loop may carry on after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Config(_) | Self::MissingCredentials(_))
    }

    /// Short, stable name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) | Self::MissingCredentials(_) => "config",
            Self::Connectivity(_) => "connectivity",
            Self::Transport { .. } => "transport",
            Self::Parse(_) => "parse",
            Self::Delivery(_) => "delivery",
        }
    }

    /// Build a transport error, keeping at most 200 characters of the body.
    pub fn transport(status: u16, body: &str) -> Self {
        let body = if body.chars().count() > 200 {
            format!("{}...", body.chars().take(200).collect::<String>())
        } else {
            body.to_string()
        };
        Self::Transport { status, body }
    }
}
