//! Core data model: homework records, fetch results and chat commands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Review status of a homework submission.
///
/// Unknown values are kept as-is so a new API status never breaks parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HomeworkStatus {
    /// Taken for review. Keeps the wire spelling (`reviewing`, `pending-review`).
    PendingReview(String),
    Approved,
    Rejected,
    Other(String),
}

impl HomeworkStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::PendingReview(s) => s,
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for HomeworkStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "reviewing" | "pending-review" => Self::PendingReview(s),
            "approved" => Self::Approved,
            "rejected" => Self::Rejected,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for HomeworkStatus {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<HomeworkStatus> for String {
    fn from(status: HomeworkStatus) -> Self {
        match status {
            HomeworkStatus::PendingReview(s) | HomeworkStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for HomeworkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last known review state of one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Homework {
    /// Submission identifier (the archive name, e.g. `user__hw05.zip`).
    pub name: String,
    /// Numeric id assigned by the review API, when present.
    pub id: Option<i64>,
    pub status: HomeworkStatus,
    pub reviewer_comment: Option<String>,
    pub lesson_name: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Homework {
    pub fn new(name: impl Into<String>, status: impl Into<HomeworkStatus>) -> Self {
        Self {
            name: name.into(),
            id: None,
            status: status.into(),
            reviewer_comment: None,
            lesson_name: None,
            updated_at: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.reviewer_comment = Some(comment.into());
        self
    }
}

/// Result of one successful status query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusPage {
    /// Most recent submission, if the API returned any.
    pub homework: Option<Homework>,
    /// Server-side timestamp to use as the next `from_date` cursor.
    pub current_date: Option<i64>,
}

/// A chat command understood by the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// On-demand status check.
    Status,
    /// `/start` or `/help`.
    Help,
    Unknown(String),
}

impl Command {
    /// Parse message text. Returns `None` for plain (non-command) text.
    ///
    /// Accepts the `/cmd@botname` form Telegram uses in groups.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let cmd = word.strip_prefix('/')?;
        let cmd = cmd.split('@').next().unwrap_or(cmd);
        Some(match cmd.to_ascii_lowercase().as_str() {
            "status" => Self::Status,
            "start" | "help" => Self::Help,
            _ => Self::Unknown(cmd.to_string()),
        })
    }
}

/// A command received from the chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingCommand {
    pub chat_id: String,
    pub command: Command,
}
