//! Notification building: turns changes, errors and command replies into
//! chat-ready text. No I/O here.

use hwbot_core::error::HwBotError;
use hwbot_core::types::{Homework, HomeworkStatus};

use crate::detector::{Change, ChangeKind};

/// A notification to send to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub priority: NotifyPriority,
    /// What produced it (poll loop, command handler), for logs.
    pub source: &'static str,
}

/// Notification priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyPriority {
    Low,
    Normal,
    High,
}

impl Notification {
    pub fn new(
        title: impl Into<String>,
        body: impl Into<String>,
        source: &'static str,
        priority: NotifyPriority,
    ) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            priority,
            source,
        }
    }

    /// Plain text as delivered to the chat.
    pub fn render(&self) -> String {
        let emoji = match self.priority {
            NotifyPriority::High => "⚠️",
            NotifyPriority::Normal => "📢",
            NotifyPriority::Low => "ℹ️",
        };
        if self.body.is_empty() {
            format!("{emoji} {}", self.title)
        } else {
            format!("{emoji} {}\n\n{}", self.title, self.body)
        }
    }
}

/// Human-readable verdict for a status.
pub fn verdict(status: &HomeworkStatus) -> String {
    match status {
        HomeworkStatus::PendingReview(_) => "The reviewer has taken the work for review.".into(),
        HomeworkStatus::Approved => "The work has been reviewed: the reviewer liked everything. Hooray!".into(),
        HomeworkStatus::Rejected => "The work has been reviewed: the reviewer left some remarks.".into(),
        HomeworkStatus::Other(s) => format!("The review status is now '{s}'."),
    }
}

fn describe(homework: &Homework) -> String {
    let mut body = format!("Homework \"{}\": {}", homework.name, verdict(&homework.status));
    if let Some(lesson) = &homework.lesson_name {
        body.push_str(&format!("\nLesson: {lesson}"));
    }
    if let Some(comment) = &homework.reviewer_comment {
        body.push_str(&format!("\nReviewer comment: {comment}"));
    }
    body
}

/// Notification for a detected status change.
pub fn change_notification(change: &Change) -> Notification {
    let status = &change.homework.status;
    let title = match &change.kind {
        ChangeKind::FirstStatus => format!("First status: {status}"),
        ChangeKind::StatusChanged { previous } => {
            format!("Status changed: {previous} → {status}")
        }
    };
    Notification::new(title, describe(&change.homework), "poll", NotifyPriority::Normal)
}

/// Notification for a failed cycle.
pub fn error_notification(error: &HwBotError) -> Notification {
    Notification::new("Bot failure", error.to_string(), "poll", NotifyPriority::High)
}

/// Reply to `/status`.
pub fn status_reply(homework: Option<&Homework>) -> Notification {
    match homework {
        Some(hw) => Notification::new(
            format!("Current status: {}", hw.status),
            describe(hw),
            "command",
            NotifyPriority::Low,
        ),
        None => Notification::new(
            "No submissions yet",
            "The review API has no homework on record.",
            "command",
            NotifyPriority::Low,
        ),
    }
}

/// Reply to `/status` when the fetch itself failed.
pub fn status_failed_reply(error: &HwBotError) -> Notification {
    Notification::new(
        "Could not fetch homework status",
        error.to_string(),
        "command",
        NotifyPriority::High,
    )
}

pub fn help_reply() -> Notification {
    Notification::new(
        "Homework review bot",
        "I check the review API periodically and tell you when a status changes.\n/status: show the current status now",
        "command",
        NotifyPriority::Low,
    )
}
