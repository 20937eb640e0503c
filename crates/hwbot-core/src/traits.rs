//! Trait seams between the poll loop and the outside world.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;
use crate::types::{IncomingCommand, StatusPage};

/// Source of homework statuses (the review API).
#[async_trait]
pub trait StatusSource: Send + Sync {
    fn name(&self) -> &str;

    /// Issue one query. `cursor` limits results to submissions updated since
    /// that unix timestamp. Never retries.
    async fn fetch(&self, cursor: Option<i64>) -> Result<StatusPage>;
}

/// Delivers text to the single configured chat.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    /// Attempt exactly one delivery.
    async fn send(&self, text: &str) -> Result<()>;
}

/// Receives chat commands.
#[async_trait]
pub trait CommandSource: Send {
    /// Wait up to `wait` for new commands. May return early with an empty list.
    async fn poll_commands(&mut self, wait: Duration) -> Result<Vec<IncomingCommand>>;
}
