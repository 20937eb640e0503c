//! Poll loop: fetch → detect → notify → idle, forever.
//!
//! Everything runs on one task and awaits one call at a time, so cycles never
//! overlap. The idle period doubles as the window in which chat commands are
//! answered. The fixed interval is also the only backoff after a failure.

use chrono::Utc;
use hwbot_core::config::HwBotConfig;
use hwbot_core::error::{HwBotError, Result};
use hwbot_core::traits::{CommandSource, Notifier, StatusSource};
use hwbot_core::types::{Command, IncomingCommand};
use std::time::Duration;
use tokio::time::Instant;

use crate::detector::{Change, ChangeDetector};
use crate::notify::{self, Notification};

/// Long polls shorter than this would degrade into busy short polling.
const MIN_LONG_POLL: Duration = Duration::from_secs(1);
/// Pause after a failed command poll before trying again.
const COMMAND_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Result of one cycle.
#[derive(Debug)]
pub enum PollOutcome {
    Changed { change: Change, delivered: bool },
    NoChange,
    RecoverableFailure(HwBotError),
    FatalFailure(HwBotError),
}

pub struct PollLoop {
    source: Box<dyn StatusSource>,
    notifier: Box<dyn Notifier>,
    commands: Option<Box<dyn CommandSource>>,
    detector: ChangeDetector,
    /// `from_date` for the next fetch.
    cursor: Option<i64>,
    interval: Duration,
    long_poll: Duration,
    report_errors: bool,
    /// Text of the last failure reported to the chat.
    last_error: Option<String>,
    cycles: u64,
}

impl PollLoop {
    pub fn new(
        config: &HwBotConfig,
        source: Box<dyn StatusSource>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        Self {
            source,
            notifier,
            commands: None,
            detector: ChangeDetector::new(),
            cursor: Some(config.poll.start_from.unwrap_or_else(|| Utc::now().timestamp())),
            interval: Duration::from_secs(config.poll.retry_period_secs),
            long_poll: Duration::from_secs(config.telegram.long_poll_secs),
            report_errors: config.poll.report_errors,
            last_error: None,
            cycles: 0,
        }
    }

    /// Answer chat commands while idle.
    pub fn with_commands(mut self, commands: Box<dyn CommandSource>) -> Self {
        self.commands = Some(commands);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_long_poll(mut self, long_poll: Duration) -> Self {
        self.long_poll = long_poll;
        self
    }

    pub fn detector(&self) -> &ChangeDetector {
        &self.detector
    }

    pub fn cursor(&self) -> Option<i64> {
        self.cursor
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run until a fatal error. Only returns `Err`.
    pub async fn run(&mut self) -> Result<()> {
        tracing::info!(
            "⏰ Poll loop started: {} every {}s, notifying via {}",
            self.source.name(),
            self.interval.as_secs(),
            self.notifier.name()
        );
        loop {
            let outcome = self.run_cycle().await;
            self.log_outcome(&outcome);
            if let PollOutcome::FatalFailure(e) = outcome {
                return Err(e);
            }
            self.idle(self.interval).await;
        }
    }

    /// Run `n` cycles, idling between them but not after the last one.
    pub async fn run_cycles(&mut self, n: usize) -> Result<Vec<PollOutcome>> {
        let mut outcomes = Vec::with_capacity(n);
        for i in 0..n {
            if i > 0 {
                self.idle(self.interval).await;
            }
            let outcome = self.run_cycle().await;
            self.log_outcome(&outcome);
            if let PollOutcome::FatalFailure(e) = outcome {
                return Err(e);
            }
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// One fetch → detect → notify pass. Never panics, never retries.
    pub async fn run_cycle(&mut self) -> PollOutcome {
        self.cycles += 1;

        let page = match self.source.fetch(self.cursor).await {
            Ok(page) => page,
            Err(e) if e.is_recoverable() => {
                self.report_error(&e).await;
                return PollOutcome::RecoverableFailure(e);
            }
            Err(e) => return PollOutcome::FatalFailure(e),
        };

        self.cursor = Some(page.current_date.unwrap_or_else(|| Utc::now().timestamp()));
        self.last_error = None;

        match self.detector.observe(page.homework) {
            Some(change) => {
                let delivered = self.deliver(&notify::change_notification(&change)).await;
                PollOutcome::Changed { change, delivered }
            }
            None => PollOutcome::NoChange,
        }
    }

    /// Answer one chat command.
    pub async fn handle_command(&mut self, incoming: IncomingCommand) {
        match incoming.command {
            Command::Status => {
                tracing::info!("💬 /status requested from chat {}", incoming.chat_id);
                let reply = match self.source.fetch(Some(0)).await {
                    Ok(page) => notify::status_reply(page.homework.as_ref()),
                    Err(e) => {
                        tracing::warn!("⚠️ On-demand fetch failed ({}): {e}", e.kind());
                        notify::status_failed_reply(&e)
                    }
                };
                self.deliver(&reply).await;
            }
            Command::Help => {
                self.deliver(&notify::help_reply()).await;
            }
            Command::Unknown(name) => {
                tracing::debug!("Ignoring unknown command /{name}");
            }
        }
    }

    /// Wait out `period`, answering commands in the meantime if enabled.
    async fn idle(&mut self, period: Duration) {
        let deadline = Instant::now() + period;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let wait = remaining.min(self.long_poll);
            let Some(commands) = self.commands.as_mut() else {
                tokio::time::sleep(remaining).await;
                break;
            };
            if wait < MIN_LONG_POLL {
                tokio::time::sleep(remaining).await;
                break;
            }

            let polled = commands.poll_commands(wait).await;
            match polled {
                Ok(received) => {
                    for command in received {
                        self.handle_command(command).await;
                    }
                }
                Err(e) => {
                    tracing::warn!("⚠️ Command polling failed: {e}");
                    let backoff = deadline
                        .saturating_duration_since(Instant::now())
                        .min(COMMAND_ERROR_BACKOFF);
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    /// Send one notification. Failures are logged and dropped.
    async fn deliver(&self, notification: &Notification) -> bool {
        match self.notifier.send(&notification.render()).await {
            Ok(()) => {
                tracing::info!("✅ Sent [{}]: {}", notification.source, notification.title);
                true
            }
            Err(e) => {
                tracing::warn!(
                    "⚠️ Could not deliver '{}' via {}: {e}",
                    notification.title,
                    self.notifier.name()
                );
                false
            }
        }
    }

    /// Tell the chat about a failure, once per distinct error in a row.
    async fn report_error(&mut self, error: &HwBotError) {
        if !self.report_errors {
            return;
        }
        let text = error.to_string();
        if self.last_error.as_deref() == Some(text.as_str()) {
            tracing::debug!("Error already reported, not repeating it");
            return;
        }
        if self.deliver(&notify::error_notification(error)).await {
            self.last_error = Some(text);
        }
    }

    fn log_outcome(&self, outcome: &PollOutcome) {
        match outcome {
            PollOutcome::Changed { change, delivered } => tracing::info!(
                "🔔 Cycle {}: '{}' is now {} (delivered: {})",
                self.cycles,
                change.homework.name,
                change.homework.status,
                delivered
            ),
            PollOutcome::NoChange => {
                tracing::debug!("Cycle {}: no new statuses", self.cycles)
            }
            PollOutcome::RecoverableFailure(e) => tracing::warn!(
                "⚠️ Cycle {} failed ({}), retrying in {}s: {e}",
                self.cycles,
                e.kind(),
                self.interval.as_secs()
            ),
            PollOutcome::FatalFailure(e) => {
                tracing::error!("❌ Cycle {} hit a fatal error: {e}", self.cycles)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hwbot_core::types::{Homework, HomeworkStatus, StatusPage};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct FakeSource {
        script: Arc<Mutex<VecDeque<Result<StatusPage>>>>,
        cursors: Arc<Mutex<Vec<Option<i64>>>>,
    }

    impl FakeSource {
        fn push_status(&self, status: &str, current_date: i64) {
            self.script.lock().unwrap().push_back(Ok(StatusPage {
                homework: Some(Homework::new("u__hw05.zip", status)),
                current_date: Some(current_date),
            }));
        }

        fn push_err(&self, err: HwBotError) {
            self.script.lock().unwrap().push_back(Err(err));
        }
    }

    #[async_trait]
    impl StatusSource for FakeSource {
        fn name(&self) -> &str {
            "fake"
        }

        async fn fetch(&self, cursor: Option<i64>) -> Result<StatusPage> {
            self.cursors.lock().unwrap().push(cursor);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(StatusPage::default()))
        }
    }

    #[derive(Clone, Default)]
    struct FakeNotifier {
        sent: Arc<Mutex<Vec<String>>>,
        failing: Arc<Mutex<bool>>,
    }

    impl FakeNotifier {
        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for FakeNotifier {
        fn name(&self) -> &str {
            "fake"
        }

        async fn send(&self, text: &str) -> Result<()> {
            if *self.failing.lock().unwrap() {
                return Err(HwBotError::Delivery("chat not found".into()));
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct FakeCommands {
        queued: VecDeque<IncomingCommand>,
    }

    #[async_trait]
    impl CommandSource for FakeCommands {
        async fn poll_commands(&mut self, wait: Duration) -> Result<Vec<IncomingCommand>> {
            if self.queued.is_empty() {
                tokio::time::sleep(wait).await;
                return Ok(vec![]);
            }
            Ok(self.queued.drain(..).collect())
        }
    }

    fn config(report_errors: bool) -> HwBotConfig {
        let mut config = HwBotConfig::default();
        config.poll.start_from = Some(1_000);
        config.poll.report_errors = report_errors;
        config
    }

    fn poll_loop(report_errors: bool) -> (PollLoop, FakeSource, FakeNotifier) {
        let source = FakeSource::default();
        let notifier = FakeNotifier::default();
        let pl = PollLoop::new(
            &config(report_errors),
            Box::new(source.clone()),
            Box::new(notifier.clone()),
        )
        .with_interval(Duration::from_millis(5));
        (pl, source, notifier)
    }

    #[tokio::test]
    async fn test_review_lifecycle_scenario() {
        let (mut pl, source, notifier) = poll_loop(false);
        source.push_status("reviewing", 2_000);
        source.push_status("approved", 3_000);
        source.push_status("approved", 4_000);
        source.push_err(HwBotError::Connectivity("request timed out".into()));

        assert!(matches!(pl.run_cycle().await, PollOutcome::Changed { delivered: true, .. }));
        assert_eq!(notifier.sent().len(), 1);
        assert!(notifier.sent()[0].contains("First status: reviewing"));

        assert!(matches!(pl.run_cycle().await, PollOutcome::Changed { delivered: true, .. }));
        assert_eq!(notifier.sent().len(), 2);
        assert!(notifier.sent()[1].contains("reviewing → approved"));
        assert_eq!(pl.detector().current().unwrap().status, HomeworkStatus::Approved);

        assert!(matches!(pl.run_cycle().await, PollOutcome::NoChange));
        assert_eq!(notifier.sent().len(), 2);

        assert!(matches!(pl.run_cycle().await, PollOutcome::RecoverableFailure(_)));
        assert_eq!(notifier.sent().len(), 2);
        assert_eq!(pl.detector().current().unwrap().status, HomeworkStatus::Approved);
        assert_eq!(pl.cursor(), Some(4_000));
    }

    #[tokio::test]
    async fn test_cursor_follows_current_date() {
        let (mut pl, source, _notifier) = poll_loop(false);
        source.push_status("reviewing", 2_000);
        source.push_err(HwBotError::Parse("missing `homeworks` key".into()));
        pl.run_cycle().await;
        pl.run_cycle().await;
        pl.run_cycle().await;
        assert_eq!(
            *source.cursors.lock().unwrap(),
            vec![Some(1_000), Some(2_000), Some(2_000)]
        );
    }

    #[tokio::test]
    async fn test_empty_response_changes_nothing() {
        let (mut pl, source, notifier) = poll_loop(true);
        source.script.lock().unwrap().push_back(Ok(StatusPage {
            homework: None,
            current_date: Some(2_000),
        }));
        assert!(matches!(pl.run_cycle().await, PollOutcome::NoChange));
        assert!(pl.detector().current().is_none());
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_delivery_failure_is_not_escalated() {
        let (mut pl, source, notifier) = poll_loop(false);
        *notifier.failing.lock().unwrap() = true;
        source.push_status("rejected", 2_000);

        match pl.run_cycle().await {
            PollOutcome::Changed { delivered, .. } => assert!(!delivered),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(pl.detector().current().unwrap().status, HomeworkStatus::Rejected);
    }

    #[tokio::test]
    async fn test_repeated_error_reported_once() {
        let (mut pl, source, notifier) = poll_loop(true);
        source.push_err(HwBotError::transport(503, "unavailable"));
        source.push_err(HwBotError::transport(503, "unavailable"));
        source.push_status("reviewing", 2_000);
        source.push_err(HwBotError::transport(503, "unavailable"));

        for _ in 0..4 {
            pl.run_cycle().await;
        }
        let sent = notifier.sent();
        assert_eq!(sent.len(), 3);
        assert!(sent[0].contains("Bot failure"));
        assert!(sent[1].contains("First status: reviewing"));
        assert!(sent[2].contains("Bot failure"));
    }

    #[tokio::test]
    async fn test_errors_not_reported_when_disabled() {
        let (mut pl, source, notifier) = poll_loop(false);
        source.push_err(HwBotError::Connectivity("connection failed".into()));
        assert!(matches!(pl.run_cycle().await, PollOutcome::RecoverableFailure(_)));
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_run_cycles_survives_timeout() {
        let (mut pl, source, notifier) = poll_loop(false);
        source.push_err(HwBotError::Connectivity("request timed out".into()));
        source.push_status("approved", 2_000);

        let outcomes = pl.run_cycles(2).await.unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(outcomes[0], PollOutcome::RecoverableFailure(_)));
        assert!(matches!(outcomes[1], PollOutcome::Changed { .. }));
        assert_eq!(notifier.sent().len(), 1);
        assert_eq!(pl.cycles(), 2);
    }

    #[tokio::test]
    async fn test_run_stops_on_fatal_error() {
        let (mut pl, source, _notifier) = poll_loop(false);
        source.push_status("reviewing", 2_000);
        source.push_err(HwBotError::Config("endpoint is not a URL".into()));

        let err = pl.run().await.unwrap_err();
        assert!(matches!(err, HwBotError::Config(_)));
        assert_eq!(pl.cycles(), 2);
    }

    #[tokio::test]
    async fn test_status_command_replies_without_touching_state() {
        let (mut pl, source, notifier) = poll_loop(false);
        source.push_status("approved", 9_000);

        pl.handle_command(IncomingCommand { chat_id: "42".into(), command: Command::Status })
            .await;
        assert_eq!(*source.cursors.lock().unwrap(), vec![Some(0)]);
        assert!(notifier.sent()[0].contains("Current status: approved"));
        assert!(pl.detector().current().is_none());
        assert_eq!(pl.cursor(), Some(1_000));
    }

    #[tokio::test]
    async fn test_status_command_reports_fetch_error() {
        let (mut pl, source, notifier) = poll_loop(false);
        source.push_err(HwBotError::transport(500, "boom"));

        pl.handle_command(IncomingCommand { chat_id: "42".into(), command: Command::Status })
            .await;
        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("Could not fetch homework status"));
        assert!(sent[0].contains("HTTP 500"));
    }

    #[tokio::test]
    async fn test_idle_answers_commands() {
        let (pl, source, notifier) = poll_loop(false);
        source.push_status("reviewing", 2_000);
        let commands = FakeCommands {
            queued: VecDeque::from(vec![IncomingCommand {
                chat_id: "42".into(),
                command: Command::Status,
            }]),
        };
        let mut pl = pl
            .with_commands(Box::new(commands))
            .with_long_poll(Duration::from_secs(1));

        let started = Instant::now();
        pl.idle(Duration::from_millis(1500)).await;
        assert!(started.elapsed() >= Duration::from_millis(1500));
        assert_eq!(notifier.sent().len(), 1);
        assert!(notifier.sent()[0].contains("Current status: reviewing"));
    }

    #[tokio::test]
    async fn test_idle_without_commands_sleeps_full_interval() {
        let (mut pl, source, notifier) = poll_loop(false);

        let started = Instant::now();
        pl.idle(Duration::from_millis(50)).await;
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(source.cursors.lock().unwrap().is_empty());
        assert!(notifier.sent().is_empty());
    }
}
