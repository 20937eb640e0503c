//! # hwbot Scheduler
//!
//! The status-polling and change-detection loop.
//!
//! ## Architecture
//! ```text
//! PollLoop (one tokio task, fixed interval)
//!   ├── StatusSource::fetch(cursor)      → StatusPage | classified error
//!   ├── ChangeDetector::observe(homework) → Option<Change>
//!   ├── notify::change_notification      → Notifier::send (once, no retry)
//!   └── idle(interval)
//!         └── CommandSource::poll_commands → /status, /help
//! ```

pub mod detector;
pub mod engine;
pub mod notify;

pub use detector::{Change, ChangeDetector, ChangeKind};
pub use engine::{PollLoop, PollOutcome};
pub use notify::{Notification, NotifyPriority};
