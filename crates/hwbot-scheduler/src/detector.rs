//! Change detection over a single tracked submission.
//!
//! The detector owns the only piece of mutable state in the bot: the last
//! recorded homework. It is updated exclusively through [`ChangeDetector::observe`].

use hwbot_core::types::{Homework, HomeworkStatus};

#[derive(Debug, Clone, PartialEq)]
pub enum ChangeKind {
    /// Nothing was recorded before.
    FirstStatus,
    StatusChanged { previous: HomeworkStatus },
}

/// A status transition worth telling the user about.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub kind: ChangeKind,
    pub homework: Homework,
}

#[derive(Debug, Default)]
pub struct ChangeDetector {
    last: Option<Homework>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last recorded homework, if any.
    pub fn current(&self) -> Option<&Homework> {
        self.last.as_ref()
    }

    /// Compare a freshly fetched homework against the recorded one.
    ///
    /// Only the status is compared. When a change is returned the record has
    /// already been replaced; otherwise it is left untouched.
    pub fn observe(&mut self, fetched: Option<Homework>) -> Option<Change> {
        let fetched = fetched?;
        let kind = match &self.last {
            None => ChangeKind::FirstStatus,
            Some(last) if last.status == fetched.status => return None,
            Some(last) => ChangeKind::StatusChanged {
                previous: last.status.clone(),
            },
        };
        self.last = Some(fetched.clone());
        Some(Change {
            kind,
            homework: fetched,
        })
    }
}
