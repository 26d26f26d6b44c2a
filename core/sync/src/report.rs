//! Outcome of a push.

use std::fmt;
use std::time::Duration;

use coursesync_common::Error;

/// Overall result of a push that was allowed to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncStatus {
    /// Every node was pushed.
    Succeeded,
    /// Some nodes failed; the rest were pushed.
    PartiallyFailed,
    /// The walk stopped early on request.
    Cancelled,
}

/// Kind of node a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Section,
    Lesson,
    Task,
    Attachment,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Section => "section",
            NodeKind::Lesson => "lesson",
            NodeKind::Task => "task",
            NodeKind::Attachment => "additional files",
        };
        write!(f, "{}", name)
    }
}

/// A node that could not be pushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFailure {
    pub kind: NodeKind,
    pub name: String,
    pub error: String,
    /// Whether retrying the push later may succeed.
    pub transient: bool,
}

impl NodeFailure {
    pub fn new(kind: NodeKind, name: impl Into<String>, error: &Error) -> Self {
        Self {
            kind,
            name: name.into(),
            error: error.to_string(),
            transient: error.is_transient(),
        }
    }
}

/// Summary of one push.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Remote id of the course after the push.
    pub course_id: u64,
    /// Remote objects created.
    pub created: usize,
    /// Remote objects updated.
    pub updated: usize,
    /// Remote objects deleted.
    pub deleted: usize,
    pub failures: Vec<NodeFailure>,
    pub cancelled: bool,
    pub duration: Duration,
}

impl SyncReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> SyncStatus {
        if self.cancelled {
            SyncStatus::Cancelled
        } else if self.failures.is_empty() {
            SyncStatus::Succeeded
        } else {
            SyncStatus::PartiallyFailed
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == SyncStatus::Succeeded
    }

    pub(crate) fn record_failure(&mut self, failure: NodeFailure) {
        self.failures.push(failure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status() {
        let mut report = SyncReport::new();
        assert_eq!(report.status(), SyncStatus::Succeeded);

        report.record_failure(NodeFailure::new(
            NodeKind::Task,
            "hello",
            &Error::Network("timeout".to_string()),
        ));
        assert_eq!(report.status(), SyncStatus::PartiallyFailed);
        assert!(report.failures[0].transient);

        report.cancelled = true;
        assert_eq!(report.status(), SyncStatus::Cancelled);
    }

    #[test]
    fn test_forbidden_is_not_transient() {
        let failure = NodeFailure::new(NodeKind::Lesson, "L", &Error::Forbidden("no".to_string()));
        assert!(!failure.transient);
        assert_eq!(failure.kind.to_string(), "lesson");
    }
}
