//! CourseSync push orchestration
//!
//! This module pushes a local course tree to a remote learning platform:
//! - First publication of a course with all of its sections, lessons and tasks
//! - Incremental update of a published course, reconciling remote tasks
//! - Wrapping of top-level lessons into sections, with user confirmation
//! - Cooperative cancellation and progress reporting
//! - Per-node failure reporting that never halts sibling nodes

pub mod callbacks;
pub mod config;
pub mod decision;
pub mod orchestrator;
pub mod report;

// Re-export main types
pub use callbacks::{
    CancelFlag, ConfirmationOracle, FixedAnswer, FollowUp, LogNotifier, LogProgress, Notification,
    NotificationKind, NotificationSink, ProgressSink, SilentProgress, WrapPrompt,
};
pub use config::SyncConfig;
pub use decision::{decide, decide_task, stale_remote_tasks, NodeAction};
pub use orchestrator::CoursePusher;
pub use report::{NodeFailure, NodeKind, SyncReport, SyncStatus};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_exports() {
        let _config = SyncConfig::default();
        let _flag = CancelFlag::new();
        let _report = SyncReport::new();
        assert_eq!(decide(0), NodeAction::Create);
    }
}
