//! Collaborators the pusher talks to while it runs.
//!
//! The pusher never prompts, draws or prints on its own. Confirmation,
//! progress and notifications go through these narrow traits so that a
//! terminal, a GUI or a test can stand in.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};

/// Question asked before top-level lessons are wrapped into sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapPrompt {
    /// First publication of a course mixing sections and lessons.
    BeforePublish,
    /// Update of a published course that gained new top-level lessons.
    BeforeUpdate,
}

impl WrapPrompt {
    /// Text shown to the user.
    pub fn message(&self) -> &'static str {
        match self {
            WrapPrompt::BeforePublish => {
                "Since the course has sections, top-level lessons will be wrapped into sections \
                 before publishing. Continue?"
            }
            WrapPrompt::BeforeUpdate => {
                "The course has new top-level lessons next to sections. \
                 Wrap them into sections before updating?"
            }
        }
    }
}

/// Answers yes/no questions.
pub trait ConfirmationOracle: Send + Sync {
    fn confirm(&self, prompt: WrapPrompt) -> bool;
}

/// Answers every question with a fixed value.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl ConfirmationOracle for FixedAnswer {
    fn confirm(&self, prompt: WrapPrompt) -> bool {
        info!("{} -> {}", prompt.message(), if self.0 { "yes" } else { "no" });
        self.0
    }
}

/// Receives progress of a running push and answers cancellation polls.
pub trait ProgressSink: Send + Sync {
    /// Describe the current step.
    fn set_text(&self, text: &str);
    /// Fraction of lessons done in the current lesson loop, in `0.0..=1.0`.
    fn set_fraction(&self, fraction: f64);
    /// Polled before each section, lesson and task.
    fn is_cancelled(&self) -> bool;
}

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Takes effect at the next poll.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress sink that ignores progress and is cancelled through a flag.
#[derive(Debug, Clone, Default)]
pub struct SilentProgress {
    cancel: CancelFlag,
}

impl SilentProgress {
    pub fn new(cancel: CancelFlag) -> Self {
        Self { cancel }
    }
}

impl ProgressSink for SilentProgress {
    fn set_text(&self, _text: &str) {}

    fn set_fraction(&self, _fraction: f64) {}

    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Progress sink that reports through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct LogProgress {
    cancel: CancelFlag,
}

impl LogProgress {
    pub fn new(cancel: CancelFlag) -> Self {
        Self { cancel }
    }
}

impl ProgressSink for LogProgress {
    fn set_text(&self, text: &str) {
        info!("{}", text);
    }

    fn set_fraction(&self, fraction: f64) {
        info!("{:.0}% of lessons pushed", fraction * 100.0);
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Error,
}

/// Action offered alongside a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUp {
    /// Open the course on the remote site.
    OpenOnRemote(String),
    /// Publish the course again as a new course.
    RepublishAsNew,
    /// Log in to the remote platform.
    LogIn,
}

/// Message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub action: Option<FollowUp>,
}

impl Notification {
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Info,
            title: title.into(),
            message: message.into(),
            action: None,
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            title: title.into(),
            message: message.into(),
            action: None,
        }
    }

    /// Attach a follow-up action (builder style).
    pub fn with_action(mut self, action: FollowUp) -> Self {
        self.action = Some(action);
        self
    }

    pub fn is_error(&self) -> bool {
        self.kind == NotificationKind::Error
    }
}

/// Receives user-facing notifications.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Notification sink that logs through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Info => info!("{}: {}", notification.title, notification.message),
            NotificationKind::Error => error!("{}: {}", notification.title, notification.message),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    /// Records every notification.
    #[derive(Default)]
    pub struct RecordingNotifier {
        notifications: Mutex<Vec<Notification>>,
    }

    impl RecordingNotifier {
        pub fn all(&self) -> Vec<Notification> {
            self.notifications.lock().unwrap().clone()
        }

        pub fn errors(&self) -> Vec<Notification> {
            self.all().into_iter().filter(|n| n.is_error()).collect()
        }

        pub fn last(&self) -> Option<Notification> {
            self.all().pop()
        }
    }

    impl NotificationSink for RecordingNotifier {
        fn notify(&self, notification: Notification) {
            self.notifications.lock().unwrap().push(notification);
        }
    }

    /// Answers with a fixed value and records what was asked.
    pub struct ScriptedConfirmation {
        answer: bool,
        asked: Mutex<Vec<WrapPrompt>>,
    }

    impl ScriptedConfirmation {
        pub fn new(answer: bool) -> Self {
            Self {
                answer,
                asked: Mutex::new(Vec::new()),
            }
        }

        pub fn asked(&self) -> Vec<WrapPrompt> {
            self.asked.lock().unwrap().clone()
        }
    }

    impl ConfirmationOracle for ScriptedConfirmation {
        fn confirm(&self, prompt: WrapPrompt) -> bool {
            self.asked.lock().unwrap().push(prompt);
            self.answer
        }
    }

    /// Cancels once a given number of lessons have been reported done.
    pub struct CancelAfterLessons {
        limit: usize,
        done: AtomicUsize,
        fractions: Mutex<Vec<f64>>,
    }

    impl CancelAfterLessons {
        pub fn new(limit: usize) -> Self {
            Self {
                limit,
                done: AtomicUsize::new(0),
                fractions: Mutex::new(Vec::new()),
            }
        }

        pub fn fractions(&self) -> Vec<f64> {
            self.fractions.lock().unwrap().clone()
        }
    }

    impl ProgressSink for CancelAfterLessons {
        fn set_text(&self, _text: &str) {}

        fn set_fraction(&self, fraction: f64) {
            self.done.fetch_add(1, Ordering::SeqCst);
            self.fractions.lock().unwrap().push(fraction);
        }

        fn is_cancelled(&self) -> bool {
            self.done.load(Ordering::SeqCst) >= self.limit
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let progress = SilentProgress::new(flag.clone());

        assert!(!progress.is_cancelled());
        flag.cancel();
        assert!(progress.is_cancelled());
    }

    #[test]
    fn test_notification_builder() {
        let notification =
            Notification::error("Failed", "No access").with_action(FollowUp::RepublishAsNew);

        assert!(notification.is_error());
        assert_eq!(notification.action, Some(FollowUp::RepublishAsNew));
    }

    #[test]
    fn test_fixed_answer() {
        assert!(FixedAnswer(true).confirm(WrapPrompt::BeforePublish));
        assert!(!FixedAnswer(false).confirm(WrapPrompt::BeforeUpdate));
    }
}
