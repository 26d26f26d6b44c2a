//! Terminal stand-ins for the pusher's collaborators.

use std::io::{self, BufRead, Write};
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::warn;

use coursesync_sync::{ConfirmationOracle, FollowUp, Notification, NotificationSink, WrapPrompt};

/// Asks on stdin, or answers yes when `--yes` was given.
pub struct TerminalConfirmation {
    assume_yes: bool,
}

impl TerminalConfirmation {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl ConfirmationOracle for TerminalConfirmation {
    fn confirm(&self, prompt: WrapPrompt) -> bool {
        if self.assume_yes {
            println!("{} [y/N] y", prompt.message());
            return true;
        }

        print!("{} [y/N] ", prompt.message());
        if io::stdout().flush().is_err() {
            return false;
        }

        match read_answer() {
            Ok(line) => parse_answer(&line),
            Err(e) => {
                warn!("Failed to read answer: {}", e);
                false
            }
        }
    }
}

/// Read one line from stdin without stalling other tasks on the runtime.
fn read_answer() -> io::Result<String> {
    let read = || -> io::Result<String> {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line)
    };

    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(read)
        }
        _ => read(),
    }
}

/// Yes only for an explicit `y` or `yes`.
pub fn parse_answer(line: &str) -> bool {
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Prints notifications and their follow-up hints.
pub struct TerminalNotifier {
    open_browser: bool,
}

impl TerminalNotifier {
    pub fn new(open_browser: bool) -> Self {
        Self { open_browser }
    }
}

impl NotificationSink for TerminalNotifier {
    fn notify(&self, notification: Notification) {
        if notification.is_error() {
            eprintln!("{}: {}", notification.title, notification.message);
        } else {
            println!("{}: {}", notification.title, notification.message);
        }

        match notification.action {
            Some(FollowUp::OpenOnRemote(url)) if self.open_browser => {
                if let Err(e) = open::that(&url) {
                    warn!("Failed to open {}: {}", url, e);
                }
            }
            Some(action) => println!("  {}", hint(&action)),
            None => {}
        }
    }
}

/// One-line suggestion for a follow-up action.
pub fn hint(action: &FollowUp) -> String {
    match action {
        FollowUp::OpenOnRemote(url) => format!("Open {}", url),
        FollowUp::RepublishAsNew => {
            "Run `coursesync republish --course <FILE>` to publish it as a new course".to_string()
        }
        FollowUp::LogIn => format!(
            "Set {} or pass --login to enter an API token",
            crate::config::TOKEN_ENV
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answer() {
        assert!(parse_answer("y\n"));
        assert!(parse_answer(" YES "));
        assert!(!parse_answer("\n"));
        assert!(!parse_answer("nope"));
    }

    #[test]
    fn test_assume_yes() {
        assert!(TerminalConfirmation::new(true).confirm(WrapPrompt::BeforePublish));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_assume_yes_inside_runtime() {
        let confirm = TerminalConfirmation::new(true);
        let answered = tokio::spawn(async move { confirm.confirm(WrapPrompt::BeforeUpdate) });
        assert!(answered.await.unwrap());
    }

    #[test]
    fn test_hints() {
        assert_eq!(
            hint(&FollowUp::OpenOnRemote("https://stepik.org/course/1".to_string())),
            "Open https://stepik.org/course/1"
        );
        assert!(hint(&FollowUp::LogIn).contains("COURSESYNC_TOKEN"));
        assert!(hint(&FollowUp::RepublishAsNew).contains("republish"));
    }
}
