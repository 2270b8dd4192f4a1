//! ui::presenter
//!
//! Presentation collaborator of the UI loop.
//!
//! The loop never renders anything itself: it calls a [`Presenter`] for
//! dialogs, notifications and view enter/exit actions.
//! [`TerminalPresenter`] is the line-oriented implementation used by the
//! `run` command.

use std::fmt;

use super::output::{self, Verbosity};
use super::prompts;
use crate::view::{ViewHooks, ViewState};

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Error,
}

/// Non-modal message shown after an operation completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    /// Offer a shortcut to the work view.
    pub show_work_action: bool,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Info,
            message: message.into(),
            show_work_action: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            message: message.into(),
            show_work_action: false,
        }
    }

    /// Same notification, offering the work view.
    pub fn with_work_action(mut self) -> Self {
        self.show_work_action = true;
        self
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if self.show_work_action {
            write!(f, " (type 'show work' for details)")?;
        }
        Ok(())
    }
}

/// What the UI loop needs from the presentation layer.
pub trait Presenter: ViewHooks {
    /// Modal message with a single acknowledgement.
    fn show_message(&self, title: &str, message: &str);

    /// Modal yes/no question.
    fn ask_yes_no(&self, title: &str, message: &str) -> bool;

    /// Non-modal notification.
    fn notify(&self, notification: Notification);

    /// Plain informational line.
    fn info(&self, message: &str);
}

/// Presenter printing through [`output`] and prompting on stdin.
#[derive(Debug, Clone, Copy)]
pub struct TerminalPresenter {
    verbosity: Verbosity,
    interactive: bool,
}

impl TerminalPresenter {
    pub fn new(verbosity: Verbosity, interactive: bool) -> Self {
        Self {
            verbosity,
            interactive,
        }
    }
}

impl ViewHooks for TerminalPresenter {
    fn enter(&self, state: ViewState) {
        output::print(format!("== {state} =="), self.verbosity);
    }

    fn exit(&self, state: ViewState) {
        output::debug(format!("leaving {state} view"), self.verbosity);
    }
}

impl Presenter for TerminalPresenter {
    fn show_message(&self, title: &str, message: &str) {
        output::dialog(title, message);
    }

    fn ask_yes_no(&self, title: &str, message: &str) -> bool {
        match prompts::confirm(&format!("{title}: {message}"), false, self.interactive) {
            Ok(answer) => answer,
            Err(e) => {
                tracing::debug!(error = %e, "no answer, assuming no");
                false
            }
        }
    }

    fn notify(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Info => output::print(&notification, self.verbosity),
            NotificationKind::Error => output::error(&notification),
        }
    }

    fn info(&self, message: &str) {
        output::print(message, self.verbosity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_action_is_rendered() {
        let n = Notification::info("done").with_work_action();
        assert_eq!(n.to_string(), "done (type 'show work' for details)");
        assert_eq!(Notification::error("bad").to_string(), "bad");
    }

    #[test]
    fn non_interactive_question_answers_no() {
        let presenter = TerminalPresenter::new(Verbosity::Quiet, false);
        assert!(!presenter.ask_yes_no("Close", "really?"));
    }
}
