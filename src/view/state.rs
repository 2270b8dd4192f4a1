//! view::state
//!
//! View states and the pure transition function.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Logical mode of the interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewState {
    /// Welcome screen.
    Static,
    /// Application list.
    Browser,
    /// One application's details.
    Application,
    /// Progress of a daemon operation.
    Work,
}

impl ViewState {
    /// Every state, in declaration order.
    pub const ALL: [ViewState; 4] = [
        ViewState::Static,
        ViewState::Browser,
        ViewState::Application,
        ViewState::Work,
    ];
}

impl fmt::Display for ViewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Static => "static",
            Self::Browser => "browser",
            Self::Application => "application",
            Self::Work => "work",
        };
        write!(f, "{name}")
    }
}

/// A requested transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRequest {
    /// Target state
    pub to: ViewState,
    /// Lock the view after entering the target
    pub lock: bool,
    /// Transition even if the view is locked
    pub ignore_lock: bool,
}

impl TransitionRequest {
    /// Plain, non-forced, non-locking transition.
    pub fn to(state: ViewState) -> Self {
        Self {
            to: state,
            lock: false,
            ignore_lock: false,
        }
    }
}

/// Why a transition was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("view is locked in state {current}")]
    Locked { current: ViewState },
}

/// Current view state plus the locked flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewSnapshot {
    pub current: ViewState,
    pub locked: bool,
}

impl Default for ViewSnapshot {
    fn default() -> Self {
        Self {
            current: ViewState::Static,
            locked: false,
        }
    }
}

impl ViewSnapshot {
    /// Next snapshot for `request`.
    ///
    /// A locked view refuses non-forced transitions. Forced transitions keep
    /// the locked flag; `lock` sets it.
    ///
    /// # Example
    ///
    /// ```
    /// use pkgfront::view::{TransitionRequest, ViewSnapshot, ViewState};
    ///
    /// let locked = ViewSnapshot::default()
    ///     .transition(TransitionRequest { to: ViewState::Work, lock: true, ignore_lock: false })
    ///     .unwrap();
    /// assert!(locked.locked);
    /// assert!(locked.transition(TransitionRequest::to(ViewState::Browser)).is_err());
    /// ```
    pub fn transition(&self, request: TransitionRequest) -> Result<ViewSnapshot, TransitionError> {
        if self.locked && !request.ignore_lock {
            return Err(TransitionError::Locked {
                current: self.current,
            });
        }
        Ok(ViewSnapshot {
            current: request.to,
            locked: self.locked || request.lock,
        })
    }

    /// Same state, unlocked.
    pub fn unlocked(&self) -> ViewSnapshot {
        ViewSnapshot {
            current: self.current,
            locked: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_static_and_unlocked() {
        let snap = ViewSnapshot::default();
        assert_eq!(snap.current, ViewState::Static);
        assert!(!snap.locked);
    }

    #[test]
    fn locked_refuses_and_keeps_state() {
        let snap = ViewSnapshot {
            current: ViewState::Work,
            locked: true,
        };
        let err = snap.transition(TransitionRequest::to(ViewState::Browser)).unwrap_err();
        assert_eq!(
            err,
            TransitionError::Locked {
                current: ViewState::Work
            }
        );
    }

    #[test]
    fn forced_transition_keeps_lock() {
        let snap = ViewSnapshot {
            current: ViewState::Browser,
            locked: true,
        };
        let next = snap
            .transition(TransitionRequest {
                to: ViewState::Work,
                lock: false,
                ignore_lock: true,
            })
            .unwrap();
        assert_eq!(next.current, ViewState::Work);
        assert!(next.locked);
        assert!(!next.unlocked().locked);
    }

    #[test]
    fn self_transition_allowed() {
        let snap = ViewSnapshot::default();
        let next = snap.transition(TransitionRequest::to(ViewState::Static)).unwrap();
        assert_eq!(next, snap);
    }
}
