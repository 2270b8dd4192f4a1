//! view::machine
//!
//! Mutex-guarded view state machine.
//!
//! # Invariants
//!
//! - Exactly one state is current; it changes only through
//!   [`ViewStateMachine::transition`]
//! - Every state passed to `transition` has registered hooks; anything else
//!   is a programming error and panics
//! - Hooks run under the machine's mutex and must not call back into it

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc::UnboundedSender;

use super::state::{TransitionRequest, ViewSnapshot, ViewState};
use crate::app::UiEvent;

/// Enter/exit actions of the presentation layer.
pub trait ViewHooks: Send + Sync {
    /// Called after the previous state's exit action.
    fn enter(&self, state: ViewState);

    /// Called before the next state's enter action.
    fn exit(&self, state: ViewState);
}

type Hook = Box<dyn FnMut() + Send>;

struct StateHooks {
    enter: Hook,
    exit: Hook,
}

struct MachineInner {
    snapshot: ViewSnapshot,
    hooks: HashMap<ViewState, StateHooks>,
}

/// View state machine, starting in [`ViewState::Static`].
pub struct ViewStateMachine {
    inner: Mutex<MachineInner>,
}

impl fmt::Debug for ViewStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewStateMachine")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

impl Default for ViewStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewStateMachine {
    /// Machine with no hooks registered.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MachineInner {
                snapshot: ViewSnapshot::default(),
                hooks: HashMap::new(),
            }),
        }
    }

    /// Machine with every state delegating to `hooks`.
    pub fn with_hooks(hooks: Arc<dyn ViewHooks>) -> Self {
        let machine = Self::new();
        for state in ViewState::ALL {
            let enter = Arc::clone(&hooks);
            let exit = Arc::clone(&hooks);
            machine.register(state, move || enter.enter(state), move || exit.exit(state));
        }
        machine
    }

    fn lock(&self) -> MutexGuard<'_, MachineInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register (or replace) the actions of one state.
    pub fn register(
        &self,
        state: ViewState,
        enter: impl FnMut() + Send + 'static,
        exit: impl FnMut() + Send + 'static,
    ) {
        self.lock().hooks.insert(
            state,
            StateHooks {
                enter: Box::new(enter),
                exit: Box::new(exit),
            },
        );
    }

    /// Switch to `to`.
    ///
    /// Returns `false` if the view is locked and `ignore_lock` is not set;
    /// the state is then left unchanged. Otherwise runs the current state's
    /// exit action, the target's enter action, commits, and locks the view
    /// if `lock` is set.
    ///
    /// # Panics
    ///
    /// Panics if `to` (or the current state) has no registered hooks.
    pub fn transition(&self, to: ViewState, lock: bool, ignore_lock: bool) -> bool {
        let mut inner = self.lock();
        let request = TransitionRequest {
            to,
            lock,
            ignore_lock,
        };

        let next = match inner.snapshot.transition(request) {
            Ok(next) => next,
            Err(e) => {
                tracing::debug!(state = %to, "cannot change view state: {e}");
                return false;
            }
        };

        let current = inner.snapshot.current;
        if !inner.hooks.contains_key(&to) {
            panic!("no hooks registered for view state {to}");
        }
        match inner.hooks.get_mut(&current) {
            Some(hooks) => (hooks.exit)(),
            None => panic!("no hooks registered for view state {current}"),
        }
        if let Some(hooks) = inner.hooks.get_mut(&to) {
            (hooks.enter)();
        }

        inner.snapshot = next;
        tracing::debug!(from = %current, to = %to, locked = next.locked, "view state changed");
        true
    }

    /// Run the current state's enter action once, at startup.
    ///
    /// # Panics
    ///
    /// Panics if the current state has no registered hooks.
    pub fn start(&self) {
        let mut inner = self.lock();
        let current = inner.snapshot.current;
        match inner.hooks.get_mut(&current) {
            Some(hooks) => (hooks.enter)(),
            None => panic!("no hooks registered for view state {current}"),
        }
    }

    /// Clear the locked flag.
    pub fn unlock(&self) {
        let mut inner = self.lock();
        inner.snapshot = inner.snapshot.unlocked();
    }

    /// Whether non-forced transitions are refused.
    pub fn is_locked(&self) -> bool {
        self.lock().snapshot.locked
    }

    /// Current state.
    pub fn current(&self) -> ViewState {
        self.lock().snapshot.current
    }

    /// Current state and locked flag.
    pub fn snapshot(&self) -> ViewSnapshot {
        self.lock().snapshot
    }
}

/// Cloneable handle for requesting transitions from other tasks.
///
/// Requests are posted to the UI loop, which runs them on the machine.
#[derive(Debug, Clone)]
pub struct ViewHandle {
    events: UnboundedSender<UiEvent>,
}

impl ViewHandle {
    /// Handle posting to `events`.
    pub fn new(events: UnboundedSender<UiEvent>) -> Self {
        Self { events }
    }

    /// Ask the UI loop to switch to `to`.
    ///
    /// Returns `false` if the loop is gone.
    pub fn request(&self, to: ViewState) -> bool {
        self.events.send(UiEvent::Transition(to)).is_ok()
    }
}
