//! view
//!
//! The STATIC / BROWSER / APPLICATION / WORK view state machine.
//!
//! # Modules
//!
//! - `state`: [`ViewState`], [`ViewSnapshot`] and the pure transition
//! - `machine`: [`ViewStateMachine`] and the cross-task [`ViewHandle`]
//!
//! # Example
//!
//! ```
//! use pkgfront::view::{ViewState, ViewStateMachine};
//!
//! let machine = ViewStateMachine::new();
//! for state in ViewState::ALL {
//!     machine.register(state, || {}, || {});
//! }
//!
//! assert!(machine.transition(ViewState::Work, true, false));
//! assert!(!machine.transition(ViewState::Browser, false, false));
//! machine.unlock();
//! assert!(machine.transition(ViewState::Browser, false, false));
//! ```

mod machine;
mod state;

pub use machine::{ViewHandle, ViewHooks, ViewStateMachine};
pub use state::{TransitionError, TransitionRequest, ViewSnapshot, ViewState};
