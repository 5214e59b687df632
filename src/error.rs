//! Error taxonomy of the scheduler.
//!
//! Callback panics are captured and routed through an injectable hook so a
//! single failing task does not crash the loop; everything else the loop can
//! report is a variant of [`SchedulerError`].

use crate::scheduler::State;
use crate::task::TaskKind;

use std::any::Any;

use thiserror::Error;

/// A captured panic from a task or microtask callback.
#[derive(Debug, Error)]
#[error("{kind:?} callback panicked: {message}")]
pub struct CallbackError {
    /// Kind of the task whose callback panicked.
    pub kind: TaskKind,

    /// Panic payload, stringified.
    pub message: String,
}

/// Decision returned by the unhandled-callback-error hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Keep going with the next queued item.
    Continue,
    /// Abort the loop; `run()` returns [`SchedulerError::CallbackFailed`].
    Abort,
}

/// Hook invoked whenever a callback panics.
pub type ErrorHook = Box<dyn FnMut(&CallbackError) -> ErrorAction>;

/// Errors surfaced by [`Scheduler::run`](crate::Scheduler::run).
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// `run()` was called while the scheduler was not idle, e.g. from
    /// within a callback.
    #[error("run() called while the scheduler is {state:?}")]
    NotIdle {
        /// State the scheduler was in.
        state: State,
    },

    /// A callback panicked and the error hook chose to abort.
    #[error("{kind:?} callback failed fatally: {message}")]
    CallbackFailed {
        /// Kind of the failing task.
        kind: TaskKind,
        /// Stringified panic payload.
        message: String,
    },

    /// A microtask drain exceeded the configured cap without settling.
    ///
    /// Only ever produced when a test harness sets a cap through
    /// [`SchedulerBuilder::microtask_cap`](crate::SchedulerBuilder::microtask_cap);
    /// the production loop drains without limit by design.
    #[error("microtask drain still busy after {executed} callbacks; livelock")]
    Livelock {
        /// Number of microtasks executed before the drain was aborted.
        executed: usize,
    },
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// Default unhandled-callback-error hook: log and continue.
pub(crate) fn default_hook() -> ErrorHook {
    Box::new(|error| {
        tracing::error!(%error, "unhandled callback error");
        ErrorAction::Continue
    })
}
