//! The boundary to the external I/O subsystem.
//!
//! The scheduler core performs no I/O. An external subsystem (file, socket,
//! whatever finishes work off-thread) hands completions back through a
//! [`CompletionSender`] and answers two questions the core asks of it:
//! whether operations are still outstanding (termination check) and, during
//! forced shutdown, to cancel everything still open.

use crate::task::IoCallback;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};

use thiserror::Error;

/// Failure to hand a completion to the scheduler.
#[derive(Debug, Error)]
pub enum SendError {
    /// The scheduler has terminated and no longer accepts completions.
    #[error("scheduler has stopped; completion intake is closed")]
    IntakeClosed,

    /// The scheduler (and its channel) is gone entirely.
    #[error("scheduler dropped; completion channel disconnected")]
    Disconnected,
}

/// Inbound half of the completion channel, held by the I/O subsystem.
///
/// This is the only way external components feed work into the scheduler.
/// It is cheap to clone and may be used from any thread; the callback runs
/// on the scheduler thread during the Poll phase.
#[derive(Clone)]
pub struct CompletionSender {
    tx: Sender<IoCallback>,
    open: Arc<AtomicBool>,
}

impl CompletionSender {
    /// Enqueues a completion callback for delivery in the Poll phase.
    pub fn send(
        &self,
        callback: impl FnOnce(&mut crate::Scheduler) + Send + 'static,
    ) -> Result<(), SendError> {
        if !self.open.load(Ordering::Acquire) {
            return Err(SendError::IntakeClosed);
        }

        self.tx
            .send(Box::new(callback))
            .map_err(|_| SendError::Disconnected)
    }
}

/// Creates the completion channel shared between a scheduler and its
/// I/O subsystem.
pub(crate) fn completion_channel() -> (CompletionSender, Receiver<IoCallback>, Arc<AtomicBool>) {
    let (tx, rx) = channel();
    let open = Arc::new(AtomicBool::new(true));

    (
        CompletionSender {
            tx,
            open: Arc::clone(&open),
        },
        rx,
        open,
    )
}

/// Contract the scheduler expects from the external I/O subsystem.
///
/// The scheduler polls [`has_outstanding`](Self::has_outstanding) as part of
/// its termination check and drives the shutdown interaction through the
/// remaining methods. Implementations deliver finished work through the
/// [`CompletionSender`], never by touching scheduler queues directly.
pub trait IoSubsystem {
    /// Whether operations are still in flight.
    ///
    /// While this returns `true` the loop stays alive even with every queue
    /// empty, blocked in the Poll phase waiting for the completion.
    fn has_outstanding(&self) -> bool;

    /// Called when a graceful shutdown begins: stop accepting new inbound
    /// work. Completions of already-running operations keep flowing.
    fn stop_accepting(&mut self) {}

    /// Called when the shutdown grace period expires: forcibly terminate
    /// anything still open. After this returns, `has_outstanding` must
    /// report `false`.
    fn cancel_all(&mut self);
}

/// I/O subsystem with no operations, the default for schedulers that only
/// run timers, immediates, and microtasks.
pub struct NullIo;

impl IoSubsystem for NullIo {
    fn has_outstanding(&self) -> bool {
        false
    }

    fn cancel_all(&mut self) {}
}
