//! Bounded graceful termination.
//!
//! A shutdown request arms two racing paths: a Close-phase task that stops
//! the loop once in-flight I/O has drained (graceful), and a one-shot grace
//! timer that forcibly terminates whatever is still open when it fires
//! (forced). Exactly one of the two wins, and `run()` reports which.

use super::core::Scheduler;
use super::state::StopKind;
use crate::task::Handle;

use tracing::{debug, warn};

/// Progress of an in-flight shutdown request.
pub(super) struct ShutdownState {
    /// A request has been made; later requests are no-ops.
    pub(super) requested: bool,

    /// The Close-phase task ran while I/O was still outstanding; the
    /// scheduler finishes the graceful path as soon as it observes
    /// quiescence in a Poll phase.
    pub(super) waiting: bool,

    /// Handle of the grace timer, cancelled when the graceful path wins.
    pub(super) grace: Option<Handle>,
}

impl ShutdownState {
    pub(super) fn new() -> Self {
        Self {
            requested: false,
            waiting: false,
            grace: None,
        }
    }
}

impl Scheduler {
    /// Begins a bounded graceful shutdown.
    ///
    /// In order: the I/O subsystem is told to stop accepting new inbound
    /// work, a one-shot grace timer of `grace_ms` is armed, and a
    /// Close-phase task is enqueued that — once in-flight completions have
    /// drained — cancels the grace timer and enqueues a priority microtask
    /// that finally stops the loop ([`Outcome::GracefulShutdown`]). If the
    /// grace timer fires first, still-open resources are forcibly
    /// terminated via [`IoSubsystem::cancel_all`] and the loop stops with
    /// [`Outcome::ForcedShutdown`].
    ///
    /// Idempotent: a second call while a shutdown is in flight is a no-op.
    ///
    /// [`Outcome::GracefulShutdown`]: super::Outcome::GracefulShutdown
    /// [`Outcome::ForcedShutdown`]: super::Outcome::ForcedShutdown
    /// [`IoSubsystem::cancel_all`]: crate::IoSubsystem::cancel_all
    pub fn request_shutdown(&mut self, grace_ms: u64) {
        if self.shutdown.requested {
            debug!("shutdown already in flight; ignoring request");
            return;
        }

        self.shutdown.requested = true;
        debug!(grace_ms, "shutdown requested");

        self.io.stop_accepting();

        let grace = self.schedule_timer(grace_ms, |s| s.force_shutdown());
        self.shutdown.grace = Some(grace);

        self.schedule_close(|s| s.begin_graceful_finish());
    }

    /// The Close-phase task of the graceful path.
    fn begin_graceful_finish(&mut self) {
        if self.stop_requested {
            return;
        }

        self.pump_inbox();

        if self.io.has_outstanding() || self.io_queue.has_pending() {
            // In-flight work remains. The grace timer keeps the loop alive
            // and bounds how long the Poll phase waits for it.
            debug!("graceful shutdown waiting for in-flight completions");
            self.shutdown.waiting = true;
            return;
        }

        self.complete_graceful();
    }

    /// Called at the end of every Poll phase; finishes the graceful path
    /// once the in-flight work it was waiting for has drained.
    pub(super) fn check_shutdown_quiescence(&mut self) {
        if !self.shutdown.waiting || self.stop_requested {
            return;
        }

        if self.io.has_outstanding() || self.io_queue.has_pending() {
            return;
        }

        self.shutdown.waiting = false;
        self.complete_graceful();
    }

    fn complete_graceful(&mut self) {
        if let Some(grace) = self.shutdown.grace.take() {
            self.cancel(grace);
        }

        debug!("i/o quiescent; completing graceful shutdown");
        self.queue_priority_microtask(|s| s.stop_with(StopKind::Graceful));
    }

    /// The grace timer fired before the graceful path completed.
    fn force_shutdown(&mut self) {
        self.shutdown.grace = None;
        self.shutdown.waiting = false;

        warn!("grace period expired; forcing shutdown");
        self.io.cancel_all();
        self.stop_with(StopKind::Forced);
    }
}
