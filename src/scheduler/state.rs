//! Observable state of the scheduler.

/// The macrotask phase the scheduler is currently executing.
///
/// Exposed for diagnostics and tests; the phase order within a cycle is
/// fixed and never skips forward, though later phases are skipped once a
/// stop has been observed (the Close phase still runs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Due timers fire.
    Timers,
    /// I/O completions are delivered; the only phase that may block.
    Poll,
    /// Immediates queued before the phase began fire.
    Check,
    /// Teardown notifications fire.
    Close,
}

/// Lifecycle state of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Constructed, or drained to completion; `run()` may be called.
    Idle,
    /// Inside `run()`, cycling through phases.
    Running,
    /// A stop has been observed; the current cycle is finishing.
    Stopping,
    /// Terminated by a stop or shutdown. Terminal.
    Stopped,
}

/// How a call to [`Scheduler::run`](super::Scheduler::run) ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every queue emptied and the I/O subsystem reported no outstanding
    /// work; the loop terminated on its own.
    Drained,
    /// [`Scheduler::stop`](super::Scheduler::stop) was called directly.
    Stopped,
    /// A requested shutdown completed through the Close-phase path.
    GracefulShutdown,
    /// The shutdown grace period expired and open resources were
    /// forcibly terminated.
    ForcedShutdown,
}

/// Which stop path was taken first; decides the reported [`Outcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopKind {
    External,
    Graceful,
    Forced,
}
