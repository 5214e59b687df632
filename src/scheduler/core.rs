//! The scheduler itself: registration API, phase cycle, and drain
//! algorithm.

use super::shutdown::ShutdownState;
use super::state::{Outcome, Phase, State, StopKind};
use crate::clock::{Clock, WaitOutcome};
use crate::error::{
    CallbackError, ErrorAction, ErrorHook, SchedulerError, panic_message,
};
use crate::io::{CompletionSender, IoSubsystem};
use crate::queue::{CallbackQueue, MicrotaskQueues, QueueEntry, TimerCallback, TimerEntry, TimerSet};
use crate::task::{Handle, IoCallback, TaskFn, TaskKind, TaskRegistry};

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;

use tracing::{debug, trace};

/// A deterministic, phased, single-threaded cooperative event scheduler.
///
/// All queues are explicit fields of the scheduler value; constructing a
/// second scheduler (one per test, say) shares nothing with the first.
/// Callbacks receive `&mut Scheduler` and use the same registration API as
/// outside callers.
///
/// `run()` executes full phase cycles — Timers, Poll, Check, Close — and
/// drains both microtask queues after every single callback, until every
/// queue is empty and the I/O subsystem reports no outstanding work, or
/// until a stop is observed.
pub struct Scheduler {
    /// Logical time source; also owns the Poll-phase wait.
    pub(super) clock: Box<dyn Clock>,

    /// Live-task bookkeeping behind [`Handle`]s.
    pub(super) registry: TaskRegistry,

    /// Pending delayed and repeating tasks.
    pub(super) timers: TimerSet,

    /// "Next loop pass" tasks, executed in the Check phase.
    pub(super) immediates: CallbackQueue<TaskFn>,

    /// Completions already pumped out of the inbox, awaiting delivery.
    pub(super) io_queue: CallbackQueue<IoCallback>,

    /// Teardown notifications, executed in the Close phase.
    pub(super) close_queue: CallbackQueue<TaskFn>,

    /// The two microtask FIFOs drained between macrotask callbacks.
    pub(super) microtasks: MicrotaskQueues,

    /// Receiving half of the completion channel.
    pub(super) inbox: Receiver<IoCallback>,

    /// Prototype sender cloned out to external components.
    pub(super) io_sender: CompletionSender,

    /// Intake flag shared with every [`CompletionSender`] clone.
    pub(super) intake_open: Arc<AtomicBool>,

    /// The external I/O subsystem.
    pub(super) io: Box<dyn IoSubsystem>,

    pub(super) state: State,
    pub(super) phase: Option<Phase>,

    pub(super) stop_requested: bool,
    pub(super) stop_kind: StopKind,

    /// Unhandled-callback-error hook.
    pub(super) error_hook: ErrorHook,

    /// Optional microtask drain cap, set only by test harnesses.
    pub(super) drain_cap: Option<usize>,

    pub(super) shutdown: ShutdownState,
}

impl Scheduler {
    /// Creates a scheduler with the default configuration: real clock, no
    /// I/O subsystem, log-and-continue error hook, unbounded drains.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Returns a builder for a customized scheduler.
    pub fn builder() -> super::SchedulerBuilder {
        super::SchedulerBuilder::new()
    }

    // ---- registration API -------------------------------------------------

    /// Schedules `f` to run once, `delay_ms` logical milliseconds from now,
    /// in the Timers phase.
    ///
    /// A zero delay fires in the next Timers phase, which precedes the Check
    /// phase: a zero-delay timer registered before an immediate in the same
    /// synchronous turn executes before it, every run.
    pub fn schedule_timer(
        &mut self,
        delay_ms: u64,
        f: impl FnOnce(&mut Scheduler) + 'static,
    ) -> Handle {
        let (key, cancelled, seq) = self.registry.insert(TaskKind::Timer);
        let due_at = self.clock.now() + delay_ms;

        trace!(?key, due_at, "timer scheduled");
        self.timers.push(TimerEntry {
            due_at,
            seq,
            key,
            cancelled,
            callback: TimerCallback::Once(Box::new(f)),
        });

        Handle::new(key)
    }

    /// Schedules `f` to run every `interval_ms` logical milliseconds.
    ///
    /// After each fire the due time advances by the interval
    /// (`due_at += interval_ms`, not `now + interval_ms`), so latency inside
    /// the callback shifts individual fires but does not compound into the
    /// schedule. Callers that instead want to correct accumulated lateness
    /// reschedule a fresh one-shot timer with a delay of
    /// `max(0, last_target + interval - now)`.
    pub fn schedule_repeating(
        &mut self,
        interval_ms: u64,
        f: impl FnMut(&mut Scheduler) + 'static,
    ) -> Handle {
        let (key, cancelled, seq) = self.registry.insert(TaskKind::Timer);
        let due_at = self.clock.now() + interval_ms;

        trace!(?key, due_at, interval_ms, "repeating timer scheduled");
        self.timers.push(TimerEntry {
            due_at,
            seq,
            key,
            cancelled,
            callback: TimerCallback::Repeating {
                every: interval_ms,
                callback: Box::new(f),
            },
        });

        Handle::new(key)
    }

    /// Schedules `f` for the next Check phase.
    ///
    /// Immediates enqueued while a Check phase executes run in the *next*
    /// cycle: the phase executes a snapshot taken at entry.
    pub fn schedule_immediate(&mut self, f: impl FnOnce(&mut Scheduler) + 'static) -> Handle {
        let (key, cancelled, _seq) = self.registry.insert(TaskKind::Immediate);
        trace!(?key, "immediate scheduled");

        self.immediates.push(QueueEntry {
            key,
            cancelled,
            callback: Box::new(f),
        });

        Handle::new(key)
    }

    /// Schedules a teardown notification for the next Close phase.
    pub fn schedule_close(&mut self, f: impl FnOnce(&mut Scheduler) + 'static) -> Handle {
        let (key, cancelled, _seq) = self.registry.insert(TaskKind::Close);
        trace!(?key, "close task scheduled");

        self.close_queue.push(QueueEntry {
            key,
            cancelled,
            callback: Box::new(f),
        });

        Handle::new(key)
    }

    /// Enqueues a priority microtask.
    ///
    /// At any drain point, every priority microtask — including ones
    /// enqueued during the drain itself — executes, in FIFO order, before a
    /// single normal microtask runs. A callback that keeps re-enqueuing into
    /// this queue therefore livelocks the drain; that is a property of the
    /// model, not a bug the scheduler papers over.
    pub fn queue_priority_microtask(
        &mut self,
        f: impl FnOnce(&mut Scheduler) + 'static,
    ) -> Handle {
        let (key, cancelled, _seq) = self.registry.insert(TaskKind::PriorityMicrotask);

        self.microtasks.push_priority(QueueEntry {
            key,
            cancelled,
            callback: Box::new(f),
        });

        Handle::new(key)
    }

    /// Enqueues a normal microtask, drained after the priority queue is
    /// fully empty.
    pub fn queue_microtask(&mut self, f: impl FnOnce(&mut Scheduler) + 'static) -> Handle {
        let (key, cancelled, _seq) = self.registry.insert(TaskKind::Microtask);

        self.microtasks.push_normal(QueueEntry {
            key,
            cancelled,
            callback: Box::new(f),
        });

        Handle::new(key)
    }

    /// Cancels the task behind `handle`.
    ///
    /// Synchronous: the task is skipped no later than the next time its
    /// queue is popped. Cancelling an already-executed or never-existed
    /// handle is a silent no-op. A callback already executing is never
    /// interrupted.
    pub fn cancel(&mut self, handle: Handle) {
        if let Some(kind) = self.registry.cancel(handle.key()) {
            trace!(key = ?handle.key(), ?kind, "task cancelled");
        }
    }

    // ---- observation ------------------------------------------------------

    /// Current logical time in milliseconds.
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// The phase currently executing, if the loop is running.
    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    /// Current lifecycle state.
    pub fn state(&self) -> State {
        self.state
    }

    /// A sender the external I/O subsystem uses to hand completions back.
    pub fn completion_sender(&self) -> CompletionSender {
        self.io_sender.clone()
    }

    // ---- control ----------------------------------------------------------

    /// Requests the loop to stop.
    ///
    /// Sets a flag consulted at the top of each phase: the phase currently
    /// executing finishes, including its microtask drains, then remaining
    /// phases are skipped, the Close phase of the cycle runs, and `run()`
    /// returns [`Outcome::Stopped`]. A half-drained microtask queue never
    /// leaks into shutdown.
    pub fn stop(&mut self) {
        self.stop_with(StopKind::External);
    }

    pub(super) fn stop_with(&mut self, kind: StopKind) {
        if !self.stop_requested {
            self.stop_kind = kind;
            debug!(?kind, "stop requested");
        }

        self.stop_requested = true;
        if self.state == State::Running {
            self.state = State::Stopping;
        }
    }

    /// Runs phase cycles until every queue is exhausted or a stop is
    /// observed.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::NotIdle`] if called re-entrantly or after the
    ///   scheduler stopped.
    /// - [`SchedulerError::CallbackFailed`] if a callback panicked and the
    ///   error hook chose to abort.
    /// - [`SchedulerError::Livelock`] if a microtask drain exceeded the
    ///   cap configured by a test harness.
    pub fn run(&mut self) -> Result<Outcome, SchedulerError> {
        if self.state != State::Idle {
            return Err(SchedulerError::NotIdle { state: self.state });
        }

        self.state = State::Running;
        debug!("entering run loop");

        let result = self.run_loop();
        self.phase = None;

        match &result {
            Ok(Outcome::Drained) => {
                // Natural drain leaves the scheduler reusable.
                self.state = State::Idle;
            }
            Ok(_) | Err(_) => {
                self.state = State::Stopped;
                self.intake_open.store(false, Ordering::Release);
            }
        }

        debug!(?result, "run loop exited");
        result
    }

    // ---- the loop ---------------------------------------------------------

    fn run_loop(&mut self) -> Result<Outcome, SchedulerError> {
        loop {
            // First iteration: the drain mandated immediately after
            // synchronous program start. Later iterations: normally empty,
            // but picks up microtasks enqueued outside a callback (the
            // graceful-shutdown finisher is one such producer).
            self.drain_microtasks()?;

            if !self.stop_requested {
                self.run_timers_phase()?;
            }
            if !self.stop_requested {
                self.run_poll_phase()?;
            }
            if !self.stop_requested {
                self.run_check_phase()?;
            }

            // The Close phase runs even while stopping; Stopping becomes
            // Stopped only once this cycle's close tasks and their drains
            // completed.
            self.run_close_phase()?;

            if self.stop_requested {
                return Ok(match self.stop_kind {
                    StopKind::External => Outcome::Stopped,
                    StopKind::Graceful => Outcome::GracefulShutdown,
                    StopKind::Forced => Outcome::ForcedShutdown,
                });
            }

            if !self.work_remains() {
                return Ok(Outcome::Drained);
            }
        }
    }

    /// Phase 1: pop all due timers and execute them in `(due_at, seq)`
    /// order, draining microtasks after each.
    fn run_timers_phase(&mut self) -> Result<(), SchedulerError> {
        self.phase = Some(Phase::Timers);

        let now = self.clock.now();
        let due = self.timers.pop_due(now);

        if !due.is_empty() {
            trace!(now, count = due.len(), "timers phase");
        }

        for entry in due {
            // May have been cancelled by an earlier callback in this batch.
            if entry.cancelled.get() {
                continue;
            }

            let TimerEntry {
                due_at,
                seq,
                key,
                cancelled,
                callback,
            } = entry;

            match callback {
                TimerCallback::Once(callback) => {
                    self.registry.remove(key);
                    self.execute(TaskKind::Timer, callback)?;
                }
                TimerCallback::Repeating { every, mut callback } => {
                    self.execute(TaskKind::Timer, |s| callback(s))?;

                    if !cancelled.get() {
                        self.timers.push(TimerEntry {
                            due_at: due_at + every,
                            seq,
                            key,
                            cancelled,
                            callback: TimerCallback::Repeating { every, callback },
                        });
                    }
                }
            }
        }

        Ok(())
    }

    /// Phase 2: deliver already-arrived I/O completions, or block waiting
    /// for the next completion or timer deadline, whichever comes first.
    fn run_poll_phase(&mut self) -> Result<(), SchedulerError> {
        self.phase = Some(Phase::Poll);

        self.pump_inbox();
        let delivered = self.deliver_completions()?;

        // Block only when nothing is runnable right now and something can
        // still arrive: a due timer bounds the wait, outstanding I/O makes
        // an unbounded wait worthwhile. Pending immediates or close tasks
        // mean later phases have work, so the poll returns instead.
        if delivered == 0
            && !self.immediates.has_pending()
            && !self.close_queue.has_pending()
            && !self.stop_requested
        {
            let deadline = self.timers.next_due();

            if deadline.is_some() || self.io.has_outstanding() {
                trace!(?deadline, "poll phase blocking");

                match self.clock.wait(deadline, &self.inbox) {
                    WaitOutcome::Io(callback) => {
                        self.enqueue_completion(callback);
                        self.pump_inbox();
                        self.deliver_completions()?;
                    }
                    WaitOutcome::TimerDue => trace!("poll phase woke for due timer"),
                    WaitOutcome::Idle => debug!("completion channel disconnected"),
                }
            }
        }

        self.check_shutdown_quiescence();
        Ok(())
    }

    /// Phase 3: execute a snapshot of the immediate queue.
    fn run_check_phase(&mut self) -> Result<(), SchedulerError> {
        self.phase = Some(Phase::Check);

        for entry in self.immediates.take_snapshot() {
            if entry.cancelled.get() {
                continue;
            }

            self.registry.remove(entry.key);
            self.execute(TaskKind::Immediate, entry.callback)?;
        }

        Ok(())
    }

    /// Phase 4: execute a snapshot of the close queue.
    fn run_close_phase(&mut self) -> Result<(), SchedulerError> {
        self.phase = Some(Phase::Close);

        for entry in self.close_queue.take_snapshot() {
            if entry.cancelled.get() {
                continue;
            }

            self.registry.remove(entry.key);
            self.execute(TaskKind::Close, entry.callback)?;
        }

        Ok(())
    }

    /// Moves everything currently sitting in the completion channel into
    /// the I/O queue, preserving arrival order.
    pub(super) fn pump_inbox(&mut self) {
        while let Ok(callback) = self.inbox.try_recv() {
            self.enqueue_completion(callback);
        }
    }

    fn enqueue_completion(&mut self, callback: IoCallback) {
        let (key, cancelled, _seq) = self.registry.insert(TaskKind::IoCompletion);
        trace!(?key, "io completion queued");

        self.io_queue.push(QueueEntry {
            key,
            cancelled,
            callback,
        });
    }

    /// Executes every completion queued so far, FIFO, draining microtasks
    /// after each. Returns how many callbacks ran.
    fn deliver_completions(&mut self) -> Result<usize, SchedulerError> {
        let mut delivered = 0;

        for entry in self.io_queue.take_snapshot() {
            if entry.cancelled.get() {
                continue;
            }

            self.registry.remove(entry.key);
            self.execute(TaskKind::IoCompletion, entry.callback)?;
            delivered += 1;
        }

        Ok(delivered)
    }

    /// Executes one macrotask callback, then drains both microtask queues
    /// to exhaustion.
    fn execute<F>(&mut self, kind: TaskKind, callback: F) -> Result<(), SchedulerError>
    where
        F: FnOnce(&mut Scheduler),
    {
        self.run_guarded(kind, callback)?;
        self.drain_microtasks()
    }

    /// Runs a callback, capturing a panic and routing it through the
    /// unhandled-callback-error hook.
    fn run_guarded<F>(&mut self, kind: TaskKind, callback: F) -> Result<(), SchedulerError>
    where
        F: FnOnce(&mut Scheduler),
    {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(self)));

        if let Err(payload) = outcome {
            let error = CallbackError {
                kind,
                message: panic_message(payload),
            };

            match (self.error_hook)(&error) {
                ErrorAction::Continue => {
                    debug!(%error, "continuing after callback panic");
                }
                ErrorAction::Abort => {
                    return Err(SchedulerError::CallbackFailed {
                        kind: error.kind,
                        message: error.message,
                    });
                }
            }
        }

        Ok(())
    }

    /// Drains both microtask queues to exhaustion: every priority microtask
    /// present or enqueued during the drain runs, in FIFO order, before a
    /// single normal one; after each normal microtask the priority queue is
    /// re-checked first.
    ///
    /// Leaves both queues empty on return, unless aborted by the optional
    /// livelock cap.
    fn drain_microtasks(&mut self) -> Result<(), SchedulerError> {
        let mut executed: usize = 0;

        while let Some((kind, entry)) = self.microtasks.pop_next() {
            if entry.cancelled.get() {
                continue;
            }

            self.registry.remove(entry.key);
            self.run_guarded(kind, entry.callback)?;
            executed += 1;

            if let Some(cap) = self.drain_cap {
                if executed >= cap && self.microtasks.has_pending() {
                    return Err(SchedulerError::Livelock { executed });
                }
            }
        }

        Ok(())
    }

    /// Termination check, evaluated after each full cycle: the loop ends
    /// when no live timer, queue entry, inbound completion, or outstanding
    /// external operation remains.
    fn work_remains(&mut self) -> bool {
        self.pump_inbox();

        self.timers.has_pending()
            || self.immediates.has_pending()
            || self.io_queue.has_pending()
            || self.close_queue.has_pending()
            || self.microtasks.has_pending()
            || self.io.has_outstanding()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
