//! Builder for configuring and creating a scheduler.

use super::core::Scheduler;
use super::shutdown::ShutdownState;
use super::state::{State, StopKind};
use crate::clock::{Clock, SystemClock};
use crate::error::{self, CallbackError, ErrorAction, ErrorHook};
use crate::io::{self, IoSubsystem, NullIo};
use crate::queue::{CallbackQueue, MicrotaskQueues, TimerSet};
use crate::task::TaskRegistry;

/// Builder for configuring and creating a [`Scheduler`].
///
/// Defaults: [`SystemClock`], [`NullIo`], a log-and-continue error hook,
/// and no microtask drain cap.
///
/// # Examples
///
/// ```rust,ignore
/// let clock = VirtualClock::new();
/// let mut scheduler = Scheduler::builder()
///     .clock(clock.clone())
///     .microtask_cap(10_000)
///     .build();
/// ```
pub struct SchedulerBuilder {
    clock: Box<dyn Clock>,
    io: Box<dyn IoSubsystem>,
    error_hook: ErrorHook,
    drain_cap: Option<usize>,
}

impl SchedulerBuilder {
    /// Creates a builder with the default configuration.
    pub fn new() -> Self {
        Self {
            clock: Box::new(SystemClock::new()),
            io: Box::new(NullIo),
            error_hook: error::default_hook(),
            drain_cap: None,
        }
    }

    /// Sets the logical time source.
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Attaches the external I/O subsystem consulted by the termination
    /// check and driven during shutdown.
    pub fn io(mut self, io: impl IoSubsystem + 'static) -> Self {
        self.io = Box::new(io);
        self
    }

    /// Installs the unhandled-callback-error hook.
    ///
    /// The hook decides whether the loop continues past a panicking
    /// callback or aborts.
    pub fn on_callback_error(
        mut self,
        hook: impl FnMut(&CallbackError) -> ErrorAction + 'static,
    ) -> Self {
        self.error_hook = Box::new(hook);
        self
    }

    /// Caps how many microtasks a single drain may execute before it is
    /// declared livelocked.
    ///
    /// Intended for test harnesses pinning down starvation behavior; the
    /// production default is no cap, matching the model where a
    /// self-re-enqueuing priority microtask genuinely never yields.
    pub fn microtask_cap(mut self, cap: usize) -> Self {
        self.drain_cap = Some(cap);
        self
    }

    /// Builds the scheduler with the configured options.
    pub fn build(self) -> Scheduler {
        let (io_sender, inbox, intake_open) = io::completion_channel();

        Scheduler {
            clock: self.clock,
            registry: TaskRegistry::new(),
            timers: TimerSet::new(),
            immediates: CallbackQueue::new(),
            io_queue: CallbackQueue::new(),
            close_queue: CallbackQueue::new(),
            microtasks: MicrotaskQueues::new(),
            inbox,
            io_sender,
            intake_open,
            io: self.io,
            state: State::Idle,
            phase: None,
            stop_requested: false,
            stop_kind: StopKind::External,
            error_hook: self.error_hook,
            drain_cap: self.drain_cap,
            shutdown: ShutdownState::new(),
        }
    }
}

impl Default for SchedulerBuilder {
    /// Creates a default `SchedulerBuilder`.
    fn default() -> Self {
        Self::new()
    }
}
