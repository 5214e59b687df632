//! Logical time sources.
//!
//! The scheduler never reads the OS clock directly; it consults a [`Clock`]
//! for the current logical time and delegates the single blocking point of
//! the loop (the Poll-phase wait) to it. Two implementations are provided:
//!
//! - [`SystemClock`] maps logical time onto real elapsed time,
//! - [`VirtualClock`] advances logical time on demand, which makes
//!   execution-order tests fully reproducible.

use crate::task::IoCallback;

use std::cell::Cell;
use std::rc::Rc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::{Duration, Instant};

/// What ended a Poll-phase wait.
pub enum WaitOutcome {
    /// An I/O completion arrived before the deadline.
    Io(IoCallback),
    /// Logical time reached the deadline; the next timer is due.
    TimerDue,
    /// The completion channel disconnected and no deadline was set;
    /// nothing can wake the loop anymore.
    Idle,
}

/// Monotonic logical time source driving the scheduler.
///
/// `now()` is expressed in logical milliseconds since an implementation-
/// defined epoch and must be monotonically non-decreasing. `wait()` suspends
/// the calling thread until either the deadline is reached or an I/O
/// completion arrives on `inbox`, whichever happens first, and reports which
/// condition woke it.
pub trait Clock {
    /// Current logical time in milliseconds. Monotonically non-decreasing.
    fn now(&self) -> u64;

    /// Suspends until `deadline` (logical ms) passes or a completion
    /// arrives on `inbox`.
    ///
    /// With no deadline the wait is unbounded and only a completion (or a
    /// disconnected channel) ends it.
    fn wait(&self, deadline: Option<u64>, inbox: &Receiver<IoCallback>) -> WaitOutcome;
}

/// Real-time clock backed by [`Instant`].
///
/// Logical time is the number of milliseconds elapsed since the clock was
/// created. Waiting parks the thread on the completion channel, bounded by
/// the time remaining until the deadline.
pub struct SystemClock {
    /// Epoch against which logical time is measured.
    epoch: Instant,
}

impl SystemClock {
    /// Creates a clock whose logical time starts at zero.
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn wait(&self, deadline: Option<u64>, inbox: &Receiver<IoCallback>) -> WaitOutcome {
        match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_sub(self.now());

                match inbox.recv_timeout(Duration::from_millis(remaining)) {
                    Ok(callback) => WaitOutcome::Io(callback),
                    Err(RecvTimeoutError::Timeout) => WaitOutcome::TimerDue,
                    Err(RecvTimeoutError::Disconnected) => WaitOutcome::Idle,
                }
            }
            None => match inbox.recv() {
                Ok(callback) => WaitOutcome::Io(callback),
                Err(_) => WaitOutcome::Idle,
            },
        }
    }
}

/// Deterministic clock advancing logical time on demand.
///
/// Cloning yields a second handle onto the same logical time cell, so a test
/// can keep one handle while the scheduler owns the other. A Poll-phase wait
/// first checks for an already-arrived completion and otherwise jumps
/// straight to the deadline, so a run never stalls on real time.
///
/// # Examples
///
/// ```rust,ignore
/// let clock = VirtualClock::new();
/// let scheduler = Scheduler::builder().clock(clock.clone()).build();
///
/// clock.advance(100);
/// assert_eq!(clock.now(), 100);
/// ```
#[derive(Clone)]
pub struct VirtualClock {
    /// Shared logical-time cell, in milliseconds.
    now: Rc<Cell<u64>>,
}

impl VirtualClock {
    /// Creates a virtual clock starting at logical time zero.
    pub fn new() -> Self {
        Self {
            now: Rc::new(Cell::new(0)),
        }
    }

    /// Advances logical time by `ms` milliseconds.
    ///
    /// Used inside test callbacks to simulate blocking work: the clock moves
    /// but no callbacks run, exactly like a busy loop on the real clock.
    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }

    /// Moves logical time forward to `target`, never backwards.
    pub fn advance_to(&self, target: u64) {
        if target > self.now.get() {
            self.now.set(target);
        }
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> u64 {
        self.now.get()
    }

    fn wait(&self, deadline: Option<u64>, inbox: &Receiver<IoCallback>) -> WaitOutcome {
        // A completion that already arrived wins over the deadline, matching
        // the real clock's behavior when the channel is non-empty.
        match inbox.try_recv() {
            Ok(callback) => return WaitOutcome::Io(callback),
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => return WaitOutcome::Idle,
        }

        match deadline {
            Some(deadline) => {
                self.advance_to(deadline);
                WaitOutcome::TimerDue
            }
            // Only an external thread can end this wait. Deterministic tests
            // never reach here unless they hold a live CompletionSender.
            None => match inbox.recv() {
                Ok(callback) => WaitOutcome::Io(callback),
                Err(_) => WaitOutcome::Idle,
            },
        }
    }
}
