//! # Phasor
//!
//! **Phasor** is a deterministic, phased, single-threaded cooperative event
//! scheduler, designed as the dedicated task-ordering layer for the **Nebula**
//! ecosystem.
//!
//! Unlike general-purpose async runtimes, Phasor does not poll futures and
//! performs no I/O of its own. It is the underlying state machine of a
//! classic phased event loop made explicit: four macrotask phases executed in
//! a fixed order (Timers → Poll → Check → Close), with two classes of
//! microtasks drained to exhaustion after every single callback. Replaying
//! the same registrations against the same clock always yields the same
//! execution order, which makes ordering contracts directly testable.
//!
//! Phasor is built from the ground up with determinism in mind, offering:
//!
//! - A **fixed phase cycle** with snapshot execution, so work enqueued during
//!   a phase defers to the next cycle
//! - **Two microtask classes**, priority and normal, where the priority queue
//!   is always drained fully before a single normal microtask runs
//! - **Timer primitives** including one-shot and repeating timers with
//!   deterministic tie-breaking by registration order
//! - A **virtual clock** that advances logical time on demand, making
//!   execution-order tests reproducible down to the millisecond
//! - **Graceful shutdown** with a bounded grace period and a distinguishable
//!   forced-termination outcome
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use phasor::Scheduler;
//!
//! let mut scheduler = Scheduler::new();
//!
//! scheduler.schedule_timer(0, |s| {
//!     println!("timers phase");
//!     s.queue_priority_microtask(|_| println!("before any further macro-work"));
//! });
//! scheduler.schedule_immediate(|_| println!("check phase"));
//!
//! scheduler.run().unwrap();
//! ```
//!
//! ## Modules
//!
//! - [`clock`] — Logical time sources, real and virtual
//! - [`io`] — The completion channel and the external I/O subsystem boundary
//! - [`scheduler`] — The phase cycle, registration API, and shutdown control
//! - [`task`] — Task identity, handles, and callback types
//!
//! ## Getting Started
//!
//! Add Phasor to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! phasor = { git = "https://github.com/nebula-platform/phasor", package = "phasor" }
//! ```

mod queue;

pub mod clock;
pub mod error;
pub mod io;
pub mod scheduler;
pub mod task;

pub use clock::{Clock, SystemClock, VirtualClock, WaitOutcome};
pub use error::{CallbackError, ErrorAction, SchedulerError};
pub use io::{CompletionSender, IoSubsystem, NullIo, SendError};
pub use scheduler::{Outcome, Phase, Scheduler, SchedulerBuilder, State};
pub use task::{Handle, TaskKind};
