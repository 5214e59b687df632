//! The phase cycle, registration API, and shutdown control.
//!
//! The scheduler is the orchestrator of the whole crate: it owns every
//! queue, executes one full phase cycle per loop iteration
//! (Timers → Poll → Check → Close), drains both microtask queues after
//! every single callback, and decides when the loop may block and when it
//! terminates.

mod builder;
mod core;
mod shutdown;
mod state;

pub use builder::SchedulerBuilder;
pub use core::Scheduler;
pub use state::{Outcome, Phase, State};
