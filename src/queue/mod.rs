//! Queue types backing the scheduler phases.
//!
//! All queues are dumb containers: they order entries and expose pops or
//! snapshots, while execution, cancellation checks, and microtask draining
//! stay in the scheduler. Cancellation never removes an entry in place; the
//! shared flag is set and the entry is discarded when popped.

mod fifo;
mod microtask;
mod timer;

pub(crate) use fifo::{CallbackQueue, QueueEntry};
pub(crate) use microtask::MicrotaskQueues;
pub(crate) use timer::{TimerCallback, TimerEntry, TimerSet};
