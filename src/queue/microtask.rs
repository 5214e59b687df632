//! The two microtask queues drained between macrotask callbacks.

use super::fifo::{CallbackQueue, QueueEntry};
use crate::task::{TaskFn, TaskKind};

/// Priority and normal microtask FIFOs.
///
/// The queues themselves only order entries; the exhaustion-drain rule lives
/// in the scheduler and is built on [`pop_next`](Self::pop_next): the
/// priority queue is consulted before every single pop, so a priority
/// microtask enqueued by a normal one runs before the next normal one.
pub(crate) struct MicrotaskQueues {
    priority: CallbackQueue<TaskFn>,
    normal: CallbackQueue<TaskFn>,
}

impl MicrotaskQueues {
    pub(crate) fn new() -> Self {
        Self {
            priority: CallbackQueue::new(),
            normal: CallbackQueue::new(),
        }
    }

    pub(crate) fn push_priority(&mut self, entry: QueueEntry<TaskFn>) {
        self.priority.push(entry);
    }

    pub(crate) fn push_normal(&mut self, entry: QueueEntry<TaskFn>) {
        self.normal.push(entry);
    }

    /// Pops the next microtask to run, priority class first.
    pub(crate) fn pop_next(&mut self) -> Option<(TaskKind, QueueEntry<TaskFn>)> {
        if let Some(entry) = self.priority.pop() {
            return Some((TaskKind::PriorityMicrotask, entry));
        }

        self.normal
            .pop()
            .map(|entry| (TaskKind::Microtask, entry))
    }

    pub(crate) fn has_pending(&self) -> bool {
        self.priority.has_pending() || self.normal.has_pending()
    }
}
