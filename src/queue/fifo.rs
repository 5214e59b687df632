//! Cancel-capable FIFO queues for the Poll, Check, and Close phases.

use crate::task::{CancelFlag, TaskKey};

use std::collections::VecDeque;

/// A queued callback with its registry key and cancellation flag.
///
/// Generic over the callback type so the same queue backs local tasks
/// (`TaskFn`) and `Send` I/O completions (`IoCallback`).
pub(crate) struct QueueEntry<F> {
    pub(crate) key: TaskKey,
    pub(crate) cancelled: CancelFlag,
    pub(crate) callback: F,
}

/// Plain FIFO of callbacks, executed in insertion order.
pub(crate) struct CallbackQueue<F> {
    entries: VecDeque<QueueEntry<F>>,
}

impl<F> CallbackQueue<F> {
    pub(crate) fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    pub(crate) fn push(&mut self, entry: QueueEntry<F>) {
        self.entries.push_back(entry);
    }

    pub(crate) fn pop(&mut self) -> Option<QueueEntry<F>> {
        self.entries.pop_front()
    }

    /// Atomically takes every entry currently queued.
    ///
    /// Entries pushed while the snapshot executes land in the fresh queue
    /// and run in the next cycle, which is what keeps the Check phase
    /// deterministic under re-enqueueing callbacks.
    pub(crate) fn take_snapshot(&mut self) -> VecDeque<QueueEntry<F>> {
        std::mem::take(&mut self.entries)
    }

    /// Whether any non-cancelled entry is still queued.
    pub(crate) fn has_pending(&self) -> bool {
        self.entries.iter().any(|entry| !entry.cancelled.get())
    }
}
