//! Pending timers ordered by due time.

use crate::task::{CancelFlag, RepeatFn, TaskFn, TaskKey};

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Callback payload of a timer entry.
pub(crate) enum TimerCallback {
    /// Fires once, then the entry is dropped.
    Once(TaskFn),
    /// Fires every `every` milliseconds; the scheduler re-pushes the entry
    /// with `due_at += every` after each fire. The due time is advanced by
    /// the interval rather than recomputed from "now", so execution latency
    /// does not compound into the schedule.
    Repeating { every: u64, callback: RepeatFn },
}

/// An entry in the timer heap.
///
/// Entries are ordered by due time, ties broken by insertion sequence, and
/// stored in a `BinaryHeap` behaving as a min-heap through the reversed
/// [`Ord`] implementation below.
///
/// An entry may be cancelled while still queued; the shared flag marks it
/// and it is skipped when popped.
pub(crate) struct TimerEntry {
    /// Logical time at which the timer should fire.
    pub(crate) due_at: u64,

    /// Insertion sequence number, the tie-break for equal due times.
    pub(crate) seq: u64,

    /// Registry key of the task.
    pub(crate) key: TaskKey,

    /// Cancellation flag shared with the task registry.
    pub(crate) cancelled: CancelFlag,

    /// The work to run when due.
    pub(crate) callback: TimerCallback,
}

impl Eq for TimerEntry {}

impl PartialEq for TimerEntry {
    /// Two entries are equal if both due time and sequence are equal.
    fn eq(&self, other: &Self) -> bool {
        self.due_at == other.due_at && self.seq == other.seq
    }
}

impl Ord for TimerEntry {
    /// Orders entries by `(due_at, seq)`.
    ///
    /// Note that the comparison is **reversed** so that a
    /// `BinaryHeap<TimerEntry>` behaves as a min-heap, where the earliest
    /// due time (and, among equals, the earliest registration) pops first.
    fn cmp(&self, other: &Self) -> Ordering {
        (other.due_at, other.seq).cmp(&(self.due_at, self.seq))
    }
}

impl PartialOrd for TimerEntry {
    /// Partial ordering consistent with [`Ord`].
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The set of pending delayed and repeating tasks.
pub(crate) struct TimerSet {
    heap: BinaryHeap<TimerEntry>,
}

impl TimerSet {
    pub(crate) fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }

    pub(crate) fn push(&mut self, entry: TimerEntry) {
        self.heap.push(entry);
    }

    /// Pops every non-cancelled entry with `due_at <= now`, in firing order.
    ///
    /// The returned batch is a snapshot: timers scheduled while the batch
    /// executes land in the heap and wait for the next Timers phase, even
    /// with a zero delay.
    pub(crate) fn pop_due(&mut self, now: u64) -> Vec<TimerEntry> {
        let mut due = Vec::new();

        while let Some(head) = self.heap.peek() {
            if head.due_at > now {
                break;
            }

            let entry = self.heap.pop().unwrap();

            if entry.cancelled.get() {
                continue;
            }

            due.push(entry);
        }

        due
    }

    /// Earliest pending due time, or `None` when no live timer remains.
    ///
    /// Cancelled entries at the head of the heap are purged on the way; this
    /// is the only place dead entries are physically removed early, so a
    /// cancelled front timer can never bound the Poll-phase wait.
    pub(crate) fn next_due(&mut self) -> Option<u64> {
        while let Some(head) = self.heap.peek() {
            if head.cancelled.get() {
                self.heap.pop();
                continue;
            }

            return Some(head.due_at);
        }

        None
    }

    /// Whether a live timer is still pending.
    pub(crate) fn has_pending(&mut self) -> bool {
        self.next_due().is_some()
    }
}
