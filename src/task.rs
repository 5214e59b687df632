//! Task identity, handles, and callback types.
//!
//! Every scheduling call registers a task in a central [`TaskRegistry`] and
//! returns an opaque [`Handle`] for cancellation. Registry slots are keyed by
//! a generational [`TaskKey`], so cancelling a handle whose slot has already
//! been reclaimed is a silent no-op rather than an error.

use crate::scheduler::Scheduler;

use slotmap::{SlotMap, new_key_type};

use std::cell::Cell;
use std::rc::Rc;

new_key_type! {
    /// Generational key identifying a registered task.
    pub struct TaskKey;
}

/// The kind of work a task represents.
///
/// The first four kinds are macrotasks, each owned by the phase of the same
/// name. The two microtask kinds are drained between macrotask callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// A delayed or repeating task, executed in the Timers phase.
    Timer,
    /// A "run on the next loop pass" task, executed in the Check phase.
    Immediate,
    /// A completion handed in by the external I/O subsystem (Poll phase).
    IoCompletion,
    /// A teardown notification, executed in the Close phase.
    Close,
    /// A microtask drained before any normal microtask.
    PriorityMicrotask,
    /// A normal microtask.
    Microtask,
}

/// One-shot callback executed by the scheduler.
pub type TaskFn = Box<dyn FnOnce(&mut Scheduler) + 'static>;

/// Callback of a repeating timer, invoked once per fire.
pub type RepeatFn = Box<dyn FnMut(&mut Scheduler) + 'static>;

/// Completion callback crossing the thread boundary from the external
/// I/O subsystem. Must be `Send`; it still executes on the scheduler thread.
pub type IoCallback = Box<dyn FnOnce(&mut Scheduler) + Send + 'static>;

/// Cancellation flag shared between a registry slot and its queue entry.
///
/// Queues never search for entries to remove; cancellation sets the flag and
/// the entry is skipped when its queue is next popped.
pub(crate) type CancelFlag = Rc<Cell<bool>>;

/// Opaque reference to a scheduled task, used for cancellation.
///
/// A handle stays valid until its task executes (one-shot) or is cancelled.
/// Cancelling a stale handle is a no-op; the generational key guards against
/// accidental double-cancel or cancel-after-reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    key: TaskKey,
}

impl Handle {
    pub(crate) fn new(key: TaskKey) -> Self {
        Self { key }
    }

    pub(crate) fn key(&self) -> TaskKey {
        self.key
    }
}

/// Registry slot for a live task.
pub(crate) struct TaskSlot {
    /// Kind of the registered task.
    pub(crate) kind: TaskKind,

    /// Flag shared with the task's queue entry.
    pub(crate) cancelled: CancelFlag,
}

/// Central bookkeeping for all live tasks of one scheduler.
///
/// The registry owns the generational slot map behind [`Handle`]s and hands
/// out the monotonically increasing sequence numbers used for ordering
/// tie-breaks.
pub(crate) struct TaskRegistry {
    slots: SlotMap<TaskKey, TaskSlot>,
    next_seq: u64,
}

impl TaskRegistry {
    pub(crate) fn new() -> Self {
        Self {
            slots: SlotMap::with_key(),
            next_seq: 0,
        }
    }

    /// Registers a new task and returns its key, shared cancellation flag,
    /// and insertion sequence number.
    pub(crate) fn insert(&mut self, kind: TaskKind) -> (TaskKey, CancelFlag, u64) {
        let cancelled: CancelFlag = Rc::new(Cell::new(false));
        let key = self.slots.insert(TaskSlot {
            kind,
            cancelled: Rc::clone(&cancelled),
        });

        let seq = self.next_seq;
        self.next_seq += 1;

        (key, cancelled, seq)
    }

    /// Removes a slot after its task executed. Missing keys are ignored so
    /// repeated removal (e.g. after a cancel raced the pop) stays silent.
    pub(crate) fn remove(&mut self, key: TaskKey) {
        self.slots.remove(key);
    }

    /// Cancels the task behind `key`, returning its kind if it was live.
    ///
    /// Sets the shared flag so the owning queue skips the entry, and frees
    /// the slot so the handle goes stale immediately.
    pub(crate) fn cancel(&mut self, key: TaskKey) -> Option<TaskKind> {
        self.slots.remove(key).map(|slot| {
            slot.cancelled.set(true);
            slot.kind
        })
    }
}
