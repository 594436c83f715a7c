use std::cmp::Ordering;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::task::Waker;
use std::time::Instant;

/// An entry in the reactor timer heap.
///
/// Entries are ordered by deadline, then by registration order, so two
/// timers with the same deadline fire in the order they were registered.
pub(crate) struct TimerEntry {
    /// The time at which the timer fires.
    pub(crate) deadline: Instant,

    /// Registration sequence number.
    pub(crate) seq: u64,

    /// Waker notified when the deadline is reached.
    pub(crate) waker: Waker,

    /// Cancellation flag shared with the [`TimerHandle`].
    pub(crate) cancelled: Arc<AtomicBool>,
}

impl TimerEntry {
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(AtomicOrdering::Acquire)
    }
}

impl Eq for TimerEntry {}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Ord for TimerEntry {
    /// Reversed so that `BinaryHeap<TimerEntry>` pops the earliest
    /// deadline first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Handle to a timer registered with [`Reactor::register_timer`].
///
/// Dropping the handle does **not** cancel the timer.
///
/// [`Reactor::register_timer`]: crate::Reactor::register_timer
#[derive(Debug, Clone)]
pub struct TimerHandle {
    pub(crate) deadline: Instant,
    pub(crate) cancelled: Arc<AtomicBool>,
}

impl TimerHandle {
    /// The instant the timer fires at.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Prevents the timer from waking its waker.
    ///
    /// Has no effect if the timer already fired.
    pub fn cancel(&self) {
        self.cancelled.store(true, AtomicOrdering::Release);
    }

    /// Returns `true` if [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(AtomicOrdering::Acquire)
    }
}
