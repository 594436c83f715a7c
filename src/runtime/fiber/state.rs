//! Fiber lifecycle states.
//!
//! The state lives in an `AtomicU8` on the fiber; these constants are the
//! only values it takes.

/// Constructed, not yet handed to a run queue.
pub(crate) const CREATED: u8 = 0;

/// Sitting in a run queue.
pub(crate) const RUNNABLE: u8 = 1;

/// Executing on a worker thread. At most one worker observes this.
pub(crate) const RUNNING: u8 = 2;

/// Suspended until a reactor timer fires.
pub(crate) const SUSPENDED_TIMER: u8 = 3;

/// Suspended until the reactor reports descriptor readiness.
pub(crate) const SUSPENDED_IO: u8 = 4;

/// Suspended in `Fiber::join` until another fiber finishes.
pub(crate) const SUSPENDED_JOIN: u8 = 5;

/// Task returned or panicked. Terminal.
pub(crate) const FINISHED: u8 = 6;

/// Woken while still running; the worker re-queues it instead of parking
/// it once it switches out.
pub(crate) const NOTIFIED: u8 = 7;

/// Public view of a fiber's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiberState {
    Created,
    Runnable,
    Running,
    SuspendedTimer,
    SuspendedIo,
    SuspendedJoin,
    Finished,
}

impl FiberState {
    pub(crate) fn from_raw(raw: u8) -> FiberState {
        match raw {
            CREATED => FiberState::Created,
            RUNNABLE => FiberState::Runnable,
            RUNNING | NOTIFIED => FiberState::Running,
            SUSPENDED_TIMER => FiberState::SuspendedTimer,
            SUSPENDED_IO => FiberState::SuspendedIo,
            SUSPENDED_JOIN => FiberState::SuspendedJoin,
            _ => FiberState::Finished,
        }
    }

    pub(crate) fn is_suspended_raw(raw: u8) -> bool {
        matches!(raw, SUSPENDED_TIMER | SUSPENDED_IO | SUSPENDED_JOIN)
    }
}
