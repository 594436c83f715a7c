use crate::reactor::poller::RawFd;

use std::task::Waker;

/// A one-shot readiness wait registered with the reactor.
///
/// The entry lives in the reactor slab until the poller reports the
/// descriptor ready (the waker is then consumed) or the registration is
/// cancelled.
pub(crate) struct IoWaiter {
    /// Descriptor being waited on.
    pub(crate) fd: RawFd,

    /// Distinguishes successive registrations that reuse a slab token.
    pub(crate) generation: u64,

    /// Waker to notify once the descriptor is ready.
    pub(crate) waker: Waker,
}

/// Identifies a pending readiness registration.
///
/// Returned by [`Reactor::register_io`](crate::Reactor::register_io).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoRegistration {
    pub(crate) token: usize,
    pub(crate) generation: u64,
}
