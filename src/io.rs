//! Readiness waits on raw file descriptors.
//!
//! These suspend only the calling fiber; the worker thread moves on to
//! other fibers until the scheduler's reactor reports the descriptor
//! ready. The descriptor should be in non-blocking mode so that the
//! operation retried afterwards cannot block the worker.

use crate::error::Result;
use crate::reactor::{Interest, RawFd};
use crate::runtime::fiber::state::SUSPENDED_IO;
use crate::this_fiber;

/// Suspends the calling fiber until `fd` is readable (or hung up).
pub fn wait_readable(fd: RawFd) -> Result<()> {
    wait(fd, Interest::READABLE)
}

/// Suspends the calling fiber until `fd` is writable (or hung up).
pub fn wait_writable(fd: RawFd) -> Result<()> {
    wait(fd, Interest::WRITABLE)
}

/// Suspends the calling fiber until `fd` matches `interest`.
///
/// A free fiber may resume on another OS thread, see
/// [`Policy::Free`](crate::fiber::Policy::Free).
pub fn wait(fd: RawFd, interest: Interest) -> Result<()> {
    let fiber = this_fiber::current()?;
    let reactor = fiber.scheduler().reactor().clone();

    let registration = reactor.register_io(fd, interest, fiber.waker())?;

    while reactor.is_io_pending(registration) {
        fiber.park(SUSPENDED_IO);
    }

    Ok(())
}
