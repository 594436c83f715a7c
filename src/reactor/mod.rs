//! Reactor: timers and I/O readiness.
//!
//! The reactor is the scheduler's source of external wake-ups:
//! - timers registered by sleeping fibers,
//! - descriptor readiness waits registered by I/O collaborators.
//!
//! It is driven by the scheduler's worker threads between fiber
//! dispatches. Wake-ups are delivered through ordinary
//! [`std::task::Waker`]s, so code outside this crate can share it.

mod core;
mod event;
mod io;
mod poller;
mod timer;

pub use self::core::Reactor;
pub use io::IoRegistration;
pub use poller::RawFd;
pub use poller::common::Interest;
pub use timer::TimerHandle;
