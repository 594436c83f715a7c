//! Platform-specific poller abstraction.
//!
//! The poller is what an idle worker blocks in while it drives the
//! reactor. It must be able to:
//! - wait for I/O readiness with a timeout bounded by the next timer,
//! - be interrupted from any thread when new work is enqueued.
//!
//! Linux uses `epoll` plus an `eventfd` wake source. Other targets fall
//! back to a condition-variable poller that supports timers and wake-ups
//! but not descriptor readiness.

pub(crate) mod common;

#[cfg(target_os = "linux")]
mod epoll;

#[cfg(not(target_os = "linux"))]
mod park;

#[cfg(target_os = "linux")]
pub(crate) type Poller = epoll::EpollPoller;

#[cfg(not(target_os = "linux"))]
pub(crate) type Poller = park::ParkPoller;

#[cfg(unix)]
pub type RawFd = std::os::fd::RawFd;

#[cfg(not(unix))]
pub type RawFd = i32;
