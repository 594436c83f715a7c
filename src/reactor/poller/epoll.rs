//! Linux `epoll`-based poller.
//!
//! Descriptors are registered one-shot: after an event is reported the
//! descriptor is removed again, so every wait is a fresh registration.
//! An internal `eventfd` lets enqueuing threads interrupt a worker that
//! is blocked in `epoll_wait`.

use super::RawFd;
use super::common::Interest;
use crate::reactor::event::Event;

use libc::{
    EPOLL_CLOEXEC, EPOLL_CTL_ADD, EPOLL_CTL_DEL, EPOLLERR, EPOLLHUP, EPOLLIN, EPOLLONESHOT,
    EPOLLOUT, epoll_create1, epoll_ctl, epoll_event, epoll_wait,
};
use std::io;
use std::time::Duration;

/// Reserved token used for the wake-up eventfd.
///
/// Slab tokens are small indices, so `u64::MAX` never collides.
const WAKE_TOKEN: u64 = u64::MAX;

/// Number of kernel events collected per `epoll_wait`.
const EVENTS_CAPACITY: usize = 64;

pub(crate) struct EpollPoller {
    /// Epoll file descriptor.
    epoll: RawFd,

    /// Non-blocking eventfd registered as a persistent wake source.
    eventfd: RawFd,
}

// Both members are plain descriptors; epoll_ctl and eventfd writes are
// safe to issue concurrently with an epoll_wait on another thread.
unsafe impl Send for EpollPoller {}
unsafe impl Sync for EpollPoller {}

impl EpollPoller {
    /// Creates the epoll instance and its wake eventfd.
    pub(crate) fn new() -> io::Result<Self> {
        let epoll = unsafe { epoll_create1(EPOLL_CLOEXEC) };
        if epoll < 0 {
            return Err(io::Error::last_os_error());
        }

        let eventfd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
        if eventfd < 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(epoll) };
            return Err(err);
        }

        let mut event = epoll_event {
            events: EPOLLIN as u32,
            u64: WAKE_TOKEN,
        };

        let rc = unsafe { epoll_ctl(epoll, EPOLL_CTL_ADD, eventfd, &mut event) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            unsafe {
                libc::close(eventfd);
                libc::close(epoll);
            }
            return Err(err);
        }

        Ok(Self { epoll, eventfd })
    }

    /// Interrupts a blocked [`poll`](Self::poll).
    pub(crate) fn wake(&self) {
        let buf: u64 = 1;
        unsafe {
            libc::write(self.eventfd, &buf as *const u64 as *const _, 8);
        }
    }

    /// Registers `fd` for a single readiness notification.
    pub(crate) fn register(&self, fd: RawFd, token: usize, interest: Interest) -> io::Result<()> {
        let mut flags = EPOLLONESHOT;

        if interest.read {
            flags |= EPOLLIN;
        }
        if interest.write {
            flags |= EPOLLOUT;
        }

        let mut event = epoll_event {
            events: flags as u32,
            u64: token as u64,
        };

        let rc = unsafe { epoll_ctl(self.epoll, EPOLL_CTL_ADD, fd, &mut event) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }

    /// Removes `fd` from the interest list.
    pub(crate) fn deregister(&self, fd: RawFd) {
        unsafe {
            epoll_ctl(self.epoll, EPOLL_CTL_DEL, fd, std::ptr::null_mut());
        }
    }

    /// Waits for readiness events.
    ///
    /// Returns once a descriptor is ready, the wake eventfd fires, or the
    /// timeout expires. `None` blocks indefinitely; a zero timeout only
    /// collects events that are already pending.
    pub(crate) fn poll(&self, events: &mut Vec<Event>, timeout: Option<Duration>) -> io::Result<()> {
        let timeout_ms = timeout
            .map(|t| {
                // Round up so a sub-millisecond deadline does not spin.
                let ms = t.as_micros().div_ceil(1000);
                ms.min(i32::MAX as u128) as i32
            })
            .unwrap_or(-1);

        let mut raw: [epoll_event; EVENTS_CAPACITY] =
            [epoll_event { events: 0, u64: 0 }; EVENTS_CAPACITY];

        let n = unsafe {
            epoll_wait(
                self.epoll,
                raw.as_mut_ptr(),
                EVENTS_CAPACITY as i32,
                timeout_ms,
            )
        };

        events.clear();

        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(err);
        }

        for ev in &raw[..n as usize] {
            if ev.u64 == WAKE_TOKEN {
                let mut buf = 0u64;
                unsafe {
                    libc::read(self.eventfd, &mut buf as *mut u64 as *mut _, 8);
                }
                continue;
            }

            let bits = ev.events;
            events.push(Event {
                token: ev.u64 as usize,
                readable: bits & ((EPOLLIN | EPOLLERR | EPOLLHUP) as u32) != 0,
                writable: bits & ((EPOLLOUT | EPOLLERR | EPOLLHUP) as u32) != 0,
            });
        }

        Ok(())
    }
}

impl Drop for EpollPoller {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.eventfd);
            libc::close(self.epoll);
        }
    }
}
