//! Portable fallback poller.
//!
//! Supports timed waits and cross-thread wake-ups only; descriptor
//! readiness is reported as unsupported.

use super::RawFd;
use super::common::Interest;
use crate::reactor::event::Event;

use parking_lot::{Condvar, Mutex};
use std::io;
use std::time::Duration;

pub(crate) struct ParkPoller {
    notified: Mutex<bool>,
    condvar: Condvar,
}

impl ParkPoller {
    pub(crate) fn new() -> io::Result<Self> {
        Ok(Self {
            notified: Mutex::new(false),
            condvar: Condvar::new(),
        })
    }

    pub(crate) fn wake(&self) {
        *self.notified.lock() = true;
        self.condvar.notify_one();
    }

    pub(crate) fn register(&self, _fd: RawFd, _token: usize, _interest: Interest) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "descriptor readiness is not supported on this platform",
        ))
    }

    pub(crate) fn deregister(&self, _fd: RawFd) {}

    pub(crate) fn poll(&self, events: &mut Vec<Event>, timeout: Option<Duration>) -> io::Result<()> {
        events.clear();

        let mut notified = self.notified.lock();
        if !*notified {
            match timeout {
                Some(t) => {
                    self.condvar.wait_for(&mut notified, t);
                }
                None => self.condvar.wait(&mut notified),
            }
        }
        *notified = false;

        Ok(())
    }
}
