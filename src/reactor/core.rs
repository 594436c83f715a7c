use super::event::Event;
use super::io::{IoRegistration, IoWaiter};
use super::poller::common::Interest;
use super::poller::{Poller, RawFd};
use super::timer::{TimerEntry, TimerHandle};
use crate::utils::Slab;

use parking_lot::Mutex;
use std::collections::BinaryHeap;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering, fence};
use std::task::Waker;
use std::time::{Duration, Instant};

/// The timer and I/O demultiplexer owned by a scheduler.
///
/// There is no dedicated reactor thread. Every worker runs a non-blocking
/// reactor tick between fiber dispatches, and an idle worker may become
/// the *driver*: it blocks in the OS poller until the next timer deadline,
/// an I/O event, or an enqueue that needs its attention. Only one worker
/// drives at a time.
///
/// The handle is cheap to clone; all clones refer to the same reactor,
/// so identity can be checked with [`Reactor::ptr_eq`].
#[derive(Clone)]
pub struct Reactor {
    inner: Arc<Inner>,
}

struct Inner {
    /// Platform poller (epoll on Linux).
    poller: Poller,

    /// Event buffer; whoever holds this lock is the driver.
    driver: Mutex<Vec<Event>>,

    /// Set while the driver is (about to be) blocked in the poller.
    parked: AtomicBool,

    /// Min-heap of pending timers.
    timers: Mutex<BinaryHeap<TimerEntry>>,

    /// Timer registration counter, used for FIFO ordering of equal deadlines.
    timer_seq: AtomicU64,

    /// Pending readiness waits, indexed by poller token.
    io: Mutex<Slab<IoWaiter>>,

    /// Registration counter used to tell reused tokens apart.
    io_generation: AtomicU64,

    /// Number of entries in `io`, readable without the lock.
    io_pending: AtomicUsize,
}

impl Reactor {
    /// Creates a reactor backed by a fresh OS poller.
    pub(crate) fn new() -> io::Result<Self> {
        Ok(Self {
            inner: Arc::new(Inner {
                poller: Poller::new()?,
                driver: Mutex::new(Vec::with_capacity(64)),
                parked: AtomicBool::new(false),
                timers: Mutex::new(BinaryHeap::new()),
                timer_seq: AtomicU64::new(0),
                io: Mutex::new(Slab::with_capacity(64)),
                io_generation: AtomicU64::new(0),
                io_pending: AtomicUsize::new(0),
            }),
        })
    }

    /// Returns `true` if both handles refer to the same reactor.
    pub fn ptr_eq(&self, other: &Reactor) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Schedules `waker` to be woken once `deadline` is reached.
    ///
    /// Timers are serviced by the scheduler's worker threads, so they only
    /// fire while the owning scheduler is started.
    pub fn register_timer(&self, deadline: Instant, waker: Waker) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let seq = self.inner.timer_seq.fetch_add(1, Ordering::Relaxed);

        self.inner.timers.lock().push(TimerEntry {
            deadline,
            seq,
            waker,
            cancelled: cancelled.clone(),
        });

        // The driver may be sleeping towards a later deadline.
        self.unpark();

        TimerHandle {
            deadline,
            cancelled,
        }
    }

    /// Registers a one-shot readiness wait on `fd`.
    ///
    /// `waker` is woken once the descriptor reports the requested
    /// readiness (or an error / hang-up). The registration is consumed by
    /// that wake-up.
    pub fn register_io(
        &self,
        fd: RawFd,
        interest: Interest,
        waker: Waker,
    ) -> io::Result<IoRegistration> {
        let generation = self.inner.io_generation.fetch_add(1, Ordering::Relaxed);

        let mut io = self.inner.io.lock();
        let token = io.insert(IoWaiter {
            fd,
            generation,
            waker,
        });

        if let Err(err) = self.inner.poller.register(fd, token, interest) {
            io.try_remove(token);
            return Err(err);
        }

        self.inner.io_pending.fetch_add(1, Ordering::AcqRel);
        drop(io);

        self.unpark();

        Ok(IoRegistration { token, generation })
    }

    /// Returns `true` while `registration` has not been consumed by a
    /// readiness event or cancelled.
    pub fn is_io_pending(&self, registration: IoRegistration) -> bool {
        let io = self.inner.io.lock();
        io.get(registration.token)
            .is_some_and(|w| w.generation == registration.generation)
    }

    /// Cancels a pending readiness wait without waking its waker.
    ///
    /// Returns `false` if the registration already completed.
    pub fn cancel_io(&self, registration: IoRegistration) -> bool {
        let mut io = self.inner.io.lock();

        let current = io
            .get(registration.token)
            .is_some_and(|w| w.generation == registration.generation);
        if !current {
            return false;
        }

        if let Some(waiter) = io.try_remove(registration.token) {
            self.inner.poller.deregister(waiter.fd);
            self.inner.io_pending.fetch_sub(1, Ordering::AcqRel);
        }

        true
    }

    /// Non-blocking reactor tick.
    ///
    /// Fires every expired timer and, when readiness waits exist and no
    /// other worker is driving, collects already-pending I/O events.
    pub(crate) fn poll_ready(&self) {
        self.fire_timers(Instant::now());

        if self.inner.io_pending.load(Ordering::Acquire) == 0 {
            return;
        }

        if let Some(mut events) = self.inner.driver.try_lock() {
            if let Err(err) = self.inner.poller.poll(&mut events, Some(Duration::ZERO)) {
                tracing::warn!(error = %err, "reactor poll failed");
            }
            self.dispatch(&events);
        }
    }

    /// Blocks the calling worker in the poller, if no other worker is
    /// already driving.
    ///
    /// The wait ends at the next timer deadline, an I/O event or an
    /// [`unpark`](Self::unpark), capped by `max` when given. With no timer
    /// pending and no `max` the driver blocks until woken.
    ///
    /// `has_work` is re-checked after the driver announces itself so an
    /// enqueue racing with the park is never missed.
    ///
    /// Returns `false` if another worker holds the driver slot.
    pub(crate) fn park(&self, max: Option<Duration>, has_work: impl Fn() -> bool) -> bool {
        let Some(mut events) = self.inner.driver.try_lock() else {
            return false;
        };

        self.inner.parked.store(true, Ordering::SeqCst);
        fence(Ordering::SeqCst);

        if has_work() {
            self.inner.parked.store(false, Ordering::SeqCst);
            return true;
        }

        let timeout = match (self.next_deadline(), max) {
            (Some(deadline), max) => {
                let until = deadline.saturating_duration_since(Instant::now());
                Some(max.map_or(until, |max| until.min(max)))
            }
            (None, max) => max,
        };

        if let Err(err) = self.inner.poller.poll(&mut events, timeout) {
            tracing::warn!(error = %err, "reactor poll failed");
        }

        self.inner.parked.store(false, Ordering::SeqCst);

        self.dispatch(&events);
        events.clear();
        drop(events);

        self.fire_timers(Instant::now());

        true
    }

    /// Whether a worker currently holds the driver slot.
    pub(crate) fn is_driven(&self) -> bool {
        self.inner.driver.is_locked()
    }

    /// Interrupts the driver if it is blocked in the poller.
    pub(crate) fn unpark(&self) {
        fence(Ordering::SeqCst);
        if self.inner.parked.load(Ordering::SeqCst) {
            self.inner.poller.wake();
        }
    }

    /// Earliest live timer deadline, discarding cancelled timers on top.
    fn next_deadline(&self) -> Option<Instant> {
        let mut timers = self.inner.timers.lock();

        while let Some(top) = timers.peek() {
            if !top.is_cancelled() {
                return Some(top.deadline);
            }
            timers.pop();
        }

        None
    }

    /// Wakes every timer whose deadline is at or before `now`.
    fn fire_timers(&self, now: Instant) {
        let mut due = Vec::new();

        {
            let mut timers = self.inner.timers.lock();
            while let Some(top) = timers.peek() {
                if top.deadline > now {
                    break;
                }
                if let Some(timer) = timers.pop() {
                    due.push(timer);
                }
            }
        }

        for timer in due {
            if !timer.is_cancelled() {
                timer.waker.wake();
            }
        }
    }

    /// Consumes the registrations that became ready and wakes them.
    fn dispatch(&self, events: &[Event]) {
        if events.is_empty() {
            return;
        }

        let mut ready = Vec::with_capacity(events.len());

        {
            let mut io = self.inner.io.lock();
            for event in events {
                if !(event.readable || event.writable) {
                    continue;
                }
                if let Some(waiter) = io.try_remove(event.token) {
                    self.inner.poller.deregister(waiter.fd);
                    self.inner.io_pending.fetch_sub(1, Ordering::AcqRel);
                    ready.push(waiter.waker);
                }
            }
        }

        for waker in ready {
            waker.wake();
        }
    }

    /// Number of timers still in the heap (cancelled ones included).
    pub(crate) fn pending_timers(&self) -> usize {
        self.inner.timers.lock().len()
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        for waiter in self.io.get_mut().drain() {
            self.poller.deregister(waiter.fd);
        }
    }
}

impl fmt::Debug for Reactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactor")
            .field("pending_timers", &self.pending_timers())
            .field(
                "pending_io",
                &self.inner.io_pending.load(Ordering::Relaxed),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::task::Wake;

    #[derive(Default)]
    struct CountingWaker(AtomicUsize);

    impl Wake for CountingWaker {
        fn wake(self: Arc<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting() -> (Arc<CountingWaker>, Waker) {
        let counter = Arc::new(CountingWaker::default());
        (counter.clone(), Waker::from(counter))
    }

    #[test]
    fn expired_timers_fire_on_tick() {
        let reactor = Reactor::new().unwrap();
        let (count, waker) = counting();

        reactor.register_timer(Instant::now(), waker);
        reactor.poll_ready();

        assert_eq!(count.0.load(Ordering::SeqCst), 1);
        assert_eq!(reactor.pending_timers(), 0);
    }

    #[test]
    fn future_timers_wait() {
        let reactor = Reactor::new().unwrap();
        let (count, waker) = counting();

        reactor.register_timer(Instant::now() + Duration::from_secs(60), waker);
        reactor.poll_ready();

        assert_eq!(count.0.load(Ordering::SeqCst), 0);
        assert_eq!(reactor.pending_timers(), 1);
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let reactor = Reactor::new().unwrap();
        let (count, waker) = counting();

        let handle = reactor.register_timer(Instant::now(), waker);
        handle.cancel();
        reactor.poll_ready();

        assert!(handle.is_cancelled());
        assert_eq!(count.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn park_returns_at_next_deadline() {
        let reactor = Reactor::new().unwrap();
        let (count, waker) = counting();

        let start = Instant::now();
        reactor.register_timer(start + Duration::from_millis(20), waker);

        while count.0.load(Ordering::SeqCst) == 0 {
            assert!(reactor.park(None, || false));
        }

        assert!(start.elapsed() >= Duration::from_millis(20));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn park_skips_when_work_is_pending() {
        let reactor = Reactor::new().unwrap();

        let start = Instant::now();
        assert!(reactor.park(Some(Duration::from_secs(5)), || true));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn unpark_interrupts_the_driver() {
        let reactor = Reactor::new().unwrap();
        let remote = reactor.clone();
        let done = Arc::new(AtomicBool::new(false));

        let stop = done.clone();
        let waker = std::thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(5));
                remote.unpark();
            }
        });

        let start = Instant::now();
        assert!(reactor.park(None, || false));
        done.store(true, Ordering::SeqCst);
        waker.join().unwrap();

        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn clones_share_identity() {
        let reactor = Reactor::new().unwrap();
        let other = Reactor::new().unwrap();

        assert!(reactor.ptr_eq(&reactor.clone()));
        assert!(!reactor.ptr_eq(&other));
    }
}
