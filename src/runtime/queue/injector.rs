use crate::runtime::fiber::FiberCore;

use crossbeam_deque::{Injector as Queue, Steal};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

/// Global run queue for free fibers.
///
/// Multi-producer / multi-consumer: fibers are pushed by spawning
/// threads, by reactor wake-ups and by yielding fibers, and popped by any
/// worker. It also coordinates parking of idle workers that are not
/// driving the reactor.
pub(crate) struct Injector {
    /// Lock-free FIFO of runnable fibers.
    queue: Queue<Arc<FiberCore>>,

    /// Guards the park / notify handshake.
    sleepers: Mutex<usize>,

    /// Wakes parked workers.
    condvar: Condvar,
}

impl Injector {
    pub(crate) fn new() -> Self {
        Self {
            queue: Queue::new(),
            sleepers: Mutex::new(0),
            condvar: Condvar::new(),
        }
    }

    /// Appends a fiber to the back of the queue.
    ///
    /// Waking idle workers is the caller's job (see
    /// [`notify`](Self::notify)).
    pub(crate) fn push(&self, fiber: Arc<FiberCore>) {
        self.queue.push(fiber);
    }

    /// Takes the fiber at the front of the queue.
    pub(crate) fn pop(&self) -> Option<Arc<FiberCore>> {
        loop {
            match self.queue.steal() {
                Steal::Success(fiber) => return Some(fiber),
                Steal::Empty => return None,
                Steal::Retry => continue,
            }
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Wakes every parked worker.
    pub(crate) fn notify(&self) {
        let sleepers = self.sleepers.lock();
        if *sleepers > 0 {
            self.condvar.notify_all();
        }
    }

    /// Wakes a single parked worker.
    pub(crate) fn notify_one(&self) {
        let sleepers = self.sleepers.lock();
        if *sleepers > 0 {
            self.condvar.notify_one();
        }
    }

    /// Parks the calling worker until notified.
    ///
    /// `has_work` is evaluated under the park lock; the worker does not
    /// sleep if it reports pending work.
    pub(crate) fn park(&self, has_work: impl Fn() -> bool) {
        let mut sleepers = self.sleepers.lock();

        if has_work() {
            return;
        }

        *sleepers += 1;
        self.condvar.wait(&mut sleepers);
        *sleepers -= 1;
    }
}
