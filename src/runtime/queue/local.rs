use crate::runtime::fiber::FiberCore;

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Private run queue of one worker thread.
///
/// Holds the pinned fibers bound to that worker. Only the owning worker
/// pops; any thread may push (a reactor wake-up or a finishing fiber can
/// make a pinned fiber runnable from elsewhere). Strict FIFO keeps pinned
/// fibers in the order they became runnable.
pub(crate) struct LocalQueue {
    inner: Mutex<VecDeque<Arc<FiberCore>>>,
}

impl LocalQueue {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    pub(crate) fn push(&self, fiber: Arc<FiberCore>) {
        self.inner.lock().push_back(fiber);
    }

    pub(crate) fn pop(&self) -> Option<Arc<FiberCore>> {
        self.inner.lock().pop_front()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().len()
    }
}
