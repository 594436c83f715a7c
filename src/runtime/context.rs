use crate::runtime::executor::core::SchedulerCore;
use crate::runtime::fiber::FiberCore;

use std::cell::RefCell;
use std::sync::Arc;

struct WorkerContext {
    scheduler: Arc<SchedulerCore>,
    index: usize,
}

thread_local! {
    /// Scheduler and worker index of the current worker thread.
    ///
    /// Set for the whole life of a worker thread, unset on every other
    /// thread.
    static CURRENT_WORKER: RefCell<Option<WorkerContext>> = const { RefCell::new(None) };

    /// The fiber the current worker is running.
    ///
    /// Set only while a fiber's execution context is resumed. A fiber that
    /// migrates to another worker finds itself in that worker's slot.
    static CURRENT_FIBER: RefCell<Option<Arc<FiberCore>>> = const { RefCell::new(None) };
}

/// Runs `f` as worker `index` of `scheduler`.
#[inline(never)]
pub(crate) fn enter_worker<R>(
    scheduler: Arc<SchedulerCore>,
    index: usize,
    f: impl FnOnce() -> R,
) -> R {
    let prev = CURRENT_WORKER.with(|w| w.replace(Some(WorkerContext { scheduler, index })));
    let out = f();
    CURRENT_WORKER.with(|w| w.replace(prev));
    out
}

/// Runs `f` (a resume of `fiber`) with `fiber` installed as current.
///
/// No borrow of the slot is held while `f` runs, so the fiber can look
/// itself up freely.
#[inline(never)]
pub(crate) fn enter_fiber<R>(fiber: &Arc<FiberCore>, f: impl FnOnce() -> R) -> R {
    let prev = CURRENT_FIBER.with(|c| c.replace(Some(fiber.clone())));
    let out = f();
    CURRENT_FIBER.with(|c| c.replace(prev));
    out
}

/// The fiber running on this thread, if any.
///
/// Suspension operations on the returned fiber are only valid because it
/// is the one executing; the handle must not be passed to other fibers
/// for that purpose.
///
/// The accessors here are never inlined: a free fiber may resume on
/// another thread, and a thread-local address cached across the switch
/// would still point at the old thread's slot.
#[inline(never)]
pub(crate) fn current_fiber() -> Option<Arc<FiberCore>> {
    CURRENT_FIBER.with(|c| c.borrow().clone())
}

/// The running fiber and the index of its worker, if the calling thread
/// is a worker of `scheduler` running a fiber.
#[inline(never)]
pub(crate) fn current_on(scheduler: &Arc<SchedulerCore>) -> Option<(Arc<FiberCore>, usize)> {
    let fiber = current_fiber()?;

    let index = CURRENT_WORKER.with(|w| {
        w.borrow()
            .as_ref()
            .filter(|ctx| Arc::ptr_eq(&ctx.scheduler, scheduler))
            .map(|ctx| ctx.index)
    })?;

    Some((fiber, index))
}

/// Whether the calling thread is one of `scheduler`'s workers.
#[inline(never)]
pub(crate) fn is_worker_of(scheduler: &SchedulerCore) -> bool {
    CURRENT_WORKER.with(|w| {
        w.borrow()
            .as_ref()
            .is_some_and(|ctx| std::ptr::eq(Arc::as_ptr(&ctx.scheduler), scheduler))
    })
}
