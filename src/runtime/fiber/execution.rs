//! Suspendable execution context of a fiber.
//!
//! Each fiber owns a stackful coroutine running its task on a private
//! stack. The worker resumes it; the fiber hands control back through its
//! [`Suspender`] at a suspension point, telling the worker what to do with
//! it next.

use crate::error::{FiberPanic, fatal};

use corosensei::stack::DefaultStack;
use corosensei::{Coroutine, CoroutineResult, Yielder};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::Arc;
use std::sync::atomic::{AtomicPtr, Ordering};

/// The boxed entry point of a fiber: the user callable together with
/// everything it captured by value.
pub(crate) type FiberTask = Box<dyn FnOnce() + Send + 'static>;

/// How a fiber's task ended.
pub(crate) type Outcome = Result<(), FiberPanic>;

/// Why a fiber handed control back to its worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Suspend {
    /// Still runnable; re-queue it behind the other runnable fibers.
    Yield,

    /// Park it in the given suspended state until something wakes it.
    Park(u8),
}

/// Result of resuming an execution context once.
pub(crate) enum Resumed {
    Suspended(Suspend),
    Finished(Outcome),
}

type FiberYielder = Yielder<(), Suspend>;

/// Switch-out handle shared between a fiber and its coroutine.
///
/// The coroutine publishes its yielder here on first entry. The yielder
/// lives on the coroutine's own stack for as long as the coroutine runs.
pub(crate) struct Suspender {
    yielder: AtomicPtr<FiberYielder>,
}

impl Suspender {
    pub(crate) fn new() -> Self {
        Self {
            yielder: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Switches back to the worker that resumed this fiber.
    ///
    /// Returns once a worker (possibly a different thread) resumes the
    /// fiber again.
    ///
    /// # Safety
    ///
    /// Must be called on the stack of the coroutine that owns this
    /// suspender, i.e. from the fiber itself while it is running.
    pub(crate) unsafe fn suspend(&self, reason: Suspend) {
        let yielder = self.yielder.load(Ordering::Acquire);
        if yielder.is_null() {
            fatal("fiber suspended before its execution context was entered");
        }

        // SAFETY: the pointer was published by this coroutine on entry and
        // the caller guarantees we are executing inside that coroutine.
        unsafe { (*yielder).suspend(reason) };
    }
}

/// A fiber's coroutine and stack.
pub(crate) struct ExecutionContext {
    coroutine: Coroutine<(), Suspend, Outcome, DefaultStack>,
}

// SAFETY: the state machine guarantees a context is resumed by at most
// one worker at a time, and the task closure is `Send`. That covers the
// values the task starts with, not the ones it creates: values living on
// the fiber stack across a suspension point move with the fiber to
// whichever worker resumes it. Runtime code keeps no thread-local borrow
// and no `!Send` value across a switch. User code running as a free fiber
// must do the same; the hazard is documented on `Policy::Free` and on
// every suspending operation.
unsafe impl Send for ExecutionContext {}

impl ExecutionContext {
    /// Allocates a stack of at least `stack_size` bytes and prepares
    /// `task` to run on it.
    pub(crate) fn new(
        task: FiberTask,
        stack_size: usize,
        suspender: Arc<Suspender>,
    ) -> io::Result<Self> {
        let stack = DefaultStack::new(stack_size)?;

        let coroutine = Coroutine::with_stack(stack, move |yielder: &FiberYielder, ()| {
            suspender
                .yielder
                .store(yielder as *const FiberYielder as *mut FiberYielder, Ordering::Release);

            panic::catch_unwind(AssertUnwindSafe(task)).map_err(FiberPanic::new)
        });

        Ok(Self { coroutine })
    }

    /// Runs the fiber until its next suspension point or until its task
    /// returns.
    pub(crate) fn resume(&mut self) -> Resumed {
        match self.coroutine.resume(()) {
            CoroutineResult::Yield(reason) => Resumed::Suspended(reason),
            CoroutineResult::Return(outcome) => Resumed::Finished(outcome),
        }
    }
}

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        // A fiber abandoned mid-task (its scheduler was never joined) is
        // released without unwinding its stack.
        if self.coroutine.started() && !self.coroutine.done() {
            // SAFETY: the suspended frames are leaked, not run; equivalent
            // to `mem::forget` on every value on the fiber stack.
            unsafe { self.coroutine.force_reset() };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn runs_to_completion_across_suspensions() {
        let suspender = Arc::new(Suspender::new());
        let steps = Arc::new(AtomicUsize::new(0));

        let inner = suspender.clone();
        let counter = steps.clone();
        let mut ctx = ExecutionContext::new(
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                unsafe { inner.suspend(Suspend::Yield) };
                counter.fetch_add(1, Ordering::SeqCst);
                unsafe { inner.suspend(Suspend::Park(3)) };
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            64 * 1024,
            suspender,
        )
        .unwrap();

        assert!(matches!(ctx.resume(), Resumed::Suspended(Suspend::Yield)));
        assert_eq!(steps.load(Ordering::SeqCst), 1);
        assert!(matches!(ctx.resume(), Resumed::Suspended(Suspend::Park(3))));
        assert!(matches!(ctx.resume(), Resumed::Finished(Ok(()))));
        assert_eq!(steps.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn captures_panics_as_outcome() {
        let suspender = Arc::new(Suspender::new());
        let mut ctx =
            ExecutionContext::new(Box::new(|| panic!("task blew up")), 64 * 1024, suspender)
                .unwrap();

        match ctx.resume() {
            Resumed::Finished(Err(panic)) => assert_eq!(panic.message(), Some("task blew up")),
            _ => panic!("expected a captured panic"),
        }
    }

    #[test]
    fn dropping_a_suspended_context_does_not_run_it() {
        let suspender = Arc::new(Suspender::new());
        let finished = Arc::new(AtomicUsize::new(0));

        let inner = suspender.clone();
        let flag = finished.clone();
        let mut ctx = ExecutionContext::new(
            Box::new(move || {
                unsafe { inner.suspend(Suspend::Yield) };
                flag.fetch_add(1, Ordering::SeqCst);
            }),
            64 * 1024,
            suspender,
        )
        .unwrap();

        assert!(matches!(ctx.resume(), Resumed::Suspended(Suspend::Yield)));
        drop(ctx);
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }
}
