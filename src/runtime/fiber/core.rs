use crate::error::{FiberPanic, fatal};
use crate::runtime::context;
use crate::runtime::executor::core::SchedulerCore;
use crate::runtime::fiber::execution::{ExecutionContext, Outcome, Resumed, Suspend, Suspender};
use crate::runtime::fiber::state::{self, FiberState};
use crate::runtime::fiber::waker::fiber_waker;
use crate::runtime::fiber::{FiberId, Policy};

use parking_lot::{Condvar, Mutex};
use std::mem;
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::task::Waker;

/// Worker index of a fiber that may run on any worker, or of a pinned
/// fiber not yet bound to one.
const UNBOUND: usize = usize::MAX;

/// Shared state of a fiber.
///
/// Owned jointly by the handle, the run queues, wakers held by the reactor
/// or by joiners, and the worker currently running it. The fiber's memory
/// is released when the last of them lets go.
pub(crate) struct FiberCore {
    id: FiberId,
    name: Mutex<String>,

    /// One of the constants in [`state`].
    state: AtomicU8,

    policy: Policy,

    /// Worker a pinned fiber is bound to, or [`UNBOUND`].
    worker: AtomicUsize,

    /// Weak so that fibers left in the queues of a dropped, never-joined
    /// scheduler do not keep it, and themselves, alive.
    scheduler: Weak<SchedulerCore>,

    suspender: Arc<Suspender>,

    /// Present while the fiber is parked or queued; taken by the worker
    /// that resumes it.
    context: Mutex<Option<ExecutionContext>>,

    completion: Mutex<Completion>,

    /// Signalled once for OS threads blocked in `join`.
    finished: Condvar,
}

#[derive(Default)]
struct Completion {
    done: bool,
    detached: bool,

    /// Taken by the first join.
    outcome: Option<Outcome>,

    /// Fibers suspended in `join` on this fiber.
    waiters: Vec<Waker>,
}

impl FiberCore {
    pub(crate) fn new(
        name: Option<String>,
        policy: Policy,
        worker: Option<usize>,
        scheduler: &Arc<SchedulerCore>,
        suspender: Arc<Suspender>,
        context: ExecutionContext,
    ) -> Self {
        Self {
            id: FiberId::next(),
            name: Mutex::new(name.unwrap_or_default()),
            state: AtomicU8::new(state::CREATED),
            policy,
            worker: AtomicUsize::new(worker.unwrap_or(UNBOUND)),
            scheduler: Arc::downgrade(scheduler),
            suspender,
            context: Mutex::new(Some(context)),
            completion: Mutex::new(Completion::default()),
            finished: Condvar::new(),
        }
    }

    pub(crate) fn id(&self) -> FiberId {
        self.id
    }

    pub(crate) fn name(&self) -> String {
        self.name.lock().clone()
    }

    pub(crate) fn set_name(&self, name: String) {
        *self.name.lock() = name;
    }

    pub(crate) fn state(&self) -> FiberState {
        FiberState::from_raw(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn policy(&self) -> Policy {
        self.policy
    }

    /// The owning scheduler.
    ///
    /// Only for fibers that are running or being spawned: the worker or
    /// the spawner holds the scheduler alive.
    pub(crate) fn scheduler(&self) -> Arc<SchedulerCore> {
        match self.scheduler.upgrade() {
            Some(scheduler) => scheduler,
            None => fatal("a running fiber outlived its scheduler"),
        }
    }

    /// Worker this fiber must run on, if it is bound to one.
    pub(crate) fn bound_worker(&self) -> Option<usize> {
        match self.worker.load(Ordering::Acquire) {
            UNBOUND => None,
            index => Some(index),
        }
    }

    /// Binds a pinned fiber to `index` unless it is bound already.
    ///
    /// Returns the worker it ends up bound to.
    pub(crate) fn bind(&self, index: usize) -> usize {
        match self
            .worker
            .compare_exchange(UNBOUND, index, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => index,
            Err(owner) => owner,
        }
    }

    pub(crate) fn waker(self: &Arc<Self>) -> Waker {
        fiber_waker(self.clone())
    }

    /// Hands a freshly created fiber to its scheduler.
    pub(crate) fn submit(self: &Arc<Self>) {
        if self
            .state
            .compare_exchange(
                state::CREATED,
                state::RUNNABLE,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            fatal("fiber submitted twice");
        }

        self.scheduler().schedule(self.clone());
    }

    /// Makes a suspended fiber runnable again.
    ///
    /// A fiber still running is flagged `NOTIFIED` so that the worker
    /// re-queues it instead of parking it. Wake-ups of runnable or finished
    /// fibers are dropped.
    pub(crate) fn wake(self: &Arc<Self>) {
        let mut current = self.state.load(Ordering::Acquire);

        loop {
            let next = if FiberState::is_suspended_raw(current) {
                state::RUNNABLE
            } else if current == state::RUNNING {
                state::NOTIFIED
            } else {
                return;
            };

            match self
                .state
                .compare_exchange(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) if next == state::RUNNABLE => {
                    // A dropped scheduler can never run the fiber again.
                    if let Some(scheduler) = self.scheduler.upgrade() {
                        scheduler.schedule(self.clone());
                    }
                    return;
                }
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Runs the fiber on the calling worker until it suspends or finishes.
    pub(crate) fn run(self: Arc<Self>) {
        if self
            .state
            .compare_exchange(
                state::RUNNABLE,
                state::RUNNING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            fatal("dispatched a fiber that is not runnable");
        }

        let Some(mut ctx) = self.context.lock().take() else {
            fatal("dispatched a fiber without an execution context");
        };

        match context::enter_fiber(&self, || ctx.resume()) {
            Resumed::Suspended(reason) => {
                *self.context.lock() = Some(ctx);
                self.switched_out(reason);
            }
            Resumed::Finished(outcome) => {
                drop(ctx);
                self.finish(outcome);
            }
        }
    }

    fn switched_out(self: Arc<Self>, reason: Suspend) {
        match reason {
            Suspend::Yield => {
                self.state.store(state::RUNNABLE, Ordering::Release);
                let scheduler = self.scheduler();
                scheduler.schedule(self);
            }
            Suspend::Park(parked) => {
                let result = self.state.compare_exchange(
                    state::RUNNING,
                    parked,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );

                // Woken before it got off the CPU.
                if result.is_err() {
                    self.state.store(state::RUNNABLE, Ordering::Release);
                    let scheduler = self.scheduler();
                    scheduler.schedule(self);
                }
            }
        }
    }

    fn finish(self: Arc<Self>, outcome: Outcome) {
        let waiters = {
            let mut completion = self.completion.lock();

            if completion.detached {
                if let Err(panic) = outcome {
                    discard_failure(self.id, &panic);
                }
            } else {
                completion.outcome = Some(outcome);
            }

            completion.done = true;
            self.state.store(state::FINISHED, Ordering::Release);
            self.finished.notify_all();

            mem::take(&mut completion.waiters)
        };

        tracing::trace!(fiber = %self.id, "fiber finished");

        for waiter in waiters {
            waiter.wake();
        }

        self.scheduler().fiber_finished();
    }

    /// Switches back to the worker. The fiber stays runnable.
    ///
    /// Only the fiber itself may call this, see [`context::current_fiber`].
    pub(crate) fn yield_now(&self) {
        // SAFETY: called by the running fiber on its own stack.
        unsafe { self.suspender.suspend(Suspend::Yield) };
    }

    /// Switches back to the worker and stays off the run queues in the
    /// `parked` state until woken.
    ///
    /// Only the fiber itself may call this, see [`context::current_fiber`].
    pub(crate) fn park(&self, parked: u8) {
        // SAFETY: called by the running fiber on its own stack.
        unsafe { self.suspender.suspend(Suspend::Park(parked)) };
    }

    /// Blocks the calling OS thread until the fiber finishes.
    pub(crate) fn join_blocking(&self) -> Option<Outcome> {
        let mut completion = self.completion.lock();
        while !completion.done {
            self.finished.wait(&mut completion);
        }
        completion.outcome.take()
    }

    /// Suspends `joiner` until the fiber finishes.
    pub(crate) fn join_from(&self, joiner: &Arc<FiberCore>) -> Option<Outcome> {
        loop {
            {
                let mut completion = self.completion.lock();
                if completion.done {
                    return completion.outcome.take();
                }
                completion.waiters.push(joiner.waker());
            }

            joiner.park(state::SUSPENDED_JOIN);
        }
    }

    /// Gives up on the outcome. A failure that is already recorded, or
    /// recorded later, is logged and dropped.
    pub(crate) fn detach(&self) {
        let mut completion = self.completion.lock();
        completion.detached = true;

        if let Some(Err(panic)) = completion.outcome.take() {
            discard_failure(self.id, &panic);
        }
    }
}

fn discard_failure(id: FiberId, panic: &FiberPanic) {
    tracing::warn!(fiber = %id, %panic, "detached fiber failed; failure discarded");
}
