use crate::error::{InvalidState, Result, fatal};
use crate::reactor::Reactor;
use crate::runtime::builder::Config;
use crate::runtime::context;
use crate::runtime::executor::worker::Worker;
use crate::runtime::fiber::execution::{ExecutionContext, FiberTask, Suspender};
use crate::runtime::fiber::{FiberCore, Policy};
use crate::runtime::queue::injector::Injector;
use crate::runtime::queue::local::LocalQueue;

use parking_lot::{Mutex, RwLock};
use std::io;
use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

/// Per-fiber overrides of the scheduler configuration.
pub(crate) struct SpawnOptions {
    pub(crate) name: Option<String>,
    pub(crate) policy: Policy,
    pub(crate) stack_size: Option<usize>,
}

/// Shared state of a scheduler.
///
/// Owns the run queues, the reactor and the worker threads. Workers and
/// fibers each hold an `Arc` to it.
pub(crate) struct SchedulerCore {
    config: Config,

    reactor: Reactor,

    /// Global run queue for free fibers and not-yet-bound pinned ones.
    injector: Injector,

    /// Private queue of each worker, indexed by worker index.
    locals: RwLock<Vec<Arc<LocalQueue>>>,

    threads: Mutex<Vec<JoinHandle<()>>>,

    /// Serializes concurrent `join` calls.
    join_lock: Mutex<()>,

    started: AtomicBool,

    /// Set by `join`: workers exit once no fiber is left.
    draining: AtomicBool,

    /// Fibers created and not yet finished.
    live: AtomicUsize,

    /// Worker threads currently in their loop.
    active: AtomicUsize,
}

impl SchedulerCore {
    pub(crate) fn new(config: Config) -> io::Result<Self> {
        Ok(Self {
            config,
            reactor: Reactor::new()?,
            injector: Injector::new(),
            locals: RwLock::new(Vec::new()),
            threads: Mutex::new(Vec::new()),
            join_lock: Mutex::new(()),
            started: AtomicBool::new(false),
            draining: AtomicBool::new(false),
            live: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
        })
    }

    pub(crate) fn reactor(&self) -> &Reactor {
        &self.reactor
    }

    pub(crate) fn injector(&self) -> &Injector {
        &self.injector
    }

    pub(crate) fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub(crate) fn live_fibers(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    pub(crate) fn active_workers(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Creates a fiber running `task` and queues it.
    pub(crate) fn spawn(
        self: &Arc<Self>,
        task: FiberTask,
        options: SpawnOptions,
    ) -> io::Result<Arc<FiberCore>> {
        let stack_size = options.stack_size.unwrap_or(self.config.stack_size);
        let suspender = Arc::new(Suspender::new());
        let ctx = ExecutionContext::new(task, stack_size, suspender.clone())?;

        // A creator running on one of our workers shares its worker with
        // the pinned child from now on, free creator included, so the two
        // never run at the same time.
        let worker = match options.policy {
            Policy::Pinned => context::current_on(self).map(|(parent, index)| parent.bind(index)),
            Policy::Free => None,
        };

        let fiber = Arc::new(FiberCore::new(
            options.name,
            options.policy,
            worker,
            self,
            suspender,
            ctx,
        ));

        self.live.fetch_add(1, Ordering::AcqRel);
        tracing::trace!(
            fiber = %fiber.id(),
            policy = ?fiber.policy(),
            worker = ?worker,
            "fiber spawned"
        );

        fiber.submit();
        Ok(fiber)
    }

    /// Puts a runnable fiber on the queue its routing metadata selects.
    pub(crate) fn schedule(&self, fiber: Arc<FiberCore>) {
        match fiber.bound_worker() {
            Some(index) => match self.locals.read().get(index) {
                Some(local) => local.push(fiber),
                None => fatal("pinned fiber bound to a worker that does not exist"),
            },
            None => self.injector.push(fiber),
        }

        self.notify();
    }

    /// Wakes parked workers, including the one blocked in the reactor.
    pub(crate) fn notify(&self) {
        self.injector.notify();
        self.reactor.unpark();
    }

    pub(crate) fn should_exit(&self) -> bool {
        self.draining.load(Ordering::SeqCst) && self.live.load(Ordering::SeqCst) == 0
    }

    pub(crate) fn fiber_finished(&self) {
        // Pairs with the store in `join`: one side always sees the other,
        // so the last fiber and the drain request cannot both miss the wake.
        let left = self.live.fetch_sub(1, Ordering::SeqCst) - 1;

        if left == 0 && self.draining.load(Ordering::SeqCst) {
            self.notify();
        }
    }

    pub(crate) fn worker_exited(&self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn start(self: &Arc<Self>, workers: usize) -> Result<()> {
        if workers == 0 {
            return Err(InvalidState::NoWorkers.into());
        }

        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(InvalidState::AlreadyStarted.into());
        }

        tracing::debug!(workers, "starting scheduler");

        if let Err(err) = self.spawn_workers(workers) {
            // Roll back whatever did start.
            let _ = self.join();
            return Err(err);
        }

        Ok(())
    }

    pub(crate) fn add_workers(self: &Arc<Self>, workers: usize) -> Result<()> {
        if workers == 0 {
            return Err(InvalidState::NoWorkers.into());
        }

        if !self.is_started() {
            return Err(InvalidState::NotStarted.into());
        }

        tracing::debug!(workers, "adding worker threads");
        self.spawn_workers(workers)
    }

    fn spawn_workers(self: &Arc<Self>, count: usize) -> Result<()> {
        for _ in 0..count {
            let local = Arc::new(LocalQueue::new());

            let index = {
                let mut locals = self.locals.write();
                locals.push(local.clone());
                locals.len() - 1
            };

            let worker = Worker::new(self.clone(), index, local);
            self.active.fetch_add(1, Ordering::AcqRel);

            let spawned = thread::Builder::new()
                .name(format!("{}-{}", self.config.thread_name, index))
                .spawn(move || worker.run());

            match spawned {
                Ok(handle) => self.threads.lock().push(handle),
                Err(err) => {
                    self.active.fetch_sub(1, Ordering::AcqRel);
                    tracing::error!(error = %err, index, "failed to spawn worker thread");
                    return Err(err.into());
                }
            }
        }

        Ok(())
    }

    /// Drains every fiber, then stops and joins all worker threads.
    ///
    /// Afterwards the scheduler is back in its initial state and may be
    /// started again.
    pub(crate) fn join(&self) -> Result<()> {
        if context::is_worker_of(self) {
            return Err(InvalidState::JoinFromWorker.into());
        }

        let _guard = self.join_lock.lock();

        if !self.is_started() {
            return Ok(());
        }

        tracing::debug!(live = self.live_fibers(), "draining scheduler");
        self.draining.store(true, Ordering::SeqCst);
        self.notify();

        loop {
            let threads = mem::take(&mut *self.threads.lock());
            if threads.is_empty() {
                break;
            }

            for handle in threads {
                if handle.join().is_err() {
                    tracing::error!("worker thread panicked");
                }
            }
        }

        self.locals.write().clear();
        self.draining.store(false, Ordering::Release);
        self.started.store(false, Ordering::Release);

        tracing::debug!("scheduler joined");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core() -> Arc<SchedulerCore> {
        let config = Config {
            stack_size: 64 * 1024,
            thread_name: "test-worker".to_owned(),
        };
        Arc::new(SchedulerCore::new(config).unwrap())
    }

    fn options(policy: Policy) -> SpawnOptions {
        SpawnOptions {
            name: None,
            policy,
            stack_size: None,
        }
    }

    #[test]
    fn fibers_wait_in_global_queue_before_start() {
        let core = core();

        let free = core.spawn(Box::new(|| {}), options(Policy::Free)).unwrap();
        let pinned = core.spawn(Box::new(|| {}), options(Policy::Pinned)).unwrap();

        assert_eq!(core.live_fibers(), 2);
        assert_eq!(pinned.bound_worker(), None);

        assert!(Arc::ptr_eq(&core.injector().pop().unwrap(), &free));
        assert!(Arc::ptr_eq(&core.injector().pop().unwrap(), &pinned));
        assert!(core.injector().pop().is_none());
    }

    #[test]
    fn local_queue_is_fifo() {
        let core = core();
        let local = LocalQueue::new();

        let fibers: Vec<_> = (0..3)
            .map(|_| core.spawn(Box::new(|| {}), options(Policy::Free)).unwrap())
            .collect();
        while core.injector().pop().is_some() {}

        for fiber in &fibers {
            local.push(fiber.clone());
        }
        assert_eq!(local.len(), 3);

        for fiber in &fibers {
            assert!(Arc::ptr_eq(&local.pop().unwrap(), fiber));
        }
        assert!(local.is_empty());
    }

    #[test]
    fn pinned_binding_is_sticky() {
        let core = core();
        let fiber = core.spawn(Box::new(|| {}), options(Policy::Pinned)).unwrap();

        assert_eq!(fiber.bind(2), 2);
        assert_eq!(fiber.bind(0), 2);
        assert_eq!(fiber.bound_worker(), Some(2));
    }

    #[test]
    fn lifecycle_errors() {
        let core = core();

        let err = core.add_workers(1).unwrap_err();
        assert_eq!(err.invalid_state(), Some(InvalidState::NotStarted));

        let err = core.start(0).unwrap_err();
        assert_eq!(err.invalid_state(), Some(InvalidState::NoWorkers));

        core.start(1).unwrap();
        let err = core.add_workers(0).unwrap_err();
        assert_eq!(err.invalid_state(), Some(InvalidState::NoWorkers));

        core.join().unwrap();
        assert!(!core.is_started());
    }

    #[test]
    fn unstarted_scheduler_frees_queued_fibers() {
        let core = core();
        let free = core.spawn(Box::new(|| {}), options(Policy::Free)).unwrap();
        let pinned = core.spawn(Box::new(|| {}), options(Policy::Pinned)).unwrap();

        let weak_core = Arc::downgrade(&core);
        let weak_free = Arc::downgrade(&free);
        let weak_pinned = Arc::downgrade(&pinned);
        drop(free);
        drop(pinned);
        drop(core);

        assert!(weak_core.upgrade().is_none());
        assert!(weak_free.upgrade().is_none());
        assert!(weak_pinned.upgrade().is_none());
    }
}
