use crate::error::Result;
use crate::reactor::Reactor;
use crate::runtime::builder::SchedulerBuilder;
use crate::runtime::executor::core::SchedulerCore;

use parking_lot::{Mutex, const_mutex};
use std::fmt;
use std::sync::Arc;

/// The lazily created process-wide scheduler.
static INSTANCE: Mutex<Option<Scheduler>> = const_mutex(None);

/// Handle to a fiber scheduler.
///
/// A scheduler owns a global run queue, one private run queue per worker
/// thread, and a [`Reactor`]. Handles are cheap to clone and all refer to
/// the same scheduler.
///
/// Fibers may be spawned before [`start`](Scheduler::start); they run once
/// workers exist. [`join`](Scheduler::join) waits for every fiber to
/// finish, stops the workers and leaves the scheduler ready to be started
/// again. Dropping the last handle does not stop running workers; join the
/// scheduler first.
///
/// ```no_run
/// use filament::{Fiber, Scheduler};
///
/// let scheduler = Scheduler::new()?;
/// let mut fiber = Fiber::spawn_in(&scheduler, || println!("hello from a fiber"))?;
///
/// scheduler.start(4)?;
/// fiber.join()?;
/// scheduler.join()?;
/// # Ok::<(), filament::Error>(())
/// ```
#[derive(Clone)]
pub struct Scheduler {
    pub(crate) core: Arc<SchedulerCore>,
}

impl Scheduler {
    /// Creates a stopped scheduler with the default configuration.
    pub fn new() -> Result<Scheduler> {
        SchedulerBuilder::new().build()
    }

    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    pub(crate) fn from_core(core: Arc<SchedulerCore>) -> Self {
        Self { core }
    }

    /// The scheduler's reactor. Every call returns the same reactor.
    pub fn reactor(&self) -> &Reactor {
        self.core.reactor()
    }

    /// Starts `workers` worker threads.
    ///
    /// Fails with [`InvalidState::AlreadyStarted`] if the scheduler is
    /// running and with [`InvalidState::NoWorkers`] if `workers` is zero.
    ///
    /// [`InvalidState::AlreadyStarted`]: crate::InvalidState::AlreadyStarted
    /// [`InvalidState::NoWorkers`]: crate::InvalidState::NoWorkers
    pub fn start(&self, workers: usize) -> Result<()> {
        self.core.start(workers)
    }

    /// Waits until every fiber has finished, then stops and joins all
    /// worker threads.
    ///
    /// Fibers may keep spawning fibers while the scheduler drains. Joining
    /// a scheduler that is not running returns immediately. Fails with
    /// [`InvalidState::JoinFromWorker`] when called on one of this
    /// scheduler's own worker threads.
    ///
    /// [`InvalidState::JoinFromWorker`]: crate::InvalidState::JoinFromWorker
    pub fn join(&self) -> Result<()> {
        self.core.join()
    }

    /// Adds `workers` worker threads to a running scheduler.
    pub fn add_worker_thread(&self, workers: usize) -> Result<()> {
        self.core.add_workers(workers)
    }

    pub fn is_started(&self) -> bool {
        self.core.is_started()
    }

    /// Worker threads currently running their loop.
    pub fn worker_count(&self) -> usize {
        self.core.active_workers()
    }

    /// Fibers spawned on this scheduler that have not finished yet.
    pub fn live_fibers(&self) -> usize {
        self.core.live_fibers()
    }

    /// Whether two handles refer to the same scheduler.
    pub fn ptr_eq(&self, other: &Scheduler) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }

    /// The process-wide scheduler, created on first use.
    ///
    /// It is created stopped; start it before joining fibers spawned on it.
    pub fn get_instance() -> Result<Scheduler> {
        let mut instance = INSTANCE.lock();

        if let Some(scheduler) = instance.as_ref() {
            return Ok(scheduler.clone());
        }

        let scheduler = Scheduler::new()?;
        *instance = Some(scheduler.clone());
        tracing::debug!("created the process-wide scheduler");
        Ok(scheduler)
    }

    /// Forgets the process-wide scheduler. The next
    /// [`get_instance`](Scheduler::get_instance) creates a fresh one.
    ///
    /// Outstanding handles keep the old scheduler alive; it is not
    /// stopped.
    pub fn reset_instance() {
        INSTANCE.lock().take();
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("started", &self.is_started())
            .field("workers", &self.worker_count())
            .field("live_fibers", &self.live_fibers())
            .finish_non_exhaustive()
    }
}
