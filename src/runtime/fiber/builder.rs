use crate::error::Result;
use crate::runtime::context;
use crate::runtime::executor::core::SpawnOptions;
use crate::runtime::fiber::Fiber;
use crate::runtime::scheduler::Scheduler;

/// Scheduling policy of a fiber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Policy {
    /// May run on any worker of its scheduler, and may move between
    /// workers across suspensions.
    ///
    /// # Thread affinity
    ///
    /// A free fiber can resume on a different OS thread after any
    /// suspension point ([`yield_now`], [`sleep_for`], [`sleep_until`],
    /// [`io::wait`], [`Fiber::join`]). Values that must stay on one
    /// thread, such as an `Rc`, a `std::sync::MutexGuard` or a reference
    /// into a thread-local, must not be held across those calls. Use
    /// [`Policy::Pinned`] for code that needs them. A free fiber that
    /// spawns a pinned fiber is itself bound to its current worker from
    /// then on.
    ///
    /// [`yield_now`]: crate::this_fiber::yield_now
    /// [`sleep_for`]: crate::this_fiber::sleep_for
    /// [`sleep_until`]: crate::this_fiber::sleep_until
    /// [`io::wait`]: crate::io::wait
    /// [`Fiber::join`]: crate::Fiber::join
    #[default]
    Free,

    /// Runs on a single worker for its whole life.
    ///
    /// Spawned from a fiber running on the target scheduler, it sticks
    /// to that fiber's worker, and the creator is bound there too, so the
    /// two never run at the same time. Otherwise it sticks to whichever
    /// worker first runs it.
    Pinned,
}

/// Creation attributes of a fiber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Attributes {
    pub policy: Policy,
}

impl Attributes {
    pub fn new(policy: Policy) -> Self {
        Self { policy }
    }

    /// Attributes of a fiber pinned to its parent's worker.
    pub fn stick_with_parent() -> Self {
        Self::new(Policy::Pinned)
    }
}

/// Configures and spawns a fiber.
///
/// ```no_run
/// use filament::fiber::{Builder, Policy};
///
/// let mut fiber = Builder::new()
///     .name("flusher")
///     .policy(Policy::Pinned)
///     .stack_size(512 * 1024)
///     .spawn(|| println!("flushing"))?;
///
/// fiber.join()?;
/// # Ok::<(), filament::Error>(())
/// ```
#[derive(Debug, Default)]
#[must_use = "a builder does nothing until `spawn` is called"]
pub struct Builder {
    name: Option<String>,
    attributes: Attributes,
    stack_size: Option<usize>,
    scheduler: Option<Scheduler>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn policy(mut self, policy: Policy) -> Self {
        self.attributes.policy = policy;
        self
    }

    pub fn attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Overrides the scheduler's default stack size for this fiber.
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Spawns onto `scheduler` instead of the default target.
    ///
    /// The default target is the scheduler of the calling fiber, or the
    /// process-wide instance when called from a plain thread.
    pub fn scheduler(mut self, scheduler: &Scheduler) -> Self {
        self.scheduler = Some(scheduler.clone());
        self
    }

    /// Creates the fiber and makes it runnable.
    ///
    /// The fiber runs once its scheduler has been started. Fails only when
    /// the fiber stack cannot be allocated.
    pub fn spawn<F>(self, f: F) -> Result<Fiber>
    where
        F: FnOnce() + Send + 'static,
    {
        let scheduler = match self.scheduler {
            Some(scheduler) => scheduler,
            None => match context::current_fiber() {
                Some(current) => Scheduler::from_core(current.scheduler()),
                None => Scheduler::get_instance()?,
            },
        };

        let options = SpawnOptions {
            name: self.name,
            policy: self.attributes.policy,
            stack_size: self.stack_size,
        };

        let core = scheduler.core.spawn(Box::new(f), options)?;
        Ok(Fiber::from_core(core))
    }
}
