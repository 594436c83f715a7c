use crate::error::{Error, InvalidState, Result, fatal};
use crate::runtime::context;
use crate::runtime::fiber::{Attributes, Builder, FiberCore, FiberId, FiberState};
use crate::runtime::scheduler::Scheduler;

use std::fmt;
use std::mem;
use std::sync::Arc;
use std::thread;

/// Owning handle to a fiber.
///
/// A handle is *joinable* while it refers to a fiber that has been neither
/// joined nor detached. A joinable handle must be consumed with
/// [`join`](Fiber::join), [`join_propagate`](Fiber::join_propagate) or
/// [`detach`](Fiber::detach) before it is dropped; dropping it joinable
/// terminates the process.
///
/// Handles move, never copy. [`Default`] gives an empty, non-joinable
/// handle, which is what a moved-from handle looks like after
/// [`std::mem::take`].
#[derive(Default)]
pub struct Fiber {
    core: Option<Arc<FiberCore>>,
}

impl Fiber {
    pub(crate) fn from_core(core: Arc<FiberCore>) -> Self {
        Self { core: Some(core) }
    }

    /// Spawns a free fiber on the default scheduler.
    ///
    /// The default scheduler is the calling fiber's own, or the
    /// process-wide instance from a plain thread.
    pub fn new<F>(f: F) -> Result<Fiber>
    where
        F: FnOnce() + Send + 'static,
    {
        Builder::new().spawn(f)
    }

    /// Spawns a fiber with the given attributes on the default scheduler.
    pub fn with_attributes<F>(attributes: Attributes, f: F) -> Result<Fiber>
    where
        F: FnOnce() + Send + 'static,
    {
        Builder::new().attributes(attributes).spawn(f)
    }

    /// Spawns a free fiber on `scheduler`.
    pub fn spawn_in<F>(scheduler: &Scheduler, f: F) -> Result<Fiber>
    where
        F: FnOnce() + Send + 'static,
    {
        Builder::new().scheduler(scheduler).spawn(f)
    }

    pub fn builder() -> Builder {
        Builder::new()
    }

    pub fn joinable(&self) -> bool {
        self.core.is_some()
    }

    /// Identity of the fiber, or [`FiberId::NONE`] for a non-joinable
    /// handle.
    pub fn id(&self) -> FiberId {
        self.core
            .as_ref()
            .map_or(FiberId::NONE, |core| core.id())
    }

    /// Current lifecycle state, or `None` for a non-joinable handle.
    pub fn state(&self) -> Option<FiberState> {
        self.core.as_ref().map(|core| core.state())
    }

    /// Waits for the fiber to finish. A failure of its task is discarded.
    ///
    /// From inside a fiber this suspends only the calling fiber; from a
    /// plain thread it blocks the thread. The handle is non-joinable
    /// afterwards. On error it is left untouched.
    ///
    /// A free fiber may come back from this call on another thread; see
    /// [`Policy::Free`](crate::fiber::Policy::Free).
    pub fn join(&mut self) -> Result<()> {
        self.wait(false)
    }

    /// Like [`join`](Fiber::join), but a failure of the fiber's task is
    /// returned as [`Error::UserFailure`].
    pub fn join_propagate(&mut self) -> Result<()> {
        self.wait(true)
    }

    fn wait(&mut self, propagate: bool) -> Result<()> {
        let Some(core) = self.core.as_ref() else {
            return Err(InvalidState::NotJoinable.into());
        };

        let outcome = match context::current_fiber() {
            Some(current) if Arc::ptr_eq(&current, core) => {
                return Err(InvalidState::JoinSelf.into());
            }
            Some(current) => core.join_from(&current),
            None => core.join_blocking(),
        };
        self.core = None;

        match outcome {
            Some(Err(panic)) if propagate => Err(Error::UserFailure(panic)),
            _ => Ok(()),
        }
    }

    /// Lets the fiber run to completion on its own.
    ///
    /// Its outcome, including any failure, is discarded.
    pub fn detach(&mut self) -> Result<()> {
        let core = self.core.take().ok_or(InvalidState::NotJoinable)?;
        core.detach();
        Ok(())
    }

    /// Exchanges the fibers referred to by two handles.
    pub fn swap(&mut self, other: &mut Fiber) {
        mem::swap(self, other);
    }

    pub fn name(&self) -> Result<String> {
        let core = self.core.as_ref().ok_or(InvalidState::NotJoinable)?;
        Ok(core.name())
    }

    pub fn set_name(&self, name: impl Into<String>) -> Result<()> {
        let core = self.core.as_ref().ok_or(InvalidState::NotJoinable)?;
        core.set_name(name.into());
        Ok(())
    }

    /// Number of hardware threads available to the process, or `1` when
    /// it cannot be determined.
    pub fn hardware_concurrency() -> usize {
        thread::available_parallelism().map_or(1, |n| n.get())
    }
}

impl Drop for Fiber {
    fn drop(&mut self) {
        if let Some(core) = &self.core {
            tracing::error!(fiber = %core.id(), "joinable fiber handle dropped");
            fatal("a joinable fiber handle was dropped without join or detach");
        }
    }
}

impl fmt::Debug for Fiber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fiber")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}
