use crate::error::Result;
use crate::runtime::executor::core::SchedulerCore;
use crate::runtime::scheduler::Scheduler;

use std::sync::Arc;

/// Stack size given to fibers that do not ask for one.
pub const DEFAULT_STACK_SIZE: usize = 256 * 1024;

const DEFAULT_THREAD_NAME: &str = "filament-worker";

/// Scheduler-wide settings.
#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub(crate) stack_size: usize,

    /// Worker threads are named `{thread_name}-{index}`.
    pub(crate) thread_name: String,
}

/// Builder for configuring and creating a [`Scheduler`].
///
/// The worker count is not part of the configuration; it is given to
/// [`Scheduler::start`].
///
/// ```no_run
/// use filament::SchedulerBuilder;
///
/// let scheduler = SchedulerBuilder::new()
///     .stack_size(1024 * 1024)
///     .thread_name("io-fibers")
///     .build()?;
///
/// scheduler.start(2)?;
/// scheduler.join()?;
/// # Ok::<(), filament::Error>(())
/// ```
#[derive(Debug)]
pub struct SchedulerBuilder {
    config: Config,
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        Self {
            config: Config {
                stack_size: DEFAULT_STACK_SIZE,
                thread_name: DEFAULT_THREAD_NAME.to_owned(),
            },
        }
    }

    /// Default stack size of fibers spawned on this scheduler.
    ///
    /// Rounded up to whole pages, plus a guard page.
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.config.stack_size = bytes;
        self
    }

    /// Name prefix of the worker threads.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = name.into();
        self
    }

    /// Creates the scheduler, stopped, with its reactor.
    pub fn build(self) -> Result<Scheduler> {
        let core = SchedulerCore::new(self.config)?;
        Ok(Scheduler::from_core(Arc::new(core)))
    }
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
