//! Fiber runtime.
//!
//! - [`Scheduler`]: owns the run queues, the worker threads and the
//!   reactor.
//! - [`fiber`]: fiber handles, attributes and the per-fiber state machine.
//! - `queue`: the global queue and the workers' private queues.
//! - `executor`: the scheduler core and the worker loop.
//! - `context`: thread-local "which worker / which fiber am I" lookups.

mod executor;
mod queue;
mod scheduler;

pub(crate) mod builder;
pub(crate) mod context;

pub mod fiber;

pub use builder::{DEFAULT_STACK_SIZE, SchedulerBuilder};
pub use scheduler::Scheduler;
