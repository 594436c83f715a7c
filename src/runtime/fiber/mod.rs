//! Fibers: user-space threads multiplexed over a scheduler's workers.
//!
//! A [`Fiber`] is an owning handle. The fiber itself is a `FiberCore`
//! holding its lifecycle state, its execution context (a coroutine with
//! its own stack) and the routing metadata the scheduler needs to find a
//! run queue for it.

mod builder;
mod core;
pub(crate) mod execution;
mod handle;
mod id;
pub(crate) mod state;
mod waker;

pub(crate) use self::core::FiberCore;

pub use builder::{Attributes, Builder, Policy};
pub use handle::Fiber;
pub use id::FiberId;
pub use state::FiberState;
