//! # Filament
//!
//! **Filament** is a user-space fiber runtime. Fibers are lightweight
//! threads with their own stacks, multiplexed over a small pool of OS
//! worker threads. A fiber that sleeps, waits for a descriptor or joins
//! another fiber suspends only itself; its worker keeps running other
//! fibers.
//!
//! - A [`Scheduler`] owns a global run queue, one private run queue per
//!   worker and a [`Reactor`] for timers and I/O readiness
//! - A [`Fiber`] handle must be joined or detached before it is dropped
//! - **Free** fibers may run on any worker; **pinned** fibers stay on one
//!   worker for their whole life (see [`fiber::Policy`])
//! - [`this_fiber`] suspends and inspects the calling fiber
//! - [`io`] waits for descriptor readiness from inside a fiber
//! - `#[filament::main]` and `#[filament::test]` run a function body as a
//!   fiber on a fresh scheduler
//!
//! ## Quick Start
//!
//! ```no_run
//! use filament::{Fiber, Scheduler, this_fiber};
//! use std::time::Duration;
//!
//! fn main() -> filament::Result<()> {
//!     let scheduler = Scheduler::new()?;
//!
//!     let mut fiber = Fiber::spawn_in(&scheduler, || {
//!         this_fiber::sleep_for(Duration::from_millis(100)).unwrap();
//!         println!("fiber {} done", this_fiber::id());
//!     })?;
//!
//!     scheduler.start(4)?;
//!     fiber.join()?;
//!     scheduler.join()
//! }
//! ```
//!
//! ## Modules
//!
//! - [`fiber`]: Fiber handles, builder, attributes and ids
//! - [`this_fiber`]: Yield, sleep and naming of the calling fiber
//! - [`io`]: Descriptor readiness waits
//! - [`reactor`]: Timer and readiness registrations for custom suspension
//!   points

mod error;
mod runtime;
mod utils;

pub mod io;
pub mod reactor;
pub mod this_fiber;

pub use error::{Error, FiberPanic, InvalidState, Result};
pub use reactor::Reactor;
pub use runtime::fiber::{self, Fiber, FiberId};
pub use runtime::{DEFAULT_STACK_SIZE, Scheduler, SchedulerBuilder};

pub use filament_macros::{main, test};
