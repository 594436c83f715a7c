//! Operations on the calling fiber.
//!
//! Everything here except [`id`] and [`is_a_fiber`] requires the caller to
//! be running inside a fiber and fails with [`InvalidState::NotAFiber`]
//! otherwise.
//!
//! ```no_run
//! use filament::{Fiber, this_fiber};
//! use std::time::Duration;
//!
//! let mut fiber = Fiber::new(|| {
//!     this_fiber::set_name("ticker").unwrap();
//!     for _ in 0..3 {
//!         this_fiber::sleep_for(Duration::from_millis(10)).unwrap();
//!     }
//! })?;
//! fiber.join()?;
//! # Ok::<(), filament::Error>(())
//! ```

use crate::error::{InvalidState, Result};
use crate::reactor::Reactor;
use crate::runtime::Scheduler;
use crate::runtime::context;
use crate::runtime::fiber::state::SUSPENDED_TIMER;
use crate::runtime::fiber::{FiberCore, FiberId};

use std::sync::Arc;
use std::time::{Duration, Instant};

/// Stand-in deadline for durations that overflow `Instant`.
const FOREVER: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

pub(crate) fn current() -> Result<Arc<FiberCore>> {
    context::current_fiber().ok_or_else(|| InvalidState::NotAFiber.into())
}

/// Id of the calling fiber, or [`FiberId::NONE`] outside a fiber.
pub fn id() -> FiberId {
    context::current_fiber().map_or(FiberId::NONE, |fiber| fiber.id())
}

pub fn is_a_fiber() -> bool {
    context::current_fiber().is_some()
}

/// Gives the other runnable fibers a turn.
///
/// The calling fiber goes to the back of its run queue and continues once
/// a worker picks it up again. A free fiber may continue on another OS
/// thread; see [`Policy::Free`](crate::fiber::Policy::Free) for what must
/// not be held across this call.
pub fn yield_now() -> Result<()> {
    current()?.yield_now();
    Ok(())
}

/// Suspends the calling fiber for at least `duration`.
///
/// A zero duration returns immediately. A free fiber may wake up on
/// another OS thread, see [`Policy::Free`](crate::fiber::Policy::Free).
pub fn sleep_for(duration: Duration) -> Result<()> {
    let fiber = current()?;
    let now = Instant::now();
    let deadline = now
        .checked_add(duration)
        .unwrap_or_else(|| now + FOREVER);

    sleep(&fiber, deadline);
    Ok(())
}

/// Suspends the calling fiber until `deadline` has passed.
///
/// A deadline that is not in the future returns immediately. A free fiber
/// may wake up on another OS thread, see
/// [`Policy::Free`](crate::fiber::Policy::Free).
pub fn sleep_until(deadline: Instant) -> Result<()> {
    let fiber = current()?;
    sleep(&fiber, deadline);
    Ok(())
}

fn sleep(fiber: &Arc<FiberCore>, deadline: Instant) {
    if Instant::now() >= deadline {
        return;
    }

    let timer = fiber
        .scheduler()
        .reactor()
        .register_timer(deadline, fiber.waker());

    // Unrelated wake-ups (a join waiter firing late) are not the timer.
    while Instant::now() < deadline {
        fiber.park(SUSPENDED_TIMER);
    }

    timer.cancel();
}

/// Name of the calling fiber. Empty until set.
pub fn name() -> Result<String> {
    Ok(current()?.name())
}

pub fn set_name(name: impl Into<String>) -> Result<()> {
    current()?.set_name(name.into());
    Ok(())
}

/// Reactor of the scheduler the calling fiber belongs to.
pub fn reactor() -> Result<Reactor> {
    Ok(current()?.scheduler().reactor().clone())
}

/// Scheduler the calling fiber belongs to.
pub fn scheduler() -> Result<Scheduler> {
    Ok(Scheduler::from_core(current()?.scheduler()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outside_a_fiber() {
        assert!(!is_a_fiber());
        assert_eq!(id(), FiberId::NONE);

        let not_a_fiber = Some(InvalidState::NotAFiber);
        assert_eq!(yield_now().unwrap_err().invalid_state(), not_a_fiber);
        assert_eq!(
            sleep_for(Duration::ZERO).unwrap_err().invalid_state(),
            not_a_fiber
        );
        assert_eq!(
            sleep_until(Instant::now()).unwrap_err().invalid_state(),
            not_a_fiber
        );
        assert_eq!(name().unwrap_err().invalid_state(), not_a_fiber);
        assert_eq!(set_name("x").unwrap_err().invalid_state(), not_a_fiber);
        assert!(reactor().is_err());
        assert!(scheduler().is_err());
    }
}
