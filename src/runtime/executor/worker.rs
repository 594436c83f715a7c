use crate::runtime::context;
use crate::runtime::executor::core::SchedulerCore;
use crate::runtime::fiber::{FiberCore, Policy};
use crate::runtime::queue::local::LocalQueue;

use std::sync::Arc;

/// A worker thread of a scheduler.
///
/// Each pass of the loop:
/// 1. runs the pinned fibers already waiting in its private queue,
/// 2. lets the reactor fire expired timers and ready I/O,
/// 3. takes one fiber from the global queue,
/// 4. exits if the scheduler is draining and no fiber is left,
/// 5. otherwise parks, in the reactor if no other worker is in it.
pub(crate) struct Worker {
    core: Arc<SchedulerCore>,
    index: usize,
    local: Arc<LocalQueue>,
}

impl Worker {
    pub(crate) fn new(core: Arc<SchedulerCore>, index: usize, local: Arc<LocalQueue>) -> Self {
        Self { core, index, local }
    }

    pub(crate) fn run(self) {
        context::enter_worker(self.core.clone(), self.index, || {
            tracing::debug!(worker = self.index, "worker started");
            self.run_loop();
            tracing::debug!(worker = self.index, "worker exited");
        });

        self.core.worker_exited();
    }

    fn run_loop(&self) {
        loop {
            let mut ran = false;

            // Only what is queued now, so that fibers yielding back onto
            // this queue cannot starve the global queue.
            for _ in 0..self.local.len() {
                let Some(fiber) = self.local.pop() else {
                    break;
                };
                self.dispatch(fiber);
                ran = true;
            }

            self.core.reactor().poll_ready();

            if let Some(fiber) = self.core.injector().pop() {
                self.dispatch(fiber);
                ran = true;
            }

            if ran {
                continue;
            }

            if self.core.should_exit() {
                break;
            }

            self.park();
        }
    }

    fn dispatch(&self, fiber: Arc<FiberCore>) {
        if fiber.policy() == Policy::Pinned {
            let owner = fiber.bind(self.index);
            if owner != self.index {
                self.core.schedule(fiber);
                return;
            }
        }

        fiber.run();
    }

    fn has_work(&self) -> bool {
        !self.local.is_empty() || !self.core.injector().is_empty() || self.core.should_exit()
    }

    fn park(&self) {
        let has_work = || self.has_work();

        if self.core.reactor().park(None, has_work) {
            // Hand the driver slot to an idle worker while this one runs
            // whatever the reactor woke.
            self.core.injector().notify_one();
        } else {
            // Stay awake while the driver slot is free so the reactor is
            // never left undriven.
            let reactor = self.core.reactor();
            self.core.injector().park(|| has_work() || !reactor.is_driven());
        }
    }
}
