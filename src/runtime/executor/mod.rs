//! Scheduler internals: shared core state and the worker threads that
//! run fibers.

pub(crate) mod core;
pub(crate) mod worker;
