//! Run queues.
//!
//! - [`injector`]: the global queue shared by every worker; free fibers
//!   live here, and idle workers without the reactor park on it.
//! - [`local`]: one private queue per worker; pinned fibers bound to that
//!   worker live here and are only ever popped by it.

pub(crate) mod injector;
pub(crate) mod local;
