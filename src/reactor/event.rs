/// An I/O event reported by the poller.
///
/// An `Event` carries readiness information for a registered file
/// descriptor. It is produced by the poller and consumed by the reactor
/// to wake the fiber waiting on that descriptor.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Event {
    /// Token associated with the registered file descriptor.
    ///
    /// Identifies the I/O entry inside the reactor slab.
    pub(crate) token: usize,

    /// The descriptor is readable (or hung up / errored).
    pub(crate) readable: bool,

    /// The descriptor is writable.
    pub(crate) writable: bool,
}
