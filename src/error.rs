//! Error types shared by the scheduler, fiber handles and current-fiber
//! operations.

use std::any::Any;
use std::fmt;
use std::io;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the runtime.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A lifecycle contract was misused by the caller.
    #[error("invalid state: {0}")]
    InvalidState(#[from] InvalidState),

    /// The fiber's task panicked and the joiner asked for the failure.
    #[error("fiber failed: {0}")]
    UserFailure(FiberPanic),

    /// An OS resource (fiber stack, poller) could not be obtained.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// The lifecycle contract that was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidState {
    #[error("scheduler is already started")]
    AlreadyStarted,

    #[error("scheduler is not started")]
    NotStarted,

    #[error("at least one worker thread is required")]
    NoWorkers,

    #[error("scheduler joined from one of its own worker threads")]
    JoinFromWorker,

    #[error("fiber handle is not joinable")]
    NotJoinable,

    #[error("a fiber cannot join itself")]
    JoinSelf,

    #[error("not running inside a fiber")]
    NotAFiber,
}

impl Error {
    /// Returns the violated contract if this is an [`Error::InvalidState`].
    pub fn invalid_state(&self) -> Option<InvalidState> {
        match self {
            Error::InvalidState(state) => Some(*state),
            _ => None,
        }
    }
}

/// A panic captured from a fiber's task body.
///
/// The payload is the value the task panicked with, exactly as
/// [`std::panic::catch_unwind`] reports it.
pub struct FiberPanic {
    payload: Box<dyn Any + Send + 'static>,
}

impl FiberPanic {
    pub(crate) fn new(payload: Box<dyn Any + Send + 'static>) -> Self {
        Self { payload }
    }

    /// Returns the panic message when the payload is a string.
    pub fn message(&self) -> Option<&str> {
        if let Some(s) = self.payload.downcast_ref::<&'static str>() {
            Some(s)
        } else {
            self.payload.downcast_ref::<String>().map(String::as_str)
        }
    }

    /// Returns the raw panic payload.
    pub fn into_panic(self) -> Box<dyn Any + Send + 'static> {
        self.payload
    }

    /// Re-raises the panic on the calling thread.
    pub fn resume(self) -> ! {
        std::panic::resume_unwind(self.payload)
    }
}

impl fmt::Debug for FiberPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FiberPanic")
            .field("message", &self.message())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for FiberPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(msg) => write!(f, "panicked with '{msg}'"),
            None => f.write_str("panicked with a non-string payload"),
        }
    }
}

/// Terminates the process after a scheduler-internal invariant breach.
///
/// Corrupted queue or fiber state cannot be recovered from, so it is never
/// reported as an [`Error`].
#[cold]
pub(crate) fn fatal(msg: &str) -> ! {
    tracing::error!(reason = msg, "fatal runtime invariant violation");
    eprintln!("filament: fatal: {msg}");
    std::process::abort()
}
