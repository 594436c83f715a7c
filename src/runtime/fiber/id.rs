use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of a fiber.
///
/// Ids are assigned from a process-wide counter when a fiber is created
/// and are never handed out twice. [`FiberId::NONE`] (zero) is the
/// "no fiber" value reported by empty handles and by threads that are not
/// running a fiber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FiberId(u64);

/// Next id to hand out; zero is reserved.
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

impl FiberId {
    /// The "no fiber" sentinel.
    pub const NONE: FiberId = FiberId(0);

    pub(crate) fn next() -> FiberId {
        FiberId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric id.
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns `true` for [`FiberId::NONE`].
    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for FiberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            f.write_str("not-a-fiber")
        } else {
            write!(f, "fiber-{}", self.0)
        }
    }
}

impl From<FiberId> for u64 {
    fn from(id: FiberId) -> u64 {
        id.0
    }
}
