use crate::runtime::fiber::FiberCore;

use std::mem::ManuallyDrop;
use std::sync::Arc;
use std::task::{RawWaker, RawWakerVTable, Waker};

static VTABLE: RawWakerVTable = RawWakerVTable::new(clone_raw, wake_raw, wake_by_ref_raw, drop_raw);

/// Creates a [`Waker`] that makes `fiber` runnable again.
///
/// The reactor and completion waiters only ever see fibers through this
/// waker. Waking a fiber that is not suspended is a no-op, apart from a
/// fiber still running, which is re-queued once it switches out.
pub(crate) fn fiber_waker(fiber: Arc<FiberCore>) -> Waker {
    let raw = RawWaker::new(Arc::into_raw(fiber) as *const (), &VTABLE);

    // SAFETY: the data pointer comes from `Arc::into_raw` and every vtable
    // entry below keeps the reference count balanced.
    unsafe { Waker::from_raw(raw) }
}

/// Borrows the fiber behind `ptr` without touching its reference count.
unsafe fn borrow(ptr: *const ()) -> ManuallyDrop<Arc<FiberCore>> {
    ManuallyDrop::new(unsafe { Arc::from_raw(ptr as *const FiberCore) })
}

unsafe fn clone_raw(ptr: *const ()) -> RawWaker {
    let fiber = unsafe { borrow(ptr) };
    let cloned = Arc::clone(&fiber);

    RawWaker::new(Arc::into_raw(cloned) as *const (), &VTABLE)
}

unsafe fn wake_raw(ptr: *const ()) {
    let fiber = unsafe { Arc::from_raw(ptr as *const FiberCore) };
    fiber.wake();
}

unsafe fn wake_by_ref_raw(ptr: *const ()) {
    let fiber = unsafe { borrow(ptr) };
    fiber.wake();
}

unsafe fn drop_raw(ptr: *const ()) {
    drop(unsafe { Arc::from_raw(ptr as *const FiberCore) });
}
