use filament::{Fiber, Scheduler, this_fiber};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

// One test: the process-wide instance is shared by every test in a binary.
#[test]
fn test_process_wide_instance() {
    let first = Scheduler::get_instance().unwrap();
    let second = Scheduler::get_instance().unwrap();
    assert!(first.ptr_eq(&second));
    assert!(first.reactor().ptr_eq(second.reactor()));

    // Fibers created off any fiber land on the instance.
    let counter = Arc::new(AtomicUsize::new(0));
    let inner = counter.clone();
    let expected = first.clone();
    let mut fiber = Fiber::new(move || {
        assert!(this_fiber::scheduler().unwrap().ptr_eq(&expected));

        // Children default to their parent's scheduler.
        let counter = inner.clone();
        let mut child = Fiber::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        child.join_propagate().unwrap();
        inner.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    first.start(2).unwrap();
    fiber.join_propagate().unwrap();
    first.join().unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 2);

    Scheduler::reset_instance();
    let fresh = Scheduler::get_instance().unwrap();
    assert!(!fresh.ptr_eq(&first));
    assert!(!fresh.reactor().ptr_eq(first.reactor()));
    assert!(fresh.ptr_eq(&Scheduler::get_instance().unwrap()));
}
