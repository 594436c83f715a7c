use filament::fiber::{Attributes, Builder, Policy};
use filament::{Fiber, Scheduler, this_fiber};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Runs a short busy section guarded by `busy`, counting every entry that
/// finds another section already inside.
fn section(busy: &AtomicBool, overlaps: &AtomicUsize) {
    if busy.swap(true, Ordering::SeqCst) {
        overlaps.fetch_add(1, Ordering::SeqCst);
    }

    let start = Instant::now();
    while start.elapsed() < Duration::from_micros(200) {
        std::hint::spin_loop();
    }

    busy.store(false, Ordering::SeqCst);
}

#[test]
fn test_pinned_children_share_parent_worker() {
    let scheduler = Scheduler::new().unwrap();
    let ran = Arc::new(AtomicUsize::new(0));
    let overlaps = Arc::new(AtomicUsize::new(0));

    let counter = ran.clone();
    let clashes = overlaps.clone();
    let body = move || {
        let parent_thread = thread::current().id();
        let busy = Arc::new(AtomicBool::new(false));

        let mut children = Vec::with_capacity(1000);
        for _ in 0..1000 {
            section(&busy, &clashes);

            let busy = busy.clone();
            let counter = counter.clone();
            let clashes = clashes.clone();
            children.push(
                Fiber::with_attributes(Attributes::stick_with_parent(), move || {
                    assert_eq!(thread::current().id(), parent_thread);
                    if busy.swap(true, Ordering::SeqCst) {
                        clashes.fetch_add(1, Ordering::SeqCst);
                    }
                    counter.fetch_add(1, Ordering::SeqCst);
                    busy.store(false, Ordering::SeqCst);
                })
                .unwrap(),
            );
        }

        for child in &mut children {
            section(&busy, &clashes);
            child.join_propagate().unwrap();
            assert_eq!(thread::current().id(), parent_thread);
        }
    };

    let mut parent = Builder::new()
        .policy(Policy::Pinned)
        .scheduler(&scheduler)
        .spawn(body)
        .unwrap();

    scheduler.start(4).unwrap();
    parent.join_propagate().unwrap();
    scheduler.join().unwrap();

    assert_eq!(ran.load(Ordering::SeqCst), 1000);
    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
}

#[test]
fn test_pinned_child_never_overlaps_free_parent() {
    let scheduler = Scheduler::new().unwrap();
    let overlaps = Arc::new(AtomicUsize::new(0));

    let clashes = overlaps.clone();
    let mut parent = Fiber::spawn_in(&scheduler, move || {
        let busy = Arc::new(AtomicBool::new(false));
        let mut children = Vec::new();

        for _ in 0..8 {
            let busy = busy.clone();
            let clashes = clashes.clone();
            let creator = thread::current().id();
            children.push(
                Fiber::with_attributes(Attributes::stick_with_parent(), move || {
                    for _ in 0..50 {
                        assert_eq!(thread::current().id(), creator);
                        section(&busy, &clashes);
                        this_fiber::yield_now().unwrap();
                    }
                })
                .unwrap(),
            );
        }

        let home = thread::current().id();
        for i in 0..400 {
            section(&busy, &clashes);
            assert_eq!(thread::current().id(), home);

            if i % 50 == 0 {
                this_fiber::sleep_for(Duration::from_millis(1)).unwrap();
            } else {
                this_fiber::yield_now().unwrap();
            }
        }

        for child in &mut children {
            child.join_propagate().unwrap();
        }
    })
    .unwrap();

    // Free fibers keep the other workers busy so that an unbound parent
    // would have somewhere to move to.
    let mut noise: Vec<Fiber> = (0..16)
        .map(|_| {
            Fiber::spawn_in(&scheduler, || {
                for _ in 0..200 {
                    this_fiber::yield_now().unwrap();
                }
            })
            .unwrap()
        })
        .collect();

    scheduler.start(4).unwrap();
    parent.join_propagate().unwrap();
    for fiber in &mut noise {
        fiber.join().unwrap();
    }
    scheduler.join().unwrap();

    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
}

#[test]
fn test_pinned_fiber_keeps_thread_bound_values() {
    let scheduler = Scheduler::new().unwrap();

    let mut fiber = Builder::new()
        .policy(Policy::Pinned)
        .scheduler(&scheduler)
        .spawn(|| {
            let owner = std::rc::Rc::new(thread::current().id());
            for _ in 0..100 {
                this_fiber::yield_now().unwrap();
                assert_eq!(*owner, thread::current().id());
            }
        })
        .unwrap();

    let mut noise: Vec<Fiber> = (0..8)
        .map(|_| {
            Fiber::spawn_in(&scheduler, || {
                for _ in 0..100 {
                    this_fiber::yield_now().unwrap();
                }
            })
            .unwrap()
        })
        .collect();

    scheduler.start(4).unwrap();
    fiber.join_propagate().unwrap();
    for fiber in &mut noise {
        fiber.join().unwrap();
    }
    scheduler.join().unwrap();
}

#[test]
fn test_pinned_fiber_stays_on_first_worker() {
    let scheduler = Scheduler::new().unwrap();

    let mut fibers: Vec<Fiber> = (0..8)
        .map(|_| {
            Builder::new()
                .policy(Policy::Pinned)
                .scheduler(&scheduler)
                .spawn(|| {
                    let home = thread::current().id();
                    for _ in 0..5 {
                        this_fiber::sleep_for(Duration::from_millis(2)).unwrap();
                        assert_eq!(thread::current().id(), home);
                        this_fiber::yield_now().unwrap();
                        assert_eq!(thread::current().id(), home);
                    }
                })
                .unwrap()
        })
        .collect();

    scheduler.start(4).unwrap();
    for fiber in &mut fibers {
        fiber.join_propagate().unwrap();
    }
    scheduler.join().unwrap();
}

#[test]
fn test_free_and_pinned_fibers_mix() {
    let scheduler = Scheduler::new().unwrap();
    let done = Arc::new(AtomicUsize::new(0));

    let counter = done.clone();
    let mut root = Fiber::spawn_in(&scheduler, move || {
        let mut fibers = Vec::new();

        for i in 0..200 {
            let policy = if i % 2 == 0 { Policy::Pinned } else { Policy::Free };
            let counter = counter.clone();
            fibers.push(
                Fiber::with_attributes(Attributes::new(policy), move || {
                    this_fiber::yield_now().unwrap();
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap(),
            );
        }

        for fiber in &mut fibers {
            fiber.join().unwrap();
        }
    })
    .unwrap();

    scheduler.start(3).unwrap();
    root.join_propagate().unwrap();
    scheduler.join().unwrap();

    assert_eq!(done.load(Ordering::SeqCst), 200);
}
