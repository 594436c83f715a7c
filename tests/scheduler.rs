use filament::{Fiber, InvalidState, Scheduler, this_fiber};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn run_counter(fibers: usize, workers: usize) -> usize {
    let scheduler = Scheduler::new().unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    let mut handles: Vec<Fiber> = (0..fibers)
        .map(|_| {
            let counter = counter.clone();
            Fiber::spawn_in(&scheduler, move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap()
        })
        .collect();

    scheduler.start(workers).unwrap();

    for handle in &mut handles {
        handle.join().unwrap();
    }
    scheduler.join().unwrap();

    counter.load(Ordering::SeqCst)
}

#[test]
fn test_single_fiber_single_worker() {
    assert_eq!(run_counter(1, 1), 1);
}

#[test]
fn test_many_fibers_single_worker() {
    assert_eq!(run_counter(1000, 1), 1000);
}

#[test]
fn test_single_fiber_many_workers() {
    assert_eq!(run_counter(1, 4), 1);
}

#[test]
fn test_many_fibers_many_workers() {
    assert_eq!(run_counter(1000, 4), 1000);
}

#[test]
fn test_start_twice_fails() {
    let scheduler = Scheduler::new().unwrap();
    scheduler.start(2).unwrap();

    let err = scheduler.start(1).unwrap_err();
    assert_eq!(err.invalid_state(), Some(InvalidState::AlreadyStarted));

    scheduler.join().unwrap();
}

#[test]
fn test_start_without_workers_fails() {
    let scheduler = Scheduler::new().unwrap();

    let err = scheduler.start(0).unwrap_err();
    assert_eq!(err.invalid_state(), Some(InvalidState::NoWorkers));
    assert!(!scheduler.is_started());
}

#[test]
fn test_join_not_started_returns() {
    let scheduler = Scheduler::new().unwrap();
    scheduler.join().unwrap();
}

#[test]
fn test_add_worker_thread_requires_start() {
    let scheduler = Scheduler::new().unwrap();

    let err = scheduler.add_worker_thread(1).unwrap_err();
    assert_eq!(err.invalid_state(), Some(InvalidState::NotStarted));
}

#[test]
fn test_add_worker_thread() {
    let scheduler = Scheduler::builder()
        .thread_name("grow")
        .build()
        .unwrap();

    scheduler.start(1).unwrap();
    scheduler.add_worker_thread(2).unwrap();

    let counter = Arc::new(AtomicUsize::new(0));
    let mut handles: Vec<Fiber> = (0..64)
        .map(|_| {
            let counter = counter.clone();
            Fiber::spawn_in(&scheduler, move || {
                this_fiber::yield_now().unwrap();
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap()
        })
        .collect();

    for handle in &mut handles {
        handle.join().unwrap();
    }
    scheduler.join().unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 64);
    assert_eq!(scheduler.worker_count(), 0);
}

#[test]
fn test_join_from_worker_fails() {
    let scheduler = Scheduler::new().unwrap();

    let mut fiber = Fiber::spawn_in(&scheduler, || {
        let own = this_fiber::scheduler().unwrap();
        let err = own.join().unwrap_err();
        assert_eq!(err.invalid_state(), Some(InvalidState::JoinFromWorker));
    })
    .unwrap();

    scheduler.start(2).unwrap();
    fiber.join_propagate().unwrap();
    scheduler.join().unwrap();
}

#[test]
fn test_join_waits_for_detached_fibers() {
    let scheduler = Scheduler::new().unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..16 {
        let counter = counter.clone();
        let mut fiber = Fiber::spawn_in(&scheduler, move || {
            this_fiber::sleep_for(Duration::from_millis(20)).unwrap();
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        fiber.detach().unwrap();
    }

    scheduler.start(2).unwrap();
    scheduler.join().unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 16);
    assert_eq!(scheduler.live_fibers(), 0);
}

#[test]
fn test_fibers_spawned_while_draining() {
    let scheduler = Scheduler::new().unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    let outer = counter.clone();
    let mut root = Fiber::spawn_in(&scheduler, move || {
        for _ in 0..10 {
            let counter = outer.clone();
            let mut child = Fiber::new(move || {
                this_fiber::sleep_for(Duration::from_millis(5)).unwrap();
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
            child.detach().unwrap();
        }
    })
    .unwrap();
    root.detach().unwrap();

    scheduler.start(2).unwrap();
    scheduler.join().unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 10);
}

#[test]
fn test_restart_after_join() {
    let scheduler = Scheduler::new().unwrap();

    for round in 0..3 {
        scheduler.start(2).unwrap();

        let mut fiber = Fiber::spawn_in(&scheduler, move || {
            this_fiber::sleep_for(Duration::from_millis(1)).unwrap();
            let _ = round;
        })
        .unwrap();

        fiber.join().unwrap();
        scheduler.join().unwrap();
        assert!(!scheduler.is_started());
    }
}

#[test]
fn test_reactor_is_stable() {
    let scheduler = Scheduler::new().unwrap();
    let other = Scheduler::new().unwrap();

    assert!(scheduler.reactor().ptr_eq(scheduler.reactor()));
    assert!(scheduler.reactor().ptr_eq(scheduler.clone().reactor()));
    assert!(!scheduler.reactor().ptr_eq(other.reactor()));
}
