//! Conformance tests for the individual wait handles.
//!
//! These exercise the admission-counting, level-triggering, and
//! slot-accounting contracts end to end, with real threads driving the
//! waits.

mod common;

use common::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use waithandle::{assert_with_log, test_complete};
use waithandle::{AutoResetEvent, CancelToken, ManualResetEvent, Semaphore, WaitGroup};

/// Auto-reset: 100 waiters started with jitter, 99 sequential sets, each
/// admitting exactly one more waiter; the 100th waiter times out and the
/// final admitted count is 99.
#[test]
fn auto_reset_sequential_sets_admit_one_each() {
    init_test("auto_reset_sequential_sets_admit_one_each");
    let event = Arc::new(AutoResetEvent::new(false));
    let admitted = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = mpsc::channel();

    let mut handles = Vec::new();
    for i in 0..100u64 {
        let event = Arc::clone(&event);
        let admitted = Arc::clone(&admitted);
        let tx = tx.clone();
        handles.push(thread::spawn(move || {
            // Deterministic jitter so waiters arrive staggered.
            thread::sleep(Duration::from_millis(1 + i % 20));
            let cancel = CancelToken::with_timeout(Duration::from_secs(2));
            let result = block_on(event.wait_one(&cancel));
            if result {
                admitted.fetch_add(1, Ordering::SeqCst);
            }
            tx.send(result).expect("result channel closed");
        }));
    }
    drop(tx);

    // Each set admits exactly one waiter; wait for that admission before
    // issuing the next so the pairing is observable.
    for round in 0..99 {
        assert!(event.set(), "set rejected in round {round}");
        let result = rx.recv().expect("waiter vanished");
        assert!(result, "waiter timed out in round {round}");
    }

    // No token pending: the last waiter can only time out.
    let last = rx.recv().expect("final waiter vanished");
    assert_with_log!(!last, "hundredth waiter times out", false, last);

    for handle in handles {
        handle.join().expect("waiter thread panicked");
    }
    let count = admitted.load(Ordering::SeqCst);
    assert_with_log!(count == 99, "admitted count", 99usize, count);
    test_complete!("auto_reset_sequential_sets_admit_one_each", admitted = count);
}

/// Auto-reset: with N concurrent waiters and M < N sets, exactly
/// `min(N, M)` waits resolve true.
#[test]
fn auto_reset_admits_min_of_waiters_and_sets() {
    init_test("auto_reset_admits_min_of_waiters_and_sets");
    let event = Arc::new(AutoResetEvent::new(false));
    let admitted = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let event = Arc::clone(&event);
        let admitted = Arc::clone(&admitted);
        handles.push(thread::spawn(move || {
            let cancel = CancelToken::with_timeout(Duration::from_millis(500));
            if block_on(event.wait_one(&cancel)) {
                admitted.fetch_add(1, Ordering::SeqCst);
            }
        }));
    }

    thread::sleep(Duration::from_millis(50));
    for _ in 0..4 {
        // Spaced out so each token is claimed before the next set; a set
        // while a token is pending would report false.
        while !event.set() {
            thread::sleep(Duration::from_millis(1));
        }
        thread::sleep(Duration::from_millis(10));
    }

    for handle in handles {
        handle.join().expect("waiter thread panicked");
    }
    let count = admitted.load(Ordering::SeqCst);
    assert_with_log!(count == 4, "min(N, M) admissions", 4usize, count);
    test_complete!("auto_reset_admits_min_of_waiters_and_sets");
}

/// Manual-reset created pre-signaled: an immediate wait with a 1ms
/// deadline resolves true.
#[test]
fn manual_reset_presignaled_fast_path() {
    init_test("manual_reset_presignaled_fast_path");
    let event = ManualResetEvent::new(true);
    let cancel = CancelToken::with_timeout(Duration::from_millis(1));
    let result = block_on(event.wait_one(&cancel));
    assert_with_log!(result, "pre-signaled wait", true, result);
    test_complete!("manual_reset_presignaled_fast_path");
}

/// Manual-reset: existing and new waiters all pass once set; a reset
/// gates the next generation of waiters again.
#[test]
fn manual_reset_releases_existing_and_new_waiters() {
    init_test("manual_reset_releases_existing_and_new_waiters");
    let event = Arc::new(ManualResetEvent::new(false));
    let released = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..5 {
        let event = Arc::clone(&event);
        let released = Arc::clone(&released);
        handles.push(thread::spawn(move || {
            let cancel = CancelToken::with_timeout(Duration::from_secs(2));
            if block_on(event.wait_one(&cancel)) {
                released.fetch_add(1, Ordering::SeqCst);
            }
        }));
    }

    thread::sleep(Duration::from_millis(50));
    event.set();
    for handle in handles {
        handle.join().expect("waiter thread panicked");
    }

    // New waiters pass too, until the reset.
    let cancel = CancelToken::with_timeout(Duration::from_millis(20));
    assert!(block_on(event.wait_one(&cancel)));

    event.reset();
    let cancel = CancelToken::with_timeout(Duration::from_millis(20));
    let gated = block_on(event.wait_one(&cancel));
    assert_with_log!(!gated, "gated after reset", false, gated);

    let count = released.load(Ordering::SeqCst);
    assert_with_log!(count == 5, "all existing waiters released", 5usize, count);
    test_complete!("manual_reset_releases_existing_and_new_waiters");
}

/// Semaphore of capacity 2: two immediate acquires succeed, a third with
/// a tight deadline fails leaving `available() == 0`; after one release,
/// `available() == 1` and a subsequent acquire succeeds.
#[test]
fn semaphore_capacity_two_scenario() {
    init_test("semaphore_capacity_two_scenario");
    let sem = Semaphore::new(2);
    let cancel = CancelToken::never();

    assert!(block_on(sem.wait_one(&cancel)));
    assert!(block_on(sem.wait_one(&cancel)));

    let tight = CancelToken::with_timeout(Duration::from_millis(1));
    let third = block_on(sem.wait_one(&tight));
    assert_with_log!(!third, "third acquire fails", false, third);
    let available = sem.available();
    assert_with_log!(available == 0, "still exhausted", 0usize, available);

    sem.release();
    let available = sem.available();
    assert_with_log!(available == 1, "one slot back", 1usize, available);

    let bounded = CancelToken::with_timeout(Duration::from_millis(200));
    let fourth = block_on(sem.wait_one(&bounded));
    assert_with_log!(fourth, "acquire after release", true, fourth);
    test_complete!("semaphore_capacity_two_scenario");
}

/// Wait group: waiters resolve true exactly when the counter drains to
/// zero, false when cancellation beats the drain.
#[test]
fn wait_group_drain_and_cancellation() {
    init_test("wait_group_drain_and_cancellation");
    let group = Arc::new(WaitGroup::new());
    group.add(4);

    // A bounded wait loses while work is outstanding.
    let tight = CancelToken::with_timeout(Duration::from_millis(20));
    assert!(!block_on(group.wait_one(&tight)));

    let workers = Arc::clone(&group);
    let handle = thread::spawn(move || {
        for _ in 0..4 {
            thread::sleep(Duration::from_millis(5));
            workers.done();
        }
    });

    let cancel = CancelToken::with_timeout(Duration::from_secs(2));
    let result = block_on(group.wait_one(&cancel));
    assert_with_log!(result, "drained to zero", true, result);
    assert_eq!(group.count(), 0);
    handle.join().expect("worker thread panicked");
    test_complete!("wait_group_drain_and_cancellation");
}

/// A cancelled semaphore wait leaves no trace: no slot consumed, no
/// waiter registered, and later acquisitions are unaffected.
#[test]
fn cancelled_waits_leave_no_side_effects() {
    init_test("cancelled_waits_leave_no_side_effects");
    let sem = Arc::new(Semaphore::new(1));
    let cancel = CancelToken::never();
    assert!(block_on(sem.wait_one(&cancel)));

    for _ in 0..5 {
        let tight = CancelToken::with_timeout(Duration::from_millis(5));
        assert!(!block_on(sem.wait_one(&tight)));
    }
    assert_eq!(sem.available(), 0);

    sem.release();
    let bounded = CancelToken::with_timeout(Duration::from_millis(200));
    assert!(block_on(sem.wait_one(&bounded)));
    test_complete!("cancelled_waits_leave_no_side_effects");
}
