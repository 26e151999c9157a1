// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Tests for Waiter (predicate wait over a reentrant lock and condition).

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use liblock::Waiter;

#[test]
fn waiter_broadcast() {
    let waiter = Arc::new(Waiter::new());
    let k = Arc::new(AtomicI32::new(0));

    let mut threads = Vec::new();
    for _ in 0..4 {
        let w = Arc::clone(&waiter);
        let k2 = Arc::clone(&k);
        threads.push(thread::spawn(move || {
            // Wait through three increments.
            for i in 0..3 {
                assert!(w
                    .wait_if(|| k2.load(Ordering::Acquire) == i, None)
                    .expect("wait_if"));
            }
        }));
    }

    for val in 1..=3 {
        thread::sleep(Duration::from_millis(20));
        // Publish under the lock's protocol: change, then wake.
        k.store(val, Ordering::Release);
        waiter.broadcast().expect("broadcast");
    }

    for t in threads {
        t.join().unwrap();
    }
}

#[test]
fn waiter_quit_waiting() {
    let waiter = Arc::new(Waiter::new());

    let w2 = Arc::clone(&waiter);
    let t = thread::spawn(move || {
        // Quit ends the wait with `true`.
        assert!(w2.wait_if(|| true, None).expect("wait_if"));
    });

    thread::sleep(Duration::from_millis(50));
    waiter.quit_waiting().expect("quit_waiting");
    assert!(waiter.is_quit());
    t.join().unwrap();

    // Later waits return at once.
    assert!(waiter.wait_if(|| true, None).expect("wait_if"));
}

#[test]
fn waiter_notify_then_broadcast() {
    let waiter = Arc::new(Waiter::new());
    let flag = Arc::new(AtomicBool::new(false));
    let woken = Arc::new(AtomicI32::new(0));

    let mut threads = Vec::new();
    for _ in 0..3 {
        let w = Arc::clone(&waiter);
        let f = Arc::clone(&flag);
        let n = Arc::clone(&woken);
        threads.push(thread::spawn(move || {
            let ok = w
                .wait_if(|| !f.load(Ordering::Acquire), Some(Duration::from_secs(5)))
                .expect("wait_if");
            assert!(ok);
            n.fetch_add(1, Ordering::Relaxed);
        }));
    }

    thread::sleep(Duration::from_millis(50));
    flag.store(true, Ordering::Release);
    waiter.notify().expect("notify");
    thread::sleep(Duration::from_millis(20));
    waiter.broadcast().expect("broadcast");

    for t in threads {
        t.join().unwrap();
    }
    assert_eq!(woken.load(Ordering::Relaxed), 3);
}

#[test]
fn waiter_wait_timeout() {
    let waiter = Waiter::new();
    let start = Instant::now();
    let result = waiter
        .wait_if(|| true, Some(Duration::from_millis(100)))
        .expect("wait_if");
    let elapsed = start.elapsed();

    assert!(!result, "should return false on timeout");
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_secs(5), "should not wait too long");
}

#[test]
fn waiter_wait_predicate_false() {
    let waiter = Waiter::new();
    let result = waiter.wait_if(|| false, None).expect("wait_if");
    assert!(result, "should return true when predicate is already false");
}
