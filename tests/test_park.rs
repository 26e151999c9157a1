// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Tests for the per-thread park permit and interrupt flag.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use liblock::thread as lthread;

// An unpark that races ahead of the matching park is never lost.
#[test]
fn no_missed_wakeup() {
    const ITERS: usize = 10_000;
    let turn = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = mpsc::channel();

    let t2 = {
        let turn = Arc::clone(&turn);
        thread::spawn(move || {
            tx.send(lthread::current()).unwrap();
            for i in 0..ITERS {
                while turn.load(Ordering::Acquire) <= i {
                    lthread::park();
                }
            }
        })
    };

    let other = rx.recv().unwrap();
    for i in 0..ITERS {
        turn.store(i + 1, Ordering::Release);
        other.unpark();
    }
    t2.join().unwrap();
}

#[test]
fn permit_is_consumed_once() {
    let me = lthread::current();
    me.unpark();
    me.unpark();
    lthread::park(); // consumes the single permit

    let start = Instant::now();
    lthread::park_timeout(Duration::from_millis(30));
    assert!(start.elapsed() >= Duration::from_millis(25));
}

#[test]
fn park_until_past_deadline_returns() {
    lthread::park_until(Instant::now() - Duration::from_millis(1));
}

#[test]
fn interrupt_unparks_and_sets_flag() {
    let (tx, rx) = mpsc::channel();
    let woke = Arc::new(AtomicBool::new(false));
    let w2 = Arc::clone(&woke);
    let h = thread::spawn(move || {
        tx.send(lthread::current()).unwrap();
        while !lthread::current().is_interrupted() {
            lthread::park();
        }
        w2.store(true, Ordering::SeqCst);
        // Test-and-clear.
        assert!(lthread::interrupted());
        assert!(!lthread::interrupted());
    });

    let t = rx.recv().unwrap();
    thread::sleep(Duration::from_millis(10));
    t.interrupt();
    h.join().unwrap();
    assert!(woke.load(Ordering::SeqCst));
}

#[test]
fn thread_identity() {
    let a = lthread::current();
    let b = lthread::current();
    assert_eq!(a, b);
    assert_eq!(a.id(), b.id());

    let other = thread::spawn(lthread::current).join().unwrap();
    assert_ne!(a, other);
    assert_ne!(a.id().as_u64(), other.id().as_u64());
}
