// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Tests for conditions bound to a reentrant lock.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use liblock::{Condition, LockError, ReentrantLock};

struct Shared {
    lock: ReentrantLock,
    cond: Condition,
    ready: AtomicBool,
}

fn shared() -> Arc<Shared> {
    let lock = ReentrantLock::new();
    let cond = lock.new_condition();
    Arc::new(Shared {
        lock,
        cond,
        ready: AtomicBool::new(false),
    })
}

fn wait_until_waiting(s: &Shared, n: usize) {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        s.lock.lock().expect("lock");
        let len = s.lock.wait_queue_length(&s.cond).expect("len");
        s.lock.unlock().expect("unlock");
        if len >= n {
            return;
        }
        assert!(Instant::now() < deadline, "waiters never arrived");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn operations_require_the_lock() {
    let s = shared();
    assert!(matches!(s.cond.signal(), Err(LockError::IllegalMonitorState(_))));
    assert!(matches!(s.cond.signal_all(), Err(LockError::IllegalMonitorState(_))));
    assert!(matches!(s.cond.wait(), Err(LockError::IllegalMonitorState(_))));
    assert!(matches!(
        s.cond.wait_for(Duration::from_millis(1)),
        Err(LockError::IllegalMonitorState(_))
    ));
    assert!(matches!(s.cond.has_waiters(), Err(LockError::IllegalMonitorState(_))));
}

#[test]
fn foreign_condition_is_rejected() {
    let a = ReentrantLock::new();
    let b = ReentrantLock::new();
    let cond_b = b.new_condition();
    a.lock().expect("lock");
    assert_eq!(a.has_waiters(&cond_b), Err(LockError::NotOwner));
    assert_eq!(a.wait_queue_length(&cond_b), Err(LockError::NotOwner));
    a.unlock().expect("unlock");
}

#[test]
fn signal_wakes_waiter() {
    let s = shared();
    let s2 = Arc::clone(&s);
    let h = thread::spawn(move || {
        s2.lock.lock().expect("lock");
        while !s2.ready.load(Ordering::SeqCst) {
            s2.cond.wait().expect("wait");
        }
        assert!(s2.lock.is_held_by_current_thread());
        s2.lock.unlock().expect("unlock");
    });

    wait_until_waiting(&s, 1);
    s.lock.lock().expect("lock");
    assert!(s.cond.has_waiters().expect("has_waiters"));
    assert_eq!(s.lock.waiting_threads(&s.cond).expect("threads").len(), 1);
    s.ready.store(true, Ordering::SeqCst);
    s.cond.signal().expect("signal");
    s.lock.unlock().expect("unlock");

    h.join().unwrap();
}

#[test]
fn wait_restores_hold_count() {
    let s = shared();
    let s2 = Arc::clone(&s);
    let h = thread::spawn(move || {
        s2.lock.lock().expect("lock");
        s2.lock.lock().expect("lock");
        s2.lock.lock().expect("lock");
        s2.cond.wait().expect("wait");
        let holds = s2.lock.hold_count();
        for _ in 0..holds {
            s2.lock.unlock().expect("unlock");
        }
        holds
    });

    wait_until_waiting(&s, 1);
    s.lock.lock().expect("lock");
    // The waiter released all three holds, so we got in.
    assert_eq!(s.lock.hold_count(), 1);
    s.cond.signal().expect("signal");
    s.lock.unlock().expect("unlock");

    assert_eq!(h.join().unwrap(), 3);
}

#[test]
fn signal_all_wakes_everyone() {
    const WAITERS: usize = 4;
    let s = shared();
    let woken = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..WAITERS)
        .map(|_| {
            let s = Arc::clone(&s);
            let woken = Arc::clone(&woken);
            thread::spawn(move || {
                s.lock.lock().expect("lock");
                while !s.ready.load(Ordering::SeqCst) {
                    s.cond.wait().expect("wait");
                }
                woken.fetch_add(1, Ordering::SeqCst);
                s.lock.unlock().expect("unlock");
            })
        })
        .collect();

    wait_until_waiting(&s, WAITERS);
    s.lock.lock().expect("lock");
    s.ready.store(true, Ordering::SeqCst);
    s.cond.signal_all().expect("signal_all");
    assert!(!s.cond.has_waiters().expect("has_waiters"));
    s.lock.unlock().expect("unlock");

    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(woken.load(Ordering::SeqCst), WAITERS);
}

#[test]
fn wait_for_times_out() {
    let s = shared();
    s.lock.lock().expect("lock");
    let start = Instant::now();
    let signalled = s.cond.wait_for(Duration::from_millis(30)).expect("wait_for");
    assert!(!signalled);
    assert!(start.elapsed() >= Duration::from_millis(30));
    assert!(s.lock.is_held_by_current_thread());
    assert!(!s.cond.has_waiters().expect("has_waiters"));
    s.lock.unlock().expect("unlock");
}

#[test]
fn wait_nanos_reports_zero_on_timeout() {
    let s = shared();
    s.lock.lock().expect("lock");
    let left = s.cond.wait_nanos(Duration::from_millis(5)).expect("wait_nanos");
    assert_eq!(left, Duration::ZERO);
    s.lock.unlock().expect("unlock");
}

#[test]
fn interrupted_wait_fails_and_reacquires() {
    let s = shared();
    let s2 = Arc::clone(&s);
    let h = thread::spawn(move || {
        s2.lock.lock().expect("lock");
        let res = s2.cond.wait();
        let held = s2.lock.is_held_by_current_thread();
        s2.lock.unlock().expect("unlock");
        (res, held)
    });

    wait_until_waiting(&s, 1);
    s.lock.lock().expect("lock");
    let waiter = s.lock.waiting_threads(&s.cond).expect("threads").pop().expect("waiter");
    s.lock.unlock().expect("unlock");
    waiter.interrupt();

    let (res, held) = h.join().unwrap();
    assert_eq!(res, Err(LockError::Interrupted));
    assert!(held, "lock must be reacquired before reporting the interrupt");
    assert!(!waiter.is_interrupted());
}

#[test]
fn wait_uninterruptibly_keeps_waiting() {
    let s = shared();
    let s2 = Arc::clone(&s);
    let h = thread::spawn(move || {
        s2.lock.lock().expect("lock");
        while !s2.ready.load(Ordering::SeqCst) {
            s2.cond.wait_uninterruptibly().expect("wait");
        }
        s2.lock.unlock().expect("unlock");
        liblock::thread::interrupted()
    });

    wait_until_waiting(&s, 1);
    s.lock.lock().expect("lock");
    let waiter = s.lock.waiting_threads(&s.cond).expect("threads").pop().expect("waiter");
    s.lock.unlock().expect("unlock");
    waiter.interrupt();
    thread::sleep(Duration::from_millis(20));

    s.lock.lock().expect("lock");
    s.ready.store(true, Ordering::SeqCst);
    s.cond.signal().expect("signal");
    s.lock.unlock().expect("unlock");

    assert!(h.join().unwrap(), "interrupt must be re-asserted");
}

#[test]
fn cancelled_waiters_are_unlinked() {
    let s = shared();
    s.lock.lock().expect("lock");
    for _ in 0..3 {
        assert!(!s.cond.wait_for(Duration::from_millis(1)).expect("wait_for"));
    }
    assert_eq!(s.cond.wait_queue_length().expect("len"), 0);
    // Signal with only cancelled nodes around is a no-op.
    s.cond.signal().expect("signal");
    s.lock.unlock().expect("unlock");
}
