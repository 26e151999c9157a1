// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Tests for custom policies on the generic synchronizer: shared-mode
// propagation over a 64-bit word, cancellation, unsupported modes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use liblock::{LockError, Policy, SharedAcquire, Synchronizer};

/// Count-down latch: shared acquire succeeds once the count reaches zero.
#[derive(Debug)]
struct Latch;

impl Policy for Latch {
    type Word = u64;

    fn try_acquire_shared(&self, sync: &Synchronizer<Self>, _arg: u64) -> liblock::Result<SharedAcquire> {
        Ok(if sync.state() == 0 {
            SharedAcquire::Propagate
        } else {
            SharedAcquire::Failed
        })
    }

    fn try_release_shared(&self, sync: &Synchronizer<Self>, _arg: u64) -> liblock::Result<bool> {
        loop {
            let c = sync.state();
            if c == 0 {
                return Ok(false);
            }
            if sync.compare_and_set_state(c, c - 1) {
                return Ok(c == 1);
            }
        }
    }
}

/// Non-reentrant exclusive lock on a 64-bit word; shared mode left
/// unsupported.
#[derive(Debug)]
struct Exclusive;

impl Policy for Exclusive {
    type Word = u64;

    fn try_acquire(&self, sync: &Synchronizer<Self>, _arg: u64) -> liblock::Result<bool> {
        if sync.compare_and_set_state(0, 1) {
            sync.set_exclusive_owner(Some(liblock::thread::current()));
            return Ok(true);
        }
        Ok(false)
    }

    fn try_release(&self, sync: &Synchronizer<Self>, _arg: u64) -> liblock::Result<bool> {
        if !sync.is_owned_by_current_thread() {
            return Err(LockError::IllegalMonitorState("not owner"));
        }
        sync.set_exclusive_owner(None);
        sync.set_state(0);
        Ok(true)
    }

    fn is_held_exclusively(&self, sync: &Synchronizer<Self>) -> bool {
        sync.is_owned_by_current_thread()
    }
}

fn wait_for(cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        if Instant::now() > deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(1));
    }
    true
}

// One release wakes every queued shared waiter through propagation.
#[test]
fn latch_release_propagates_to_all_waiters() {
    const WAITERS: usize = 8;
    let latch = Arc::new(Synchronizer::with_state(Latch, 1));
    let passed = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..WAITERS)
        .map(|_| {
            let latch = Arc::clone(&latch);
            let passed = Arc::clone(&passed);
            thread::spawn(move || {
                latch.acquire_shared(1).expect("await");
                passed.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();

    assert!(wait_for(|| latch.queue_length() == WAITERS));
    assert_eq!(latch.shared_queued_threads().len(), WAITERS);
    assert!(latch.exclusive_queued_threads().is_empty());
    assert_eq!(passed.load(Ordering::SeqCst), 0);

    assert!(latch.release_shared(1).expect("count down"));
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(passed.load(Ordering::SeqCst), WAITERS);
    assert!(!latch.has_queued_threads());

    // Open latch admits without queueing.
    latch.acquire_shared(1).expect("open");
    assert!(!latch.release_shared(1).expect("already zero"));
}

// Waiters time out one after another, oldest first, so each cancellation
// finishes before the next starts. Every node must be unlinked.
#[test]
fn timed_shared_waiters_cancel_cleanly() {
    let latch = Arc::new(Synchronizer::with_state(Latch, 1));
    let mut handles = Vec::new();
    for n in 1..=4u64 {
        let l = Arc::clone(&latch);
        handles.push(thread::spawn(move || {
            l.try_acquire_shared_for(1, Duration::from_millis(200 + 40 * n))
                .expect("timed")
        }));
        assert!(wait_for(|| latch.queue_length() == n as usize));
    }
    for h in handles {
        assert!(!h.join().unwrap());
    }
    assert!(!latch.has_queued_threads());
    assert_eq!(latch.queue_length(), 0);
    assert!(latch.queued_threads().is_empty());
    assert!(latch.has_contended());

    // A later waiter is still released normally.
    let l2 = Arc::clone(&latch);
    let h = thread::spawn(move || l2.acquire_shared(1));
    assert!(wait_for(|| latch.queue_length() == 1));
    latch.release_shared(1).expect("count down");
    h.join().unwrap().expect("released");
    assert!(!latch.has_queued_threads());
}

// Mixed timeouts and interrupts in the middle of the queue must not strand
// the waiters behind them.
#[test]
fn cancellation_in_the_middle_forwards_wakeup() {
    let sync = Arc::new(Synchronizer::new(Exclusive));
    sync.acquire(1).expect("lock");

    let spawn_waiter = |timeout: Option<Duration>| {
        let sync = Arc::clone(&sync);
        thread::spawn(move || match timeout {
            Some(t) => sync.try_acquire_for(1, t).map(|got| {
                if got {
                    sync.release(1).expect("release");
                }
                got
            }),
            None => sync.acquire_interruptibly(1).map(|()| {
                sync.release(1).expect("release");
                true
            }),
        })
    };

    let first = spawn_waiter(None);
    assert!(wait_for(|| sync.queue_length() == 1));
    let middle = spawn_waiter(Some(Duration::from_millis(500)));
    assert!(wait_for(|| sync.queue_length() == 2));
    let interrupted = spawn_waiter(None);
    assert!(wait_for(|| sync.queue_length() == 3));
    let last = spawn_waiter(None);
    assert!(wait_for(|| sync.queue_length() == 4));

    // Queue snapshot is most-recent first.
    let queued = sync.queued_threads();
    assert_eq!(queued.len(), 4);
    queued[1].interrupt();
    assert_eq!(interrupted.join().unwrap(), Err(LockError::Interrupted));
    assert_eq!(middle.join().unwrap(), Ok(false));
    assert_eq!(sync.queue_length(), 2);

    assert!(sync.has_queued_predecessors());
    sync.release(1).expect("release");
    assert_eq!(first.join().unwrap(), Ok(true));
    assert_eq!(last.join().unwrap(), Ok(true));
    assert!(!sync.has_queued_threads());
    assert_eq!(sync.state(), 0);
}

#[test]
fn first_queued_thread_is_longest_waiting() {
    let sync = Arc::new(Synchronizer::new(Exclusive));
    assert!(sync.first_queued_thread().is_none());
    sync.acquire(1).expect("lock");

    let mut handles = Vec::new();
    for n in 1..=3 {
        let s = Arc::clone(&sync);
        handles.push(thread::spawn(move || {
            s.acquire(1).expect("lock");
            s.release(1).expect("release");
        }));
        assert!(wait_for(|| sync.queue_length() == n));
    }
    let queued = sync.queued_threads();
    assert_eq!(sync.first_queued_thread(), queued.last().cloned());
    assert!(sync.is_queued(&queued[0]));
    assert!(sync.apparently_first_queued_is_exclusive());

    sync.release(1).expect("release");
    for h in handles {
        h.join().unwrap();
    }
}

#[test]
fn unsupported_modes_report_errors() {
    let sync = Synchronizer::new(Exclusive);
    assert!(matches!(sync.acquire_shared(1), Err(LockError::Unsupported(_))));
    assert!(matches!(sync.release_shared(1), Err(LockError::Unsupported(_))));

    let latch = Synchronizer::with_state(Latch, 0);
    assert!(matches!(latch.acquire(1), Err(LockError::Unsupported(_))));
    assert!(!latch.is_held_exclusively());
}

#[test]
fn condition_on_custom_policy() {
    let sync = Arc::new(Synchronizer::new(Exclusive));
    let cond = sync.new_condition();
    assert!(sync.owns(&cond));

    sync.acquire(1).expect("lock");
    assert!(!cond.wait_for(Duration::from_millis(5)).expect("wait"));
    assert!(sync.is_held_exclusively());
    assert_eq!(sync.wait_queue_length(&cond), Ok(0));
    sync.release(1).expect("release");

    let other = Arc::new(Synchronizer::new(Exclusive));
    assert_eq!(other.has_waiters(&cond), Err(LockError::NotOwner));
}
