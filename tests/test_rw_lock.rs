// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Tests for the reentrant read-write lock.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use liblock::{LockError, ReentrantRwLock};

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

#[test]
fn read_lock_is_shared() {
    let rw = Arc::new(ReentrantRwLock::new());
    rw.read_lock().lock().expect("read");
    let rw2 = Arc::clone(&rw);
    let got = thread::spawn(move || {
        let ok = rw2.read_lock().try_lock().expect("try read");
        if ok {
            rw2.read_lock().unlock().expect("unlock");
        }
        ok
    })
    .join()
    .unwrap();
    assert!(got);
    assert_eq!(rw.read_lock_count(), 1);
    rw.read_lock().unlock().expect("unlock");
}

#[test]
fn write_lock_excludes_readers_and_writers() {
    let rw = Arc::new(ReentrantRwLock::new());
    rw.write_lock().lock().expect("write");
    assert!(rw.is_write_locked_by_current_thread());

    let rw2 = Arc::clone(&rw);
    let (r, w) = thread::spawn(move || {
        (
            rw2.read_lock().try_lock().expect("try read"),
            rw2.write_lock().try_lock().expect("try write"),
        )
    })
    .join()
    .unwrap();
    assert!(!r);
    assert!(!w);
    rw.write_lock().unlock().expect("unlock");
    assert!(!rw.is_write_locked());
}

#[test]
fn readers_and_writers_do_not_overlap() {
    let rw = Arc::new(ReentrantRwLock::new());
    let readers = Arc::new(AtomicI32::new(0));
    let writing = Arc::new(AtomicBool::new(false));
    let violations = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for i in 0..6 {
        let rw = Arc::clone(&rw);
        let readers = Arc::clone(&readers);
        let writing = Arc::clone(&writing);
        let violations = Arc::clone(&violations);
        handles.push(thread::spawn(move || {
            for _ in 0..2_000 {
                if i % 3 == 0 {
                    rw.write_lock().lock().expect("write");
                    if writing.swap(true, Ordering::SeqCst) || readers.load(Ordering::SeqCst) != 0 {
                        violations.fetch_add(1, Ordering::SeqCst);
                    }
                    writing.store(false, Ordering::SeqCst);
                    rw.write_lock().unlock().expect("unlock");
                } else {
                    rw.read_lock().lock().expect("read");
                    readers.fetch_add(1, Ordering::SeqCst);
                    if writing.load(Ordering::SeqCst) {
                        violations.fetch_add(1, Ordering::SeqCst);
                    }
                    readers.fetch_sub(1, Ordering::SeqCst);
                    rw.read_lock().unlock().expect("unlock");
                }
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(violations.load(Ordering::SeqCst), 0);
    assert_eq!(rw.read_lock_count(), 0);
    assert!(!rw.is_write_locked());
}

#[test]
fn write_lock_is_reentrant() {
    let rw = ReentrantRwLock::new();
    let w = rw.write_lock();
    w.lock().expect("1");
    w.lock().expect("2");
    assert_eq!(w.hold_count(), 2);
    assert_eq!(rw.write_hold_count(), 2);
    w.unlock().expect("1");
    assert!(rw.is_write_locked());
    w.unlock().expect("2");
    assert!(!rw.is_write_locked());
    assert!(rw.owner().is_none());
}

#[test]
fn read_lock_is_reentrant_per_thread() {
    let rw = ReentrantRwLock::new();
    rw.read_lock().lock().expect("1");
    rw.read_lock().lock().expect("2");
    assert_eq!(rw.read_hold_count(), 2);
    assert_eq!(rw.read_lock_count(), 2);
    rw.read_lock().unlock().expect("1");
    rw.read_lock().unlock().expect("2");
    assert_eq!(rw.read_hold_count(), 0);
}

#[test]
fn downgrade_write_to_read() {
    let rw = Arc::new(ReentrantRwLock::new());
    rw.write_lock().lock().expect("write");
    rw.read_lock().lock().expect("read while writing");
    rw.write_lock().unlock().expect("release write");

    assert!(!rw.is_write_locked());
    assert_eq!(rw.read_hold_count(), 1);

    // Other readers may now join; writers may not.
    let rw2 = Arc::clone(&rw);
    let (r, w) = thread::spawn(move || {
        let r = rw2.read_lock().try_lock().expect("try read");
        if r {
            rw2.read_lock().unlock().expect("unlock");
        }
        (r, rw2.write_lock().try_lock().expect("try write"))
    })
    .join()
    .unwrap();
    assert!(r);
    assert!(!w);
    rw.read_lock().unlock().expect("unlock");
}

#[test]
fn unmatched_read_unlock_fails() {
    let rw = ReentrantRwLock::new();
    assert!(matches!(
        rw.read_lock().unlock(),
        Err(LockError::IllegalMonitorState(_))
    ));
}

#[test]
fn write_unlock_by_non_owner_fails() {
    let rw = Arc::new(ReentrantRwLock::new());
    rw.write_lock().lock().expect("write");
    let rw2 = Arc::clone(&rw);
    let res = thread::spawn(move || rw2.write_lock().unlock()).join().unwrap();
    assert!(matches!(res, Err(LockError::IllegalMonitorState(_))));
    rw.write_lock().unlock().expect("unlock");
}

#[test]
fn read_lock_has_no_conditions() {
    let rw = ReentrantRwLock::new();
    assert!(matches!(
        rw.read_lock().new_condition(),
        Err(LockError::Unsupported(_))
    ));
    assert!(rw.write_lock().new_condition().is_ok());
}

#[test]
fn queued_writer_blocks_new_unfair_readers() {
    let rw = Arc::new(ReentrantRwLock::new());
    rw.read_lock().lock().expect("read");

    let writer = {
        let rw = Arc::clone(&rw);
        thread::spawn(move || {
            rw.write_lock().lock().expect("write");
            rw.write_lock().unlock().expect("unlock");
        })
    };
    assert!(wait_for(|| rw.queued_writer_threads().len() == 1));

    let reader = {
        let rw = Arc::clone(&rw);
        thread::spawn(move || {
            rw.read_lock().lock().expect("read");
            rw.read_lock().unlock().expect("unlock");
        })
    };
    assert!(wait_for(|| rw.queued_reader_threads().len() == 1));
    assert_eq!(rw.queue_length(), 2);

    rw.read_lock().unlock().expect("unlock");
    writer.join().unwrap();
    reader.join().unwrap();
    assert!(!rw.has_queued_threads());
}

#[test]
fn write_condition_round_trip() {
    let rw = Arc::new(ReentrantRwLock::new());
    let cond = Arc::new(rw.write_lock().new_condition().expect("condition"));
    let ready = Arc::new(AtomicBool::new(false));

    let h = {
        let rw = Arc::clone(&rw);
        let cond = Arc::clone(&cond);
        let ready = Arc::clone(&ready);
        thread::spawn(move || {
            rw.write_lock().lock().expect("write");
            while !ready.load(Ordering::SeqCst) {
                cond.wait().expect("wait");
            }
            rw.write_lock().unlock().expect("unlock");
        })
    };

    assert!(wait_for(|| {
        rw.write_lock().lock().expect("write");
        let n = rw.wait_queue_length(&cond).expect("len");
        rw.write_lock().unlock().expect("unlock");
        n == 1
    }));
    rw.write_lock().lock().expect("write");
    ready.store(true, Ordering::SeqCst);
    cond.signal().expect("signal");
    rw.write_lock().unlock().expect("unlock");
    h.join().unwrap();
}

#[test]
fn timed_read_lock_times_out_behind_writer() {
    let rw = Arc::new(ReentrantRwLock::fair());
    rw.write_lock().lock().expect("write");
    let rw2 = Arc::clone(&rw);
    let got = thread::spawn(move || {
        rw2.read_lock()
            .try_lock_for(Duration::from_millis(20))
            .expect("timed")
    })
    .join()
    .unwrap();
    assert!(!got);
    assert_eq!(rw.queue_length(), 0);
    rw.write_lock().unlock().expect("unlock");
}
