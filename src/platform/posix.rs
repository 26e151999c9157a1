// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// POSIX thread parker: one permit per thread, built on a process-private
// pthread_mutex_t + pthread_cond_t pair.
//
// Timed waits follow the monotonic clock: Linux and Android bind the
// condvar to CLOCK_MONOTONIC, Apple targets wait on a relative timeout.
// Other targets fall back to a CLOCK_REALTIME deadline.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const EMPTY: usize = 0;
const PARKED: usize = 1;
const NOTIFIED: usize = 2;

// pthread objects must not move after first use, so both live on the heap.
pub struct PlatformParker {
    state: AtomicUsize,
    mutex: Box<UnsafeCell<libc::pthread_mutex_t>>,
    cond: Box<UnsafeCell<libc::pthread_cond_t>>,
}

// Safety: the pthread objects are only touched through the pthread API,
// which is thread-safe.
unsafe impl Send for PlatformParker {}
unsafe impl Sync for PlatformParker {}

impl PlatformParker {
    pub fn new() -> Self {
        let cond = Box::new(UnsafeCell::new(libc::PTHREAD_COND_INITIALIZER));
        #[cfg(any(target_os = "linux", target_os = "android"))]
        {
            // Safety: the condvar is heap-allocated, unused and never moves.
            unsafe { use_monotonic_clock(cond.get()) };
        }
        Self {
            state: AtomicUsize::new(EMPTY),
            mutex: Box::new(UnsafeCell::new(libc::PTHREAD_MUTEX_INITIALIZER)),
            cond,
        }
    }

    fn mtx_ptr(&self) -> *mut libc::pthread_mutex_t {
        self.mutex.get()
    }

    fn cond_ptr(&self) -> *mut libc::pthread_cond_t {
        self.cond.get()
    }

    /// Consume the permit, blocking until one is available.
    /// Must only be called by the thread that owns this parker.
    pub fn park(&self) {
        if self
            .state
            .compare_exchange(NOTIFIED, EMPTY, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            return;
        }

        unsafe { libc::pthread_mutex_lock(self.mtx_ptr()) };
        match self
            .state
            .compare_exchange(EMPTY, PARKED, Ordering::Relaxed, Ordering::Relaxed)
        {
            Ok(_) => {}
            Err(NOTIFIED) => {
                // Permit arrived between the fast path and taking the mutex.
                self.state.swap(EMPTY, Ordering::Acquire);
                unsafe { libc::pthread_mutex_unlock(self.mtx_ptr()) };
                return;
            }
            Err(_) => {
                // Only the owning thread parks, so PARKED cannot be observed here.
                unsafe { libc::pthread_mutex_unlock(self.mtx_ptr()) };
                return;
            }
        }

        loop {
            unsafe { libc::pthread_cond_wait(self.cond_ptr(), self.mtx_ptr()) };
            if self
                .state
                .compare_exchange(NOTIFIED, EMPTY, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
        }
        unsafe { libc::pthread_mutex_unlock(self.mtx_ptr()) };
    }

    /// Consume the permit or give up after `timeout`. May return early;
    /// callers re-check their own condition and deadline.
    pub fn park_timeout(&self, timeout: Duration) {
        if self
            .state
            .compare_exchange(NOTIFIED, EMPTY, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            return;
        }
        if timeout.is_zero() {
            return;
        }

        unsafe { libc::pthread_mutex_lock(self.mtx_ptr()) };
        match self
            .state
            .compare_exchange(EMPTY, PARKED, Ordering::Relaxed, Ordering::Relaxed)
        {
            Ok(_) => {}
            Err(_) => {
                self.state.swap(EMPTY, Ordering::Acquire);
                unsafe { libc::pthread_mutex_unlock(self.mtx_ptr()) };
                return;
            }
        }

        unsafe { timed_wait(self.cond_ptr(), self.mtx_ptr(), timeout) };
        // Timed out, spuriously woken or notified: either way the state resets.
        self.state.swap(EMPTY, Ordering::Acquire);
        unsafe { libc::pthread_mutex_unlock(self.mtx_ptr()) };
    }

    /// Make the permit available, waking the owner if it is parked.
    pub fn unpark(&self) {
        match self.state.swap(NOTIFIED, Ordering::Release) {
            EMPTY | NOTIFIED => return,
            _ => {}
        }
        // Taking the mutex orders this signal after the parked thread's
        // cond_wait, so the wakeup cannot be lost.
        unsafe {
            libc::pthread_mutex_lock(self.mtx_ptr());
            libc::pthread_mutex_unlock(self.mtx_ptr());
            libc::pthread_cond_signal(self.cond_ptr());
        }
    }
}

impl Drop for PlatformParker {
    fn drop(&mut self) {
        unsafe {
            libc::pthread_cond_destroy(self.cond_ptr());
            libc::pthread_mutex_destroy(self.mtx_ptr());
        }
    }
}

/// Re-initialise `cond` so that timed waits measure CLOCK_MONOTONIC.
#[cfg(any(target_os = "linux", target_os = "android"))]
unsafe fn use_monotonic_clock(cond: *mut libc::pthread_cond_t) {
    let mut attr = std::mem::MaybeUninit::<libc::pthread_condattr_t>::uninit();
    libc::pthread_condattr_init(attr.as_mut_ptr());
    libc::pthread_condattr_setclock(attr.as_mut_ptr(), libc::CLOCK_MONOTONIC);
    libc::pthread_cond_init(cond, attr.as_ptr());
    libc::pthread_condattr_destroy(attr.as_mut_ptr());
}

#[cfg(any(target_os = "linux", target_os = "android"))]
unsafe fn timed_wait(cond: *mut libc::pthread_cond_t, mtx: *mut libc::pthread_mutex_t, timeout: Duration) {
    let ts = deadline(libc::CLOCK_MONOTONIC, timeout);
    libc::pthread_cond_timedwait(cond, mtx, &ts);
}

#[cfg(target_vendor = "apple")]
unsafe fn timed_wait(cond: *mut libc::pthread_cond_t, mtx: *mut libc::pthread_mutex_t, timeout: Duration) {
    let ts = libc::timespec {
        tv_sec: timeout.as_secs().min(libc::time_t::MAX as u64) as libc::time_t,
        tv_nsec: timeout.subsec_nanos() as libc::c_long,
    };
    libc::pthread_cond_timedwait_relative_np(cond, mtx, &ts);
}

#[cfg(not(any(target_os = "linux", target_os = "android", target_vendor = "apple")))]
unsafe fn timed_wait(cond: *mut libc::pthread_cond_t, mtx: *mut libc::pthread_mutex_t, timeout: Duration) {
    let ts = deadline(libc::CLOCK_REALTIME, timeout);
    libc::pthread_cond_timedwait(cond, mtx, &ts);
}

/// Absolute deadline `timeout` from now on `clock`, as required by
/// `pthread_cond_timedwait`. Saturates instead of overflowing `time_t`.
#[cfg(not(target_vendor = "apple"))]
fn deadline(clock: libc::clockid_t, timeout: Duration) -> libc::timespec {
    let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
    unsafe { libc::clock_gettime(clock, &mut ts) };

    let mut sec = (ts.tv_sec as i64).saturating_add(timeout.as_secs().min(i64::MAX as u64) as i64);
    let mut nsec = ts.tv_nsec as i64 + timeout.subsec_nanos() as i64;
    if nsec >= 1_000_000_000 {
        nsec -= 1_000_000_000;
        sec = sec.saturating_add(1);
    }
    let max_sec = libc::time_t::MAX as i64;
    libc::timespec {
        tv_sec: sec.min(max_sec) as libc::time_t,
        tv_nsec: nsec as libc::c_long,
    }
}
