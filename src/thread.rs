// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Thread handles, park/unpark with a single coalescing permit, and a
// per-thread interrupt flag. This is the only suspension point used by the
// locks in this crate.

use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;

use crate::platform::PlatformParker;

/// Opaque, copyable identity of a thread known to this crate.
///
/// Identifiers are never reused within a process, so they are safe to use
/// as map keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(NonZeroU64);

impl ThreadId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        let id = NEXT.fetch_add(1, Ordering::Relaxed);
        // A u64 counter does not wrap in practice.
        ThreadId(NonZeroU64::new(id).unwrap_or(NonZeroU64::MIN))
    }

    /// The raw numeric value of this identifier.
    pub fn as_u64(&self) -> u64 {
        self.0.get()
    }
}

pub(crate) struct Inner {
    id: ThreadId,
    name: Option<String>,
    parker: PlatformParker,
    interrupted: AtomicBool,
}

/// A cloneable handle to a thread that can be unparked or interrupted.
///
/// Obtained with [`current`]. Lock queues store these handles so a
/// releasing thread can wake the waiter that follows it.
#[derive(Clone)]
pub struct Thread {
    inner: Arc<Inner>,
}

impl Thread {
    fn for_current() -> Self {
        Self {
            inner: Arc::new(Inner {
                id: ThreadId::next(),
                name: std::thread::current().name().map(str::to_owned),
                parker: PlatformParker::new(),
                interrupted: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> ThreadId {
        self.inner.id
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Make this thread's permit available. If the thread is parked it
    /// returns from `park`; otherwise its next `park` returns immediately.
    /// At most one permit is retained.
    pub fn unpark(&self) {
        self.inner.parker.unpark();
    }

    /// Set the thread's interrupt flag and unpark it.
    pub fn interrupt(&self) {
        self.inner.interrupted.store(true, Ordering::Release);
        self.unpark();
    }

    /// Whether the interrupt flag is set. Does not clear it.
    pub fn is_interrupted(&self) -> bool {
        self.inner.interrupted.load(Ordering::Acquire)
    }

    /// Whether two handles refer to the same thread.
    pub fn ptr_eq(&self, other: &Thread) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn take_interrupt(&self) -> bool {
        self.inner.interrupted.swap(false, Ordering::AcqRel)
    }
}

impl PartialEq for Thread {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Thread {}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .finish()
    }
}

thread_local! {
    static CURRENT: Thread = Thread::for_current();
}

/// Handle to the calling thread.
pub fn current() -> Thread {
    CURRENT.with(Thread::clone)
}

/// Block until the calling thread's permit is available, consuming it.
/// May also return when the thread is interrupted.
pub fn park() {
    CURRENT.with(|t| t.inner.parker.park());
}

/// Like [`park`], but gives up after `timeout`. May return spuriously.
pub fn park_timeout(timeout: Duration) {
    CURRENT.with(|t| t.inner.parker.park_timeout(timeout));
}

/// Like [`park`], but gives up at `deadline`. May return spuriously.
pub fn park_until(deadline: Instant) {
    let now = Instant::now();
    if deadline > now {
        park_timeout(deadline - now);
    }
}

/// Test and clear the calling thread's interrupt flag.
pub fn interrupted() -> bool {
    CURRENT.with(Thread::take_interrupt)
}

/// Set the calling thread's interrupt flag without unparking.
pub(crate) fn self_interrupt() {
    CURRENT.with(|t| t.inner.interrupted.store(true, Ordering::Release));
}

/// Atomic, clearable slot holding a thread handle. Used for queue node
/// waiters and for the exclusive owner of a synchronizer.
pub(crate) struct ThreadSlot(ArcSwapOption<Inner>);

impl ThreadSlot {
    pub(crate) fn empty() -> Self {
        Self(ArcSwapOption::const_empty())
    }

    pub(crate) fn new(thread: Option<Thread>) -> Self {
        Self(ArcSwapOption::new(thread.map(|t| t.inner)))
    }

    pub(crate) fn get(&self) -> Option<Thread> {
        self.0.load_full().map(|inner| Thread { inner })
    }

    pub(crate) fn set(&self, thread: Option<Thread>) {
        self.0.store(thread.map(|t| t.inner));
    }

    pub(crate) fn clear(&self) {
        self.0.store(None);
    }

    /// Take the handle out, leaving the slot empty.
    pub(crate) fn take(&self) -> Option<Thread> {
        self.0.swap(None).map(|inner| Thread { inner })
    }

    pub(crate) fn is_some(&self) -> bool {
        self.0.load().is_some()
    }

    /// Whether the slot holds `thread`.
    pub(crate) fn holds(&self, thread: &Thread) -> bool {
        match &*self.0.load() {
            Some(inner) => Arc::ptr_eq(inner, &thread.inner),
            None => false,
        }
    }

    /// Whether the slot holds the calling thread.
    pub(crate) fn holds_current(&self) -> bool {
        CURRENT.with(|t| self.holds(t))
    }

    /// Unpark the held thread, if any.
    pub(crate) fn unpark(&self) {
        if let Some(inner) = self.0.load_full() {
            inner.parker.unpark();
        }
    }
}

impl fmt::Debug for ThreadSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ThreadSlot").field(&self.get()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_is_stable_within_a_thread() {
        let a = current();
        let b = current();
        assert_eq!(a, b);
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn distinct_threads_have_distinct_ids() {
        let here = current().id();
        let there = std::thread::spawn(|| current().id()).join().unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn permit_before_park_is_not_lost() {
        current().unpark();
        park(); // returns immediately
    }

    #[test]
    fn permits_do_not_accumulate() {
        let me = current();
        me.unpark();
        me.unpark();
        park();
        let start = Instant::now();
        park_timeout(Duration::from_millis(30));
        assert!(start.elapsed() >= Duration::from_millis(1));
    }

    #[test]
    fn interrupt_flag_is_cleared_by_interrupted() {
        current().interrupt();
        assert!(current().is_interrupted());
        assert!(interrupted());
        assert!(!interrupted());
        // interrupt() also left a permit behind; consume it.
        park_timeout(Duration::from_millis(1));
    }

    #[test]
    fn slot_tracks_holder() {
        let slot = ThreadSlot::empty();
        assert!(!slot.is_some());
        slot.set(Some(current()));
        assert!(slot.holds_current());
        assert_eq!(slot.take(), Some(current()));
        assert!(!slot.holds_current());
    }
}
