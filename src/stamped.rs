// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Capability-based lock with write, read and optimistic read modes.
//
// The state word packs a version (seqlock) with a reader count:
//
//   bits 0..=6   readers (RBITS == 127 is the overflow spin-bit sentinel)
//   bit  7       writer
//   bits 8..     version, advanced by every write lock and unlock
//
// Waiters use a CLH queue of their own. Readers arriving behind a reader
// tail push themselves onto that node's `cowait` stack and are released
// together with it.
//
// Ownership runs from the tail toward the head: `prev` and `cowait` are
// strong, `next` is a weak hint. The node graph is therefore acyclic and
// every node is freed once no queue link or waiting thread holds it.

use std::fmt;
use std::sync::atomic::{fence, AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use arc_swap::{ArcSwapOption, ArcSwapWeak, RefCnt};

use crate::error::{LockError, Result};
use crate::lock::Lock;
use crate::node::{addr, cas_link, link_addr, points_to};
use crate::spin::{next_seed, spin_counts, SpinPolicy};
use crate::thread::{self, ThreadSlot};

const LG_READERS: u32 = 7;

const RUNIT: u64 = 1;
const WBIT: u64 = 1 << LG_READERS;
const RBITS: u64 = WBIT - 1;
const RFULL: u64 = RBITS - 1;
const ABITS: u64 = RBITS | WBIT;
const SBITS: u64 = !RBITS;

/// Initial state; never zero so that no stamp is zero.
const ORIGIN: u64 = WBIT << 1;

const WAITING: i32 = -1;
const CANCELLED: i32 = 1;

/// Token returned by every successful acquisition.
///
/// Lock stamps must be passed back to the matching unlock or conversion.
/// Optimistic stamps are only meaningful to [`StampedLock::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stamp(u64);

impl Stamp {
    /// The raw stamp value. Never zero.
    pub fn get(self) -> u64 {
        self.0
    }

    /// Whether this stamp represents holding the write lock.
    pub fn is_write(self) -> bool {
        self.0 & WBIT != 0
    }

    /// Whether this stamp represents holding a read lock.
    pub fn is_read(self) -> bool {
        self.0 & RBITS != 0
    }

    /// Whether this stamp represents holding any lock.
    pub fn is_lock(self) -> bool {
        self.0 & ABITS != 0
    }

    /// Whether this stamp came from a successful optimistic read.
    pub fn is_optimistic(self) -> bool {
        self.0 & ABITS == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WMode {
    Read,
    Write,
}

struct WNode {
    prev: ArcSwapOption<WNode>,
    next: ArcSwapWeak<WNode>,
    /// Readers waiting on this reader node.
    cowait: ArcSwapOption<WNode>,
    thread: ThreadSlot,
    status: AtomicI32,
    mode: WMode,
}

impl WNode {
    fn new(mode: WMode, prev: Option<Arc<WNode>>) -> Arc<Self> {
        Arc::new(Self {
            prev: ArcSwapOption::new(prev),
            next: ArcSwapWeak::new(Weak::new()),
            cowait: ArcSwapOption::const_empty(),
            thread: ThreadSlot::empty(),
            status: AtomicI32::new(0),
            mode,
        })
    }

    fn status(&self) -> i32 {
        self.status.load(Ordering::SeqCst)
    }

    fn cas_status(&self, current: i32, new: i32) -> bool {
        self.status
            .compare_exchange(current, new, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Successor hint. `None` when unset or the successor is gone.
    fn next(&self) -> Option<Arc<WNode>> {
        self.next.load().upgrade()
    }

    fn set_next(&self, n: &Arc<WNode>) {
        self.next.store(Arc::downgrade(n));
    }

    /// Replace the successor hint if it still refers to `current`. The
    /// caller keeps `current` alive (an `Arc` or a loaded guard) across
    /// the call.
    fn cas_next(&self, current: *const WNode, new: Option<&Arc<WNode>>) -> bool {
        let new = new.map_or_else(Weak::new, Arc::downgrade);
        let prev = self.next.compare_and_swap(current, new);
        weak_addr(&prev) == current
    }
}

/// Address a weak link refers to; null for an empty link.
#[inline]
fn weak_addr(w: &Weak<WNode>) -> *const WNode {
    <Weak<WNode> as RefCnt>::as_ptr(w)
}

/// Outcome of a queued acquisition.
enum Acquired {
    Stamp(u64),
    TimedOut,
    Interrupted,
}

impl Acquired {
    fn into_stamp(self) -> Result<Option<Stamp>> {
        match self {
            Acquired::Stamp(s) => Ok(Some(Stamp(s))),
            Acquired::TimedOut => Ok(None),
            Acquired::Interrupted => Err(LockError::Interrupted),
        }
    }
}

/// A lock with three modes of access controlled by [`Stamp`]s.
///
/// * Write: exclusive. [`write_lock`](Self::write_lock) blocks until no
///   reader or writer holds the lock.
/// * Read: shared among readers. [`read_lock`](Self::read_lock) blocks
///   while a writer holds the lock.
/// * Optimistic read: [`try_optimistic_read`](Self::try_optimistic_read)
///   takes no lock at all; [`validate`](Self::validate) reports whether a
///   writer intervened.
///
/// Not reentrant and not owned: any thread may unlock with a valid stamp.
/// Admission between readers and writers is best effort; there is no
/// strict fairness.
pub struct StampedLock {
    state: AtomicU64,
    /// Readers beyond `RFULL`. Only changed while holding the spin-bit.
    reader_overflow: AtomicU64,
    whead: ArcSwapOption<WNode>,
    wtail: ArcSwapOption<WNode>,
    spin: SpinPolicy,
}

impl StampedLock {
    pub fn new() -> Self {
        Self::with_spin_policy(SpinPolicy::default())
    }

    /// Create a lock with explicit spin counts.
    pub fn with_spin_policy(spin: SpinPolicy) -> Self {
        Self {
            state: AtomicU64::new(ORIGIN),
            reader_overflow: AtomicU64::new(0),
            whead: ArcSwapOption::const_empty(),
            wtail: ArcSwapOption::const_empty(),
            spin,
        }
    }

    pub fn spin_policy(&self) -> SpinPolicy {
        self.spin
    }

    #[inline]
    fn state(&self) -> u64 {
        self.state.load(Ordering::SeqCst)
    }

    #[inline]
    fn cas_state(&self, current: u64, new: u64) -> bool {
        self.state
            .compare_exchange(current, new, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    #[inline]
    fn queue_is_empty(&self) -> bool {
        link_addr(&self.whead) == link_addr(&self.wtail)
    }

    // -----------------------------------------------------------------------
    // Write mode
    // -----------------------------------------------------------------------

    /// Exclusively acquire, blocking until available.
    pub fn write_lock(&self) -> Stamp {
        let s = self.state();
        if s & ABITS == 0 && self.cas_state(s, s + WBIT) {
            return Stamp(s + WBIT);
        }
        match self.acquire_write(false, None) {
            Acquired::Stamp(s) => Stamp(s),
            Acquired::TimedOut | Acquired::Interrupted => {
                unreachable!("untimed uninterruptible acquire was cancelled")
            }
        }
    }

    /// Exclusively acquire if immediately available.
    pub fn try_write_lock(&self) -> Option<Stamp> {
        let s = self.state();
        (s & ABITS == 0 && self.cas_state(s, s + WBIT)).then_some(Stamp(s + WBIT))
    }

    /// Exclusively acquire, giving up after `timeout`. `Ok(None)` on timeout.
    pub fn try_write_lock_for(&self, timeout: Duration) -> Result<Option<Stamp>> {
        if thread::interrupted() {
            return Err(LockError::Interrupted);
        }
        if let Some(stamp) = self.try_write_lock() {
            return Ok(Some(stamp));
        }
        if timeout.is_zero() {
            return Ok(None);
        }
        self.acquire_write(true, Instant::now().checked_add(timeout))
            .into_stamp()
    }

    /// Exclusively acquire, failing with [`LockError::Interrupted`] if the
    /// thread is interrupted first.
    pub fn write_lock_interruptibly(&self) -> Result<Stamp> {
        if thread::interrupted() {
            return Err(LockError::Interrupted);
        }
        match self.acquire_write(true, None) {
            Acquired::Stamp(s) => Ok(Stamp(s)),
            _ => Err(LockError::Interrupted),
        }
    }

    // -----------------------------------------------------------------------
    // Read mode
    // -----------------------------------------------------------------------

    /// Non-exclusively acquire, blocking while a writer holds the lock.
    pub fn read_lock(&self) -> Stamp {
        let s = self.state();
        if self.queue_is_empty() && s & ABITS < RFULL && self.cas_state(s, s + RUNIT) {
            return Stamp(s + RUNIT);
        }
        match self.acquire_read(false, None) {
            Acquired::Stamp(s) => Stamp(s),
            Acquired::TimedOut | Acquired::Interrupted => {
                unreachable!("untimed uninterruptible acquire was cancelled")
            }
        }
    }

    /// Non-exclusively acquire if no writer holds the lock.
    pub fn try_read_lock(&self) -> Option<Stamp> {
        loop {
            let s = self.state();
            let m = s & ABITS;
            if m == WBIT {
                return None;
            } else if m < RFULL {
                if self.cas_state(s, s + RUNIT) {
                    return Some(Stamp(s + RUNIT));
                }
            } else if let Some(next) = self.try_inc_reader_overflow(s) {
                return Some(Stamp(next));
            }
        }
    }

    /// Non-exclusively acquire, giving up after `timeout`.
    pub fn try_read_lock_for(&self, timeout: Duration) -> Result<Option<Stamp>> {
        if thread::interrupted() {
            return Err(LockError::Interrupted);
        }
        let s = self.state();
        let m = s & ABITS;
        if m != WBIT {
            if m < RFULL {
                if self.cas_state(s, s + RUNIT) {
                    return Ok(Some(Stamp(s + RUNIT)));
                }
            } else if let Some(next) = self.try_inc_reader_overflow(s) {
                return Ok(Some(Stamp(next)));
            }
        }
        if timeout.is_zero() {
            return Ok(None);
        }
        self.acquire_read(true, Instant::now().checked_add(timeout))
            .into_stamp()
    }

    pub fn read_lock_interruptibly(&self) -> Result<Stamp> {
        if thread::interrupted() {
            return Err(LockError::Interrupted);
        }
        match self.acquire_read(true, None) {
            Acquired::Stamp(s) => Ok(Stamp(s)),
            _ => Err(LockError::Interrupted),
        }
    }

    // -----------------------------------------------------------------------
    // Optimistic reads
    // -----------------------------------------------------------------------

    /// Stamp to validate later, or `None` if write-locked.
    pub fn try_optimistic_read(&self) -> Option<Stamp> {
        let s = self.state();
        (s & WBIT == 0).then_some(Stamp(s & SBITS))
    }

    /// Whether no write lock was acquired since `stamp` was issued.
    ///
    /// Always true for a currently held lock stamp. Reads made under an
    /// optimistic stamp must be treated as possibly inconsistent until
    /// this returns true.
    pub fn validate(&self, stamp: Stamp) -> bool {
        fence(Ordering::Acquire);
        stamp.0 & SBITS == self.state.load(Ordering::Relaxed) & SBITS
    }

    // -----------------------------------------------------------------------
    // Release
    // -----------------------------------------------------------------------

    /// Version after releasing the write lock held in state `s`.
    #[inline]
    fn next_write_version(s: u64) -> u64 {
        match s.wrapping_add(WBIT) {
            0 => ORIGIN,
            next => next,
        }
    }

    fn release_head(&self) {
        if let Some(h) = self.whead.load_full() {
            if h.status() != 0 {
                self.release(&h);
            }
        }
    }

    /// Release the write lock held with `stamp`.
    pub fn unlock_write(&self, stamp: Stamp) -> Result<()> {
        if self.state() != stamp.0 || stamp.0 & WBIT == 0 {
            tracing::debug!(stamp = stamp.0, "unlock_write with mismatched stamp");
            return Err(LockError::IllegalMonitorState("stamp does not match write lock"));
        }
        self.state.store(Self::next_write_version(stamp.0), Ordering::SeqCst);
        self.release_head();
        Ok(())
    }

    /// Release one read hold taken with `stamp`.
    pub fn unlock_read(&self, stamp: Stamp) -> Result<()> {
        loop {
            let s = self.state();
            let m = s & ABITS;
            if s & SBITS != stamp.0 & SBITS || stamp.0 & ABITS == 0 || m == 0 || m == WBIT {
                tracing::debug!(stamp = stamp.0, "unlock_read with mismatched stamp");
                return Err(LockError::IllegalMonitorState("stamp does not match read lock"));
            }
            if m < RFULL {
                if self.cas_state(s, s - RUNIT) {
                    if m == RUNIT {
                        self.release_head();
                    }
                    return Ok(());
                }
            } else if self.try_dec_reader_overflow(s).is_some() {
                return Ok(());
            }
        }
    }

    /// Release whichever lock mode `stamp` represents.
    pub fn unlock(&self, stamp: Stamp) -> Result<()> {
        let a = stamp.0 & ABITS;
        loop {
            let s = self.state();
            if s & SBITS != stamp.0 & SBITS {
                break;
            }
            let m = s & ABITS;
            if m == 0 {
                break;
            } else if m == WBIT {
                if a != m {
                    break;
                }
                self.state.store(Self::next_write_version(s), Ordering::SeqCst);
                self.release_head();
                return Ok(());
            } else if a == 0 || a >= WBIT {
                break;
            } else if m < RFULL {
                if self.cas_state(s, s - RUNIT) {
                    if m == RUNIT {
                        self.release_head();
                    }
                    return Ok(());
                }
            } else if self.try_dec_reader_overflow(s).is_some() {
                return Ok(());
            }
        }
        tracing::debug!(stamp = stamp.0, "unlock with mismatched stamp");
        Err(LockError::IllegalMonitorState("stamp does not match lock state"))
    }

    /// Release the write lock without a stamp. Useful for recovery after
    /// errors. Returns whether it was held.
    pub fn try_unlock_write(&self) -> bool {
        let s = self.state();
        if s & WBIT == 0 {
            return false;
        }
        self.state.store(Self::next_write_version(s), Ordering::SeqCst);
        self.release_head();
        true
    }

    /// Release one read hold without a stamp. Returns whether one was held.
    pub fn try_unlock_read(&self) -> bool {
        loop {
            let s = self.state();
            let m = s & ABITS;
            if m == 0 || m >= WBIT {
                return false;
            }
            if m < RFULL {
                if self.cas_state(s, s - RUNIT) {
                    if m == RUNIT {
                        self.release_head();
                    }
                    return true;
                }
            } else if self.try_dec_reader_overflow(s).is_some() {
                return true;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Conversions
    // -----------------------------------------------------------------------

    /// Upgrade to the write lock if that needs no waiting.
    ///
    /// Succeeds when `stamp` is the write stamp itself, when it is the only
    /// read hold, or when it is a still valid optimistic stamp and the lock
    /// is free. Returns the write stamp.
    pub fn try_convert_to_write_lock(&self, stamp: Stamp) -> Option<Stamp> {
        let a = stamp.0 & ABITS;
        loop {
            let s = self.state();
            if s & SBITS != stamp.0 & SBITS {
                return None;
            }
            let m = s & ABITS;
            if m == 0 {
                if a != 0 {
                    return None;
                }
                if self.cas_state(s, s + WBIT) {
                    return Some(Stamp(s + WBIT));
                }
            } else if m == WBIT {
                return (a == m).then_some(stamp);
            } else if m == RUNIT && a != 0 {
                if self.cas_state(s, s - RUNIT + WBIT) {
                    return Some(Stamp(s - RUNIT + WBIT));
                }
            } else {
                return None;
            }
        }
    }

    /// Downgrade the write lock to a read lock, keep a read stamp, or take
    /// a read lock for a valid optimistic stamp.
    pub fn try_convert_to_read_lock(&self, stamp: Stamp) -> Option<Stamp> {
        let a = stamp.0 & ABITS;
        loop {
            let s = self.state();
            if s & SBITS != stamp.0 & SBITS {
                return None;
            }
            let m = s & ABITS;
            if m == 0 {
                if a != 0 {
                    return None;
                }
                if let Some(next) = self.try_inc_reader(s) {
                    return Some(Stamp(next));
                }
            } else if m == WBIT {
                if a != m {
                    return None;
                }
                let next = Self::next_write_version(s) + RUNIT;
                self.state.store(next, Ordering::SeqCst);
                self.release_head();
                return Some(Stamp(next));
            } else if a != 0 && a < WBIT {
                return Some(stamp);
            } else {
                return None;
            }
        }
    }

    /// Release any lock `stamp` holds and return an optimistic stamp for
    /// the resulting state. `None` if `stamp` no longer matches.
    pub fn try_convert_to_optimistic_read(&self, stamp: Stamp) -> Option<Stamp> {
        let a = stamp.0 & ABITS;
        fence(Ordering::Acquire);
        loop {
            let s = self.state();
            if s & SBITS != stamp.0 & SBITS {
                return None;
            }
            let m = s & ABITS;
            if m == 0 {
                return (a == 0).then_some(Stamp(s));
            } else if m == WBIT {
                if a != m {
                    return None;
                }
                let next = Self::next_write_version(s);
                self.state.store(next, Ordering::SeqCst);
                self.release_head();
                return Some(Stamp(next));
            } else if a == 0 || a >= WBIT {
                return None;
            } else if m < RFULL {
                if self.cas_state(s, s - RUNIT) {
                    if m == RUNIT {
                        self.release_head();
                    }
                    return Some(Stamp((s - RUNIT) & SBITS));
                }
            } else if let Some(next) = self.try_dec_reader_overflow(s) {
                return Some(Stamp(next & SBITS));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub fn is_write_locked(&self) -> bool {
        self.state() & WBIT != 0
    }

    pub fn is_read_locked(&self) -> bool {
        self.state() & RBITS != 0
    }

    /// Number of read holds. Only an estimate while readers come and go.
    pub fn read_lock_count(&self) -> u64 {
        let s = self.state();
        let readers = s & RBITS;
        if readers >= RFULL {
            RFULL + self.reader_overflow.load(Ordering::Relaxed)
        } else {
            readers
        }
    }

    /// View implementing [`Lock`] through read mode.
    pub fn as_read_lock(&self) -> ReadLockView<'_> {
        ReadLockView { lock: self }
    }

    /// View implementing [`Lock`] through write mode.
    pub fn as_write_lock(&self) -> WriteLockView<'_> {
        WriteLockView { lock: self }
    }

    // -----------------------------------------------------------------------
    // Reader overflow
    // -----------------------------------------------------------------------

    /// One read acquisition attempt on state `s`, spilling into the
    /// overflow counter when the packed count is full.
    #[inline]
    fn try_inc_reader(&self, s: u64) -> Option<u64> {
        let m = s & ABITS;
        if m < RFULL {
            self.cas_state(s, s + RUNIT).then_some(s + RUNIT)
        } else if m < WBIT {
            self.try_inc_reader_overflow(s)
        } else {
            None
        }
    }

    fn try_inc_reader_overflow(&self, s: u64) -> Option<u64> {
        if s & ABITS == RFULL {
            if self.cas_state(s, s | RBITS) {
                let n = self.reader_overflow.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::trace!(overflow = n, "reader count spilled");
                self.state.store(s, Ordering::SeqCst);
                return Some(s);
            }
        } else if next_seed() & self.spin.overflow_yield_mask == 0 {
            std::thread::yield_now();
        }
        None
    }

    fn try_dec_reader_overflow(&self, s: u64) -> Option<u64> {
        if s & ABITS == RFULL {
            if self.cas_state(s, s | RBITS) {
                let r = self.reader_overflow.load(Ordering::Relaxed);
                let next = if r > 0 {
                    self.reader_overflow.store(r - 1, Ordering::Relaxed);
                    s
                } else {
                    s - RUNIT
                };
                self.state.store(next, Ordering::SeqCst);
                return Some(next);
            }
        } else if next_seed() & self.spin.overflow_yield_mask == 0 {
            std::thread::yield_now();
        }
        None
    }

    // -----------------------------------------------------------------------
    // Queue
    // -----------------------------------------------------------------------

    fn init_queue(&self) {
        let hd = WNode::new(WMode::Write, None);
        if cas_link(&self.whead, None, Some(Arc::clone(&hd))) {
            self.wtail.store(Some(hd));
        }
    }

    /// Wake the successor of `h`, scanning back from the tail when the
    /// `next` hint is missing or cancelled.
    fn release(&self, h: &Arc<WNode>) {
        h.cas_status(WAITING, 0);
        if let Some(q) = self.first_waiter(h) {
            q.thread.unpark();
        }
    }

    /// First waiter behind head `h` that has not been cancelled.
    fn first_waiter(&self, h: &Arc<WNode>) -> Option<Arc<WNode>> {
        let mut q = h.next();
        if q.as_ref().map_or(true, |q| q.status() == CANCELLED) {
            let mut t = self.wtail.load_full();
            while let Some(n) = t {
                if Arc::ptr_eq(&n, h) {
                    break;
                }
                t = n.prev.load_full();
                if n.status() <= 0 {
                    q = Some(n);
                }
            }
        }
        q
    }

    /// Pop one reader off `h`'s cowait stack and wake it.
    fn pop_cowaiter(h: &WNode) -> bool {
        let Some(c) = h.cowait.load_full() else {
            return false;
        };
        if cas_link(&h.cowait, Some(&c), c.cowait.load_full()) {
            c.thread.unpark();
        }
        true
    }

    fn release_cowaiters(h: &WNode) {
        while Self::pop_cowaiter(h) {}
    }

    /// Remaining wait for `deadline`, or `Err` once it has passed.
    fn remaining(deadline: Option<Instant>) -> std::result::Result<Option<Duration>, ()> {
        match deadline {
            None => Ok(None),
            Some(d) => {
                let now = Instant::now();
                if now >= d {
                    Err(())
                } else {
                    Ok(Some(d - now))
                }
            }
        }
    }

    fn park(timeout: Option<Duration>) {
        match timeout {
            None => thread::park(),
            Some(t) => thread::park_timeout(t),
        }
    }

    fn acquire_write(&self, interruptible: bool, deadline: Option<Instant>) -> Acquired {
        let mut node: Option<Arc<WNode>> = None;
        let mut spins: i64 = -1;

        // Spin while enqueuing.
        let (node, mut p) = loop {
            let s = self.state();
            let m = s & ABITS;
            if m == 0 {
                if self.cas_state(s, s + WBIT) {
                    return Acquired::Stamp(s + WBIT);
                }
            } else if spins < 0 {
                spins = if m == WBIT && self.queue_is_empty() {
                    i64::from(self.spin.spins)
                } else {
                    0
                };
            } else if spins > 0 {
                if spin_counts() {
                    spins -= 1;
                }
            } else if let Some(tail) = self.wtail.load_full() {
                match node.clone() {
                    None => node = Some(WNode::new(WMode::Write, Some(tail))),
                    Some(n) => {
                        if !points_to(&n.prev, &tail) {
                            n.prev.store(Some(tail));
                        } else if cas_link(&self.wtail, Some(&tail), Some(Arc::clone(&n))) {
                            tail.set_next(&n);
                            break (n, tail);
                        }
                    }
                }
            } else {
                self.init_queue();
            }
        };

        let mut spins: i64 = -1;
        loop {
            let h = self.whead.load_full();
            if addr(&h) == Arc::as_ptr(&p) {
                spins = self.next_head_spins(spins);
                let mut k = spins;
                loop {
                    let s = self.state();
                    if s & ABITS == 0 {
                        if self.cas_state(s, s + WBIT) {
                            self.whead.store(Some(Arc::clone(&node)));
                            node.prev.store(None);
                            return Acquired::Stamp(s + WBIT);
                        }
                    } else if spin_counts() {
                        k -= 1;
                        if k <= 0 {
                            break;
                        }
                    }
                }
            } else if let Some(h) = &h {
                Self::release_cowaiters(h);
            }

            if link_addr(&self.whead) != addr(&h) {
                continue;
            }
            let np = node.prev.load_full();
            if addr(&np) != Arc::as_ptr(&p) {
                // Predecessor changed under us: follow it.
                if let Some(np) = np {
                    np.set_next(&node);
                    p = np;
                }
                continue;
            }
            let ps = p.status();
            if ps == 0 {
                p.cas_status(0, WAITING);
            } else if ps == CANCELLED {
                if let Some(pp) = p.prev.load_full() {
                    node.prev.store(Some(Arc::clone(&pp)));
                    pp.set_next(&node);
                }
            } else {
                let Ok(timeout) = Self::remaining(deadline) else {
                    return self.cancel_waiter(&node, &node, false);
                };
                node.thread.set(Some(thread::current()));
                if p.status() < 0
                    && (addr(&h) != Arc::as_ptr(&p) || self.state() & ABITS != 0)
                    && link_addr(&self.whead) == addr(&h)
                    && points_to(&node.prev, &p)
                {
                    Self::park(timeout);
                }
                node.thread.clear();
                if interruptible && thread::interrupted() {
                    return self.cancel_waiter(&node, &node, true);
                }
            }
        }
    }

    fn acquire_read(&self, interruptible: bool, deadline: Option<Instant>) -> Acquired {
        let mut node: Option<Arc<WNode>> = None;
        let mut spins: i64 = -1;

        let (node, mut p) = loop {
            let mut h = self.whead.load_full();
            let mut p = self.wtail.load_full();
            if addr(&h) == addr(&p) {
                loop {
                    let s = self.state();
                    let m = s & ABITS;
                    if let Some(ns) = self.try_inc_reader(s) {
                        return Acquired::Stamp(ns);
                    }
                    if m >= WBIT {
                        if spins > 0 {
                            if spin_counts() {
                                spins -= 1;
                            }
                        } else {
                            if spins == 0 {
                                let nh = self.whead.load_full();
                                let np = self.wtail.load_full();
                                let unchanged = addr(&nh) == addr(&h) && addr(&np) == addr(&p);
                                h = nh;
                                p = np;
                                if unchanged || addr(&h) != addr(&p) {
                                    break;
                                }
                            }
                            spins = i64::from(self.spin.spins);
                        }
                    }
                }
            }

            let Some(tail) = p else {
                self.init_queue();
                continue;
            };
            let Some(n) = node.clone() else {
                node = Some(WNode::new(WMode::Read, Some(tail)));
                continue;
            };
            if addr(&h) == Arc::as_ptr(&tail) || tail.mode != WMode::Read {
                if !points_to(&n.prev, &tail) {
                    n.prev.store(Some(tail));
                } else if cas_link(&self.wtail, Some(&tail), Some(Arc::clone(&n))) {
                    tail.set_next(&n);
                    break (n, tail);
                }
                continue;
            }

            // Tail is a waiting reader: join its group. Cowaiters keep no
            // link back to the group.
            n.prev.store(None);
            let top = tail.cowait.load_full();
            n.cowait.store(top.clone());
            if !cas_link(&tail.cowait, top.as_ref(), Some(Arc::clone(&n))) {
                n.cowait.store(None);
                continue;
            }
            if let Some(result) = self.await_group(&n, &tail, interruptible, deadline) {
                return result;
            }
            // Group went stale; start over with a fresh node.
            node = None;
        };

        let mut spins: i64 = -1;
        loop {
            let h = self.whead.load_full();
            if addr(&h) == Arc::as_ptr(&p) {
                spins = self.next_head_spins(spins);
                let mut k = spins;
                loop {
                    let s = self.state();
                    let m = s & ABITS;
                    if let Some(ns) = self.try_inc_reader(s) {
                        self.whead.store(Some(Arc::clone(&node)));
                        node.prev.store(None);
                        Self::release_cowaiters(&node);
                        return Acquired::Stamp(ns);
                    } else if m >= WBIT && spin_counts() {
                        k -= 1;
                        if k <= 0 {
                            break;
                        }
                    }
                }
            } else if let Some(h) = &h {
                Self::release_cowaiters(h);
            }

            if link_addr(&self.whead) != addr(&h) {
                continue;
            }
            let np = node.prev.load_full();
            if addr(&np) != Arc::as_ptr(&p) {
                if let Some(np) = np {
                    np.set_next(&node);
                    p = np;
                }
                continue;
            }
            let ps = p.status();
            if ps == 0 {
                p.cas_status(0, WAITING);
            } else if ps == CANCELLED {
                if let Some(pp) = p.prev.load_full() {
                    node.prev.store(Some(Arc::clone(&pp)));
                    pp.set_next(&node);
                }
            } else {
                let Ok(timeout) = Self::remaining(deadline) else {
                    return self.cancel_waiter(&node, &node, false);
                };
                node.thread.set(Some(thread::current()));
                if p.status() < 0
                    && (addr(&h) != Arc::as_ptr(&p) || self.state() & ABITS == WBIT)
                    && link_addr(&self.whead) == addr(&h)
                    && points_to(&node.prev, &p)
                {
                    Self::park(timeout);
                }
                node.thread.clear();
                if interruptible && thread::interrupted() {
                    return self.cancel_waiter(&node, &node, true);
                }
            }
        }
    }

    /// Wait as a cowaiter of reader node `p`. Returns `None` when `p`'s
    /// group can no longer be released through the queue and the caller
    /// must enqueue again.
    fn await_group(
        &self,
        node: &Arc<WNode>,
        p: &Arc<WNode>,
        interruptible: bool,
        deadline: Option<Instant>,
    ) -> Option<Acquired> {
        loop {
            let h = self.whead.load_full();
            if let Some(h) = &h {
                Self::pop_cowaiter(h);
            }
            let pp = p.prev.load_full();
            if addr(&h) == addr(&pp) || addr(&h) == Arc::as_ptr(p) || pp.is_none() {
                loop {
                    let s = self.state();
                    if let Some(ns) = self.try_inc_reader(s) {
                        return Some(Acquired::Stamp(ns));
                    }
                    if s & ABITS >= WBIT {
                        break;
                    }
                }
            }
            if link_addr(&self.whead) != addr(&h) || link_addr(&p.prev) != addr(&pp) {
                continue;
            }
            if pp.is_none() || addr(&h) == Arc::as_ptr(p) || p.status() > 0 {
                return None;
            }
            let Ok(timeout) = Self::remaining(deadline) else {
                return Some(self.cancel_waiter(node, p, false));
            };
            node.thread.set(Some(thread::current()));
            if (addr(&h) != addr(&pp) || self.state() & ABITS == WBIT)
                && link_addr(&self.whead) == addr(&h)
                && link_addr(&p.prev) == addr(&pp)
            {
                Self::park(timeout);
            }
            node.thread.clear();
            if interruptible && thread::interrupted() {
                return Some(self.cancel_waiter(node, p, true));
            }
        }
    }

    fn next_head_spins(&self, spins: i64) -> i64 {
        if spins < 0 {
            i64::from(self.spin.head_spins)
        } else if spins < i64::from(self.spin.max_head_spins) {
            spins << 1
        } else {
            spins
        }
    }

    /// Cancel `node`, a member of `group` (either a queued node or a reader
    /// on the group's cowait stack), unsplice it and forward any wakeup it
    /// may have absorbed.
    fn cancel_waiter(&self, node: &Arc<WNode>, group: &Arc<WNode>, interrupted: bool) -> Acquired {
        node.status.store(CANCELLED, Ordering::SeqCst);
        tracing::trace!(interrupted, mode = ?node.mode, "stamped waiter cancelled");

        let mut p = Arc::clone(group);
        while let Some(q) = p.cowait.load_full() {
            if q.status() == CANCELLED {
                cas_link(&p.cowait, Some(&q), q.cowait.load_full());
                p = Arc::clone(group);
            } else {
                p = q;
            }
        }

        if Arc::ptr_eq(node, group) {
            let mut r = group.cowait.load_full();
            while let Some(c) = r {
                c.thread.unpark();
                r = c.cowait.load_full();
            }
            self.unsplice(node);
        }

        // Possibly release the first waiter. Once the lock is free no
        // unlock is coming, so the head's status is not consulted.
        while let Some(h) = self.whead.load_full() {
            let q = self.first_waiter(&h);
            if points_to(&self.whead, &h) {
                if let Some(q) = q {
                    let m = self.state() & ABITS;
                    let eligible = match q.mode {
                        WMode::Read => m != WBIT,
                        WMode::Write => m == 0,
                    };
                    if eligible {
                        self.release(&h);
                    }
                }
                break;
            }
        }

        if interrupted || thread::interrupted() {
            Acquired::Interrupted
        } else {
            Acquired::TimedOut
        }
    }

    /// Unlink a cancelled queued node and wake its first live successor.
    fn unsplice(&self, node: &Arc<WNode>) {
        let mut pred = node.prev.load_full();
        while let Some(pr) = pred {
            let succ = loop {
                let cur = node.next.load();
                let succ = cur.upgrade();
                if succ.as_ref().is_some_and(|s| s.status() != CANCELLED) {
                    break succ;
                }
                let mut q: Option<Arc<WNode>> = None;
                let mut t = self.wtail.load_full();
                while let Some(n) = t {
                    if Arc::ptr_eq(&n, node) {
                        break;
                    }
                    t = n.prev.load_full();
                    if n.status() != CANCELLED {
                        q = Some(n);
                    }
                }
                if addr(&succ) == addr(&q) || node.cas_next(weak_addr(&cur), q.as_ref()) {
                    if q.is_none() && points_to(&self.wtail, node) {
                        cas_link(&self.wtail, Some(node), Some(Arc::clone(&pr)));
                    }
                    break q;
                }
            };

            pr.cas_next(Arc::as_ptr(node), succ.as_ref());
            if let Some(s) = &succ {
                if let Some(w) = s.thread.take() {
                    w.unpark();
                }
            }
            if pr.status() != CANCELLED {
                break;
            }
            let Some(pp) = pr.prev.load_full() else {
                break;
            };
            node.prev.store(Some(Arc::clone(&pp)));
            pp.cas_next(Arc::as_ptr(&pr), succ.as_ref());
            pred = Some(pp);
        }
    }
}

impl Default for StampedLock {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for StampedLock {
    fn drop(&mut self) {
        // Unlink iteratively so a long `prev` chain is not dropped
        // recursively.
        let mut cur = self.wtail.swap(None);
        while let Some(n) = cur {
            n.cowait.store(None);
            cur = n.prev.swap(None);
        }
        if let Some(h) = self.whead.swap(None) {
            h.cowait.store(None);
        }
    }
}

impl fmt::Debug for StampedLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.state();
        let mode = if s & WBIT != 0 {
            "write-locked"
        } else if s & RBITS != 0 {
            "read-locked"
        } else {
            "unlocked"
        };
        f.debug_struct("StampedLock")
            .field("state", &mode)
            .field("readers", &self.read_lock_count())
            .finish()
    }
}

/// Read mode of a [`StampedLock`] seen through the [`Lock`] trait.
///
/// `unlock` releases any read hold, as stamps are not tracked.
#[derive(Debug, Clone, Copy)]
pub struct ReadLockView<'a> {
    lock: &'a StampedLock,
}

impl Lock for ReadLockView<'_> {
    fn lock(&self) -> Result<()> {
        self.lock.read_lock();
        Ok(())
    }

    fn lock_interruptibly(&self) -> Result<()> {
        self.lock.read_lock_interruptibly().map(|_| ())
    }

    fn try_lock(&self) -> Result<bool> {
        Ok(self.lock.try_read_lock().is_some())
    }

    fn try_lock_for(&self, timeout: Duration) -> Result<bool> {
        Ok(self.lock.try_read_lock_for(timeout)?.is_some())
    }

    fn unlock(&self) -> Result<()> {
        if self.lock.try_unlock_read() {
            Ok(())
        } else {
            Err(LockError::IllegalMonitorState("read lock not held"))
        }
    }
}

/// Write mode of a [`StampedLock`] seen through the [`Lock`] trait.
#[derive(Debug, Clone, Copy)]
pub struct WriteLockView<'a> {
    lock: &'a StampedLock,
}

impl Lock for WriteLockView<'_> {
    fn lock(&self) -> Result<()> {
        self.lock.write_lock();
        Ok(())
    }

    fn lock_interruptibly(&self) -> Result<()> {
        self.lock.write_lock_interruptibly().map(|_| ())
    }

    fn try_lock(&self) -> Result<bool> {
        Ok(self.lock.try_write_lock().is_some())
    }

    fn try_lock_for(&self, timeout: Duration) -> Result<bool> {
        Ok(self.lock.try_write_lock_for(timeout)?.is_some())
    }

    fn unlock(&self) -> Result<()> {
        if self.lock.try_unlock_write() {
            Ok(())
        } else {
            Err(LockError::IllegalMonitorState("write lock not held"))
        }
    }
}
