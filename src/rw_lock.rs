// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Reentrant read-write lock on a single 32-bit state word.
// - Low 16 bits count the writer's recursive holds.
// - High 16 bits count read holds across all threads.
// Per-thread read hold counts live in a thread-local table keyed by lock id.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::condition::ConditionObject;
use crate::error::{LockError, Result};
use crate::lock::Lock;
use crate::synchronizer::{Policy, SharedAcquire, Synchronizer};
use crate::thread::{self, Thread};

const SHARED_SHIFT: u32 = 16;
const SHARED_UNIT: u32 = 1 << SHARED_SHIFT;
const MAX_COUNT: u32 = (1 << SHARED_SHIFT) - 1;
const EXCLUSIVE_MASK: u32 = (1 << SHARED_SHIFT) - 1;

#[inline]
fn shared_count(c: u32) -> u32 {
    c >> SHARED_SHIFT
}

#[inline]
fn exclusive_count(c: u32) -> u32 {
    c & EXCLUSIVE_MASK
}

thread_local! {
    static READ_HOLDS: RefCell<HashMap<u64, u32>> = RefCell::new(HashMap::new());
}

fn read_holds(lock_id: u64) -> u32 {
    READ_HOLDS.with(|h| h.borrow().get(&lock_id).copied().unwrap_or(0))
}

fn inc_read_holds(lock_id: u64) {
    READ_HOLDS.with(|h| *h.borrow_mut().entry(lock_id).or_insert(0) += 1);
}

/// Drop one read hold of the calling thread; false if it had none.
fn dec_read_holds(lock_id: u64) -> bool {
    READ_HOLDS.with(|h| {
        let mut map = h.borrow_mut();
        match map.get_mut(&lock_id) {
            None => false,
            Some(n) if *n <= 1 => {
                map.remove(&lock_id);
                true
            }
            Some(n) => {
                *n -= 1;
                true
            }
        }
    })
}

/// Policy of [`ReentrantRwLock`].
#[derive(Debug)]
pub struct RwPolicy {
    fair: bool,
    id: u64,
}

impl RwPolicy {
    fn new(fair: bool) -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self {
            fair,
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    fn writer_should_block(&self, sync: &Synchronizer<Self>) -> bool {
        self.fair && sync.has_queued_predecessors()
    }

    fn reader_should_block(&self, sync: &Synchronizer<Self>) -> bool {
        if self.fair {
            sync.has_queued_predecessors()
        } else {
            // Heuristic against writer starvation: yield to a writer that
            // appears to be first in line.
            sync.apparently_first_queued_is_exclusive()
        }
    }

    /// Slow path of shared acquire: handles CAS misses and reentrant reads
    /// that would otherwise be refused by `reader_should_block`.
    fn full_try_acquire_shared(&self, sync: &Synchronizer<Self>) -> Result<SharedAcquire> {
        loop {
            let c = sync.state();
            if exclusive_count(c) != 0 {
                if !sync.is_owned_by_current_thread() {
                    return Ok(SharedAcquire::Failed);
                }
                // Otherwise we hold the write lock; blocking here would
                // deadlock.
            } else if self.reader_should_block(sync) && read_holds(self.id) == 0 {
                return Ok(SharedAcquire::Failed);
            }
            if shared_count(c) == MAX_COUNT {
                return Err(LockError::HoldCountOverflow);
            }
            if sync.compare_and_set_state(c, c + SHARED_UNIT) {
                inc_read_holds(self.id);
                return Ok(SharedAcquire::Propagate);
            }
        }
    }

    /// Barging write acquire used by `WriteLock::try_lock`.
    fn try_write_lock(&self, sync: &Synchronizer<Self>) -> Result<bool> {
        let c = sync.state();
        if c != 0 {
            let w = exclusive_count(c);
            if w == 0 || !sync.is_owned_by_current_thread() {
                return Ok(false);
            }
            if w == MAX_COUNT {
                return Err(LockError::HoldCountOverflow);
            }
        }
        if !sync.compare_and_set_state(c, c + 1) {
            return Ok(false);
        }
        sync.set_exclusive_owner(Some(thread::current()));
        Ok(true)
    }

    /// Barging read acquire used by `ReadLock::try_lock`.
    fn try_read_lock(&self, sync: &Synchronizer<Self>) -> Result<bool> {
        loop {
            let c = sync.state();
            if exclusive_count(c) != 0 && !sync.is_owned_by_current_thread() {
                return Ok(false);
            }
            if shared_count(c) == MAX_COUNT {
                return Err(LockError::HoldCountOverflow);
            }
            if sync.compare_and_set_state(c, c + SHARED_UNIT) {
                inc_read_holds(self.id);
                return Ok(true);
            }
        }
    }
}

impl Policy for RwPolicy {
    type Word = u32;

    fn try_acquire(&self, sync: &Synchronizer<Self>, acquires: u32) -> Result<bool> {
        let c = sync.state();
        let w = exclusive_count(c);
        if c != 0 {
            // Readers present, or another writer.
            if w == 0 || !sync.is_owned_by_current_thread() {
                return Ok(false);
            }
            if w + exclusive_count(acquires) > MAX_COUNT {
                return Err(LockError::HoldCountOverflow);
            }
            sync.set_state(c + acquires);
            return Ok(true);
        }
        if self.writer_should_block(sync) || !sync.compare_and_set_state(c, c + acquires) {
            return Ok(false);
        }
        sync.set_exclusive_owner(Some(thread::current()));
        Ok(true)
    }

    fn try_release(&self, sync: &Synchronizer<Self>, releases: u32) -> Result<bool> {
        if !sync.is_owned_by_current_thread() {
            return Err(LockError::IllegalMonitorState(
                "write unlock of a lock not held by current thread",
            ));
        }
        let next = sync.state() - releases;
        let free = exclusive_count(next) == 0;
        if free {
            sync.set_exclusive_owner(None);
        }
        sync.set_state(next);
        Ok(free)
    }

    fn try_acquire_shared(&self, sync: &Synchronizer<Self>, _unused: u32) -> Result<SharedAcquire> {
        let c = sync.state();
        if exclusive_count(c) != 0 && !sync.is_owned_by_current_thread() {
            return Ok(SharedAcquire::Failed);
        }
        let r = shared_count(c);
        if !self.reader_should_block(sync)
            && r < MAX_COUNT
            && sync.compare_and_set_state(c, c + SHARED_UNIT)
        {
            inc_read_holds(self.id);
            return Ok(SharedAcquire::Propagate);
        }
        self.full_try_acquire_shared(sync)
    }

    fn try_release_shared(&self, sync: &Synchronizer<Self>, _unused: u32) -> Result<bool> {
        if !dec_read_holds(self.id) {
            tracing::debug!(lock = self.id, "unmatched read unlock");
            return Err(LockError::IllegalMonitorState(
                "attempt to unlock read lock, not locked by current thread",
            ));
        }
        loop {
            let c = sync.state();
            let next = c - SHARED_UNIT;
            if sync.compare_and_set_state(c, next) {
                // Releasing the last read hold may let a writer in.
                return Ok(next == 0);
            }
        }
    }

    fn is_held_exclusively(&self, sync: &Synchronizer<Self>) -> bool {
        sync.is_owned_by_current_thread()
    }
}

/// Condition created by [`WriteLock::new_condition`].
pub type WriteCondition = ConditionObject<RwPolicy>;

/// A reentrant read-write lock.
///
/// Any number of readers, or one writer, may hold it. The writer may also
/// acquire the read lock, which makes downgrading possible: take the read
/// lock, then release the write lock. Upgrading read to write is not
/// supported and would deadlock.
///
/// Access the two halves through [`read_lock`](Self::read_lock) and
/// [`write_lock`](Self::write_lock).
pub struct ReentrantRwLock {
    sync: Arc<Synchronizer<RwPolicy>>,
}

impl ReentrantRwLock {
    /// Create an unfair read-write lock.
    pub fn new() -> Self {
        Self::with_fairness(false)
    }

    /// Create a fair read-write lock.
    pub fn fair() -> Self {
        Self::with_fairness(true)
    }

    pub fn with_fairness(fair: bool) -> Self {
        Self {
            sync: Arc::new(Synchronizer::new(RwPolicy::new(fair))),
        }
    }

    pub fn read_lock(&self) -> ReadLock<'_> {
        ReadLock { sync: &self.sync }
    }

    pub fn write_lock(&self) -> WriteLock<'_> {
        WriteLock { sync: &self.sync }
    }

    pub fn is_fair(&self) -> bool {
        self.sync.policy().fair
    }

    /// Total read holds across all threads.
    pub fn read_lock_count(&self) -> u32 {
        shared_count(self.sync.state())
    }

    pub fn is_write_locked(&self) -> bool {
        exclusive_count(self.sync.state()) != 0
    }

    pub fn is_write_locked_by_current_thread(&self) -> bool {
        self.sync.is_owned_by_current_thread()
    }

    /// Write holds of the calling thread.
    pub fn write_hold_count(&self) -> u32 {
        if self.sync.is_owned_by_current_thread() {
            exclusive_count(self.sync.state())
        } else {
            0
        }
    }

    /// Read holds of the calling thread.
    pub fn read_hold_count(&self) -> u32 {
        read_holds(self.sync.policy().id)
    }

    /// The writer, if the write lock is held.
    pub fn owner(&self) -> Option<Thread> {
        if exclusive_count(self.sync.state()) == 0 {
            None
        } else {
            self.sync.exclusive_owner()
        }
    }

    pub fn has_queued_threads(&self) -> bool {
        self.sync.has_queued_threads()
    }

    pub fn has_queued_thread(&self, thread: &Thread) -> bool {
        self.sync.is_queued(thread)
    }

    pub fn queue_length(&self) -> usize {
        self.sync.queue_length()
    }

    /// Threads queued for the write lock.
    pub fn queued_writer_threads(&self) -> Vec<Thread> {
        self.sync.exclusive_queued_threads()
    }

    /// Threads queued for the read lock.
    pub fn queued_reader_threads(&self) -> Vec<Thread> {
        self.sync.shared_queued_threads()
    }

    pub fn has_waiters(&self, cond: &WriteCondition) -> Result<bool> {
        self.sync.has_waiters(cond)
    }

    pub fn wait_queue_length(&self, cond: &WriteCondition) -> Result<usize> {
        self.sync.wait_queue_length(cond)
    }
}

impl Default for ReentrantRwLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReentrantRwLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.sync.state();
        f.debug_struct("ReentrantRwLock")
            .field("fair", &self.is_fair())
            .field("write_holds", &exclusive_count(c))
            .field("read_holds", &shared_count(c))
            .finish()
    }
}

/// Read half of a [`ReentrantRwLock`].
#[derive(Debug, Clone, Copy)]
pub struct ReadLock<'a> {
    sync: &'a Arc<Synchronizer<RwPolicy>>,
}

impl ReadLock<'_> {
    /// Acquire a read hold, blocking while a writer holds or (per policy)
    /// waits for the lock.
    pub fn lock(&self) -> Result<()> {
        self.sync.acquire_shared(1)
    }

    pub fn lock_interruptibly(&self) -> Result<()> {
        self.sync.acquire_shared_interruptibly(1)
    }

    /// Acquire a read hold if no other thread holds the write lock,
    /// ignoring fairness.
    pub fn try_lock(&self) -> Result<bool> {
        self.sync.policy().try_read_lock(self.sync)
    }

    pub fn try_lock_for(&self, timeout: Duration) -> Result<bool> {
        self.sync.try_acquire_shared_for(1, timeout)
    }

    pub fn unlock(&self) -> Result<()> {
        self.sync.release_shared(1).map(|_| ())
    }

    /// Read locks have no conditions.
    pub fn new_condition(&self) -> Result<WriteCondition> {
        Err(LockError::Unsupported("conditions on a read lock"))
    }
}

/// Write half of a [`ReentrantRwLock`].
#[derive(Debug, Clone, Copy)]
pub struct WriteLock<'a> {
    sync: &'a Arc<Synchronizer<RwPolicy>>,
}

impl WriteLock<'_> {
    pub fn lock(&self) -> Result<()> {
        self.sync.acquire(1)
    }

    pub fn lock_interruptibly(&self) -> Result<()> {
        self.sync.acquire_interruptibly(1)
    }

    /// Acquire the write lock if free right now, ignoring fairness.
    pub fn try_lock(&self) -> Result<bool> {
        self.sync.policy().try_write_lock(self.sync)
    }

    pub fn try_lock_for(&self, timeout: Duration) -> Result<bool> {
        self.sync.try_acquire_for(1, timeout)
    }

    pub fn unlock(&self) -> Result<()> {
        self.sync.release(1).map(|_| ())
    }

    pub fn new_condition(&self) -> Result<WriteCondition> {
        Ok(self.sync.new_condition())
    }

    pub fn is_held_by_current_thread(&self) -> bool {
        self.sync.is_owned_by_current_thread()
    }

    pub fn hold_count(&self) -> u32 {
        if self.sync.is_owned_by_current_thread() {
            exclusive_count(self.sync.state())
        } else {
            0
        }
    }
}

impl Lock for ReadLock<'_> {
    fn lock(&self) -> Result<()> {
        ReadLock::lock(self)
    }

    fn lock_interruptibly(&self) -> Result<()> {
        ReadLock::lock_interruptibly(self)
    }

    fn try_lock(&self) -> Result<bool> {
        ReadLock::try_lock(self)
    }

    fn try_lock_for(&self, timeout: Duration) -> Result<bool> {
        ReadLock::try_lock_for(self, timeout)
    }

    fn unlock(&self) -> Result<()> {
        ReadLock::unlock(self)
    }
}

impl Lock for WriteLock<'_> {
    fn lock(&self) -> Result<()> {
        WriteLock::lock(self)
    }

    fn lock_interruptibly(&self) -> Result<()> {
        WriteLock::lock_interruptibly(self)
    }

    fn try_lock(&self) -> Result<bool> {
        WriteLock::try_lock(self)
    }

    fn try_lock_for(&self, timeout: Duration) -> Result<bool> {
        WriteLock::try_lock_for(self, timeout)
    }

    fn unlock(&self) -> Result<()> {
        WriteLock::unlock(self)
    }
}
