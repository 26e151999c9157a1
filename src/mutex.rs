// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Reentrant mutual-exclusion lock.
// The synchronizer state is the owner's recursive hold count.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::condition::ConditionObject;
use crate::error::{LockError, Result};
use crate::lock::Lock;
use crate::synchronizer::{Policy, Synchronizer};
use crate::thread::{self, Thread};

/// Policy of [`ReentrantLock`]: state 0 means unlocked, otherwise the
/// owner's hold count.
#[derive(Debug, Clone, Copy)]
pub struct ReentrantPolicy {
    fair: bool,
}

impl ReentrantPolicy {
    /// Acquire ignoring queued waiters. Used by `try_lock` even on fair
    /// locks and as the unfair policy's acquire.
    fn barging_acquire(&self, sync: &Synchronizer<Self>, acquires: u32) -> Result<bool> {
        let c = sync.state();
        if c == 0 {
            if sync.compare_and_set_state(0, acquires) {
                sync.set_exclusive_owner(Some(thread::current()));
                return Ok(true);
            }
        } else if sync.is_owned_by_current_thread() {
            let next = c.checked_add(acquires).ok_or(LockError::HoldCountOverflow)?;
            sync.set_state(next);
            return Ok(true);
        }
        Ok(false)
    }
}

impl Policy for ReentrantPolicy {
    type Word = u32;

    fn try_acquire(&self, sync: &Synchronizer<Self>, acquires: u32) -> Result<bool> {
        if !self.fair {
            return self.barging_acquire(sync, acquires);
        }
        let c = sync.state();
        if c == 0 {
            if !sync.has_queued_predecessors() && sync.compare_and_set_state(0, acquires) {
                sync.set_exclusive_owner(Some(thread::current()));
                return Ok(true);
            }
        } else if sync.is_owned_by_current_thread() {
            let next = c.checked_add(acquires).ok_or(LockError::HoldCountOverflow)?;
            sync.set_state(next);
            return Ok(true);
        }
        Ok(false)
    }

    fn try_release(&self, sync: &Synchronizer<Self>, releases: u32) -> Result<bool> {
        if !sync.is_owned_by_current_thread() {
            return Err(LockError::IllegalMonitorState("unlock of a lock not held by current thread"));
        }
        let c = sync.state().checked_sub(releases).ok_or(LockError::IllegalMonitorState(
            "release exceeds hold count",
        ))?;
        let free = c == 0;
        if free {
            sync.set_exclusive_owner(None);
        }
        sync.set_state(c);
        Ok(free)
    }

    fn is_held_exclusively(&self, sync: &Synchronizer<Self>) -> bool {
        sync.is_owned_by_current_thread()
    }
}

/// Condition created by [`ReentrantLock::new_condition`].
pub type Condition = ConditionObject<ReentrantPolicy>;

/// A reentrant mutual-exclusion lock with optional FIFO fairness.
///
/// The thread that last locked it owns it until it unlocks as many times
/// as it locked. An unfair lock (the default) lets an arriving thread
/// barge ahead of queued waiters; a fair lock grants the lock to the
/// longest-waiting thread.
pub struct ReentrantLock {
    sync: Arc<Synchronizer<ReentrantPolicy>>,
}

impl ReentrantLock {
    /// Create an unfair lock.
    pub fn new() -> Self {
        Self::with_fairness(false)
    }

    /// Create a fair lock.
    pub fn fair() -> Self {
        Self::with_fairness(true)
    }

    pub fn with_fairness(fair: bool) -> Self {
        Self {
            sync: Arc::new(Synchronizer::new(ReentrantPolicy { fair })),
        }
    }

    /// Lock, blocking until available. Interrupts are deferred.
    pub fn lock(&self) -> Result<()> {
        if !self.sync.policy().fair && self.sync.compare_and_set_state(0, 1) {
            self.sync.set_exclusive_owner(Some(thread::current()));
            return Ok(());
        }
        self.sync.acquire(1)
    }

    /// Lock, failing with [`LockError::Interrupted`] if interrupted while
    /// waiting.
    pub fn lock_interruptibly(&self) -> Result<()> {
        self.sync.acquire_interruptibly(1)
    }

    /// Lock only if free (or already held by the caller) right now.
    /// Barges even on a fair lock.
    pub fn try_lock(&self) -> Result<bool> {
        self.sync.policy().barging_acquire(&self.sync, 1)
    }

    /// Lock, giving up after `timeout`. Honors fairness.
    /// Returns `Ok(false)` on timeout.
    pub fn try_lock_for(&self, timeout: Duration) -> Result<bool> {
        self.sync.try_acquire_for(1, timeout)
    }

    /// Drop one hold. The lock is released when the count reaches zero.
    pub fn unlock(&self) -> Result<()> {
        self.sync.release(1).map(|_| ())
    }

    /// Create a condition bound to this lock.
    pub fn new_condition(&self) -> Condition {
        self.sync.new_condition()
    }

    /// Number of holds by the calling thread (zero if not the owner).
    pub fn hold_count(&self) -> u32 {
        if self.sync.is_owned_by_current_thread() {
            self.sync.state()
        } else {
            0
        }
    }

    pub fn is_held_by_current_thread(&self) -> bool {
        self.sync.is_owned_by_current_thread()
    }

    /// Whether any thread holds the lock. For monitoring only.
    pub fn is_locked(&self) -> bool {
        self.sync.state() != 0
    }

    pub fn is_fair(&self) -> bool {
        self.sync.policy().fair
    }

    /// The owning thread, if any.
    pub fn owner(&self) -> Option<Thread> {
        if self.sync.state() == 0 {
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

    pub fn queued_threads(&self) -> Vec<Thread> {
        self.sync.queued_threads()
    }

    /// Whether any thread waits on `cond`. The caller must hold the lock.
    pub fn has_waiters(&self, cond: &Condition) -> Result<bool> {
        self.sync.has_waiters(cond)
    }

    pub fn wait_queue_length(&self, cond: &Condition) -> Result<usize> {
        self.sync.wait_queue_length(cond)
    }

    pub fn waiting_threads(&self, cond: &Condition) -> Result<Vec<Thread>> {
        self.sync.waiting_threads(cond)
    }
}

impl Default for ReentrantLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReentrantLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReentrantLock")
            .field("fair", &self.is_fair())
            .field("owner", &self.owner())
            .field("holds", &self.sync.state())
            .finish()
    }
}

impl Lock for ReentrantLock {
    fn lock(&self) -> Result<()> {
        ReentrantLock::lock(self)
    }

    fn lock_interruptibly(&self) -> Result<()> {
        ReentrantLock::lock_interruptibly(self)
    }

    fn try_lock(&self) -> Result<bool> {
        ReentrantLock::try_lock(self)
    }

    fn try_lock_for(&self, timeout: Duration) -> Result<bool> {
        ReentrantLock::try_lock_for(self, timeout)
    }

    fn unlock(&self) -> Result<()> {
        ReentrantLock::unlock(self)
    }
}
