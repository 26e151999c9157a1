// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Common interface over the crate's blocking locks, plus an RAII guard.

use std::fmt;
use std::time::Duration;

use crate::error::Result;

/// Blocking lock operations shared by [`ReentrantLock`](crate::ReentrantLock),
/// the read and write views of [`ReentrantRwLock`](crate::ReentrantRwLock)
/// and the views of [`StampedLock`](crate::StampedLock).
pub trait Lock {
    /// Acquire, blocking until available. Interrupts are deferred.
    fn lock(&self) -> Result<()>;

    /// Acquire, failing with [`LockError::Interrupted`](crate::LockError)
    /// if the thread is interrupted while waiting.
    fn lock_interruptibly(&self) -> Result<()>;

    /// Acquire only if available right now.
    fn try_lock(&self) -> Result<bool>;

    /// Acquire, giving up after `timeout`. `Ok(false)` on timeout.
    fn try_lock_for(&self, timeout: Duration) -> Result<bool>;

    fn unlock(&self) -> Result<()>;

    /// Lock and return a guard that unlocks on drop.
    fn guard(&self) -> Result<LockGuard<'_, Self>>
    where
        Self: Sized,
    {
        self.lock()?;
        Ok(LockGuard { lock: self })
    }

    /// Like [`guard`](Lock::guard) but only if the lock is free right now.
    fn try_guard(&self) -> Result<Option<LockGuard<'_, Self>>>
    where
        Self: Sized,
    {
        Ok(self.try_lock()?.then(|| LockGuard { lock: self }))
    }
}

/// RAII guard: holds the lock from construction until drop.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard<'a, L: Lock> {
    lock: &'a L,
}

impl<'a, L: Lock> LockGuard<'a, L> {
    /// The guarded lock.
    pub fn lock(&self) -> &'a L {
        self.lock
    }

    /// Unlock now and report any failure, instead of ignoring it on drop.
    pub fn unlock(self) -> Result<()> {
        let lock = self.lock;
        std::mem::forget(self);
        lock.unlock()
    }
}

impl<L: Lock> Drop for LockGuard<'_, L> {
    fn drop(&mut self) {
        if let Err(e) = self.lock.unlock() {
            tracing::debug!(error = %e, "unlock on guard drop failed");
        }
    }
}

impl<L: Lock + fmt::Debug> fmt::Debug for LockGuard<'_, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard").field("lock", self.lock).finish()
    }
}
