// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Predicate wait built on a reentrant lock and one of its conditions.
// Used to sleep a consumer until a producer makes progress.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::lock::Lock;
use crate::mutex::{Condition, ReentrantLock};

/// A lock, a condition and a quit flag.
///
/// Producers change shared state and call [`notify`](Self::notify) or
/// [`broadcast`](Self::broadcast); consumers block in
/// [`wait_if`](Self::wait_if) until their predicate clears.
pub struct Waiter {
    lock: ReentrantLock,
    cond: Condition,
    quit: AtomicBool,
}

impl Waiter {
    pub fn new() -> Self {
        let lock = ReentrantLock::new();
        let cond = lock.new_condition();
        Self {
            lock,
            cond,
            quit: AtomicBool::new(false),
        }
    }

    /// Block while `pred` returns `true` and quit has not been signalled.
    /// Returns `Ok(false)` if `timeout` elapsed first, `Ok(true)` otherwise.
    pub fn wait_if<F>(&self, pred: F, timeout: Option<Duration>) -> Result<bool>
    where
        F: Fn() -> bool,
    {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let _guard = self.lock.guard()?;
        while !self.quit.load(Ordering::Acquire) && pred() {
            match deadline {
                None => self.cond.wait()?,
                Some(d) => {
                    if !self.cond.wait_until(d)? {
                        return Ok(false);
                    }
                }
            }
        }
        Ok(true)
    }

    /// Wake one waiter.
    pub fn notify(&self) -> Result<()> {
        let _guard = self.lock.guard()?;
        self.cond.signal()
    }

    /// Wake all waiters.
    pub fn broadcast(&self) -> Result<()> {
        let _guard = self.lock.guard()?;
        self.cond.signal_all()
    }

    /// Signal quit and wake every waiter. Later waits return immediately.
    pub fn quit_waiting(&self) -> Result<()> {
        self.quit.store(true, Ordering::Release);
        self.broadcast()
    }

    pub fn is_quit(&self) -> bool {
        self.quit.load(Ordering::Acquire)
    }
}

impl Default for Waiter {
    fn default() -> Self {
        Self::new()
    }
}
