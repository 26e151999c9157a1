// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Condition variable layered on a synchronizer's exclusive mode.
// Waiters sit on a private singly linked list and are moved onto the
// synchronizer's main queue when signalled.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{LockError, Result};
use crate::node::{Link, Node, NodeRef, CONDITION};
use crate::synchronizer::{Policy, Synchronizer};
use crate::thread::{self, Thread};

/// Timed waits with less than this left spin instead of parking.
const SPIN_FOR_TIMEOUT_THRESHOLD: Duration = Duration::from_micros(1);

/// How an interrupt seen during a wait is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InterruptMode {
    None,
    /// Interrupted after a signal: re-assert the flag on exit.
    Reinterrupt,
    /// Interrupted before a signal: fail with `Interrupted`.
    Throw,
}

/// A condition bound to one [`Synchronizer`].
///
/// All operations require the calling thread to hold the synchronizer in
/// exclusive mode; otherwise they fail with
/// [`LockError::IllegalMonitorState`]. The waiter list is only touched by
/// the lock holder, so it needs no synchronization of its own beyond the
/// atomic links.
pub struct ConditionObject<P: Policy> {
    sync: Arc<Synchronizer<P>>,
    first_waiter: Link,
    last_waiter: Link,
}

impl<P: Policy> ConditionObject<P> {
    pub(crate) fn new(sync: Arc<Synchronizer<P>>) -> Self {
        Self {
            sync,
            first_waiter: Link::const_empty(),
            last_waiter: Link::const_empty(),
        }
    }

    pub(crate) fn synchronizer(&self) -> &Arc<Synchronizer<P>> {
        &self.sync
    }

    fn check_held(&self) -> Result<()> {
        if self.sync.is_held_exclusively() {
            Ok(())
        } else {
            Err(LockError::IllegalMonitorState("lock not held by current thread"))
        }
    }

    // -----------------------------------------------------------------------
    // Signalling
    // -----------------------------------------------------------------------

    /// Move the longest-waiting thread to the lock's queue.
    pub fn signal(&self) -> Result<()> {
        self.check_held()?;
        if let Some(first) = self.first_waiter.load_full() {
            self.do_signal(first);
        }
        Ok(())
    }

    /// Move every waiting thread to the lock's queue.
    pub fn signal_all(&self) -> Result<()> {
        self.check_held()?;
        if let Some(first) = self.first_waiter.load_full() {
            self.do_signal_all(first);
        }
        Ok(())
    }

    fn do_signal(&self, mut first: NodeRef) {
        loop {
            let next = first.next_waiter.load_full();
            if next.is_none() {
                self.last_waiter.store(None);
            }
            self.first_waiter.store(next);
            first.next_waiter.store(None);
            if self.sync.transfer_for_signal(&first) {
                return;
            }
            // Cancelled before we got to it; try the next one.
            match self.first_waiter.load_full() {
                Some(f) => first = f,
                None => return,
            }
        }
    }

    fn do_signal_all(&self, first: NodeRef) {
        self.first_waiter.store(None);
        self.last_waiter.store(None);
        let mut cur = Some(first);
        while let Some(n) = cur {
            cur = n.next_waiter.swap(None);
            self.sync.transfer_for_signal(&n);
        }
    }

    // -----------------------------------------------------------------------
    // Waiting
    // -----------------------------------------------------------------------

    /// Release the lock and wait until signalled or interrupted, then
    /// reacquire it with the same hold count.
    ///
    /// An interrupt that arrives before a signal fails with
    /// [`LockError::Interrupted`] (the lock is still reacquired first). An
    /// interrupt that loses the race to a signal is re-asserted on the
    /// thread instead.
    pub fn wait(&self) -> Result<()> {
        self.wait_deadline(None).map(|_| ())
    }

    /// Like [`wait`](Self::wait) but ignores interrupts, re-asserting any
    /// that arrived before returning.
    pub fn wait_uninterruptibly(&self) -> Result<()> {
        let node = self.add_condition_waiter()?;
        let saved = self.sync.fully_release(&node)?;
        let mut interrupted = false;
        while !self.sync.is_on_sync_queue(&node) {
            thread::park();
            if thread::interrupted() {
                interrupted = true;
            }
        }
        self.sync.reacquire(&node, saved)?;
        if interrupted {
            thread::self_interrupt();
        }
        Ok(())
    }

    /// Wait at most `timeout`. Returns `Ok(false)` if the time elapsed
    /// before a signal.
    pub fn wait_for(&self, timeout: Duration) -> Result<bool> {
        self.wait_deadline(Instant::now().checked_add(timeout))
    }

    /// Wait until `deadline`. Returns `Ok(false)` if it passed before a
    /// signal.
    pub fn wait_until(&self, deadline: Instant) -> Result<bool> {
        self.wait_deadline(Some(deadline))
    }

    /// Wait at most `timeout` and return an estimate of the time left,
    /// zero if the wait timed out. Suited to loops that re-wait for the
    /// remainder after a spurious or unrelated signal.
    pub fn wait_nanos(&self, timeout: Duration) -> Result<Duration> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait()?;
            return Ok(timeout);
        };
        self.wait_deadline(Some(deadline))?;
        Ok(deadline.saturating_duration_since(Instant::now()))
    }

    fn wait_deadline(&self, deadline: Option<Instant>) -> Result<bool> {
        if thread::interrupted() {
            return Err(LockError::Interrupted);
        }
        let node = self.add_condition_waiter()?;
        let saved = self.sync.fully_release(&node)?;

        let mut timed_out = false;
        let mut mode = InterruptMode::None;
        while !self.sync.is_on_sync_queue(&node) {
            match deadline {
                None => thread::park(),
                Some(d) => {
                    let now = Instant::now();
                    if now >= d {
                        timed_out = self.sync.transfer_after_cancelled_wait(&node);
                        break;
                    }
                    let remaining = d - now;
                    if remaining > SPIN_FOR_TIMEOUT_THRESHOLD {
                        thread::park_timeout(remaining);
                    }
                }
            }
            mode = self.check_interrupt_while_waiting(&node);
            if mode != InterruptMode::None {
                break;
            }
        }

        self.sync.reacquire(&node, saved)?;
        if node.next_waiter.load().is_some() {
            self.unlink_cancelled_waiters();
        }
        if timed_out {
            tracing::trace!("condition wait timed out");
        }
        Self::report_interrupt(mode)?;
        Ok(!timed_out)
    }

    fn check_interrupt_while_waiting(&self, node: &NodeRef) -> InterruptMode {
        if !thread::interrupted() {
            return InterruptMode::None;
        }
        if self.sync.transfer_after_cancelled_wait(node) {
            InterruptMode::Throw
        } else {
            InterruptMode::Reinterrupt
        }
    }

    fn report_interrupt(mode: InterruptMode) -> Result<()> {
        match mode {
            InterruptMode::None => Ok(()),
            InterruptMode::Reinterrupt => {
                thread::self_interrupt();
                Ok(())
            }
            InterruptMode::Throw => {
                // Reacquiring may have re-asserted the flag; the error
                // consumes the interrupt.
                thread::interrupted();
                Err(LockError::Interrupted)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Waiter list
    // -----------------------------------------------------------------------

    fn add_condition_waiter(&self) -> Result<NodeRef> {
        self.check_held()?;
        let mut t = self.last_waiter.load_full();
        if t.as_ref().is_some_and(|t| t.status() != CONDITION) {
            self.unlink_cancelled_waiters();
            t = self.last_waiter.load_full();
        }
        let node = Node::condition_waiter(thread::current());
        match t {
            None => self.first_waiter.store(Some(Arc::clone(&node))),
            Some(t) => t.next_waiter.store(Some(Arc::clone(&node))),
        }
        self.last_waiter.store(Some(Arc::clone(&node)));
        Ok(node)
    }

    /// Drop nodes whose wait ended by timeout or interrupt.
    fn unlink_cancelled_waiters(&self) {
        let mut trail: Option<NodeRef> = None;
        let mut cur = self.first_waiter.load_full();
        while let Some(n) = cur {
            let next = n.next_waiter.load_full();
            if n.status() != CONDITION {
                n.next_waiter.store(None);
                match &trail {
                    None => self.first_waiter.store(next.clone()),
                    Some(tr) => tr.next_waiter.store(next.clone()),
                }
                if next.is_none() {
                    self.last_waiter.store(trail.clone());
                }
            } else {
                trail = Some(n);
            }
            cur = next;
        }
    }

    fn waiters(&self) -> impl Iterator<Item = NodeRef> {
        let mut cur = self.first_waiter.load_full();
        std::iter::from_fn(move || {
            let n = cur.take()?;
            cur = n.next_waiter.load_full();
            Some(n)
        })
    }

    // -----------------------------------------------------------------------
    // Instrumentation
    // -----------------------------------------------------------------------

    /// Whether any thread is waiting on this condition.
    pub fn has_waiters(&self) -> Result<bool> {
        self.check_held()?;
        Ok(self.waiters().any(|n| n.status() == CONDITION))
    }

    /// Estimate of the number of waiting threads.
    pub fn wait_queue_length(&self) -> Result<usize> {
        self.check_held()?;
        Ok(self.waiters().filter(|n| n.status() == CONDITION).count())
    }

    /// Snapshot of waiting threads, longest-waiting first.
    pub fn waiting_threads(&self) -> Result<Vec<Thread>> {
        self.check_held()?;
        Ok(self
            .waiters()
            .filter(|n| n.status() == CONDITION)
            .filter_map(|n| n.thread.get())
            .collect())
    }
}

impl<P: Policy> Drop for ConditionObject<P> {
    fn drop(&mut self) {
        self.last_waiter.store(None);
        let mut cur = self.first_waiter.swap(None);
        while let Some(n) = cur {
            cur = n.next_waiter.swap(None);
        }
    }
}

impl<P: Policy> fmt::Debug for ConditionObject<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionObject")
            .field("waiters", &self.waiters().count())
            .finish()
    }
}
