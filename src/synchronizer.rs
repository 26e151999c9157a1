// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Queue-based synchronizer: one atomic state word plus a CLH-style FIFO
// wait queue. Lock types supply a `Policy` that interprets the state word;
// this module only queues, parks, wakes and cancels.

use std::fmt;
use std::ptr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::condition::ConditionObject;
use crate::error::{LockError, Result};
use crate::node::{self, Mode, Node, NodeRef, CANCELLED, CONDITION, PROPAGATE, SIGNAL};
use crate::thread::{self, Thread, ThreadSlot};
use crate::word::StateWord;

/// Timed waits with less than this left spin instead of parking.
const SPIN_FOR_TIMEOUT_THRESHOLD: Duration = Duration::from_micros(1);

/// Outcome of a shared-mode acquire attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharedAcquire {
    /// Not acquired; the caller queues or keeps waiting.
    Failed,
    /// Acquired, and no further shared acquire can succeed.
    Acquired,
    /// Acquired, and the next shared waiter may succeed too.
    Propagate,
}

/// Acquire/release predicates that give a synchronizer its meaning.
///
/// Every method receives the synchronizer so it can read and update the
/// state word, the exclusive owner, and inspect the queue (for fairness).
/// Implementations must not block. Modes a policy does not support keep the
/// default bodies, which report [`LockError::Unsupported`].
pub trait Policy: Send + Sync + Sized + 'static {
    type Word: StateWord;

    /// Try to acquire in exclusive mode.
    fn try_acquire(&self, sync: &Synchronizer<Self>, arg: Self::Word) -> Result<bool> {
        let _ = (sync, arg);
        Err(LockError::Unsupported("exclusive acquire"))
    }

    /// Try to release in exclusive mode. Returns `true` when the
    /// synchronizer is now fully released and waiters may proceed.
    fn try_release(&self, sync: &Synchronizer<Self>, arg: Self::Word) -> Result<bool> {
        let _ = (sync, arg);
        Err(LockError::Unsupported("exclusive release"))
    }

    /// Try to acquire in shared mode.
    fn try_acquire_shared(
        &self,
        sync: &Synchronizer<Self>,
        arg: Self::Word,
    ) -> Result<SharedAcquire> {
        let _ = (sync, arg);
        Err(LockError::Unsupported("shared acquire"))
    }

    /// Try to release in shared mode. Returns `true` when a waiting
    /// acquire (shared or exclusive) may now succeed.
    fn try_release_shared(&self, sync: &Synchronizer<Self>, arg: Self::Word) -> Result<bool> {
        let _ = (sync, arg);
        Err(LockError::Unsupported("shared release"))
    }

    /// Whether the calling thread holds the synchronizer exclusively.
    /// Required for conditions.
    fn is_held_exclusively(&self, sync: &Synchronizer<Self>) -> bool {
        let _ = sync;
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wait {
    Uninterruptible,
    Interruptible,
    Until(Instant),
}

/// The synchronizer core.
///
/// `head` is a dummy or the node of the thread that last acquired; it is
/// installed lazily on first contention. `head` and `tail` change only by
/// compare-and-swap.
pub struct Synchronizer<P: Policy> {
    head: node::Link,
    tail: node::Link,
    state: <P::Word as StateWord>::Atomic,
    owner: ThreadSlot,
    policy: P,
}

impl<P: Policy> Synchronizer<P> {
    /// Create a synchronizer with a zero state word.
    pub fn new(policy: P) -> Self {
        Self::with_state(policy, P::Word::ZERO)
    }

    /// Create a synchronizer with the given initial state.
    pub fn with_state(policy: P, state: P::Word) -> Self {
        Self {
            head: node::Link::const_empty(),
            tail: node::Link::const_empty(),
            state: P::Word::new_atomic(state),
            owner: ThreadSlot::empty(),
            policy,
        }
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    // -----------------------------------------------------------------------
    // State word and owner
    // -----------------------------------------------------------------------

    pub fn state(&self) -> P::Word {
        P::Word::load(&self.state, Ordering::Acquire)
    }

    pub fn set_state(&self, v: P::Word) {
        P::Word::store(&self.state, v, Ordering::Release);
    }

    pub fn compare_and_set_state(&self, expect: P::Word, update: P::Word) -> bool {
        P::Word::compare_exchange(&self.state, expect, update, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// The thread recorded as exclusive owner, if any.
    pub fn exclusive_owner(&self) -> Option<Thread> {
        self.owner.get()
    }

    pub fn set_exclusive_owner(&self, thread: Option<Thread>) {
        self.owner.set(thread);
    }

    /// Whether the recorded exclusive owner is the calling thread.
    pub fn is_owned_by_current_thread(&self) -> bool {
        self.owner.holds_current()
    }

    /// Whether the policy reports exclusive ownership by the caller.
    pub fn is_held_exclusively(&self) -> bool {
        self.policy.is_held_exclusively(self)
    }

    // -----------------------------------------------------------------------
    // Exclusive mode
    // -----------------------------------------------------------------------

    /// Acquire in exclusive mode, ignoring interrupts. An interrupt seen
    /// while parked is re-asserted on return.
    pub fn acquire(&self, arg: P::Word) -> Result<()> {
        if self.policy.try_acquire(self, arg)? {
            return Ok(());
        }
        let node = self.add_waiter(Mode::Exclusive);
        self.acquire_queued(&node, arg, Wait::Uninterruptible)?;
        Ok(())
    }

    /// Acquire in exclusive mode, aborting with [`LockError::Interrupted`].
    pub fn acquire_interruptibly(&self, arg: P::Word) -> Result<()> {
        if thread::interrupted() {
            return Err(LockError::Interrupted);
        }
        if self.policy.try_acquire(self, arg)? {
            return Ok(());
        }
        let node = self.add_waiter(Mode::Exclusive);
        self.acquire_queued(&node, arg, Wait::Interruptible)?;
        Ok(())
    }

    /// Acquire in exclusive mode, giving up after `timeout`.
    /// Returns `Ok(false)` on timeout.
    pub fn try_acquire_for(&self, arg: P::Word, timeout: Duration) -> Result<bool> {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.try_acquire_until(arg, deadline),
            None => self.acquire_interruptibly(arg).map(|()| true),
        }
    }

    /// Acquire in exclusive mode, giving up at `deadline`.
    pub fn try_acquire_until(&self, arg: P::Word, deadline: Instant) -> Result<bool> {
        if thread::interrupted() {
            return Err(LockError::Interrupted);
        }
        if self.policy.try_acquire(self, arg)? {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        let node = self.add_waiter(Mode::Exclusive);
        self.acquire_queued(&node, arg, Wait::Until(deadline))
    }

    /// Release in exclusive mode, waking the next waiter when the policy
    /// reports the synchronizer free.
    pub fn release(&self, arg: P::Word) -> Result<bool> {
        if !self.policy.try_release(self, arg)? {
            return Ok(false);
        }
        if let Some(h) = self.head.load_full() {
            if h.status() != 0 {
                self.unpark_successor(&h);
            }
        }
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Shared mode
    // -----------------------------------------------------------------------

    /// Acquire in shared mode, ignoring interrupts.
    pub fn acquire_shared(&self, arg: P::Word) -> Result<()> {
        if self.policy.try_acquire_shared(self, arg)? != SharedAcquire::Failed {
            return Ok(());
        }
        let node = self.add_waiter(Mode::Shared);
        self.acquire_shared_queued(&node, arg, Wait::Uninterruptible)?;
        Ok(())
    }

    /// Acquire in shared mode, aborting with [`LockError::Interrupted`].
    pub fn acquire_shared_interruptibly(&self, arg: P::Word) -> Result<()> {
        if thread::interrupted() {
            return Err(LockError::Interrupted);
        }
        if self.policy.try_acquire_shared(self, arg)? != SharedAcquire::Failed {
            return Ok(());
        }
        let node = self.add_waiter(Mode::Shared);
        self.acquire_shared_queued(&node, arg, Wait::Interruptible)?;
        Ok(())
    }

    /// Acquire in shared mode, giving up after `timeout`.
    pub fn try_acquire_shared_for(&self, arg: P::Word, timeout: Duration) -> Result<bool> {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.try_acquire_shared_until(arg, deadline),
            None => self.acquire_shared_interruptibly(arg).map(|()| true),
        }
    }

    /// Acquire in shared mode, giving up at `deadline`.
    pub fn try_acquire_shared_until(&self, arg: P::Word, deadline: Instant) -> Result<bool> {
        if thread::interrupted() {
            return Err(LockError::Interrupted);
        }
        if self.policy.try_acquire_shared(self, arg)? != SharedAcquire::Failed {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        let node = self.add_waiter(Mode::Shared);
        self.acquire_shared_queued(&node, arg, Wait::Until(deadline))
    }

    /// Release in shared mode, propagating the wakeup through queued
    /// shared waiters.
    pub fn release_shared(&self, arg: P::Word) -> Result<bool> {
        if self.policy.try_release_shared(self, arg)? {
            self.release_shared_waiters();
            return Ok(true);
        }
        Ok(false)
    }

    // -----------------------------------------------------------------------
    // Queue inspection
    // -----------------------------------------------------------------------

    /// Whether any thread is waiting to acquire. Racy by nature.
    pub fn has_queued_threads(&self) -> bool {
        node::link_addr(&self.head) != node::link_addr(&self.tail)
    }

    /// Whether any thread has ever contended for this synchronizer.
    pub fn has_contended(&self) -> bool {
        self.head.load().is_some()
    }

    /// Whether some other thread has been waiting longer than the caller.
    /// Fair policies refuse to barge when this returns `true`.
    pub fn has_queued_predecessors(&self) -> bool {
        let t = self.tail.load_full();
        let h = self.head.load_full();
        match h {
            Some(h) if Arc::as_ptr(&h) != node::addr(&t) => match h.next.load_full() {
                None => true,
                Some(s) => !s.thread.holds_current(),
            },
            _ => false,
        }
    }

    /// Whether the first queued thread, if any, waits in exclusive mode.
    /// Used by unfair read locks to avoid starving writers.
    pub fn apparently_first_queued_is_exclusive(&self) -> bool {
        let Some(h) = self.head.load_full() else {
            return false;
        };
        match h.next.load_full() {
            Some(s) => !s.is_shared() && s.thread.is_some(),
            None => false,
        }
    }

    /// The longest-waiting queued thread, if any.
    pub fn first_queued_thread(&self) -> Option<Thread> {
        let h = self.head.load_full()?;
        if Arc::as_ptr(&h) == node::link_addr(&self.tail) {
            return None;
        }
        if let Some(s) = h.next.load_full() {
            if node::points_to(&s.prev, &h) {
                if let Some(t) = s.thread.get() {
                    return Some(t);
                }
            }
        }
        // `next` was stale; walk back from the tail.
        let mut first = None;
        let mut p = self.tail.load_full();
        while let Some(n) = p {
            if Arc::ptr_eq(&n, &h) {
                break;
            }
            if let Some(t) = n.thread.get() {
                first = Some(t);
            }
            p = n.prev.load_full();
        }
        first
    }

    /// Whether `thread` is currently queued.
    pub fn is_queued(&self, thread: &Thread) -> bool {
        self.queued_nodes().any(|n| n.thread.holds(thread))
    }

    /// Estimate of the number of queued threads.
    pub fn queue_length(&self) -> usize {
        self.queued_nodes().filter(|n| n.thread.is_some()).count()
    }

    /// Snapshot of queued threads, most recently queued first.
    pub fn queued_threads(&self) -> Vec<Thread> {
        self.queued_nodes().filter_map(|n| n.thread.get()).collect()
    }

    pub fn exclusive_queued_threads(&self) -> Vec<Thread> {
        self.queued_nodes()
            .filter(|n| !n.is_shared())
            .filter_map(|n| n.thread.get())
            .collect()
    }

    pub fn shared_queued_threads(&self) -> Vec<Thread> {
        self.queued_nodes()
            .filter(|n| n.is_shared())
            .filter_map(|n| n.thread.get())
            .collect()
    }

    /// Walk the authoritative `prev` chain from the tail.
    fn queued_nodes(&self) -> impl Iterator<Item = NodeRef> {
        let mut p = self.tail.load_full();
        std::iter::from_fn(move || {
            let n = p.take()?;
            p = n.prev.load_full();
            Some(n)
        })
    }

    // -----------------------------------------------------------------------
    // Conditions
    // -----------------------------------------------------------------------

    /// Create a condition bound to this synchronizer. Usable only while the
    /// policy reports exclusive ownership.
    pub fn new_condition(self: &Arc<Self>) -> ConditionObject<P> {
        ConditionObject::new(Arc::clone(self))
    }

    /// Whether `cond` was created by this synchronizer.
    pub fn owns(&self, cond: &ConditionObject<P>) -> bool {
        ptr::eq(Arc::as_ptr(cond.synchronizer()), self)
    }

    /// Whether any thread waits on `cond`. Requires exclusive ownership.
    pub fn has_waiters(&self, cond: &ConditionObject<P>) -> Result<bool> {
        if !self.owns(cond) {
            return Err(LockError::NotOwner);
        }
        cond.has_waiters()
    }

    /// Estimate of the number of threads waiting on `cond`.
    pub fn wait_queue_length(&self, cond: &ConditionObject<P>) -> Result<usize> {
        if !self.owns(cond) {
            return Err(LockError::NotOwner);
        }
        cond.wait_queue_length()
    }

    /// Snapshot of threads waiting on `cond`.
    pub fn waiting_threads(&self, cond: &ConditionObject<P>) -> Result<Vec<Thread>> {
        if !self.owns(cond) {
            return Err(LockError::NotOwner);
        }
        cond.waiting_threads()
    }

    /// Whether `node`, created on a condition list, has reached the main
    /// queue.
    pub(crate) fn is_on_sync_queue(&self, node: &NodeRef) -> bool {
        if node.status() == CONDITION || node.prev.load().is_none() {
            return false;
        }
        if node.next.load().is_some() {
            return true;
        }
        // prev can be set while the tail CAS has not yet succeeded.
        self.queued_nodes().any(|n| Arc::ptr_eq(&n, node))
    }

    /// Move a condition node to the main queue. Returns `false` if the
    /// node was cancelled before the signal arrived.
    pub(crate) fn transfer_for_signal(&self, node: &NodeRef) -> bool {
        if !node.cas_status(CONDITION, 0) {
            return false;
        }
        let p = self.enq(node);
        let ws = p.status();
        if ws > 0 || !p.cas_status(ws, SIGNAL) {
            // Predecessor cancelled or changed under us; let the waiter
            // resync by itself.
            node.thread.unpark();
        }
        tracing::trace!("condition waiter transferred to sync queue");
        true
    }

    /// After a timeout or interrupt during a condition wait, move the node
    /// to the main queue. Returns `true` if this happened before a signal.
    pub(crate) fn transfer_after_cancelled_wait(&self, node: &NodeRef) -> bool {
        if node.cas_status(CONDITION, 0) {
            self.enq(node);
            return true;
        }
        // A signal won the race; wait for its enq to finish.
        let mut k = 0u32;
        while !self.is_on_sync_queue(node) {
            crate::spin::adaptive_yield(&mut k);
        }
        false
    }

    /// Release with the full current state and return it for a later
    /// reacquire. On failure the node is cancelled.
    pub(crate) fn fully_release(&self, node: &NodeRef) -> Result<P::Word> {
        let saved = self.state();
        match self.release(saved) {
            Ok(true) => Ok(saved),
            Ok(false) => {
                node.set_status(CANCELLED);
                tracing::debug!("condition wait without holding the lock");
                Err(LockError::IllegalMonitorState(
                    "lock not held while waiting on condition",
                ))
            }
            Err(e) => {
                node.set_status(CANCELLED);
                Err(e)
            }
        }
    }

    /// Reacquire with a saved state after a condition wait. Interrupts are
    /// deferred; the thread's flag is set if one arrived.
    pub(crate) fn reacquire(&self, node: &NodeRef, saved: P::Word) -> Result<()> {
        self.acquire_queued(node, saved, Wait::Uninterruptible)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queue internals
    // -----------------------------------------------------------------------

    fn is_head(&self, n: &NodeRef) -> bool {
        node::points_to(&self.head, n)
    }

    fn is_tail(&self, n: &NodeRef) -> bool {
        node::points_to(&self.tail, n)
    }

    /// Append `node` at the tail, installing the dummy head on first use.
    /// Returns the node's predecessor.
    fn enq(&self, node: &NodeRef) -> NodeRef {
        loop {
            match self.tail.load_full() {
                None => {
                    let h = Node::sentinel();
                    if node::cas_link(&self.head, None, Some(Arc::clone(&h))) {
                        self.tail.store(Some(h));
                    }
                }
                Some(t) => {
                    node.prev.store(Some(Arc::clone(&t)));
                    if node::cas_link(&self.tail, Some(&t), Some(Arc::clone(node))) {
                        t.next.store(Some(Arc::clone(node)));
                        return t;
                    }
                }
            }
        }
    }

    fn add_waiter(&self, mode: Mode) -> NodeRef {
        let node = Node::waiter(thread::current(), mode);
        self.enq(&node);
        node
    }

    /// Make `node` the head. The old head is unlinked by the caller.
    fn set_head(&self, node: &NodeRef) {
        self.head.store(Some(Arc::clone(node)));
        node.thread.clear();
        node.prev.store(None);
    }

    /// Wake the first live waiter behind `node`.
    fn unpark_successor(&self, node: &NodeRef) {
        let ws = node.status();
        if ws < 0 {
            node.cas_status(ws, 0);
        }

        let mut s = node.next.load_full();
        if s.as_ref().map_or(true, |s| s.status() > 0) {
            s = None;
            let mut t = self.tail.load_full();
            while let Some(n) = t {
                if Arc::ptr_eq(&n, node) {
                    break;
                }
                if n.status() <= 0 {
                    s = Some(Arc::clone(&n));
                }
                t = n.prev.load_full();
            }
        }
        if let Some(s) = s {
            s.thread.unpark();
        }
    }

    /// Shared release: signal the head's successor, or mark the head
    /// PROPAGATE so a later acquirer continues the chain. Loops while the
    /// head moves under us.
    fn release_shared_waiters(&self) {
        loop {
            let h = self.head.load_full();
            if let Some(hn) = &h {
                if node::link_addr(&self.tail) != Arc::as_ptr(hn) {
                    let ws = hn.status();
                    if ws == SIGNAL {
                        if !hn.cas_status(SIGNAL, 0) {
                            continue;
                        }
                        self.unpark_successor(hn);
                    } else if ws == 0 && !hn.cas_status(0, PROPAGATE) {
                        continue;
                    }
                }
            }
            if node::link_addr(&self.head) == node::addr(&h) {
                break;
            }
        }
    }

    fn set_head_and_propagate(&self, node: &NodeRef, outcome: SharedAcquire) {
        let old = self.head.load_full();
        self.set_head(node);
        let waiting = |h: Option<NodeRef>| h.map_or(true, |h| h.status() < 0);
        if outcome == SharedAcquire::Propagate
            || waiting(old)
            || waiting(self.head.load_full())
        {
            let s = node.next.load_full();
            if s.map_or(true, |s| s.is_shared()) {
                self.release_shared_waiters();
            }
        }
    }

    /// Give up on a queued node: mark it cancelled, splice it out, and pass
    /// on any wakeup it owed its successor.
    fn cancel_acquire(&self, node: &NodeRef) {
        node.thread.clear();

        let Some(mut pred) = node.predecessor() else {
            node.set_status(CANCELLED);
            return;
        };
        while pred.status() > 0 {
            let Some(pp) = pred.predecessor() else {
                break;
            };
            pred = pp;
            node.prev.store(Some(Arc::clone(&pred)));
        }
        let pred_next = pred.next.load_full();

        node.set_status(CANCELLED);

        if self.is_tail(node) && node::cas_link(&self.tail, Some(node), Some(Arc::clone(&pred))) {
            node::cas_link(&pred.next, pred_next.as_ref(), None);
        } else {
            let pred_signals = !self.is_head(&pred) && {
                let ws = pred.status();
                ws == SIGNAL || (ws <= 0 && pred.cas_status(ws, SIGNAL))
            } && pred.thread.is_some();

            if pred_signals {
                if let Some(next) = node.next.load_full() {
                    if next.status() <= 0 {
                        node::cas_link(&pred.next, pred_next.as_ref(), Some(next));
                    }
                }
            } else {
                self.unpark_successor(node);
            }
            node.next.store(None);
        }
        tracing::trace!("queued acquire cancelled");
    }

    /// Check and update the predecessor's status. Returns `true` when the
    /// caller may park: the predecessor has promised to signal it.
    fn should_park_after_failed_acquire(&self, pred: &NodeRef, node: &NodeRef) -> bool {
        let ws = pred.status();
        if ws == SIGNAL {
            return true;
        }
        if ws > 0 {
            let mut p = Arc::clone(pred);
            loop {
                let Some(pp) = p.predecessor() else {
                    break;
                };
                p = pp;
                node.prev.store(Some(Arc::clone(&p)));
                if p.status() <= 0 {
                    break;
                }
            }
            p.next.store(Some(Arc::clone(node)));
        } else {
            pred.cas_status(ws, SIGNAL);
        }
        false
    }

    fn acquire_queued(&self, node: &NodeRef, arg: P::Word, wait: Wait) -> Result<bool> {
        self.wait_in_queue(node, wait, || {
            if self.policy.try_acquire(self, arg)? {
                self.set_head(node);
                return Ok(true);
            }
            Ok(false)
        })
    }

    fn acquire_shared_queued(&self, node: &NodeRef, arg: P::Word, wait: Wait) -> Result<bool> {
        self.wait_in_queue(node, wait, || {
            match self.policy.try_acquire_shared(self, arg)? {
                SharedAcquire::Failed => Ok(false),
                outcome => {
                    self.set_head_and_propagate(node, outcome);
                    Ok(true)
                }
            }
        })
    }

    /// Main wait loop for an enqueued node. `attempt` runs whenever the
    /// node is first in line and must install the node as head on success.
    /// Returns `Ok(false)` only on timeout.
    fn wait_in_queue<F>(&self, node: &NodeRef, wait: Wait, mut attempt: F) -> Result<bool>
    where
        F: FnMut() -> Result<bool>,
    {
        let mut interrupted = false;
        loop {
            let Some(p) = node.predecessor() else {
                self.cancel_acquire(node);
                return Err(LockError::IllegalMonitorState("queued node lost its predecessor"));
            };
            if self.is_head(&p) {
                match attempt() {
                    Ok(true) => {
                        p.next.store(None);
                        if interrupted {
                            thread::self_interrupt();
                        }
                        return Ok(true);
                    }
                    Ok(false) => {}
                    Err(e) => {
                        self.cancel_acquire(node);
                        return Err(e);
                    }
                }
            }

            let remaining = match wait {
                Wait::Until(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        self.cancel_acquire(node);
                        return Ok(false);
                    }
                    Some(deadline - now)
                }
                _ => None,
            };

            if self.should_park_after_failed_acquire(&p, node) {
                match remaining {
                    None => thread::park(),
                    Some(r) if r > SPIN_FOR_TIMEOUT_THRESHOLD => thread::park_timeout(r),
                    Some(_) => {}
                }
                if thread::interrupted() {
                    if wait == Wait::Uninterruptible {
                        interrupted = true;
                    } else {
                        self.cancel_acquire(node);
                        return Err(LockError::Interrupted);
                    }
                }
            }
        }
    }
}

impl<P: Policy> Drop for Synchronizer<P> {
    fn drop(&mut self) {
        // Queue links are strong in both directions; break them so nodes
        // left behind by the last acquirer are freed.
        self.head.store(None);
        let mut p = self.tail.swap(None);
        while let Some(n) = p {
            n.next.store(None);
            p = n.prev.swap(None);
        }
    }
}

impl<P: Policy + fmt::Debug> fmt::Debug for Synchronizer<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Synchronizer")
            .field("state", &self.state())
            .field("owner", &self.owner)
            .field("queued", &self.queue_length())
            .field("policy", &self.policy)
            .finish()
    }
}
