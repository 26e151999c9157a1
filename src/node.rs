// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Wait-queue node shared by the synchronizer's main queue and its
// condition lists.
//
// Nodes are reference counted and linked through `ArcSwapOption`, so a
// thread walking the queue keeps every node it holds alive. `prev` is the
// authoritative chain; `next` is a hint that may be stale or missing.

use std::fmt;
use std::ptr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::thread::{Thread, ThreadSlot};

/// Waiter gave up (timeout or interrupt). The only positive status.
pub(crate) const CANCELLED: i32 = 1;
/// Successor is (or is about to be) parked and must be unparked on release.
pub(crate) const SIGNAL: i32 = -1;
/// Node is on a condition list, not the main queue.
pub(crate) const CONDITION: i32 = -2;
/// A shared release must be propagated to further waiters.
pub(crate) const PROPAGATE: i32 = -3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Exclusive,
    Shared,
}

pub(crate) type NodeRef = Arc<Node>;
pub(crate) type Link = ArcSwapOption<Node>;

pub(crate) struct Node {
    pub(crate) status: AtomicI32,
    pub(crate) prev: Link,
    pub(crate) next: Link,
    pub(crate) thread: ThreadSlot,
    pub(crate) mode: Mode,
    /// Condition list link. Only touched while holding the lock.
    pub(crate) next_waiter: Link,
}

impl Node {
    /// Dummy head installed when the queue is first contended.
    pub(crate) fn sentinel() -> NodeRef {
        Arc::new(Self::with(None, Mode::Exclusive, 0))
    }

    pub(crate) fn waiter(thread: Thread, mode: Mode) -> NodeRef {
        Arc::new(Self::with(Some(thread), mode, 0))
    }

    pub(crate) fn condition_waiter(thread: Thread) -> NodeRef {
        Arc::new(Self::with(Some(thread), Mode::Exclusive, CONDITION))
    }

    fn with(thread: Option<Thread>, mode: Mode, status: i32) -> Self {
        Self {
            status: AtomicI32::new(status),
            prev: Link::const_empty(),
            next: Link::const_empty(),
            thread: ThreadSlot::new(thread),
            mode,
            next_waiter: Link::const_empty(),
        }
    }

    #[inline]
    pub(crate) fn status(&self) -> i32 {
        self.status.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_status(&self, s: i32) {
        self.status.store(s, Ordering::Release);
    }

    #[inline]
    pub(crate) fn cas_status(&self, current: i32, new: i32) -> bool {
        self.status
            .compare_exchange(current, new, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[inline]
    pub(crate) fn is_shared(&self) -> bool {
        self.mode == Mode::Shared
    }

    /// Predecessor of a queued node. Every node behind the head has one;
    /// `None` only for the head itself.
    pub(crate) fn predecessor(&self) -> Option<NodeRef> {
        let p = self.prev.load_full();
        debug_assert!(p.is_some(), "queued node without predecessor");
        p
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("status", &self.status())
            .field("mode", &self.mode)
            .field("thread", &self.thread)
            .finish()
    }
}

/// Raw address of an optional node, for identity comparisons.
#[inline]
pub(crate) fn addr<T>(node: &Option<Arc<T>>) -> *const T {
    node.as_ref().map_or(ptr::null(), Arc::as_ptr)
}

/// Raw address of the node a link currently points at.
#[inline]
pub(crate) fn link_addr<T>(link: &ArcSwapOption<T>) -> *const T {
    addr::<T>(&link.load())
}

/// Whether `link` currently points at `node`.
#[inline]
pub(crate) fn points_to<T>(link: &ArcSwapOption<T>, node: &Arc<T>) -> bool {
    link_addr(link) == Arc::as_ptr(node)
}

/// Compare-and-set on a link by identity. The caller holds `current`
/// alive for the duration, so its address cannot be reused by another
/// node while the comparison runs.
pub(crate) fn cas_link<T>(link: &ArcSwapOption<T>, current: Option<&Arc<T>>, new: Option<Arc<T>>) -> bool {
    let expected = current.map_or(ptr::null(), Arc::as_ptr);
    let prev = link.compare_and_swap(expected, new);
    addr::<T>(&prev) == expected
}
