// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Queue-based blocking synchronizers for OS threads.
//
// A generic FIFO-queue synchronizer is parameterised by a policy that
// interprets its state word. Reentrant and read-write locks are thin
// policies over it; a stamped lock with optimistic reads stands beside it
// with a queue of its own. Threads block through a per-thread park permit.

mod error;
pub use error::{LockError, Result};

mod platform;

pub mod thread;
pub use thread::{Thread, ThreadId};

mod word;
pub use word::StateWord;

mod node;

mod spin;
pub use spin::SpinPolicy;

mod synchronizer;
pub use synchronizer::{Policy, SharedAcquire, Synchronizer};

mod condition;
pub use condition::ConditionObject;

mod lock;
pub use lock::{Lock, LockGuard};

mod mutex;
pub use mutex::{Condition, ReentrantLock, ReentrantPolicy};

mod rw_lock;
pub use rw_lock::{ReadLock, ReentrantRwLock, RwPolicy, WriteCondition, WriteLock};

mod stamped;
pub use stamped::{ReadLockView, Stamp, StampedLock, WriteLockView};

mod waiter;
pub use waiter::Waiter;
