// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Error type shared by every lock in the crate.

use thiserror::Error;

/// Failure reported by a lock operation.
///
/// Timeouts are not errors: timed operations report them through their
/// return value (`Ok(false)` or `Ok(None)`). Transient CAS contention is
/// retried internally and never reaches the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LockError {
    /// The calling thread does not hold the lock it tried to release or
    /// wait on, or a stamp does not match the lock's current state.
    #[error("illegal monitor state: {0}")]
    IllegalMonitorState(&'static str),

    /// The maximum representable recursive hold count was exceeded.
    #[error("maximum lock count exceeded")]
    HoldCountOverflow,

    /// The thread was interrupted while waiting.
    #[error("interrupted while waiting")]
    Interrupted,

    /// A condition was passed to a lock that did not create it.
    #[error("condition not owned by this lock")]
    NotOwner,

    /// The lock does not implement the requested mode.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}

/// Shorthand used throughout the crate.
pub type Result<T> = std::result::Result<T, LockError>;
