// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Fixed-width state words. The synchronizer is written once against this
// trait and instantiated for 32- and 64-bit words.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// An unsigned machine word usable as synchronizer state.
pub trait StateWord:
    Copy
    + Eq
    + Ord
    + Debug
    + Default
    + Send
    + Sync
    + 'static
{
    /// The atomic cell holding a word of this width.
    type Atomic: Send + Sync + Debug;

    const ZERO: Self;

    fn new_atomic(v: Self) -> Self::Atomic;
    fn load(cell: &Self::Atomic, order: Ordering) -> Self;
    fn store(cell: &Self::Atomic, v: Self, order: Ordering);
    fn compare_exchange(
        cell: &Self::Atomic,
        current: Self,
        new: Self,
        success: Ordering,
        failure: Ordering,
    ) -> Result<Self, Self>;
}

macro_rules! impl_state_word {
    ($t:ty, $atomic:ty) => {
        impl StateWord for $t {
            type Atomic = $atomic;

            const ZERO: Self = 0;

            #[inline]
            fn new_atomic(v: Self) -> Self::Atomic {
                <$atomic>::new(v)
            }

            #[inline]
            fn load(cell: &Self::Atomic, order: Ordering) -> Self {
                cell.load(order)
            }

            #[inline]
            fn store(cell: &Self::Atomic, v: Self, order: Ordering) {
                cell.store(v, order)
            }

            #[inline]
            fn compare_exchange(
                cell: &Self::Atomic,
                current: Self,
                new: Self,
                success: Ordering,
                failure: Ordering,
            ) -> Result<Self, Self> {
                cell.compare_exchange(current, new, success, failure)
            }
        }
    };
}

impl_state_word!(u32, AtomicU32);
impl_state_word!(u64, AtomicU64);
