// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Spin tuning and backoff helpers shared by the busy-wait sites.

use std::cell::Cell;

/// Adaptive backoff with escalating cost.
///
/// - k < 4:  busy spin (do nothing)
/// - k < 16: CPU pause hint
/// - k < 32: thread yield
/// - k >= 32: sleep 1ms
#[inline]
pub(crate) fn adaptive_yield(k: &mut u32) {
    if *k < 4 {
        // busy spin
    } else if *k < 16 {
        std::hint::spin_loop();
    } else if *k < 32 {
        std::thread::yield_now();
    } else {
        std::thread::sleep(std::time::Duration::from_millis(1));
        return;
    }
    *k += 1;
}

/// Spin counts used by [`StampedLock`](crate::StampedLock) before it parks.
///
/// Good values depend on the machine, so they are configurable. The default
/// spins only on multiprocessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpinPolicy {
    /// Spins while enqueuing behind a lock that is held.
    pub spins: u32,
    /// Initial spins for a waiter that reached the head of the queue.
    pub head_spins: u32,
    /// Cap for head spins, which double each time a head waiter loses a
    /// race against a barging thread.
    pub max_head_spins: u32,
    /// Mask applied to a random value; a reader that fails to grab the
    /// overflow spin-bit yields when the masked value is zero. Must be
    /// one less than a power of two.
    pub overflow_yield_mask: u32,
}

impl SpinPolicy {
    /// A policy that never spins; waiters park as soon as they must wait.
    pub const fn no_spin() -> Self {
        Self {
            spins: 0,
            head_spins: 0,
            max_head_spins: 0,
            overflow_yield_mask: 7,
        }
    }

    /// The multiprocessor defaults regardless of the detected CPU count.
    pub const fn multiprocessor() -> Self {
        Self {
            spins: 1 << 6,
            head_spins: 1 << 10,
            max_head_spins: 1 << 16,
            overflow_yield_mask: 7,
        }
    }
}

impl Default for SpinPolicy {
    fn default() -> Self {
        let ncpu = std::thread::available_parallelism().map_or(1, |n| n.get());
        if ncpu > 1 {
            Self::multiprocessor()
        } else {
            Self::no_spin()
        }
    }
}

thread_local! {
    static SEED: Cell<u32> = const { Cell::new(0) };
}

/// Per-thread xorshift generator used to randomise spin decrements.
/// Never returns zero once seeded.
pub(crate) fn next_seed() -> u32 {
    SEED.with(|seed| {
        let mut r = seed.get();
        if r == 0 {
            r = crate::thread::current().id().as_u64() as u32 | 1;
            r ^= r.rotate_left(13).wrapping_mul(0x9E37_79B9);
            if r == 0 {
                r = 1;
            }
        }
        r ^= r << 13;
        r ^= r >> 17;
        r ^= r << 5;
        seed.set(r);
        r
    })
}

/// Coin flip that decides whether a spin iteration counts.
#[inline]
pub(crate) fn spin_counts() -> bool {
    next_seed() & 0x8000_0000 == 0
}
