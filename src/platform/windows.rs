// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Windows thread parker built on WaitOnAddress / WakeByAddressSingle.

use std::sync::atomic::{AtomicI8, Ordering};
use std::time::Duration;

use windows_sys::Win32::System::Threading::{WaitOnAddress, WakeByAddressSingle, INFINITE};

const PARKED: i8 = -1;
const EMPTY: i8 = 0;
const NOTIFIED: i8 = 1;

pub struct PlatformParker {
    state: AtomicI8,
}

impl PlatformParker {
    pub fn new() -> Self {
        Self {
            state: AtomicI8::new(EMPTY),
        }
    }

    /// Consume the permit, blocking until one is available.
    pub fn park(&self) {
        // EMPTY -> PARKED, or NOTIFIED -> EMPTY.
        if self.state.fetch_sub(1, Ordering::Acquire) == NOTIFIED {
            return;
        }
        loop {
            self.wait(INFINITE);
            if self
                .state
                .compare_exchange(NOTIFIED, EMPTY, Ordering::Acquire, Ordering::Acquire)
                .is_ok()
            {
                return;
            }
        }
    }

    /// Consume the permit or give up after `timeout`.
    pub fn park_timeout(&self, timeout: Duration) {
        if self.state.fetch_sub(1, Ordering::Acquire) == NOTIFIED {
            return;
        }
        let ms = timeout
            .as_millis()
            .min((INFINITE - 1) as u128)
            .max(1) as u32;
        self.wait(ms);
        self.state.swap(EMPTY, Ordering::Acquire);
    }

    /// Make the permit available, waking the owner if it is parked.
    pub fn unpark(&self) {
        if self.state.swap(NOTIFIED, Ordering::Release) == PARKED {
            unsafe { WakeByAddressSingle(self.state.as_ptr() as *const _) };
        }
    }

    fn wait(&self, ms: u32) {
        let compare = PARKED;
        unsafe {
            WaitOnAddress(
                self.state.as_ptr() as *const _,
                &compare as *const i8 as *const _,
                std::mem::size_of::<i8>(),
                ms,
            );
        }
    }
}
