// Copyright (c) 2026 the concur-bridge authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use std::sync::atomic::Ordering;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use concur_types::{ConcurError, ConcurResult, ErrorCode};

use crate::condvar::CountingCondvar;
use crate::PrimitiveCounters;

/// A counting semaphore. `release` never wraps past `max_permits` — it
/// fails instead, per the spec's boundary contract.
pub struct CountingSemaphore {
    max_permits: u32,
    available: Mutex<u32>,
    released: CountingCondvar,
    counters: PrimitiveCounters,
}

impl CountingSemaphore {
    pub fn new(max_permits: u32, initial_permits: u32) -> Self {
        Self {
            max_permits,
            available: Mutex::new(initial_permits.min(max_permits)),
            released: CountingCondvar::new(),
            counters: PrimitiveCounters::new(),
        }
    }

    pub fn acquire(&self) {
        let mut available = self.available.lock().unwrap();
        while *available == 0 {
            self.counters.contentions.fetch_add(1, Ordering::Relaxed);
            available = self.released.wait(available);
        }
        *available -= 1;
        self.counters.locks_taken.fetch_add(1, Ordering::Relaxed);
    }

    pub fn try_acquire(&self) -> bool {
        let mut available = self.available.lock().unwrap();
        if *available == 0 {
            return false;
        }
        *available -= 1;
        self.counters.locks_taken.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Acquires a permit, waiting at most `timeout`. Returns
    /// [`ErrorCode::TaskTimeout`] if none becomes available in time.
    pub fn acquire_timeout(&self, timeout: Duration) -> ConcurResult<()> {
        let deadline = Instant::now() + timeout;
        let mut available = self.available.lock().unwrap();
        while *available == 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ErrorCode::TaskTimeout.into());
            }
            self.counters.contentions.fetch_add(1, Ordering::Relaxed);
            let (guard, signalled) = self.released.wait_timeout(available, remaining);
            available = guard;
            if !signalled && *available == 0 {
                return Err(ErrorCode::TaskTimeout.into());
            }
        }
        *available -= 1;
        self.counters.locks_taken.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Releases one permit. Fails with [`ErrorCode::SystemError`] rather
    /// than wrapping if that would exceed `max_permits`.
    pub fn release(&self) -> ConcurResult<()> {
        let mut available = self.available.lock().unwrap();
        if *available >= self.max_permits {
            return Err(ConcurError::with_context(
                ErrorCode::SystemError,
                "semaphore release would exceed max_permits",
            ));
        }
        *available += 1;
        drop(available);
        self.counters.signals_issued.fetch_add(1, Ordering::Relaxed);
        self.released.signal();
        Ok(())
    }

    pub fn available_permits(&self) -> u32 {
        *self.available.lock().unwrap()
    }

    pub fn max_permits(&self) -> u32 {
        self.max_permits
    }

    pub fn stats(&self) -> crate::PrimitiveStats {
        self.counters.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_and_release_round_trip() {
        let sem = CountingSemaphore::new(2, 2);
        sem.acquire();
        sem.acquire();
        assert_eq!(sem.available_permits(), 0);
        assert!(!sem.try_acquire());
        sem.release().unwrap();
        assert_eq!(sem.available_permits(), 1);
    }

    #[test]
    fn release_past_max_is_an_error() {
        let sem = CountingSemaphore::new(1, 1);
        assert!(sem.release().is_err());
        assert_eq!(sem.available_permits(), 1);
    }

    #[test]
    fn acquire_timeout_expires() {
        let sem = CountingSemaphore::new(1, 0);
        let result = sem.acquire_timeout(Duration::from_millis(20));
        assert!(matches!(result, Err(ref e) if e.code == ErrorCode::TaskTimeout));
    }
}
