// Copyright (c) 2026 the concur-bridge authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use std::sync::atomic::Ordering;
use std::sync::{Condvar, MutexGuard};
use std::time::Duration;

use crate::PrimitiveCounters;

/// A condition variable wrapping `std::sync::Condvar`, tracking waiters
/// present and signals issued. Used paired with a plain
/// `std::sync::Mutex<State>` by every other primitive in this crate
/// (barrier, rwlock, semaphore) as well as by the task and channel
/// subsystems' completion gates.
#[derive(Default)]
pub struct CountingCondvar {
    inner: Condvar,
    counters: PrimitiveCounters,
}

impl CountingCondvar {
    pub fn new() -> Self {
        Self {
            inner: Condvar::new(),
            counters: PrimitiveCounters::new(),
        }
    }

    pub fn wait<'a, T>(&self, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
        self.counters.waiters.fetch_add(1, Ordering::Relaxed);
        let guard = self.inner.wait(guard).unwrap_or_else(|p| p.into_inner());
        self.counters.waiters.fetch_sub(1, Ordering::Relaxed);
        guard
    }

    /// Waits until signalled or `timeout` elapses. Returns `(guard,
    /// signalled)`; `signalled == false` means the deadline elapsed
    /// first. Spurious wakeups are the caller's responsibility to
    /// re-check, exactly as with `std::sync::Condvar`.
    pub fn wait_timeout<'a, T>(
        &self,
        guard: MutexGuard<'a, T>,
        timeout: Duration,
    ) -> (MutexGuard<'a, T>, bool) {
        self.counters.waiters.fetch_add(1, Ordering::Relaxed);
        let (guard, result) = self
            .inner
            .wait_timeout(guard, timeout)
            .unwrap_or_else(|p| p.into_inner());
        self.counters.waiters.fetch_sub(1, Ordering::Relaxed);
        (guard, !result.timed_out())
    }

    pub fn signal(&self) {
        self.counters.signals_issued.fetch_add(1, Ordering::Relaxed);
        self.inner.notify_one();
    }

    pub fn broadcast(&self) {
        self.counters.signals_issued.fetch_add(1, Ordering::Relaxed);
        self.inner.notify_all();
    }

    pub fn stats(&self) -> crate::PrimitiveStats {
        self.counters.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn wait_wakes_on_signal() {
        let pair = Arc::new((Mutex::new(false), CountingCondvar::new()));
        let pair2 = Arc::clone(&pair);

        let handle = thread::spawn(move || {
            let (lock, cvar) = &*pair2;
            let mut ready = lock.lock().unwrap();
            while !*ready {
                ready = cvar.wait(ready);
            }
        });

        thread::sleep(Duration::from_millis(20));
        let (lock, cvar) = &*pair;
        *lock.lock().unwrap() = true;
        cvar.signal();
        handle.join().unwrap();
        assert!(cvar.stats().signals_issued >= 1);
    }

    #[test]
    fn wait_timeout_reports_expiry() {
        let lock = Mutex::new(());
        let cvar = CountingCondvar::new();
        let guard = lock.lock().unwrap();
        let (_guard, signalled) = cvar.wait_timeout(guard, Duration::from_millis(20));
        assert!(!signalled);
    }
}
