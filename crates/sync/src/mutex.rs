// Copyright (c) 2026 the concur-bridge authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::Ordering;
use std::sync::{Condvar, Mutex, MutexGuard, TryLockError};
use std::thread::{self, ThreadId};

use concur_types::{ConcurError, ConcurResult, ErrorCode};

use crate::PrimitiveCounters;

/// A plain (non-reentrant) mutex wrapping `std::sync::Mutex`, carrying a
/// display name and the lock/contention counters the bridge aggregates.
pub struct CountingMutex<T> {
    inner: Mutex<T>,
    name: Option<String>,
    counters: PrimitiveCounters,
}

impl<T> CountingMutex<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
            name: None,
            counters: PrimitiveCounters::new(),
        }
    }

    pub fn named(name: impl Into<String>, value: T) -> Self {
        Self {
            inner: Mutex::new(value),
            name: Some(name.into()),
            counters: PrimitiveCounters::new(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Blocks until the lock is acquired. A poisoned lock is recovered
    /// (the guarded value is still returned) rather than propagated —
    /// this runtime never panics while holding one of its own locks, so
    /// poisoning here would only ever come from a caller's payload
    /// panicking, and losing the lock entirely would be worse than
    /// handing back possibly-inconsistent data the caller already owns.
    pub fn lock(&self) -> CountingMutexGuard<'_, T> {
        let guard = match self.inner.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                self.counters.contentions.fetch_add(1, Ordering::Relaxed);
                self.inner.lock().unwrap_or_else(|poison| poison.into_inner())
            }
            Err(TryLockError::Poisoned(poison)) => poison.into_inner(),
        };
        self.counters.locks_taken.fetch_add(1, Ordering::Relaxed);
        CountingMutexGuard { guard }
    }

    pub fn try_lock(&self) -> Option<CountingMutexGuard<'_, T>> {
        match self.inner.try_lock() {
            Ok(guard) => {
                self.counters.locks_taken.fetch_add(1, Ordering::Relaxed);
                Some(CountingMutexGuard { guard })
            }
            Err(TryLockError::WouldBlock) => None,
            Err(TryLockError::Poisoned(poison)) => {
                self.counters.locks_taken.fetch_add(1, Ordering::Relaxed);
                Some(CountingMutexGuard {
                    guard: poison.into_inner(),
                })
            }
        }
    }

    pub fn stats(&self) -> crate::PrimitiveStats {
        self.counters.snapshot()
    }
}

pub struct CountingMutexGuard<'a, T> {
    guard: MutexGuard<'a, T>,
}

impl<T> Deref for CountingMutexGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for CountingMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

/// A reentrant mutex: the owning thread may lock it again without
/// deadlocking. Tracks the current owner and recursion depth as the spec
/// requires (`recursive` mutexes in §4.5), implemented as an explicit
/// state machine over a plain `Mutex` + `Condvar` pair since
/// `std::sync::Mutex` itself is not reentrant.
pub struct RecursiveMutex<T> {
    state: Mutex<RecursiveState>,
    available: Condvar,
    data: UnsafeCell<T>,
    counters: PrimitiveCounters,
}

struct RecursiveState {
    owner: Option<ThreadId>,
    depth: u32,
}

// SAFETY: `data` is only ever accessed while `state.owner` identifies the
// calling thread, which `lock`/`unlock` enforce.
unsafe impl<T: Send> Send for RecursiveMutex<T> {}
unsafe impl<T: Send> Sync for RecursiveMutex<T> {}

impl<T> RecursiveMutex<T> {
    pub fn new(value: T) -> Self {
        Self {
            state: Mutex::new(RecursiveState {
                owner: None,
                depth: 0,
            }),
            available: Condvar::new(),
            data: UnsafeCell::new(value),
            counters: PrimitiveCounters::new(),
        }
    }

    /// Acquires the lock, recursively if this thread already holds it.
    /// Fails with [`ErrorCode::SystemError`] if the recursion depth would
    /// overflow `u32` — an error, never a silently truncated counter.
    pub fn lock(&self) -> ConcurResult<RecursiveMutexGuard<'_, T>> {
        let this_thread = thread::current().id();
        let mut state = self.state.lock().unwrap();
        loop {
            match state.owner {
                Some(owner) if owner == this_thread => {
                    state.depth = state.depth.checked_add(1).ok_or_else(|| {
                        ConcurError::with_context(
                            ErrorCode::SystemError,
                            "recursive mutex depth overflow",
                        )
                    })?;
                    break;
                }
                None => {
                    state.owner = Some(this_thread);
                    state.depth = 1;
                    break;
                }
                Some(_) => {
                    self.counters.contentions.fetch_add(1, Ordering::Relaxed);
                    state = self.available.wait(state).unwrap();
                }
            }
        }
        self.counters.locks_taken.fetch_add(1, Ordering::Relaxed);
        Ok(RecursiveMutexGuard { mutex: self })
    }

    fn unlock(&self) {
        let mut state = self.state.lock().unwrap();
        debug_assert_eq!(state.owner, Some(thread::current().id()));
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            drop(state);
            self.counters.signals_issued.fetch_add(1, Ordering::Relaxed);
            self.available.notify_one();
        }
    }

    pub fn stats(&self) -> crate::PrimitiveStats {
        self.counters.snapshot()
    }
}

pub struct RecursiveMutexGuard<'a, T> {
    mutex: &'a RecursiveMutex<T>,
}

// A reentrant lock can be held more than once at a time on the same
// thread, so two live guards may alias the same data. Only shared access
// is sound to expose here; callers needing mutation must use interior
// mutability (`Cell`, `RefCell`, or their own locking) on `T`.
impl<T> Deref for RecursiveMutexGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T> Drop for RecursiveMutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn plain_mutex_serializes_access() {
        let m = Arc::new(CountingMutex::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let m = Arc::clone(&m);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    *m.lock() += 1;
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*m.lock(), 8000);
        assert!(m.stats().locks_taken >= 8000);
    }

    #[test]
    fn recursive_mutex_allows_reentry() {
        let m = RecursiveMutex::new(std::cell::Cell::new(0));
        let outer = m.lock().unwrap();
        {
            let inner = m.lock().unwrap();
            inner.set(inner.get() + 1);
        }
        assert_eq!(outer.get(), 1);
    }

    #[test]
    fn recursive_mutex_unblocks_other_threads_on_final_unlock() {
        let m = Arc::new(RecursiveMutex::new(std::cell::Cell::new(0)));
        let guard = m.lock().unwrap();
        let g2 = m.lock().unwrap();
        drop(g2);
        drop(guard);

        let m2 = Arc::clone(&m);
        let handle = thread::spawn(move || {
            let g = m2.lock().unwrap();
            g.set(g.get() + 41);
        });
        handle.join().unwrap();
        assert_eq!(m.lock().unwrap().get(), 41);
    }
}
