// Copyright (c) 2026 the concur-bridge authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Synchronization primitives: mutex (plain and recursive), condition
//! variable, read-write lock, barrier and counting semaphore, each
//! wrapping the corresponding `std::sync` primitive and carrying the
//! contention/usage counters the bridge's unified statistics expect.

pub mod barrier;
pub mod condvar;
pub mod mutex;
pub mod rwlock;
pub mod semaphore;

pub use barrier::{BarrierWaitResult, CountingBarrier};
pub use condvar::CountingCondvar;
pub use mutex::{CountingMutex, CountingMutexGuard, RecursiveMutex, RecursiveMutexGuard};
pub use rwlock::CountingRwLock;
pub use semaphore::CountingSemaphore;

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by every primitive in this crate. Incremented with
/// relaxed ordering — the spec treats all statistics as advisory.
#[derive(Debug, Default)]
pub struct PrimitiveCounters {
    pub locks_taken: AtomicU64,
    pub contentions: AtomicU64,
    pub signals_issued: AtomicU64,
    pub waiters: AtomicU64,
}

impl PrimitiveCounters {
    pub const fn new() -> Self {
        Self {
            locks_taken: AtomicU64::new(0),
            contentions: AtomicU64::new(0),
            signals_issued: AtomicU64::new(0),
            waiters: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> PrimitiveStats {
        PrimitiveStats {
            locks_taken: self.locks_taken.load(Ordering::Relaxed),
            contentions: self.contentions.load(Ordering::Relaxed),
            signals_issued: self.signals_issued.load(Ordering::Relaxed),
            waiters: self.waiters.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of [`PrimitiveCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrimitiveStats {
    pub locks_taken: u64,
    pub contentions: u64,
    pub signals_issued: u64,
    pub waiters: u64,
}
