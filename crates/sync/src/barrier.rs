// Copyright (c) 2026 the concur-bridge authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use std::sync::atomic::Ordering;
use std::sync::Mutex;

use concur_types::{ConcurError, ConcurResult, ErrorCode};

use crate::condvar::CountingCondvar;
use crate::PrimitiveCounters;

struct State {
    generation: u64,
    waiting: u32,
    /// The generation number `reset` most recently broke, if any. Tied to
    /// a specific generation rather than a plain bool so that a waiter
    /// woken after `reset` has already advanced past it can still tell
    /// its own generation was the one broken, without a window where a
    /// racing re-lock could hide that from it.
    broken_generation: Option<u64>,
}

/// A cyclic barrier for exactly `party_count` waiters per generation.
/// Each generation releases its waiters together, with exactly one of
/// them designated the leader.
pub struct CountingBarrier {
    party_count: u32,
    state: Mutex<State>,
    released: CountingCondvar,
    counters: PrimitiveCounters,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierWaitResult {
    pub is_leader: bool,
    pub generation: u64,
}

impl CountingBarrier {
    pub fn new(party_count: u32) -> Self {
        Self {
            party_count,
            state: Mutex::new(State {
                generation: 0,
                waiting: 0,
                broken_generation: None,
            }),
            released: CountingCondvar::new(),
            counters: PrimitiveCounters::new(),
        }
    }

    /// Blocks until `party_count` waiters have called `wait` in the
    /// current generation, then releases all of them together. Exactly
    /// one waiter per generation is told `is_leader == true`.
    pub fn wait(&self) -> ConcurResult<BarrierWaitResult> {
        let mut state = self.state.lock().unwrap();
        let local_generation = state.generation;
        if state.broken_generation == Some(local_generation) {
            return Err(ConcurError::with_context(
                ErrorCode::SystemError,
                "barrier is broken",
            ));
        }
        state.waiting += 1;
        self.counters.waiters.fetch_add(1, Ordering::Relaxed);

        if state.waiting == self.party_count {
            // last arrival: this thread is the leader for this generation
            state.waiting = 0;
            state.generation += 1;
            self.counters.signals_issued.fetch_add(1, Ordering::Relaxed);
            self.released.broadcast();
            self.counters.waiters.fetch_sub(1, Ordering::Relaxed);
            return Ok(BarrierWaitResult {
                is_leader: true,
                generation: local_generation,
            });
        }

        self.counters.contentions.fetch_add(1, Ordering::Relaxed);
        while state.generation == local_generation {
            state = self.released.wait(state);
        }
        self.counters.waiters.fetch_sub(1, Ordering::Relaxed);

        if state.broken_generation == Some(local_generation) {
            return Err(ConcurError::with_context(
                ErrorCode::SystemError,
                "barrier was reset while waiting",
            ));
        }
        Ok(BarrierWaitResult {
            is_leader: false,
            generation: local_generation,
        })
    }

    /// Marks the current generation broken, waking every current waiter
    /// with an error, then advances to a fresh generation for whoever
    /// calls `wait` next. The broken marker is tied to the specific
    /// generation number rather than a plain flag, so a waiter has no
    /// window in which the generation has already moved on but it can no
    /// longer tell its own wait was the one that got broken.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        let broken = state.generation;
        state.broken_generation = Some(broken);
        state.waiting = 0;
        state.generation += 1;
        self.counters.signals_issued.fetch_add(1, Ordering::Relaxed);
        self.released.broadcast();
        log::debug!("barrier broke generation {broken}, party_count={}", self.party_count);
    }

    pub fn party_count(&self) -> u32 {
        self.party_count
    }

    pub fn stats(&self) -> crate::PrimitiveStats {
        self.counters.snapshot()
    }
}
