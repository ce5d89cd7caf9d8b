// Copyright (c) 2026 the concur-bridge authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! The unified statistics snapshot the bridge aggregates, per spec §6's
//! layout: task/sync/channel/pattern sub-stats, then top-level
//! aggregates.
//!
//! The bridge only ever directly owns a task registry, a callback queue
//! and a thread registry (application code creates channels, sync
//! primitives and patterns directly — see the data-flow note in spec
//! §2), so the channel sub-stats below are filled from whichever
//! instances the caller explicitly hands to
//! [`crate::Bridge::track_channel`] rather than from a global census the
//! bridge has no way to take; the pool sub-stats stay zeroed, since
//! pools are only tracked for shutdown via
//! [`crate::Bridge::track_stoppable`], not for statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use concur_callback::CallbackQueueStats;
use concur_channel::ChannelStats;
use concur_patterns::PoolStats;
use concur_task::TaskStats;

/// Point-in-time union of every sub-stats type plus the bridge's own
/// top-level counters. All fields are snapshots; nothing here is live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub task: TaskStats,
    pub callback: CallbackQueueStats,
    pub channel: ChannelStats,
    pub pool: PoolStats,

    pub total_operations: u64,
    pub total_errors: u64,
    pub active_components: u64,
    pub memory_usage_estimate: u64,
    pub threads_registered: u64,
    pub gc_roots_registered: u64,
    pub mutex_contentions: u64,
    pub rwlock_contentions: u64,
    pub data_structure_operations: u64,
    pub ordering_violations: u64,
}

/// The atomics the bridge owns directly (everything that isn't pulled
/// live from a sub-component at snapshot time). Incremented with
/// relaxed ordering throughout, per the spec's "all statistics are
/// advisory" rule.
#[derive(Default)]
pub struct GlobalCounters {
    pub total_operations: AtomicU64,
    pub total_errors: AtomicU64,
    pub memory_usage_estimate: AtomicU64,
    pub mutex_contentions: AtomicU64,
    pub rwlock_contentions: AtomicU64,
    pub data_structure_operations: AtomicU64,
    pub ordering_violations: AtomicU64,
}

impl GlobalCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self) {
        self.total_operations.store(0, Ordering::Relaxed);
        self.total_errors.store(0, Ordering::Relaxed);
        self.memory_usage_estimate.store(0, Ordering::Relaxed);
        self.mutex_contentions.store(0, Ordering::Relaxed);
        self.rwlock_contentions.store(0, Ordering::Relaxed);
        self.data_structure_operations.store(0, Ordering::Relaxed);
        self.ordering_violations.store(0, Ordering::Relaxed);
    }
}
