// Copyright (c) 2026 the concur-bridge authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! The bridge orchestrator: the process-wide object that owns the task
//! registry, callback queue and thread registry, and aggregates their
//! statistics. Everything else in the concurrency bridge (channels, sync
//! primitives, worker pools built directly) is created by application
//! code without going through this type — see the data-flow note in
//! spec §2.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use concur_callback::CallbackQueue;
use concur_registry::ThreadRegistry;
use concur_task::TaskRegistry;
use concur_types::{ConcurResult, ErrorCode};

use crate::config::BridgeConfig;
use crate::lifecycle::Stoppable;
use crate::stats::{BridgeStats, GlobalCounters};
use crate::tracking::TrackedChannel;

/// The process-wide concurrency runtime instance. Construct via
/// [`crate::init`]/[`crate::init_with_config`] rather than directly —
/// those own the single global slot this type's lifetime is tied to.
pub struct Bridge {
    config: BridgeConfig,
    created_at: Instant,
    task_registry: Arc<TaskRegistry>,
    callback_queue: Arc<CallbackQueue>,
    thread_registry: Arc<ThreadRegistry>,
    channels: Mutex<Vec<Arc<dyn TrackedChannel>>>,
    stoppables: Mutex<Vec<Arc<dyn Stoppable>>>,
    counters: GlobalCounters,
}

impl Bridge {
    pub(crate) fn new(config: BridgeConfig) -> Arc<Self> {
        let thread_registry = Arc::new(ThreadRegistry::with_default_sink());
        let task_registry = TaskRegistry::new(config.max_tasks, Arc::clone(&thread_registry));
        let callback_queue = Arc::new(CallbackQueue::new(config.max_callbacks));
        Arc::new(Self {
            config,
            created_at: Instant::now(),
            task_registry,
            callback_queue,
            thread_registry,
            channels: Mutex::new(Vec::new()),
            stoppables: Mutex::new(Vec::new()),
            counters: GlobalCounters::new(),
        })
    }

    pub fn config(&self) -> BridgeConfig {
        self.config
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn tasks(&self) -> &Arc<TaskRegistry> {
        &self.task_registry
    }

    pub fn callbacks(&self) -> &Arc<CallbackQueue> {
        &self.callback_queue
    }

    pub fn threads(&self) -> &Arc<ThreadRegistry> {
        &self.thread_registry
    }

    /// Folds `channel`'s introspection into future [`Bridge::snapshot_stats`]
    /// calls. The bridge does not take ownership: dropping every other
    /// `Arc` to the channel still frees it as normal, this just keeps a
    /// weak-in-spirit read handle for statistics.
    pub fn track_channel(&self, channel: Arc<dyn TrackedChannel>) {
        self.channels.lock().unwrap().push(channel);
    }

    /// Registers a worker pool or multiplexer to be told to stop during
    /// [`Bridge::cleanup`]. Typical callers wrap their pool in
    /// `Arc<Mutex<WorkerPool>>` (or `Multiplexer`) before registering,
    /// since stopping either requires `&mut self`.
    pub fn track_stoppable(&self, stoppable: Arc<dyn Stoppable>) {
        self.stoppables.lock().unwrap().push(stoppable);
    }

    pub fn record_mutex_contention(&self) {
        self.counters.mutex_contentions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rwlock_contention(&self) {
        self.counters.rwlock_contentions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_data_structure_op(&self) {
        self.counters.data_structure_operations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ordering_violation(&self) {
        self.counters.ordering_violations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_operation(&self) {
        self.counters.total_operations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.counters.total_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// A point-in-time union of every owned subsystem's stats plus the
    /// bridge's own top-level counters, per spec §6's snapshot layout.
    pub fn snapshot_stats(&self) -> BridgeStats {
        let task = self.task_registry.stats();
        let callback = self.callback_queue.stats();
        let channel = self
            .channels
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.channel_stats())
            .fold(Default::default(), |acc: concur_channel::ChannelStats, s| {
                concur_channel::ChannelStats {
                    sends: acc.sends + s.sends,
                    receives: acc.receives + s.receives,
                    blocked_ops: acc.blocked_ops + s.blocked_ops,
                }
            });

        let active_components = (task.active > 0) as u64
            + (!self.callback_queue.is_empty()) as u64
            + (self.thread_registry.len() > 0) as u64;

        BridgeStats {
            task,
            callback,
            channel,
            pool: Default::default(),
            total_operations: self.counters.total_operations.load(Ordering::Relaxed),
            total_errors: self.counters.total_errors.load(Ordering::Relaxed),
            active_components,
            memory_usage_estimate: self.counters.memory_usage_estimate.load(Ordering::Relaxed),
            threads_registered: self.thread_registry.len() as u64,
            gc_roots_registered: self.thread_registry.total_roots() as u64,
            mutex_contentions: self.counters.mutex_contentions.load(Ordering::Relaxed),
            rwlock_contentions: self.counters.rwlock_contentions.load(Ordering::Relaxed),
            data_structure_operations: self
                .counters
                .data_structure_operations
                .load(Ordering::Relaxed),
            ordering_violations: self.counters.ordering_violations.load(Ordering::Relaxed),
        }
    }

    /// Zeroes every counter the bridge itself owns. Does not reset
    /// counters on tracked channels/pools — those are owned by the
    /// caller and outlive any single bridge generation.
    pub fn reset_stats(&self) {
        self.counters.reset();
    }

    /// Drains the callback queue (counting every entry dropped),
    /// signals tracked pools/multiplexers to stop, unregisters all
    /// remaining threads, and frees remaining task handles. Never fails:
    /// cleanup paths drain rather than abort, per spec §7.
    pub(crate) fn cleanup(&self) {
        let dropped = self.callback_queue.shutdown();
        if dropped > 0 {
            log::debug!("cleanup: dropped {dropped} queued callbacks");
        }
        for stoppable in self.stoppables.lock().unwrap().drain(..) {
            stoppable.stop();
        }
        self.thread_registry.unregister_all();
        let freed = self.task_registry.free_all();
        if freed > 0 {
            log::debug!("cleanup: freed {freed} tracked task handles");
        }
        self.channels.lock().unwrap().clear();
    }
}

/// Translates the error-code enumeration's stable numeric range into its
/// human-readable string. Thin wrapper so callers don't need to import
/// `concur_types` directly for this one lookup.
pub fn error_string(code: ErrorCode) -> &'static str {
    code.as_str()
}

pub(crate) fn validate_and_build(config: BridgeConfig) -> ConcurResult<BridgeConfig> {
    config.validate()?;
    Ok(config)
}
