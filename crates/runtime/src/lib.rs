// Copyright (c) 2026 the concur-bridge authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! The bridge orchestrator crate: the top-level aggregating crate of the
//! concurrency runtime bridge, the way `crates/runtime` aggregates the
//! teacher's VM subsystems. Owns the process-wide singleton lifecycle
//! (`init`/`cleanup`), unified statistics, and the five-subsystem module
//! info surface from spec §6.

pub mod bridge;
pub mod config;
pub mod lifecycle;
pub mod stats;
pub mod tracking;

pub use bridge::{error_string, Bridge};
pub use config::{BridgeConfig, BridgeConfigBuilder};
pub use lifecycle::Stoppable;
pub use stats::{BridgeStats, GlobalCounters};
pub use tracking::TrackedChannel;

use std::sync::{Arc, RwLock};

use concur_types::{ConcurError, ConcurResult, ErrorCode};

/// Stamped the way the teacher stamps `RUNTIME_CODE_NAME` /
/// `RUNTIME_MAJOR/MINOR/PATCH_VERSION` in `crates/runtime/src/lib.rs`.
const BRIDGE_CODE_NAME: &str = "Tesseract";
const BRIDGE_MAJOR_VERSION: u16 = 1;
const BRIDGE_MINOR_VERSION: u16 = 0;
const BRIDGE_PATCH_VERSION: u16 = 0;

pub fn bridge_version() -> String {
    format!(
        "{BRIDGE_CODE_NAME} {BRIDGE_MAJOR_VERSION}.{BRIDGE_MINOR_VERSION}.{BRIDGE_PATCH_VERSION}"
    )
}

static GLOBAL_BRIDGE: RwLock<Option<Arc<Bridge>>> = RwLock::new(None);

/// Initializes the process-wide bridge with the given task/callback
/// budgets. Idempotent only when a bridge already exists with the same
/// `max_tasks`/`max_callbacks`; otherwise fails with
/// [`ErrorCode::InitFailed`] rather than silently replacing a live
/// bridge out from under other threads.
pub fn init(max_tasks: usize, max_callbacks: usize) -> ConcurResult<()> {
    init_with_config(
        BridgeConfig::builder()
            .max_tasks(max_tasks)
            .max_callbacks(max_callbacks)
            .build(),
    )
}

/// Convenience wrapper over [`init_with_config`] using
/// [`BridgeConfig::default`].
pub fn init_default() -> ConcurResult<()> {
    init_with_config(BridgeConfig::default())
}

/// As [`init`], but takes the full recognized configuration surface
/// (see [`BridgeConfig`]). Unknown options have no representation in
/// Rust — they simply don't compile, which is this crate's realization
/// of the spec's "unknown config options are rejected".
pub fn init_with_config(config: BridgeConfig) -> ConcurResult<()> {
    let config = bridge::validate_and_build(config)?;
    let mut slot = GLOBAL_BRIDGE.write().unwrap();
    if let Some(existing) = slot.as_ref() {
        let existing_config = existing.config();
        if existing_config.max_tasks == config.max_tasks
            && existing_config.max_callbacks == config.max_callbacks
        {
            return Ok(());
        }
        return Err(ConcurError::with_context(
            ErrorCode::InitFailed,
            "bridge already initialized with different limits",
        ));
    }
    *slot = Some(Bridge::new(config));
    log::debug!("bridge initialized: {}", bridge_version());
    Ok(())
}

/// Drains the callback queue, stops tracked pools/multiplexers,
/// unregisters threads and frees task handles, then clears the global
/// slot. A no-op if the bridge was never initialized.
pub fn cleanup() {
    let bridge = GLOBAL_BRIDGE.write().unwrap().take();
    if let Some(bridge) = bridge {
        bridge.cleanup();
        log::debug!("bridge cleaned up");
    }
}

pub fn is_initialized() -> bool {
    GLOBAL_BRIDGE.read().unwrap().is_some()
}

/// Returns the singleton bridge. Panics if called before [`init`] —
/// the Rust realization of the spec's "undefined behavior" contract for
/// this call, since leaving it truly undefined is not an option in safe
/// code.
pub fn get_bridge_ptr() -> Arc<Bridge> {
    GLOBAL_BRIDGE
        .read()
        .unwrap()
        .clone()
        .expect("concur_runtime::get_bridge_ptr called before init")
}

pub fn get_stats() -> ConcurResult<BridgeStats> {
    GLOBAL_BRIDGE
        .read()
        .unwrap()
        .as_ref()
        .map(|bridge| bridge.snapshot_stats())
        .ok_or_else(|| ConcurError::new(ErrorCode::InitFailed))
}

pub fn reset_stats() -> ConcurResult<()> {
    GLOBAL_BRIDGE
        .read()
        .unwrap()
        .as_ref()
        .map(|bridge| bridge.reset_stats())
        .ok_or_else(|| ConcurError::new(ErrorCode::InitFailed))
}

/// Per-subsystem introspection record for the module-info query surface
/// in spec §6. The module count is fixed at five.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: &'static str,
    pub version: String,
    pub description: &'static str,
    pub initialized: bool,
    pub memory_usage_estimate: u64,
    pub operation_count: u64,
}

/// Returns one record per subsystem named in spec §6: "atomics",
/// "tasks", "sync", "channels", "patterns" — always exactly five.
pub fn module_info() -> Vec<ModuleInfo> {
    let initialized = is_initialized();
    let (operation_count, memory_usage_estimate) = GLOBAL_BRIDGE
        .read()
        .unwrap()
        .as_ref()
        .map(|bridge| {
            let stats = bridge.snapshot_stats();
            (stats.total_operations, stats.memory_usage_estimate)
        })
        .unwrap_or((0, 0));

    let version = bridge_version();
    vec![
        ModuleInfo {
            name: "atomics",
            version: version.clone(),
            description: "typed atomic counters, memory ordering and the thread abstraction",
            initialized,
            memory_usage_estimate,
            operation_count,
        },
        ModuleInfo {
            name: "tasks",
            version: version.clone(),
            description: "task handles: spawn, await, cancel, detach",
            initialized,
            memory_usage_estimate,
            operation_count,
        },
        ModuleInfo {
            name: "sync",
            version: version.clone(),
            description: "mutex, condvar, rwlock, barrier, semaphore",
            initialized,
            memory_usage_estimate,
            operation_count,
        },
        ModuleInfo {
            name: "channels",
            version: version.clone(),
            description: "buffered channels, select contexts, the callback queue",
            initialized,
            memory_usage_estimate,
            operation_count,
        },
        ModuleInfo {
            name: "patterns",
            version,
            description: "worker pools, fan-out/fan-in, pipelines, load balancers, multiplexers",
            initialized,
            memory_usage_estimate,
            operation_count,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    // `init`/`cleanup` touch process-wide state; serialize the tests that
    // exercise it the same ad hoc way systems crates guard shared globals
    // across `#[test]` functions.
    static TEST_LOCK: StdMutex<()> = StdMutex::new(());

    #[test]
    fn init_cleanup_reinit_round_trips_with_zeroed_stats() {
        let _guard = TEST_LOCK.lock().unwrap();
        cleanup();
        assert!(init(8, 8).is_ok());
        assert!(is_initialized());
        get_bridge_ptr().tasks().spawn(|| Ok(1), Default::default()).unwrap();
        cleanup();
        assert!(!is_initialized());

        assert!(init(8, 8).is_ok());
        assert_eq!(get_stats().unwrap().task.spawned, 0);
        cleanup();
    }

    #[test]
    fn reinitializing_with_different_limits_is_rejected() {
        let _guard = TEST_LOCK.lock().unwrap();
        cleanup();
        init(4, 4).unwrap();
        let result = init(8, 8);
        assert!(matches!(result, Err(ref e) if e.code == ErrorCode::InitFailed));
        cleanup();
    }

    #[test]
    fn reinitializing_with_the_same_limits_succeeds() {
        let _guard = TEST_LOCK.lock().unwrap();
        cleanup();
        init(4, 4).unwrap();
        assert!(init(4, 4).is_ok());
        cleanup();
    }

    #[test]
    fn module_info_always_reports_exactly_five_subsystems() {
        let _guard = TEST_LOCK.lock().unwrap();
        cleanup();
        let modules = module_info();
        assert_eq!(modules.len(), 5);
        assert!(modules.iter().all(|m| !m.initialized));

        init_default().unwrap();
        let modules = module_info();
        assert!(modules.iter().all(|m| m.initialized));
        cleanup();
    }

    #[test]
    fn error_string_is_stable_for_a_known_code() {
        assert_eq!(error_string(ErrorCode::ChannelClosed), "channel is closed");
    }
}
