// Copyright (c) 2026 the concur-bridge authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Bridge configuration.
//!
//! The teacher models runtime configuration as a plain struct built up
//! programmatically (`ProgramSettings`-style shapes throughout
//! `crates/runtime`), never parsed from a file — no `serde`/`config`
//! crate appears anywhere in its configuration path. `BridgeConfig`
//! follows the same idiom: a plain struct with a builder, validated at
//! `init_with_config` time. Unknown options simply have no
//! representation, which is the Rust-idiomatic realization of the
//! spec's "unknown options are rejected".

use concur_types::{ConcurError, ConcurResult, ErrorCode};

/// The recognized configuration surface for [`crate::Bridge::init_with_config`].
#[derive(Debug, Clone, Copy)]
pub struct BridgeConfig {
    pub max_tasks: usize,
    pub max_callbacks: usize,
    /// Advisory: not enforced as a hard budget, mirrored into
    /// introspection only.
    pub max_channels: usize,
    /// Advisory: not enforced as a hard budget, mirrored into
    /// introspection only.
    pub max_worker_pools: usize,
    pub enable_statistics: bool,
    pub enable_debugging: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_tasks: 1024,
            max_callbacks: 4096,
            max_channels: 256,
            max_worker_pools: 32,
            enable_statistics: true,
            enable_debugging: false,
        }
    }
}

impl BridgeConfig {
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder::default()
    }

    /// Rejects non-positive budgets; `max_channels`/`max_worker_pools`
    /// being advisory, zero is still accepted for them (it simply means
    /// "no introspection budget configured").
    pub(crate) fn validate(&self) -> ConcurResult<()> {
        if self.max_tasks == 0 {
            return Err(ConcurError::with_context(
                ErrorCode::InitFailed,
                "max_tasks must be positive",
            ));
        }
        if self.max_callbacks == 0 {
            return Err(ConcurError::with_context(
                ErrorCode::InitFailed,
                "max_callbacks must be positive",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BridgeConfigBuilder {
    max_tasks: Option<usize>,
    max_callbacks: Option<usize>,
    max_channels: Option<usize>,
    max_worker_pools: Option<usize>,
    enable_statistics: Option<bool>,
    enable_debugging: Option<bool>,
}

impl BridgeConfigBuilder {
    pub fn max_tasks(mut self, value: usize) -> Self {
        self.max_tasks = Some(value);
        self
    }

    pub fn max_callbacks(mut self, value: usize) -> Self {
        self.max_callbacks = Some(value);
        self
    }

    pub fn max_channels(mut self, value: usize) -> Self {
        self.max_channels = Some(value);
        self
    }

    pub fn max_worker_pools(mut self, value: usize) -> Self {
        self.max_worker_pools = Some(value);
        self
    }

    pub fn enable_statistics(mut self, value: bool) -> Self {
        self.enable_statistics = Some(value);
        self
    }

    pub fn enable_debugging(mut self, value: bool) -> Self {
        self.enable_debugging = Some(value);
        self
    }

    pub fn build(self) -> BridgeConfig {
        let defaults = BridgeConfig::default();
        BridgeConfig {
            max_tasks: self.max_tasks.unwrap_or(defaults.max_tasks),
            max_callbacks: self.max_callbacks.unwrap_or(defaults.max_callbacks),
            max_channels: self.max_channels.unwrap_or(defaults.max_channels),
            max_worker_pools: self.max_worker_pools.unwrap_or(defaults.max_worker_pools),
            enable_statistics: self.enable_statistics.unwrap_or(defaults.enable_statistics),
            enable_debugging: self.enable_debugging.unwrap_or(defaults.enable_debugging),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_only_the_fields_set() {
        let config = BridgeConfig::builder().max_tasks(8).build();
        assert_eq!(config.max_tasks, 8);
        assert_eq!(config.max_callbacks, BridgeConfig::default().max_callbacks);
    }

    #[test]
    fn zero_max_tasks_fails_validation() {
        let config = BridgeConfig::builder().max_tasks(0).build();
        assert!(config.validate().is_err());
    }
}
