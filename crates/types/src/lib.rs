// Copyright (c) 2026 the concur-bridge authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Shared identifiers, error codes and the byte-oriented FFI boundary used
//! by every other crate in the concurrency bridge.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

pub mod ffi;

/// A 64-bit task identifier, monotonically assigned by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// A process-wide monotonic id generator, used for task ids, channel ids
/// and thread-descriptor ids alike.
#[derive(Debug, Default)]
pub struct IdGenerator(AtomicU64);

impl IdGenerator {
    pub const fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// Stable numeric error codes, mirroring the interface table in the
/// bridge's external contract. These values must never change once
/// shipped: embedders match on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    InitFailed = 0x0001,
    SystemError = 0x0002,

    TaskSpawnFailed = 0x1001,
    TaskNotFound = 0x1002,
    TaskTimeout = 0x1003,
    InvalidHandle = 0x1004,

    ThreadNotRegistered = 0x2001,
    MutexTimeout = 0x2002,
    RwLockTimeout = 0x2003,

    CallbackQueueFull = 0x3001,
    ChannelClosed = 0x3002,
    WouldBlock = 0x3003,
    /// Not part of the original error table: zero-capacity channels are an
    /// open question (see DESIGN.md); `send` on one returns this code
    /// rather than silently blocking forever.
    Unimplemented = 0x3004,

    PoolFull = 0x4001,
    PipelineFailed = 0x4002,
    WorkerFailed = 0x4003,
}

impl ErrorCode {
    /// Total function over the error-code enumeration, per the external
    /// interface contract: every code maps to a stable human-readable
    /// string.
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InitFailed => "bridge initialization failed",
            ErrorCode::SystemError => "system error",
            ErrorCode::TaskSpawnFailed => "task spawn failed",
            ErrorCode::TaskNotFound => "task not found",
            ErrorCode::TaskTimeout => "task wait timed out",
            ErrorCode::InvalidHandle => "invalid handle",
            ErrorCode::ThreadNotRegistered => "thread not registered",
            ErrorCode::MutexTimeout => "mutex lock timed out",
            ErrorCode::RwLockTimeout => "rwlock acquire timed out",
            ErrorCode::CallbackQueueFull => "callback queue is full",
            ErrorCode::ChannelClosed => "channel is closed",
            ErrorCode::WouldBlock => "operation would block",
            ErrorCode::Unimplemented => "operation not implemented",
            ErrorCode::PoolFull => "worker pool queue is full",
            ErrorCode::PipelineFailed => "pipeline stage failed",
            ErrorCode::WorkerFailed => "worker task failed",
        }
    }

    pub const fn code(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x} {}", self.code(), self.as_str())
    }
}

/// The bridge's single error type. Hand-rolled rather than built on
/// `thiserror`, matching the teacher's low-level `RuntimeError` idiom:
/// a plain struct pairing a stable code with an optional contextual
/// message.
#[derive(Debug, Clone)]
pub struct ConcurError {
    pub code: ErrorCode,
    context: Option<String>,
}

impl ConcurError {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            context: None,
        }
    }

    pub fn with_context(code: ErrorCode, context: impl Into<String>) -> Self {
        Self {
            code,
            context: Some(context.into()),
        }
    }
}

impl fmt::Display for ConcurError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(ctx) => write!(f, "{}: {}", self.code, ctx),
            None => write!(f, "{}", self.code),
        }
    }
}

impl std::error::Error for ConcurError {}

impl From<ErrorCode> for ConcurError {
    fn from(code: ErrorCode) -> Self {
        ConcurError::new(code)
    }
}

pub type ConcurResult<T> = Result<T, ConcurError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_string_is_total_and_stable() {
        for code in [
            ErrorCode::InitFailed,
            ErrorCode::SystemError,
            ErrorCode::TaskSpawnFailed,
            ErrorCode::TaskNotFound,
            ErrorCode::TaskTimeout,
            ErrorCode::InvalidHandle,
            ErrorCode::ThreadNotRegistered,
            ErrorCode::MutexTimeout,
            ErrorCode::RwLockTimeout,
            ErrorCode::CallbackQueueFull,
            ErrorCode::ChannelClosed,
            ErrorCode::WouldBlock,
            ErrorCode::Unimplemented,
            ErrorCode::PoolFull,
            ErrorCode::PipelineFailed,
            ErrorCode::WorkerFailed,
        ] {
            assert!(!code.as_str().is_empty());
        }
        assert_eq!(ErrorCode::TaskTimeout.code(), 0x1003);
        assert_eq!(ErrorCode::ChannelClosed.code(), 0x3002);
    }

    #[test]
    fn id_generator_is_monotonic_and_starts_above_zero() {
        let gen = IdGenerator::new();
        let a = gen.next();
        let b = gen.next();
        assert!(a >= 1);
        assert!(b > a);
    }
}
