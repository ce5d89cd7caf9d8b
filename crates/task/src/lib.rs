// Copyright (c) 2026 the concur-bridge authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Spawning, awaiting and cancelling tasks across the bridge.
//!
//! The teacher's `ChildThread` (see `crates/runtime/src/lib.rs` and
//! `interpreter/envcall/multithread.rs`) already bundles a `JoinHandle`
//! with a channel pair per spawned thread and a `CHILD_THREADS` map keyed
//! by a small integer id. This crate generalizes that exact shape:
//! [`TaskHandle<T>`] replaces the channel pair with a mutex/condvar
//! completion gate (so any number of callers can observe the same result),
//! and [`TaskRegistry`] replaces the thread-local `BTreeMap` with a shared
//! map behind a lock, per the redesign note on arena-style collections
//! standing in for intrusive lists.

mod handle;
mod registry;

pub use handle::{TaskHandle, TaskState};
pub use registry::{TaskOptions, TaskRegistry, TaskStats};
