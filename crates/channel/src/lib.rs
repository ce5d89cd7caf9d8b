// Copyright (c) 2026 the concur-bridge authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Buffered channels and multi-channel selection.
//!
//! The teacher reaches for `std::sync::mpsc` when it wires up
//! thread-to-thread communication (`multithread_program.rs`). That gets
//! a program started fast but can't give us the introspection
//! (`len`/`cap`/`is_closed`), bounded-capacity backpressure or
//! close-wakes-everyone semantics the bridge's channels need, so this
//! crate generalizes the same "mutex + two condvars around a buffer"
//! shape the teacher already uses for its task-completion gate into a
//! dedicated ring-buffered channel type.

pub mod channel;
pub mod select;

pub use channel::{Channel, ChannelStats};
pub use select::SelectContext;
