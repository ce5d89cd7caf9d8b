// Copyright (c) 2026 the concur-bridge authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Object-safe introspection seams so the bridge can fold a
//! caller-created [`Channel`] into its unified statistics snapshot
//! without owning it. `Channel<T>` is generic; this trait erases `T` to
//! the handful of methods `get_stats` actually needs.

use concur_channel::{Channel, ChannelStats};

pub trait TrackedChannel: Send + Sync {
    fn name(&self) -> Option<&str>;
    fn channel_stats(&self) -> ChannelStats;
    fn len(&self) -> usize;
    fn capacity(&self) -> usize;
}

impl<T: Send + Sync> TrackedChannel for Channel<T> {
    fn name(&self) -> Option<&str> {
        Channel::name(self)
    }
    fn channel_stats(&self) -> ChannelStats {
        Channel::stats(self)
    }
    fn len(&self) -> usize {
        Channel::len(self)
    }
    fn capacity(&self) -> usize {
        Channel::capacity(self)
    }
}
