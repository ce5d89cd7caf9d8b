// Copyright (c) 2026 the concur-bridge authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! A minimal seam letting the bridge tell tracked worker pools and
//! multiplexers to stop at `cleanup()`, without requiring either type to
//! change its `&mut self` shutdown API.

use std::sync::Mutex;

use concur_patterns::{Multiplexer, WorkerPool};

pub trait Stoppable: Send + Sync {
    fn stop(&self);
}

impl Stoppable for Mutex<WorkerPool> {
    fn stop(&self) {
        self.lock().unwrap().shutdown(true);
    }
}

impl Stoppable for Mutex<Multiplexer> {
    fn stop(&self) {
        self.lock().unwrap().stop();
    }
}
