// Copyright (c) 2026 the concur-bridge authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Multiplexer: while active, drains a set of input channels and invokes
//! a processor callable on each item.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use concur_channel::Channel;
use concur_types::ErrorCode;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct Multiplexer {
    active: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    processed: Arc<AtomicU64>,
}

impl Multiplexer {
    /// Starts draining `inputs`, invoking `processor` on each item as it
    /// arrives, until [`Multiplexer::stop`] is called or every input
    /// closes and drains.
    pub fn start<T, F>(inputs: Vec<Arc<Channel<T>>>, processor: F) -> Self
    where
        T: Send + 'static,
        F: Fn(T) + Send + 'static,
    {
        let active = Arc::new(AtomicBool::new(true));
        let active_clone = Arc::clone(&active);
        let processed = Arc::new(AtomicU64::new(0));
        let processed_clone = Arc::clone(&processed);

        let handle = thread::spawn(move || {
            let mut open = vec![true; inputs.len()];
            while active_clone.load(Ordering::Acquire) && open.iter().any(|o| *o) {
                for (index, input) in inputs.iter().enumerate() {
                    if !open[index] {
                        continue;
                    }
                    match input.try_recv() {
                        Ok(item) => {
                            processor(item);
                            processed_clone.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(err) if err.code == ErrorCode::ChannelClosed => {
                            open[index] = false;
                        }
                        Err(_) => {}
                    }
                }
                thread::sleep(POLL_INTERVAL);
            }
        });

        Self {
            active,
            handle: Some(handle),
            processed,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Clears the active flag and joins the drain thread.
    pub fn stop(&mut self) {
        self.active.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Multiplexer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn processes_items_from_all_inputs_until_stopped() {
        let inputs: Vec<Arc<Channel<i32>>> = (0..2).map(|_| Arc::new(Channel::new(4))).collect();
        for input in &inputs {
            input.send(1, None).unwrap();
            input.send(2, None).unwrap();
        }
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let mut mux = Multiplexer::start(inputs, move |item| {
            seen_clone.lock().unwrap().push(item);
        });

        thread::sleep(Duration::from_millis(100));
        mux.stop();
        assert!(!mux.is_active());
        assert_eq!(seen.lock().unwrap().len(), 4);
        assert_eq!(mux.processed(), 4);
    }
}
