// Copyright (c) 2026 the concur-bridge authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Fan-out: publish each item received on one input channel to exactly
//! one of `N` output channels, after running a worker function on it.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use concur_channel::Channel;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Reads from `input`, applies `worker` to each item, and writes the
/// transformed item to one of `outputs` chosen round-robin. Ordering
/// across outputs is not guaranteed, per the spec.
pub struct FanOut {
    handle: Option<JoinHandle<()>>,
    processed: Arc<AtomicU64>,
}

impl FanOut {
    pub fn spawn<T, F>(
        input: Arc<Channel<T>>,
        outputs: Vec<Arc<Channel<T>>>,
        worker: F,
    ) -> Self
    where
        T: Send + 'static,
        F: Fn(T) -> T + Send + 'static,
    {
        assert!(!outputs.is_empty(), "fan-out requires at least one output");
        let processed = Arc::new(AtomicU64::new(0));
        let processed_clone = Arc::clone(&processed);
        let next_output = AtomicUsize::new(0);

        let handle = thread::spawn(move || loop {
            match input.recv(Some(POLL_INTERVAL)) {
                Ok(item) => {
                    let item = worker(item);
                    let index = next_output.fetch_add(1, Ordering::Relaxed) % outputs.len();
                    if outputs[index].send(item, None).is_err() {
                        break;
                    }
                    processed_clone.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) if err.code == concur_types::ErrorCode::ChannelClosed => break,
                Err(_) => continue,
            }
        });

        Self {
            handle: Some(handle),
            processed,
        }
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distributes_items_across_all_outputs() {
        let input: Arc<Channel<i32>> = Arc::new(Channel::new(8));
        let outputs: Vec<Arc<Channel<i32>>> =
            (0..2).map(|_| Arc::new(Channel::new(8))).collect();

        for i in 0..4 {
            input.send(i, None).unwrap();
        }

        let fanout = FanOut::spawn(Arc::clone(&input), outputs.clone(), |x| x * 2);

        thread::sleep(Duration::from_millis(150));
        input.close();
        fanout.join();

        let total: usize = outputs.iter().map(|c| c.len()).sum();
        assert_eq!(total, 4);
        assert!(outputs.iter().all(|c| !c.is_empty()));
    }
}
