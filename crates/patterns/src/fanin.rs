// Copyright (c) 2026 the concur-bridge authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Fan-in: collect items from `N` input channels and write them to a
//! single output channel. Fair interleaving across inputs is not
//! guaranteed, per the spec — this reads inputs in round-robin order,
//! which gives rough fairness but no hard guarantee under skewed load.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use concur_channel::Channel;
use concur_types::ErrorCode;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct FanIn {
    handle: Option<JoinHandle<()>>,
    collected: Arc<AtomicU64>,
}

impl FanIn {
    pub fn spawn<T: Send + 'static>(inputs: Vec<Arc<Channel<T>>>, output: Arc<Channel<T>>) -> Self {
        assert!(!inputs.is_empty(), "fan-in requires at least one input");
        let collected = Arc::new(AtomicU64::new(0));
        let collected_clone = Arc::clone(&collected);

        let handle = thread::spawn(move || {
            let mut open: Vec<bool> = vec![true; inputs.len()];
            while open.iter().any(|o| *o) {
                for (index, input) in inputs.iter().enumerate() {
                    if !open[index] {
                        continue;
                    }
                    match input.try_recv() {
                        Ok(item) => {
                            if output.send(item, None).is_err() {
                                return;
                            }
                            collected_clone.fetch_add(1, Ordering::Relaxed);
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
            handle: Some(handle),
            collected,
        }
    }

    pub fn collected(&self) -> u64 {
        self.collected.load(Ordering::Relaxed)
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
    fn collects_items_from_every_input_into_the_output() {
        let inputs: Vec<Arc<Channel<i32>>> = (0..3).map(|_| Arc::new(Channel::new(4))).collect();
        let output: Arc<Channel<i32>> = Arc::new(Channel::new(16));

        for (i, input) in inputs.iter().enumerate() {
            input.send(i as i32, None).unwrap();
            input.send(i as i32 + 10, None).unwrap();
        }
        for input in &inputs {
            input.close();
        }

        let fanin = FanIn::spawn(inputs, Arc::clone(&output));
        thread::sleep(Duration::from_millis(150));
        fanin.join();

        assert_eq!(output.len(), 6);
    }
}
