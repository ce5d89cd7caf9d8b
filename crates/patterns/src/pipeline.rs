// Copyright (c) 2026 the concur-bridge authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Multi-stage pipelines: `K` stages connected by `K-1` intermediate
//! channels, `in -> f1 -> c1 -> f2 -> ... -> c_{K-1} -> fK -> out`. The
//! pipeline owns the intermediate channels and the per-stage tasks; the
//! caller-supplied input and output channels are borrowed, not owned,
//! per the spec's composite ownership rule.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use concur_channel::Channel;
use concur_types::ErrorCode;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// An assembled pipeline: `num_stages` worker threads feeding the
/// caller's `output` channel from the caller's `input` channel through
/// `num_stages - 1` internally owned intermediate channels.
pub struct Pipeline {
    stages: Vec<JoinHandle<()>>,
    items_out: Arc<AtomicU64>,
}

impl Pipeline {
    /// `stages[i]` transforms an item flowing through intermediate stage
    /// `i`. Requires at least one stage.
    pub fn spawn<T, F>(
        input: Arc<Channel<T>>,
        output: Arc<Channel<T>>,
        stage_capacity: usize,
        stages: Vec<F>,
    ) -> Self
    where
        T: Send + 'static,
        F: Fn(T) -> T + Send + 'static,
    {
        assert!(!stages.is_empty(), "pipeline requires at least one stage");
        let num_stages = stages.len();
        let items_out = Arc::new(AtomicU64::new(0));

        let mut channels: Vec<Arc<Channel<T>>> = Vec::with_capacity(num_stages + 1);
        channels.push(input);
        for _ in 0..num_stages - 1 {
            channels.push(Arc::new(Channel::new(stage_capacity)));
        }
        channels.push(output);

        let mut handles = Vec::with_capacity(num_stages);
        for (index, stage) in stages.into_iter().enumerate() {
            let stage_in = Arc::clone(&channels[index]);
            let stage_out = Arc::clone(&channels[index + 1]);
            let is_last = index == num_stages - 1;
            let items_out = Arc::clone(&items_out);

            handles.push(thread::spawn(move || loop {
                match stage_in.recv(Some(POLL_INTERVAL)) {
                    Ok(item) => {
                        let transformed = stage(item);
                        if stage_out.send(transformed, None).is_err() {
                            break;
                        }
                        if is_last {
                            items_out.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    Err(err) if err.code == ErrorCode::ChannelClosed => {
                        stage_out.close();
                        break;
                    }
                    Err(_) => continue,
                }
            }));
        }

        Self {
            stages: handles,
            items_out,
        }
    }

    /// Items that have reached the pipeline's output channel so far.
    pub fn items_completed(&self) -> u64 {
        self.items_out.load(Ordering::Relaxed)
    }

    pub fn join(self) {
        for stage in self.stages {
            let _ = stage.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_flow_through_every_stage_in_order() {
        let input: Arc<Channel<i32>> = Arc::new(Channel::new(8));
        let output: Arc<Channel<i32>> = Arc::new(Channel::new(8));

        for i in 1..=3 {
            input.send(i, None).unwrap();
        }
        input.close();

        let pipeline = Pipeline::spawn(
            Arc::clone(&input),
            Arc::clone(&output),
            4,
            vec![
                (|x: i32| x + 1) as fn(i32) -> i32,
                (|x: i32| x * 2) as fn(i32) -> i32,
            ],
        );

        thread::sleep(Duration::from_millis(200));
        pipeline.join();

        let mut results = Vec::new();
        while let Ok(value) = output.try_recv() {
            results.push(value);
        }
        results.sort_unstable();
        assert_eq!(results, vec![4, 6, 8]);
    }
}
