// Copyright (c) 2026 the concur-bridge authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Load balancer: forwards submissions to one of `M` worker pools chosen
//! by a configurable strategy.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;

use concur_types::ConcurResult;

use crate::pool::WorkerPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalancerStrategy {
    RoundRobin,
    LeastBusy,
    Random,
}

/// Holds references to `M` pools and dispatches `submit` calls to one of
/// them per `strategy`. Does not own the pools themselves — composites
/// only own channels/pools they create directly, and these are supplied
/// by the caller.
pub struct LoadBalancer<'a> {
    pools: Vec<&'a WorkerPool>,
    strategy: BalancerStrategy,
    next: AtomicUsize,
}

impl<'a> LoadBalancer<'a> {
    pub fn new(pools: Vec<&'a WorkerPool>, strategy: BalancerStrategy) -> Self {
        assert!(!pools.is_empty(), "load balancer requires at least one pool");
        Self {
            pools,
            strategy,
            next: AtomicUsize::new(0),
        }
    }

    fn choose(&self) -> usize {
        match self.strategy {
            BalancerStrategy::RoundRobin => {
                self.next.fetch_add(1, Ordering::Relaxed) % self.pools.len()
            }
            BalancerStrategy::LeastBusy => {
                let mut best_index = 0;
                let mut best_len = self.pools[0].queue_len();
                for (index, pool) in self.pools.iter().enumerate().skip(1) {
                    let len = pool.queue_len();
                    if len < best_len {
                        best_len = len;
                        best_index = index;
                    }
                }
                best_index
            }
            BalancerStrategy::Random => rand::thread_rng().gen_range(0..self.pools.len()),
        }
    }

    pub fn submit<F>(&self, func: F) -> ConcurResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let index = self.choose();
        self.pools[index].submit(func)
    }

    pub fn num_pools(&self) -> usize {
        self.pools.len()
    }
}
