// Copyright (c) 2026 the concur-bridge authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Worker pools: a fixed set of threads consuming a shared task-submission
//! queue.
//!
//! Grounded on the teacher's thread-per-task shape
//! (`crates/runtime/src/multithread_program.rs`) generalized the way
//! `examples/other_examples/2a58eb16_lars-frogner-Impact__..._pool.rs.rs`
//! structures a fixed worker count around one shared channel: a
//! `ThreadPoolCommunicator` there becomes the pool's task-queue `Channel`
//! here, and its `Worker { handle: JoinHandle<()> }` becomes ours below.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use concur_channel::Channel;
use concur_registry::{ThreadRegistrationGuard, ThreadRegistry};
use concur_types::{ConcurResult, ErrorCode};

/// How long a worker blocks on an empty queue before re-checking the
/// shutdown flag. Keeps shutdown latency bounded without busy-spinning.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

type Submission = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
}

struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// A fixed-size set of worker threads draining a shared, bounded task
/// queue. Owns the queue channel and its worker threads; callers own
/// nothing beyond the handle returned by [`WorkerPool::new`].
pub struct WorkerPool {
    name: Option<String>,
    queue: Arc<Channel<Submission>>,
    shutdown: Arc<AtomicBool>,
    counters: Arc<Counters>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `num_workers` threads, each registering with
    /// `thread_registry` for the lifetime of its loop and consuming from
    /// a queue of capacity `queue_capacity`.
    pub fn new(
        num_workers: usize,
        queue_capacity: usize,
        name: Option<String>,
        thread_registry: Arc<ThreadRegistry>,
    ) -> Self {
        let queue = Arc::new(Channel::new(queue_capacity));
        let shutdown = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(Counters {
            submitted: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        });

        let workers = (0..num_workers)
            .map(|worker_index| {
                let queue = Arc::clone(&queue);
                let shutdown = Arc::clone(&shutdown);
                let counters = Arc::clone(&counters);
                let thread_registry = Arc::clone(&thread_registry);
                let pool_name = name.clone();
                let mut builder = thread::Builder::new();
                if let Some(pool_name) = &pool_name {
                    builder = builder.name(format!("{pool_name}-worker-{worker_index}"));
                }
                builder
                    .spawn(move || {
                        let (_guard, _descriptor) =
                            ThreadRegistrationGuard::enter(&thread_registry);
                        loop {
                            match queue.recv(Some(POLL_INTERVAL)) {
                                Ok(task) => {
                                    let outcome = std::panic::catch_unwind(
                                        std::panic::AssertUnwindSafe(task),
                                    );
                                    if outcome.is_ok() {
                                        counters.completed.fetch_add(1, Ordering::Relaxed);
                                    } else {
                                        counters.failed.fetch_add(1, Ordering::Relaxed);
                                        log::warn!("worker pool task panicked");
                                    }
                                }
                                Err(_) => {
                                    if shutdown.load(Ordering::Acquire) && queue.is_empty() {
                                        break;
                                    }
                                }
                            }
                        }
                        // _guard's drop unregisters the thread on the way out.
                    })
                    .expect("failed to spawn worker pool thread")
            })
            .collect();

        Self {
            name,
            queue,
            shutdown,
            counters,
            workers,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Enqueues `func` for execution by whichever worker dequeues it
    /// next. Fails with [`ErrorCode::PoolFull`] when the queue is at
    /// capacity.
    pub fn submit<F>(&self, func: F) -> ConcurResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.queue
            .try_send(Box::new(func))
            .map_err(|_| ErrorCode::PoolFull.into())
            .map(|()| {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
            })
    }

    /// The number of submissions currently queued but not yet picked up
    /// by a worker. Used by the load balancer's least-busy strategy.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Publishes the shutdown flag and, if `wait_for_completion`, joins
    /// every worker thread. Workers drain whatever remains in the queue
    /// before observing shutdown.
    pub fn shutdown(&mut self, wait_for_completion: bool) {
        self.shutdown.store(true, Ordering::Release);
        self.queue.close();
        if wait_for_completion {
            for worker in self.workers.drain(..) {
                let _ = worker.join();
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.shutdown.load(Ordering::Acquire) {
            self.shutdown(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Instant;

    #[test]
    fn submitted_tasks_all_complete_within_queue_bound() {
        let mut pool = WorkerPool::new(
            2,
            2,
            Some("test".into()),
            Arc::new(ThreadRegistry::with_default_sink()),
        );
        let completed = Arc::new(AtomicUsize::new(0));
        let max_seen_queue = Arc::new(AtomicUsize::new(0));

        for _ in 0..4 {
            max_seen_queue.fetch_max(pool.queue_len(), Ordering::Relaxed);
            let completed = Arc::clone(&completed);
            loop {
                match pool.submit(move || {
                    thread::sleep(Duration::from_millis(100));
                }) {
                    Ok(()) => break,
                    Err(_) => thread::sleep(Duration::from_millis(5)),
                }
            }
            completed.fetch_add(0, Ordering::Relaxed); // keep clippy quiet about unused clone
        }

        let start = Instant::now();
        pool.shutdown(true);
        assert!(start.elapsed() < Duration::from_millis(500));
        assert_eq!(pool.stats().completed, 4);
        assert!(max_seen_queue.load(Ordering::Relaxed) <= 2);
    }

    #[test]
    fn a_panicking_task_counts_as_failed_without_stopping_the_pool() {
        let mut pool = WorkerPool::new(
            1,
            4,
            None,
            Arc::new(ThreadRegistry::with_default_sink()),
        );
        let ran = Arc::new(Mutex::new(false));
        pool.submit(|| panic!("boom")).unwrap();
        let ran2 = Arc::clone(&ran);
        pool.submit(move || {
            *ran2.lock().unwrap() = true;
        })
        .unwrap();

        thread::sleep(Duration::from_millis(100));
        pool.shutdown(true);
        assert!(*ran.lock().unwrap());
        assert_eq!(pool.stats().failed, 1);
        assert_eq!(pool.stats().completed, 1);
    }
}
