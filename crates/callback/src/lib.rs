// Copyright (c) 2026 the concur-bridge authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! A bounded, priority-aware callback queue for cross-boundary delivery.
//!
//! A callback entry generalizes the teacher's `(function pointer, data
//! pointer, size, context pointer)` quadruple (that shape only survives
//! at the byte-oriented FFI seam, see `concur_types::ffi`) into a single
//! boxed closure, matching the redesign note on `void*` payloads.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use concur_sync::condvar::CountingCondvar;
use concur_types::{ConcurResult, ErrorCode};

/// A single deferred invocation. `priority` is carried for introspection
/// and `dump()`; ordering beyond `insert_at_front` entries is advisory,
/// per the spec's open question on priority-callback ordering.
pub struct CallbackEntry {
    callback: Box<dyn FnOnce() -> ConcurResult<()> + Send>,
    pub priority: i32,
    pub created_at: Instant,
}

/// Debug/introspection view of a queued entry, returned by `dump()`.
#[derive(Debug, Clone, Copy)]
pub struct CallbackDebugInfo {
    pub priority: i32,
    pub age_micros: u128,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallbackQueueStats {
    pub enqueued: u64,
    pub dequeued: u64,
    pub dropped: u64,
    pub size: usize,
}

pub struct CallbackQueue {
    max_callbacks: usize,
    entries: Mutex<VecDeque<CallbackEntry>>,
    // serializes "process a batch" calls so at most one drainer runs at
    // a time, independent of the entries lock (which individual
    // enqueue/dequeue operations also contend for).
    process_lock: Mutex<()>,
    wake: CountingCondvar,
    size: AtomicUsize,
    shutdown: AtomicBool,
    enqueued: AtomicI64,
    dequeued: AtomicI64,
    dropped: AtomicI64,
}

impl CallbackQueue {
    pub fn new(max_callbacks: usize) -> Self {
        Self {
            max_callbacks,
            entries: Mutex::new(VecDeque::new()),
            process_lock: Mutex::new(()),
            wake: CountingCondvar::new(),
            size: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
            enqueued: AtomicI64::new(0),
            dequeued: AtomicI64::new(0),
            dropped: AtomicI64::new(0),
        }
    }

    /// Appends to the tail. Fails with [`ErrorCode::CallbackQueueFull`]
    /// when `size == max_callbacks`, or [`ErrorCode::InitFailed`] once
    /// the queue has been shut down.
    pub fn enqueue(
        &self,
        callback: impl FnOnce() -> ConcurResult<()> + Send + 'static,
        priority: i32,
    ) -> ConcurResult<()> {
        self.enqueue_priority(callback, priority, false)
    }

    /// As [`Self::enqueue`], but `insert_at_front` places the entry at
    /// the head, ahead of everything already queued. Front-inserted
    /// entries preserve FIFO order among themselves.
    pub fn enqueue_priority(
        &self,
        callback: impl FnOnce() -> ConcurResult<()> + Send + 'static,
        priority: i32,
        insert_at_front: bool,
    ) -> ConcurResult<()> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(ErrorCode::InitFailed.into());
        }
        let mut entries = self.entries.lock().unwrap();
        if entries.len() >= self.max_callbacks {
            return Err(ErrorCode::CallbackQueueFull.into());
        }
        let entry = CallbackEntry {
            callback: Box::new(callback),
            priority,
            created_at: Instant::now(),
        };
        if insert_at_front {
            entries.push_front(entry);
        } else {
            entries.push_back(entry);
        }
        self.size.fetch_add(1, Ordering::Release);
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        drop(entries);
        self.wake.signal();
        Ok(())
    }

    /// Pops up to `max` entries from the head and invokes each, serialized
    /// against any other concurrent `process` call so only one batch
    /// drains at a time. Entries are never executed under the queue
    /// mutex, only removal is. A callback that panics or returns an
    /// error is counted and logged; it does not abort the rest of the
    /// batch. Returns the number of entries actually invoked.
    pub fn process(&self, max: usize) -> usize {
        let _serialize = self.process_lock.lock().unwrap();
        let mut processed = 0;
        for _ in 0..max {
            let entry = {
                let mut entries = self.entries.lock().unwrap();
                entries.pop_front()
            };
            let Some(entry) = entry else {
                break;
            };
            self.size.fetch_sub(1, Ordering::Release);
            self.dequeued.fetch_add(1, Ordering::Relaxed);
            processed += 1;

            let result = panic::catch_unwind(AssertUnwindSafe(entry.callback));
            match result {
                Ok(Ok(())) => {}
                Ok(Err(err)) => log::warn!("callback returned an error: {err}"),
                Err(_) => log::warn!("callback panicked during queue processing"),
            }
        }
        processed
    }

    /// Drops every queued entry without invoking it, counting each as
    /// dropped. Used by `process` shutdown paths where work must be
    /// discarded rather than silently lost from the statistics.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let dropped = entries.len();
        entries.clear();
        self.size.fetch_sub(dropped, Ordering::Release);
        self.dropped.fetch_add(dropped as i64, Ordering::Relaxed);
        dropped
    }

    /// Rejects all further enqueues, then drains and drops whatever
    /// remains, counting it.
    pub fn shutdown(&self) -> usize {
        self.shutdown.store(true, Ordering::Release);
        self.clear()
    }

    pub fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn is_full(&self) -> bool {
        self.size() >= self.max_callbacks
    }

    pub fn dump(&self) -> Vec<CallbackDebugInfo> {
        let entries = self.entries.lock().unwrap();
        let now = Instant::now();
        entries
            .iter()
            .map(|entry| CallbackDebugInfo {
                priority: entry.priority,
                age_micros: now.duration_since(entry.created_at).as_micros(),
            })
            .collect()
    }

    pub fn stats(&self) -> CallbackQueueStats {
        CallbackQueueStats {
            enqueued: self.enqueued.load(Ordering::Relaxed).max(0) as u64,
            dequeued: self.dequeued.load(Ordering::Relaxed).max(0) as u64,
            dropped: self.dropped.load(Ordering::Relaxed).max(0) as u64,
            size: self.size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};

    #[test]
    fn enqueue_then_process_invokes_exactly_once() {
        let queue = CallbackQueue::new(8);
        let invoked = Arc::new(StdMutex::new(0));
        let invoked2 = Arc::clone(&invoked);
        queue
            .enqueue(
                move || {
                    *invoked2.lock().unwrap() += 1;
                    Ok(())
                },
                0,
            )
            .unwrap();

        let processed = queue.process(1);
        assert_eq!(processed, 1);
        assert_eq!(*invoked.lock().unwrap(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn priority_front_insert_runs_before_existing_entries() {
        let queue = CallbackQueue::new(8);
        let order = Arc::new(StdMutex::new(Vec::new()));

        for (label, priority) in [("a", 1), ("b", 5), ("c", 9)] {
            let order = Arc::clone(&order);
            queue
                .enqueue(
                    move || {
                        order.lock().unwrap().push(label);
                        Ok(())
                    },
                    priority,
                )
                .unwrap();
        }
        {
            let order = Arc::clone(&order);
            queue
                .enqueue_priority(
                    move || {
                        order.lock().unwrap().push("d");
                        Ok(())
                    },
                    100,
                    true,
                )
                .unwrap();
        }

        queue.process(4);
        assert_eq!(*order.lock().unwrap(), vec!["d", "a", "b", "c"]);
    }

    #[test]
    fn queue_full_is_rejected() {
        let queue = CallbackQueue::new(1);
        queue.enqueue(|| Ok(()), 0).unwrap();
        let result = queue.enqueue(|| Ok(()), 0);
        assert!(matches!(result, Err(ref e) if e.code == ErrorCode::CallbackQueueFull));
    }

    #[test]
    fn shutdown_rejects_and_drains_counting_dropped() {
        let queue = CallbackQueue::new(8);
        queue.enqueue(|| Ok(()), 0).unwrap();
        let dropped = queue.shutdown();
        assert_eq!(dropped, 1);
        assert!(matches!(
            queue.enqueue(|| Ok(()), 0),
            Err(ref e) if e.code == ErrorCode::InitFailed
        ));
    }

    #[test]
    fn a_panicking_callback_does_not_abort_the_batch() {
        let queue = CallbackQueue::new(8);
        let ran_second = Arc::new(StdMutex::new(false));
        queue.enqueue(|| panic!("boom"), 0).unwrap();
        let ran_second2 = Arc::clone(&ran_second);
        queue
            .enqueue(
                move || {
                    *ran_second2.lock().unwrap() = true;
                    Ok(())
                },
                0,
            )
            .unwrap();

        let processed = queue.process(2);
        assert_eq!(processed, 2);
        assert!(*ran_second.lock().unwrap());
    }
}
