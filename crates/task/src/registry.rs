// Copyright (c) 2026 the concur-bridge authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use concur_registry::{ThreadRegistrationGuard, ThreadRegistry};
use concur_types::{ConcurError, ConcurResult, ErrorCode, IdGenerator, TaskId};

use crate::handle::{TaskHandle, TaskState};

/// Type-erased view over a `TaskHandle<T>` for any `T`, so the registry can
/// hold tasks of differing result types in one map keyed by id — the
/// concurrent-map counterpart to the teacher's intrusive `ChildThread` list,
/// per the redesign note on `void*` payloads.
trait TaskEntry: Send + Sync {
    fn id(&self) -> TaskId;
    fn state(&self) -> TaskState;
    fn is_complete(&self) -> bool;
    fn is_detached(&self) -> bool;
    fn cancel(&self) -> bool;
    fn mark_detached(&self);
    fn timed_out_count(&self) -> u64;
}

impl<T: Send + Clone + 'static> TaskEntry for TaskHandle<T> {
    fn id(&self) -> TaskId {
        TaskHandle::id(self)
    }
    fn state(&self) -> TaskState {
        TaskHandle::state(self)
    }
    fn is_complete(&self) -> bool {
        TaskHandle::is_complete(self)
    }
    fn is_detached(&self) -> bool {
        TaskHandle::is_detached(self)
    }
    fn cancel(&self) -> bool {
        TaskHandle::cancel(self)
    }
    fn mark_detached(&self) {
        TaskHandle::mark_detached(self)
    }
    fn timed_out_count(&self) -> u64 {
        TaskHandle::timed_out_count(self)
    }
}

/// Per-spawn knobs. `name` is forwarded to the underlying OS thread for
/// diagnostics; `detached` only affects introspection (dropping a
/// [`std::thread::JoinHandle`] already lets the thread run free, so nothing
/// further is needed structurally); `awaitable` decides whether the handle
/// returned supports the single-use `await_timeout`.
#[derive(Debug, Clone, Default)]
pub struct TaskOptions {
    pub name: Option<String>,
    pub detached: bool,
    pub awaitable: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStats {
    pub spawned: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub timed_out: u64,
    pub active: u64,
}

#[derive(Default)]
struct TaskCounters {
    spawned: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    // Folded in from a handle's own counter when its entry is freed, so a
    // task's timeout history survives `free`/`free_all` the same way
    // `completed`/`failed`/`cancelled` do.
    timed_out: AtomicU64,
}

/// Owns every live task's type-erased entry and enforces the configured
/// task budget. Worker threads register with `thread_registry` for the
/// lifetime of their body, matching the spec's worker entry-point lifecycle
/// (register thread, run, store result, unregister).
pub struct TaskRegistry {
    ids: IdGenerator,
    max_tasks: usize,
    entries: Mutex<HashMap<TaskId, Arc<dyn TaskEntry>>>,
    thread_registry: Arc<ThreadRegistry>,
    counters: TaskCounters,
}

impl TaskRegistry {
    pub fn new(max_tasks: usize, thread_registry: Arc<ThreadRegistry>) -> Arc<Self> {
        Arc::new(Self {
            ids: IdGenerator::new(),
            max_tasks,
            entries: Mutex::new(HashMap::new()),
            thread_registry,
            counters: TaskCounters::default(),
        })
    }

    pub fn with_default_registry(max_tasks: usize) -> Arc<Self> {
        Self::new(max_tasks, Arc::new(ThreadRegistry::with_default_sink()))
    }

    /// Spawns `func` on a new OS thread and returns a handle for it,
    /// rejecting the spawn with [`ErrorCode::TaskSpawnFailed`] once
    /// `max_tasks` tasks are simultaneously not-yet-complete. A completed
    /// task frees its budget slot immediately; [`Self::free`] only affects
    /// introspection (`len`, `ids`), not the budget.
    pub fn spawn<T, F>(
        self: &Arc<Self>,
        func: F,
        options: TaskOptions,
    ) -> ConcurResult<Arc<TaskHandle<T>>>
    where
        T: Send + Clone + 'static,
        F: FnOnce() -> ConcurResult<T> + Send + 'static,
    {
        let id;
        let handle;
        {
            let mut entries = self.entries.lock().unwrap();
            let active = entries.values().filter(|e| !e.is_complete()).count();
            if active >= self.max_tasks {
                return Err(ErrorCode::TaskSpawnFailed.into());
            }
            id = TaskId(self.ids.next());
            handle = Arc::new(TaskHandle::<T>::new(id, options.awaitable));
            entries.insert(id, handle.clone() as Arc<dyn TaskEntry>);
        };
        self.counters.spawned.fetch_add(1, Ordering::Relaxed);

        if options.detached {
            handle.mark_detached();
        }

        let worker_handle = handle.clone();
        let thread_registry = self.thread_registry.clone();
        let registry = self.clone();
        let mut builder = thread::Builder::new();
        if let Some(name) = options.name.clone() {
            builder = builder.name(name);
        }

        let spawn_result = builder.spawn(move || {
            let (_guard, _descriptor) = ThreadRegistrationGuard::enter(&thread_registry);
            worker_handle.mark_running();
            let outcome = match panic::catch_unwind(AssertUnwindSafe(func)) {
                Ok(result) => result,
                Err(payload) => Err(panic_to_error(payload)),
            };
            let failed = outcome.is_err();
            // `complete` is a no-op if the handle was already cancelled
            // while this worker was still running — only count the
            // outcome when it was actually the one stored, so a
            // spawned-then-cancelled task isn't tallied twice.
            if worker_handle.complete(outcome) {
                if failed {
                    registry.counters.failed.fetch_add(1, Ordering::Relaxed);
                } else {
                    registry.counters.completed.fetch_add(1, Ordering::Relaxed);
                }
            }
            // _guard's drop unregisters the thread even if something above
            // this point panicked outside the `catch_unwind` span.
        });

        if spawn_result.is_err() {
            self.entries.lock().unwrap().remove(&id);
            log::warn!("failed to spawn OS thread for {id}");
            return Err(ErrorCode::TaskSpawnFailed.into());
        }
        Ok(handle)
    }

    /// As [`Self::spawn`], with `awaitable` forced on so the returned
    /// handle supports `await_timeout`.
    pub fn spawn_with_handle<T, F>(
        self: &Arc<Self>,
        func: F,
        mut options: TaskOptions,
    ) -> ConcurResult<Arc<TaskHandle<T>>>
    where
        T: Send + Clone + 'static,
        F: FnOnce() -> ConcurResult<T> + Send + 'static,
    {
        options.awaitable = true;
        self.spawn(func, options)
    }

    /// Cancels a still-running task by id. Returns `Ok(false)` for an
    /// already-complete task and [`ErrorCode::TaskNotFound`] for an unknown
    /// or already-freed id.
    pub fn cancel(&self, id: TaskId) -> ConcurResult<bool> {
        let entries = self.entries.lock().unwrap();
        let entry = entries.get(&id).ok_or(ErrorCode::TaskNotFound)?;
        let cancelled = entry.cancel();
        if cancelled {
            self.counters.cancelled.fetch_add(1, Ordering::Relaxed);
            log::debug!("task {id} cancelled");
        }
        Ok(cancelled)
    }

    pub fn detach(&self, id: TaskId) -> ConcurResult<()> {
        let entries = self.entries.lock().unwrap();
        let entry = entries.get(&id).ok_or(ErrorCode::TaskNotFound)?;
        entry.mark_detached();
        Ok(())
    }

    pub fn is_complete(&self, id: TaskId) -> ConcurResult<bool> {
        let entries = self.entries.lock().unwrap();
        let entry = entries.get(&id).ok_or(ErrorCode::TaskNotFound)?;
        Ok(entry.is_complete())
    }

    pub fn state_of(&self, id: TaskId) -> ConcurResult<TaskState> {
        let entries = self.entries.lock().unwrap();
        let entry = entries.get(&id).ok_or(ErrorCode::TaskNotFound)?;
        Ok(entry.state())
    }

    /// Ids of every task still tracked (spawned but not yet freed),
    /// regardless of completion state.
    pub fn ids(&self) -> Vec<TaskId> {
        self.entries.lock().unwrap().values().map(|e| e.id()).collect()
    }

    /// Releases a task's slot against the `max_tasks` budget. Safe to call
    /// on a running task (it keeps executing and writing into its handle;
    /// the registry simply forgets about it), matching the spec's
    /// "free does not imply cancel" scenario. Folds the handle's
    /// accumulated timeout count into the registry's sticky counter so it
    /// survives past the entry's removal.
    pub fn free(&self, id: TaskId) -> ConcurResult<()> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.remove(&id).ok_or(ErrorCode::TaskNotFound)?;
        self.counters
            .timed_out
            .fetch_add(entry.timed_out_count(), Ordering::Relaxed);
        Ok(())
    }

    /// Frees every remaining tracked task, for bridge cleanup. Running
    /// tasks keep executing and writing into their (now untracked)
    /// handle; this only releases the registry's references, the same
    /// as calling [`Self::free`] on each id.
    pub fn free_all(&self) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let count = entries.len();
        for (_, entry) in entries.drain() {
            self.counters
                .timed_out
                .fetch_add(entry.timed_out_count(), Ordering::Relaxed);
        }
        count
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_tasks(&self) -> usize {
        self.max_tasks
    }

    /// `timed_out` sums the sticky counter (folded in from already-freed
    /// handles) with the live counts on handles still tracked, so a
    /// still-running task's repeated timeouts show up before it's ever
    /// freed.
    pub fn stats(&self) -> TaskStats {
        let entries = self.entries.lock().unwrap();
        let live_timed_out: u64 = entries.values().map(|e| e.timed_out_count()).sum();
        TaskStats {
            spawned: self.counters.spawned.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            cancelled: self.counters.cancelled.load(Ordering::Relaxed),
            timed_out: self.counters.timed_out.load(Ordering::Relaxed) + live_timed_out,
            active: entries.len() as u64,
        }
    }
}

fn panic_to_error(payload: Box<dyn Any + Send>) -> ConcurError {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    };
    ConcurError::with_context(ErrorCode::WorkerFailed, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn spawn_runs_and_get_result_observes_the_value() {
        let registry = TaskRegistry::with_default_registry(4);
        let handle = registry.spawn(|| Ok(2 + 2), TaskOptions::default()).unwrap();
        assert_eq!(handle.get_result().unwrap(), 4);
        assert_eq!(registry.stats().completed, 1);
    }

    #[test]
    fn a_panicking_task_completes_as_failed() {
        let registry = TaskRegistry::with_default_registry(4);
        let handle: Arc<TaskHandle<i32>> =
            registry.spawn(|| panic!("boom"), TaskOptions::default()).unwrap();
        let err = handle.get_result().unwrap_err();
        assert_eq!(err.code, ErrorCode::WorkerFailed);
        assert_eq!(registry.stats().failed, 1);
    }

    #[test]
    fn max_tasks_budget_counts_only_incomplete_tasks() {
        let registry = TaskRegistry::with_default_registry(1);
        let first = registry.spawn(
            || {
                std::thread::sleep(Duration::from_millis(150));
                Ok(())
            },
            TaskOptions::default(),
        ).unwrap();
        let second = registry.spawn(|| Ok(()), TaskOptions::default());
        assert!(matches!(second, Err(ref e) if e.code == ErrorCode::TaskSpawnFailed));

        first.get_result().unwrap();
        // completion frees the budget slot without requiring `free`.
        assert!(registry.spawn(|| Ok(()), TaskOptions::default()).is_ok());
        assert_eq!(registry.len(), 2);
        registry.free(first.id()).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn cancel_by_id_reaches_the_underlying_handle() {
        let registry = TaskRegistry::with_default_registry(4);
        let handle: Arc<TaskHandle<()>> = registry.spawn(
            || {
                std::thread::sleep(Duration::from_millis(200));
                Ok(())
            },
            TaskOptions::default(),
        ).unwrap();
        let id = handle.id();
        assert!(registry.cancel(id).unwrap());
        assert_eq!(registry.state_of(id).unwrap(), TaskState::Cancelled);
        assert_eq!(registry.stats().cancelled, 1);
    }

    #[test]
    fn unknown_id_is_task_not_found() {
        let registry = TaskRegistry::with_default_registry(4);
        let err = registry.cancel(TaskId(999)).unwrap_err();
        assert_eq!(err.code, ErrorCode::TaskNotFound);
    }

    #[test]
    fn cancelling_a_task_that_later_finishes_is_not_double_counted() {
        let registry = TaskRegistry::with_default_registry(4);
        let handle: Arc<TaskHandle<()>> = registry.spawn(
            || {
                std::thread::sleep(Duration::from_millis(100));
                Ok(())
            },
            TaskOptions::default(),
        ).unwrap();
        let id = handle.id();
        assert!(registry.cancel(id).unwrap());
        // let the worker actually run to completion past the cancel.
        std::thread::sleep(Duration::from_millis(200));
        let stats = registry.stats();
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.failed, 0);
        assert!(stats.completed + stats.failed + stats.cancelled + stats.timed_out <= stats.spawned);
    }
}
