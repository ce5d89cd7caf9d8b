// Copyright (c) 2026 the concur-bridge authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use concur_sync::condvar::CountingCondvar;
use concur_types::{ConcurError, ConcurResult, ErrorCode, TaskId};

/// Mirrors the lifecycle a spawned task moves through. Kept separate from
/// the stored [`TaskOutcome`] so introspection (`state()`) doesn't need to
/// take the completion lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    Created = 0,
    Running = 1,
    Completed = 2,
    Failed = 3,
    Cancelled = 4,
}

impl TaskState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => TaskState::Created,
            1 => TaskState::Running,
            2 => TaskState::Completed,
            3 => TaskState::Failed,
            _ => TaskState::Cancelled,
        }
    }
}

/// What a finished task left behind. `T` must be [`Clone`] because
/// `get_result`/`wait_timeout` are repeatable: once a handle completes, any
/// number of callers may read the same outcome.
enum TaskOutcome<T> {
    Completed(T),
    Failed(ConcurError),
    Cancelled,
}

impl<T: Clone> TaskOutcome<T> {
    fn to_result(&self) -> ConcurResult<T> {
        match self {
            TaskOutcome::Completed(value) => Ok(value.clone()),
            TaskOutcome::Failed(err) => Err(err.clone()),
            TaskOutcome::Cancelled => {
                Err(ConcurError::with_context(ErrorCode::InvalidHandle, "task was cancelled"))
            }
        }
    }
}

struct Gate<T> {
    outcome: Option<TaskOutcome<T>>,
    completed_at: Option<Instant>,
}

/// One spawned task's shared state: the [`TaskId`] it was assigned, a
/// lifecycle state for cheap introspection, and a completion gate (a plain
/// mutex/condvar pair standing in for a future/promise) that callers block
/// on from `get_result`/`wait_timeout`.
///
/// `spawn_with_handle` additionally marks a handle "awaitable": exactly one
/// `await_timeout` call on it may ever succeed, enforced by the `awaited`
/// flag below, independent of how many times `get_result` is called.
pub struct TaskHandle<T> {
    id: TaskId,
    state: AtomicU8,
    created_at: Instant,
    detached: AtomicBool,
    awaitable: bool,
    awaited: AtomicBool,
    gate: Mutex<Gate<T>>,
    completed: CountingCondvar,
    timed_out: AtomicU64,
}

impl<T: Clone> TaskHandle<T> {
    pub(crate) fn new(id: TaskId, awaitable: bool) -> Self {
        Self {
            id,
            state: AtomicU8::new(TaskState::Created as u8),
            created_at: Instant::now(),
            detached: AtomicBool::new(false),
            awaitable,
            awaited: AtomicBool::new(false),
            gate: Mutex::new(Gate {
                outcome: None,
                completed_at: None,
            }),
            completed: CountingCondvar::new(),
            timed_out: AtomicU64::new(0),
        }
    }

    /// Number of times a wait on this handle (`wait_timeout`/
    /// `await_timeout`) has observed its deadline elapse before
    /// completion. An event counter, not a one-shot flag: a still-running
    /// task polled repeatedly with short timeouts accrues one per poll.
    pub fn timed_out_count(&self) -> u64 {
        self.timed_out.load(Ordering::Relaxed)
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    pub(crate) fn mark_detached(&self) {
        self.detached.store(true, Ordering::Release);
    }

    pub(crate) fn mark_running(&self) {
        self.state.store(TaskState::Running as u8, Ordering::Release);
    }

    pub fn is_complete(&self) -> bool {
        matches!(
            self.state(),
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }

    /// Stores the worker's outcome, unless the handle was already
    /// cancelled while the worker was still running — cancellation is
    /// terminal, so a late `complete()` from a worker that kept executing
    /// past a `cancel()` call must not overwrite it. Returns whether the
    /// outcome was actually stored.
    pub(crate) fn complete(&self, result: Result<T, ConcurError>) -> bool {
        let mut gate = self.gate.lock().unwrap();
        if gate.outcome.is_some() {
            return false;
        }
        let new_state = match &result {
            Ok(_) => TaskState::Completed,
            Err(_) => TaskState::Failed,
        };
        let outcome = match result {
            Ok(value) => TaskOutcome::Completed(value),
            Err(err) => TaskOutcome::Failed(err),
        };
        gate.outcome = Some(outcome);
        gate.completed_at = Some(Instant::now());
        drop(gate);
        self.state.store(new_state as u8, Ordering::Release);
        self.completed.broadcast();
        true
    }

    /// Atomically transitions a not-yet-complete handle to `Cancelled` and
    /// wakes every waiter. A no-op returning `false` once the task has
    /// already completed, matching the spec's "cancel after completion has
    /// no effect" scenario.
    pub fn cancel(&self) -> bool {
        let mut gate = self.gate.lock().unwrap();
        if gate.outcome.is_some() {
            return false;
        }
        gate.outcome = Some(TaskOutcome::Cancelled);
        gate.completed_at = Some(Instant::now());
        drop(gate);
        self.state.store(TaskState::Cancelled as u8, Ordering::Release);
        self.completed.broadcast();
        true
    }

    /// Blocks until the task completes (or `timeout` elapses) and returns
    /// its outcome. Repeatable: calling this again after completion returns
    /// the same value every time.
    pub fn wait_timeout(&self, timeout: Option<Duration>) -> ConcurResult<T> {
        let mut gate = self.gate.lock().unwrap();
        match timeout {
            None => {
                while gate.outcome.is_none() {
                    gate = self.completed.wait(gate);
                }
            }
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                while gate.outcome.is_none() {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        self.timed_out.fetch_add(1, Ordering::Relaxed);
                        return Err(ErrorCode::TaskTimeout.into());
                    }
                    let (next_guard, signalled) = self.completed.wait_timeout(gate, remaining);
                    gate = next_guard;
                    if !signalled && gate.outcome.is_none() {
                        self.timed_out.fetch_add(1, Ordering::Relaxed);
                        return Err(ErrorCode::TaskTimeout.into());
                    }
                }
            }
        }
        gate.outcome.as_ref().unwrap().to_result()
    }

    /// Blocks forever for the result; shorthand for `wait_timeout(None)`.
    pub fn get_result(&self) -> ConcurResult<T> {
        self.wait_timeout(None)
    }

    /// The awaitable extension: legal exactly once per handle. A call that
    /// times out does not consume the single use — the handle has not yet
    /// been observed complete, so a later call may still succeed. Once a
    /// call actually observes completion (success, failure or
    /// cancellation), every subsequent call returns
    /// [`ErrorCode::InvalidHandle`].
    pub fn await_timeout(&self, timeout: Option<Duration>) -> ConcurResult<T> {
        if !self.awaitable {
            return Err(ErrorCode::InvalidHandle.into());
        }
        if self.awaited.load(Ordering::Acquire) {
            return Err(ErrorCode::InvalidHandle.into());
        }
        let result = self.wait_timeout(timeout);
        if !matches!(&result, Err(err) if err.code == ErrorCode::TaskTimeout) {
            if self.awaited.swap(true, Ordering::AcqRel) {
                return Err(ErrorCode::InvalidHandle.into());
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completes_and_repeats_the_same_result() {
        let handle: TaskHandle<i32> = TaskHandle::new(TaskId(1), false);
        handle.mark_running();
        handle.complete(Ok(42));
        assert_eq!(handle.get_result().unwrap(), 42);
        assert_eq!(handle.wait_timeout(Some(Duration::from_millis(1))).unwrap(), 42);
        assert_eq!(handle.state(), TaskState::Completed);
    }

    #[test]
    fn wait_timeout_expires_while_still_running() {
        let handle: TaskHandle<i32> = TaskHandle::new(TaskId(2), false);
        handle.mark_running();
        let err = handle.wait_timeout(Some(Duration::from_millis(10))).unwrap_err();
        assert_eq!(err.code, ErrorCode::TaskTimeout);
    }

    #[test]
    fn cancel_before_completion_is_reflected_in_get_result() {
        let handle: TaskHandle<i32> = TaskHandle::new(TaskId(3), false);
        assert!(handle.cancel());
        assert!(!handle.cancel());
        assert_eq!(handle.state(), TaskState::Cancelled);
        let err = handle.get_result().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidHandle);
    }

    #[test]
    fn cancel_after_completion_is_a_no_op() {
        let handle: TaskHandle<i32> = TaskHandle::new(TaskId(4), false);
        handle.complete(Ok(7));
        assert!(!handle.cancel());
        assert_eq!(handle.get_result().unwrap(), 7);
    }

    #[test]
    fn a_late_complete_after_cancel_does_not_overwrite_the_cancellation() {
        let handle: TaskHandle<i32> = TaskHandle::new(TaskId(8), false);
        assert!(handle.cancel());
        // the worker kept running past the cancel and eventually finishes;
        // its result must be discarded, not re-open the terminal state.
        assert!(!handle.complete(Ok(99)));
        assert_eq!(handle.state(), TaskState::Cancelled);
        let err = handle.get_result().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidHandle);
    }

    #[test]
    fn wait_timeout_counts_each_elapsed_deadline() {
        let handle: TaskHandle<i32> = TaskHandle::new(TaskId(9), false);
        handle.mark_running();
        assert!(handle.wait_timeout(Some(Duration::from_millis(5))).is_err());
        assert!(handle.wait_timeout(Some(Duration::from_millis(5))).is_err());
        assert_eq!(handle.timed_out_count(), 2);
        handle.complete(Ok(1));
        assert_eq!(handle.get_result().unwrap(), 1);
        assert_eq!(handle.timed_out_count(), 2);
    }

    #[test]
    fn await_timeout_is_legal_exactly_once() {
        let handle: TaskHandle<i32> = TaskHandle::new(TaskId(5), true);
        handle.complete(Ok(9));
        assert_eq!(handle.await_timeout(None).unwrap(), 9);
        let err = handle.await_timeout(None).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidHandle);
    }

    #[test]
    fn await_timeout_does_not_consume_its_single_use_on_a_timeout() {
        let handle: TaskHandle<i32> = TaskHandle::new(TaskId(7), true);
        handle.mark_running();
        let first = handle.await_timeout(Some(Duration::from_millis(10)));
        assert_eq!(first.unwrap_err().code, ErrorCode::TaskTimeout);

        handle.complete(Ok(7));
        assert_eq!(handle.await_timeout(Some(Duration::from_millis(500))).unwrap(), 7);

        let third = handle.await_timeout(Some(Duration::from_millis(0)));
        assert_eq!(third.unwrap_err().code, ErrorCode::InvalidHandle);
    }

    #[test]
    fn await_timeout_on_a_non_awaitable_handle_is_rejected() {
        let handle: TaskHandle<i32> = TaskHandle::new(TaskId(6), false);
        handle.complete(Ok(1));
        let err = handle.await_timeout(None).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidHandle);
    }
}
