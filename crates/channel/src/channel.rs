// Copyright (c) 2026 the concur-bridge authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use concur_sync::condvar::CountingCondvar;
use concur_types::{ConcurError, ConcurResult, ErrorCode};

/// A bounded, ring-buffered, multi-producer multi-consumer channel.
///
/// Capacity `0` is accepted at construction but `send` on it returns
/// [`ErrorCode::Unimplemented`] — see DESIGN.md for why true unbuffered
/// rendezvous is left an open question rather than guessed at.
pub struct Channel<T> {
    name: Option<String>,
    capacity: usize,
    buffer: Mutex<VecDeque<T>>,
    not_empty: CountingCondvar,
    not_full: CountingCondvar,
    is_closed: AtomicBool,
    len: AtomicUsize,
    sends: AtomicUsize,
    receives: AtomicUsize,
    blocked_ops: AtomicUsize,
}

/// A snapshot of a channel's send/receive/contention counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub sends: usize,
    pub receives: usize,
    pub blocked_ops: usize,
}

impl<T> Channel<T> {
    pub fn new(capacity: usize) -> Self {
        Self::named_capacity(None, capacity)
    }

    pub fn named(name: impl Into<String>, capacity: usize) -> Self {
        Self::named_capacity(Some(name.into()), capacity)
    }

    fn named_capacity(name: Option<String>, capacity: usize) -> Self {
        Self {
            name,
            capacity,
            buffer: Mutex::new(VecDeque::with_capacity(capacity)),
            not_empty: CountingCondvar::new(),
            not_full: CountingCondvar::new(),
            is_closed: AtomicBool::new(false),
            len: AtomicUsize::new(0),
            sends: AtomicUsize::new(0),
            receives: AtomicUsize::new(0),
            blocked_ops: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Sends `value`, blocking until there is room or `timeout` elapses.
    /// `timeout == None` blocks indefinitely.
    pub fn send(&self, value: T, timeout: Option<Duration>) -> ConcurResult<()> {
        if self.capacity == 0 {
            return Err(ErrorCode::Unimplemented.into());
        }
        let deadline = timeout.map(|d| Instant::now() + d);
        let mut buffer = self.buffer.lock().unwrap();
        loop {
            if self.is_closed.load(Ordering::Acquire) {
                return Err(ErrorCode::ChannelClosed.into());
            }
            if buffer.len() < self.capacity {
                break;
            }
            self.blocked_ops.fetch_add(1, Ordering::Relaxed);
            match deadline {
                None => {
                    buffer = self.not_full.wait(buffer);
                }
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(ErrorCode::TaskTimeout.into());
                    }
                    let (guard, signalled) = self.not_full.wait_timeout(buffer, remaining);
                    buffer = guard;
                    if !signalled && buffer.len() >= self.capacity {
                        return Err(ErrorCode::TaskTimeout.into());
                    }
                }
            }
        }
        buffer.push_back(value);
        self.len.fetch_add(1, Ordering::Release);
        self.sends.fetch_add(1, Ordering::Relaxed);
        drop(buffer);
        self.not_empty.signal();
        Ok(())
    }

    /// Receives a value, blocking until one is available or `timeout`
    /// elapses. `timeout == None` blocks indefinitely. Returns
    /// [`ErrorCode::ChannelClosed`] once the channel is closed and
    /// drained.
    pub fn recv(&self, timeout: Option<Duration>) -> ConcurResult<T> {
        let deadline = timeout.map(|d| Instant::now() + d);
        let mut buffer = self.buffer.lock().unwrap();
        loop {
            if let Some(value) = buffer.pop_front() {
                self.len.fetch_sub(1, Ordering::Release);
                self.receives.fetch_add(1, Ordering::Relaxed);
                drop(buffer);
                self.not_full.signal();
                return Ok(value);
            }
            if self.is_closed.load(Ordering::Acquire) {
                return Err(ErrorCode::ChannelClosed.into());
            }
            self.blocked_ops.fetch_add(1, Ordering::Relaxed);
            match deadline {
                None => {
                    buffer = self.not_empty.wait(buffer);
                }
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(ErrorCode::TaskTimeout.into());
                    }
                    let (guard, signalled) = self.not_empty.wait_timeout(buffer, remaining);
                    buffer = guard;
                    if !signalled && buffer.is_empty() && !self.is_closed.load(Ordering::Acquire) {
                        return Err(ErrorCode::TaskTimeout.into());
                    }
                }
            }
        }
    }

    /// Non-blocking send: fails with [`ErrorCode::WouldBlock`] instead of
    /// waiting, distinct from the timed [`Channel::send`]'s
    /// [`ErrorCode::TaskTimeout`] per the spec's open question on
    /// `try_send`/`try_recv` error codes. On failure `value` is handed
    /// back alongside the error rather than dropped, so a caller retrying
    /// the same send (e.g. a [`crate::select::SelectContext`] entry
    /// polling across passes) doesn't lose it.
    pub fn try_send(&self, value: T) -> Result<(), (T, ConcurError)> {
        if self.capacity == 0 {
            return Err((value, ErrorCode::Unimplemented.into()));
        }
        let mut buffer = self.buffer.lock().unwrap();
        if self.is_closed.load(Ordering::Acquire) {
            return Err((value, ErrorCode::ChannelClosed.into()));
        }
        if buffer.len() >= self.capacity {
            self.blocked_ops.fetch_add(1, Ordering::Relaxed);
            return Err((value, ErrorCode::WouldBlock.into()));
        }
        buffer.push_back(value);
        self.len.fetch_add(1, Ordering::Release);
        self.sends.fetch_add(1, Ordering::Relaxed);
        drop(buffer);
        self.not_empty.signal();
        Ok(())
    }

    /// Non-blocking receive: fails with [`ErrorCode::WouldBlock`] when
    /// empty-but-open, or [`ErrorCode::ChannelClosed`] when closed and
    /// drained.
    pub fn try_recv(&self) -> ConcurResult<T> {
        let mut buffer = self.buffer.lock().unwrap();
        if let Some(value) = buffer.pop_front() {
            self.len.fetch_sub(1, Ordering::Release);
            self.receives.fetch_add(1, Ordering::Relaxed);
            drop(buffer);
            self.not_full.signal();
            return Ok(value);
        }
        if self.is_closed.load(Ordering::Acquire) {
            return Err(ErrorCode::ChannelClosed.into());
        }
        self.blocked_ops.fetch_add(1, Ordering::Relaxed);
        Err(ErrorCode::WouldBlock.into())
    }

    /// Marks the channel closed and wakes every waiter so it can
    /// re-check its predicate. Idempotent; once closed, never reopens.
    pub fn close(&self) {
        self.is_closed.store(true, Ordering::Release);
        self.not_empty.broadcast();
        self.not_full.broadcast();
        log::debug!("channel {:?} closed", self.name);
    }

    pub fn is_closed(&self) -> bool {
        self.is_closed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.capacity > 0 && self.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            sends: self.sends.load(Ordering::Relaxed),
            receives: self.receives.load(Ordering::Relaxed),
            blocked_ops: self.blocked_ops.load(Ordering::Relaxed),
        }
    }

    /// `close()` plus releasing the buffer; in safe Rust this is simply
    /// consuming `self`, `Drop` does the rest.
    pub fn destroy(self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn ping_pong_capacity_one() {
        let c: Arc<Channel<i32>> = Arc::new(Channel::new(1));
        let c2 = Arc::clone(&c);
        let handle = thread::spawn(move || {
            c2.send(42, None).unwrap();
        });
        assert_eq!(c.recv(None).unwrap(), 42);
        handle.join().unwrap();
        c.close();
        assert!(matches!(
            c.recv(None),
            Err(ref e) if e.code == ErrorCode::ChannelClosed
        ));
    }

    #[test]
    fn send_recv_round_trip() {
        let c = Channel::new(4);
        c.send(1, None).unwrap();
        c.send(2, None).unwrap();
        assert_eq!(c.recv(None).unwrap(), 1);
        assert_eq!(c.recv(None).unwrap(), 2);
    }

    #[test]
    fn zero_capacity_send_is_unimplemented() {
        let c: Channel<i32> = Channel::new(0);
        assert!(matches!(
            c.send(1, None),
            Err(ref e) if e.code == ErrorCode::Unimplemented
        ));
    }

    #[test]
    fn try_send_would_block_on_full_channel() {
        let c = Channel::new(1);
        c.try_send(1).unwrap();
        assert!(matches!(
            c.try_send(2),
            Err((2, ref e)) if e.code == ErrorCode::WouldBlock
        ));
    }

    #[test]
    fn try_send_hands_the_value_back_on_failure() {
        let c = Channel::new(1);
        c.try_send("held").unwrap();
        let Err((returned, err)) = c.try_send("extra") else {
            panic!("expected the second try_send to fail");
        };
        assert_eq!(returned, "extra");
        assert_eq!(err.code, ErrorCode::WouldBlock);
    }

    #[test]
    fn try_recv_would_block_on_empty_open_channel() {
        let c: Channel<i32> = Channel::new(1);
        assert!(matches!(
            c.try_recv(),
            Err(ref e) if e.code == ErrorCode::WouldBlock
        ));
    }

    #[test]
    fn receive_after_close_drains_then_errors() {
        let c = Channel::new(2);
        c.send(9, None).unwrap();
        c.close();
        assert_eq!(c.recv(None).unwrap(), 9);
        assert!(matches!(
            c.recv(None),
            Err(ref e) if e.code == ErrorCode::ChannelClosed
        ));
    }

    #[test]
    fn send_times_out_when_no_room() {
        let c = Channel::new(1);
        c.send(1, None).unwrap();
        let result = c.send(2, Some(Duration::from_millis(20)));
        assert!(matches!(result, Err(ref e) if e.code == ErrorCode::TaskTimeout));
    }
}
