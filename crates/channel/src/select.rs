// Copyright (c) 2026 the concur-bridge authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use std::thread;
use std::time::{Duration, Instant};

use crate::channel::Channel;

/// One registered operation in a [`SelectContext`]. Attempting it must
/// never block: it either completes immediately or leaves everything
/// untouched.
trait SelectEntry {
    fn try_attempt(&mut self) -> bool;
}

struct SendEntry<'a, T> {
    channel: &'a Channel<T>,
    value: Option<T>,
}

impl<T> SelectEntry for SendEntry<'_, T> {
    fn try_attempt(&mut self) -> bool {
        let Some(value) = self.value.take() else {
            return false;
        };
        match self.channel.try_send(value) {
            Ok(()) => true,
            Err((value, _)) => {
                // `try_send` hands the value back on failure; restore it
                // so this entry can be retried on the next pass instead
                // of going permanently inert.
                self.value = Some(value);
                false
            }
        }
    }
}

struct RecvEntry<'a, T> {
    channel: &'a Channel<T>,
    dest: &'a mut Option<T>,
}

impl<T> SelectEntry for RecvEntry<'_, T> {
    fn try_attempt(&mut self) -> bool {
        match self.channel.try_recv() {
            Ok(value) => {
                *self.dest = Some(value);
                true
            }
            Err(_) => false,
        }
    }
}

const SELECT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// A scratch structure holding a batch of channel operations to attempt
/// together, per the spec's "sequential attempt in registration order"
/// contract (§4.3): on each pass every registered entry is tried with a
/// zero-wait attempt in the order it was added, and the first to succeed
/// is selected. This favors early-registered channels under sustained
/// load — callers that need fairness should randomize registration
/// order, as the spec's open question on select fairness notes.
pub struct SelectContext<'a> {
    entries: Vec<Box<dyn SelectEntry + 'a>>,
    capacity: usize,
    selected: i64,
}

impl<'a> SelectContext<'a> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            selected: -1,
        }
    }

    pub fn add_send<T: 'a>(&mut self, channel: &'a Channel<T>, value: T) -> Option<usize> {
        if self.entries.len() >= self.capacity {
            return None;
        }
        self.entries.push(Box::new(SendEntry {
            channel,
            value: Some(value),
        }));
        Some(self.entries.len() - 1)
    }

    pub fn add_recv<T: 'a>(&mut self, channel: &'a Channel<T>, dest: &'a mut Option<T>) -> Option<usize> {
        if self.entries.len() >= self.capacity {
            return None;
        }
        self.entries.push(Box::new(RecvEntry { channel, dest }));
        Some(self.entries.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn selected_index(&self) -> i64 {
        self.selected
    }

    /// Attempts every registered entry in order, repeating until one
    /// succeeds or `timeout` elapses. `timeout == None` blocks
    /// indefinitely; `Some(Duration::ZERO)` is a single non-blocking
    /// pass. Returns the selected entry's index, or `-1` if none became
    /// ready in time.
    pub fn execute(&mut self, timeout: Option<Duration>) -> i64 {
        let single_pass = matches!(timeout, Some(d) if d.is_zero());
        let deadline = timeout.filter(|d| !d.is_zero()).map(|d| Instant::now() + d);

        loop {
            for (index, entry) in self.entries.iter_mut().enumerate() {
                if entry.try_attempt() {
                    self.selected = index as i64;
                    return self.selected;
                }
            }
            if single_pass {
                return -1;
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return -1;
                }
            }
            thread::sleep(SELECT_POLL_INTERVAL);
        }
    }

    /// Tears down the context, releasing its registered references.
    pub fn destroy(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_first_ready_channel_leaving_others_untouched() {
        let a: Channel<&str> = Channel::new(1);
        let b: Channel<&str> = Channel::new(1);
        b.try_send("x").unwrap();

        let mut buf_a: Option<&str> = None;
        let mut buf_b: Option<&str> = None;

        let mut ctx = SelectContext::with_capacity(2);
        ctx.add_recv(&a, &mut buf_a);
        ctx.add_recv(&b, &mut buf_b);

        let selected = ctx.execute(Some(Duration::ZERO));
        assert_eq!(selected, 1);
        assert_eq!(buf_b, Some("x"));
        assert_eq!(buf_a, None);
    }

    #[test]
    fn returns_negative_one_when_nothing_ready_and_non_blocking() {
        let a: Channel<i32> = Channel::new(1);
        let mut dest = None;
        let mut ctx = SelectContext::with_capacity(1);
        ctx.add_recv(&a, &mut dest);
        assert_eq!(ctx.execute(Some(Duration::ZERO)), -1);
    }

    #[test]
    fn execute_blocks_until_a_send_arrives() {
        let a: Channel<i32> = Channel::new(1);
        std::thread::scope(|scope| {
            scope.spawn(|| {
                std::thread::sleep(Duration::from_millis(20));
                a.send(7, None).unwrap();
            });

            let mut dest = None;
            let mut ctx = SelectContext::with_capacity(1);
            ctx.add_recv(&a, &mut dest);
            let selected = ctx.execute(Some(Duration::from_secs(1)));
            assert_eq!(selected, 0);
            assert_eq!(dest, Some(7));
        });
    }

    #[test]
    fn a_blocking_send_survives_being_full_on_the_first_pass() {
        let a: Channel<i32> = Channel::new(1);
        a.try_send(0).unwrap(); // full on the first attempt
        std::thread::scope(|scope| {
            scope.spawn(|| {
                std::thread::sleep(Duration::from_millis(20));
                assert_eq!(a.recv(None).unwrap(), 0); // opens room for the select
            });

            let mut ctx = SelectContext::with_capacity(1);
            ctx.add_send(&a, 42);
            let selected = ctx.execute(Some(Duration::from_secs(1)));
            assert_eq!(selected, 0);
        });
        assert_eq!(a.recv(None).unwrap(), 42);
    }
}
