// Copyright (c) 2026 the concur-bridge authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::Ordering;
use std::sync::Mutex;

use crate::condvar::CountingCondvar;
use crate::PrimitiveCounters;

struct State {
    readers: u32,
    writer_active: bool,
    waiting_writers: u32,
}

/// A read-write lock where readers may coexist but writers are
/// exclusive, and — unlike `std::sync::RwLock`, whose fairness is
/// platform-dependent — writers cannot starve under sustained reader
/// load: once a writer begins waiting, newly-arriving readers wait
/// behind it until it has acquired and released the lock.
pub struct CountingRwLock<T> {
    state: Mutex<State>,
    readers_ok: CountingCondvar,
    writer_ok: CountingCondvar,
    data: UnsafeCell<T>,
    counters: PrimitiveCounters,
}

unsafe impl<T: Send> Send for CountingRwLock<T> {}
unsafe impl<T: Send> Sync for CountingRwLock<T> {}

impl<T> CountingRwLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            state: Mutex::new(State {
                readers: 0,
                writer_active: false,
                waiting_writers: 0,
            }),
            readers_ok: CountingCondvar::new(),
            writer_ok: CountingCondvar::new(),
            data: UnsafeCell::new(value),
            counters: PrimitiveCounters::new(),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        let mut state = self.state.lock().unwrap();
        while state.writer_active || state.waiting_writers > 0 {
            self.counters.contentions.fetch_add(1, Ordering::Relaxed);
            state = self.readers_ok.wait(state);
        }
        state.readers += 1;
        self.counters.locks_taken.fetch_add(1, Ordering::Relaxed);
        RwLockReadGuard { lock: self }
    }

    pub fn try_read(&self) -> Option<RwLockReadGuard<'_, T>> {
        let mut state = self.state.lock().unwrap();
        if state.writer_active || state.waiting_writers > 0 {
            return None;
        }
        state.readers += 1;
        self.counters.locks_taken.fetch_add(1, Ordering::Relaxed);
        Some(RwLockReadGuard { lock: self })
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        let mut state = self.state.lock().unwrap();
        state.waiting_writers += 1;
        while state.writer_active || state.readers > 0 {
            self.counters.contentions.fetch_add(1, Ordering::Relaxed);
            state = self.writer_ok.wait(state);
        }
        state.waiting_writers -= 1;
        state.writer_active = true;
        self.counters.locks_taken.fetch_add(1, Ordering::Relaxed);
        RwLockWriteGuard { lock: self }
    }

    pub fn try_write(&self) -> Option<RwLockWriteGuard<'_, T>> {
        let mut state = self.state.lock().unwrap();
        if state.writer_active || state.readers > 0 {
            return None;
        }
        state.writer_active = true;
        self.counters.locks_taken.fetch_add(1, Ordering::Relaxed);
        Some(RwLockWriteGuard { lock: self })
    }

    fn unlock_read(&self) {
        let mut state = self.state.lock().unwrap();
        state.readers -= 1;
        let last_reader = state.readers == 0;
        drop(state);
        if last_reader {
            self.counters.signals_issued.fetch_add(1, Ordering::Relaxed);
            self.writer_ok.broadcast();
        }
    }

    fn unlock_write(&self) {
        let mut state = self.state.lock().unwrap();
        state.writer_active = false;
        drop(state);
        self.counters.signals_issued.fetch_add(1, Ordering::Relaxed);
        self.writer_ok.broadcast();
        self.readers_ok.broadcast();
    }

    pub fn stats(&self) -> crate::PrimitiveStats {
        self.counters.snapshot()
    }
}

pub struct RwLockReadGuard<'a, T> {
    lock: &'a CountingRwLock<T>,
}

impl<T> Deref for RwLockReadGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> Drop for RwLockReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.unlock_read();
    }
}

pub struct RwLockWriteGuard<'a, T> {
    lock: &'a CountingRwLock<T>,
}

impl<T> Deref for RwLockWriteGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for RwLockWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for RwLockWriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.unlock_write();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn readers_coexist() {
        let lock = Arc::new(CountingRwLock::new(7));
        let r1 = lock.read();
        let r2 = lock.read();
        assert_eq!(*r1, 7);
        assert_eq!(*r2, 7);
    }

    #[test]
    fn writer_excludes_readers() {
        let lock = Arc::new(CountingRwLock::new(0));
        {
            let mut w = lock.write();
            *w = 42;
        }
        assert_eq!(*lock.read(), 42);
    }

    #[test]
    fn writer_does_not_starve_under_reader_pressure() {
        let lock = Arc::new(CountingRwLock::new(0u32));

        // hold one reader so a writer must wait
        let held = lock.read();

        let lock2 = Arc::clone(&lock);
        let writer = thread::spawn(move || {
            let mut w = lock2.write();
            *w += 1;
        });

        // give the writer a chance to register as waiting
        thread::sleep(Duration::from_millis(20));

        // a reader arriving after the writer is already waiting must not
        // cut in front of it
        let lock3 = Arc::clone(&lock);
        let late_reader_went_first = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = Arc::clone(&late_reader_went_first);
        let late_reader = thread::spawn(move || {
            let r = lock3.read();
            if *r == 0 {
                flag.store(true, Ordering::Relaxed);
            }
        });

        drop(held);
        writer.join().unwrap();
        late_reader.join().unwrap();
        assert!(!late_reader_went_first.load(Ordering::Relaxed));
    }
}
