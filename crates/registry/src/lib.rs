// Copyright (c) 2026 the concur-bridge authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Thread registry for GC-root tracking on externally-created threads.
//!
//! The teacher tracks "the current thread's extra state" with a
//! `thread_local!` `RefCell`-backed map keyed by its own small integer
//! thread id (`CHILD_THREADS`, `CURRENT_THREAD_ID` in
//! `crates/runtime/src/lib.rs`). This crate generalizes that idiom:
//! `std::thread::ThreadId` keys a process-wide map of descriptors, and a
//! scoped guard replaces the bare thread-local array the redesign notes
//! call out, so a panicking or early-returning thread still releases its
//! slot.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Instant;

/// An opaque GC-root pointer. The collector itself is an external
/// collaborator (out of scope, per spec §1); this crate only tracks
/// which roots belong to which thread and hands them back on
/// unregister.
pub type GcRoot = usize;

/// Where released roots go. The default sink does nothing, appropriate
/// for embedders that don't plug in a collector; a real embedding
/// supplies its own.
pub trait GcRootSink: Send + Sync {
    fn release_root(&self, root: GcRoot);
}

#[derive(Default)]
pub struct NoopGcRootSink;

impl GcRootSink for NoopGcRootSink {
    fn release_root(&self, _root: GcRoot) {}
}

pub struct ThreadDescriptor {
    pub thread_id: ThreadId,
    pub registered_at: Instant,
    last_gc_at: Mutex<Option<Instant>>,
    roots: Mutex<Vec<GcRoot>>,
    roots_len: AtomicUsize,
}

impl ThreadDescriptor {
    fn new(thread_id: ThreadId) -> Self {
        Self {
            thread_id,
            registered_at: Instant::now(),
            last_gc_at: Mutex::new(None),
            roots: Mutex::new(Vec::new()),
            roots_len: AtomicUsize::new(0),
        }
    }

    pub fn add_root(&self, root: GcRoot) {
        let mut roots = self.roots.lock().unwrap();
        roots.push(root);
        self.roots_len.store(roots.len(), Ordering::Release);
    }

    /// Removes `root` by swapping it with the last element, as the spec
    /// prescribes, rather than shifting the whole tail.
    pub fn remove_root(&self, root: GcRoot) -> bool {
        let mut roots = self.roots.lock().unwrap();
        if let Some(pos) = roots.iter().position(|r| *r == root) {
            roots.swap_remove(pos);
            self.roots_len.store(roots.len(), Ordering::Release);
            true
        } else {
            false
        }
    }

    pub fn root_count(&self) -> usize {
        self.roots_len.load(Ordering::Acquire)
    }

    pub fn mark_gc_pass(&self) {
        *self.last_gc_at.lock().unwrap() = Some(Instant::now());
    }

    fn take_all_roots(&self) -> Vec<GcRoot> {
        let mut roots = self.roots.lock().unwrap();
        let taken = std::mem::take(&mut *roots);
        self.roots_len.store(0, Ordering::Release);
        taken
    }
}

/// Process-wide registry of thread descriptors. Registration is
/// idempotent per thread.
pub struct ThreadRegistry {
    descriptors: Mutex<HashMap<ThreadId, Arc<ThreadDescriptor>>>,
    gc_sink: Arc<dyn GcRootSink>,
    registered_count: AtomicUsize,
}

thread_local! {
    static CURRENT: RefCell<Option<Arc<ThreadDescriptor>>> = const { RefCell::new(None) };
}

impl ThreadRegistry {
    pub fn new(gc_sink: Arc<dyn GcRootSink>) -> Self {
        Self {
            descriptors: Mutex::new(HashMap::new()),
            gc_sink,
            registered_count: AtomicUsize::new(0),
        }
    }

    pub fn with_default_sink() -> Self {
        Self::new(Arc::new(NoopGcRootSink))
    }

    /// Registers the calling OS thread, or returns its existing
    /// descriptor if it is already registered — re-registering never
    /// duplicates the entry.
    pub fn register_current(&self) -> Arc<ThreadDescriptor> {
        if let Some(existing) = CURRENT.with(|cell| cell.borrow().clone()) {
            return existing;
        }
        let id = thread::current().id();
        let descriptor = {
            let mut map = self.descriptors.lock().unwrap();
            map.entry(id)
                .or_insert_with(|| Arc::new(ThreadDescriptor::new(id)))
                .clone()
        };
        CURRENT.with(|cell| *cell.borrow_mut() = Some(descriptor.clone()));
        self.registered_count.fetch_add(1, Ordering::Relaxed);
        log::debug!("thread {:?} registered for GC-root tracking", id);
        descriptor
    }

    /// Removes the calling thread's descriptor and releases all of its
    /// still-registered roots back to the GC sink.
    pub fn unregister_current(&self) {
        let Some(descriptor) = CURRENT.with(|cell| cell.borrow_mut().take()) else {
            return;
        };
        self.descriptors.lock().unwrap().remove(&descriptor.thread_id);
        for root in descriptor.take_all_roots() {
            self.gc_sink.release_root(root);
        }
        self.registered_count.fetch_sub(1, Ordering::Relaxed);
        log::debug!("thread {:?} unregistered", descriptor.thread_id);
    }

    pub fn is_registered(&self, id: ThreadId) -> bool {
        self.descriptors.lock().unwrap().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.registered_count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of [`ThreadDescriptor::root_count`] across every currently
    /// registered thread, for the bridge's GC-root statistic.
    pub fn total_roots(&self) -> usize {
        self.descriptors
            .lock()
            .unwrap()
            .values()
            .map(|d| d.root_count())
            .sum()
    }

    /// Unregisters every remaining thread, for bridge cleanup. Only
    /// meaningful for descriptors whose owning thread has already
    /// exited; it releases their roots and drops the descriptors.
    pub fn unregister_all(&self) {
        let remaining: Vec<Arc<ThreadDescriptor>> =
            self.descriptors.lock().unwrap().drain().map(|(_, d)| d).collect();
        for descriptor in remaining {
            for root in descriptor.take_all_roots() {
                self.gc_sink.release_root(root);
            }
        }
        self.registered_count.store(0, Ordering::Relaxed);
    }
}

/// A scoped registration guard: acquires the calling thread's slot on
/// construction, releases it on drop — including on panic or early
/// return, unlike a bare thread-local array the caller must remember to
/// clear.
pub struct ThreadRegistrationGuard<'a> {
    registry: &'a ThreadRegistry,
}

impl<'a> ThreadRegistrationGuard<'a> {
    pub fn enter(registry: &'a ThreadRegistry) -> (Self, Arc<ThreadDescriptor>) {
        let descriptor = registry.register_current();
        (Self { registry }, descriptor)
    }
}

impl Drop for ThreadRegistrationGuard<'_> {
    fn drop(&mut self) {
        self.registry.unregister_current();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_idempotent_per_thread() {
        let registry = ThreadRegistry::with_default_sink();
        let first = registry.register_current();
        let second = registry.register_current();
        assert_eq!(first.thread_id, second.thread_id);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn guard_releases_roots_on_unregister() {
        struct CountingSink(AtomicUsize);
        impl GcRootSink for CountingSink {
            fn release_root(&self, _root: GcRoot) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }
        let sink = Arc::new(CountingSink(AtomicUsize::new(0)));
        let registry = ThreadRegistry::new(sink.clone());

        {
            let (_guard, descriptor) = ThreadRegistrationGuard::enter(&registry);
            descriptor.add_root(0x1000);
            descriptor.add_root(0x2000);
            assert_eq!(descriptor.root_count(), 2);
        }

        assert_eq!(sink.0.load(Ordering::Relaxed), 2);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn total_roots_sums_across_threads() {
        let registry = ThreadRegistry::with_default_sink();
        let a = registry.register_current();
        a.add_root(1);
        a.add_root(2);

        let registry = Arc::new(registry);
        let r2 = Arc::clone(&registry);
        thread::spawn(move || {
            let b = r2.register_current();
            b.add_root(3);
            r2.unregister_current();
        })
        .join()
        .unwrap();

        assert_eq!(registry.total_roots(), 2);
    }

    #[test]
    fn remove_root_swaps_with_last() {
        let registry = ThreadRegistry::with_default_sink();
        let descriptor = registry.register_current();
        descriptor.add_root(1);
        descriptor.add_root(2);
        descriptor.add_root(3);
        assert!(descriptor.remove_root(2));
        assert_eq!(descriptor.root_count(), 2);
        assert!(!descriptor.remove_root(2));
    }
}
