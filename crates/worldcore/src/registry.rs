//! The managed-thread registry.
//!
//! Grounded on the teacher's `runtime::threads::Threads<R>` (`Mutex<Vec<VMThread>>`
//! plus a monotonic id counter), generalized to also track each thread's
//! call-frame-location pointer and its root designation, which the teacher's
//! registry left to the GC binding rather than owning itself.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Opaque identity handle for a registered managed thread. Mint one via
/// [`ManagedThreadRegistry::register`] or [`ManagedThreadRegistry::add_external`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct ManagedThread(u64);

/// The address of a thread's current call-frame-location slot. The registry stores
/// only the address and never dereferences it — the owning thread's stack frame is
/// the actual storage, and keeping it live and up to date is that thread's job, not
/// the registry's.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FrameSlot(usize);

impl FrameSlot {
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        FrameSlot(ptr as usize)
    }

    pub fn as_address(self) -> usize {
        self.0
    }
}

struct Entry {
    handle: ManagedThread,
    frame_slot: Option<FrameSlot>,
    is_root: bool,
}

/// An ordered collection of every live managed thread, the root-thread designation,
/// and the root-pointer list the GC consults during a stop-the-world episode.
pub struct ManagedThreadRegistry {
    threads: Mutex<Vec<Entry>>,
    next_id: AtomicU64,
}

impl Default for ManagedThreadRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagedThreadRegistry {
    pub fn new() -> Self {
        Self {
            threads: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Registers a new VM-owned managed thread, contributing `frame_slot` to the
    /// GC's root-pointer list. The first thread ever registered becomes root.
    pub fn register(&self, frame_slot: FrameSlot) -> ManagedThread {
        let handle = ManagedThread(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut threads = self.threads.lock().unwrap();
        let is_root = threads.is_empty();
        threads.push(Entry {
            handle,
            frame_slot: Some(frame_slot),
            is_root,
        });
        log::debug!(target: "worldcore::registry", "registered thread {handle:?} (root: {is_root})");
        handle
    }

    /// Registers a thread owned by an external collaborator (e.g. the query/debug
    /// agent). It never contributes a root-pointer slot and is never root.
    pub fn add_external(&self) -> ManagedThread {
        let handle = ManagedThread(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut threads = self.threads.lock().unwrap();
        threads.push(Entry {
            handle,
            frame_slot: None,
            is_root: false,
        });
        log::debug!(target: "worldcore::registry", "registered external thread {handle:?}");
        handle
    }

    /// Removes a thread's record. Does not free anything the caller associated
    /// with `handle` — the caller's own stack may still reference it.
    pub fn remove(&self, handle: ManagedThread) -> bool {
        let mut threads = self.threads.lock().unwrap();
        match threads.iter().position(|e| e.handle == handle) {
            Some(pos) => {
                threads.remove(pos);
                log::debug!(target: "worldcore::registry", "removed thread {handle:?}");
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.threads.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_root(&self) -> bool {
        self.threads.lock().unwrap().iter().any(|e| e.is_root)
    }

    /// The GC's root-pointer list: every registered thread's call-frame-location
    /// slot, in registration order, skipping threads that never contributed one.
    pub fn frame_slots(&self) -> Vec<FrameSlot> {
        self.threads
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| e.frame_slot)
            .collect()
    }
}
