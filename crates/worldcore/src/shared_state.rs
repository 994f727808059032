//! The process-wide façade composing the coordination core with the runtime's
//! other collaborators.
//!
//! Grounded on the teacher's `VMKit<R>` / `Runtime::vmkit()` singleton (a
//! process-wide struct bundling the GC binding, thread registry, and thunks,
//! reached through a static accessor installed by the embedder). This façade plays
//! the same role but uses `Arc` for the "reference-counted lifetime anchor"
//! described in the spec's re-architecture notes: acquiring a handle for a new
//! managed thread is `Arc::clone`, and releasing one is dropping that clone — the
//! idiomatic Rust rendition of the spec's "explicit acquire/release" refcounting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config;
use crate::preemption::PreemptionTimer;
use crate::registry::{FrameSlot, ManagedThread, ManagedThreadRegistry};
use crate::world::WorldState;

/// Stand-in for the object-memory manager and garbage collector proper. Out of
/// scope for this core (spec §1): owned here only so `SharedState`'s lifetime and
/// composition story can be fully built and tested without depending on an actual
/// GC crate.
#[derive(Default)]
pub struct ObjectMemory;

/// Stand-in for the native-extension handle tables.
#[derive(Default)]
pub struct HandleTables;

/// Stand-in for the inline-cache registry.
#[derive(Default)]
pub struct InlineCacheRegistry;

/// The process-wide container. Always held behind an [`Arc`]; construct one with
/// [`SharedState::new`].
pub struct SharedState {
    pub world: WorldState,
    pub registry: ManagedThreadRegistry,
    initialized: AtomicBool,
    #[allow(dead_code)]
    object_memory: ObjectMemory,
    #[allow(dead_code)]
    handle_tables: HandleTables,
    #[allow(dead_code)]
    inline_cache_registry: InlineCacheRegistry,
}

impl SharedState {
    /// Bootstraps a fresh runtime: one dependent (bootstrap) thread, empty
    /// registry, not yet marked initialized.
    pub fn new() -> Arc<SharedState> {
        Arc::new(SharedState {
            world: WorldState::new(),
            registry: ManagedThreadRegistry::new(),
            initialized: AtomicBool::new(false),
            object_memory: ObjectMemory,
            handle_tables: HandleTables,
            inline_cache_registry: InlineCacheRegistry,
        })
    }

    /// Called once by the embedder's bootstrap after every collaborator is wired
    /// up. Gates whether `Drop` runs its full teardown assertions (spec §3: "only
    /// when the façade's reference count reaches zero and the runtime was fully
    /// initialized").
    pub fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::Relaxed);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Relaxed)
    }

    /// Registers a new VM-owned managed thread and returns a fresh strong
    /// reference for it to hold for its lifetime, alongside its registry handle.
    pub fn new_vm(self: &Arc<Self>, frame_slot: FrameSlot) -> (Arc<SharedState>, ManagedThread) {
        let handle = self.registry.register(frame_slot);
        (self.clone(), handle)
    }

    /// Reverses `new_vm`: removes the registry record. Consumes the caller's
    /// strong reference, releasing it; does not free anything the caller itself
    /// allocated for the thread.
    pub fn remove_vm(self: Arc<Self>, handle: ManagedThread) {
        self.registry.remove(handle);
    }

    /// Registers a thread owned by an external collaborator (e.g. the query/debug
    /// agent) that the GC should know about but never treats as a root source.
    pub fn add_managed_thread(self: &Arc<Self>) -> (Arc<SharedState>, ManagedThread) {
        let handle = self.registry.add_external();
        (self.clone(), handle)
    }

    pub fn remove_managed_thread(self: Arc<Self>, handle: ManagedThread) {
        self.registry.remove(handle);
    }

    /// Decrements this holder's reference to the façade; the façade is torn down
    /// once the last `Arc` is dropped. Named to match the spec's operation table;
    /// behaviorally this is just dropping `self`.
    pub fn discard(self: Arc<Self>) {
        drop(self);
    }

    #[inline]
    pub fn checkpoint(&self) {
        self.world.checkpoint();
    }

    pub fn gc_dependent(&self) {
        self.world.become_dependent();
    }

    pub fn gc_independent(&self) {
        self.world.become_independent();
    }

    pub fn stop_the_world(&self) {
        self.world.wait_til_alone();
    }

    pub fn restart_world(&self) {
        self.world.wake_all_waiters();
    }

    pub fn time_waiting(&self) -> u64 {
        self.world.time_waiting()
    }

    /// Starts the preemption timer. Idempotent across the process. Per spec §7.2,
    /// a thread-creation failure here is fatal: logs and exits rather than
    /// returning an error for a caller to ignore.
    pub fn enable_preemption() {
        PreemptionTimer::start()
    }

    /// Post-`fork()` reinitialization. Requires that `this` be the sole surviving
    /// strong reference — the caller must have already dropped every other handle
    /// before calling this, per the spec's lifecycle contract. Panics otherwise,
    /// since proceeding would silently reinitialize state another thread still
    /// believes is live.
    pub fn reinit(this: &mut Arc<SharedState>) {
        config::reset_for_fork();
        let shared =
            Arc::get_mut(this).expect("SharedState::reinit requires sole ownership after fork");
        shared.world.reinit();
        shared.registry = ManagedThreadRegistry::new();
        log::debug!(target: "worldcore::shared_state", "reinitialized after fork");
    }
}

impl Drop for SharedState {
    fn drop(&mut self) {
        if self.initialized.load(Ordering::Relaxed) {
            debug_assert!(
                self.registry.is_empty(),
                "SharedState torn down while managed threads were still registered"
            );
            log::debug!(target: "worldcore::shared_state", "SharedState torn down");
        }
    }
}
