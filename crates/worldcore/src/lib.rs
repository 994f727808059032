//! `worldcore`: the stop-the-world coordination core for a managed-language
//! runtime.
//!
//! This crate owns exactly the piece of a GC-capable VM that decides when
//! managed threads must pause for the collector and when they may resume — the
//! [`WorldState`](world::WorldState) barrier, a periodic [`PreemptionTimer`]
//! that keeps compute-bound threads checking in, a [`ManagedThreadRegistry`]
//! tracking which threads exist, and a [`SharedState`](shared_state::SharedState)
//! façade that ties the three together for an embedder. Object allocation,
//! collection itself, and the actual GC algorithm are someone else's problem;
//! see each module's docs for the exact boundary.

pub mod config;
pub mod error;
pub mod preemption;
pub mod registry;
pub mod shared_state;
pub mod world;

pub use error::WorldError;
pub use preemption::PreemptionTimer;
pub use registry::{FrameSlot, ManagedThread, ManagedThreadRegistry};
pub use shared_state::SharedState;
pub use world::WorldState;
