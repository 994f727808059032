//! A minimal process-wide flag registry.
//!
//! The teacher crate's `utils::flags` module builds a full `--prefix:flag=value`
//! registry (multiple value types, short flags, a type-keyed map of registered
//! flags) to cover a large GC-options surface. This core owns exactly two knobs, so
//! rather than drag in that whole apparatus we keep only the piece of its idiom that
//! actually earns its keep here: `ctor`-backed static initialization from the
//! environment, read with a relaxed atomic load on the hot path.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

const ENV_PREEMPTION_ENABLED: &str = "WORLDCORE_PREEMPTION_ENABLED";
const ENV_PREEMPTION_INTERVAL_MS: &str = "WORLDCORE_PREEMPTION_INTERVAL_MS";

/// Default for [`preemption_enabled`]; also what `reinit()` restores it to.
pub const DEFAULT_PREEMPTION_ENABLED: bool = true;
/// Default for [`preemption_interval_ms`]; matches the 10ms figure in the spec.
pub const DEFAULT_PREEMPTION_INTERVAL_MS: u64 = 10;

static PREEMPTION_ENABLED: AtomicBool = AtomicBool::new(DEFAULT_PREEMPTION_ENABLED);
static PREEMPTION_INTERVAL_MS: AtomicU64 = AtomicU64::new(DEFAULT_PREEMPTION_INTERVAL_MS);

#[ctor::ctor]
fn init_preemption_enabled_flag() {
    if let Ok(value) = std::env::var(ENV_PREEMPTION_ENABLED) {
        match value.to_lowercase().as_str() {
            "1" | "true" | "yes" => PREEMPTION_ENABLED.store(true, Ordering::Relaxed),
            "0" | "false" | "no" => PREEMPTION_ENABLED.store(false, Ordering::Relaxed),
            other => eprintln!(
                "worldcore: ignoring {ENV_PREEMPTION_ENABLED}={other}, expected true/false"
            ),
        }
    }
}

#[ctor::ctor]
fn init_preemption_interval_flag() {
    if let Ok(value) = std::env::var(ENV_PREEMPTION_INTERVAL_MS) {
        match value.parse::<u64>() {
            Ok(ms) if ms > 0 => PREEMPTION_INTERVAL_MS.store(ms, Ordering::Relaxed),
            _ => eprintln!(
                "worldcore: ignoring {ENV_PREEMPTION_INTERVAL_MS}={value}, expected a positive integer"
            ),
        }
    }
}

/// Whether the preemption timer should actually raise checkpoint requests, or just
/// tick idly. Set via `WORLDCORE_PREEMPTION_ENABLED` at process start.
pub fn preemption_enabled() -> bool {
    PREEMPTION_ENABLED.load(Ordering::Relaxed)
}

pub fn set_preemption_enabled(value: bool) {
    PREEMPTION_ENABLED.store(value, Ordering::Relaxed);
}

/// The preemption timer's sleep period. Set via `WORLDCORE_PREEMPTION_INTERVAL_MS`.
pub fn preemption_interval_ms() -> u64 {
    PREEMPTION_INTERVAL_MS.load(Ordering::Relaxed)
}

/// Reset knobs that would be confusing for a forked child to inherit verbatim (e.g.
/// a parent that disabled preemption mid-critical-section). Called from
/// `SharedState::reinit` before `WorldState::reinit`.
pub fn reset_for_fork() {
    set_preemption_enabled(DEFAULT_PREEMPTION_ENABLED);
}
