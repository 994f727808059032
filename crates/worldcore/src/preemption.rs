//! The preemption timer.
//!
//! A dedicated OS thread that periodically pokes an interrupt flag so a managed
//! thread stuck in a tight compute loop still reaches a `checkpoint` promptly.
//! Grounded on the teacher's `Thread::start` idiom (`std::thread::Builder::new().spawn`)
//! for the thread itself, and on the teacher's `libc` dependency for the signal
//! masking this thread needs that the teacher's own threads did not.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config;
use crate::error::WorldError;

/// Set by the timer thread on every tick (subject to `config::preemption_enabled`);
/// cleared by whoever acts on it. Managed threads consult this in their dispatch
/// loop as a cue to call `checkpoint` soon; the core itself never clears it, that is
/// the runtime's job.
static TIMER_FLAG: AtomicBool = AtomicBool::new(false);

static START: Once = Once::new();

/// A handle to the running timer thread. Dropping it does not stop the thread: per
/// the spec, the loop never terminates and is torn down only by process exit.
pub struct PreemptionTimer {
    #[allow(dead_code)]
    handle: JoinHandle<()>,
}

impl PreemptionTimer {
    /// Starts the timer thread. Idempotent: calling this more than once across the
    /// process only starts one thread; subsequent calls are no-ops.
    ///
    /// Per spec, thread-creation failure here is fatal: logs and exits the process,
    /// the same as the signal-masking failure inside the timer thread itself.
    pub fn start() {
        START.call_once(|| match Self::spawn() {
            Ok(handle) => {
                // Leak the handle: the timer thread runs for the life of the
                // process and nothing ever joins it.
                std::mem::forget(PreemptionTimer { handle });
            }
            Err(err) => crate::error::abort(&err),
        });
    }

    fn spawn() -> Result<JoinHandle<()>, WorldError> {
        std::thread::Builder::new()
            .name("worldcore-preemption-timer".into())
            .spawn(Self::run)
            .map_err(WorldError::ThreadSpawnFailed)
    }

    fn run() {
        mask_all_signals();
        log::debug!(target: "worldcore::preemption", "preemption timer started");

        loop {
            std::thread::sleep(Duration::from_millis(config::preemption_interval_ms()));
            if config::preemption_enabled() {
                TIMER_FLAG.store(true, Ordering::Relaxed);
            }
        }
    }
}

/// Whether the timer has raised a preemption request since it was last observed.
/// Does not clear the flag; callers that act on it should clear it themselves.
pub fn timer_flag() -> bool {
    TIMER_FLAG.load(Ordering::Relaxed)
}

/// Clears the preemption flag, typically right after a thread has reached a
/// checkpoint on account of it.
pub fn clear_timer_flag() {
    TIMER_FLAG.store(false, Ordering::Relaxed);
}

/// Masks every signal on the calling thread so the kernel never targets the
/// preemption timer for delivery. Aborts the process if masking fails: a signal
/// landing on this thread mid-sleep is not a condition we can recover from safely.
fn mask_all_signals() {
    unsafe {
        let mut set: libc::sigset_t = std::mem::zeroed();
        libc::sigfillset(&mut set);
        let rc = libc::pthread_sigmask(libc::SIG_SETMASK, &set, std::ptr::null_mut());
        if rc != 0 {
            crate::error::abort(&WorldError::SignalMaskFailed(rc));
        }
    }
}
