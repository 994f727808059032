//! Error handling for the world-coordination core.
//!
//! Only the two OS-primitive failures named in the spec are represented as values;
//! everything else (a caller violating the state-machine contract) is a programmer
//! bug and is asserted, not returned. See `abort` for how a `WorldError` ultimately
//! ends the process.

use std::fmt;

/// A fatal, OS-level failure. There is no recovery path for either variant: the
/// caller is expected to log and abort, never to retry.
#[derive(Debug)]
pub enum WorldError {
    /// `std::thread::Builder::spawn` failed when starting the preemption timer.
    ThreadSpawnFailed(std::io::Error),
    /// Masking signals on the preemption timer thread failed.
    SignalMaskFailed(i32),
}

impl fmt::Display for WorldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorldError::ThreadSpawnFailed(e) => write!(f, "failed to spawn thread: {e}"),
            WorldError::SignalMaskFailed(errno) => {
                write!(f, "pthread_sigmask failed with errno {errno}")
            }
        }
    }
}

/// Log `err` at `error` level and terminate the process immediately.
///
/// We call [`std::process::abort`] rather than `panic!`: a panic can be caught by
/// `catch_unwind` elsewhere in the process, which would leave the world either
/// half-stopped or with a poisoned mutex and nobody left who knows to restart it.
/// That is strictly worse than terminating, so these conditions never unwind.
pub fn abort(err: &WorldError) -> ! {
    log::error!(target: "worldcore", "fatal: {err}");
    std::process::abort()
}
