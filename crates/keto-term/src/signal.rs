// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Termination signals.
//
// Raw mode clears ISIG, so Ctrl-C and Ctrl-\ arrive as bytes and never
// become signals. A SIGTERM from `kill`, or a SIGHUP when the terminal
// window closes, still does. Left to the default disposition they end
// the process on the spot with the terminal still raw.
//
// The handler only records which signal arrived; writing an atomic is one
// of the few things a signal handler may do. It is installed without
// SA_RESTART, so a `read()` in progress fails with EINTR, the key reader
// files that under "transient", and the session checks `take_pending()`
// before trying again. From there the exit follows the ordinary path:
// clear the screen, drop the raw-mode guard, return.

use std::sync::atomic::{AtomicI32, Ordering};

use tracing::warn;

/// Signals that end a session through the normal restoration path.
pub const WATCHED: [libc::c_int; 4] = [libc::SIGTERM, libc::SIGHUP, libc::SIGINT, libc::SIGQUIT];

/// Last watched signal received, or 0.
static PENDING: AtomicI32 = AtomicI32::new(0);

extern "C" fn record(sig: libc::c_int) {
    PENDING.store(sig, Ordering::Relaxed);
}

/// Install the recording handler for every signal in [`WATCHED`].
///
/// Safe to call more than once. A signal whose handler cannot be installed
/// keeps its default disposition and is logged.
pub fn install() {
    for sig in WATCHED {
        let ok = unsafe {
            let mut sa: libc::sigaction = std::mem::zeroed();
            sa.sa_sigaction = record as *const () as usize;
            sa.sa_flags = 0;
            libc::sigemptyset(&raw mut sa.sa_mask);
            libc::sigaction(sig, &raw const sa, std::ptr::null_mut()) == 0
        };
        if !ok {
            warn!(sig, "could not install termination handler");
        }
    }
}

/// Take the pending termination signal, if any, clearing it.
#[must_use]
pub fn take_pending() -> Option<i32> {
    match PENDING.swap(0, Ordering::Relaxed) {
        0 => None,
        sig => Some(sig),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
