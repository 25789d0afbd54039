//! Signal-driven graceful shutdown (C6, §4.5).
//!
//! The original C server installs `SIGINT`/`SIGTERM` handlers that close
//! the listening socket, destroy the directory, print a farewell line, and
//! `exit(EXIT_SUCCESS)` -- all from directly inside the handler, with no
//! attempt to join in-flight workers. This is reproduced with a dedicated
//! signal-watching thread (`signal_hook`'s blocking iterator) rather than a
//! true signal handler, since Rust signal handlers are restricted to a
//! narrow async-signal-safe subset that cannot take locks or log; the
//! watcher thread observes the signal and then performs the same sequence
//! the C handler did, ending in `std::process::exit`, which tears down
//! every thread (including any worker mid-request) the same way the
//! original's direct `exit()` call did.
use std::sync::Arc;

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing::info;

use crate::directory::Directory;

/// Spawns the signal-watching thread. Returns immediately; the thread runs
/// for the remaining lifetime of the process.
pub fn install(directory: Arc<Directory>) {
    let mut signals = match Signals::new([SIGINT, SIGTERM]) {
        Ok(s) => s,
        Err(e) => {
            // Without signal handling the server still works, it just
            // cannot be stopped gracefully; this is not a fatal startup
            // failure and is logged at error level rather than aborting.
            tracing::error!(error = %e, "failed to install signal handlers");
            return;
        }
    };

    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!(signal = sig, "received shutdown signal");
            directory.destroy();
            info!("directory destroyed, exiting");
            std::process::exit(0);
        }
    });
}
