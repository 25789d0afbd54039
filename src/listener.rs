//! The accept loop and the listener/worker handoff rendezvous (C5, §4.4).
//!
//! The original C server passes the accepted file descriptor to the new
//! worker thread through a single stack-allocated slot, and uses a
//! condition variable to block the listener from looping (and reusing that
//! slot) until the worker has taken ownership of it. In safe Rust the
//! accepted [`TcpStream`] is moved into the worker closure, so there is no
//! slot to race on -- but the same rendezvous is kept anyway, because it is
//! the mechanism that guarantees the worker is scheduled and has taken the
//! stream before the listener proceeds to `accept` again, exactly as the
//! teacher's own `serve_tcp` hands a session off to `thread::spawn` per
//! connection.
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use tracing::{debug, error, info, warn};

use crate::directory::Directory;
use crate::dispatcher;

/// The handoff rendezvous: a "ready" flag guarded by a mutex, signaled once
/// the worker has taken ownership of its stream.
#[derive(Default)]
struct Handoff {
    ready: Mutex<bool>,
    cond: Condvar,
}

impl Handoff {
    fn signal_ready(&self) {
        let mut ready = self.ready.lock().unwrap();
        *ready = true;
        self.cond.notify_one();
    }

    fn wait_for_ready(&self) {
        let mut ready = self.ready.lock().unwrap();
        while !*ready {
            ready = self.cond.wait(ready).unwrap();
        }
    }
}

/// Binds `port` and serves connections until the listener is asked to stop
/// via [`crate::lifecycle`]. Each connection is handled on its own detached
/// thread; the directory is the only state shared across them.
pub fn serve(listener: TcpListener, directory: Arc<Directory>) {
    for incoming in listener.incoming() {
        let stream = match incoming {
            Ok(s) => s,
            Err(e) => {
                // A listener torn down by the signal handler surfaces here
                // as an I/O error on the next accept; that is the expected
                // way this loop ends.
                warn!(error = %e, "accept failed, stopping listener loop");
                return;
            }
        };

        spawn_worker(stream, directory.clone());
    }
}

fn spawn_worker(stream: TcpStream, directory: Arc<Directory>) {
    let handoff = Arc::new(Handoff::default());
    let worker_handoff = handoff.clone();

    let spawned = thread::Builder::new().spawn(move || {
        worker_handoff.signal_ready();
        debug!("worker took ownership of accepted connection");
        dispatcher::handle_connection(stream, &directory);
    });

    match spawned {
        Ok(_join_handle) => {
            // The worker is intentionally left detached: its completion is
            // not joined, per §4.4. Dropping the handle does not stop the
            // thread.
            handoff.wait_for_ready();
        }
        Err(e) => {
            error!(error = %e, "failed to spawn worker thread for accepted connection");
        }
    }
}

/// Creates and binds the listening socket. `std::net::TcpListener::bind`
/// already sets `SO_REUSEADDR` on Unix before binding, which is the same
/// protection the original C server installs explicitly via `setsockopt`
/// against a restarted server failing to bind while the old socket lingers
/// in `TIME_WAIT`.
pub fn bind(port: u16) -> std::io::Result<TcpListener> {
    use std::net::SocketAddr;

    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let listener = TcpListener::bind(addr)?;
    info!(%addr, "listening for peer connections");
    Ok(listener)
}
