//! Fire-and-forget audit logging to a remote sink over UDP (§4.3).
//!
//! The RPC client is a process-wide, lazily-initialized handle. A send
//! failure tears the handle down; the next event reconnects from scratch.
//! The failing event is simply lost — audit is best-effort and must never
//! block or fail a peer's reply.
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::{Mutex, OnceLock};

use tracing::{debug, warn};

/// One audit record: `(username, operation, timestamp, filename)` from §4.3.
/// `filename` is empty for operations with no path argument.
#[derive(Debug, Clone)]
pub struct AuditEvent<'a> {
    pub username: &'a str,
    pub operation: &'a str,
    pub timestamp: &'a str,
    pub filename: &'a str,
}

impl AuditEvent<'_> {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for field in [self.username, self.operation, self.timestamp, self.filename] {
            buf.extend_from_slice(field.as_bytes());
            buf.push(0);
        }
        buf
    }
}

struct AuditClient {
    socket: UdpSocket,
    sink: SocketAddr,
}

impl AuditClient {
    fn connect(sink: SocketAddr) -> io::Result<Self> {
        // Bind an ephemeral local port; the socket is "connected" in the
        // UDP sense so every send targets the same sink without repeating
        // the address on each call.
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect(sink)?;
        Ok(Self { socket, sink })
    }

    fn send(&self, payload: &[u8]) -> io::Result<()> {
        self.socket.send(payload).map(|_| ())
    }
}

static SINK: OnceLock<Option<SocketAddr>> = OnceLock::new();
static CLIENT: Mutex<Option<AuditClient>> = Mutex::new(None);

/// Sets the remote sink address for the lifetime of the process. Must be
/// called at most once, before the first [`log_event`] call; `main` does
/// this immediately after resolving [`crate::config::Config`]. Absence of a
/// sink (argument `None`) disables audit entirely, matching §6's note that
/// a missing `LOG_RPC_IP` disables audit for the call.
pub fn configure(sink: Option<SocketAddr>) {
    // OnceLock::set silently no-ops on a second call, which only matters in
    // tests that construct more than one dispatcher in-process.
    let _ = SINK.set(sink);
}

/// Emits one best-effort audit event. Never blocks the caller on anything
/// beyond a single non-blocking UDP send, and never surfaces an error.
pub fn log_event(event: AuditEvent<'_>) {
    let Some(sink) = SINK.get().copied().flatten() else {
        return;
    };

    let payload = event.encode();
    let mut guard = CLIENT.lock().unwrap();

    if guard.is_none() {
        match AuditClient::connect(sink) {
            Ok(client) => {
                debug!(%sink, "audit client connected");
                *guard = Some(client);
            }
            Err(e) => {
                warn!(%sink, error = %e, "failed to connect audit client");
                return;
            }
        }
    }

    let client = guard.as_ref().unwrap();
    if let Err(e) = client.send(&payload) {
        warn!(sink = %client.sink, error = %e, "audit send failed, will reconnect on next event");
        *guard = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_nul_terminates_every_field_in_order() {
        let ev = AuditEvent {
            username: "alice",
            operation: "REGISTER",
            timestamp: "1700000000",
            filename: "",
        };
        assert_eq!(ev.encode(), b"alice\0REGISTER\01700000000\0\0".to_vec());
    }
}
