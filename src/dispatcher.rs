//! Per-connection request dispatcher (C4, §4.2).
//!
//! Each accepted connection carries exactly one request. The worker reads
//! the three header fields, routes on `operation`, invokes the matching
//! [`Directory`] operation, writes the reply, emits one audit event, and
//! closes. A worker that fails partway through a reply closes the socket
//! silently -- protocol and resource errors are never surfaced to the peer.
use std::io::Write;
use std::net::TcpStream;

use tracing::debug;

use crate::audit::{log_event, AuditEvent};
use crate::directory::{basename, Directory, MAX_MULTIFILE_MATCHES};
use crate::protocol::framing::{read_field, write_decimal, write_field, write_status};
use crate::protocol::{
    Operation, MAX_DESCRIPTION_LEN, MAX_OPERATION_LEN, MAX_PATH_LEN, MAX_PORT_FIELD_LEN,
    MAX_TIMESTAMP_LEN, MAX_USERNAME_LEN,
};

/// Handles one accepted connection end to end. Consumes the stream.
pub fn handle_connection(mut stream: TcpStream, directory: &Directory) {
    let operation = match read_field(&mut stream, MAX_OPERATION_LEN) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "failed to read operation header");
            return;
        }
    };
    let timestamp = match read_field(&mut stream, MAX_TIMESTAMP_LEN) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "failed to read timestamp header");
            return;
        }
    };
    let username = match read_field(&mut stream, MAX_USERNAME_LEN) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "failed to read username header");
            return;
        }
    };

    debug!(%operation, %username, "dispatching request");

    let Some(op) = Operation::parse(&operation) else {
        debug!(%operation, "unknown operation");
        log_event(AuditEvent {
            username: &username,
            operation: "UNKNOWN",
            timestamp: &timestamp,
            filename: "",
        });
        return;
    };

    let filename = match run_operation(op, &mut stream, directory, &username) {
        Ok(filename) => filename,
        Err(e) => {
            debug!(error = %e, "connection failed mid-reply, closing silently");
            return;
        }
    };

    log_event(AuditEvent {
        username: &username,
        operation: op.as_str(),
        timestamp: &timestamp,
        filename: &filename,
    });
}

/// Reads the operation-specific tail, performs the directory operation, and
/// writes the reply. Returns the filename to record in the audit event (the
/// empty string for operations with no associated path) or an I/O error if
/// the connection failed before the reply could be completed.
fn run_operation(
    op: Operation,
    stream: &mut TcpStream,
    directory: &Directory,
    username: &str,
) -> std::io::Result<String> {
    match op {
        Operation::Register => {
            write_status(stream, directory.register(username).code())?;
            Ok(String::new())
        }
        Operation::Unregister => {
            write_status(stream, directory.unregister(username).code())?;
            Ok(String::new())
        }
        Operation::Disconnect => {
            write_status(stream, directory.disconnect(username).code())?;
            Ok(String::new())
        }
        Operation::Connect => {
            let port_str = read_or_other(stream, MAX_PORT_FIELD_LEN)?;
            let ip = stream
                .peer_addr()
                .map(|a| a.ip().to_string())
                .unwrap_or_default();
            let port: u16 = port_str.trim().parse().unwrap_or(0);
            write_status(stream, directory.connect(username, &ip, port).code())?;
            Ok(String::new())
        }
        Operation::Publish => {
            let path = read_or_other(stream, MAX_PATH_LEN)?;
            let description = read_or_other(stream, MAX_DESCRIPTION_LEN)?;
            write_status(
                stream,
                directory.publish(username, &path, &description).code(),
            )?;
            Ok(path)
        }
        Operation::Delete => {
            let path = read_or_other(stream, MAX_PATH_LEN)?;
            write_status(stream, directory.delete(username, &path).code())?;
            Ok(path)
        }
        Operation::ListUsers => {
            let (status, peers) = directory.list_connected(username);
            write_status(stream, status.code())?;
            if status.code() == 0 {
                write_decimal(stream, peers.len() as u64)?;
                for peer in peers {
                    write_field(stream, &peer.name)?;
                    write_field(stream, &peer.ip)?;
                    write_decimal(stream, peer.port as u64)?;
                }
            }
            Ok(String::new())
        }
        Operation::ListContent => {
            let target = read_or_other(stream, MAX_USERNAME_LEN)?;
            let (status, paths) = directory.list_files(username, &target);
            write_status(stream, status.code())?;
            if status.code() == 0 {
                write_decimal(stream, paths.len() as u64)?;
                for path in &paths {
                    write_field(stream, path)?;
                }
            }
            Ok(target)
        }
        Operation::GetMultifile => {
            let path = read_or_other(stream, MAX_PATH_LEN)?;
            let (status, hits) = directory.get_multifile(username, &path);
            if status.code() != 0 {
                write_status(stream, status.code())?;
                return Ok(path);
            }
            if hits.is_empty() {
                // "no peers": resolves the source's ambiguous double-status-byte
                // path by writing exactly one status byte and stopping, per §9.
                write_status(stream, 1)?;
                return Ok(path);
            }
            write_status(stream, 0)?;
            let count = hits.len().min(MAX_MULTIFILE_MATCHES) as u8;
            stream.write_all(&[count])?;
            for hit in hits.into_iter().take(count as usize) {
                write_field(stream, &hit.ip)?;
                write_decimal(stream, hit.port as u64)?;
                write_field(stream, &hit.path)?;
            }
            Ok(basename(&path).to_string())
        }
    }
}

/// Reads a tail field, mapping any protocol error to an empty string so the
/// caller's directory operation can fall through to its generic "other"
/// status code rather than aborting the connection outright -- a
/// domain-level "this field was garbage" is still worth a status byte.
fn read_or_other(stream: &mut TcpStream, max: usize) -> std::io::Result<String> {
    match read_field(stream, max) {
        Ok(v) => Ok(v),
        Err(_) => Ok(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    fn serve_one(directory: &'static Directory) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            handle_connection(stream, directory);
        });
        addr
    }

    fn send_request(addr: std::net::SocketAddr, fields: &[&str]) -> Vec<u8> {
        let mut stream = TcpStream::connect(addr).unwrap();
        for field in fields {
            stream.write_all(field.as_bytes()).unwrap();
            stream.write_all(&[0]).unwrap();
        }
        stream.shutdown(std::net::Shutdown::Write).unwrap();
        let mut reply = Vec::new();
        std::io::Read::read_to_end(&mut stream, &mut reply).unwrap();
        reply
    }

    #[test]
    fn register_replies_with_a_single_status_byte() {
        let directory: &'static Directory = Box::leak(Box::new(Directory::new()));
        let addr = serve_one(directory);
        let reply = send_request(addr, &["REGISTER", "0", "alice"]);
        assert_eq!(reply, vec![0u8]);
    }

    #[test]
    fn duplicate_register_returns_name_exists() {
        let directory: &'static Directory = Box::leak(Box::new(Directory::new()));
        directory.register("alice");
        let addr = serve_one(directory);
        let reply = send_request(addr, &["REGISTER", "0", "alice"]);
        assert_eq!(reply, vec![1u8]);
    }

    #[test]
    fn list_users_replies_with_count_then_entries() {
        let directory: &'static Directory = Box::leak(Box::new(Directory::new()));
        directory.register("alice");
        directory.connect("alice", "10.0.0.1", 5000);
        let addr = serve_one(directory);
        let reply = send_request(addr, &["LIST_USERS", "0", "alice"]);

        let mut expected = vec![0u8];
        expected.extend_from_slice(b"1\0alice\010.0.0.1\05000\0");
        assert_eq!(reply, expected);
    }

    #[test]
    fn get_multifile_with_no_peers_replies_status_one_only() {
        let directory: &'static Directory = Box::leak(Box::new(Directory::new()));
        directory.register("alice");
        directory.connect("alice", "10.0.0.1", 5000);
        let addr = serve_one(directory);
        let reply = send_request(addr, &["GET_MULTIFILE", "0", "alice", "song.mp3"]);
        assert_eq!(reply, vec![1u8]);
    }

    #[test]
    fn unknown_operation_gets_no_reply_bytes() {
        let directory: &'static Directory = Box::leak(Box::new(Directory::new()));
        let addr = serve_one(directory);
        let reply = send_request(addr, &["PING", "0", "alice"]);
        assert!(reply.is_empty());
    }
}
