//! Byte-level framing for the directory's wire protocol (§6).
//!
//! Every textual field is a sequence of bytes terminated by either `\n` or
//! `\0`, read one byte at a time; the terminator is discarded. Replies are
//! written as exact-length buffers, including any trailing `\0`.
use std::io::{self, Read, Write};

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("connection closed before a complete field was read")]
    UnexpectedEof,
    #[error("field exceeded its {max} byte cap")]
    FieldTooLong { max: usize },
    #[error("i/o error while framing: {0}")]
    Io(#[from] io::Error),
}

/// Reads bytes one at a time until `\n`, `\0`, or EOF, discarding the
/// terminator. Returns [`ProtocolError::FieldTooLong`] if more than `max`
/// bytes arrive before a terminator, and [`ProtocolError::UnexpectedEof`] if
/// the stream closes before any byte is read.
pub fn read_field<R: Read>(r: &mut R, max: usize) -> Result<String, ProtocolError> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];

    loop {
        let n = r.read(&mut byte)?;
        if n == 0 {
            if buf.is_empty() {
                return Err(ProtocolError::UnexpectedEof);
            }
            break;
        }
        let ch = byte[0];
        if ch == b'\n' || ch == 0 {
            break;
        }
        if buf.len() >= max {
            return Err(ProtocolError::FieldTooLong { max });
        }
        buf.push(ch);
    }

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Writes the exact bytes given, with no extra framing. Used for the raw
/// status byte and for match-count bytes, which carry no terminator.
pub fn write_raw<W: Write>(w: &mut W, bytes: &[u8]) -> io::Result<()> {
    w.write_all(bytes)
}

/// Writes `value` followed by a trailing NUL, per §6 ("numeric fields inside
/// text payloads ... decimal ASCII followed by `\0`" and textual fields in
/// general).
pub fn write_field<W: Write>(w: &mut W, value: &str) -> io::Result<()> {
    w.write_all(value.as_bytes())?;
    w.write_all(&[0u8])
}

pub fn write_decimal<W: Write>(w: &mut W, value: u64) -> io::Result<()> {
    write_field(w, &value.to_string())
}

pub fn write_status<W: Write>(w: &mut W, status: u8) -> io::Result<()> {
    write_raw(w, &[status])
}
