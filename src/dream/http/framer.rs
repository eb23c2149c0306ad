//! Byte-level framing of HTTP/1.1 messages on a reusable connection.
//!
//! [`read_full_message`] returns exactly one message (request line or status
//! line, headers, and `content-length` bytes of body) and parks any bytes
//! it read beyond the message end in the caller's carry buffer, so the next
//! call on the same connection starts from them.

use crate::dream::error::{DreamError, Result};
use crate::dream::http::parser::find_crlf_crlf;
use std::io::{ErrorKind, Read};

const READ_CHUNK: usize = 4096;

/// Reads one complete HTTP message from `reader`.
///
/// `carry` holds read-ahead left over from a previous call on the same
/// connection; it is drained first and refilled with any surplus bytes
/// beyond this message's end.
///
/// Returns [`DreamError::ConnectionClosed`] when the peer closes (or the
/// idle deadline fires) before a single byte of a new message arrives, and
/// a framing error for everything else that prevents finding the message
/// boundary.
pub fn read_full_message<R: Read>(reader: &mut R, carry: &mut Vec<u8>) -> Result<Vec<u8>> {
    let mut buffer = std::mem::take(carry);
    let mut chunk = [0u8; READ_CHUNK];

    // Step 1: accumulate until the end of the header section.
    let header_end = loop {
        if let Some(pos) = find_crlf_crlf(&buffer) {
            break pos + 4;
        }
        match reader.read(&mut chunk) {
            Ok(0) => {
                if buffer.is_empty() {
                    return Err(DreamError::ConnectionClosed);
                }
                return Err(DreamError::Framing(
                    "connection closed before end of headers".to_string(),
                ));
            }
            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
            Err(err) if is_timeout(&err) => {
                if buffer.is_empty() {
                    return Err(DreamError::ConnectionClosed);
                }
                return Err(DreamError::Framing(
                    "timed out before end of headers".to_string(),
                ));
            }
            Err(err) => {
                return Err(DreamError::Framing(format!("socket read failed: {err}")));
            }
        }
    };

    // Step 2: the header section decides how much body follows.
    let framing = scan_framing_headers(&buffer[..header_end])?;
    let total = header_end + framing.content_length;

    // Step 3 and 4: drain the body, keeping any surplus for the next call.
    while buffer.len() < total {
        match reader.read(&mut chunk) {
            Ok(0) => {
                if framing.keep_alive {
                    break;
                }
                return Err(DreamError::Framing(
                    "connection closed mid-body".to_string(),
                ));
            }
            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
            Err(err) if is_timeout(&err) => {
                return Err(DreamError::Framing("timed out reading body".to_string()));
            }
            Err(err) => {
                return Err(DreamError::Framing(format!("socket read failed: {err}")));
            }
        }
    }

    if buffer.len() > total {
        carry.extend_from_slice(&buffer[total..]);
        buffer.truncate(total);
    }

    Ok(buffer)
}

struct FramingHeaders {
    content_length: usize,
    keep_alive: bool,
}

/// Pulls `content-length` and `connection` out of the raw header section.
/// Chunked transfer encoding is rejected outright.
fn scan_framing_headers(head: &[u8]) -> Result<FramingHeaders> {
    let mut framing = FramingHeaders {
        content_length: 0,
        keep_alive: false,
    };

    for line in String::from_utf8_lossy(head).split("\r\n") {
        let lower = line.trim().to_ascii_lowercase();

        if let Some(value) = lower.strip_prefix("content-length:") {
            framing.content_length = value.trim().parse().map_err(|_| {
                DreamError::Framing(format!("malformed content-length: {}", value.trim()))
            })?;
        } else if let Some(value) = lower.strip_prefix("connection:") {
            framing.keep_alive = value.trim() == "keep-alive";
        } else if let Some(value) = lower.strip_prefix("transfer-encoding:") {
            if value.contains("chunked") {
                return Err(DreamError::Framing(
                    "chunked transfer-encoding is not supported".to_string(),
                ));
            }
        }
    }

    Ok(framing)
}

fn is_timeout(err: &std::io::Error) -> bool {
    err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut
}
