//! Turns raw bytes into typed requests and responses.
//!
//! Both parsers are total: any byte string either becomes a well-formed
//! message or a typed error, and bodies are carried through untouched as
//! raw bytes.

use crate::dream::error::{DreamError, ParseErrorKind, Result};
use crate::dream::http::{HttpReq, HttpRes, Method, StatusCode, Version};
use std::collections::HashMap;

/// Parses one complete request from raw bytes.
pub fn parse_raw_http_req(raw: &[u8]) -> Result<HttpReq> {
    let (line, rest) = split_first_line(raw)?;
    let (method, target, version) = parse_request_line(line)?;
    let (headers, body) = split_headers_and_body(rest);

    Ok(HttpReq {
        scheme: "http".to_string(),
        method,
        target,
        version,
        headers,
        body,
    })
}

/// Parses one complete response from raw bytes.
pub fn parse_raw_http_res(raw: &[u8]) -> Result<HttpRes> {
    let (line, rest) = split_first_line(raw)?;
    let (version, status) = parse_status_line(line)?;
    let (headers, body) = split_headers_and_body(rest);

    Ok(HttpRes {
        version,
        status,
        headers,
        body,
    })
}

/// Parses a header block: one `name: value` pair per CRLF-separated line,
/// names lower-cased, values trimmed. Lines without a colon are dropped and
/// a duplicated name keeps its last value.
pub fn parse_header_block(block: &str) -> HashMap<String, String> {
    let mut headers = HashMap::new();

    for line in block.split("\r\n") {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
    }

    headers
}

fn split_first_line(raw: &[u8]) -> Result<(&str, &[u8])> {
    let (line_bytes, rest) = match find_crlf(raw) {
        Some(pos) => (&raw[..pos], &raw[pos + 2..]),
        None => (raw, &raw[raw.len()..]),
    };

    let line = std::str::from_utf8(line_bytes).map_err(|_| {
        DreamError::Parse(
            ParseErrorKind::InvalidRequestLine,
            "first line is not valid UTF-8".to_string(),
        )
    })?;

    Ok((line, rest))
}

fn parse_request_line(line: &str) -> Result<(Method, String, Version)> {
    let parts: Vec<&str> = line.split_whitespace().collect();

    if line.is_empty() {
        return Err(DreamError::Parse(
            ParseErrorKind::InvalidRequestLine,
            "empty request".to_string(),
        ));
    }

    if parts.len() != 3 {
        return Err(DreamError::Parse(
            ParseErrorKind::InvalidRequestLine,
            format!("expected 3 portions, got {}", parts.len()),
        ));
    }

    let method: Method = parts[0].parse().map_err(|()| {
        DreamError::Parse(ParseErrorKind::InvalidMethod, parts[0].to_string())
    })?;

    let target = parts[1];
    if !is_valid_target(method, target) {
        return Err(DreamError::Parse(
            ParseErrorKind::InvalidTarget,
            target.to_string(),
        ));
    }

    let version = parse_version(parts[2])?;

    Ok((method, target.to_string(), version))
}

fn parse_status_line(line: &str) -> Result<(Version, StatusCode)> {
    // The reason phrase is whatever follows the second space; it is not
    // required and not validated.
    let mut portions = line.splitn(3, ' ');
    let version_portion = portions.next().unwrap_or("");
    let code_portion = portions.next().unwrap_or("");

    let version = parse_version(version_portion)?;

    let code: u16 = code_portion.parse().map_err(|_| {
        DreamError::Parse(ParseErrorKind::InvalidStatusCode, code_portion.to_string())
    })?;

    Ok((version, StatusCode(code)))
}

fn parse_version(portion: &str) -> Result<Version> {
    let number = portion.strip_prefix("HTTP/").ok_or_else(|| {
        DreamError::Parse(ParseErrorKind::InvalidVersion, portion.to_string())
    })?;

    number.parse().map_err(|()| {
        DreamError::Parse(ParseErrorKind::InvalidVersion, number.to_string())
    })
}

/// Checks the target against the four request-target forms: origin-form,
/// absolute-form, authority-form (CONNECT only) and asterisk-form
/// (OPTIONS only).
fn is_valid_target(method: Method, target: &str) -> bool {
    if target.starts_with('/') {
        return true;
    }
    if target.starts_with("http://") || target.starts_with("https://") {
        return true;
    }
    if target == "*" {
        return method == Method::Options;
    }
    method == Method::Connect && target.contains(':') && !target.contains('/')
}

fn split_headers_and_body(rest: &[u8]) -> (HashMap<String, String>, Vec<u8>) {
    let (header_bytes, body) = match find_crlf_crlf(rest) {
        Some(pos) => (&rest[..pos], rest[pos + 4..].to_vec()),
        None => (rest, Vec::new()),
    };

    let headers = parse_header_block(&String::from_utf8_lossy(header_bytes));
    (headers, body)
}

fn find_crlf(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|window| window == b"\r\n")
}

/// Returns the index of the first `\r\n\r\n`, marking the end of headers.
pub fn find_crlf_crlf(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|window| window == b"\r\n\r\n")
}
