//! HTTP/1.1 message types and serializers.
//!
//! [`HttpReq`] and [`HttpRes`] are plain owned values: headers live in a map
//! keyed by lower-cased name (last write wins, insertion order not kept) and
//! bodies are raw bytes. Parsing lives in [`parser`], framing in [`framer`],
//! and the origin-side client in [`client`].

pub mod client;
pub mod framer;
pub mod parser;

use chrono::Utc;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Value of the `server` header stamped on every response.
pub const SERVER_SIGNATURE: &str = "dreamserver/0.0.1 (Archlinux)";

/// Value of the `via` header stamped on every response.
pub const VIA_SIGNATURE: &str = "HTTP/1.1 dreamserver";

/// The HTTP request methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Options,
    Trace,
    Put,
    Delete,
    Post,
    Patch,
    Connect,
}

impl Method {
    /// Every method, in no particular order. Handy for table tests.
    pub const ALL: [Method; 9] = [
        Method::Get,
        Method::Head,
        Method::Options,
        Method::Trace,
        Method::Put,
        Method::Delete,
        Method::Post,
        Method::Patch,
        Method::Connect,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Connect => "CONNECT",
        }
    }
}

impl FromStr for Method {
    type Err = ();

    /// Matches the exact uppercase token; `get` is not a method on the wire.
    fn from_str(token: &str) -> Result<Method, ()> {
        match token {
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            "TRACE" => Ok(Method::Trace),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "POST" => Ok(Method::Post),
            "PATCH" => Ok(Method::Patch),
            "CONNECT" => Ok(Method::Connect),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The HTTP versions accepted on a request or status line.
///
/// `2` and `2.0` (and `3` / `3.0`) are distinct variants so a message
/// round-trips with the exact version string it arrived with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Version {
    V0_9,
    V1_0,
    V1_1,
    V2,
    V2_0,
    V3,
    V3_0,
}

impl Version {
    pub fn as_str(&self) -> &'static str {
        match self {
            Version::V0_9 => "0.9",
            Version::V1_0 => "1.0",
            Version::V1_1 => "1.1",
            Version::V2 => "2",
            Version::V2_0 => "2.0",
            Version::V3 => "3",
            Version::V3_0 => "3.0",
        }
    }
}

impl FromStr for Version {
    type Err = ();

    fn from_str(number: &str) -> Result<Version, ()> {
        match number {
            "0.9" => Ok(Version::V0_9),
            "1.0" => Ok(Version::V1_0),
            "1.1" => Ok(Version::V1_1),
            "2" => Ok(Version::V2),
            "2.0" => Ok(Version::V2_0),
            "3" => Ok(Version::V3),
            "3.0" => Ok(Version::V3_0),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP status code with a companion reason-phrase table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub const OK: StatusCode = StatusCode(200);
    pub const CREATED: StatusCode = StatusCode(201);
    pub const ACCEPTED: StatusCode = StatusCode(202);
    pub const NO_CONTENT: StatusCode = StatusCode(204);
    pub const MOVED_PERMANENTLY: StatusCode = StatusCode(301);
    pub const FOUND: StatusCode = StatusCode(302);
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const UNAUTHORIZED: StatusCode = StatusCode(401);
    pub const FORBIDDEN: StatusCode = StatusCode(403);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const METHOD_NOT_ALLOWED: StatusCode = StatusCode(405);
    pub const CONFLICT: StatusCode = StatusCode(409);
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);
    pub const NOT_IMPLEMENTED: StatusCode = StatusCode(501);
    pub const BAD_GATEWAY: StatusCode = StatusCode(502);
    pub const SERVICE_UNAVAILABLE: StatusCode = StatusCode(503);

    pub fn as_u16(self) -> u16 {
        self.0
    }

    /// The standard reason phrase, or `"Unknown Status"` for codes outside
    /// the table.
    pub fn reason(self) -> &'static str {
        match self.0 {
            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            204 => "No Content",
            301 => "Moved Permanently",
            302 => "Found",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            409 => "Conflict",
            500 => "Internal Server Error",
            501 => "Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            _ => "Unknown Status",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A parsed HTTP request.
#[derive(Clone, Debug, PartialEq)]
pub struct HttpReq {
    /// Always `"http"`; the core never terminates TLS.
    pub scheme: String,
    pub method: Method,
    /// The request-target as it appeared on the wire, query included.
    pub target: String,
    pub version: Version,
    /// Lower-cased names, last write wins.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpReq {
    pub fn new(method: Method, target: &str) -> HttpReq {
        HttpReq {
            scheme: "http".to_string(),
            method,
            target: target.to_string(),
            version: Version::V1_1,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    /// Serializes the request into wire bytes.
    ///
    /// When the body is non-empty, the emitted `content-length` always
    /// matches the body length, whatever the header map says.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = String::with_capacity(256);
        head.push_str(self.method.as_str());
        head.push(' ');
        head.push_str(&self.target);
        head.push_str(" HTTP/");
        head.push_str(self.version.as_str());
        head.push_str("\r\n");

        write_headers(&mut head, &self.headers, self.body.len());

        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

/// A parsed or synthesized HTTP response.
#[derive(Clone, Debug, PartialEq)]
pub struct HttpRes {
    pub version: Version,
    pub status: StatusCode,
    /// Lower-cased names, last write wins.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpRes {
    pub fn new(status: StatusCode) -> HttpRes {
        HttpRes {
            version: Version::V1_1,
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    /// Shorthand for the synthetic reply sent on every malformed request.
    pub fn bad_request() -> HttpRes {
        HttpRes::new(StatusCode::BAD_REQUEST)
    }

    /// Replaces the body and records its length in `content-length`.
    pub fn set_body(&mut self, body: Vec<u8>) {
        self.headers
            .insert("content-length".to_string(), body.len().to_string());
        self.body = body;
    }

    /// Stamps the headers every outgoing response carries: `server`, `via`
    /// and an RFC 1123 UTC `date`.
    pub fn set_server_headers(&mut self) {
        let now = Utc::now();
        self.headers
            .insert("server".to_string(), SERVER_SIGNATURE.to_string());
        self.headers
            .insert("via".to_string(), VIA_SIGNATURE.to_string());
        self.headers.insert(
            "date".to_string(),
            now.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        );
    }

    /// Serializes the response into wire bytes.
    ///
    /// The reason phrase comes from the status table; the `content-length`
    /// of a non-empty body is always the body length.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = String::with_capacity(256);
        head.push_str("HTTP/");
        head.push_str(self.version.as_str());
        head.push(' ');
        head.push_str(&self.status.as_u16().to_string());
        head.push(' ');
        head.push_str(self.status.reason());
        head.push_str("\r\n");

        write_headers(&mut head, &self.headers, self.body.len());

        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

fn write_headers(head: &mut String, headers: &HashMap<String, String>, body_len: usize) {
    for (name, value) in headers {
        if name == "content-length" && body_len > 0 {
            continue;
        }
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }
    if body_len > 0 {
        head.push_str("content-length: ");
        head.push_str(&body_len.to_string());
        head.push_str("\r\n");
    }
    head.push_str("\r\n");
}
