//! Error kinds shared across the crate.
//!
//! Every fallible operation in the request pipeline returns [`DreamError`].
//! The session layer is the only place where errors are converted into
//! synthetic responses; everything below it just propagates with `?`.

use std::fmt;
use std::io;

/// The specific protocol violation found while parsing an HTTP message.
///
/// Kept separate from [`DreamError`] so the session can log precisely which
/// part of the message was malformed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The request line did not split into method, target and version.
    InvalidRequestLine,
    /// The method token is not one of the known HTTP methods.
    InvalidMethod,
    /// The request-target matches none of the four target forms.
    InvalidTarget,
    /// The version is not `HTTP/` followed by a known version number.
    InvalidVersion,
    /// The status line of a response carries a non-numeric status code.
    InvalidStatusCode,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ParseErrorKind::InvalidRequestLine => "invalid request line",
            ParseErrorKind::InvalidMethod => "invalid HTTP method",
            ParseErrorKind::InvalidTarget => "invalid HTTP target",
            ParseErrorKind::InvalidVersion => "invalid HTTP version",
            ParseErrorKind::InvalidStatusCode => "invalid HTTP status code",
        };
        f.write_str(text)
    }
}

/// Errors that can kill off a request, a connection, or the whole process.
#[derive(Debug)]
pub enum DreamError {
    /// The peer went away between requests. The one error that is never
    /// reported back to the client.
    ConnectionClosed,
    /// The Dreamfile could not be parsed. Fatal at startup. A `line` of 0
    /// means the error is not tied to a position in the file.
    ConfigParse { line: usize, message: String },
    /// The byte stream could not be framed into one complete message.
    Framing(String),
    /// The framed bytes are not a well-formed HTTP message.
    Parse(ParseErrorKind, String),
    /// Connecting to, writing to, or reading from an origin failed.
    Upstream(String),
    /// A file the router needed could not be opened or read.
    Filesystem(io::Error),
    /// The router could not produce a response for the request.
    Routing(String),
    /// Any other I/O failure, typically on listener setup.
    Io(io::Error),
}

impl fmt::Display for DreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DreamError::ConnectionClosed => write!(f, "connection closed by peer"),
            DreamError::ConfigParse { line: 0, message } => {
                write!(f, "config error: {message}")
            }
            DreamError::ConfigParse { line, message } => {
                write!(f, "config error at line {line}: {message}")
            }
            DreamError::Framing(message) => write!(f, "framing error: {message}"),
            DreamError::Parse(kind, detail) if detail.is_empty() => write!(f, "{kind}"),
            DreamError::Parse(kind, detail) => write!(f, "{kind}: {detail}"),
            DreamError::Upstream(message) => write!(f, "upstream error: {message}"),
            DreamError::Filesystem(err) => write!(f, "filesystem error: {err}"),
            DreamError::Routing(message) => write!(f, "routing error: {message}"),
            DreamError::Io(err) => write!(f, "i/o error: {err}"),
        }
    }
}

impl std::error::Error for DreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DreamError::Filesystem(err) | DreamError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for DreamError {
    fn from(err: io::Error) -> DreamError {
        DreamError::Io(err)
    }
}

/// Alias for a Result in DreamError.
pub type Result<T> = std::result::Result<T, DreamError>;
