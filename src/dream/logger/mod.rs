//! Console logger and structured request records.
//!
//! Two layers live here. [`Logger`] is the process-wide `log::Log` sink with
//! colored console output, installed once from `main`. [`RequestLog`] is the
//! structured record the session emits for every request cycle; it renders
//! to a single-line text form (the default) or to JSON.

use chrono::{SecondsFormat, Utc};
use log::{Level, Metadata, Record};
use serde_json::json;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// ANSI color code for red text.
const RED: &str = "\x1b[31m";

/// ANSI color code for yellow text.
const YELLOW: &str = "\x1b[33m";

/// ANSI color code for blue text.
const BLUE: &str = "\x1b[34m";

/// ANSI color code for green text.
const GREEN: &str = "\x1b[32m";

/// ANSI color code for dimmed text.
const DIM: &str = "\x1b[2m";

/// ANSI color code to reset text formatting.
const RESET: &str = "\x1b[0m";

/// A logger with colored console output based on log level.
///
/// Implements the `log::Log` trait so the standard `log` macros work
/// everywhere in the crate once the logger is installed:
///
/// ```no_run
/// log::set_logger(&dreamserver::DREAM_LOGGER).unwrap();
/// log::set_max_level(log::LevelFilter::Info);
/// log::info!("this will appear in blue");
/// ```
pub struct Logger;

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            match record.level() {
                Level::Error => println!("{}[ERROR] - {}{}", RED, record.args(), RESET),
                Level::Trace => println!("{}[TRACE] - {}{}", DIM, record.args(), RESET),
                Level::Warn => println!("{}[WARN ]{} - {}", YELLOW, RESET, record.args()),
                Level::Info => println!("{}[INFO ]{} - {}", BLUE, RESET, record.args()),
                Level::Debug => println!("{}[DEBUG]{} - {}", GREEN, RESET, record.args()),
            }
        }
    }

    fn flush(&self) {}
}

/// Severity attached to a [`RequestLog`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Debug,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

/// What happened during the request cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogEvent {
    /// A request was served.
    Request,
    /// The router rejected the request.
    BadRequest,
    /// The framed bytes were not a valid HTTP message.
    ReqParseError,
    /// The connection produced no complete message.
    ReqReadingError,
}

impl LogEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogEvent::Request => "REQUEST",
            LogEvent::BadRequest => "BAD_REQUEST",
            LogEvent::ReqParseError => "REQ_PARSE_ERROR",
            LogEvent::ReqReadingError => "REQ_READING_ERROR",
        }
    }
}

/// The component that produced the record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Service {
    DreamServer,
    HttpParser,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::DreamServer => "DREAM_SERVER",
            Service::HttpParser => "HTTP_PARSER",
        }
    }
}

/// Request-side summary nested in a [`RequestLog`].
#[derive(Clone, Debug, Default)]
pub struct RequestSummary {
    pub id: String,
    pub method: String,
    pub host: String,
    pub path: String,
    pub query: String,
    pub client_ip: String,
    pub user_agent: String,
}

/// Response-side summary nested in a [`RequestLog`].
#[derive(Clone, Debug, Default)]
pub struct ResponseSummary {
    pub status_code: u16,
    pub bytes_sent: u64,
    pub latency_ms: u64,
}

/// Upstream trace summary nested in a [`RequestLog`].
#[derive(Clone, Debug, Default)]
pub struct TraceSummary {
    pub correlation_id: String,
    pub upstream_ip: String,
    pub upstream_latency_ms: u64,
}

/// One structured record per request cycle.
#[derive(Clone, Debug)]
pub struct RequestLog {
    pub timestamp: String,
    pub level: LogLevel,
    pub service: Service,
    pub event: LogEvent,
    pub message: String,
    pub request: RequestSummary,
    pub response: ResponseSummary,
    pub trace: TraceSummary,
}

impl RequestLog {
    /// Creates a record stamped with the current UTC time.
    pub fn new(service: Service, level: LogLevel, event: LogEvent, message: &str) -> RequestLog {
        RequestLog {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            level,
            service,
            event,
            message: message.to_string(),
            request: RequestSummary::default(),
            response: ResponseSummary::default(),
            trace: TraceSummary::default(),
        }
    }

    /// Renders the single-line text form. This is the default sink format.
    pub fn to_text(&self) -> String {
        format!(
            "[{}][{}][{}] {} -> \"{} {}{}\" {} {}B {}ms: {}",
            self.timestamp,
            self.service.as_str(),
            self.level.as_str(),
            self.request.client_ip,
            self.request.method,
            self.request.host,
            self.request.path,
            self.response.status_code,
            self.response.bytes_sent,
            self.response.latency_ms,
            self.message,
        )
    }

    /// Renders the record as a JSON object.
    pub fn to_json(&self) -> String {
        json!({
            "timestamp": self.timestamp,
            "level": self.level.as_str(),
            "service": self.service.as_str(),
            "event": self.event.as_str(),
            "message": self.message,
            "request": {
                "id": self.request.id,
                "method": self.request.method,
                "host": self.request.host,
                "path": self.request.path,
                "query": self.request.query,
                "client_ip": self.request.client_ip,
                "user_agent": self.request.user_agent,
            },
            "response": {
                "status_code": self.response.status_code,
                "bytes_sent": self.response.bytes_sent,
                "latency_ms": self.response.latency_ms,
            },
            "trace": {
                "correlation_id": self.trace.correlation_id,
                "upstream_ip": self.trace.upstream_ip,
                "upstream_latency_ms": self.trace.upstream_latency_ms,
            },
        })
        .to_string()
    }
}

/// Appends one text-form record to a per-server access log file.
///
/// Failures are reported through the console logger and otherwise ignored;
/// a broken access log must not take down the request path.
pub fn append_access_log(path: &str, record: &RequestLog) {
    let result = OpenOptions::new()
        .create(true)
        .append(true)
        .open(Path::new(path))
        .and_then(|mut file| writeln!(file, "{}", record.to_text()));

    if let Err(err) = result {
        log::warn!("failed to write access log {path}: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RequestLog {
        let mut record = RequestLog::new(
            Service::DreamServer,
            LogLevel::Info,
            LogEvent::Request,
            "",
        );
        record.request.method = "GET".to_string();
        record.request.host = "example.com".to_string();
        record.request.path = "/index.html".to_string();
        record.request.client_ip = "10.0.0.1:4242".to_string();
        record.response.status_code = 200;
        record.response.bytes_sent = 5;
        record.response.latency_ms = 3;
        record
    }

    #[test]
    fn text_form_shape() {
        let text = sample().to_text();
        assert!(text.contains("[DREAM_SERVER][INFO]"));
        assert!(text.contains("10.0.0.1:4242 -> \"GET example.com/index.html\" 200 5B 3ms:"));
    }

    #[test]
    fn json_form_is_valid() {
        let parsed: serde_json::Value = serde_json::from_str(&sample().to_json()).unwrap();
        assert_eq!(parsed["request"]["method"], "GET");
        assert_eq!(parsed["response"]["status_code"], 200);
        assert_eq!(parsed["event"], "REQUEST");
    }

    #[test]
    fn access_log_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.log");
        let path_str = path.to_str().unwrap();

        append_access_log(path_str, &sample());
        append_access_log(path_str, &sample());

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
