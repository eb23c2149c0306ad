//! One accepted connection, from first byte to close.
//!
//! A session owns its `TcpStream` and loops frame, parse, route, respond
//! until the response says `connection: close`, the peer goes away, or an
//! error forces a synthetic 400. The stream is closed on every exit path
//! by dropping the session.

use crate::dream::config::Server;
use crate::dream::error::DreamError;
use crate::dream::http::framer::read_full_message;
use crate::dream::http::parser::parse_raw_http_req;
use crate::dream::http::{HttpReq, HttpRes, Version};
use crate::dream::logger::{self, LogEvent, LogLevel, RequestLog, Service};
use crate::dream::router;
use std::io::Write;
use std::net::TcpStream;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Idle read deadline; a quiet keep-alive connection is dropped after this.
const IDLE_READ_TIMEOUT: Duration = Duration::from_secs(60);

pub struct ClientSession {
    remote_addr: String,
    remote_port: String,
    stream: TcpStream,
}

impl ClientSession {
    pub fn new(stream: TcpStream) -> ClientSession {
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_default();

        let (remote_addr, remote_port) = match peer.rsplit_once(':') {
            Some((addr, port)) => (addr.to_string(), port.to_string()),
            None => (peer, String::new()),
        };

        ClientSession {
            remote_addr,
            remote_port,
            stream,
        }
    }

    /// Serves requests on this connection until it is done.
    pub fn handle_connection(mut self, servers: &[Server]) {
        let _ = self.stream.set_read_timeout(Some(IDLE_READ_TIMEOUT));
        let mut carry = Vec::new();

        loop {
            let started = Instant::now();

            let raw = match read_full_message(&mut self.stream, &mut carry) {
                Ok(raw) => raw,
                Err(DreamError::ConnectionClosed) => return,
                Err(err) => {
                    self.reject(LogEvent::ReqReadingError, None, &err);
                    return;
                }
            };

            let mut req = match parse_raw_http_req(&raw) {
                Ok(req) => req,
                Err(err) => {
                    self.reject(LogEvent::ReqParseError, None, &err);
                    return;
                }
            };

            req.headers
                .insert("x-forwarded-for".to_string(), self.peer());

            let mut res = match router::handle_request(&req, servers) {
                Ok(res) => res,
                Err(err) => {
                    self.reject(LogEvent::BadRequest, Some(&req), &err);
                    return;
                }
            };

            res.version = Version::V1_1;
            res.set_server_headers();

            let bytes = res.to_bytes();
            let latency = started.elapsed();
            let _ = self.stream.write_all(&bytes);
            let _ = self.stream.flush();

            self.log_request(&req, &res, latency, servers);

            let close = res
                .headers
                .get("connection")
                .is_some_and(|value| value.to_ascii_lowercase() == "close");
            if close {
                return;
            }
        }
    }

    fn peer(&self) -> String {
        if self.remote_port.is_empty() {
            self.remote_addr.clone()
        } else {
            format!("{}:{}", self.remote_addr, self.remote_port)
        }
    }

    fn log_request(
        &self,
        req: &HttpReq,
        res: &HttpRes,
        latency: Duration,
        servers: &[Server],
    ) {
        let host = req.headers.get("host").cloned().unwrap_or_default();

        let mut record = RequestLog::new(Service::DreamServer, LogLevel::Info, LogEvent::Request, "");
        record.request.id = Uuid::new_v4().to_string();
        record.request.method = req.method.to_string();
        record.request.host = host.clone();
        record.request.path = req.target.clone();
        record.request.query = req
            .target
            .split_once('?')
            .map(|(_, query)| query.to_string())
            .unwrap_or_default();
        record.request.client_ip = self.peer();
        record.request.user_agent = req.headers.get("user-agent").cloned().unwrap_or_default();
        record.response.status_code = res.status.as_u16();
        record.response.bytes_sent = res.body.len() as u64;
        record.response.latency_ms = latency.as_millis() as u64;

        log::info!("{}", record.to_text());

        if let Some(server) = router::match_server(&host, servers) {
            if let Some(path) = &server.access_log {
                logger::append_access_log(path, &record);
            }
        }
    }

    /// Answers a broken request cycle with a 400 and records why.
    fn reject(&mut self, event: LogEvent, req: Option<&HttpReq>, err: &DreamError) {
        let mut res = HttpRes::bad_request();
        res.version = Version::V1_1;
        res.set_server_headers();
        let _ = self.stream.write_all(&res.to_bytes());
        let _ = self.stream.flush();

        let mut record =
            RequestLog::new(Service::DreamServer, LogLevel::Error, event, &err.to_string());
        record.request.client_ip = self.peer();
        record.response.status_code = res.status.as_u16();
        if let Some(req) = req {
            record.request.id = Uuid::new_v4().to_string();
            record.request.method = req.method.to_string();
            record.request.path = req.target.clone();
            record.request.host = req.headers.get("host").cloned().unwrap_or_default();
        }

        log::error!("{}", record.to_text());
    }
}
