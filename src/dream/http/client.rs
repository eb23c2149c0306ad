//! One-shot HTTP client for talking to origin servers.
//!
//! Every request opens a fresh TCP connection, writes one serialized
//! request, reads one framed response and closes. There is no pooling and
//! no retry. Plain `http` origins use a bare [`TcpStream`]; `https` origins
//! are wrapped in rustls with the native root store.

use crate::dream::error::{DreamError, Result};
use crate::dream::http::framer::read_full_message;
use crate::dream::http::parser::parse_raw_http_res;
use crate::dream::http::{HttpReq, HttpRes, Method, Version};
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};
use rustls_native_certs::load_native_certs;
use rustls_pki_types::ServerName;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Read/write deadline on origin sockets.
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(5);

/// Caller-supplied pieces of an origin request.
#[derive(Clone, Debug, Default)]
pub struct RequestConfig {
    /// Extra query pairs appended to the path. Query strings already on the
    /// path are preserved verbatim.
    pub query: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

/// Performs one plaintext request against `host:port` and returns the
/// parsed response.
///
/// The method token is upper-cased before validation, a `host` header is
/// added when the caller did not supply one, and the path is sent as given.
pub fn make_request(
    method: &str,
    host: &str,
    port: u16,
    path: &str,
    cfg: RequestConfig,
) -> Result<HttpRes> {
    let req = build_request(method, host, path, cfg)?;

    let stream = TcpStream::connect((host, port)).map_err(|err| {
        DreamError::Upstream(format!("connect to {host}:{port} failed: {err}"))
    })?;
    let _ = stream.set_read_timeout(Some(UPSTREAM_TIMEOUT));
    let _ = stream.set_write_timeout(Some(UPSTREAM_TIMEOUT));

    exchange(stream, &req)
}

/// Like [`make_request`], with the connection wrapped in TLS.
///
/// The client config is built once per process from the native root store.
pub fn make_secure_request(
    method: &str,
    host: &str,
    port: u16,
    path: &str,
    cfg: RequestConfig,
) -> Result<HttpRes> {
    static TLS_CONFIG: OnceLock<Arc<ClientConfig>> = OnceLock::new();

    let config = TLS_CONFIG.get_or_init(|| {
        let mut root_store = RootCertStore::empty();
        for cert in load_native_certs().certs {
            let _ = root_store.add(cert);
        }
        Arc::new(
            ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth(),
        )
    });

    let req = build_request(method, host, path, cfg)?;

    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| DreamError::Upstream(format!("invalid origin server name: {host}")))?;
    let conn = ClientConnection::new(Arc::clone(config), server_name)
        .map_err(|err| DreamError::Upstream(format!("TLS setup for {host} failed: {err}")))?;

    let stream = TcpStream::connect((host, port)).map_err(|err| {
        DreamError::Upstream(format!("connect to {host}:{port} failed: {err}"))
    })?;
    let _ = stream.set_read_timeout(Some(UPSTREAM_TIMEOUT));
    let _ = stream.set_write_timeout(Some(UPSTREAM_TIMEOUT));

    exchange(StreamOwned::new(conn, stream), &req)
}

pub fn get(host: &str, port: u16, path: &str, cfg: RequestConfig) -> Result<HttpRes> {
    make_request("GET", host, port, path, cfg)
}

pub fn post(host: &str, port: u16, path: &str, cfg: RequestConfig) -> Result<HttpRes> {
    make_request("POST", host, port, path, cfg)
}

pub fn put(host: &str, port: u16, path: &str, cfg: RequestConfig) -> Result<HttpRes> {
    make_request("PUT", host, port, path, cfg)
}

pub fn patch(host: &str, port: u16, path: &str, cfg: RequestConfig) -> Result<HttpRes> {
    make_request("PATCH", host, port, path, cfg)
}

pub fn delete(host: &str, port: u16, path: &str, cfg: RequestConfig) -> Result<HttpRes> {
    make_request("DELETE", host, port, path, cfg)
}

pub fn head(host: &str, port: u16, path: &str, cfg: RequestConfig) -> Result<HttpRes> {
    make_request("HEAD", host, port, path, cfg)
}

pub fn options(host: &str, port: u16, path: &str, cfg: RequestConfig) -> Result<HttpRes> {
    make_request("OPTIONS", host, port, path, cfg)
}

fn build_request(method: &str, host: &str, path: &str, cfg: RequestConfig) -> Result<HttpReq> {
    let method: Method = method
        .to_ascii_uppercase()
        .parse()
        .map_err(|()| DreamError::Upstream(format!("invalid method for origin: {method}")))?;

    let mut headers = cfg.headers;
    if headers.get("host").is_none_or(|h| h.is_empty()) {
        headers.insert("host".to_string(), host.to_string());
    }

    let mut target = path.to_string();
    if !cfg.query.is_empty() {
        let mut separator = if target.contains('?') { '&' } else { '?' };
        for (key, value) in &cfg.query {
            target.push(separator);
            target.push_str(key);
            target.push('=');
            target.push_str(value);
            separator = '&';
        }
    }

    Ok(HttpReq {
        scheme: "http".to_string(),
        method,
        target,
        version: Version::V1_1,
        headers,
        body: cfg.body,
    })
}

fn exchange<S: Read + Write>(mut stream: S, req: &HttpReq) -> Result<HttpRes> {
    write_in_full(&mut stream, &req.to_bytes())?;

    let mut carry = Vec::new();
    let raw = read_full_message(&mut stream, &mut carry)
        .map_err(|err| DreamError::Upstream(format!("reading origin response: {err}")))?;

    parse_raw_http_res(&raw)
        .map_err(|err| DreamError::Upstream(format!("parsing origin response: {err}")))
}

fn write_in_full<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<()> {
    let mut written = 0;
    while written < bytes.len() {
        match writer.write(&bytes[written..]) {
            Ok(0) => {
                return Err(DreamError::Upstream(
                    "origin stopped accepting bytes".to_string(),
                ));
            }
            Ok(n) => written += n,
            Err(err) => {
                return Err(DreamError::Upstream(format!("write to origin failed: {err}")));
            }
        }
    }
    writer
        .flush()
        .map_err(|err| DreamError::Upstream(format!("flush to origin failed: {err}")))
}
