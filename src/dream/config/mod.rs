//! The Dreamfile configuration model.
//!
//! A config is a flat list of virtual servers, each with a listen port, the
//! hosts it answers for, and an ordered list of locations. It is built once
//! at startup and never mutated; listener groups are derived from it by
//! port.

pub mod lexer;
pub mod parser;

use crate::dream::error::{DreamError, Result};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;

/// The parsed configuration: every `server` block in declaration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Config {
    pub servers: Vec<Server>,
}

impl Config {
    /// Groups servers by listen port, one group per listener to bind.
    ///
    /// The map is ordered so startup binds ports deterministically.
    pub fn group_by_port(&self) -> BTreeMap<u16, Vec<Server>> {
        let mut groups: BTreeMap<u16, Vec<Server>> = BTreeMap::new();
        for server in &self.servers {
            groups
                .entry(server.listen.port)
                .or_default()
                .push(server.clone());
        }
        groups
    }
}

/// One virtual server, selected by the request's host header.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Server {
    /// Primary host name.
    pub name: String,
    /// Additional host names that select this server (equal match only).
    pub hosts: Vec<String>,
    pub listen: Listen,
    pub access_log: Option<String>,
    pub ssl: Option<SslConfig>,
    /// Locations in declaration order.
    pub locations: Vec<Location>,
}

/// Where a server listens.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Listen {
    pub port: u16,
    pub ssl: bool,
}

/// Paths to the PEM certificate chain and private key of an `ssl` block.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SslConfig {
    pub certificate: String,
    pub certificate_key: String,
}

impl SslConfig {
    /// Builds a rustls server config from the PEM files, validating the
    /// material. Sessions still speak plaintext.
    //
    // TODO: hand this config to ClientSession once TLS termination lands.
    pub fn load(&self) -> Result<Arc<rustls::ServerConfig>> {
        let certs = CertificateDer::pem_file_iter(&self.certificate)
            .map_err(|err| {
                startup_error(format!("cannot read certificate {}: {err}", self.certificate))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|err| {
                startup_error(format!("invalid certificate {}: {err}", self.certificate))
            })?;

        if certs.is_empty() {
            return Err(startup_error(format!(
                "no certificates found in {}",
                self.certificate
            )));
        }

        let key = PrivateKeyDer::from_pem_file(&self.certificate_key).map_err(|err| {
            startup_error(format!(
                "cannot read private key {}: {err}",
                self.certificate_key
            ))
        })?;

        let tls = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(|err| startup_error(format!("invalid TLS material: {err}")))?;

        Ok(Arc::new(tls))
    }
}

/// A path-prefix rule inside a server.
#[derive(Clone, Debug, PartialEq)]
pub struct Location {
    /// URL-path prefix this location answers for.
    pub path: String,
    pub kind: LocationKind,
}

/// What a matched location does with the request. Exactly one of the two,
/// decided at parse time.
#[derive(Clone, Debug, PartialEq)]
pub enum LocationKind {
    /// Serve files from a filesystem root.
    Static { root: String },
    /// Forward the request to an upstream origin.
    Proxy { origin: Origin },
}

/// Transport scheme of an origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

/// An upstream origin, pre-parsed from a `proxy_pass` URL.
#[derive(Clone, Debug, PartialEq)]
pub struct Origin {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
}

impl Origin {
    /// Splits a `proxy_pass` URL into scheme, host and port. Any path on
    /// the URL is ignored; the router forwards the request's own path.
    pub fn parse(url: &str) -> std::result::Result<Origin, String> {
        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| format!("proxy_pass URL has no scheme: {url}"))?;

        let scheme = match scheme.to_ascii_lowercase().as_str() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => return Err(format!("unsupported proxy_pass scheme: {other}")),
        };

        let host_port = rest.split('/').next().unwrap_or(rest);
        let (host, port) = match host_port.split_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| format!("invalid proxy_pass port: {port}"))?;
                (host, port)
            }
            None => (host_port, scheme.default_port()),
        };

        if host.is_empty() {
            return Err(format!("proxy_pass URL has no host: {url}"));
        }

        Ok(Origin {
            scheme,
            host: host.to_string(),
            port,
        })
    }
}

/// Reads and parses the Dreamfile at `path`. Fatal on any error.
pub fn load_dream_file(path: &str) -> Result<Config> {
    let input = fs::read_to_string(path)
        .map_err(|err| startup_error(format!("cannot read {path}: {err}")))?;
    parse_config_str(&input)
}

/// Parses configuration text, for callers that already hold the bytes.
pub fn parse_config_str(input: &str) -> Result<Config> {
    let tokens = lexer::Lexer::new(input).tokenize();
    parser::Parser::new(tokens).parse_config()
}

fn startup_error(message: String) -> DreamError {
    DreamError::ConfigParse { line: 0, message }
}
