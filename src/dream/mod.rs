//! The request-handling pipeline behind the dreamserver binary.
//!
//! A [`DreamContext`] owns one listen port and the virtual servers grouped
//! onto it. Accepted connections are handed to a
//! [`client_session::ClientSession`] on their own thread; the immutable
//! server list is the only state they share.

pub mod client_session;
pub mod config;
pub mod error;
pub mod fs;
pub mod http;
pub mod logger;
pub mod mime;
pub mod router;

use crate::dream::client_session::ClientSession;
use crate::dream::config::Server;
use crate::dream::error::Result;
use log::{error, info, warn};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;

/// Listeners bind IPv4 on all interfaces.
const LISTEN_ADDR: &str = "0.0.0.0";

/// One listener and the servers that answer on it.
pub struct DreamContext {
    port: u16,
    servers: Arc<Vec<Server>>,
}

impl DreamContext {
    pub fn new(port: u16, servers: Vec<Server>) -> DreamContext {
        DreamContext {
            port,
            servers: Arc::new(servers),
        }
    }

    /// Binds the port and accepts connections until the process exits.
    ///
    /// Accept errors are logged and skipped; only the bind itself is fatal.
    pub fn run(&self) -> Result<()> {
        let listener = TcpListener::bind((LISTEN_ADDR, self.port))?;
        info!("listening on :{}", self.port);

        for server in self.servers.iter().filter(|server| server.listen.ssl) {
            warn!(
                "{}: ssl is configured but termination is not wired in, serving plaintext",
                server.name
            );
        }

        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let servers = Arc::clone(&self.servers);
                    thread::spawn(move || {
                        ClientSession::new(stream).handle_connection(servers.as_slice());
                    });
                }
                Err(err) => {
                    error!("accept failed on :{}: {err}", self.port);
                    continue;
                }
            }
        }

        Ok(())
    }
}
