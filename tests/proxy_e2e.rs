//! End-to-end scenarios over real sockets: static serving, proxying with a
//! single redirect follow, and keep-alive connection reuse.

use dreamserver::dream::DreamContext;
use dreamserver::dream::config::{Listen, Location, LocationKind, Origin, Scheme, Server};
use dreamserver::dream::http::framer::read_full_message;
use dreamserver::dream::http::parser::{parse_raw_http_req, parse_raw_http_res};
use dreamserver::dream::http::{HttpReq, HttpRes, StatusCode};
use std::fs;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn free_port() -> u16 {
    TcpListener::bind(("127.0.0.1", 0))
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn static_server(port: u16, root: &str) -> Server {
    Server {
        name: "localhost".to_string(),
        listen: Listen { port, ssl: false },
        locations: vec![Location {
            path: "/".to_string(),
            kind: LocationKind::Static {
                root: root.to_string(),
            },
        }],
        ..Server::default()
    }
}

/// Spawns a dreamserver for `servers` and waits for the port to accept.
fn start_dreamserver(servers: Vec<Server>) {
    let port = servers[0].listen.port;
    thread::spawn(move || {
        let _ = DreamContext::new(port, servers).run();
    });

    for _ in 0..100 {
        if TcpStream::connect(("127.0.0.1", port)).is_ok() {
            return;
        }
        thread::sleep(Duration::from_millis(20));
    }
    panic!("server on port {port} did not come up");
}

/// Minimal scripted origin: parses each incoming request and answers with
/// whatever the handler returns, one connection per request.
fn start_origin<F>(handler: F) -> u16
where
    F: Fn(HttpReq) -> Vec<u8> + Send + 'static,
{
    let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
    let port = listener.local_addr().unwrap().port();

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut carry = Vec::new();
            let Ok(raw) = read_full_message(&mut stream, &mut carry) else {
                continue;
            };
            let Ok(req) = parse_raw_http_req(&raw) else {
                continue;
            };
            let _ = stream.write_all(&handler(req));
        }
    });

    port
}

fn send(port: u16, raw: &str) -> HttpRes {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    stream.write_all(raw.as_bytes()).unwrap();

    let mut carry = Vec::new();
    let raw_res = read_full_message(&mut stream, &mut carry).unwrap();
    parse_raw_http_res(&raw_res).unwrap()
}

#[test]
fn static_get_serves_the_index_with_server_headers() {
    let www = TempDir::new().unwrap();
    fs::write(www.path().join("index.html"), "HELLO").unwrap();

    let port = free_port();
    start_dreamserver(vec![static_server(port, www.path().to_str().unwrap())]);

    let res = send(port, "GET / HTTP/1.1\r\nHost: localhost\r\n\r\n");
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.headers["content-length"], "5");
    assert_eq!(res.body, b"HELLO");
    assert_eq!(res.headers["server"], "dreamserver/0.0.1 (Archlinux)");
    assert_eq!(res.headers["via"], "HTTP/1.1 dreamserver");
    assert!(res.headers["date"].ends_with("GMT"));
}

#[test]
fn static_miss_serves_the_custom_not_found_page_and_closes() {
    let www = TempDir::new().unwrap();
    fs::write(www.path().join("not_found.html"), "<h1>NF</h1>").unwrap();

    let port = free_port();
    start_dreamserver(vec![static_server(port, www.path().to_str().unwrap())]);

    let res = send(port, "GET /missing HTTP/1.1\r\nHost: localhost\r\n\r\n");
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body, b"<h1>NF</h1>");
    assert_eq!(res.headers["connection"], "close");
}

#[test]
fn static_miss_without_page_uses_the_builtin_body() {
    let www = TempDir::new().unwrap();

    let port = free_port();
    start_dreamserver(vec![static_server(port, www.path().to_str().unwrap())]);

    let res = send(port, "GET /missing HTTP/1.1\r\nHost: localhost\r\n\r\n");
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body, b"<h1>404 Not Found</h1>");
}

#[test]
fn proxy_pass_forwards_and_propagates_x_forwarded_for() {
    let origin_port = start_origin(|req| {
        let forwarded = req
            .headers
            .get("x-forwarded-for")
            .cloned()
            .unwrap_or_default();
        format!(
            "HTTP/1.1 200 OK\r\ncontent-length: 4\r\nx-echo-forwarded-for: {forwarded}\r\n\r\npong"
        )
        .into_bytes()
    });

    let port = free_port();
    let mut server = static_server(port, "/nonexistent");
    server.locations = vec![Location {
        path: "/api".to_string(),
        kind: LocationKind::Proxy {
            origin: Origin {
                scheme: Scheme::Http,
                host: "127.0.0.1".to_string(),
                port: origin_port,
            },
        },
    }];
    start_dreamserver(vec![server]);

    let res = send(port, "GET /api/ping HTTP/1.1\r\nHost: localhost\r\n\r\n");
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, b"pong");
    assert!(res.headers["x-echo-forwarded-for"].starts_with("127.0.0.1"));
}

#[test]
fn proxy_follows_one_redirect() {
    let origin_port = start_origin(|req| {
        if req.target == "/final" {
            b"HTTP/1.1 200 OK\r\ncontent-length: 4\r\n\r\ndone".to_vec()
        } else {
            b"HTTP/1.1 302 Found\r\nlocation: /final\r\ncontent-length: 0\r\n\r\n".to_vec()
        }
    });

    let port = free_port();
    let mut server = static_server(port, "/nonexistent");
    server.locations = vec![Location {
        path: "/api".to_string(),
        kind: LocationKind::Proxy {
            origin: Origin {
                scheme: Scheme::Http,
                host: "127.0.0.1".to_string(),
                port: origin_port,
            },
        },
    }];
    start_dreamserver(vec![server]);

    let res = send(port, "GET /api/start HTTP/1.1\r\nHost: localhost\r\n\r\n");
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, b"done");
}

#[test]
fn keep_alive_serves_two_requests_on_one_connection() {
    let www = TempDir::new().unwrap();
    fs::write(www.path().join("index.html"), "HELLO").unwrap();

    let port = free_port();
    start_dreamserver(vec![static_server(port, www.path().to_str().unwrap())]);

    let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let mut carry = Vec::new();

    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: keep-alive\r\n\r\n")
        .unwrap();
    let first = parse_raw_http_res(&read_full_message(&mut stream, &mut carry).unwrap()).unwrap();
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body, b"HELLO");

    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .unwrap();
    let second = parse_raw_http_res(&read_full_message(&mut stream, &mut carry).unwrap()).unwrap();
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.headers["connection"], "close");

    // The session hangs up after answering a close response.
    let mut rest = Vec::new();
    let eof = stream.read_to_end(&mut rest);
    assert!(matches!(eof, Ok(0)));
}

#[test]
fn malformed_request_line_gets_a_400() {
    let www = TempDir::new().unwrap();

    let port = free_port();
    start_dreamserver(vec![static_server(port, www.path().to_str().unwrap())]);

    let res = send(port, "GOT / HTTP/1.1\r\nHost: localhost\r\n\r\n");
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[test]
fn unmatched_host_gets_a_404() {
    let www = TempDir::new().unwrap();
    fs::write(www.path().join("index.html"), "HELLO").unwrap();

    let port = free_port();
    start_dreamserver(vec![static_server(port, www.path().to_str().unwrap())]);

    let res = send(port, "GET / HTTP/1.1\r\nHost: stranger.example\r\n\r\n");
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert!(res.body.is_empty());
}
