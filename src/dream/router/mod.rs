//! Maps a parsed request onto a virtual server and location, then drives
//! the static-file or proxy behavior to a response.
//!
//! Server selection walks the configured servers in declaration order and
//! compares the host header (with any `:port` suffix stripped) against the
//! server name and its extra hosts. Within the selected server the longest
//! matching location prefix wins.

use crate::dream::config::{Location, LocationKind, Origin, Scheme, Server};
use crate::dream::error::{DreamError, Result};
use crate::dream::http::client::{self, RequestConfig};
use crate::dream::http::{HttpReq, HttpRes, Method, StatusCode};
use crate::dream::{fs, mime};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;

/// Fallback body when a root has no `not_found.html`.
const NOT_FOUND_FALLBACK: &[u8] = b"<h1>404 Not Found</h1>";

/// Resolves one request to a response.
///
/// The response starts out seeded with the request's `connection` header;
/// a request no server or location answers for gets a plain 404. Routing
/// failures (proxy errors, unreadable files, methods a static location
/// cannot serve) surface as errors for the session to turn into a 400.
pub fn handle_request(req: &HttpReq, servers: &[Server]) -> Result<HttpRes> {
    let mut res = HttpRes::new(StatusCode::OK);
    if let Some(connection) = req.headers.get("connection") {
        res.headers
            .insert("connection".to_string(), connection.clone());
    }

    let host = req.headers.get("host").map(String::as_str).unwrap_or("");
    let (path, query) = split_target(request_path(&req.target));
    let path = clean_path(path);

    let Some(server) = match_server(host, servers) else {
        res.status = StatusCode::NOT_FOUND;
        return Ok(res);
    };

    let Some(location) = match_location(&path, server) else {
        res.status = StatusCode::NOT_FOUND;
        return Ok(res);
    };

    match &location.kind {
        LocationKind::Proxy { origin } => proxy_request(req, origin, &path, query),
        LocationKind::Static { root } => {
            match req.method {
                Method::Head => handle_head(&path, &mut res, root)?,
                Method::Get => handle_get(&path, &mut res, root)?,
                method => {
                    return Err(DreamError::Routing(format!(
                        "method {method} not allowed for static location {}",
                        location.path
                    )));
                }
            }
            Ok(res)
        }
    }
}

/// Picks the first server whose name or extra hosts match the incoming
/// host, with or without its `:port` suffix.
pub fn match_server<'a>(host: &str, servers: &'a [Server]) -> Option<&'a Server> {
    if host.is_empty() {
        return None;
    }
    let bare = host.split_once(':').map_or(host, |(name, _)| name);

    servers.iter().find(|server| {
        server.name == host
            || server.name == bare
            || server.hosts.iter().any(|h| h == host || h == bare)
    })
}

/// Canonicalizes a URL path: collapses `.`, `..` and duplicate slashes.
pub fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }

    let mut cleaned = String::with_capacity(path.len().max(1));
    cleaned.push('/');
    cleaned.push_str(&segments.join("/"));
    cleaned
}

fn match_location<'a>(path: &str, server: &'a Server) -> Option<&'a Location> {
    server
        .locations
        .iter()
        .filter(|location| location_matches(path, &clean_path(&location.path)))
        .max_by_key(|location| clean_path(&location.path).len())
}

/// Prefix match on whole path segments: `/api` covers `/api` and
/// `/api/v1/users` but not `/apix`.
fn location_matches(path: &str, prefix: &str) -> bool {
    prefix == "/"
        || path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn proxy_request(
    req: &HttpReq,
    origin: &Origin,
    path: &str,
    query: Option<&str>,
) -> Result<HttpRes> {
    let mut upstream_path = path.to_string();
    if let Some(query) = query {
        upstream_path.push('?');
        upstream_path.push_str(query);
    }

    let cfg = RequestConfig {
        query: HashMap::new(),
        headers: req.headers.clone(),
        body: req.body.clone(),
    };

    let mut res = dispatch_origin(req.method, origin, &upstream_path, cfg.clone())?;

    // Follow a single 301/302 back to the same origin. Deeper chains are
    // handed to the client as-is.
    if res.status == StatusCode::MOVED_PERMANENTLY || res.status == StatusCode::FOUND {
        if let Some(location) = res.headers.get("location").cloned() {
            res = dispatch_origin(req.method, origin, &location, cfg)?;
        }
    }

    Ok(res)
}

fn dispatch_origin(
    method: Method,
    origin: &Origin,
    path: &str,
    cfg: RequestConfig,
) -> Result<HttpRes> {
    match origin.scheme {
        Scheme::Http => client::make_request(method.as_str(), &origin.host, origin.port, path, cfg),
        Scheme::Https => {
            client::make_secure_request(method.as_str(), &origin.host, origin.port, path, cfg)
        }
    }
}

fn handle_head(target_path: &str, res: &mut HttpRes, root: &str) -> Result<()> {
    let (file_path, stat) = fs::resolve_file_path(target_path, root);

    match stat {
        Ok(stat) => {
            res.status = StatusCode::OK;
            res.headers.insert(
                "content-type".to_string(),
                content_type_for(&file_path).to_string(),
            );
            res.headers
                .insert("content-length".to_string(), stat.len().to_string());
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            res.status = StatusCode::NOT_FOUND;
            res.headers
                .insert("content-length".to_string(), "0".to_string());
        }
        Err(err) => return Err(DreamError::Filesystem(err)),
    }

    Ok(())
}

fn handle_get(target_path: &str, res: &mut HttpRes, root: &str) -> Result<()> {
    let (file_path, _) = fs::resolve_file_path(target_path, root);
    let content_type = content_type_for(&file_path);

    match fs::load_file(&file_path) {
        Ok(body) => {
            res.status = StatusCode::OK;
            res.headers
                .insert("content-type".to_string(), content_type.to_string());
            res.set_body(body);
        }
        Err(DreamError::Filesystem(err)) if err.kind() == ErrorKind::NotFound => {
            let page = fs::load_file(&Path::new(root).join("not_found.html"))
                .unwrap_or_else(|_| NOT_FOUND_FALLBACK.to_vec());

            res.status = StatusCode::NOT_FOUND;
            res.headers
                .insert("connection".to_string(), "close".to_string());
            res.headers.insert(
                "content-type".to_string(),
                "text/html; charset=utf-8".to_string(),
            );
            res.set_body(page);
        }
        Err(err) => return Err(err),
    }

    Ok(())
}

fn content_type_for(path: &Path) -> &'static str {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(mime::mime_type_for)
        .unwrap_or("application/octet-stream")
}

/// Reduces any of the four target forms to a routable path.
fn request_path(target: &str) -> &str {
    if let Some(rest) = target
        .strip_prefix("http://")
        .or_else(|| target.strip_prefix("https://"))
    {
        match rest.find('/') {
            Some(slash) => &rest[slash..],
            None => "/",
        }
    } else if target.starts_with('/') {
        target
    } else {
        "/"
    }
}

fn split_target(target: &str) -> (&str, Option<&str>) {
    let target = target.split('#').next().unwrap_or(target);
    match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dream::config::Listen;
    use std::fs::File;
    use std::io::Write;
    use tempfile::{tempdir, TempDir};

    fn static_server(name: &str, root: &str) -> Server {
        Server {
            name: name.to_string(),
            listen: Listen {
                port: 8080,
                ssl: false,
            },
            locations: vec![Location {
                path: "/".to_string(),
                kind: LocationKind::Static {
                    root: root.to_string(),
                },
            }],
            ..Server::default()
        }
    }

    fn www_root(files: &[(&str, &str)]) -> TempDir {
        let dir = tempdir().unwrap();
        for (name, contents) in files {
            let mut file = File::create(dir.path().join(name)).unwrap();
            file.write_all(contents.as_bytes()).unwrap();
        }
        dir
    }

    fn get(target: &str, host: &str) -> HttpReq {
        let mut req = HttpReq::new(Method::Get, target);
        req.headers.insert("host".to_string(), host.to_string());
        req
    }

    #[test]
    fn clean_path_collapses_dots_and_slashes() {
        assert_eq!(clean_path("/a/./b/../c"), "/a/c");
        assert_eq!(clean_path("/a//b///c"), "/a/b/c");
        assert_eq!(clean_path("/"), "/");
        assert_eq!(clean_path("/../.."), "/");
        assert_eq!(clean_path("/a/b/"), "/a/b");
    }

    #[test]
    fn host_matching_accepts_name_hosts_and_port_suffix() {
        let mut server = static_server("x", "/srv");
        server.hosts = vec!["y".to_string(), "z".to_string()];
        let servers = [server];

        for host in ["x", "y", "z", "x:80", "y:8080"] {
            assert!(match_server(host, &servers).is_some(), "host {host}");
        }
        assert!(match_server("w", &servers).is_none());
        assert!(match_server("", &servers).is_none());
    }

    #[test]
    fn location_prefix_matches_whole_segments() {
        assert!(location_matches("/api", "/api"));
        assert!(location_matches("/api/v1/users", "/api"));
        assert!(!location_matches("/apix", "/api"));
        assert!(location_matches("/anything", "/"));
    }

    #[test]
    fn longest_location_prefix_wins() {
        let mut server = static_server("localhost", "/srv");
        server.locations.push(Location {
            path: "/api".to_string(),
            kind: LocationKind::Proxy {
                origin: Origin {
                    scheme: Scheme::Http,
                    host: "origin".to_string(),
                    port: 8000,
                },
            },
        });

        match &match_location("/api/ping", &server).unwrap().kind {
            LocationKind::Proxy { origin } => assert_eq!(origin.host, "origin"),
            other => panic!("expected the proxy location, got {other:?}"),
        }
        match &match_location("/index.html", &server).unwrap().kind {
            LocationKind::Static { .. } => {}
            other => panic!("expected the static location, got {other:?}"),
        }
    }

    #[test]
    fn static_get_serves_index_for_root() {
        let dir = www_root(&[("index.html", "HELLO")]);
        let servers = [static_server("localhost", dir.path().to_str().unwrap())];

        let res = handle_request(&get("/", "localhost"), &servers).unwrap();
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body, b"HELLO");
        assert_eq!(res.headers["content-length"], "5");
        assert_eq!(res.headers["content-type"], "text/html; charset=utf-8");
    }

    #[test]
    fn dotted_paths_route_like_their_clean_form() {
        let dir = www_root(&[("index.html", "HELLO"), ("a.txt", "A")]);
        let servers = [static_server("localhost", dir.path().to_str().unwrap())];

        let direct = handle_request(&get("/a.txt", "localhost"), &servers).unwrap();
        let dotted = handle_request(&get("/b/../a.txt", "localhost"), &servers).unwrap();
        assert_eq!(direct.status, StatusCode::OK);
        assert_eq!(direct.body, dotted.body);
    }

    #[test]
    fn static_miss_uses_the_custom_not_found_page() {
        let dir = www_root(&[("not_found.html", "<h1>NF</h1>")]);
        let servers = [static_server("localhost", dir.path().to_str().unwrap())];

        let res = handle_request(&get("/missing", "localhost"), &servers).unwrap();
        assert_eq!(res.status, StatusCode::NOT_FOUND);
        assert_eq!(res.body, b"<h1>NF</h1>");
        assert_eq!(res.headers["connection"], "close");
    }

    #[test]
    fn static_miss_falls_back_to_the_builtin_page() {
        let dir = www_root(&[]);
        let servers = [static_server("localhost", dir.path().to_str().unwrap())];

        let res = handle_request(&get("/missing", "localhost"), &servers).unwrap();
        assert_eq!(res.status, StatusCode::NOT_FOUND);
        assert_eq!(res.body, b"<h1>404 Not Found</h1>");
    }

    #[test]
    fn head_answers_from_metadata() {
        let dir = www_root(&[("data.json", "{\"ok\":true}")]);
        let servers = [static_server("localhost", dir.path().to_str().unwrap())];

        let mut req = HttpReq::new(Method::Head, "/data.json");
        req.headers
            .insert("host".to_string(), "localhost".to_string());

        let res = handle_request(&req, &servers).unwrap();
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.headers["content-type"], "application/json");
        assert_eq!(res.headers["content-length"], "11");
        assert!(res.body.is_empty());
    }

    #[test]
    fn head_miss_is_a_zero_length_404() {
        let dir = www_root(&[]);
        let servers = [static_server("localhost", dir.path().to_str().unwrap())];

        let mut req = HttpReq::new(Method::Head, "/missing.css");
        req.headers
            .insert("host".to_string(), "localhost".to_string());

        let res = handle_request(&req, &servers).unwrap();
        assert_eq!(res.status, StatusCode::NOT_FOUND);
        assert_eq!(res.headers["content-length"], "0");
    }

    #[test]
    fn unknown_extension_defaults_to_octet_stream() {
        let dir = www_root(&[("blob.bin", "xx")]);
        let servers = [static_server("localhost", dir.path().to_str().unwrap())];

        let res = handle_request(&get("/blob.bin", "localhost"), &servers).unwrap();
        assert_eq!(res.headers["content-type"], "application/octet-stream");
    }

    #[test]
    fn post_to_a_static_location_is_a_routing_error() {
        let dir = www_root(&[("index.html", "HELLO")]);
        let servers = [static_server("localhost", dir.path().to_str().unwrap())];

        let mut req = HttpReq::new(Method::Post, "/");
        req.headers
            .insert("host".to_string(), "localhost".to_string());

        assert!(matches!(
            handle_request(&req, &servers),
            Err(DreamError::Routing(_))
        ));
    }

    #[test]
    fn unmatched_host_gets_a_deterministic_404() {
        let dir = www_root(&[("index.html", "HELLO")]);
        let servers = [static_server("localhost", dir.path().to_str().unwrap())];

        let res = handle_request(&get("/", "nobody.example"), &servers).unwrap();
        assert_eq!(res.status, StatusCode::NOT_FOUND);
        assert!(res.body.is_empty());
    }

    #[test]
    fn connection_header_is_seeded_from_the_request() {
        let dir = www_root(&[("index.html", "HELLO")]);
        let servers = [static_server("localhost", dir.path().to_str().unwrap())];

        let mut req = get("/", "localhost");
        req.headers
            .insert("connection".to_string(), "keep-alive".to_string());

        let res = handle_request(&req, &servers).unwrap();
        assert_eq!(res.headers["connection"], "keep-alive");
    }
}
