//! Recursive-descent parser for the Dreamfile grammar.
//!
//! ```text
//! config     := "servers" "{" server* "}"
//! server     := "server" "{" ( directive | location )* "}"
//! location   := "location" IDENT "{" directive* "}"
//! directive  := IDENT [ value ] ";"
//! value      := IDENT | NUMBER
//! ```
//!
//! Every failure is fatal and carries the line of the offending token.
//! Directives that need a value reject the bare `directive;` form instead
//! of silently producing zero-valued fields.

use crate::dream::config::lexer::{Token, TokenKind};
use crate::dream::config::{Config, Location, LocationKind, Origin, Server, SslConfig};
use crate::dream::error::{DreamError, Result};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Parser {
        // The lexer always terminates its stream with Eof; guard anyway so
        // peek never runs off the end.
        if tokens.last().map(|t| t.kind) != Some(TokenKind::Eof) {
            let line = tokens.last().map_or(1, |t| t.line);
            tokens.push(Token {
                kind: TokenKind::Eof,
                value: String::new(),
                line,
            });
        }
        Parser { tokens, pos: 0 }
    }

    /// Parses the whole token stream into a [`Config`].
    pub fn parse_config(&mut self) -> Result<Config> {
        let opener = self.consume();
        if opener.kind != TokenKind::Identifier || opener.value != "servers" {
            return Err(parse_error(
                opener.line,
                format!("expected 'servers', got '{}'", opener.value),
            ));
        }

        self.expect_symbol("{")?;

        let mut servers = Vec::new();
        while !self.at_symbol("}") {
            if self.at_eof() {
                return Err(parse_error(self.peek().line, "unexpected end of file".into()));
            }
            servers.push(self.parse_server()?);
        }

        self.expect_symbol("}")?;
        Ok(Config { servers })
    }

    fn parse_server(&mut self) -> Result<Server> {
        let opener = self.consume();
        if opener.kind != TokenKind::Identifier || opener.value != "server" {
            return Err(parse_error(
                opener.line,
                format!("expected 'server', got '{}'", opener.value),
            ));
        }

        self.expect_symbol("{")?;

        let mut server = Server::default();
        while !self.at_symbol("}") {
            if self.at_eof() {
                return Err(parse_error(self.peek().line, "unexpected end of file".into()));
            }
            if self.peek().kind == TokenKind::Identifier && self.peek().value == "location" {
                let location = self.parse_location()?;
                server.locations.push(location);
            } else {
                let (key, value, line) = self.parse_directive()?;
                apply_server_directive(&mut server, &key, value, line)?;
            }
        }

        self.expect_symbol("}")?;
        Ok(server)
    }

    fn parse_location(&mut self) -> Result<Location> {
        self.consume(); // the 'location' keyword

        let path_token = self.consume();
        if path_token.kind != TokenKind::Identifier {
            return Err(parse_error(path_token.line, "expected location path".into()));
        }

        self.expect_symbol("{")?;

        let mut root: Option<String> = None;
        let mut proxy_pass: Option<(String, usize)> = None;

        while !self.at_symbol("}") {
            if self.at_eof() {
                return Err(parse_error(self.peek().line, "unexpected end of file".into()));
            }
            let (key, value, line) = self.parse_directive()?;
            match key.as_str() {
                "root" => root = Some(required_value(&key, value, line)?),
                "proxy_pass" => proxy_pass = Some((required_value(&key, value, line)?, line)),
                _ => {
                    return Err(parse_error(
                        line,
                        format!("unknown location directive '{key}'"),
                    ));
                }
            }
        }

        self.expect_symbol("}")?;

        let kind = match (root, proxy_pass) {
            (Some(root), None) => LocationKind::Static { root },
            (None, Some((url, line))) => {
                let origin =
                    Origin::parse(&url).map_err(|message| parse_error(line, message))?;
                LocationKind::Proxy { origin }
            }
            (Some(_), Some((_, line))) => {
                return Err(parse_error(
                    line,
                    "location has both root and proxy_pass".into(),
                ));
            }
            (None, None) => {
                return Err(parse_error(
                    path_token.line,
                    format!("location {} needs root or proxy_pass", path_token.value),
                ));
            }
        };

        Ok(Location {
            path: path_token.value,
            kind,
        })
    }

    /// Parses `IDENT [value] ";"`. The value is `None` for the bare form.
    fn parse_directive(&mut self) -> Result<(String, Option<String>, usize)> {
        let key = self.consume();
        if key.kind != TokenKind::Identifier {
            return Err(parse_error(
                key.line,
                format!("expected directive, got '{}'", key.value),
            ));
        }

        if self.at_symbol(";") {
            self.consume();
            return Ok((key.value, None, key.line));
        }

        let value = self.consume();
        if value.kind != TokenKind::Identifier && value.kind != TokenKind::Number {
            return Err(parse_error(
                value.line,
                format!("expected value for directive '{}'", key.value),
            ));
        }

        if self.at_symbol(";") {
            self.consume();
        }

        Ok((key.value, Some(value.value), key.line))
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn consume(&mut self) -> Token {
        let token = self.peek().clone();
        self.pos += 1;
        token
    }

    fn at_symbol(&self, symbol: &str) -> bool {
        let token = self.peek();
        token.kind == TokenKind::Symbol && token.value == symbol
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn expect_symbol(&mut self, symbol: &str) -> Result<()> {
        let token = self.consume();
        if token.kind != TokenKind::Symbol || token.value != symbol {
            return Err(parse_error(
                token.line,
                format!("expected symbol '{}', got '{}'", symbol, token.value),
            ));
        }
        Ok(())
    }
}

fn apply_server_directive(
    server: &mut Server,
    key: &str,
    value: Option<String>,
    line: usize,
) -> Result<()> {
    match key {
        "name" => server.name = required_value(key, value, line)?,
        "listen" => {
            let value = required_value(key, value, line)?;
            server.listen.port = value
                .parse()
                .map_err(|_| parse_error(line, format!("invalid listen port '{value}'")))?;
        }
        "ssl" => {
            let value = required_value(key, value, line)?;
            server.listen.ssl = value == "true" || value == "yes";
        }
        "hosts" => {
            let value = required_value(key, value, line)?;
            server.hosts = value.split(',').map(str::to_string).collect();
        }
        "access_log" => server.access_log = Some(required_value(key, value, line)?),
        "ssl_certificate" => {
            server.ssl.get_or_insert_with(SslConfig::default).certificate =
                required_value(key, value, line)?;
        }
        "ssl_certificate_key" => {
            server
                .ssl
                .get_or_insert_with(SslConfig::default)
                .certificate_key = required_value(key, value, line)?;
        }
        _ => {
            return Err(parse_error(
                line,
                format!("unknown server directive '{key}'"),
            ));
        }
    }
    Ok(())
}

fn required_value(key: &str, value: Option<String>, line: usize) -> Result<String> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(parse_error(
            line,
            format!("directive '{key}' requires a value"),
        )),
    }
}

fn parse_error(line: usize, message: String) -> DreamError {
    DreamError::ConfigParse { line, message }
}
