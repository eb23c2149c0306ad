//! Tokenizer for the Dreamfile configuration language.
//!
//! The language has four token kinds: identifiers (any run of
//! non-whitespace bytes that is not `{`, `}` or `;`), numbers (a run of
//! ASCII digits), the three symbols, and end-of-input. Whitespace only
//! separates tokens; there is no comment syntax.

/// What kind of token the lexer produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Number,
    Symbol,
    Eof,
}

/// One token with its source line, for error reporting.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub line: usize,
}

pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Lexer<'a> {
        Lexer {
            input: input.as_bytes(),
            pos: 0,
            line: 1,
        }
    }

    /// Produces the next token, ending with an endless stream of `Eof`.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        if self.pos >= self.input.len() {
            return Token {
                kind: TokenKind::Eof,
                value: String::new(),
                line: self.line,
            };
        }

        let ch = self.input[self.pos];

        if is_symbol(ch) {
            self.pos += 1;
            return Token {
                kind: TokenKind::Symbol,
                value: (ch as char).to_string(),
                line: self.line,
            };
        }

        if ch.is_ascii_digit() {
            let start = self.pos;
            while self.pos < self.input.len() && self.input[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
            return self.token_from(TokenKind::Number, start);
        }

        let start = self.pos;
        while self.pos < self.input.len()
            && !self.input[self.pos].is_ascii_whitespace()
            && !is_symbol(self.input[self.pos])
        {
            self.pos += 1;
        }
        self.token_from(TokenKind::Identifier, start)
    }

    /// Runs the lexer to completion, EOF token included.
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return tokens;
            }
        }
    }

    fn token_from(&self, kind: TokenKind, start: usize) -> Token {
        Token {
            kind,
            value: String::from_utf8_lossy(&self.input[start..self.pos]).into_owned(),
            line: self.line,
        }
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.input.len() {
            let ch = self.input[self.pos];
            if ch == b'\n' {
                self.line += 1;
            }
            if !ch.is_ascii_whitespace() {
                break;
            }
            self.pos += 1;
        }
    }
}

fn is_symbol(ch: u8) -> bool {
    ch == b'{' || ch == b'}' || ch == b';'
}
