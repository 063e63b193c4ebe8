//! Typed tokens with regex matchers and lazy decoding.

use std::fmt;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use thiserror::Error;

use crate::keywords;
use crate::lexer::Interval;
use crate::symbols::Symbol;

static INT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([1-9]\d*|0)").unwrap());
static FLOAT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(([1-9]\d*|0)?\.\d+|([1-9]\d*|0)\.)").unwrap());
static STRING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^'([^\\']|\\.)*'").unwrap());
static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^'\d{4}-\d{2}-\d{2}'").unwrap());
static DATETIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^'\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}'").unwrap());
static IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z_0-9]*").unwrap());
static QUOTED_IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^"([^"]|"")+""#).unwrap());

/// Failure to decode a token's raw text into its typed value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("invalid date literal {0}")]
    BadDate(String),
    #[error("invalid datetime literal {0}")]
    BadDatetime(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Int,
    Float,
    String,
    Date,
    Datetime,
    Identifier,
    Keyword,
    Symbol,
    End,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Int => "integer",
            TokenKind::Float => "float",
            TokenKind::String => "string",
            TokenKind::Date => "date",
            TokenKind::Datetime => "datetime",
            TokenKind::Identifier => "identifier",
            TokenKind::Keyword => "keyword",
            TokenKind::Symbol => "symbol",
            TokenKind::End => "end of input",
        };
        f.write_str(name)
    }
}

/// Decoded token payload.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    Int(i64),
    Float(f64),
    Str(String),
    Date(NaiveDate),
    Datetime(NaiveDateTime),
    Ident(String),
    Keyword(String),
    Symbol(Symbol),
    End,
}

/// A lexed token: raw text, source interval and kind.
///
/// The typed value is decoded lazily via [`Token::decode`].
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub interval: Interval,
    /// Set for `TokenKind::Symbol`.
    pub symbol: Option<Symbol>,
    /// Set for `TokenKind::Keyword`.
    pub is_reserved: bool,
}

impl Token {
    pub fn end(interval: Interval) -> Self {
        Token {
            kind: TokenKind::End,
            text: String::new(),
            interval,
            symbol: None,
            is_reserved: false,
        }
    }

    /// Uppercased text, the canonical form for keyword comparison.
    pub fn keyword(&self) -> String {
        self.text.to_ascii_uppercase()
    }

    /// Identifier text with PostgreSQL double quotes stripped.
    pub fn ident_text(&self) -> String {
        if let Some(inner) = self
            .text
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
        {
            inner.replace("\"\"", "\"")
        } else {
            self.text.clone()
        }
    }

    pub fn decode(&self) -> Result<TokenValue, DecodeError> {
        match self.kind {
            TokenKind::Int => Ok(TokenValue::Int(
                self.text.parse().unwrap_or_default(),
            )),
            TokenKind::Float => Ok(TokenValue::Float(
                self.text.parse().unwrap_or_default(),
            )),
            TokenKind::String => Ok(TokenValue::Str(unescape(&self.text))),
            TokenKind::Date => {
                let inner = unescape(&self.text);
                NaiveDate::parse_from_str(&inner, "%Y-%m-%d")
                    .map(TokenValue::Date)
                    .map_err(|_| DecodeError::BadDate(self.text.clone()))
            }
            TokenKind::Datetime => {
                let inner = unescape(&self.text);
                NaiveDateTime::parse_from_str(&inner, "%Y-%m-%d %H:%M:%S")
                    .map(TokenValue::Datetime)
                    .map_err(|_| DecodeError::BadDatetime(self.text.clone()))
            }
            TokenKind::Identifier => Ok(TokenValue::Ident(self.ident_text())),
            TokenKind::Keyword => Ok(TokenValue::Keyword(self.keyword())),
            TokenKind::Symbol => Ok(TokenValue::Symbol(
                self.symbol.expect("symbol token without symbol"),
            )),
            TokenKind::End => Ok(TokenValue::End),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::End => write!(f, "end of input"),
            _ => write!(f, "{} `{}`", self.kind, self.text),
        }
    }
}

fn unescape(raw: &str) -> String {
    let inner = raw
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(raw);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// Length of the match for each token class at the start of `input`.
///
/// Returns `(kind, len, symbol)` candidates; the lexer keeps the longest.
/// Class order is the matching priority: datetime before date before plain
/// string, float before int, identifier last. A keyword is always offered as
/// an identifier too (schema names like `public` are reserved words); the
/// parser decides per position which reading to consume. With
/// `quoted_idents`, PostgreSQL double-quoted identifiers are recognized too.
pub fn match_classes(
    input: &str,
    quoted_idents: bool,
) -> Vec<(TokenKind, usize, Option<Symbol>)> {
    let mut found = Vec::new();
    if let Some(m) = DATETIME_RE.find(input) {
        found.push((TokenKind::Datetime, m.end(), None));
    }
    if let Some(m) = DATE_RE.find(input) {
        found.push((TokenKind::Date, m.end(), None));
    }
    if let Some(m) = STRING_RE.find(input) {
        found.push((TokenKind::String, m.end(), None));
    }
    if let Some(m) = FLOAT_RE.find(input) {
        found.push((TokenKind::Float, m.end(), None));
    }
    if let Some(m) = INT_RE.find(input) {
        found.push((TokenKind::Int, m.end(), None));
    }
    if let Some(m) = IDENT_RE.find(input) {
        let word = m.as_str().to_ascii_uppercase();
        if keywords::is_keyword(&word) {
            found.push((TokenKind::Keyword, m.end(), None));
        }
        found.push((TokenKind::Identifier, m.end(), None));
    }
    if quoted_idents {
        if let Some(m) = QUOTED_IDENT_RE.find(input) {
            found.push((TokenKind::Identifier, m.end(), None));
        }
    }
    if let Some(sym) = Symbol::match_prefix(input) {
        found.push((TokenKind::Symbol, sym.text().len(), Some(sym)));
    }
    found
}
