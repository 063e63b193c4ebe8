//! Stream of token sets over SQL source text.
//!
//! At every position the lexer reports *all* token classes matching the
//! longest span there: `date` is simultaneously a keyword and an identifier,
//! `'2020-01-01'` both a date and a plain string. The parser picks the
//! alternative it needs. Snapshots are cheap so the parser can backtrack.

use std::fmt;
use std::sync::Arc;

use crate::keywords;
use crate::token::{self, Token, TokenKind};

/// Byte offset plus human-readable line/column (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn start() -> Self {
        Position {
            offset: 0,
            line: 1,
            column: 1,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Source span of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Interval {
    pub start: Position,
    pub end: Position,
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}-{}]", self.start, self.end)
    }
}

/// Restorable lexer state: position, intervals and the current token set.
/// The source text itself is shared, not copied.
#[derive(Debug, Clone)]
pub struct LexerState {
    pos: Position,
    interval: Interval,
    last_interval: Interval,
    current: Vec<Token>,
}

#[derive(Debug, Clone)]
pub struct Lexer {
    source: Arc<str>,
    pos: Position,
    interval: Interval,
    last_interval: Interval,
    current: Vec<Token>,
    quoted_idents: bool,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            source: Arc::from(source),
            pos: Position::start(),
            interval: Interval::default(),
            last_interval: Interval::default(),
            current: Vec::new(),
            quoted_idents: false,
        }
    }

    /// Lexer accepting PostgreSQL double-quoted identifiers, used by the
    /// `CREATE INDEX` sub-parser.
    pub fn new_postgres(source: &str) -> Self {
        Lexer {
            quoted_idents: true,
            ..Lexer::new(source)
        }
    }

    /// Tokens matching at the current position.
    pub fn current(&self) -> &[Token] {
        &self.current
    }

    /// Span of the token set most recently produced.
    pub fn interval(&self) -> Interval {
        self.interval
    }

    /// Span of the token set produced before the current one.
    pub fn last_interval(&self) -> Interval {
        self.last_interval
    }

    pub fn state(&self) -> LexerState {
        LexerState {
            pos: self.pos,
            interval: self.interval,
            last_interval: self.last_interval,
            current: self.current.clone(),
        }
    }

    pub fn restore(&mut self, state: LexerState) {
        self.pos = state.pos;
        self.interval = state.interval;
        self.last_interval = state.last_interval;
        self.current = state.current;
    }

    /// Offset consumed so far; used by the backtracking combinator to rank
    /// competing alternatives.
    pub fn offset(&self) -> usize {
        self.pos.offset
    }

    fn advance(&mut self, len: usize) {
        let consumed = &self.source[self.pos.offset..self.pos.offset + len];
        for ch in consumed.chars() {
            if ch == '\n' {
                self.pos.line += 1;
                self.pos.column = 1;
            } else {
                self.pos.column += 1;
            }
        }
        self.pos.offset += len;
    }

    fn skip_insignificant(&mut self) {
        loop {
            let rest = &self.source[self.pos.offset..];
            if let Some(ch) = rest.chars().next() {
                if ch.is_whitespace() {
                    self.advance(ch.len_utf8());
                    continue;
                }
            }
            if rest.starts_with("--") {
                let len = rest.find('\n').map(|i| i + 1).unwrap_or(rest.len());
                self.advance(len);
                continue;
            }
            if rest.starts_with("/*") {
                let len = rest.find("*/").map(|i| i + 2).unwrap_or(rest.len());
                self.advance(len);
                continue;
            }
            break;
        }
    }

    /// Advances to the next token set.
    ///
    /// On unknown input a zero-length set is produced and one character is
    /// skipped, so a subsequent `next` call makes progress.
    pub fn next(&mut self) -> &[Token] {
        self.last_interval = self.interval;
        self.skip_insignificant();

        let rest = &self.source[self.pos.offset..];
        if rest.is_empty() {
            self.interval = Interval {
                start: self.pos,
                end: self.pos,
            };
            self.current = vec![Token::end(self.interval)];
            return &self.current;
        }

        let candidates = token::match_classes(rest, self.quoted_idents);
        let best = candidates.iter().map(|c| c.1).max().unwrap_or(0);
        if best == 0 {
            // skip the offending character and surface an empty set
            let start = self.pos;
            let ch_len = rest.chars().next().map(|c| c.len_utf8()).unwrap_or(1);
            self.advance(ch_len);
            self.interval = Interval {
                start,
                end: self.pos,
            };
            self.current = Vec::new();
            return &self.current;
        }

        let start = self.pos;
        let text = rest[..best].to_string();
        self.advance(best);
        let interval = Interval {
            start,
            end: self.pos,
        };
        self.interval = interval;
        self.current = candidates
            .into_iter()
            .filter(|c| c.1 == best)
            .map(|(kind, _, symbol)| Token {
                kind,
                text: text.clone(),
                interval,
                symbol,
                is_reserved: kind == TokenKind::Keyword
                    && keywords::is_reserved(&text.to_ascii_uppercase()),
            })
            .collect();
        &self.current
    }
}
