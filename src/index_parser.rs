//! Sub-parser for PostgreSQL `CREATE INDEX` definitions as returned by
//! `pg_indexes.indexdef`.
//!
//! Reuses the lexer and token-stream machinery with PostgreSQL quoted
//! identifiers enabled. Trailing clauses after the column list (`WITH`,
//! `TABLESPACE`, partial-index `WHERE`) are ignored.

use crate::lexer::Lexer;
use crate::parser::{Expected, ParseError, TokenStream};
use crate::schema::IndexColumn;
use crate::symbols::Symbol;
use crate::token::{TokenKind, TokenValue};
use crate::keywords as kw;

/// Outcome of parsing one index definition. The access method is reported
/// verbatim; callers decide which methods they keep.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedIndex {
    pub columns: Vec<IndexColumn>,
    pub unique: bool,
    pub method: String,
}

pub struct IndexParser {
    tokens: TokenStream,
}

impl IndexParser {
    pub fn new(definition: &str) -> Self {
        IndexParser {
            tokens: TokenStream::new(Lexer::new_postgres(definition)),
        }
    }

    /// CREATE [UNIQUE] INDEX [IF NOT EXISTS] name ON [ONLY] chain
    /// [USING method] ( column_spec, ... )
    pub fn parse(mut self) -> Result<ParsedIndex, ParseError> {
        self.tokens.prime();
        self.tokens.expect(&[Expected::Kw(kw::CREATE)])?;
        let unique = self
            .tokens
            .accept(&[Expected::Kw(kw::UNIQUE)])?
            .is_some();
        self.tokens.expect(&[Expected::Word(kw::INDEX)])?;
        if self.tokens.accept(&[Expected::Word(kw::IF)])?.is_some() {
            self.tokens.expect(&[Expected::Kw(kw::NOT)])?;
            self.tokens.expect(&[Expected::Kw(kw::EXISTS)])?;
        }
        // index name
        self.identifier()?;
        self.tokens.expect(&[Expected::Kw(kw::ON)])?;
        self.tokens.accept(&[Expected::Kw(kw::ONLY)])?;
        self.naming_chain()?;
        let method = if self.tokens.accept(&[Expected::Kw(kw::USING)])?.is_some() {
            self.identifier()?
        } else {
            "btree".to_string()
        };

        self.tokens.expect(&[Expected::Sym(Symbol::LeftParen)])?;
        let mut columns = vec![self.column_spec()?];
        while self
            .tokens
            .accept(&[Expected::Sym(Symbol::Comma)])?
            .is_some()
        {
            columns.push(self.column_spec()?);
        }
        self.tokens.expect(&[Expected::Sym(Symbol::RightParen)])?;

        Ok(ParsedIndex {
            columns,
            unique,
            method,
        })
    }

    fn identifier(&mut self) -> Result<String, ParseError> {
        match self.tokens.expect(&[Expected::Kind(TokenKind::Identifier)])? {
            TokenValue::Ident(name) => Ok(name),
            other => Err(ParseError::Syntax(format!(
                "unexpected identifier token {other:?}"
            ))),
        }
    }

    fn naming_chain(&mut self) -> Result<(), ParseError> {
        self.identifier()?;
        while self
            .tokens
            .accept(&[Expected::Sym(Symbol::Period)])?
            .is_some()
        {
            self.identifier()?;
        }
        Ok(())
    }

    // ( <id> | '(' expression ')' ) [COLLATE id] [opclass] [ASC|DESC]
    // [NULLS {FIRST|LAST}]
    fn column_spec(&mut self) -> Result<IndexColumn, ParseError> {
        let name = if self
            .tokens
            .accept(&[Expected::Sym(Symbol::LeftParen)])?
            .is_some()
        {
            self.skip_balanced()?;
            // expression columns never match a plain column name
            "<expression>".to_string()
        } else {
            self.identifier()?
        };

        if self.tokens.accept(&[Expected::Kw(kw::COLLATE)])?.is_some() {
            self.naming_chain()?;
        }
        // operator class, possibly schema-qualified; NULLS starts its own
        // clause and is not an opclass
        if self.tokens.matches(&[Expected::Kind(TokenKind::Identifier)])
            && !self.tokens.matches(&[Expected::Word(kw::NULLS)])
        {
            self.naming_chain()?;
        }

        let ascending = if self.tokens.accept(&[Expected::Kw(kw::ASC)])?.is_some() {
            true
        } else {
            self.tokens.accept(&[Expected::Kw(kw::DESC)])?.is_none()
        };

        if self.tokens.accept(&[Expected::Word(kw::NULLS)])?.is_some() {
            self.tokens
                .expect(&[Expected::Kw(kw::FIRST), Expected::Kw(kw::LAST)])?;
        }

        Ok(IndexColumn { name, ascending })
    }

    /// Consumes tokens until the parenthesis depth opened by the caller
    /// closes. The opening `(` has already been consumed.
    fn skip_balanced(&mut self) -> Result<(), ParseError> {
        let mut depth = 1usize;
        loop {
            if self.tokens.at_end() {
                return Err(ParseError::Syntax(
                    "unbalanced parentheses in index expression".to_string(),
                ));
            }
            if self.tokens.matches(&[Expected::Sym(Symbol::LeftParen)]) {
                depth += 1;
            } else if self.tokens.matches(&[Expected::Sym(Symbol::RightParen)]) {
                depth -= 1;
                if depth == 0 {
                    self.tokens.advance();
                    return Ok(());
                }
            }
            self.tokens.advance();
        }
    }
}
