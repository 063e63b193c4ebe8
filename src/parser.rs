//! Recursive-descent SQL parser with bounded backtracking.
//!
//! The grammar (a SQL:1999 subset restricted to `SELECT`) is not LL(1);
//! productions with overlapping FIRST sets go through [`Parser::choose`],
//! which snapshots the lexer, runs every alternative, and keeps the one that
//! consumed the most tokens (ties favor the earlier alternative). Log
//! messages produced inside an alternative are buffered and only replayed if
//! that alternative wins.

use std::fmt;

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::expression::{CmpOp, Expr, LogicOp, Truth};
use crate::keywords as kw;
use crate::lexer::{Interval, Lexer, LexerState};
use crate::naming::NamingChain;
use crate::symbols::Symbol;
use crate::token::{Token, TokenKind, TokenValue};

/// Parser-level failure.
#[derive(Error, Debug, Clone)]
pub enum ParseError {
    /// Recoverable mismatch; [`Parser::choose`] backtracks over these.
    #[error("{0}")]
    Syntax(String),
    /// No recovery possible; aborts the query.
    #[error("{0}")]
    Fatal(String),
    #[error("{0} is not supported")]
    NotSupported(&'static str),
}

/// What a consume operation is willing to accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    Kind(TokenKind),
    Kw(&'static str),
    Sym(Symbol),
    /// A plain identifier with this exact (case-insensitive) text; used for
    /// words like `INDEX` that SQL:1999 does not reserve.
    Word(&'static str),
}

impl Expected {
    fn matches(&self, token: &Token) -> bool {
        match self {
            Expected::Kind(kind) => token.kind == *kind,
            Expected::Kw(word) => token.kind == TokenKind::Keyword && token.keyword() == *word,
            Expected::Sym(sym) => token.symbol == Some(*sym),
            Expected::Word(word) => {
                token.kind == TokenKind::Identifier && token.keyword() == *word
            }
        }
    }
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expected::Kind(kind) => write!(f, "{kind}"),
            Expected::Kw(word) => write!(f, "{word}"),
            Expected::Sym(sym) => write!(f, "`{sym}`"),
            Expected::Word(word) => write!(f, "{word}"),
        }
    }
}

/// Buffered log sink scoped by the backtracking combinator.
///
/// An ERROR-level message marks the whole parse as crashed; the combinator
/// snapshots and restores that flag so failed alternatives do not poison the
/// winner's state.
#[derive(Debug, Default)]
pub struct ParseLog {
    scopes: Vec<Vec<(tracing::Level, String)>>,
    crashed: bool,
}

impl ParseLog {
    pub fn crashed(&self) -> bool {
        self.crashed
    }

    pub fn set_crashed(&mut self, crashed: bool) {
        self.crashed = crashed;
    }

    pub fn warn(&mut self, msg: String) {
        self.emit(tracing::Level::WARN, msg);
    }

    pub fn error(&mut self, msg: String) {
        self.crashed = true;
        self.emit(tracing::Level::ERROR, msg);
    }

    fn emit(&mut self, level: tracing::Level, msg: String) {
        match self.scopes.last_mut() {
            Some(scope) => scope.push((level, msg)),
            None => Self::flush_one(level, &msg),
        }
    }

    fn flush_one(level: tracing::Level, msg: &str) {
        match level {
            tracing::Level::ERROR => error!("{msg}"),
            tracing::Level::WARN => warn!("{msg}"),
            _ => debug!("{msg}"),
        }
    }

    fn begin_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    fn take_scope(&mut self) -> Vec<(tracing::Level, String)> {
        self.scopes.pop().unwrap_or_default()
    }

    fn replay(&mut self, buffer: Vec<(tracing::Level, String)>) {
        match self.scopes.last_mut() {
            Some(scope) => scope.extend(buffer),
            None => {
                for (level, msg) in buffer {
                    Self::flush_one(level, &msg);
                }
            }
        }
    }
}

/// Match-and-consume layer over the lexer.
///
/// Three consumption modes: [`TokenStream::expect`] (strict — mismatch logs
/// an error and fails), [`TokenStream::expect_safe`] (mismatch logs a
/// warning but consumes anyway) and [`TokenStream::accept`] (mismatch leaves
/// the token in place). [`TokenStream::matches`] tests without consuming.
#[derive(Debug)]
pub struct TokenStream {
    lexer: Lexer,
    pub log: ParseLog,
}

impl TokenStream {
    pub fn new(lexer: Lexer) -> Self {
        TokenStream {
            lexer,
            log: ParseLog::default(),
        }
    }

    /// Primes the stream onto the first token set.
    pub fn prime(&mut self) {
        self.lexer.next();
    }

    pub fn interval(&self) -> Interval {
        self.lexer.interval()
    }

    pub fn last_interval(&self) -> Interval {
        self.lexer.last_interval()
    }

    pub fn offset(&self) -> usize {
        self.lexer.offset()
    }

    fn save(&self) -> (LexerState, bool) {
        (self.lexer.state(), self.log.crashed())
    }

    fn restore(&mut self, state: &(LexerState, bool)) {
        self.lexer.restore(state.0.clone());
        self.log.set_crashed(state.1);
    }

    fn find(&self, targets: &[Expected]) -> Option<Token> {
        self.lexer
            .current()
            .iter()
            .find(|token| targets.iter().any(|t| t.matches(token)))
            .cloned()
    }

    fn mismatch_message(&self, targets: &[Expected]) -> String {
        let found = self
            .lexer
            .current()
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let wanted = targets
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "{} expected {wanted}, found {}",
            self.lexer.interval(),
            if found.is_empty() { "nothing".to_string() } else { found }
        )
    }

    fn decode(&mut self, token: &Token) -> Result<TokenValue, ParseError> {
        token.decode().map_err(|err| {
            let msg = format!("{} {err}", token.interval);
            self.log.warn(msg.clone());
            ParseError::Syntax(msg)
        })
    }

    /// Non-consuming membership test against the current token set.
    pub fn matches(&self, targets: &[Expected]) -> bool {
        self.find(targets).is_some()
    }

    /// Whether the current token reads as an identifier that is not a
    /// reserved word. Reserved words still lex as identifiers (schema names
    /// like `public` are reserved), but positions such as an implicit alias
    /// or the start of a column reference must not swallow them.
    pub fn unreserved_identifier(&self) -> bool {
        let tokens = self.lexer.current();
        tokens.iter().any(|t| t.kind == TokenKind::Identifier)
            && !tokens
                .iter()
                .any(|t| t.kind == TokenKind::Keyword && t.is_reserved)
    }

    pub fn at_end(&self) -> bool {
        self.matches(&[Expected::Kind(TokenKind::End)])
    }

    /// Consumes the current token set unconditionally.
    pub fn advance(&mut self) {
        self.lexer.next();
    }

    /// Strict mode: consume and decode, or log an error and fail.
    pub fn expect(&mut self, targets: &[Expected]) -> Result<TokenValue, ParseError> {
        match self.find(targets) {
            Some(token) => {
                let value = self.decode(&token)?;
                self.lexer.next();
                Ok(value)
            }
            None => {
                let msg = self.mismatch_message(targets);
                self.log.error(msg.clone());
                Err(ParseError::Syntax(msg))
            }
        }
    }

    /// Safe mode: on mismatch log a warning but consume and move on.
    pub fn expect_safe(&mut self, targets: &[Expected]) -> Result<Option<TokenValue>, ParseError> {
        match self.find(targets) {
            Some(token) => {
                let value = self.decode(&token)?;
                self.lexer.next();
                Ok(Some(value))
            }
            None => {
                let msg = self.mismatch_message(targets);
                self.log.warn(msg);
                self.lexer.next();
                Ok(None)
            }
        }
    }

    /// Optional mode: consume only on match.
    pub fn accept(&mut self, targets: &[Expected]) -> Result<Option<TokenValue>, ParseError> {
        match self.find(targets) {
            Some(token) => {
                let value = self.decode(&token)?;
                self.lexer.next();
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

/// Select list of a parsed query.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectList {
    /// `SELECT *`
    All,
    Items(Vec<SelectItem>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    /// `chain.*`
    QualifiedStar(NamingChain),
    Expr { expr: Expr, alias: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Cross,
    Inner,
    Left,
    Right,
    Full,
}

/// One FROM-clause factor: a named table or a join tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TableRef {
    Named(NamingChain),
    Join(Box<JoinNode>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinNode {
    pub kind: JoinKind,
    pub left: TableRef,
    pub right: TableRef,
    /// `ON` search condition; `None` for cross joins.
    pub spec: Option<Expr>,
}

/// Parsed `SELECT` statement, input to the binder.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStmt {
    pub select_list: SelectList,
    pub from: Vec<TableRef>,
    pub where_clause: Option<Expr>,
}

type Alt<T> = fn(&mut Parser) -> Result<T, ParseError>;

pub struct Parser {
    tokens: TokenStream,
}

impl Parser {
    pub fn new(source: &str) -> Self {
        Parser {
            tokens: TokenStream::new(Lexer::new(source)),
        }
    }

    pub fn log(&self) -> &ParseLog {
        &self.tokens.log
    }

    /// Runs every alternative from the same snapshot and keeps the one that
    /// consumed the most input; ties go to the earliest alternative. Buffered
    /// logs of losers are discarded, the winner's are replayed.
    fn choose<T>(&mut self, alts: &[(&'static str, Alt<T>)]) -> Result<T, ParseError> {
        let start = self.tokens.save();
        let mut winner: Option<(usize, T, LexerState, Vec<(tracing::Level, String)>)> = None;
        let mut failures: Vec<(&'static str, ParseError)> = Vec::new();

        for (name, alt) in alts {
            self.tokens.log.begin_scope();
            match alt(self) {
                Ok(value) => {
                    let buffer = self.tokens.log.take_scope();
                    let end = self.tokens.offset();
                    if winner.as_ref().is_none_or(|w| end > w.0) {
                        winner = Some((end, value, self.tokens.lexer.state(), buffer));
                    }
                }
                // a fatal error from a nested choice point is still just a
                // failed alternative here; only NotSupported propagates
                Err(err @ (ParseError::Syntax(_) | ParseError::Fatal(_))) => {
                    self.tokens.log.take_scope();
                    failures.push((name, err));
                }
                Err(not_supported) => {
                    self.tokens.log.take_scope();
                    self.tokens.restore(&start);
                    return Err(not_supported);
                }
            }
            self.tokens.restore(&start);
        }

        match winner {
            Some((_, value, state, buffer)) => {
                self.tokens.lexer.restore(state);
                self.tokens.log.set_crashed(start.1);
                self.tokens.log.replay(buffer);
                Ok(value)
            }
            None => {
                let msg = format!(
                    "no alternative matched:\n{}",
                    failures
                        .iter()
                        .map(|(name, err)| format!("  {name}: {err}"))
                        .collect::<Vec<_>>()
                        .join("\n")
                );
                self.tokens.log.error(msg.clone());
                Err(ParseError::Fatal(msg))
            }
        }
    }

    /// Entry point: `<direct SQL statement>` restricted to a query
    /// specification, optionally terminated by `;`.
    pub fn parse_statement(&mut self) -> Result<SelectStmt, ParseError> {
        self.tokens.prime();

        let stmt = if self.tokens.matches(&[Expected::Kw(kw::SELECT)]) {
            self.select()?
        } else if self.tokens.matches(&[Expected::Kw(kw::INSERT)]) {
            return Err(ParseError::NotSupported("INSERT"));
        } else if self.tokens.matches(&[Expected::Kw(kw::UPDATE)]) {
            return Err(ParseError::NotSupported("UPDATE"));
        } else if self.tokens.matches(&[Expected::Kw(kw::DELETE)]) {
            return Err(ParseError::NotSupported("DELETE"));
        } else {
            let msg = self
                .tokens
                .mismatch_message(&[Expected::Kw(kw::SELECT)]);
            self.tokens.log.error(msg.clone());
            return Err(ParseError::Fatal(msg));
        };

        self.tokens.accept(&[Expected::Sym(Symbol::Semicolon)])?;
        match self.tokens.expect(&[Expected::Kind(TokenKind::End)]) {
            Ok(_) => Ok(stmt),
            Err(err) => Err(ParseError::Fatal(err.to_string())),
        }
    }

    // SELECT <select_list> <table_expression>
    fn select(&mut self) -> Result<SelectStmt, ParseError> {
        self.tokens.expect(&[Expected::Kw(kw::SELECT)])?;
        let select_list = self.select_list()?;
        let (from, where_clause) = self.table_expression()?;
        Ok(SelectStmt {
            select_list,
            from,
            where_clause,
        })
    }

    // <asterisk> | <select_sublist> [ { <comma> <select_sublist> }... ]
    fn select_list(&mut self) -> Result<SelectList, ParseError> {
        if self
            .tokens
            .accept(&[Expected::Sym(Symbol::Asterisk)])?
            .is_some()
        {
            return Ok(SelectList::All);
        }
        let mut items = vec![self.select_sublist()?];
        while self
            .tokens
            .accept(&[Expected::Sym(Symbol::Comma)])?
            .is_some()
        {
            items.push(self.select_sublist()?);
        }
        Ok(SelectList::Items(items))
    }

    // <qualified_asterisk> | <derived_column>; FIRST sets overlap
    fn select_sublist(&mut self) -> Result<SelectItem, ParseError> {
        self.choose(&[
            ("qualified_asterisk", Self::qualified_asterisk),
            ("derived_column", Self::derived_column),
        ])
    }

    // <asterisked_identifier_chain> <period> <asterisk>
    fn qualified_asterisk(&mut self) -> Result<SelectItem, ParseError> {
        let mut chain = NamingChain::new(self.identifier()?);
        self.tokens.expect(&[Expected::Sym(Symbol::Period)])?;
        while self.tokens.matches(&[Expected::Kind(TokenKind::Identifier)]) {
            chain.push_last(self.identifier()?);
            self.tokens.expect(&[Expected::Sym(Symbol::Period)])?;
        }
        self.tokens.expect(&[Expected::Sym(Symbol::Asterisk)])?;
        Ok(SelectItem::QualifiedStar(chain))
    }

    // <value_expression> [ [ AS ] <column name> ]
    fn derived_column(&mut self) -> Result<SelectItem, ParseError> {
        let expr = self.value_expression()?;
        let alias = if self.tokens.accept(&[Expected::Kw(kw::AS)])?.is_some() {
            Some(self.identifier()?)
        } else if self.tokens.unreserved_identifier() {
            Some(self.identifier()?)
        } else {
            None
        };
        Ok(SelectItem::Expr { expr, alias })
    }

    // <numeric_value_expression> | <boolean_value_expression>
    fn value_expression(&mut self) -> Result<Expr, ParseError> {
        self.choose(&[
            ("numeric_value_expression", Self::numeric_value_expression),
            ("boolean_value_expression", Self::boolean_value_expression),
        ])
    }

    // <term> [ ( '+' | '-' ) <numeric_value_expression> ]
    fn numeric_value_expression(&mut self) -> Result<Expr, ParseError> {
        let left = self.term()?;
        let op = if self
            .tokens
            .accept(&[Expected::Sym(Symbol::Plus)])?
            .is_some()
        {
            crate::expression::ArithOp::Add
        } else if self
            .tokens
            .accept(&[Expected::Sym(Symbol::Minus)])?
            .is_some()
        {
            crate::expression::ArithOp::Sub
        } else {
            return Ok(left);
        };
        let right = self.numeric_value_expression()?;
        Ok(Expr::Arith {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    // <factor> [ ( '*' | '/' ) <term> ]
    fn term(&mut self) -> Result<Expr, ParseError> {
        let left = self.factor()?;
        let op = if self
            .tokens
            .accept(&[Expected::Sym(Symbol::Asterisk)])?
            .is_some()
        {
            crate::expression::ArithOp::Mul
        } else if self
            .tokens
            .accept(&[Expected::Sym(Symbol::Solidus)])?
            .is_some()
        {
            crate::expression::ArithOp::Div
        } else {
            return Ok(left);
        };
        let right = self.term()?;
        Ok(Expr::Arith {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    // [ <sign> ] <numeric_primary>
    fn factor(&mut self) -> Result<Expr, ParseError> {
        let negative = match self
            .tokens
            .accept(&[Expected::Sym(Symbol::Plus), Expected::Sym(Symbol::Minus)])?
        {
            Some(TokenValue::Symbol(Symbol::Minus)) => true,
            _ => false,
        };
        let primary = self.value_expression_primary()?;
        Ok(if negative {
            Expr::Neg(Box::new(primary))
        } else {
            primary
        })
    }

    // <parenthesized_value_expression> | <nonparenthesized_...>
    fn value_expression_primary(&mut self) -> Result<Expr, ParseError> {
        if self.tokens.matches(&[Expected::Sym(Symbol::LeftParen)]) {
            self.parenthesized_value_expression()
        } else {
            self.nonparenthesized_primary()
        }
    }

    fn parenthesized_value_expression(&mut self) -> Result<Expr, ParseError> {
        self.tokens.expect(&[Expected::Sym(Symbol::LeftParen)])?;
        let expr = self.value_expression()?;
        self.tokens.expect(&[Expected::Sym(Symbol::RightParen)])?;
        Ok(expr)
    }

    // <column_reference> | <unsigned_literal>
    fn nonparenthesized_primary(&mut self) -> Result<Expr, ParseError> {
        if self.tokens.unreserved_identifier() {
            return Ok(Expr::column(self.identifier_chain()?));
        }
        self.unsigned_literal()
    }

    fn unsigned_literal(&mut self) -> Result<Expr, ParseError> {
        if self.tokens.accept(&[Expected::Kw(kw::TRUE)])?.is_some() {
            return Ok(Expr::Bool(true));
        }
        if self.tokens.accept(&[Expected::Kw(kw::FALSE)])?.is_some() {
            return Ok(Expr::Bool(false));
        }
        if self.tokens.accept(&[Expected::Kw(kw::NULL)])?.is_some() {
            return Ok(Expr::Null);
        }
        let value = self.tokens.expect(&[
            Expected::Kind(TokenKind::Datetime),
            Expected::Kind(TokenKind::Date),
            Expected::Kind(TokenKind::Int),
            Expected::Kind(TokenKind::Float),
            Expected::Kind(TokenKind::String),
        ])?;
        Ok(match value {
            TokenValue::Int(v) => Expr::Int(v),
            TokenValue::Float(v) => Expr::Float(v),
            TokenValue::Str(v) => Expr::Str(v),
            TokenValue::Date(v) => Expr::Date(v),
            TokenValue::Datetime(v) => Expr::Datetime(v),
            other => {
                return Err(ParseError::Syntax(format!(
                    "unexpected literal {other:?}"
                )));
            }
        })
    }

    // <boolean_term> [ OR <boolean_value_expression> ]
    fn boolean_value_expression(&mut self) -> Result<Expr, ParseError> {
        let left = self.boolean_term()?;
        if self.tokens.accept(&[Expected::Kw(kw::OR)])?.is_some() {
            let right = self.boolean_value_expression()?;
            return Ok(Expr::Logic {
                op: LogicOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    // <boolean_factor> [ AND <boolean_term> ]
    fn boolean_term(&mut self) -> Result<Expr, ParseError> {
        let left = self.boolean_factor()?;
        if self.tokens.accept(&[Expected::Kw(kw::AND)])?.is_some() {
            let right = self.boolean_term()?;
            return Ok(Expr::Logic {
                op: LogicOp::And,
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    // [ NOT ] <boolean_test>
    fn boolean_factor(&mut self) -> Result<Expr, ParseError> {
        let negated = self.tokens.accept(&[Expected::Kw(kw::NOT)])?.is_some();
        let test = self.boolean_test()?;
        Ok(if negated {
            Expr::Not(Box::new(test))
        } else {
            test
        })
    }

    // <boolean_primary> [ IS [ NOT ] <truth_value> ]
    fn boolean_test(&mut self) -> Result<Expr, ParseError> {
        let primary = self.boolean_primary()?;
        if self.tokens.accept(&[Expected::Kw(kw::IS)])?.is_some() {
            let negated = self.tokens.accept(&[Expected::Kw(kw::NOT)])?.is_some();
            let truth = self.truth_value()?;
            let is = Expr::Is {
                expr: Box::new(primary),
                truth,
            };
            return Ok(if negated { Expr::Not(Box::new(is)) } else { is });
        }
        Ok(primary)
    }

    // TRUE | FALSE | NULL (the standard spells the last one UNKNOWN)
    fn truth_value(&mut self) -> Result<Truth, ParseError> {
        let value = self.tokens.expect(&[
            Expected::Kw(kw::TRUE),
            Expected::Kw(kw::FALSE),
            Expected::Kw(kw::NULL),
        ])?;
        Ok(match value {
            TokenValue::Keyword(word) if word == kw::TRUE => Truth::True,
            TokenValue::Keyword(word) if word == kw::FALSE => Truth::False,
            _ => Truth::Null,
        })
    }

    // <predicate> | <parenthesized_value_expression> | <nonparenthesized_...>
    fn boolean_primary(&mut self) -> Result<Expr, ParseError> {
        if self.tokens.matches(&[Expected::Sym(Symbol::LeftParen)]) {
            return self.choose(&[
                (
                    "parenthesized_value_expression",
                    Self::parenthesized_value_expression,
                ),
                ("predicate", Self::predicate),
            ]);
        }
        self.choose(&[
            ("predicate", Self::predicate),
            ("nonparenthesized_primary", Self::nonparenthesized_primary),
        ])
    }

    // <comparison_predicate>
    fn predicate(&mut self) -> Result<Expr, ParseError> {
        let left = self.comparison_operand()?;
        let op = self.comp_op()?;
        let right = self.comparison_operand()?;
        Ok(Expr::Cmp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn comparison_operand(&mut self) -> Result<Expr, ParseError> {
        if self.tokens.matches(&[Expected::Sym(Symbol::LeftParen)]) {
            return self.parenthesized_value_expression();
        }
        self.numeric_value_expression()
    }

    fn comp_op(&mut self) -> Result<CmpOp, ParseError> {
        let value = self.tokens.expect(&[
            Expected::Sym(Symbol::Equals),
            Expected::Sym(Symbol::NotEquals),
            Expected::Sym(Symbol::LessThanOrEquals),
            Expected::Sym(Symbol::GreaterThanOrEquals),
            Expected::Sym(Symbol::LessThan),
            Expected::Sym(Symbol::GreaterThan),
        ])?;
        match value {
            TokenValue::Symbol(sym) => CmpOp::from_symbol(sym)
                .ok_or_else(|| ParseError::Syntax(format!("`{sym}` is not a comparison"))),
            other => Err(ParseError::Syntax(format!(
                "unexpected comparison operator {other:?}"
            ))),
        }
    }

    fn identifier(&mut self) -> Result<String, ParseError> {
        match self.tokens.expect(&[Expected::Kind(TokenKind::Identifier)])? {
            TokenValue::Ident(name) => Ok(name),
            other => Err(ParseError::Syntax(format!(
                "unexpected identifier token {other:?}"
            ))),
        }
    }

    // <identifier> [ { <period> <identifier> }... ]
    fn identifier_chain(&mut self) -> Result<NamingChain, ParseError> {
        let mut chain = NamingChain::new(self.identifier()?);
        while self
            .tokens
            .accept(&[Expected::Sym(Symbol::Period)])?
            .is_some()
        {
            chain.push_last(self.identifier()?);
        }
        Ok(chain)
    }

    // <from_clause> [ <where_clause> ]; GROUP BY and HAVING parse as errors
    fn table_expression(&mut self) -> Result<(Vec<TableRef>, Option<Expr>), ParseError> {
        let from = self.from_clause()?;
        let where_clause = if self.tokens.matches(&[Expected::Kw(kw::WHERE)]) {
            Some(self.where_clause()?)
        } else {
            None
        };
        if self.tokens.matches(&[Expected::Kw(kw::GROUP)]) {
            return Err(ParseError::NotSupported("GROUP BY"));
        }
        if self.tokens.matches(&[Expected::Kw(kw::HAVING)]) {
            return Err(ParseError::NotSupported("HAVING"));
        }
        Ok((from, where_clause))
    }

    // FROM <table_reference> [ { <comma> <table_reference> }... ]
    fn from_clause(&mut self) -> Result<Vec<TableRef>, ParseError> {
        self.tokens.expect(&[Expected::Kw(kw::FROM)])?;
        let mut refs = vec![self.table_reference()?];
        while self
            .tokens
            .accept(&[Expected::Sym(Symbol::Comma)])?
            .is_some()
        {
            refs.push(self.table_reference()?);
        }
        Ok(refs)
    }

    // <join_factor> followed by any number of joined tables, folded left
    fn table_reference(&mut self) -> Result<TableRef, ParseError> {
        let mut acc = self.join_factor()?;
        while self.tokens.matches(&[
            Expected::Kw(kw::CROSS),
            Expected::Kw(kw::JOIN),
            Expected::Kw(kw::INNER),
            Expected::Kw(kw::LEFT),
            Expected::Kw(kw::RIGHT),
            Expected::Kw(kw::FULL),
        ]) {
            let (kind, right, spec) = self.joined_table()?;
            acc = TableRef::Join(Box::new(JoinNode {
                kind,
                left: acc,
                right,
                spec,
            }));
        }
        if self.tokens.matches(&[Expected::Kw(kw::USING)]) {
            return Err(ParseError::NotSupported("USING join"));
        }
        Ok(acc)
    }

    // <table_primary> | <left_paren> <table_reference> <right_paren>
    fn join_factor(&mut self) -> Result<TableRef, ParseError> {
        if self
            .tokens
            .accept(&[Expected::Sym(Symbol::LeftParen)])?
            .is_some()
        {
            let inner = self.table_reference()?;
            self.tokens.expect(&[Expected::Sym(Symbol::RightParen)])?;
            return Ok(inner);
        }
        self.table_primary()
    }

    // <table_or_query_name> [ [ AS ] <correlation_name> ]
    fn table_primary(&mut self) -> Result<TableRef, ParseError> {
        let mut chain = self.identifier_chain()?;
        if chain.len() > 4 {
            let msg = format!(
                "{} table name {chain} has more than four parts",
                self.tokens.last_interval()
            );
            self.tokens.log.error(msg.clone());
            return Err(ParseError::Syntax(msg));
        }
        let alias = if self.tokens.accept(&[Expected::Kw(kw::AS)])?.is_some() {
            Some(self.identifier()?)
        } else if self.tokens.unreserved_identifier() {
            Some(self.identifier()?)
        } else {
            None
        };
        chain.set_alias(alias);
        Ok(TableRef::Named(chain))
    }

    // <cross_join> | <qualified_join>
    fn joined_table(&mut self) -> Result<(JoinKind, TableRef, Option<Expr>), ParseError> {
        if self.tokens.accept(&[Expected::Kw(kw::CROSS)])?.is_some() {
            self.tokens.expect(&[Expected::Kw(kw::JOIN)])?;
            let right = self.join_factor()?;
            return Ok((JoinKind::Cross, right, None));
        }
        let kind = self.join_type()?;
        self.tokens.expect(&[Expected::Kw(kw::JOIN)])?;
        let right = self.join_factor()?;
        if self.tokens.matches(&[Expected::Kw(kw::USING)]) {
            return Err(ParseError::NotSupported("USING join"));
        }
        self.tokens.expect(&[Expected::Kw(kw::ON)])?;
        let spec = self.boolean_value_expression()?;
        Ok((kind, right, Some(spec)))
    }

    // INNER | { LEFT | RIGHT | FULL } [ OUTER ]; a bare JOIN is LEFT
    fn join_type(&mut self) -> Result<JoinKind, ParseError> {
        if self.tokens.accept(&[Expected::Kw(kw::INNER)])?.is_some() {
            return Ok(JoinKind::Inner);
        }
        let kind = if self.tokens.accept(&[Expected::Kw(kw::LEFT)])?.is_some() {
            Some(JoinKind::Left)
        } else if self.tokens.accept(&[Expected::Kw(kw::RIGHT)])?.is_some() {
            Some(JoinKind::Right)
        } else if self.tokens.accept(&[Expected::Kw(kw::FULL)])?.is_some() {
            Some(JoinKind::Full)
        } else {
            None
        };
        match kind {
            Some(kind) => {
                self.tokens.accept(&[Expected::Kw(kw::OUTER)])?;
                Ok(kind)
            }
            None => Ok(JoinKind::Left),
        }
    }

    // WHERE <search_condition>
    fn where_clause(&mut self) -> Result<Expr, ParseError> {
        self.tokens.expect(&[Expected::Kw(kw::WHERE)])?;
        self.boolean_value_expression()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::ArithOp;
    use rstest::rstest;

    fn parse(sql: &str) -> Result<SelectStmt, ParseError> {
        Parser::new(sql).parse_statement()
    }

    fn col(parts: &[&str]) -> Expr {
        Expr::column(NamingChain::from_parts(
            parts.iter().map(|p| p.to_string()).collect(),
        ))
    }

    #[rstest]
    fn parses_star_select() {
        let stmt = parse("SELECT * FROM db1.s.t;").unwrap();
        assert_eq!(stmt.select_list, SelectList::All);
        assert_eq!(stmt.from.len(), 1);
        assert!(stmt.where_clause.is_none());
    }

    #[rstest]
    fn parses_columns_and_where() {
        let stmt = parse("SELECT t.a, t.b FROM db1.s.t WHERE t.a = 1 AND t.b IS NULL").unwrap();
        let SelectList::Items(items) = &stmt.select_list else {
            panic!("expected item list");
        };
        assert_eq!(items.len(), 2);
        let expected = Expr::Logic {
            op: LogicOp::And,
            left: Box::new(Expr::Cmp {
                op: CmpOp::Eq,
                left: Box::new(col(&["t", "a"])),
                right: Box::new(Expr::Int(1)),
            }),
            right: Box::new(Expr::Is {
                expr: Box::new(col(&["t", "b"])),
                truth: Truth::Null,
            }),
        };
        assert_eq!(stmt.where_clause, Some(expected));
    }

    #[rstest]
    fn arithmetic_nests_to_the_right() {
        let stmt = parse("SELECT a + b + c FROM t").unwrap();
        let SelectList::Items(items) = &stmt.select_list else {
            panic!();
        };
        let SelectItem::Expr { expr, .. } = &items[0] else {
            panic!();
        };
        assert_eq!(
            *expr,
            Expr::Arith {
                op: ArithOp::Add,
                left: Box::new(col(&["a"])),
                right: Box::new(Expr::Arith {
                    op: ArithOp::Add,
                    left: Box::new(col(&["b"])),
                    right: Box::new(col(&["c"])),
                }),
            }
        );
    }

    #[rstest]
    fn joins_fold_to_the_left() {
        let stmt = parse("SELECT * FROM t JOIN u ON a = b JOIN v ON c = d").unwrap();
        let TableRef::Join(outer) = &stmt.from[0] else {
            panic!("expected join");
        };
        let TableRef::Join(inner) = &outer.left else {
            panic!("expected nested join on the left");
        };
        assert!(matches!(inner.left, TableRef::Named(_)));
        assert!(matches!(inner.right, TableRef::Named(_)));
        assert!(matches!(outer.right, TableRef::Named(_)));
    }

    #[rstest]
    fn comma_list_is_separate_references() {
        let stmt = parse("SELECT * FROM db1.s.t1, db2.s.t2 WHERE t1.k = t2.k").unwrap();
        assert_eq!(stmt.from.len(), 2);
        assert!(matches!(stmt.from[0], TableRef::Named(_)));
        assert!(matches!(stmt.from[1], TableRef::Named(_)));
        assert!(stmt.where_clause.is_some());
    }

    #[rstest]
    fn table_alias_forms() {
        let stmt = parse("SELECT x.a FROM db1.s.t AS x INNER JOIN db2.s.u y ON x.a = y.a")
            .unwrap();
        let TableRef::Join(join) = &stmt.from[0] else {
            panic!();
        };
        assert_eq!(join.kind, JoinKind::Inner);
        let TableRef::Named(left) = &join.left else {
            panic!();
        };
        let TableRef::Named(right) = &join.right else {
            panic!();
        };
        assert_eq!(left.alias(), Some("x"));
        assert_eq!(right.alias(), Some("y"));
    }

    #[rstest]
    fn qualified_star_in_select_list() {
        let stmt = parse("SELECT t.*, u.a FROM s.t, s.u").unwrap();
        let SelectList::Items(items) = &stmt.select_list else {
            panic!();
        };
        assert!(matches!(items[0], SelectItem::QualifiedStar(_)));
        assert!(matches!(items[1], SelectItem::Expr { .. }));
    }

    #[rstest]
    fn select_alias_with_and_without_as() {
        let stmt = parse("SELECT a + 1 AS total, b extra FROM t").unwrap();
        let SelectList::Items(items) = &stmt.select_list else {
            panic!();
        };
        let SelectItem::Expr { alias, .. } = &items[0] else {
            panic!();
        };
        assert_eq!(alias.as_deref(), Some("total"));
        let SelectItem::Expr { alias, .. } = &items[1] else {
            panic!();
        };
        assert_eq!(alias.as_deref(), Some("extra"));
    }

    #[rstest]
    fn bare_join_defaults_to_left() {
        let stmt = parse("SELECT * FROM t JOIN u ON a = b").unwrap();
        let TableRef::Join(join) = &stmt.from[0] else {
            panic!();
        };
        assert_eq!(join.kind, JoinKind::Left);
    }

    #[rstest]
    #[case("SELECT * FROM t FULL OUTER JOIN u ON a = b", JoinKind::Full)]
    #[case("SELECT * FROM t RIGHT JOIN u ON a = b", JoinKind::Right)]
    #[case("SELECT * FROM t CROSS JOIN u", JoinKind::Cross)]
    fn join_kinds(#[case] sql: &str, #[case] expected: JoinKind) {
        let stmt = parse(sql).unwrap();
        let TableRef::Join(join) = &stmt.from[0] else {
            panic!();
        };
        assert_eq!(join.kind, expected);
    }

    #[rstest]
    fn parenthesized_table_reference() {
        let stmt = parse("SELECT * FROM (t JOIN u ON a = b) JOIN v ON c = d").unwrap();
        let TableRef::Join(outer) = &stmt.from[0] else {
            panic!();
        };
        assert!(matches!(outer.left, TableRef::Join(_)));
    }

    #[rstest]
    #[case("INSERT INTO t VALUES (1)")]
    #[case("UPDATE t SET a = 1")]
    #[case("DELETE FROM t")]
    #[case("SELECT a FROM t GROUP BY a")]
    fn unsupported_statements(#[case] sql: &str) {
        assert!(matches!(parse(sql), Err(ParseError::NotSupported(_))));
    }

    #[rstest]
    #[case("SELECT FROM t")]
    #[case("SELECT a FROM")]
    #[case("SELECT a FROM t WHERE")]
    #[case("SELECT a, FROM t")]
    fn fatal_on_malformed_input(#[case] sql: &str) {
        assert!(parse(sql).is_err());
    }

    #[rstest]
    fn trailing_garbage_is_fatal() {
        assert!(matches!(
            parse("SELECT a FROM t extra junk here"),
            Err(ParseError::Fatal(_))
        ));
    }

    #[rstest]
    fn not_of_predicate() {
        let stmt = parse("SELECT * FROM t WHERE NOT a = b").unwrap();
        assert!(matches!(stmt.where_clause, Some(Expr::Not(_))));
    }

    #[rstest]
    fn is_not_wraps_in_not() {
        let stmt = parse("SELECT * FROM t WHERE a IS NOT NULL").unwrap();
        let Some(Expr::Not(inner)) = stmt.where_clause else {
            panic!();
        };
        assert!(matches!(*inner, Expr::Is { .. }));
    }

    #[rstest]
    fn where_accepts_parenthesized_condition() {
        let stmt = parse("SELECT * FROM t WHERE (a = 1 OR b = 2) AND c = 3").unwrap();
        let Some(Expr::Logic { op, .. }) = stmt.where_clause else {
            panic!();
        };
        assert_eq!(op, LogicOp::And);
    }

    #[rstest]
    fn literal_forms() {
        let stmt = parse(
            "SELECT 1, 1.5, 'text', '2020-01-02', '2020-01-02 10:11:12', TRUE, NULL FROM t",
        )
        .unwrap();
        let SelectList::Items(items) = &stmt.select_list else {
            panic!();
        };
        assert_eq!(items.len(), 7);
        let kinds: Vec<&Expr> = items
            .iter()
            .map(|i| match i {
                SelectItem::Expr { expr, .. } => expr,
                _ => panic!(),
            })
            .collect();
        assert!(matches!(kinds[0], Expr::Int(1)));
        assert!(matches!(kinds[1], Expr::Float(_)));
        assert!(matches!(kinds[2], Expr::Str(_)));
        assert!(matches!(kinds[3], Expr::Date(_)));
        assert!(matches!(kinds[4], Expr::Datetime(_)));
        assert!(matches!(kinds[5], Expr::Bool(true)));
        assert!(matches!(kinds[6], Expr::Null));
    }

    #[rstest]
    fn negative_literal_in_predicate() {
        let stmt = parse("SELECT * FROM t WHERE a = -5").unwrap();
        let Some(Expr::Cmp { right, .. }) = stmt.where_clause else {
            panic!();
        };
        assert_eq!(*right, Expr::Neg(Box::new(Expr::Int(5))));
    }

    #[rstest]
    fn choose_prefers_longest_parse() {
        // `t.a = 1` must parse as a predicate (3+ tokens), not stop at the
        // column reference
        let stmt = parse("SELECT * FROM t WHERE t.a = 1").unwrap();
        assert!(matches!(stmt.where_clause, Some(Expr::Cmp { .. })));
    }

    fn tag_first(p: &mut Parser) -> Result<&'static str, ParseError> {
        p.identifier().map(|_| "first")
    }

    fn tag_second(p: &mut Parser) -> Result<&'static str, ParseError> {
        p.identifier().map(|_| "second")
    }

    fn tag_chain(p: &mut Parser) -> Result<&'static str, ParseError> {
        p.identifier_chain().map(|_| "chain")
    }

    #[rstest]
    fn equally_long_alternatives_pick_the_earliest() {
        let mut parser = Parser::new("abc");
        parser.tokens.prime();
        let tag = parser
            .choose(&[("first", tag_first as Alt<_>), ("second", tag_second)])
            .unwrap();
        assert_eq!(tag, "first");
    }

    #[rstest]
    fn longer_alternative_beats_earlier_one() {
        let mut parser = Parser::new("a.b");
        parser.tokens.prime();
        let tag = parser
            .choose(&[("short", tag_first as Alt<_>), ("chain", tag_chain)])
            .unwrap();
        assert_eq!(tag, "chain");
    }

    #[rstest]
    fn safe_mode_warns_but_consumes() {
        let mut tokens = TokenStream::new(Lexer::new("a b"));
        tokens.prime();
        let missed = tokens
            .expect_safe(&[Expected::Sym(Symbol::Comma)])
            .unwrap();
        assert!(missed.is_none());
        // the mismatching token was consumed anyway
        let next = tokens
            .expect(&[Expected::Kind(TokenKind::Identifier)])
            .unwrap();
        assert_eq!(next, TokenValue::Ident("b".to_string()));
        assert!(!tokens.log.crashed());
    }

    #[rstest]
    fn backtracking_restores_crash_flag() {
        let mut parser = Parser::new("SELECT t.* FROM s.t");
        let stmt = parser.parse_statement().unwrap();
        // derived_column lost inside choose; its buffered error must not
        // leave the parse marked as crashed
        assert!(!parser.log().crashed());
        let SelectList::Items(items) = stmt.select_list else {
            panic!();
        };
        assert!(matches!(items[0], SelectItem::QualifiedStar(_)));
    }
}
