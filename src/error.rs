//! Engine-wide error kinds.

use thiserror::Error;

/// Errors that abort a query.
///
/// Recoverable syntax mismatches never reach this type; they are handled by
/// the parser's backtracking combinator (see [`crate::parser::ParseError`]).
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("syntax error: {0}")]
    FatalSyntax(String),

    #[error("{0} is not supported")]
    NotSupported(&'static str),

    #[error("semantic error: {0}")]
    Semantic(String),

    #[error("internal invariant violated: {0}")]
    Unreachable(&'static str),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown DBMS endpoint: {0}")]
    UnknownEndpoint(String),

    #[error("driver error: {0}")]
    Driver(#[from] sqlx::Error),
}

impl EngineError {
    pub fn semantic(msg: impl Into<String>) -> Self {
        EngineError::Semantic(msg.into())
    }
}
