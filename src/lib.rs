//! Federated SQL query engine.
//!
//! Accepts a SQL:1999 `SELECT` subset over tables living in different
//! DBMSs, addressed as `dbms.database.schema.table`. A query is parsed,
//! bound against live catalog metadata, rewritten into per-source
//! selections, materialized into a local SQLite mirror and joined there.

pub mod binder;
pub mod config;
pub mod database;
pub mod database_mysql;
pub mod database_postgresql;
pub mod database_sqlite;
pub mod engine;
pub mod error;
pub mod expression;
pub mod format;
pub mod index_parser;
pub mod join;
pub mod keywords;
pub mod lexer;
pub mod naming;
pub mod parser;
pub mod rewrite;
pub mod schema;
pub mod symbols;
pub mod token;

pub use config::Config;
pub use engine::{Engine, QueryOutcome};
pub use error::EngineError;
