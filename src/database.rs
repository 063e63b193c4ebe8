//! Database abstraction layer for the federated sources.
//!
//! Each configured endpoint is a [`Dbms`]: a named server of one of the
//! supported kinds holding one connection pool per database. Catalog
//! introspection and row fetching go through the [`CatalogProvider`] trait,
//! implemented per backend in `database_postgresql`, `database_mysql` and
//! `database_sqlite`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EndpointConfig;
use crate::error::EngineError;
use crate::schema::{ColumnType, Index, Value};

/// Supported database kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DbmsKind {
    #[serde(rename = "psql")]
    PostgreSql,
    #[serde(rename = "mysql")]
    MySql,
    #[serde(rename = "sqlite")]
    Sqlite,
}

impl DbmsKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            DbmsKind::PostgreSql => "PostgreSQL",
            DbmsKind::MySql => "MySQL",
            DbmsKind::Sqlite => "SQLite",
        }
    }

    pub fn default_port(&self) -> Option<u16> {
        match self {
            DbmsKind::PostgreSql => Some(5432),
            DbmsKind::MySql => Some(3306),
            DbmsKind::Sqlite => None,
        }
    }

    /// Identifier quoting for SQL sent to this backend.
    pub fn quote_ident(&self, ident: &str) -> String {
        match self {
            DbmsKind::PostgreSql | DbmsKind::Sqlite => {
                format!("\"{}\"", ident.replace('"', "\"\""))
            }
            DbmsKind::MySql => format!("`{}`", ident.replace('`', "``")),
        }
    }
}

impl fmt::Display for DbmsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Catalog introspection and row retrieval for one database of one endpoint.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Schema names of the connected database.
    async fn schemas(&self) -> Result<Vec<String>, EngineError>;

    /// Tables of a schema.
    async fn tables(&self, schema: &str) -> Result<Vec<String>, EngineError>;

    /// Columns of a table as `(name, nullable, declared type)`, ordered by
    /// ordinal position.
    async fn columns(
        &self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<(String, bool, String)>, EngineError>;

    /// BTREE indexes of a table; other access methods are dropped.
    async fn indexes(&self, schema: &str, table: &str) -> Result<Vec<Index>, EngineError>;

    /// Existence check: `SELECT * FROM schema.table LIMIT 1`.
    async fn probe(&self, schema: &str, table: &str) -> Result<(), EngineError>;

    /// Runs a projection query; `types` gives the expected column types in
    /// select-list order.
    async fn fetch(
        &self,
        sql: &str,
        types: &[ColumnType],
    ) -> Result<Vec<Vec<Value>>, EngineError>;
}

/// A configured DBMS endpoint with one pool per database name.
///
/// Pools outlive individual queries; they are closed when the engine shuts
/// down.
pub struct Dbms {
    pub name: String,
    pub kind: DbmsKind,
    config: EndpointConfig,
    pools: HashMap<String, Arc<dyn CatalogProvider>>,
}

impl Dbms {
    pub fn new(name: String, config: EndpointConfig) -> Self {
        Dbms {
            name,
            kind: config.kind,
            config,
            pools: HashMap::new(),
        }
    }

    /// Returns the provider for `database`, opening a pool on first use.
    pub async fn connect(
        &mut self,
        database: &str,
    ) -> Result<Arc<dyn CatalogProvider>, EngineError> {
        if let Some(provider) = self.pools.get(database) {
            return Ok(Arc::clone(provider));
        }
        debug!(
            "opening {} connection to {}/{database}",
            self.kind, self.name
        );
        let provider = create_catalog_provider(&self.config, database).await?;
        self.pools.insert(database.to_string(), Arc::clone(&provider));
        Ok(provider)
    }

    pub fn open_databases(&self) -> impl Iterator<Item = &str> {
        self.pools.keys().map(String::as_str)
    }
}

/// Factory: opens a pool for one database of an endpoint and wraps it in the
/// backend-specific provider.
pub async fn create_catalog_provider(
    config: &EndpointConfig,
    database: &str,
) -> Result<Arc<dyn CatalogProvider>, EngineError> {
    match config.kind {
        DbmsKind::PostgreSql => {
            let provider =
                crate::database_postgresql::PostgresCatalog::connect(config, database).await?;
            Ok(Arc::new(provider))
        }
        DbmsKind::MySql => {
            let provider =
                crate::database_mysql::MySqlCatalog::connect(config, database).await?;
            Ok(Arc::new(provider))
        }
        DbmsKind::Sqlite => {
            let provider =
                crate::database_sqlite::SqliteCatalog::connect(config).await?;
            Ok(Arc::new(provider))
        }
    }
}
