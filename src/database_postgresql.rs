//! PostgreSQL implementation of the catalog provider.

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, warn};

use crate::config::EndpointConfig;
use crate::database::CatalogProvider;
use crate::error::EngineError;
use crate::index_parser::IndexParser;
use crate::schema::{ColumnType, Index, IndexKind, Value};

pub struct PostgresCatalog {
    pool: PgPool,
}

impl PostgresCatalog {
    pub async fn connect(
        config: &EndpointConfig,
        database: &str,
    ) -> Result<Self, EngineError> {
        let mut options = PgConnectOptions::new();
        if let Some(server) = &config.server {
            options = options.host(server);
        }
        if let Some(port) = config.port.or(config.kind.default_port()) {
            options = options.port(port);
        }
        if let Some(user) = &config.user {
            options = options.username(user);
        }
        if let Some(password) = &config.password {
            options = options.password(password);
        }
        options = options.database(database);

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(PostgresCatalog { pool })
    }

    fn quote(ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }
}

#[async_trait]
impl CatalogProvider for PostgresCatalog {
    async fn schemas(&self) -> Result<Vec<String>, EngineError> {
        let rows = sqlx::query("SELECT schema_name FROM information_schema.schemata")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get::<String, _>(0)).collect())
    }

    async fn tables(&self, schema: &str) -> Result<Vec<String>, EngineError> {
        let rows = sqlx::query(
            "SELECT table_name FROM information_schema.tables WHERE table_schema = $1",
        )
        .bind(schema)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|r| r.get::<String, _>(0)).collect())
    }

    async fn columns(
        &self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<(String, bool, String)>, EngineError> {
        let rows = sqlx::query(
            r#"
            SELECT column_name, is_nullable, data_type
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position
            "#,
        )
        .bind(schema)
        .bind(table)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|row| {
                (
                    row.get::<String, _>("column_name"),
                    row.get::<String, _>("is_nullable") == "YES",
                    row.get::<String, _>("data_type"),
                )
            })
            .collect())
    }

    async fn indexes(&self, schema: &str, table: &str) -> Result<Vec<Index>, EngineError> {
        let rows = sqlx::query(
            "SELECT indexname, indexdef FROM pg_indexes WHERE schemaname = $1 AND tablename = $2",
        )
        .bind(schema)
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        let mut indexes = Vec::new();
        for row in &rows {
            let name = row.get::<String, _>("indexname");
            let definition = row.get::<String, _>("indexdef");
            let parsed = match IndexParser::new(&definition).parse() {
                Ok(parsed) => parsed,
                Err(err) => {
                    warn!("skipping index definition `{definition}`: {err}");
                    continue;
                }
            };
            if !parsed.method.eq_ignore_ascii_case("btree") {
                debug!("dropping index {name}: access method {}", parsed.method);
                continue;
            }
            indexes.push(Index {
                name,
                columns: parsed.columns,
                unique: parsed.unique,
                kind: IndexKind::BTree,
            });
        }
        Ok(indexes)
    }

    async fn probe(&self, schema: &str, table: &str) -> Result<(), EngineError> {
        let sql = format!(
            "SELECT * FROM {}.{} LIMIT 1",
            Self::quote(schema),
            Self::quote(table)
        );
        sqlx::query(&sql).fetch_all(&self.pool).await?;
        Ok(())
    }

    async fn fetch(
        &self,
        sql: &str,
        types: &[ColumnType],
    ) -> Result<Vec<Vec<Value>>, EngineError> {
        debug!("postgres fetch: {sql}");
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        rows.iter().map(|row| decode_row(row, types)).collect()
    }
}

fn decode_row(row: &PgRow, types: &[ColumnType]) -> Result<Vec<Value>, EngineError> {
    types
        .iter()
        .enumerate()
        .map(|(i, ty)| decode_cell(row, i, *ty))
        .collect()
}

/// Integer column widths vary per declared type, so narrower decodes are
/// tried when the natural one does not apply.
fn decode_cell(row: &PgRow, i: usize, ty: ColumnType) -> Result<Value, EngineError> {
    let value = match ty {
        ColumnType::Int => row
            .try_get::<Option<i64>, _>(i)
            .or_else(|_| row.try_get::<Option<i32>, _>(i).map(|v| v.map(i64::from)))
            .or_else(|_| row.try_get::<Option<i16>, _>(i).map(|v| v.map(i64::from)))?
            .map(Value::Int),
        ColumnType::Float => row
            .try_get::<Option<f64>, _>(i)
            .or_else(|_| row.try_get::<Option<f32>, _>(i).map(|v| v.map(f64::from)))?
            .map(Value::Float),
        ColumnType::Bool => row.try_get::<Option<bool>, _>(i)?.map(Value::Bool),
        ColumnType::Text => row.try_get::<Option<String>, _>(i)?.map(Value::Text),
        ColumnType::Date => row
            .try_get::<Option<chrono::NaiveDate>, _>(i)?
            .map(Value::Date),
        ColumnType::Datetime => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(i)?
            .map(Value::Datetime),
    };
    Ok(value.unwrap_or(Value::Null))
}
