//! MySQL / MariaDB implementation of the catalog provider.

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::Row;
use tracing::debug;

use crate::config::EndpointConfig;
use crate::database::CatalogProvider;
use crate::error::EngineError;
use crate::schema::{ColumnType, Index, IndexColumn, IndexKind, Value};

pub struct MySqlCatalog {
    pool: MySqlPool,
}

impl MySqlCatalog {
    pub async fn connect(
        config: &EndpointConfig,
        database: &str,
    ) -> Result<Self, EngineError> {
        let mut options = MySqlConnectOptions::new();
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

        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(MySqlCatalog { pool })
    }

    fn quote(ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }
}

#[async_trait]
impl CatalogProvider for MySqlCatalog {
    async fn schemas(&self) -> Result<Vec<String>, EngineError> {
        let rows = sqlx::query("SELECT schema_name FROM information_schema.schemata")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get::<String, _>(0)).collect())
    }

    async fn tables(&self, schema: &str) -> Result<Vec<String>, EngineError> {
        let rows = sqlx::query(
            "SELECT table_name FROM information_schema.tables WHERE table_schema = ?",
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
            WHERE table_schema = ? AND table_name = ?
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

    /// `information_schema.statistics` lists one row per index column;
    /// grouping by index name reassembles them in `seq_in_index` order.
    async fn indexes(&self, schema: &str, table: &str) -> Result<Vec<Index>, EngineError> {
        let rows = sqlx::query(
            r#"
            SELECT index_name, NOT non_unique AS is_unique, collation, index_type, column_name
            FROM information_schema.statistics
            WHERE table_schema = ? AND table_name = ?
            ORDER BY index_name, seq_in_index
            "#,
        )
        .bind(schema)
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        let mut indexes: Vec<Index> = Vec::new();
        let mut skip: Option<String> = None;
        for row in &rows {
            let name = row.get::<String, _>("index_name");
            let index_type = row.get::<String, _>("index_type");
            if skip.as_deref() == Some(name.as_str()) {
                continue;
            }
            if !index_type.eq_ignore_ascii_case("btree") {
                debug!("dropping index {name}: access method {index_type}");
                // drop any columns of this index already collected
                indexes.retain(|idx| idx.name != name);
                skip = Some(name);
                continue;
            }
            let column = IndexColumn {
                name: row.get::<String, _>("column_name"),
                // collation is 'A' (ascending), 'D' (descending) or NULL
                ascending: row
                    .get::<Option<String>, _>("collation")
                    .as_deref()
                    != Some("D"),
            };
            let unique = row
                .try_get::<i64, _>("is_unique")
                .map(|v| v != 0)
                .or_else(|_| row.try_get::<i32, _>("is_unique").map(|v| v != 0))
                .or_else(|_| row.try_get::<bool, _>("is_unique"))
                .unwrap_or(false);
            match indexes.iter_mut().find(|idx| idx.name == name) {
                Some(index) => index.columns.push(column),
                None => indexes.push(Index {
                    name,
                    columns: vec![column],
                    unique,
                    kind: IndexKind::BTree,
                }),
            }
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
        debug!("mysql fetch: {sql}");
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        rows.iter().map(|row| decode_row(row, types)).collect()
    }
}

fn decode_row(row: &MySqlRow, types: &[ColumnType]) -> Result<Vec<Value>, EngineError> {
    types
        .iter()
        .enumerate()
        .map(|(i, ty)| decode_cell(row, i, *ty))
        .collect()
}

fn decode_cell(row: &MySqlRow, i: usize, ty: ColumnType) -> Result<Value, EngineError> {
    let value = match ty {
        ColumnType::Int => row
            .try_get::<Option<i64>, _>(i)
            .or_else(|_| row.try_get::<Option<i32>, _>(i).map(|v| v.map(i64::from)))
            .or_else(|_| row.try_get::<Option<u64>, _>(i).map(|v| v.map(|u| u as i64)))?
            .map(Value::Int),
        ColumnType::Float => row
            .try_get::<Option<f64>, _>(i)
            .or_else(|_| row.try_get::<Option<f32>, _>(i).map(|v| v.map(f64::from)))?
            .map(Value::Float),
        ColumnType::Bool => row
            .try_get::<Option<bool>, _>(i)
            .or_else(|_| row.try_get::<Option<i8>, _>(i).map(|v| v.map(|b| b != 0)))?
            .map(Value::Bool),
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
