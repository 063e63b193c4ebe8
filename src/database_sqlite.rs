//! SQLite: catalog provider for configured file databases and the in-memory
//! local store that mirrors remote rows for final query execution.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::debug;

use crate::config::EndpointConfig;
use crate::database::CatalogProvider;
use crate::error::EngineError;
use crate::schema::{ColumnType, Index, IndexColumn, IndexKind, Value};

async fn open_pool(options: SqliteConnectOptions) -> Result<SqlitePool, EngineError> {
    // one connection, kept alive: an in-memory database lives and dies with
    // its connection
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    Ok(pool)
}

pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    pub async fn connect(config: &EndpointConfig) -> Result<Self, EngineError> {
        let path = config.path.as_deref().ok_or_else(|| {
            EngineError::Config("sqlite endpoint requires a `path`".to_string())
        })?;
        let options = SqliteConnectOptions::new().filename(path);
        Ok(SqliteCatalog {
            pool: open_pool(options).await?,
        })
    }

    fn quote(ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }
}

#[async_trait]
impl CatalogProvider for SqliteCatalog {
    async fn schemas(&self) -> Result<Vec<String>, EngineError> {
        Ok(vec!["main".to_string()])
    }

    async fn tables(&self, _schema: &str) -> Result<Vec<String>, EngineError> {
        let rows =
            sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.iter().map(|r| r.get::<String, _>(0)).collect())
    }

    async fn columns(
        &self,
        _schema: &str,
        table: &str,
    ) -> Result<Vec<(String, bool, String)>, EngineError> {
        let sql = format!("PRAGMA table_info({})", Self::quote(table));
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        Ok(rows
            .iter()
            .map(|row| {
                (
                    row.get::<String, _>("name"),
                    row.get::<i64, _>("notnull") == 0,
                    row.get::<String, _>("type"),
                )
            })
            .collect())
    }

    async fn indexes(&self, _schema: &str, table: &str) -> Result<Vec<Index>, EngineError> {
        let list_sql = format!("PRAGMA index_list({})", Self::quote(table));
        let rows = sqlx::query(&list_sql).fetch_all(&self.pool).await?;
        let mut indexes = Vec::new();
        for row in &rows {
            let name = row.get::<String, _>("name");
            let unique = row.get::<i64, _>("unique") != 0;
            let info_sql = format!("PRAGMA index_info({})", Self::quote(&name));
            let info_rows = sqlx::query(&info_sql).fetch_all(&self.pool).await?;
            let columns = info_rows
                .iter()
                .map(|r| IndexColumn {
                    name: r.get::<String, _>("name"),
                    ascending: true,
                })
                .collect();
            indexes.push(Index {
                name,
                columns,
                unique,
                kind: IndexKind::BTree,
            });
        }
        Ok(indexes)
    }

    async fn probe(&self, _schema: &str, table: &str) -> Result<(), EngineError> {
        let sql = format!("SELECT * FROM {} LIMIT 1", Self::quote(table));
        sqlx::query(&sql).fetch_all(&self.pool).await?;
        Ok(())
    }

    async fn fetch(
        &self,
        sql: &str,
        types: &[ColumnType],
    ) -> Result<Vec<Vec<Value>>, EngineError> {
        debug!("sqlite fetch: {sql}");
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        rows.iter().map(|row| decode_row(row, types)).collect()
    }
}

/// The process-wide local store, reinitialized per query: remote result sets
/// are mirrored into in-memory tables, then the final join input is pulled
/// back out.
pub struct LocalStore {
    pool: SqlitePool,
}

impl LocalStore {
    pub async fn open() -> Result<Self, EngineError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Ok(LocalStore { pool })
    }

    pub async fn execute(&self, sql: &str) -> Result<(), EngineError> {
        debug!("local store: {sql}");
        sqlx::query(sql).execute(&self.pool).await?;
        Ok(())
    }

    /// Streams rows into a mirror table with one parameterized INSERT.
    pub async fn insert_rows(
        &self,
        insert_sql: &str,
        rows: &[Vec<Value>],
    ) -> Result<(), EngineError> {
        for row in rows {
            let mut query = sqlx::query(insert_sql);
            for value in row {
                query = match value {
                    Value::Null => query.bind(None::<i64>),
                    Value::Int(v) => query.bind(*v),
                    Value::Float(v) => query.bind(*v),
                    Value::Bool(b) => query.bind(*b as i64),
                    Value::Text(s) => query.bind(s.clone()),
                    Value::Date(d) => query.bind(d.to_string()),
                    Value::Datetime(dt) => {
                        query.bind(dt.format("%Y-%m-%d %H:%M:%S").to_string())
                    }
                };
            }
            query.execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn fetch(
        &self,
        sql: &str,
        types: &[ColumnType],
    ) -> Result<Vec<Vec<Value>>, EngineError> {
        debug!("local store fetch: {sql}");
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        rows.iter().map(|row| decode_row(row, types)).collect()
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

fn decode_row(row: &SqliteRow, types: &[ColumnType]) -> Result<Vec<Value>, EngineError> {
    types
        .iter()
        .enumerate()
        .map(|(i, ty)| decode_cell(row, i, *ty))
        .collect()
}

/// Dates and datetimes are stored as TEXT in mirror tables and parsed back.
fn decode_cell(row: &SqliteRow, i: usize, ty: ColumnType) -> Result<Value, EngineError> {
    let value = match ty {
        ColumnType::Int => row.try_get::<Option<i64>, _>(i)?.map(Value::Int),
        ColumnType::Float => row
            .try_get::<Option<f64>, _>(i)
            .or_else(|_| row.try_get::<Option<i64>, _>(i).map(|v| v.map(|x| x as f64)))?
            .map(Value::Float),
        ColumnType::Bool => row.try_get::<Option<i64>, _>(i)?.map(|v| Value::Bool(v != 0)),
        ColumnType::Text => row.try_get::<Option<String>, _>(i)?.map(Value::Text),
        ColumnType::Date => row
            .try_get::<Option<String>, _>(i)?
            .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
            .map(Value::Date),
        ColumnType::Datetime => row
            .try_get::<Option<String>, _>(i)?
            .and_then(|s| NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S").ok())
            .map(Value::Datetime),
    };
    Ok(value.unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[tokio::test]
    async fn local_store_roundtrip() {
        let store = LocalStore::open().await.unwrap();
        store
            .execute("CREATE TABLE m (a INTEGER, b TEXT, c REAL)")
            .await
            .unwrap();
        store
            .insert_rows(
                "INSERT INTO m VALUES (?, ?, ?)",
                &[
                    vec![
                        Value::Int(1),
                        Value::Text("x".to_string()),
                        Value::Float(1.5),
                    ],
                    vec![Value::Int(2), Value::Null, Value::Null],
                ],
            )
            .await
            .unwrap();
        let rows = store
            .fetch(
                "SELECT a, b, c FROM m ORDER BY a",
                &[ColumnType::Int, ColumnType::Text, ColumnType::Float],
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], Value::Int(1));
        assert_eq!(rows[0][1], Value::Text("x".to_string()));
        assert_eq!(rows[1][1], Value::Null);
    }

    #[rstest]
    #[tokio::test]
    async fn date_cells_roundtrip_as_text() {
        let store = LocalStore::open().await.unwrap();
        store.execute("CREATE TABLE d (x TEXT)").await.unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
        store
            .insert_rows("INSERT INTO d VALUES (?)", &[vec![Value::Date(day)]])
            .await
            .unwrap();
        let rows = store
            .fetch("SELECT x FROM d", &[ColumnType::Date])
            .await
            .unwrap();
        assert_eq!(rows[0][0], Value::Date(day));
    }

    #[rstest]
    #[tokio::test]
    async fn sqlite_catalog_lists_tables_and_columns() {
        let store = LocalStore::open().await.unwrap();
        store
            .execute("CREATE TABLE t (id INTEGER NOT NULL, name TEXT)")
            .await
            .unwrap();
        store
            .execute("CREATE UNIQUE INDEX t_id ON t (id)")
            .await
            .unwrap();
        let catalog = SqliteCatalog { pool: store.pool.clone() };
        assert_eq!(catalog.tables("main").await.unwrap(), vec!["t".to_string()]);
        let columns = catalog.columns("main", "t").await.unwrap();
        assert_eq!(
            columns,
            vec![
                ("id".to_string(), false, "INTEGER".to_string()),
                ("name".to_string(), true, "TEXT".to_string()),
            ]
        );
        let indexes = catalog.indexes("main", "t").await.unwrap();
        assert_eq!(indexes.len(), 1);
        assert!(indexes[0].unique);
        assert_eq!(indexes[0].columns[0].name, "id");
    }
}
