//! SQLite backing database adapter.
//!
//! Supplies the primary-key schema the analyzer infers rows against and
//! executes approved statements.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column as SqlxColumn, Row as SqlxRow};
use std::str::FromStr;
use tracing::debug;

use rowgate_core::{PkSchema, Row, SqlStore, StorageError};

use crate::db_err;

/// The backing database over a SQLite pool.
pub struct SqliteDb {
    pool: SqlitePool,
}

impl SqliteDb {
    /// Wrap an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database at `url`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(db_err)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(db_err)?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl SqlStore for SqliteDb {
    async fn pk_schema(&self) -> Result<PkSchema, StorageError> {
        let tables = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'table' \
             AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut schema = PkSchema::new();
        for table_row in tables {
            let table: String = table_row.get("name");
            // PRAGMA arguments cannot be bound; the name comes from
            // sqlite_master and is quoted as an identifier.
            let columns = sqlx::query(&format!("PRAGMA table_info({})", quote_ident(&table)))
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;

            let mut pk_columns: Vec<(i64, String)> = Vec::new();
            for column in columns {
                let name: String = column.get("name");
                let pk: i64 = column.get("pk");
                if pk > 0 {
                    pk_columns.push((pk, name));
                }
            }
            // The pk ordinal carries composite key order; cid order does
            // not.
            pk_columns.sort_by_key(|(ordinal, _)| *ordinal);
            schema.insert(
                table,
                pk_columns.into_iter().map(|(_, name)| name).collect(),
            );
        }

        debug!(tables = schema.len(), "introspected primary keys");
        Ok(schema)
    }

    async fn query(&self, sql: &str) -> Result<Vec<Row>, StorageError> {
        let sql_upper = sql.trim_start().to_uppercase();
        let returns_rows = sql_upper.starts_with("SELECT")
            || sql_upper.starts_with("WITH")
            || sql_upper.starts_with("PRAGMA")
            || sql_upper.starts_with("EXPLAIN");

        if returns_rows {
            let rows = sqlx::query(sql)
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
            Ok(rows.iter().map(row_to_json).collect())
        } else {
            let result = sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
            debug!(rows_affected = result.rows_affected(), "executed statement");
            Ok(Vec::new())
        }
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn row_to_json(row: &SqliteRow) -> Row {
    let mut map = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        map.insert(column.name().to_string(), column_value(row, index));
    }
    map
}

/// Render a column as JSON, trying the SQLite storage classes in order.
fn column_value(row: &SqliteRow, index: usize) -> serde_json::Value {
    if let Ok(value) = row.try_get::<Option<i64>, _>(index) {
        return value.map_or(serde_json::Value::Null, serde_json::Value::from);
    }
    if let Ok(value) = row.try_get::<Option<f64>, _>(index) {
        return value.map_or(serde_json::Value::Null, serde_json::Value::from);
    }
    if let Ok(value) = row.try_get::<Option<String>, _>(index) {
        return value.map_or(serde_json::Value::Null, serde_json::Value::from);
    }
    serde_json::Value::Null
}
