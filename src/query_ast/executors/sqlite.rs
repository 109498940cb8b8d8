//! SQLite data source

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Executor, Row, SqlitePool};

use crate::models::enums::DatabaseType;
use crate::models::structs::TableData;
use crate::query_ast::errors::FlowError;
use crate::query_ast::executor::DataSource;

pub struct SqliteSource {
    pool: SqlitePool,
}

impl SqliteSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DataSource for SqliteSource {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::SQLite
    }

    async fn execute_authoritative(&self, sql: &str) -> Result<TableData, FlowError> {
        debug!("SqliteSource: executing {}", sql);

        let rows = sqlx::query(sql).fetch_all(&self.pool).await.map_err(|e| {
            warn!("SqliteSource: query failed: {}", e);
            FlowError::delegation(sql, e)
        })?;

        let columns: Vec<String> = match rows.first() {
            Some(first) => first.columns().iter().map(|c| c.name().to_string()).collect(),
            // No rows: ask the engine for the statement's shape instead
            None => (&self.pool)
                .describe(sql)
                .await
                .map(|d| d.columns().iter().map(|c| c.name().to_string()).collect())
                .unwrap_or_default(),
        };

        let data: Vec<Vec<Value>> = rows
            .iter()
            .map(|row| (0..row.columns().len()).map(|i| cell(row, i)).collect())
            .collect();

        debug!(
            "SqliteSource: {} rows, {} columns",
            data.len(),
            columns.len()
        );
        Ok(TableData::from_positional(columns, data))
    }
}

fn cell(row: &SqliteRow, i: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(i) {
        v.map(Value::from).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<f64>, _>(i) {
        v.map(Value::from).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<String>, _>(i) {
        v.map(Value::String).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<bool>, _>(i) {
        v.map(Value::Bool).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(i) {
        v.map(|d| Value::String(d.to_string())).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(i) {
        v.map(|d| Value::String(d.to_string())).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(i) {
        v.map(|b| Value::String(format!("<{} bytes>", b.len())))
            .unwrap_or(Value::Null)
    } else {
        Value::Null
    }
}
