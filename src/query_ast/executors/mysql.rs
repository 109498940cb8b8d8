//! MySQL data source

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;
use sqlx::mysql::MySqlRow;
use sqlx::{Column, Executor, MySqlPool, Row};

use super::decimal_value;
use crate::models::enums::DatabaseType;
use crate::models::structs::TableData;
use crate::query_ast::errors::FlowError;
use crate::query_ast::executor::DataSource;

pub struct MySqlSource {
    pool: MySqlPool,
}

impl MySqlSource {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DataSource for MySqlSource {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::MySQL
    }

    async fn execute_authoritative(&self, sql: &str) -> Result<TableData, FlowError> {
        debug!("MySqlSource: executing {}", sql);

        let rows = sqlx::query(sql).fetch_all(&self.pool).await.map_err(|e| {
            warn!("MySqlSource: query failed: {}", e);
            FlowError::delegation(sql, e)
        })?;

        let columns: Vec<String> = match rows.first() {
            Some(first) => first.columns().iter().map(|c| c.name().to_string()).collect(),
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

        debug!("MySqlSource: {} rows, {} columns", data.len(), columns.len());
        Ok(TableData::from_positional(columns, data))
    }
}

fn cell(row: &MySqlRow, i: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(i) {
        v.map(Value::from).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<u64>, _>(i) {
        v.map(Value::from).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<f64>, _>(i) {
        v.map(Value::from).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<f32>, _>(i) {
        v.map(|f| Value::from(f64::from(f))).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<rust_decimal::Decimal>, _>(i) {
        v.map(|d| decimal_value(d.to_string())).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<String>, _>(i) {
        v.map(Value::String).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(i) {
        v.map(|d| Value::String(d.to_string())).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(i) {
        v.map(|d| Value::String(d.to_rfc3339())).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(i) {
        v.map(|d| Value::String(d.to_string())).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<chrono::NaiveTime>, _>(i) {
        v.map(|t| Value::String(t.to_string())).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(i) {
        // VARBINARY and BLOB columns that hold text are common in MySQL
        v.map(|b| match String::from_utf8(b) {
            Ok(s) => Value::String(s),
            Err(e) => Value::String(format!("<{} bytes>", e.as_bytes().len())),
        })
        .unwrap_or(Value::Null)
    } else {
        Value::Null
    }
}
