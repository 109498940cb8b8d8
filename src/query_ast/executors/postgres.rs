//! PostgreSQL data source

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{Column, Executor, PgPool, Row};

use super::decimal_value;
use crate::models::enums::DatabaseType;
use crate::models::structs::TableData;
use crate::query_ast::errors::FlowError;
use crate::query_ast::executor::DataSource;

pub struct PostgresSource {
    pool: PgPool,
}

impl PostgresSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DataSource for PostgresSource {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::PostgreSQL
    }

    async fn execute_authoritative(&self, sql: &str) -> Result<TableData, FlowError> {
        debug!("PostgresSource: executing {}", sql);

        let rows = sqlx::query(sql).fetch_all(&self.pool).await.map_err(|e| {
            warn!("PostgresSource: query failed: {}", e);
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

        debug!("PostgresSource: {} rows, {} columns", data.len(), columns.len());
        Ok(TableData::from_positional(columns, data))
    }
}

fn cell(row: &PgRow, i: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(i) {
        v.map(Value::from).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<i32>, _>(i) {
        v.map(Value::from).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<i16>, _>(i) {
        v.map(Value::from).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<f64>, _>(i) {
        v.map(Value::from).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<f32>, _>(i) {
        v.map(|f| Value::from(f64::from(f))).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<rust_decimal::Decimal>, _>(i) {
        v.map(|d| decimal_value(d.to_string())).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<bool>, _>(i) {
        v.map(Value::Bool).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<String>, _>(i) {
        v.map(Value::String).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(i) {
        v.map(|d| Value::String(d.to_rfc3339())).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(i) {
        v.map(|d| Value::String(d.to_string())).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(i) {
        v.map(|d| Value::String(d.to_string())).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<chrono::NaiveTime>, _>(i) {
        v.map(|t| Value::String(t.to_string())).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(i) {
        v.map(|b| Value::String(format!("<{} bytes>", b.len())))
            .unwrap_or(Value::Null)
    } else {
        debug!("PostgresSource: column {} has an undecoded type", i);
        Value::Null
    }
}
