//! Data layer seam: where row snapshots and authoritative results come from.
//!
//! The engine never executes SQL semantics itself. Primary and joined table
//! rows, and the final result of a query, are read through a [`DataSource`].
//! Failures surface as [`FlowError::Delegation`] and are never retried, since
//! replaying a statement with side effects would duplicate it.

use log::info;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::SqlitePoolOptions;

use super::errors::FlowError;
use super::executors::{MySqlSource, PostgresSource, SqliteSource};
use crate::models::enums::DatabaseType;
use crate::models::structs::TableData;

#[async_trait::async_trait]
pub trait DataSource: Send + Sync {
    /// Get the database type this source talks to
    fn database_type(&self) -> DatabaseType;

    /// Every row of `table`, with its column list.
    async fn fetch_all_rows(&self, table: &str) -> Result<TableData, FlowError> {
        let sql = format!(
            "SELECT * FROM {}",
            quote_table_name(table, self.database_type())
        );
        self.execute_authoritative(&sql).await
    }

    /// Run `sql` on the real engine and return whatever it produced.
    async fn execute_authoritative(&self, sql: &str) -> Result<TableData, FlowError>;
}

/// Quote each dotted part of a table name for the given dialect.
pub fn quote_table_name(table: &str, db_type: DatabaseType) -> String {
    table
        .split('.')
        .map(|part| {
            let bare = part.trim_matches(|c| matches!(c, '`' | '"' | '[' | ']'));
            match db_type {
                DatabaseType::MySQL => format!("`{}`", bare.replace('`', "``")),
                DatabaseType::PostgreSQL | DatabaseType::SQLite => {
                    format!("\"{}\"", bare.replace('"', "\"\""))
                }
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Open a pooled data source, picking the backend from the URL scheme.
pub async fn open_source(
    url: &str,
    max_connections: u32,
) -> Result<Box<dyn DataSource>, FlowError> {
    let db_type = DatabaseType::from_url(url)
        .ok_or_else(|| FlowError::Config("unsupported database URL scheme".to_string()))?;
    info!("connecting to {:?} (max {} connections)", db_type, max_connections);

    let source: Box<dyn DataSource> = match db_type {
        DatabaseType::SQLite => {
            let pool = SqlitePoolOptions::new()
                .max_connections(max_connections)
                .connect(url)
                .await
                .map_err(|e| FlowError::delegation("connect", e))?;
            Box::new(SqliteSource::new(pool))
        }
        DatabaseType::MySQL => {
            let pool = MySqlPoolOptions::new()
                .max_connections(max_connections)
                .connect(url)
                .await
                .map_err(|e| FlowError::delegation("connect", e))?;
            Box::new(MySqlSource::new(pool))
        }
        DatabaseType::PostgreSQL => {
            let pool = PgPoolOptions::new()
                .max_connections(max_connections)
                .connect(url)
                .await
                .map_err(|e| FlowError::delegation("connect", e))?;
            Box::new(PostgresSource::new(pool))
        }
    };
    Ok(source)
}
