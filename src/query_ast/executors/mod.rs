pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub use mysql::MySqlSource;
pub use postgres::PostgresSource;
pub use sqlite::SqliteSource;

use serde_json::{Number, Value};

/// Decimal text as a JSON number when it fits, otherwise as a string.
pub(crate) fn decimal_value(text: String) -> Value {
    text.parse::<Number>()
        .map(Value::Number)
        .unwrap_or(Value::String(text))
}
