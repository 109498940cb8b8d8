//! Script-level helpers: statement splitting, classification and execution.

pub mod classifier;
pub mod splitter;

pub use classifier::detect_type;
pub use splitter::split_statements;

use log::{info, warn};

use crate::models::structs::{ClassifiedStatement, StatementOutcome};
use crate::query_ast::errors::FlowError;
use crate::query_ast::executor::DataSource;

/// Each statement of `script` with its kind, in script order.
pub fn split_and_classify(script: &str) -> Vec<ClassifiedStatement> {
    split_statements(script)
        .into_iter()
        .map(|sql| {
            let kind = detect_type(&sql);
            ClassifiedStatement { sql, kind }
        })
        .collect()
}

/// Execute every statement of `script` in order, stopping at the first failure.
///
/// Statements are sent to the engine once each; a failed statement is not
/// retried and later statements are not attempted.
pub async fn run_script(
    script: &str,
    source: &dyn DataSource,
) -> Result<Vec<StatementOutcome>, FlowError> {
    let statements = split_and_classify(script);
    info!("running script with {} statements", statements.len());

    let mut outcomes = Vec::with_capacity(statements.len());
    for (idx, statement) in statements.into_iter().enumerate() {
        let result = source
            .execute_authoritative(&statement.sql)
            .await
            .inspect_err(|e| warn!("statement {} failed: {}", idx + 1, e))?;
        outcomes.push(StatementOutcome {
            sql: statement.sql,
            kind: statement.kind,
            result,
        });
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::StatementKind;

    #[test]
    fn classifies_each_statement() {
        let out = split_and_classify(
            "CREATE TABLE t (id INT); INSERT INTO t VALUES (1); select * from t; VACUUM",
        );
        let kinds: Vec<StatementKind> = out.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                StatementKind::CreateTable,
                StatementKind::Insert,
                StatementKind::Select,
                StatementKind::Unknown
            ]
        );
        assert_eq!(out[2].sql, "select * from t");
    }
}
