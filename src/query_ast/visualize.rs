use log::{debug, info};

use super::errors::{FlowError, ParseError};
use super::executor::DataSource;
use super::parser::parse_select_statement;
use super::simulator::{simulate, SourceRows};
use crate::models::enums::StatementKind;
use crate::models::structs::{QueryVisualization, TableData};
use crate::query_tools::detect_type;

/// Trace a SELECT through its logical execution order.
///
/// Source rows for the simulation and the final result both come from
/// `source`; the final result is the engine's own answer, not the simulated
/// one, so the two may differ for constructs the simulator only approximates.
pub async fn visualize(sql: &str, source: &dyn DataSource) -> Result<QueryVisualization, FlowError> {
    let statement = sql.trim().trim_end_matches(';').trim_end();
    let kind = detect_type(statement);
    if kind != StatementKind::Select {
        return Err(ParseError::new(
            statement,
            format!("only SELECT statements can be visualized (got {kind:?})"),
        )
        .into());
    }

    let (execution_steps, parsed) = parse_select_statement(statement)?;
    let primary = parsed
        .from
        .first()
        .ok_or_else(|| ParseError::new(statement, "missing FROM clause"))?;
    info!(
        "visualizing SELECT over {} with {} steps",
        primary.table,
        execution_steps.len()
    );

    let primary_rows = fetch_source(source, &primary.table).await?;
    let mut joined = Vec::with_capacity(parsed.joins.len());
    for join in &parsed.joins {
        joined.push(fetch_source(source, &join.table).await?);
    }

    let data_flow = simulate(
        &parsed,
        &execution_steps,
        &SourceRows {
            primary: primary_rows,
            joined,
        },
    );
    let final_result = source.execute_authoritative(statement).await?;
    debug!(
        "simulated {} steps, engine returned {} rows",
        data_flow.len(),
        final_result.rows.len()
    );

    Ok(QueryVisualization {
        original_query: sql.to_string(),
        execution_steps,
        data_flow,
        final_result,
    })
}

/// A table name is read whole; a derived table `(SELECT ...)` is executed.
async fn fetch_source(source: &dyn DataSource, table: &str) -> Result<TableData, FlowError> {
    match table
        .strip_prefix('(')
        .and_then(|inner| inner.strip_suffix(')'))
    {
        Some(subquery) => source.execute_authoritative(subquery.trim()).await,
        None => source.fetch_all_rows(table).await,
    }
}
