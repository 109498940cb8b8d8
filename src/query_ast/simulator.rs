//! Replays parsed SELECT steps over captured rows.
//!
//! Every emitted [`DataFlowStep`] owns a full copy of the rows and columns as
//! they stood after that step; later steps never touch earlier snapshots.
//! Rows are never dropped: exclusion is recorded on the row with a reason.

use std::collections::HashSet;

use log::debug;
use serde_json::Value;

use super::condition::evaluate;
use super::lexer::{dotted_identifier, lex, render, split_alias};
use super::values::{compare_cells, lookup};
use crate::models::enums::{SortDirection, StepType};
use crate::models::structs::{
    DataFlowStep, ExecutionStep, ParsedSelectQuery, RowData, RowState, StepStats, TableData,
    unique_column_names,
};

/// Rows fetched for the FROM source and, in join order, each joined table.
#[derive(Debug, Clone, Default)]
pub struct SourceRows {
    pub primary: TableData,
    pub joined: Vec<TableData>,
}

#[derive(Debug, Default)]
struct FlowState {
    rows: Vec<RowState>,
    columns: Vec<String>,
}

pub fn simulate(
    parsed: &ParsedSelectQuery,
    steps: &[ExecutionStep],
    sources: &SourceRows,
) -> Vec<DataFlowStep> {
    let mut ordered: Vec<&ExecutionStep> = steps.iter().collect();
    ordered.sort_by_key(|s| (s.step_type, s.order));

    let mut joins = parsed.joins.iter().zip(sources.joined.iter());
    let mut state = FlowState::default();
    let mut flow = Vec::with_capacity(ordered.len());

    for step in ordered {
        let description = match step.step_type {
            StepType::From => {
                let Some(source) = parsed.from.first() else {
                    continue;
                };
                state.columns = sources.primary.columns.clone();
                state.rows = sources
                    .primary
                    .rows
                    .iter()
                    .cloned()
                    .map(RowState::included)
                    .collect();
                format!("Read {} rows from {}", state.rows.len(), source.table)
            }
            StepType::Join => {
                let Some((join, table)) = joins.next() else {
                    continue;
                };
                let added: Vec<String> = table
                    .columns
                    .iter()
                    .map(|c| format!("{}.{}", join.table, c))
                    .filter(|c| !state.columns.contains(c))
                    .collect();
                let count = added.len();
                state.columns.extend(added);
                format!(
                    "{} {} adds {} columns; rows are shown without being recombined",
                    join.kind.keyword(),
                    join.table,
                    count
                )
            }
            StepType::Where => {
                let Some(predicate) = parsed.where_clause.as_deref() else {
                    continue;
                };
                filter(&mut state.rows, "WHERE", predicate)
            }
            StepType::GroupBy => {
                if parsed.group_by.is_empty() {
                    continue;
                }
                format!(
                    "Grouping by {}; rows are shown ungrouped",
                    parsed.group_by.join(", ")
                )
            }
            StepType::Having => {
                let Some(predicate) = parsed.having.as_deref() else {
                    continue;
                };
                filter(&mut state.rows, "HAVING", predicate)
            }
            StepType::Select => {
                if parsed.columns.is_empty() {
                    continue;
                }
                project(&mut state, parsed);
                format!("Selected columns: {}", state.columns.join(", "))
            }
            StepType::Distinct => {
                if !parsed.distinct {
                    continue;
                }
                let removed = distinct(&mut state.rows);
                format!("Removed {removed} duplicate rows")
            }
            StepType::OrderBy => {
                if parsed.order_by.is_empty() {
                    continue;
                }
                order_by(&mut state, parsed);
                let keys: Vec<String> = parsed
                    .order_by
                    .iter()
                    .map(|item| match item.direction {
                        SortDirection::Asc => format!("{} ASC", item.column),
                        SortDirection::Desc => format!("{} DESC", item.column),
                    })
                    .collect();
                format!("Sorted by {}", keys.join(", "))
            }
            StepType::Limit => {
                let Some(limit) = parsed.limit else {
                    continue;
                };
                let mut kept = 0u64;
                for row in state.rows.iter_mut().filter(|r| r.included) {
                    kept += 1;
                    if kept > limit {
                        row.exclude(format!("excluded by LIMIT {limit}"));
                    }
                }
                format!("Kept the first {} rows", kept.min(limit))
            }
            StepType::Offset => {
                let Some(offset) = parsed.offset else {
                    continue;
                };
                let mut skipped = 0u64;
                for row in state.rows.iter_mut().filter(|r| r.included) {
                    if skipped == offset {
                        break;
                    }
                    skipped += 1;
                    row.exclude(format!("skipped by OFFSET {offset}"));
                }
                if parsed.limit.is_some() {
                    // steps run in catalog order, so OFFSET only sees what LIMIT kept
                    format!(
                        "Skipped the first {skipped} rows left after LIMIT; the engine skips before limiting"
                    )
                } else {
                    format!("Skipped the first {skipped} rows")
                }
            }
        };

        let stats = StepStats::of(&state.rows);
        debug!(
            "step {} {:?}: {} of {} rows included",
            step.order, step.step_type, stats.included_rows, stats.total_rows
        );
        flow.push(DataFlowStep {
            step_order: step.order,
            step_type: step.step_type,
            rows: state.rows.clone(),
            columns: state.columns.clone(),
            description,
            stats,
        });
    }
    flow
}

fn filter(rows: &mut [RowState], keyword: &str, predicate: &str) -> String {
    let before = rows.iter().filter(|r| r.included).count();
    let mut kept = 0;
    for row in rows.iter_mut().filter(|r| r.included) {
        if evaluate(&row.data, predicate) {
            kept += 1;
        } else {
            row.exclude(format!("does not satisfy {keyword} {predicate}"));
        }
    }
    format!("{keyword} {predicate} kept {kept} of {before} rows")
}

/// Output column name and the expression it is read from.
fn projection_targets(parsed: &ParsedSelectQuery, columns: &[String]) -> Vec<(String, String)> {
    let mut targets: Vec<(String, String)> = Vec::new();
    for item in &parsed.columns {
        let item = item.trim();
        if item == "*" {
            targets.extend(columns.iter().map(|c| (c.clone(), c.clone())));
            continue;
        }
        if let Some(qualifier) = item.strip_suffix(".*") {
            targets.extend(qualified_columns(parsed, columns, qualifier).map(|c| (c.clone(), c.clone())));
            continue;
        }
        let Ok(lexemes) = lex(item) else {
            targets.push((item.to_string(), item.to_string()));
            continue;
        };
        let (expr, alias) = split_alias(&lexemes);
        let source = render(expr);
        let output = alias.unwrap_or_else(|| match dotted_identifier(expr) {
            Some(name) => name.rsplit('.').next().unwrap_or(&name).to_string(),
            None => source.clone(),
        });
        targets.push((output, source));
    }

    let outputs = unique_column_names(targets.iter().map(|(output, _)| output.clone()).collect());
    outputs
        .into_iter()
        .zip(targets)
        .map(|(output, (_, source))| (output, source))
        .collect()
}

/// Columns belonging to the source named `qualifier` (table or alias).
fn qualified_columns<'a>(
    parsed: &'a ParsedSelectQuery,
    columns: &'a [String],
    qualifier: &'a str,
) -> impl Iterator<Item = &'a String> + 'a {
    let joined = parsed
        .joins
        .iter()
        .find(|j| {
            j.table.eq_ignore_ascii_case(qualifier)
                || j.alias.as_deref().is_some_and(|a| a.eq_ignore_ascii_case(qualifier))
        })
        .map(|j| format!("{}.", j.table));
    let primary = joined.is_none() && parsed.from.iter().any(|t| t.answers_to(qualifier));
    columns.iter().filter(move |c| match &joined {
        Some(prefix) => c.starts_with(prefix.as_str()),
        None => primary && !c.contains('.'),
    })
}

fn project(state: &mut FlowState, parsed: &ParsedSelectQuery) {
    let targets = projection_targets(parsed, &state.columns);
    for row in &mut state.rows {
        let data: RowData = targets
            .iter()
            .map(|(output, source)| {
                let value = lookup(&row.data, source).cloned().unwrap_or(Value::Null);
                (output.clone(), value)
            })
            .collect();
        row.data = data;
    }
    state.columns = targets.into_iter().map(|(output, _)| output).collect();
}

fn distinct(rows: &mut [RowState]) -> usize {
    let mut seen = HashSet::new();
    let mut removed = 0;
    for row in rows.iter_mut().filter(|r| r.included) {
        let key = serde_json::to_string(&row.data).unwrap_or_default();
        if !seen.insert(key) {
            row.exclude("duplicate row removed by DISTINCT");
            removed += 1;
        }
    }
    removed
}

fn order_by(state: &mut FlowState, parsed: &ParsedSelectQuery) {
    let keys: Vec<(String, SortDirection)> = parsed
        .order_by
        .iter()
        .map(|item| {
            // ORDER BY 2 refers to the second output column
            let key = item
                .column
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| state.columns.get(i).cloned())
                .unwrap_or_else(|| item.column.clone());
            (key, item.direction)
        })
        .collect();

    state.rows.sort_by(|a, b| {
        keys.iter()
            .map(|(key, direction)| {
                let ord = compare_cells(lookup(&a.data, key), lookup(&b.data, key));
                match direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            })
            .find(|ord| ord.is_ne())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
