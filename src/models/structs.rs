use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::enums::{JoinKind, SortDirection, StatementKind, StepType};

/// One row keyed by column name, in column order.
pub type RowData = Map<String, Value>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub order: usize,
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub clause: String,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub table: String,
    pub alias: Option<String>,
}

impl TableRef {
    /// True when `name` is this source's table name or alias.
    pub fn answers_to(&self, name: &str) -> bool {
        self.table.eq_ignore_ascii_case(name)
            || self
                .alias
                .as_deref()
                .is_some_and(|a| a.eq_ignore_ascii_case(name))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinClause {
    pub kind: JoinKind,
    pub table: String,
    pub alias: Option<String>,
    pub on_predicate: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderByItem {
    pub column: String,
    pub direction: SortDirection,
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedSelectQuery {
    pub columns: Vec<String>,
    pub distinct: bool,
    pub from: Vec<TableRef>,
    pub joins: Vec<JoinClause>,
    pub where_clause: Option<String>,
    pub group_by: Vec<String>,
    pub having: Option<String>,
    pub order_by: Vec<OrderByItem>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnReference {
    pub table: String,
    pub column: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub is_primary_key: bool,
    pub is_foreign_key: bool,
    pub is_not_null: bool,
    pub is_unique: bool,
    pub is_auto_increment: bool,
    pub default_value: Option<String>,
    pub references: Option<ColumnReference>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedCreateTableQuery {
    pub table_name: String,
    pub columns: Vec<ColumnDefinition>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowState {
    pub data: RowData,
    pub included: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded_reason: Option<String>,
}

impl RowState {
    pub fn included(data: RowData) -> Self {
        Self {
            data,
            included: true,
            excluded_reason: None,
        }
    }

    pub fn exclude(&mut self, reason: impl Into<String>) {
        self.included = false;
        self.excluded_reason = Some(reason.into());
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepStats {
    pub total_rows: usize,
    pub included_rows: usize,
    pub excluded_rows: usize,
}

impl StepStats {
    pub fn of(rows: &[RowState]) -> Self {
        let included_rows = rows.iter().filter(|r| r.included).count();
        Self {
            total_rows: rows.len(),
            included_rows,
            excluded_rows: rows.len() - included_rows,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFlowStep {
    pub step_order: usize,
    pub step_type: StepType,
    pub rows: Vec<RowState>,
    pub columns: Vec<String>,
    pub description: String,
    pub stats: StepStats,
}

/// Column headers plus rows, as returned by a data source.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<RowData>,
}

impl TableData {
    pub fn new(columns: Vec<String>, rows: Vec<RowData>) -> Self {
        Self { columns, rows }
    }

    /// Build from positional rows; extra cells are dropped, missing ones become null.
    /// Repeated headers are renamed with [`unique_column_names`] so no cell is lost.
    pub fn from_positional(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let columns = unique_column_names(columns);
        let rows = rows
            .into_iter()
            .map(|cells| {
                let mut cells = cells.into_iter();
                columns
                    .iter()
                    .map(|c| (c.clone(), cells.next().unwrap_or(Value::Null)))
                    .collect()
            })
            .collect();
        Self { columns, rows }
    }
}

/// Rename repeated names to `name_1`, `name_2`, ... skipping names already in use.
pub fn unique_column_names(columns: Vec<String>) -> Vec<String> {
    let reserved: HashSet<String> = columns.iter().cloned().collect();
    let mut used: HashSet<String> = HashSet::with_capacity(columns.len());
    columns
        .into_iter()
        .map(|name| {
            if used.insert(name.clone()) {
                return name;
            }
            let mut n = 1;
            loop {
                let candidate = format!("{name}_{n}");
                if !reserved.contains(&candidate) && used.insert(candidate.clone()) {
                    return candidate;
                }
                n += 1;
            }
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryVisualization {
    pub original_query: String,
    pub execution_steps: Vec<ExecutionStep>,
    pub data_flow: Vec<DataFlowStep>,
    pub final_result: TableData,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedStatement {
    pub sql: String,
    pub kind: StatementKind,
}

/// Outcome of one statement in a multi-statement run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatementOutcome {
    pub sql: String,
    pub kind: StatementKind,
    pub result: TableData,
}
