//! Static description of each logical execution phase.

use serde::Serialize;

use crate::models::enums::StepType;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub step_type: StepType,
    pub position: usize,
    pub keyword: &'static str,
    pub description: &'static str,
}

impl StepType {
    pub const EXECUTION_ORDER: [StepType; 10] = [
        StepType::From,
        StepType::Join,
        StepType::Where,
        StepType::GroupBy,
        StepType::Having,
        StepType::Select,
        StepType::Distinct,
        StepType::OrderBy,
        StepType::Limit,
        StepType::Offset,
    ];

    /// 1-based position in the logical execution order.
    pub fn position(self) -> usize {
        self as usize + 1
    }

    pub fn keyword(self) -> &'static str {
        match self {
            StepType::From => "FROM",
            StepType::Join => "JOIN",
            StepType::Where => "WHERE",
            StepType::GroupBy => "GROUP BY",
            StepType::Having => "HAVING",
            StepType::Select => "SELECT",
            StepType::Distinct => "DISTINCT",
            StepType::OrderBy => "ORDER BY",
            StepType::Limit => "LIMIT",
            StepType::Offset => "OFFSET",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            StepType::From => "Identify the source table and load its rows",
            StepType::Join => "Combine rows with another table using the join condition",
            StepType::Where => "Filter individual rows that do not satisfy the condition",
            StepType::GroupBy => "Group rows that share the same values in the listed columns",
            StepType::Having => "Filter groups that do not satisfy the aggregate condition",
            StepType::Select => "Choose and compute the output columns",
            StepType::Distinct => "Remove duplicate rows from the result",
            StepType::OrderBy => "Sort the remaining rows",
            StepType::Limit => "Keep only the first N rows",
            StepType::Offset => "Skip the first N rows",
        }
    }
}

pub fn execution_catalog() -> Vec<CatalogEntry> {
    StepType::EXECUTION_ORDER
        .iter()
        .map(|&step_type| CatalogEntry {
            step_type,
            position: step_type.position(),
            keyword: step_type.keyword(),
            description: step_type.description(),
        })
        .collect()
}
