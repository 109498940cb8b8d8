//! Cell lookup and comparison shared by the evaluator and the simulator.

use std::cmp::Ordering;

use serde_json::Value;

use crate::models::structs::RowData;

/// Resolve a column reference against a row.
///
/// Tries the exact key, a case-insensitive key, the unqualified name of a
/// dotted reference (`u.age` -> `age`), then any `table.col` key ending in it.
pub(crate) fn lookup<'a>(row: &'a RowData, key: &str) -> Option<&'a Value> {
    if let Some(v) = row.get(key) {
        return Some(v);
    }
    if let Some((_, v)) = row.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)) {
        return Some(v);
    }
    match key.rsplit_once('.') {
        Some((_, bare)) => row
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(bare))
            .map(|(_, v)| v),
        None => row
            .iter()
            .find(|(k, _)| {
                k.rsplit_once('.')
                    .is_some_and(|(_, col)| col.eq_ignore_ascii_case(key))
            })
            .map(|(_, v)| v),
    }
}

pub(crate) fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Text form of a cell; `None` for SQL NULL. Booleans follow the 1/0 convention.
pub(crate) fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        other => Some(other.to_string()),
    }
}

pub(crate) fn cell_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

/// Numeric when both sides are numeric, otherwise case-insensitive text.
pub(crate) fn compare_text(a: &str, b: &str) -> Ordering {
    match (parse_number(a), parse_number(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        _ => a
            .to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| a.cmp(b)),
    }
}

/// Sort order for cells: NULL (or missing) first, then numbers, then text.
///
/// Numeric-looking strings rank as numbers so the order stays total over
/// mixed columns.
pub(crate) fn compare_cells(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => match (cell_number(x), cell_number(y)) {
            (Some(p), Some(q)) => p.total_cmp(&q),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => {
                let (p, q) = (cell_text(x).unwrap_or_default(), cell_text(y).unwrap_or_default());
                p.to_lowercase()
                    .cmp(&q.to_lowercase())
                    .then_with(|| p.cmp(&q))
            }
        },
    }
}
