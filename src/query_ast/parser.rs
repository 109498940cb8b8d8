use log::debug;
use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::Token;

use super::errors::ParseError;
use super::lexer::{
    integer, render, segment_select, split_alias, split_at_keyword, split_commas, ClauseKind,
    Lexeme, Segments,
};
use crate::models::enums::{SortDirection, StepType};
use crate::models::structs::{ExecutionStep, JoinClause, OrderByItem, ParsedSelectQuery, TableRef};

/// Steps of a SELECT in logical execution order, numbered 1..N.
pub fn parse_execution_order(query: &str) -> Result<Vec<ExecutionStep>, ParseError> {
    let segments = segment_select(query)?;
    let parsed = build_select(&segments);
    execution_steps(query, &segments, &parsed)
}

pub fn parse_select_query(query: &str) -> Result<ParsedSelectQuery, ParseError> {
    let segments = segment_select(query)?;
    let parsed = build_select(&segments);
    if parsed.columns.is_empty() {
        return Err(ParseError::new(query, "empty projection list"));
    }
    Ok(parsed)
}

/// Both views of one SELECT from a single tokenization pass.
pub fn parse_select_statement(
    query: &str,
) -> Result<(Vec<ExecutionStep>, ParsedSelectQuery), ParseError> {
    let segments = segment_select(query)?;
    let parsed = build_select(&segments);
    let steps = execution_steps(query, &segments, &parsed)?;
    Ok((steps, parsed))
}

fn execution_steps(
    query: &str,
    segments: &Segments,
    parsed: &ParsedSelectQuery,
) -> Result<Vec<ExecutionStep>, ParseError> {
    let mut found: Vec<(StepType, String)> = Vec::new();

    if let Some(from) = segments.first(ClauseKind::From) {
        found.push((StepType::From, from.text()));
    }
    for (_, join) in segments.joins() {
        found.push((StepType::Join, join.text()));
    }
    for (kind, step_type) in [
        (ClauseKind::Where, StepType::Where),
        (ClauseKind::GroupBy, StepType::GroupBy),
        (ClauseKind::Having, StepType::Having),
        (ClauseKind::Select, StepType::Select),
    ] {
        if let Some(clause) = segments.first(kind) {
            found.push((step_type, clause.text()));
        }
    }
    if segments.distinct {
        found.push((StepType::Distinct, "DISTINCT".to_string()));
    }
    if let Some(order_by) = segments.first(ClauseKind::OrderBy) {
        found.push((StepType::OrderBy, order_by.text()));
    }
    if let Some(limit) = parsed.limit {
        found.push((StepType::Limit, format!("LIMIT {limit}")));
    }
    if let Some(offset) = parsed.offset {
        found.push((StepType::Offset, format!("OFFSET {offset}")));
    }

    if found.is_empty() {
        return Err(ParseError::new(query, "no execution steps could be extracted"));
    }
    debug!("extracted {} execution steps", found.len());

    Ok(found
        .into_iter()
        .enumerate()
        .map(|(i, (step_type, clause))| ExecutionStep {
            order: i + 1,
            step_type,
            clause,
            description: step_type.description().to_string(),
        })
        .collect())
}

fn build_select(segments: &Segments) -> ParsedSelectQuery {
    let mut parsed = ParsedSelectQuery {
        distinct: segments.distinct,
        ..Default::default()
    };

    if let Some(select) = segments.first(ClauseKind::Select) {
        parsed.columns = split_commas(&select.body).into_iter().map(render).collect();
    }
    if let Some(from) = segments.first(ClauseKind::From) {
        parsed.from = split_commas(&from.body)
            .into_iter()
            .map(|part| {
                let (table, alias) = split_alias(part);
                TableRef {
                    table: render(table),
                    alias,
                }
            })
            .collect();
    }
    parsed.joins = segments
        .joins()
        .map(|(kind, clause)| {
            let (target, on_predicate) = match split_at_keyword(&clause.body, Keyword::ON) {
                Some((target, predicate)) => (target, Some(render(predicate))),
                None => match split_at_keyword(&clause.body, Keyword::USING) {
                    Some((target, columns)) => (target, Some(format!("USING {}", render(columns)))),
                    None => (clause.body.as_slice(), None),
                },
            };
            let (table, alias) = split_alias(target);
            JoinClause {
                kind,
                table: render(table),
                alias,
                on_predicate,
            }
        })
        .collect();

    parsed.where_clause = segments.first(ClauseKind::Where).map(|c| render(&c.body));
    if let Some(group_by) = segments.first(ClauseKind::GroupBy) {
        parsed.group_by = split_commas(&group_by.body).into_iter().map(render).collect();
    }
    parsed.having = segments.first(ClauseKind::Having).map(|c| render(&c.body));
    if let Some(order_by) = segments.first(ClauseKind::OrderBy) {
        parsed.order_by = split_commas(&order_by.body)
            .into_iter()
            .map(order_item)
            .collect();
    }

    if let Some(limit) = segments.first(ClauseKind::Limit) {
        match split_commas(&limit.body).as_slice() {
            [count] => parsed.limit = integer(count),
            // MySQL `LIMIT offset, count`
            [skip, count] => {
                parsed.offset = integer(skip);
                parsed.limit = integer(count);
            }
            _ => {}
        }
    }
    if let Some(offset) = segments.first(ClauseKind::Offset) {
        // `OFFSET n ROWS` is accepted
        if let Some(first) = offset.body.first()
            && let Token::Number(n, _) = &first.token
        {
            parsed.offset = n.parse().ok();
        }
    }
    parsed
}

fn order_item(part: &[Lexeme]) -> OrderByItem {
    let mut end = part.len();
    if end >= 3
        && part[end - 2].is_keyword(Keyword::NULLS)
        && matches!(part[end - 1].keyword(), Some(Keyword::FIRST | Keyword::LAST))
    {
        end -= 2;
    }
    let mut direction = SortDirection::Asc;
    if end >= 2 {
        match part[end - 1].keyword() {
            Some(Keyword::DESC) => {
                direction = SortDirection::Desc;
                end -= 1;
            }
            Some(Keyword::ASC) => end -= 1,
            _ => {}
        }
    }
    OrderByItem {
        column: render(&part[..end]),
        direction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::JoinKind;

    #[test]
    fn steps_follow_logical_order_not_text_order() {
        let steps = parse_execution_order(
            "SELECT DISTINCT name FROM users WHERE age > 18 ORDER BY name LIMIT 5",
        )
        .unwrap();
        let types: Vec<StepType> = steps.iter().map(|s| s.step_type).collect();
        assert_eq!(
            types,
            vec![
                StepType::From,
                StepType::Where,
                StepType::Select,
                StepType::Distinct,
                StepType::OrderBy,
                StepType::Limit
            ]
        );
        let orders: Vec<usize> = steps.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(steps[0].clause, "FROM users");
        assert_eq!(steps[2].clause, "SELECT name");
        assert_eq!(steps[5].clause, "LIMIT 5");
    }

    #[test]
    fn bare_select_keyword_has_no_steps() {
        let err = parse_execution_order("SELECT").unwrap_err();
        assert_eq!(err.query, "SELECT");
    }

    #[test]
    fn order_by_directions() {
        let parsed =
            parse_select_query("SELECT * FROM t ORDER BY a DESC, b, c asc NULLS LAST").unwrap();
        assert_eq!(
            parsed.order_by,
            vec![
                OrderByItem { column: "a".into(), direction: SortDirection::Desc },
                OrderByItem { column: "b".into(), direction: SortDirection::Asc },
                OrderByItem { column: "c".into(), direction: SortDirection::Asc },
            ]
        );
    }

    #[test]
    fn joins_capture_kind_alias_and_predicate() {
        let parsed = parse_select_query(
            "SELECT u.name, o.total FROM users u LEFT JOIN orders AS o ON u.id = o.user_id JOIN items USING (id)",
        )
        .unwrap();
        assert_eq!(parsed.from, vec![TableRef { table: "users".into(), alias: Some("u".into()) }]);
        assert_eq!(parsed.joins.len(), 2);
        assert_eq!(parsed.joins[0].kind, JoinKind::Left);
        assert_eq!(parsed.joins[0].table, "orders");
        assert_eq!(parsed.joins[0].alias.as_deref(), Some("o"));
        assert_eq!(parsed.joins[0].on_predicate.as_deref(), Some("u.id = o.user_id"));
        assert_eq!(parsed.joins[1].kind, JoinKind::Inner);
        assert_eq!(parsed.joins[1].on_predicate.as_deref(), Some("USING (id)"));
    }

    #[test]
    fn mysql_limit_form_sets_offset() {
        let parsed = parse_select_query("SELECT * FROM t LIMIT 10, 5").unwrap();
        assert_eq!(parsed.limit, Some(5));
        assert_eq!(parsed.offset, Some(10));
    }

    #[test]
    fn non_integer_limit_is_ignored() {
        let steps = parse_execution_order("SELECT * FROM t LIMIT ALL").unwrap();
        assert!(steps.iter().all(|s| s.step_type != StepType::Limit));
    }
}
