//! Best-effort WHERE/HAVING predicate evaluation over a single row.
//!
//! Anything the evaluator does not recognise counts as satisfied, so an
//! exotic predicate shows "no filtering" instead of failing the request.

use std::cmp::Ordering;

use log::debug;
use regex::RegexBuilder;
use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::Token;

use super::lexer::{dotted_identifier, lex, split_commas, Lexeme};
use super::values::{cell_text, compare_text, lookup, parse_number};
use crate::models::structs::RowData;

/// Evaluate `predicate` against `row`. Unparseable input yields `true`.
pub fn evaluate(row: &RowData, predicate: &str) -> bool {
    match lex(predicate) {
        Ok(lexemes) => eval(row, &lexemes).unwrap_or(true),
        Err(e) => {
            debug!("predicate not tokenizable, passing row through: {}", e);
            true
        }
    }
}

/// `None` means the expression was not recognised.
fn eval(row: &RowData, lexemes: &[Lexeme]) -> Option<bool> {
    let lexemes = strip_outer_parens(lexemes);
    if lexemes.is_empty() {
        return None;
    }

    let any_of = split_logical(lexemes, Keyword::OR);
    if any_of.len() > 1 {
        return Some(any_of.iter().any(|part| eval(row, part).unwrap_or(true)));
    }
    let all_of = split_logical(lexemes, Keyword::AND);
    if all_of.len() > 1 {
        return Some(all_of.iter().all(|part| eval(row, part).unwrap_or(true)));
    }
    if lexemes[0].is_keyword(Keyword::NOT) {
        return eval(row, &lexemes[1..]).map(|b| !b);
    }
    comparison(row, lexemes)
}

fn strip_outer_parens(mut lexemes: &[Lexeme]) -> &[Lexeme] {
    while lexemes.len() >= 2
        && lexemes[0].token == Token::LParen
        && matching_paren(lexemes) == Some(lexemes.len() - 1)
    {
        lexemes = &lexemes[1..lexemes.len() - 1];
    }
    lexemes
}

fn matching_paren(lexemes: &[Lexeme]) -> Option<usize> {
    let mut depth = 0usize;
    for (i, lexeme) in lexemes.iter().enumerate() {
        match lexeme.token {
            Token::LParen => depth += 1,
            Token::RParen => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on a top-level AND/OR. The AND of `BETWEEN x AND y` is not a split point.
fn split_logical(lexemes: &[Lexeme], kw: Keyword) -> Vec<&[Lexeme]> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut in_between = false;
    for (i, lexeme) in lexemes.iter().enumerate() {
        match lexeme.token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            _ if depth > 0 => {}
            _ if lexeme.is_keyword(Keyword::BETWEEN) => in_between = true,
            _ if lexeme.is_keyword(Keyword::AND) && in_between => in_between = false,
            _ if lexeme.is_keyword(kw) => {
                parts.push(&lexemes[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&lexemes[start..]);
    parts
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like { negated: bool },
    IsNull { negated: bool },
    Between { negated: bool },
    In { negated: bool },
}

fn find_operator(lexemes: &[Lexeme]) -> Option<(usize, usize, Operator)> {
    for i in 1..lexemes.len() {
        let lexeme = &lexemes[i];
        let next = lexemes.get(i + 1).and_then(Lexeme::keyword);
        let op = match &lexeme.token {
            Token::Eq | Token::DoubleEq => (1, Operator::Eq),
            Token::Neq => (1, Operator::NotEq),
            Token::Lt => (1, Operator::Lt),
            Token::LtEq => (1, Operator::LtEq),
            Token::Gt => (1, Operator::Gt),
            Token::GtEq => (1, Operator::GtEq),
            Token::LParen | Token::RParen => return None,
            _ => match lexeme.keyword() {
                Some(Keyword::LIKE | Keyword::ILIKE) => (1, Operator::Like { negated: false }),
                Some(Keyword::BETWEEN) => (1, Operator::Between { negated: false }),
                Some(Keyword::IN) => (1, Operator::In { negated: false }),
                Some(Keyword::IS) => (1, Operator::IsNull { negated: false }),
                Some(Keyword::NOT) => match next {
                    Some(Keyword::LIKE | Keyword::ILIKE) => (2, Operator::Like { negated: true }),
                    Some(Keyword::BETWEEN) => (2, Operator::Between { negated: true }),
                    Some(Keyword::IN) => (2, Operator::In { negated: true }),
                    _ => continue,
                },
                _ => continue,
            },
        };
        return Some((i, op.0, op.1));
    }
    None
}

/// A literal or column on the right-hand side; `None` inside means SQL NULL.
fn operand(row: &RowData, lexemes: &[Lexeme]) -> Option<Option<String>> {
    match lexemes {
        [] => None,
        [Lexeme { token: Token::Minus, .. }, Lexeme { token: Token::Number(n, _), .. }] => {
            Some(Some(format!("-{n}")))
        }
        [single] => match &single.token {
            Token::Number(n, _) => Some(Some(n.clone())),
            Token::SingleQuotedString(s) | Token::DoubleQuotedString(s) => {
                Some(Some(s.replace("''", "'")))
            }
            Token::Word(w) if w.quote_style == Some('"') => Some(Some(w.value.clone())),
            Token::Word(w) => match w.keyword {
                Keyword::NULL => Some(None),
                Keyword::TRUE => Some(Some("1".to_string())),
                Keyword::FALSE => Some(Some("0".to_string())),
                _ => lookup(row, &w.value).map(cell_text).or(Some(Some(w.value.clone()))),
            },
            _ => None,
        },
        _ => {
            let name = dotted_identifier(lexemes)?;
            lookup(row, &name).map(cell_text)
        }
    }
}

fn comparison(row: &RowData, lexemes: &[Lexeme]) -> Option<bool> {
    let (at, width, op) = find_operator(lexemes)?;
    let column = dotted_identifier(&lexemes[..at])?;
    let Some(cell) = lookup(row, &column) else {
        debug!("column {} not in row, predicate passes", column);
        return None;
    };
    let left = cell_text(cell);
    let right = &lexemes[at + width..];

    match op {
        Operator::IsNull { .. } => {
            let negated = right.first().is_some_and(|l| l.is_keyword(Keyword::NOT));
            let rest = if negated { &right[1..] } else { right };
            if !matches!(rest, [l] if l.is_keyword(Keyword::NULL)) {
                return None;
            }
            Some(left.is_none() != negated)
        }
        Operator::Between { negated } => {
            let (low, high) = split_between(right)?;
            let (low, high) = (operand(row, low)??, operand(row, high)??);
            let left = left?;
            let inside = compare_text(&left, &low) != Ordering::Less
                && compare_text(&left, &high) != Ordering::Greater;
            Some(inside != negated)
        }
        Operator::In { negated } => {
            let list = match right {
                [open, inner @ .., close]
                    if open.token == Token::LParen && close.token == Token::RParen =>
                {
                    inner
                }
                _ => return None,
            };
            let left = left?;
            let mut found = false;
            for item in split_commas(list) {
                if let Some(value) = operand(row, item)? {
                    found |= loose_eq(&left, &value);
                }
            }
            Some(found != negated)
        }
        Operator::Like { negated } => {
            let pattern = operand(row, right)??;
            let left = left?;
            like(&left, &pattern).map(|m| m != negated)
        }
        _ => {
            let right = operand(row, right)?;
            let (Some(left), Some(right)) = (left, right) else {
                // NULL never satisfies a comparison
                return Some(false);
            };
            Some(match op {
                Operator::Eq => loose_eq(&left, &right),
                Operator::NotEq => !loose_eq(&left, &right),
                Operator::Lt => compare_text(&left, &right) == Ordering::Less,
                Operator::LtEq => compare_text(&left, &right) != Ordering::Greater,
                Operator::Gt => compare_text(&left, &right) == Ordering::Greater,
                Operator::GtEq => compare_text(&left, &right) != Ordering::Less,
                _ => return None,
            })
        }
    }
}

fn split_between(lexemes: &[Lexeme]) -> Option<(&[Lexeme], &[Lexeme])> {
    let at = lexemes.iter().position(|l| l.is_keyword(Keyword::AND))?;
    Some((&lexemes[..at], &lexemes[at + 1..]))
}

/// Equal as text or as numbers.
fn loose_eq(left: &str, right: &str) -> bool {
    left == right
        || matches!((parse_number(left), parse_number(right)), (Some(a), Some(b)) if a == b)
}

/// SQL LIKE: `%` is any run, `_` any one character, case-insensitive, anchored.
fn like(text: &str, pattern: &str) -> Option<bool> {
    let mut expr = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '%' => expr.push_str(".*"),
            '_' => expr.push('.'),
            c => expr.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    expr.push('$');
    RegexBuilder::new(&expr)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .ok()
        .map(|re| re.is_match(text))
}
