//! CREATE TABLE column extraction.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use super::errors::ParseError;
use crate::models::structs::{ColumnDefinition, ColumnReference, ParsedCreateTableQuery};

static CREATE_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)^\s*CREATE\s+(?:(?:GLOBAL|LOCAL)\s+)?(?:TEMP(?:ORARY)?\s+)?TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?([^\s(]+)\s*\(",
    )
    .expect("valid CREATE TABLE header pattern")
});

static DEFAULT_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bDEFAULT\s+('(?:[^']|'')*'|\([^)]*\)|[^\s,]+)")
        .expect("valid DEFAULT pattern")
});

static REFERENCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bREFERENCES\s+([^\s(]+)\s*\(\s*([^\s)]+)\s*\)"#)
        .expect("valid REFERENCES pattern")
});

const TABLE_CONSTRAINTS: &[&str] = &["PRIMARY", "FOREIGN", "UNIQUE", "CHECK", "CONSTRAINT"];

/// MySQL index definitions; only constraints when followed by a column list.
const INDEX_KEYWORDS: &[&str] = &["KEY", "INDEX"];

pub fn parse_create_table(query: &str) -> Result<ParsedCreateTableQuery, ParseError> {
    let header = CREATE_HEADER
        .captures(query)
        .ok_or_else(|| ParseError::new(query, "not a CREATE TABLE statement"))?;
    let table_name = header
        .get(1)
        .map(|m| strip_identifier_quotes(m.as_str()))
        .ok_or_else(|| ParseError::new(query, "missing table name"))?;
    let open = header.get(0).map_or(0, |m| m.end());

    let body = column_list(&query[open..])
        .ok_or_else(|| ParseError::new(query, "unbalanced parentheses in column list"))?;

    let columns: Vec<ColumnDefinition> = split_definitions(body)
        .into_iter()
        .filter(|def| !is_table_constraint(def))
        .map(parse_column)
        .collect();
    if columns.is_empty() {
        return Err(ParseError::new(query, "no column definitions found"));
    }
    debug!("parsed CREATE TABLE {} with {} columns", table_name, columns.len());

    Ok(ParsedCreateTableQuery {
        table_name,
        columns,
    })
}

/// Text between the already-consumed `(` and its matching `)`.
fn column_list(rest: &str) -> Option<&str> {
    let mut depth = 1usize;
    let mut quote: Option<char> = None;
    for (i, ch) in rest.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"' | '`') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => {
                depth -= 1;
                if depth == 0 {
                    return Some(&rest[..i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn split_definitions(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, ch) in body.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"' | '`') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(body[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(body[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

fn is_table_constraint(definition: &str) -> bool {
    let (leading, rest) = definition
        .split_once(|c: char| c.is_whitespace() || c == '(')
        .map(|(word, _)| (word, definition[word.len()..].trim_start()))
        .unwrap_or((definition, ""));
    if TABLE_CONSTRAINTS
        .iter()
        .any(|kw| kw.eq_ignore_ascii_case(leading))
    {
        return true;
    }
    if !INDEX_KEYWORDS
        .iter()
        .any(|kw| kw.eq_ignore_ascii_case(leading))
    {
        return false;
    }
    // `KEY (a)` or `KEY idx (a)`; `key VARCHAR(10)` is a column named key
    let list = match rest.strip_prefix('(') {
        Some(list) => list,
        None => {
            let name_end = rest
                .find(|c: char| c.is_whitespace() || c == '(')
                .unwrap_or(rest.len());
            match rest[name_end..].trim_start().strip_prefix('(') {
                Some(list) => list,
                None => return false,
            }
        }
    };
    list.trim_start()
        .chars()
        .next()
        .is_some_and(|c| !(c.is_ascii_digit() || c == '\''))
}

fn parse_column(definition: &str) -> ColumnDefinition {
    // SQLite allows a bare column name with no type
    let (name, rest) = definition
        .split_once(char::is_whitespace)
        .unwrap_or((definition, ""));
    let name = strip_identifier_quotes(name);
    let (data_type, modifiers) = take_type(rest.trim_start());
    let upper = modifiers.to_ascii_uppercase();
    let data_upper = data_type.to_ascii_uppercase();

    let references = REFERENCES.captures(modifiers).and_then(|caps| {
        Some(ColumnReference {
            table: strip_identifier_quotes(caps.get(1)?.as_str()),
            column: strip_identifier_quotes(caps.get(2)?.as_str()),
        })
    });
    let default_value = DEFAULT_VALUE
        .captures(modifiers)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    ColumnDefinition {
        name,
        is_primary_key: upper.contains("PRIMARY KEY"),
        is_foreign_key: references.is_some(),
        is_not_null: upper.contains("NOT NULL"),
        is_unique: has_word(&upper, "UNIQUE"),
        is_auto_increment: has_word(&upper, "AUTO_INCREMENT")
            || has_word(&upper, "AUTOINCREMENT")
            || data_upper.ends_with("SERIAL"),
        default_value,
        references,
        data_type: data_type.to_string(),
    }
}

/// First token of `rest` as the type, extended until its parentheses balance.
fn take_type(rest: &str) -> (&str, &str) {
    let mut depth = 0i32;
    for (i, ch) in rest.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            c if c.is_whitespace() && depth <= 0 => {
                // `DECIMAL (10, 2)` keeps its parameters
                let tail = rest[i..].trim_start();
                if depth == 0 && tail.starts_with('(') && !rest[..i].contains('(') {
                    continue;
                }
                return (&rest[..i], &rest[i..]);
            }
            _ => {}
        }
    }
    (rest, "")
}

fn has_word(haystack: &str, word: &str) -> bool {
    haystack
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .any(|w| w == word)
}

fn strip_identifier_quotes(name: &str) -> String {
    name.split('.')
        .map(|part| part.trim_matches(|c| matches!(c, '`' | '"' | '[' | ']')))
        .collect::<Vec<_>>()
        .join(".")
}
