use crate::models::enums::StatementKind;

/// Leading phrases, most specific first.
const LEADING_PHRASES: &[(&str, StatementKind)] = &[
    ("CREATE TABLE", StatementKind::CreateTable),
    ("CREATE TEMPORARY TABLE", StatementKind::CreateTable),
    ("CREATE TEMP TABLE", StatementKind::CreateTable),
    ("CREATE UNIQUE INDEX", StatementKind::CreateIndex),
    ("CREATE INDEX", StatementKind::CreateIndex),
    ("DROP TABLE", StatementKind::DropTable),
    ("ALTER TABLE", StatementKind::AlterTable),
    ("SELECT", StatementKind::Select),
    ("INSERT", StatementKind::Insert),
    ("UPDATE", StatementKind::Update),
    ("DELETE", StatementKind::Delete),
];

/// Statement kind from its leading keywords, ignoring case and whitespace.
pub fn detect_type(statement: &str) -> StatementKind {
    let normalized = statement
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase();
    LEADING_PHRASES
        .iter()
        .find(|(phrase, _)| {
            normalized.starts_with(phrase)
                && normalized[phrase.len()..]
                    .chars()
                    .next()
                    .is_none_or(|c| !(c.is_ascii_alphanumeric() || c == '_'))
        })
        .map_or(StatementKind::Unknown, |(_, kind)| *kind)
}
