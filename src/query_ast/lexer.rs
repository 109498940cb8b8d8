//! Token stream and clause segmentation for SELECT statements.
//!
//! Statements are tokenized with `sqlparser` and cut into clauses at keywords
//! that sit at parenthesis depth 0, so keywords and commas inside function
//! calls or subqueries never start a new clause.

use log::debug;
use sqlparser::dialect::GenericDialect;
use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::{Token, Tokenizer};

use super::errors::ParseError;
use crate::models::enums::JoinKind;

/// A significant token and whether whitespace (or a comment) preceded it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Lexeme {
    pub token: Token,
    pub spaced: bool,
}

impl Lexeme {
    pub fn keyword(&self) -> Option<Keyword> {
        match &self.token {
            Token::Word(w) if w.quote_style.is_none() => Some(w.keyword),
            _ => None,
        }
    }

    pub fn is_keyword(&self, kw: Keyword) -> bool {
        self.keyword() == Some(kw)
    }

    pub fn word_value(&self) -> Option<&str> {
        match &self.token {
            Token::Word(w) => Some(w.value.as_str()),
            _ => None,
        }
    }

    /// Quoted identifiers and unreserved words can serve as an implicit alias.
    fn is_alias_candidate(&self) -> bool {
        match &self.token {
            Token::Word(w) => w.quote_style.is_some() || w.keyword == Keyword::NoKeyword,
            _ => false,
        }
    }

    fn ends_operand(&self) -> bool {
        matches!(
            self.token,
            Token::Word(_)
                | Token::Number(_, _)
                | Token::SingleQuotedString(_)
                | Token::DoubleQuotedString(_)
                | Token::RParen
        )
    }
}

pub(crate) fn lex(sql: &str) -> Result<Vec<Lexeme>, ParseError> {
    let dialect = GenericDialect {};
    let tokens = Tokenizer::new(&dialect, sql)
        .with_unescape(false)
        .tokenize()
        .map_err(|e| ParseError::new(sql, format!("tokenizer: {e}")))?;

    let mut lexemes = Vec::with_capacity(tokens.len());
    let mut spaced = false;
    for token in tokens {
        match token {
            Token::Whitespace(_) => spaced = true,
            Token::EOF => {}
            token => {
                lexemes.push(Lexeme { token, spaced });
                spaced = false;
            }
        }
    }
    while matches!(lexemes.last(), Some(Lexeme { token: Token::SemiColon, .. })) {
        lexemes.pop();
    }
    Ok(lexemes)
}

/// Render lexemes back to text; whitespace and comments collapse to one space.
pub(crate) fn render(lexemes: &[Lexeme]) -> String {
    let mut out = String::new();
    for (i, lexeme) in lexemes.iter().enumerate() {
        if i > 0 && lexeme.spaced {
            out.push(' ');
        }
        out.push_str(&lexeme.token.to_string());
    }
    out
}

/// Split on top-level commas, dropping empty parts.
pub(crate) fn split_commas(lexemes: &[Lexeme]) -> Vec<&[Lexeme]> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, lexeme) in lexemes.iter().enumerate() {
        match lexeme.token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            Token::Comma if depth == 0 => {
                parts.push(&lexemes[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&lexemes[start..]);
    parts.retain(|p| !p.is_empty());
    parts
}

/// Split around the first top-level occurrence of `kw`.
pub(crate) fn split_at_keyword(lexemes: &[Lexeme], kw: Keyword) -> Option<(&[Lexeme], &[Lexeme])> {
    let mut depth = 0usize;
    for (i, lexeme) in lexemes.iter().enumerate() {
        match lexeme.token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            _ if depth == 0 && lexeme.is_keyword(kw) => {
                return Some((&lexemes[..i], &lexemes[i + 1..]));
            }
            _ => {}
        }
    }
    None
}

/// Peel `expr AS alias` or `expr alias` into the expression and the alias.
pub(crate) fn split_alias(part: &[Lexeme]) -> (&[Lexeme], Option<String>) {
    let n = part.len();
    if n >= 3 && part[n - 2].is_keyword(Keyword::AS) {
        if let Some(alias) = part[n - 1].word_value() {
            return (&part[..n - 2], Some(alias.to_string()));
        }
    }
    if n >= 2 && part[n - 1].is_alias_candidate() && part[n - 2].ends_operand() {
        if let Some(alias) = part[n - 1].word_value() {
            return (&part[..n - 1], Some(alias.to_string()));
        }
    }
    (part, None)
}

/// `a`, `t.a` or `schema.t.a`: returns the dotted name without quotes.
pub(crate) fn dotted_identifier(lexemes: &[Lexeme]) -> Option<String> {
    if lexemes.is_empty() || lexemes.len() % 2 == 0 {
        return None;
    }
    let mut name = String::new();
    for (i, lexeme) in lexemes.iter().enumerate() {
        if i % 2 == 0 {
            name.push_str(lexeme.word_value()?);
        } else if lexeme.token == Token::Period {
            name.push('.');
        } else {
            return None;
        }
    }
    Some(name)
}

pub(crate) fn integer(lexemes: &[Lexeme]) -> Option<u64> {
    match lexemes {
        [Lexeme { token: Token::Number(n, _), .. }] => n.parse().ok(),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClauseKind {
    Select,
    From,
    Join(JoinKind),
    Where,
    GroupBy,
    Having,
    OrderBy,
    Limit,
    Offset,
}

#[derive(Debug, Clone)]
pub(crate) struct Clause {
    pub kind: ClauseKind,
    /// Keyword text as written, upper-cased (`LEFT OUTER JOIN`).
    pub head: String,
    pub body: Vec<Lexeme>,
}

impl Clause {
    pub fn text(&self) -> String {
        format!("{} {}", self.head, render(&self.body))
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Segments {
    pub distinct: bool,
    pub clauses: Vec<Clause>,
}

impl Segments {
    /// First clause of `kind` that has a body.
    pub fn first(&self, kind: ClauseKind) -> Option<&Clause> {
        self.clauses
            .iter()
            .find(|c| c.kind == kind && !c.body.is_empty())
    }

    pub fn joins(&self) -> impl Iterator<Item = (JoinKind, &Clause)> {
        self.clauses.iter().filter_map(|c| match c.kind {
            ClauseKind::Join(kind) if !c.body.is_empty() => Some((kind, c)),
            _ => None,
        })
    }
}

pub(crate) fn segment_select(sql: &str) -> Result<Segments, ParseError> {
    let lexemes = lex(sql)?;
    if !lexemes.first().is_some_and(|l| l.is_keyword(Keyword::SELECT)) {
        return Err(ParseError::new(sql, "statement does not start with SELECT"));
    }

    let mut segments = Segments::default();
    let mut i = 1;
    match lexemes.get(1).and_then(Lexeme::keyword) {
        Some(Keyword::DISTINCT) => {
            segments.distinct = true;
            i = 2;
        }
        Some(Keyword::ALL) => i = 2,
        _ => {}
    }

    let mut current = Clause {
        kind: ClauseKind::Select,
        head: "SELECT".to_string(),
        body: Vec::new(),
    };
    let mut depth = 0usize;
    while i < lexemes.len() {
        let lexeme = &lexemes[i];
        match lexeme.token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            _ => {}
        }
        if depth == 0 {
            if matches!(
                lexeme.keyword(),
                Some(Keyword::UNION | Keyword::INTERSECT | Keyword::EXCEPT)
            ) {
                debug!("set operation ignored after token {}", i);
                break;
            }
            if let Some((kind, width)) = clause_boundary(&lexemes[i..]) {
                let head = render(&lexemes[i..i + width]).to_ascii_uppercase();
                let finished = std::mem::replace(
                    &mut current,
                    Clause {
                        kind,
                        head,
                        body: Vec::new(),
                    },
                );
                segments.clauses.push(finished);
                i += width;
                continue;
            }
        }
        current.body.push(lexeme.clone());
        i += 1;
    }
    segments.clauses.push(current);
    Ok(segments)
}

fn clause_boundary(rest: &[Lexeme]) -> Option<(ClauseKind, usize)> {
    let followed_by_by = rest.get(1).is_some_and(|l| l.is_keyword(Keyword::BY));
    match rest.first()?.keyword()? {
        Keyword::FROM => Some((ClauseKind::From, 1)),
        Keyword::WHERE => Some((ClauseKind::Where, 1)),
        Keyword::HAVING => Some((ClauseKind::Having, 1)),
        Keyword::LIMIT => Some((ClauseKind::Limit, 1)),
        Keyword::OFFSET => Some((ClauseKind::Offset, 1)),
        Keyword::GROUP if followed_by_by => Some((ClauseKind::GroupBy, 2)),
        Keyword::ORDER if followed_by_by => Some((ClauseKind::OrderBy, 2)),
        Keyword::JOIN
        | Keyword::NATURAL
        | Keyword::INNER
        | Keyword::LEFT
        | Keyword::RIGHT
        | Keyword::FULL
        | Keyword::CROSS => join_prefix(rest),
        _ => None,
    }
}

/// `[NATURAL] [INNER|LEFT|RIGHT|FULL|CROSS] [OUTER] JOIN`; `LEFT(` is a function.
fn join_prefix(rest: &[Lexeme]) -> Option<(ClauseKind, usize)> {
    let mut kind = JoinKind::Inner;
    for (idx, lexeme) in rest.iter().enumerate().take(4) {
        match lexeme.keyword()? {
            Keyword::JOIN => return Some((ClauseKind::Join(kind), idx + 1)),
            Keyword::LEFT => kind = JoinKind::Left,
            Keyword::RIGHT => kind = JoinKind::Right,
            Keyword::FULL => kind = JoinKind::Full,
            Keyword::CROSS => kind = JoinKind::Cross,
            Keyword::NATURAL | Keyword::INNER | Keyword::OUTER => {}
            _ => return None,
        }
    }
    None
}
