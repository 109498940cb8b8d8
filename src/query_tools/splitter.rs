//! Breaking a script into individual statements.

/// Leading keywords that start a new statement in scripts without semicolons.
const STATEMENT_KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "CREATE", "DROP", "ALTER", "TRUNCATE", "WITH", "SET",
    "SHOW", "DESCRIBE", "EXPLAIN", "USE", "GRANT", "REVOKE",
];

/// Split a script into trimmed, non-empty statements.
///
/// With at least one unquoted `;` the script is cut at those semicolons.
/// Otherwise each line opening with a statement keyword starts a new
/// statement and other lines continue the current one.
pub fn split_statements(script: &str) -> Vec<String> {
    let (statements, saw_separator) = split_on_semicolons(script);
    if saw_separator {
        statements
    } else {
        split_on_keyword_lines(script)
    }
}

fn split_on_semicolons(script: &str) -> (Vec<String>, bool) {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;
    let mut saw_separator = false;

    for ch in script.chars() {
        match ch {
            '\'' | '"' if prev != Some('\\') => match quote {
                None => quote = Some(ch),
                Some(q) if q == ch => quote = None,
                Some(_) => {}
            },
            ';' if quote.is_none() => {
                saw_separator = true;
                push_trimmed(&mut statements, &current);
                current.clear();
                prev = Some(ch);
                continue;
            }
            _ => {}
        }
        current.push(ch);
        prev = Some(ch);
    }
    push_trimmed(&mut statements, &current);
    (statements, saw_separator)
}

fn push_trimmed(statements: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
}

fn split_on_keyword_lines(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in script.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let keyword = leading_keyword(line);
        // UPDATE ... / SET ... is one statement
        let continues_update = keyword == Some("SET") && starts_with_word(&current, "UPDATE");
        if keyword.is_some() && !continues_update && !current.is_empty() {
            statements.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        statements.push(current);
    }
    statements
}

fn leading_keyword(line: &str) -> Option<&'static str> {
    let word: &str = line
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .next()
        .unwrap_or_default();
    STATEMENT_KEYWORDS
        .iter()
        .copied()
        .find(|kw| kw.eq_ignore_ascii_case(word))
}

fn starts_with_word(text: &str, word: &str) -> bool {
    leading_keyword(text).is_some_and(|kw| kw == word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_semicolons() {
        let out = split_statements("SELECT 1; SELECT 2;\n  SELECT 3 ;");
        assert_eq!(out, vec!["SELECT 1", "SELECT 2", "SELECT 3"]);
    }

    #[test]
    fn semicolons_inside_strings_are_kept() {
        let out = split_statements("INSERT INTO t VALUES ('a;b');");
        assert_eq!(out, vec!["INSERT INTO t VALUES ('a;b')"]);

        let out = split_statements(r#"SELECT "x;y", 'it\'s;' FROM t; SELECT 2"#);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], r#"SELECT "x;y", 'it\'s;' FROM t"#);
    }

    #[test]
    fn empty_fragments_dropped() {
        assert_eq!(split_statements(";;  ;\n"), Vec::<String>::new());
        assert!(split_statements("   \n\n ").is_empty());
    }

    #[test]
    fn keyword_lines_without_semicolons() {
        let script = "select *\n  from users\n where age > 18\n\nINSERT INTO t VALUES (1)\nupdate t\nset a = 2\nwhere id = 1";
        let out = split_statements(script);
        assert_eq!(
            out,
            vec![
                "select * from users where age > 18",
                "INSERT INTO t VALUES (1)",
                "update t set a = 2 where id = 1",
            ]
        );
    }

    #[test]
    fn keyword_must_be_a_whole_word() {
        let out = split_statements("SELECT a\nselected_total\nFROM t");
        assert_eq!(out, vec!["SELECT a selected_total FROM t"]);
    }
}
