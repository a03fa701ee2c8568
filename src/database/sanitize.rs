//! Query text cleanup and statement splitting.
//!
//! Generated query text often arrives wrapped in fenced code blocks or prefixed
//! with a label such as `SQL:`. [`sanitize_query`] removes those artifacts and is
//! applied once, by the executor, right before a batch is split and run.
use regex::Regex;
use std::sync::LazyLock;

/// First keywords that make an instruction recognizable as query text.
pub const QUERY_KEYWORDS: [&str; 9] = ["SELECT", "INSERT", "UPDATE", "DELETE", "ALTER", "CREATE", "DROP", "PRAGMA", "WITH"];

/// First keywords of statements that produce a row set.
const ROW_KEYWORDS: [&str; 11] = [
    "SELECT", "WITH", "VALUES", "FROM", "TABLE", "SHOW", "DESCRIBE", "SUMMARIZE", "EXPLAIN", "PRAGMA", "CALL",
];

static FENCES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)```(?:sql)?:?").expect("Hardcode regex pattern"));
static LABELS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(?:answer|sqlquery|sql|resposta|query)\s*:").expect("Hardcode regex pattern"));

/// Removes fence markers and one leading answer label, then trims.
pub fn sanitize_query(text: &str) -> String {
    let text = FENCES.replace_all(text, "");
    let text = LABELS.replace(text.trim(), "");
    text.trim().to_owned()
}

/// Splits a batch on `;`, ignoring terminators inside quoted literals and comments.
/// Comments are dropped and statements that end up empty are left out.
pub fn split_statements(text: &str) -> Vec<String> {
    let mut statements = Vec::<String>::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    let mut quote = None::<char>;
    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => {
                current.push(c);
                quote = None;
            }
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => {
                current.push(c);
                quote = Some(c);
            }
            (None, '-') if chars.peek() == Some(&'-') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        current.push('\n');
                        break;
                    }
                }
            }
            (None, '/') if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = ' ';
                for c in chars.by_ref() {
                    if previous == '*' && c == '/' {
                        break;
                    }
                    previous = c;
                }
                current.push(' ');
            }
            (None, ';') => statements.push(std::mem::take(&mut current)),
            (None, c) => current.push(c),
        }
    }
    statements.push(current);
    statements
        .into_iter()
        .map(|statement| statement.trim().to_owned())
        .filter(|statement| !statement.is_empty())
        .collect()
}

/// Uppercased first keyword of a statement, skipping whitespace, comments and opening parentheses.
pub fn first_keyword(statement: &str) -> String {
    let mut rest = statement;
    loop {
        let trimmed = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '(');
        if let Some(comment) = trimmed.strip_prefix("--") {
            rest = comment.split_once('\n').map(|(_, tail)| tail).unwrap_or("");
        } else if let Some(comment) = trimmed.strip_prefix("/*") {
            rest = comment.split_once("*/").map(|(_, tail)| tail).unwrap_or("");
        } else {
            rest = trimmed;
            break;
        }
    }
    rest.chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Checks whether an instruction reads as query text rather than prose.
pub fn is_query_text(text: &str) -> bool {
    let keyword = first_keyword(&sanitize_query(text));
    QUERY_KEYWORDS.contains(&keyword.as_str())
}

/// Checks whether a statement is expected to produce a row set.
pub fn returns_rows(statement: &str) -> bool {
    let keyword = first_keyword(statement);
    ROW_KEYWORDS.contains(&keyword.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fences_and_labels() {
        assert_eq!(sanitize_query("```sql\nSELECT 1;\n```"), "SELECT 1;");
        assert_eq!(sanitize_query("```SQL: SELECT 1```"), "SELECT 1");
        assert_eq!(sanitize_query("SQLQuery: SELECT * FROM T"), "SELECT * FROM T");
        assert_eq!(sanitize_query("  answer:\nDELETE FROM T"), "DELETE FROM T");
        assert_eq!(sanitize_query("Resposta: SELECT 2"), "SELECT 2");
        assert_eq!(sanitize_query("SQL: SELECT 'SQL: kept'"), "SELECT 'SQL: kept'");
        assert_eq!(sanitize_query("SELECT 1"), "SELECT 1");
    }

    #[test]
    fn splits_outside_literals_and_comments() {
        let statements = split_statements(
            "UPDATE T SET A = 'x;y';\n-- note; not a split\nSELECT \"a;b\" FROM T; /* c;d */ ;  ;DROP TABLE T",
        );
        assert_eq!(
            statements,
            vec!["UPDATE T SET A = 'x;y'", "SELECT \"a;b\" FROM T", "DROP TABLE T"]
        );
        assert!(split_statements(" ; ;\n").is_empty());
        assert_eq!(split_statements("SELECT 'it''s'"), vec!["SELECT 'it''s'"]);
    }

    #[test]
    fn recognizes_query_text() {
        assert!(is_query_text("select * from T"));
        assert!(is_query_text("```sql\nWITH x AS (SELECT 1) SELECT * FROM x```"));
        assert!(is_query_text("SQL: delete from T"));
        assert!(!is_query_text(""));
        assert!(!is_query_text("run the previous query"));
        assert!(!is_query_text("selection of rows"));
    }

    #[test]
    fn classifies_row_returning_statements() {
        assert!(returns_rows("SELECT 1"));
        assert!(returns_rows("  (SELECT 1) UNION (SELECT 2)"));
        assert!(returns_rows("-- header\nwith x as (select 1) select * from x"));
        assert!(returns_rows("DESCRIBE T"));
        assert!(!returns_rows("INSERT INTO T VALUES (1)"));
        assert!(!returns_rows("CREATE TABLE T AS SELECT 1"));
        assert_eq!(first_keyword("/* a */ update T"), "UPDATE");
    }
}
