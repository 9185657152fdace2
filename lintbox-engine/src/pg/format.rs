//! Formatting pipeline.
//!
//! Each statement is parsed and rendered back in canonical form, then laid
//! out according to the [`FormatConfig`]. Statements that fail to parse are
//! kept as written so that one typo does not erase the rest of the script.
//! Comments before a statement, and a `--` comment trailing its terminator,
//! are carried over; a statement with comments inside its code is kept as
//! written because the canonical rendering would drop them.

use std::collections::BTreeSet;

use sqlparser::ast::Statement as Ast;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer, Whitespace};

use lintbox_core::config::MAX_LINES_BETWEEN_STATEMENTS;
use lintbox_core::{EngineError, FormatConfig, FormatOutcome};

use super::scan::{scan, split, Region, Statement};

const INDENT: &str = "    ";
const CATALOG_SCHEMA: &str = "pg_catalog";

pub(crate) fn format(source: &str, config: &FormatConfig) -> FormatOutcome {
    let dialect = PostgreSqlDialect {};
    let mut pieces: Vec<String> = Vec::new();
    let mut errors = BTreeSet::new();

    for statement in split(source) {
        let (trailing, rest) = trailing_comment(source, &statement);
        if let Some(comment) = trailing {
            match pieces.last_mut() {
                Some(last) => {
                    last.push(' ');
                    last.push_str(comment);
                }
                None => pieces.push(comment.to_owned()),
            }
        }

        let leading = source[rest..statement.code_offset].trim();
        let body = &source[statement.code_offset..statement.text_end()];
        let code = if body.is_empty() {
            None
        } else {
            Some(match Parser::parse_sql(&dialect, statement.text) {
                Ok(parsed) if !parsed.is_empty() && !has_comments(body) => render(&parsed, config),
                Ok(_) => verbatim(body, statement.terminated, config),
                Err(e) => {
                    errors.insert(EngineError {
                        statement: statement.text.to_owned(),
                        message: e.to_string(),
                        hint: None,
                    });
                    verbatim(body, statement.terminated, config)
                }
            })
        };

        let piece = match code {
            Some(code) if leading.is_empty() => code,
            Some(code) => format!("{leading}\n{code}"),
            None => verbatim(leading, statement.terminated, config),
        };
        if !piece.is_empty() {
            pieces.push(piece);
        }
    }

    if pieces.is_empty() {
        return FormatOutcome { formatted_source_code: source.to_owned(), errors };
    }

    let gap = config.lines_between_statements.min(MAX_LINES_BETWEEN_STATEMENTS);
    let separator = "\n".repeat(usize::try_from(gap).unwrap_or(1) + 1);
    let mut formatted = pieces.join(&separator);
    formatted.push('\n');
    FormatOutcome { formatted_source_code: formatted, errors }
}

/// A `--` comment on the same line as the previous statement's terminator
/// belongs to that statement. Returns it along with the offset at which the
/// rest of `statement` starts.
fn trailing_comment<'a>(source: &'a str, statement: &Statement<'_>) -> (Option<&'a str>, usize) {
    let line_start = source[..statement.offset].rfind('\n').map_or(0, |i| i + 1);
    let shares_line = !source[line_start..statement.offset].trim().is_empty();
    let stands_alone = statement.is_comment_only() && statement.terminated;
    if !statement.text.starts_with("--") || !shares_line || stands_alone {
        return (None, statement.offset);
    }
    let line_end = statement
        .text
        .find('\n')
        .map_or(statement.text_end(), |i| statement.offset + i);
    (Some(source[statement.offset..line_end].trim_end()), line_end)
}

fn has_comments(text: &str) -> bool {
    scan(text).chars.iter().any(|&(_, _, region)| region == Region::Comment)
}

fn render(parsed: &[Ast], config: &FormatConfig) -> String {
    let body = parsed
        .iter()
        .map(|statement| layout(statement, config))
        .collect::<Vec<_>>()
        .join(";\n");
    let terminator = terminator(&body, config);
    body + terminator
}

/// Text as written, terminated only if the source terminated it.
fn verbatim(text: &str, terminated: bool, config: &FormatConfig) -> String {
    let mut text = text.to_owned();
    if terminated {
        text.push_str(terminator(&text, config));
    }
    text
}

/// A `;` on the last line of a statement ending in a line comment would be
/// commented out, so it always goes on its own line there.
fn terminator(text: &str, config: &FormatConfig) -> &'static str {
    let last_line = text.rsplit('\n').next().unwrap_or_default();
    if config.new_line_before_semicolon || last_line.contains("--") {
        "\n;"
    } else {
        ";"
    }
}

fn layout(statement: &Ast, config: &FormatConfig) -> String {
    let mut text = statement.to_string();
    if config.remove_pg_catalog_from_functions {
        text = strip_catalog_prefix(&text);
    }
    if matches!(statement, Ast::Query(_)) {
        text = break_commas(&text, config.comma_at_beginning);
    }
    text
}

/// Tokens of `text` paired with the byte offset each one starts at, or
/// `None` if `text` does not tokenize.
fn tokens(text: &str) -> Option<Vec<(usize, Token)>> {
    let dialect = PostgreSqlDialect {};
    let tokens = Tokenizer::new(&dialect, text).tokenize_with_location().ok()?;

    // Byte offset of every char, and the char index each line starts at.
    let mut offsets = Vec::with_capacity(text.len() + 1);
    let mut line_heads = vec![0];
    for (at, c) in text.char_indices() {
        offsets.push(at);
        if c == '\n' {
            line_heads.push(offsets.len());
        }
    }
    offsets.push(text.len());

    tokens
        .into_iter()
        .filter(|t| t.token != Token::EOF)
        .map(|t| {
            let line = usize::try_from(t.span.start.line).ok()?.checked_sub(1)?;
            let column = usize::try_from(t.span.start.column).ok()?.checked_sub(1)?;
            let at = *offsets.get(line_heads.get(line)? + column)?;
            Some((at, t.token))
        })
        .collect()
}

/// Drop `pg_catalog.` from function calls. Quoted text and qualified
/// relations are left alone.
fn strip_catalog_prefix(text: &str) -> String {
    let Some(tokens) = tokens(text) else {
        return text.to_owned();
    };
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;

    for (i, (at, token)) in tokens.iter().enumerate() {
        let Token::Word(word) = token else { continue };
        if word.quote_style.is_some() || !word.value.eq_ignore_ascii_case(CATALOG_SCHEMA) {
            continue;
        }
        if i > 0 && tokens[i - 1].1 == Token::Period {
            continue;
        }
        let (Some((_, Token::Period)), Some((name_at, Token::Word(_)))) =
            (tokens.get(i + 1), tokens.get(i + 2))
        else {
            continue;
        };
        let called = tokens
            .iter()
            .skip(i + 3)
            .find(|(_, t)| !matches!(t, Token::Whitespace(_)))
            .is_some_and(|(_, t)| *t == Token::LParen);
        if called {
            out.push_str(&text[copied..*at]);
            copied = *name_at;
        }
    }
    out.push_str(&text[copied..]);
    out
}

/// Put each top-level list item of a query on its own line.
fn break_commas(text: &str, comma_first: bool) -> String {
    let Some(tokens) = tokens(text) else {
        return text.to_owned();
    };
    let mut out = String::with_capacity(text.len() + 16);
    let mut depth = 0_i32;
    let mut copied = 0;
    let mut iter = tokens.iter().peekable();

    while let Some((at, token)) = iter.next() {
        match token {
            Token::LParen | Token::LBracket => depth += 1,
            Token::RParen | Token::RBracket => depth -= 1,
            Token::Comma if depth == 0 => {
                out.push_str(&text[copied..*at]);
                if comma_first {
                    out.push('\n');
                    out.push_str(INDENT);
                    out.push_str(", ");
                } else {
                    out.push_str(",\n");
                    out.push_str(INDENT);
                }
                copied = at + 1;
                while let Some((space_at, Token::Whitespace(Whitespace::Space))) = iter.peek() {
                    copied = space_at + 1;
                    iter.next();
                }
            }
            _ => {}
        }
    }
    out.push_str(&text[copied..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use lintbox_core::LintConfig;

    fn fmt(source: &str, config: &FormatConfig) -> FormatOutcome {
        format(source, config)
    }

    fn compact() -> FormatConfig {
        FormatConfig {
            comma_at_beginning: false,
            new_line_before_semicolon: false,
            ..FormatConfig::default()
        }
    }

    #[test]
    fn canonicalises_keywords_and_terminates() {
        let outcome = fmt("select 1;", &FormatConfig::default());
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.formatted_source_code, "SELECT 1\n;\n");
        assert_eq!(fmt("select 1;", &compact()).formatted_source_code, "SELECT 1;\n");
    }

    #[test]
    fn comma_layout_follows_config() {
        let source = "select a, b, f(c, d) from t;";
        assert_eq!(
            fmt(source, &FormatConfig::default()).formatted_source_code,
            "SELECT a\n    , b\n    , f(c, d) FROM t\n;\n"
        );
        assert_eq!(
            fmt(source, &compact()).formatted_source_code,
            "SELECT a,\n    b,\n    f(c, d) FROM t;\n"
        );
    }

    #[test]
    fn escape_string_contents_are_left_alone() {
        let once = fmt(r"select E'a\', b', 1;", &FormatConfig::default()).formatted_source_code;
        assert_eq!(once, "SELECT E'a\\', b'\n    , 1\n;\n");
        assert_eq!(fmt(&once, &FormatConfig::default()).formatted_source_code, once);
    }

    #[test]
    fn strips_catalog_prefix_from_calls_only() {
        assert_eq!(strip_catalog_prefix("SELECT pg_catalog.now()"), "SELECT now()");
        assert_eq!(strip_catalog_prefix("SELECT 'pg_catalog.now()'"), "SELECT 'pg_catalog.now()'");
        assert_eq!(
            strip_catalog_prefix("SELECT * FROM pg_catalog.pg_class"),
            "SELECT * FROM pg_catalog.pg_class"
        );

        let keep = FormatConfig { remove_pg_catalog_from_functions: false, ..compact() };
        assert_eq!(
            fmt("select pg_catalog.now();", &keep).formatted_source_code,
            "SELECT pg_catalog.now();\n"
        );
    }

    #[test]
    fn statements_are_separated_by_configured_blank_lines() {
        let config = FormatConfig { lines_between_statements: 2, ..compact() };
        assert_eq!(
            fmt("select 1; select 2;", &config).formatted_source_code,
            "SELECT 1;\n\n\nSELECT 2;\n"
        );
    }

    #[test]
    fn blank_line_count_is_bounded() {
        let config = FormatConfig { lines_between_statements: u32::MAX, ..compact() };
        let formatted = fmt("select 1; select 2;", &config).formatted_source_code;
        let max = usize::try_from(MAX_LINES_BETWEEN_STATEMENTS).unwrap_or(usize::MAX);
        assert_eq!(formatted.len(), "SELECT 1;".len() + max + 1 + "SELECT 2;\n".len());
    }

    #[test]
    fn unparseable_statement_is_kept_and_reported() {
        let outcome = fmt("select 1 from; select 2;", &compact());
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.formatted_source_code, "select 1 from;\n\nSELECT 2;\n");
    }

    #[test]
    fn trailing_line_comment_forces_newline_terminator() {
        let outcome = fmt("select 1 from -- oops\n;", &compact());
        assert_eq!(outcome.formatted_source_code, "select 1 from -- oops\n;\n");
    }

    #[test]
    fn noqa_comment_survives_formatting() {
        let source = "-- noqa: GN001\nCREATE TABLE users (id INT, name TEXT); -- keep\n";
        let formatted = fmt(source, &FormatConfig::default()).formatted_source_code;
        assert_eq!(
            formatted,
            "-- noqa: GN001\nCREATE TABLE users (id INT, name TEXT)\n; -- keep\n"
        );

        let linted = match super::super::lint::lint(&formatted, &LintConfig::default(), false) {
            Ok(o) => o,
            Err(e) => panic!("lint failed: {e}"),
        };
        assert!(linted.violations.is_empty(), "got {:?}", linted.violations);
    }

    #[test]
    fn trailing_comment_stays_with_its_statement() {
        let formatted = fmt("select 1; -- noqa\nselect 2;", &compact()).formatted_source_code;
        assert_eq!(formatted, "SELECT 1; -- noqa\n\nSELECT 2;\n");
    }

    #[test]
    fn statement_with_interior_comment_is_kept_as_written() {
        let outcome = fmt("select a, -- first\n  b from t;", &compact());
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.formatted_source_code, "select a, -- first\n  b from t;\n");
    }

    #[test]
    fn empty_input_is_returned_unchanged() {
        let outcome = fmt("  \n", &FormatConfig::default());
        assert_eq!(outcome.formatted_source_code, "  \n");
        assert!(outcome.errors.is_empty());
    }

    proptest::proptest! {
        #[test]
        fn proptest_format_is_idempotent(
            picks in proptest::collection::vec(0..10usize, 1..5usize),
            comma_first in proptest::bool::ANY,
            newline_semicolon in proptest::bool::ANY,
            gap in 0..3u32,
        ) {
            const STATEMENTS: [&str; 10] = [
                "select a, b from t where a = 1",
                "SELECT pg_catalog.now(), 'x;y'",
                "create table users (id int primary key, name text)",
                "create index users_name_idx on public.users (name)",
                "select 1 from",
                "-- just a comment",
                "select array[1, 2], count(*) from t group by 1",
                "insert into t (a, b) values (1, 2)",
                r"select E'a\', b', 1",
                "-- noqa: GN001\nselect a, /* inline */ b from t",
            ];
            let source = picks.iter().map(|&i| STATEMENTS[i]).collect::<Vec<_>>().join(";\n") + ";";
            let config = FormatConfig {
                comma_at_beginning: comma_first,
                new_line_before_semicolon: newline_semicolon,
                lines_between_statements: gap,
                ..FormatConfig::default()
            };
            let once = format(&source, &config).formatted_source_code;
            let twice = format(&once, &config).formatted_source_code;
            proptest::prop_assert_eq!(once, twice);
        }
    }
}
