//! Lexical scanning and statement splitting.
//!
//! Knows just enough PostgreSQL lexing to tell code apart from string
//! literals (including `E'...'` escape strings), quoted identifiers, comments
//! and dollar-quoted bodies, so that a `;` is only treated as a terminator
//! where the server would.

use std::ops::Range;

/// What a character of the source belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Region {
    Code,
    Quoted,
    Comment,
}

#[derive(Debug, Clone, Copy)]
enum State<'a> {
    Code,
    Single,
    Escaped,
    Double,
    Line,
    Block(u32),
    Dollar(&'a str),
}

/// Per-character classification of a text.
#[derive(Debug)]
pub(crate) struct Scanned {
    /// `(byte offset, char, region)` for every character.
    pub chars: Vec<(usize, char, Region)>,
    /// `false` when the text ends inside a literal or block comment.
    pub closed: bool,
    /// Byte range of every `--` comment, from the dashes to the end of its
    /// line.
    pub line_comments: Vec<Range<usize>>,
}

/// Classify every character of `text`.
pub(crate) fn scan(text: &str) -> Scanned {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut out = Vec::with_capacity(chars.len());
    let mut line_comments = Vec::new();
    let mut comment_start = 0;
    let mut state = State::Code;
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        let next = chars.get(i + 1).map(|&(_, n)| n);
        let mut step = 1;

        match state {
            State::Code => match c {
                '-' if next == Some('-') => {
                    state = State::Line;
                    comment_start = pos;
                    step = 2;
                }
                '/' if next == Some('*') => {
                    state = State::Block(1);
                    step = 2;
                }
                '\'' if opens_escape_string(&chars[..i]) => state = State::Escaped,
                '\'' => state = State::Single,
                '"' => state = State::Double,
                '$' => {
                    if let Some(tag) = dollar_tag(&text[pos..]) {
                        state = State::Dollar(tag);
                        step = tag.len();
                    }
                }
                _ => {}
            },
            State::Single if c == '\'' => state = State::Code,
            State::Escaped => match c {
                '\\' => step = 2,
                '\'' if next == Some('\'') => step = 2,
                '\'' => state = State::Code,
                _ => {}
            },
            State::Double if c == '"' => state = State::Code,
            State::Line if c == '\n' => {
                line_comments.push(comment_start..pos);
                state = State::Code;
            }
            State::Block(depth) => {
                if c == '*' && next == Some('/') {
                    state = if depth == 1 { State::Code } else { State::Block(depth - 1) };
                    step = 2;
                } else if c == '/' && next == Some('*') {
                    state = State::Block(depth + 1);
                    step = 2;
                }
            }
            State::Dollar(tag) if text[pos..].starts_with(tag) => {
                state = State::Code;
                step = tag.len();
            }
            State::Single | State::Double | State::Line | State::Dollar(_) => {}
        }

        let region = region_of(state, c, step);
        for &(p, ch) in &chars[i..(i + step).min(chars.len())] {
            out.push((p, ch, region));
        }
        i += step;
    }

    if matches!(state, State::Line) {
        line_comments.push(comment_start..text.len());
    }
    Scanned {
        chars: out,
        closed: matches!(state, State::Code | State::Line),
        line_comments,
    }
}

/// Region for the characters consumed in one step, given the state *after*
/// the step. Opening and closing delimiters belong to the literal or comment
/// they delimit.
fn region_of(after: State<'_>, c: char, step: usize) -> Region {
    match after {
        State::Line | State::Block(_) => Region::Comment,
        State::Single | State::Escaped | State::Double | State::Dollar(_) => Region::Quoted,
        State::Code => match c {
            // closing delimiter of a literal or comment just consumed
            '\'' | '"' => Region::Quoted,
            '$' if step > 1 => Region::Quoted,
            '*' if step == 2 => Region::Comment,
            _ => Region::Code,
        },
    }
}

/// Whether a `'` following `before` opens an `E'...'` string, in which a
/// backslash escapes the next character.
fn opens_escape_string(before: &[(usize, char)]) -> bool {
    match before {
        [.., (_, p), (_, e)] => matches!(e, 'e' | 'E') && !is_word_char(*p),
        [(_, e)] => matches!(e, 'e' | 'E'),
        [] => false,
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Return the `$tag$` opening `rest`, if any. Tags follow identifier rules,
/// so `$1` (a positional parameter) is not a tag.
fn dollar_tag(rest: &str) -> Option<&str> {
    let body = rest.get(1..)?;
    let len = body
        .char_indices()
        .find(|&(_, c)| !(c.is_ascii_alphanumeric() || c == '_'))
        .map_or(body.len(), |(i, _)| i);
    if !body[len..].starts_with('$') {
        return None;
    }
    if body.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(&rest[..len + 2])
}

/// One `;`-separated statement of a source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Statement<'a> {
    /// Statement text with surrounding whitespace removed, comments kept.
    pub text: &'a str,
    /// Byte offset of `text` within the source.
    pub offset: usize,
    /// Byte offset of the first code character, past any leading comments.
    pub code_offset: usize,
    /// Whether a `;` ended the statement in the source.
    pub terminated: bool,
    /// Byte offset just past the terminator, or the end of the source.
    pub end: usize,
}

impl Statement<'_> {
    /// Byte offset just past `text`.
    pub fn text_end(&self) -> usize {
        self.offset + self.text.len()
    }

    /// Whether the statement holds nothing but comments.
    pub fn is_comment_only(&self) -> bool {
        self.code_offset >= self.text_end()
    }
}

/// Split `source` on top-level semicolons. Blank segments are dropped.
pub(crate) fn split(source: &str) -> Vec<Statement<'_>> {
    let scanned = scan(source);
    let mut statements = Vec::new();
    let mut start = 0;
    let mut first_code: Option<usize> = None;

    for &(pos, c, region) in &scanned.chars {
        if region != Region::Code {
            continue;
        }
        if c == ';' {
            push_segment(source, start, pos, first_code, true, &mut statements);
            start = pos + 1;
            first_code = None;
        } else if first_code.is_none() && !c.is_whitespace() {
            first_code = Some(pos);
        }
    }
    push_segment(source, start, source.len(), first_code, false, &mut statements);
    statements
}

fn push_segment<'a>(
    source: &'a str,
    start: usize,
    end: usize,
    first_code: Option<usize>,
    terminated: bool,
    out: &mut Vec<Statement<'a>>,
) {
    let raw = &source[start..end];
    let text = raw.trim();
    if text.is_empty() {
        return;
    }
    let offset = start + (raw.len() - raw.trim_start().len());
    out.push(Statement {
        text,
        offset,
        code_offset: first_code.unwrap_or(offset + text.len()),
        terminated,
        end: if terminated { end + 1 } else { end },
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(source: &str) -> Vec<&str> {
        split(source).into_iter().map(|s| s.text).collect()
    }

    #[test]
    fn split_separates_statements_and_records_offsets() {
        let source = "SELECT 1;\n  SELECT 2;";
        let statements = split(source);
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].text, "SELECT 1");
        assert_eq!(statements[0].offset, 0);
        assert_eq!(statements[1].text, "SELECT 2");
        assert_eq!(statements[1].offset, 12);
        assert!(statements.iter().all(|s| s.terminated));
    }

    #[test]
    fn split_ignores_semicolons_in_literals_and_comments() {
        let source = "SELECT 'a;b', \"x;y\" -- c;d\n FROM t /* e; /* f; */ g; */;SELECT 2";
        assert_eq!(texts(source).len(), 2, "got {:?}", texts(source));
    }

    #[test]
    fn split_handles_dollar_quoted_bodies() {
        let source =
            "CREATE FUNCTION f() RETURNS int AS $body$ SELECT 1; $body$ LANGUAGE sql; SELECT $1";
        let statements = split(source);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].text.ends_with("LANGUAGE sql"));
        assert_eq!(statements[1].text, "SELECT $1");
        assert!(!statements[1].terminated);
    }

    #[test]
    fn split_drops_blank_segments() {
        assert_eq!(texts(" ; ;\n;SELECT 1;;"), vec!["SELECT 1"]);
        assert!(split("").is_empty());
    }

    #[test]
    fn split_records_code_offset_past_leading_comments() {
        let source = "-- noqa: GN001\nCREATE TABLE t (a int);";
        let statements = split(source);
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].offset, 0);
        assert_eq!(statements[0].code_offset, 15);
        assert!(!statements[0].is_comment_only());
    }

    #[test]
    fn split_keeps_comment_only_segments() {
        let statements = split("SELECT 1; -- trailing");
        assert_eq!(statements.len(), 2);
        assert!(statements[1].is_comment_only());
        assert!(!statements[1].terminated);
    }

    #[test]
    fn split_honours_backslash_escapes_in_escape_strings() {
        let source = r"SELECT E'a\'; b', 'c\'; SELECT e'\\'; SELECT sale'x'";
        assert_eq!(
            texts(source),
            vec![r"SELECT E'a\'; b', 'c\'", r"SELECT e'\\'", "SELECT sale'x'"]
        );
    }

    #[test]
    fn scan_records_line_comment_ranges() {
        let text = "SELECT '-- no' -- first\n/* -- block */ x -- last";
        let comments: Vec<&str> =
            scan(text).line_comments.into_iter().map(|r| &text[r]).collect();
        assert_eq!(comments, vec!["-- first", "-- last"]);
    }

    #[test]
    fn scan_reports_unclosed_literal() {
        assert!(!scan("SELECT 'abc").closed);
        assert!(!scan("SELECT /* abc").closed);
        assert!(!scan(r"SELECT E'abc\'").closed);
        assert!(scan("SELECT 1 -- trailing").closed);
    }

    proptest::proptest! {
        #[test]
        fn proptest_split_offsets_point_at_statement_text(
            parts in proptest::collection::vec("[a-z0-9 ',\n]{0,12}", 0..6usize),
        ) {
            let source = parts.join(";");
            for statement in split(&source) {
                proptest::prop_assert_eq!(
                    &source[statement.offset..statement.text_end()],
                    statement.text
                );
                proptest::prop_assert!(statement.code_offset >= statement.offset);
            }
        }
    }
}
