//! Linting pipeline: split, parse, check, select, suppress, fix.

use sqlparser::ast::Statement as Ast;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Location;

use lintbox_core::{EngineError, LintConfig, LintOutcome, Violation};

use super::rules::{self, apply_fix, Finding, Policy, Rule};
use super::scan::{scan, split, Statement};
use crate::EngineInvocationError;

/// Lint `source` under `config`, fixing fix-enabled findings when `with_fix`
/// is set.
pub(crate) fn lint(
    source: &str,
    config: &LintConfig,
    with_fix: bool,
) -> Result<LintOutcome, EngineInvocationError> {
    let policy = Policy::new(config)
        .map_err(|e| EngineInvocationError::Failed(format!("invalid naming pattern: {e}")))?;
    let selection = Selection { config };
    let dialect = PostgreSqlDialect {};

    let mut outcome = LintOutcome::default();
    let mut fixed = String::with_capacity(source.len());
    let mut copied_to = 0;
    let mut any_fix = false;

    for statement in split(source) {
        if statement.is_comment_only() {
            continue;
        }
        let parsed = match Parser::parse_sql(&dialect, statement.text) {
            Ok(parsed) => parsed,
            Err(e) => {
                outcome.errors.insert(EngineError {
                    statement: statement.text.to_owned(),
                    message: e.to_string(),
                    hint: None,
                });
                continue;
            }
        };

        let suppression = if config.ignore_noqa {
            Suppression::Nothing
        } else {
            Suppression::parse(noqa_text(source, &statement))
        };

        let mut rewritten = parsed.clone();
        let mut changed = false;
        for (ast, target) in parsed.iter().zip(rewritten.iter_mut()) {
            for finding in policy.check(ast) {
                let Some(rule) = rules::rule(finding.code) else { continue };
                if !selection.is_selected(rule) || suppression.covers(rule.code) {
                    continue;
                }
                let fix_enabled = with_fix && selection.is_fixable(rule);
                if fix_enabled {
                    changed |= apply_fix(target, rule.code);
                }
                outcome.violations.push(violation(source, &statement, rule, finding, fix_enabled));
            }
        }

        if changed {
            fixed.push_str(&source[copied_to..statement.code_offset]);
            fixed.push_str(&render(&rewritten));
            copied_to = statement.text_end();
            any_fix = true;
        }
    }

    if any_fix {
        fixed.push_str(&source[copied_to..]);
        if fixed != source {
            outcome.fixed_source_code = Some(fixed);
        }
    }
    outcome.violations.sort_by_key(Violation::position);
    Ok(outcome)
}

fn render(statements: &[Ast]) -> String {
    statements.iter().map(ToString::to_string).collect::<Vec<_>>().join(";\n")
}

/// Rule selection derived from `select`, `ignore`, `fixable` and `unfixable`.
struct Selection<'a> {
    config: &'a LintConfig,
}

impl Selection<'_> {
    fn is_selected(&self, rule: &Rule) -> bool {
        (self.config.select.is_empty() || matches_any(&self.config.select, rule))
            && !matches_any(&self.config.ignore, rule)
    }

    fn is_fixable(&self, rule: &Rule) -> bool {
        rule.fixable
            && (self.config.fixable.is_empty() || matches_any(&self.config.fixable, rule))
            && !matches_any(&self.config.unfixable, rule)
    }
}

/// An entry matches a rule by code prefix (`GN`, `GN001`), by rule name, or
/// `ALL`.
fn matches_any(entries: &[String], rule: &Rule) -> bool {
    entries.iter().any(|entry| {
        let entry = entry.trim();
        !entry.is_empty()
            && (entry.eq_ignore_ascii_case("all")
                || rule.code.starts_with(&entry.to_ascii_uppercase())
                || rule.name.eq_ignore_ascii_case(entry))
    })
}

/// Inline `-- noqa` suppression for one statement.
#[derive(Debug, PartialEq, Eq)]
enum Suppression {
    Nothing,
    All,
    Codes(Vec<String>),
}

impl Suppression {
    /// Only real `--` comments count; dashes inside literals do not.
    fn parse(text: &str) -> Self {
        let mut codes = Vec::new();
        for range in scan(text).line_comments {
            let comment = text[range].trim_start_matches('-').trim();
            let Some(rest) = comment
                .get(..4)
                .filter(|p| p.eq_ignore_ascii_case("noqa"))
                .map(|_| &comment[4..])
            else {
                continue;
            };
            let rest = rest.trim_start();
            match rest.strip_prefix(':') {
                Some(list) => codes.extend(
                    list.split(|c: char| c == ',' || c.is_whitespace())
                        .filter(|c| !c.is_empty())
                        .map(str::to_ascii_uppercase),
                ),
                None if rest.is_empty() => return Self::All,
                None => {}
            }
        }
        if codes.is_empty() {
            Self::Nothing
        } else {
            Self::Codes(codes)
        }
    }

    fn covers(&self, code: &str) -> bool {
        match self {
            Self::Nothing => false,
            Self::All => true,
            Self::Codes(codes) => codes.iter().any(|c| code.starts_with(c.as_str())),
        }
    }
}

/// The statement text plus a trailing `--` comment on the terminator's line.
/// A comment trailing the previous statement's terminator is not included.
fn noqa_text<'a>(source: &'a str, statement: &Statement<'_>) -> &'a str {
    let mut start = statement.offset;
    let line_start = source[..start].rfind('\n').map_or(0, |i| i + 1);
    if statement.text.starts_with("--") && !source[line_start..start].trim().is_empty() {
        start = statement
            .text
            .find('\n')
            .map_or(statement.text_end(), |i| statement.offset + i + 1);
    }

    let rest = &source[statement.end..];
    let line_end = rest.find('\n').map_or(source.len(), |i| statement.end + i);
    if source[statement.end..line_end].trim_start().starts_with("--") {
        &source[start..line_end]
    } else {
        &source[start..statement.text_end()]
    }
}

fn violation(
    source: &str,
    statement: &Statement<'_>,
    rule: &Rule,
    finding: Finding,
    fix_enabled: bool,
) -> Violation {
    let (line_number, column_offset) = finding
        .at
        .and_then(|at| resolve(source, statement.offset, at))
        .unwrap_or_else(|| position_of(source, statement.code_offset));

    Violation {
        rule_code: rule.code.to_owned(),
        rule_name: rule.name.to_owned(),
        rule_category: rule.category.to_owned(),
        line_number,
        column_offset,
        line: line_text(source, line_number).to_owned(),
        statement_location: statement.code_offset,
        description: finding.description,
        is_auto_fixable: rule.fixable,
        is_fix_enabled: fix_enabled,
        help: rule.help.map(str::to_owned),
    }
}

/// 1-based line and 0-based character column of byte offset `at`.
fn position_of(source: &str, at: usize) -> (usize, usize) {
    let before = &source[..at];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    (line, source[line_start..at].chars().count())
}

/// Translate a parser location, relative to text starting at byte
/// `offset`, into an absolute source position.
fn resolve(source: &str, offset: usize, at: Location) -> Option<(usize, usize)> {
    let line = usize::try_from(at.line).ok()?;
    let column = usize::try_from(at.column).ok()?;
    if line == 0 || column == 0 {
        return None;
    }
    let (base_line, base_column) = position_of(source, offset);
    let absolute_line = base_line + line - 1;
    if absolute_line > source.lines().count() {
        return None;
    }
    let absolute_column = if line == 1 { base_column + column - 1 } else { column - 1 };
    Some((absolute_line, absolute_column))
}

fn line_text(source: &str, line_number: usize) -> &str {
    source
        .split('\n')
        .nth(line_number.saturating_sub(1))
        .map_or("", |l| l.trim_end_matches('\r'))
}
