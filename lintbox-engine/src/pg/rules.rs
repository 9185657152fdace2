//! Rule catalogue and per-statement checks.

use regex::Regex;
use sqlparser::ast::{
    ColumnDef, ColumnOption, DataType, Ident, ObjectName, Statement, TableConstraint, TimezoneInfo,
};
use sqlparser::tokenizer::Location;

use lintbox_core::LintConfig;

/// Static description of a lint rule.
#[derive(Debug)]
pub(crate) struct Rule {
    pub code: &'static str,
    pub name: &'static str,
    pub category: &'static str,
    pub fixable: bool,
    pub help: Option<&'static str>,
}

pub(crate) const RULES: &[Rule] = &[
    Rule {
        code: "GN001",
        name: "missing-primary-key",
        category: "general",
        fixable: false,
        help: Some("Add a primary key column or constraint"),
    },
    Rule {
        code: "GN002",
        name: "missing-required-column",
        category: "general",
        fixable: false,
        help: Some("Add the required column to the table definition"),
    },
    Rule {
        code: "GN003",
        name: "disallowed-extension",
        category: "general",
        fixable: false,
        help: Some("Add the extension to allowed-extensions or remove the statement"),
    },
    Rule {
        code: "GN004",
        name: "disallowed-language",
        category: "general",
        fixable: false,
        help: Some("Add the language to allowed-languages or rewrite the function"),
    },
    Rule {
        code: "US001",
        name: "non-concurrent-index",
        category: "unsafe",
        fixable: true,
        help: Some("Create the index CONCURRENTLY to avoid blocking writes"),
    },
    Rule {
        code: "SC001",
        name: "disallowed-schema",
        category: "schema",
        fixable: false,
        help: Some("Create the object in a different schema"),
    },
    Rule {
        code: "TP001",
        name: "disallowed-data-type",
        category: "typing",
        fixable: false,
        help: Some("Use a different data type"),
    },
    Rule {
        code: "TP002",
        name: "timestamp-without-time-zone",
        category: "typing",
        fixable: true,
        help: Some("Use TIMESTAMP WITH TIME ZONE"),
    },
    Rule {
        code: "NM001",
        name: "timestamp-column-suffix",
        category: "naming",
        fixable: false,
        help: Some("Rename the column to end with the configured timestamp suffix"),
    },
    Rule {
        code: "NM002",
        name: "date-column-suffix",
        category: "naming",
        fixable: false,
        help: Some("Rename the column to end with the configured date suffix"),
    },
    Rule {
        code: "NM003",
        name: "invalid-index-name",
        category: "naming",
        fixable: false,
        help: Some("Rename the index to match regex-index"),
    },
    Rule {
        code: "NM004",
        name: "invalid-sequence-name",
        category: "naming",
        fixable: false,
        help: Some("Rename the sequence to match regex-sequence"),
    },
    Rule {
        code: "NM005",
        name: "invalid-primary-key-name",
        category: "naming",
        fixable: false,
        help: Some("Rename the constraint to match regex-constraint-primary-key"),
    },
    Rule {
        code: "NM006",
        name: "invalid-unique-key-name",
        category: "naming",
        fixable: false,
        help: Some("Rename the constraint to match regex-constraint-unique-key"),
    },
    Rule {
        code: "NM007",
        name: "invalid-foreign-key-name",
        category: "naming",
        fixable: false,
        help: Some("Rename the constraint to match regex-constraint-foreign-key"),
    },
    Rule {
        code: "NM008",
        name: "invalid-check-constraint-name",
        category: "naming",
        fixable: false,
        help: Some("Rename the constraint to match regex-constraint-check"),
    },
];

/// Look up a rule by code.
pub(crate) fn rule(code: &str) -> Option<&'static Rule> {
    RULES.iter().find(|r| r.code == code)
}

/// A rule that fired on a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Finding {
    pub code: &'static str,
    pub description: String,
    /// Position of the offending token relative to the parsed text, when the
    /// parser recorded one.
    pub at: Option<Location>,
}

impl Finding {
    fn new(code: &'static str, description: String, at: Option<&Ident>) -> Self {
        Self { code, description, at: at.and_then(location) }
    }
}

fn location(ident: &Ident) -> Option<Location> {
    (ident.span.start.line > 0).then_some(ident.span.start)
}

/// Naming and shape policy compiled from a [`LintConfig`] for one run.
pub(crate) struct Policy<'a> {
    config: &'a LintConfig,
    index: Regex,
    sequence: Regex,
    primary_key: Regex,
    unique_key: Regex,
    foreign_key: Regex,
    check: Regex,
}

impl<'a> Policy<'a> {
    pub fn new(config: &'a LintConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            config,
            index: Regex::new(&config.regex_index)?,
            sequence: Regex::new(&config.regex_sequence)?,
            primary_key: Regex::new(&config.regex_constraint_primary_key)?,
            unique_key: Regex::new(&config.regex_constraint_unique_key)?,
            foreign_key: Regex::new(&config.regex_constraint_foreign_key)?,
            check: Regex::new(&config.regex_constraint_check)?,
        })
    }

    /// Run every rule against `statement`. Selection and suppression are
    /// applied by the caller.
    pub fn check(&self, statement: &Statement) -> Vec<Finding> {
        let mut findings = Vec::new();
        match statement {
            Statement::CreateTable(table) => {
                self.check_schema(&table.name, &mut findings);
                self.check_table(
                    &table.name,
                    &table.columns,
                    &table.constraints,
                    table.query.is_some(),
                    &mut findings,
                );
            }
            Statement::CreateIndex(index) => {
                let anchor = index
                    .name
                    .as_ref()
                    .and_then(last_part)
                    .or_else(|| last_part(&index.table_name));
                if !index.concurrently {
                    findings.push(Finding::new(
                        "US001",
                        format!("Index on '{}' is not created concurrently", index.table_name),
                        anchor,
                    ));
                }
                if let Some(ident) = index.name.as_ref().and_then(last_part) {
                    if !self.index.is_match(&ident.value) {
                        findings.push(Finding::new(
                            "NM003",
                            format!(
                                "Index name '{}' does not match '{}'",
                                ident.value,
                                self.index.as_str()
                            ),
                            Some(ident),
                        ));
                    }
                }
                self.check_schema(&index.table_name, &mut findings);
            }
            Statement::CreateSequence { name, .. } => {
                if let Some(ident) = last_part(name) {
                    if !self.sequence.is_match(&ident.value) {
                        findings.push(Finding::new(
                            "NM004",
                            format!(
                                "Sequence name '{}' does not match '{}'",
                                ident.value,
                                self.sequence.as_str()
                            ),
                            Some(ident),
                        ));
                    }
                }
                self.check_schema(name, &mut findings);
            }
            Statement::CreateExtension { name, .. } => {
                if !contains_ignore_case(&self.config.allowed_extensions, &name.value) {
                    findings.push(Finding::new(
                        "GN003",
                        format!("Extension '{}' is not allowed", name.value),
                        Some(name),
                    ));
                }
            }
            Statement::CreateFunction(function) => {
                if let Some(language) = &function.language {
                    if !contains_ignore_case(&self.config.allowed_languages, &language.value) {
                        findings.push(Finding::new(
                            "GN004",
                            format!("Language '{}' is not allowed", language.value),
                            Some(language),
                        ));
                    }
                }
                self.check_schema(&function.name, &mut findings);
            }
            _ => {}
        }
        findings
    }

    fn check_schema(&self, name: &ObjectName, findings: &mut Vec<Finding>) {
        let parts = &name.0;
        if parts.len() < 2 {
            return;
        }
        let schema = &parts[parts.len() - 2];
        if contains_ignore_case(&self.config.disallowed_schemas, &schema.value) {
            findings.push(Finding::new(
                "SC001",
                format!("Schema '{}' is not allowed", schema.value),
                Some(schema),
            ));
        }
    }

    fn check_table(
        &self,
        name: &ObjectName,
        columns: &[ColumnDef],
        constraints: &[TableConstraint],
        from_query: bool,
        findings: &mut Vec<Finding>,
    ) {
        let table = last_part(name);
        let table_name = name.to_string();

        if !from_query {
            let column_pk = columns.iter().any(|c| {
                c.options
                    .iter()
                    .any(|o| matches!(o.option, ColumnOption::Unique { is_primary: true, .. }))
            });
            let table_pk = constraints
                .iter()
                .any(|c| matches!(c, TableConstraint::PrimaryKey { .. }));
            if !column_pk && !table_pk {
                findings.push(Finding::new(
                    "GN001",
                    format!("Table '{table_name}' has no primary key"),
                    table,
                ));
            }

            for required in &self.config.required_columns {
                if !columns.iter().any(|c| c.name.value.eq_ignore_ascii_case(required)) {
                    findings.push(Finding::new(
                        "GN002",
                        format!("Table '{table_name}' is missing required column '{required}'"),
                        table,
                    ));
                }
            }
        }

        for column in columns {
            self.check_column(column, findings);
        }

        for constraint in constraints {
            let (code, ident, pattern) = match constraint {
                TableConstraint::PrimaryKey { name: Some(n), .. } => {
                    ("NM005", n, &self.primary_key)
                }
                TableConstraint::Unique { name: Some(n), .. } => ("NM006", n, &self.unique_key),
                TableConstraint::ForeignKey { name: Some(n), .. } => {
                    ("NM007", n, &self.foreign_key)
                }
                TableConstraint::Check { name: Some(n), .. } => ("NM008", n, &self.check),
                _ => continue,
            };
            check_constraint_name(code, ident, pattern, findings);
        }
    }

    fn check_column(&self, column: &ColumnDef, findings: &mut Vec<Finding>) {
        let name = &column.name;
        let type_name = column.data_type.to_string();

        if is_disallowed_type(&self.config.disallowed_data_types, &type_name) {
            findings.push(Finding::new(
                "TP001",
                format!("Column '{}' uses disallowed data type '{type_name}'", name.value),
                Some(name),
            ));
        }

        match &column.data_type {
            DataType::Timestamp(_, tz) => {
                if matches!(tz, TimezoneInfo::None | TimezoneInfo::WithoutTimeZone) {
                    findings.push(Finding::new(
                        "TP002",
                        format!("Column '{}' is a timestamp without time zone", name.value),
                        Some(name),
                    ));
                }
                let suffix = &self.config.timestamp_column_suffix;
                if !suffix.is_empty() && !name.value.ends_with(suffix.as_str()) {
                    findings.push(Finding::new(
                        "NM001",
                        format!("Timestamp column '{}' should end with '{suffix}'", name.value),
                        Some(name),
                    ));
                }
            }
            DataType::Date => {
                let suffix = &self.config.date_column_suffix;
                if !suffix.is_empty() && !name.value.ends_with(suffix.as_str()) {
                    findings.push(Finding::new(
                        "NM002",
                        format!("Date column '{}' should end with '{suffix}'", name.value),
                        Some(name),
                    ));
                }
            }
            _ => {}
        }

        for option in &column.options {
            let Some(ident) = &option.name else { continue };
            let (code, pattern) = match option.option {
                ColumnOption::Unique { is_primary: true, .. } => ("NM005", &self.primary_key),
                ColumnOption::Unique { is_primary: false, .. } => ("NM006", &self.unique_key),
                ColumnOption::ForeignKey { .. } => ("NM007", &self.foreign_key),
                ColumnOption::Check(_) => ("NM008", &self.check),
                _ => continue,
            };
            check_constraint_name(code, ident, pattern, findings);
        }
    }
}

fn check_constraint_name(
    code: &'static str,
    ident: &Ident,
    pattern: &Regex,
    findings: &mut Vec<Finding>,
) {
    if !pattern.is_match(&ident.value) {
        findings.push(Finding::new(
            code,
            format!("Constraint name '{}' does not match '{}'", ident.value, pattern.as_str()),
            Some(ident),
        ));
    }
}

/// Apply the automatic fix for `code` to `statement`. Returns `true` if the
/// statement changed.
pub(crate) fn apply_fix(statement: &mut Statement, code: &str) -> bool {
    match (code, statement) {
        ("US001", Statement::CreateIndex(index)) if !index.concurrently => {
            index.concurrently = true;
            true
        }
        ("TP002", Statement::CreateTable(table)) => {
            let mut changed = false;
            for column in &mut table.columns {
                if let DataType::Timestamp(_, tz) = &mut column.data_type {
                    if matches!(tz, TimezoneInfo::None | TimezoneInfo::WithoutTimeZone) {
                        *tz = TimezoneInfo::WithTimeZone;
                        changed = true;
                    }
                }
            }
            changed
        }
        _ => false,
    }
}

fn last_part(name: &ObjectName) -> Option<&Ident> {
    name.0.last()
}

fn contains_ignore_case(list: &[String], value: &str) -> bool {
    list.iter().any(|item| item.eq_ignore_ascii_case(value))
}

/// Compare a rendered type such as `VARCHAR(20)` against a deny list, both by
/// its full spelling and by its base name.
fn is_disallowed_type(list: &[String], type_name: &str) -> bool {
    let full = type_name.to_ascii_lowercase();
    let base = full.split('(').next().unwrap_or_default().trim();
    list.iter().any(|item| {
        let item = item.trim().to_ascii_lowercase();
        item == full || item == base
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlparser::dialect::PostgreSqlDialect;
    use sqlparser::parser::Parser;

    fn parse(sql: &str) -> Statement {
        match Parser::parse_sql(&PostgreSqlDialect {}, sql) {
            Ok(mut statements) if statements.len() == 1 => statements.remove(0),
            Ok(other) => panic!("expected one statement, got {}", other.len()),
            Err(e) => panic!("parse failed: {e}"),
        }
    }

    fn codes(config: &LintConfig, sql: &str) -> Vec<&'static str> {
        let policy = match Policy::new(config) {
            Ok(p) => p,
            Err(e) => panic!("policy failed: {e}"),
        };
        policy.check(&parse(sql)).into_iter().map(|f| f.code).collect()
    }

    #[test]
    fn rule_codes_are_unique() {
        let mut seen = std::collections::HashSet::new();
        assert!(RULES.iter().all(|r| seen.insert(r.code)), "duplicate rule code");
    }

    #[test]
    fn select_literal_fires_nothing() {
        assert!(codes(&LintConfig::default(), "SELECT 1").is_empty());
    }

    #[test]
    fn table_without_primary_key_fires_gn001() {
        let found = codes(&LintConfig::default(), "CREATE TABLE users (id INT, name TEXT)");
        assert_eq!(found, vec!["GN001"]);
    }

    #[test]
    fn primary_key_in_column_or_constraint_satisfies_gn001() {
        let config = LintConfig::default();
        assert!(codes(&config, "CREATE TABLE a (id INT PRIMARY KEY)").is_empty());
        let with_constraint = "CREATE TABLE a (id INT, CONSTRAINT a_pk PRIMARY KEY (id))";
        assert!(codes(&config, with_constraint).is_empty());
    }

    #[test]
    fn required_columns_are_enforced_case_insensitively() {
        let config = LintConfig {
            required_columns: vec!["created_at".to_owned(), "updated_at".to_owned()],
            ..LintConfig::default()
        };
        let found = codes(&config, "CREATE TABLE a (id INT PRIMARY KEY, Created_at TIMESTAMPTZ)");
        assert_eq!(found, vec!["GN002"]);
    }

    #[test]
    fn non_concurrent_index_fires_us001() {
        let config = LintConfig::default();
        let plain = "CREATE INDEX users_name_idx ON public.users (name)";
        let concurrent = "CREATE INDEX CONCURRENTLY users_name_idx ON public.users (name)";
        assert_eq!(codes(&config, plain), vec!["US001"]);
        assert!(codes(&config, concurrent).is_empty());
    }

    #[test]
    fn timestamp_rules_fire_on_plain_timestamp() {
        let found = codes(
            &LintConfig::default(),
            "CREATE TABLE a (id INT PRIMARY KEY, created TIMESTAMP)",
        );
        assert_eq!(found, vec!["TP002", "NM001"]);
    }

    #[test]
    fn date_suffix_rule_fires_on_badly_named_date() {
        let found = codes(
            &LintConfig::default(),
            "CREATE TABLE a (id INT PRIMARY KEY, birthday DATE, start_date DATE)",
        );
        assert_eq!(found, vec!["NM002"]);
    }

    #[test]
    fn disallowed_schema_and_type_are_reported() {
        let config = LintConfig {
            disallowed_schemas: vec!["public".to_owned()],
            disallowed_data_types: vec!["varchar".to_owned()],
            ..LintConfig::default()
        };
        let found = codes(&config, "CREATE TABLE public.a (id INT PRIMARY KEY, name VARCHAR(20))");
        assert_eq!(found, vec!["SC001", "TP001"]);
    }

    #[test]
    fn naming_patterns_apply_to_indexes_and_constraints() {
        let config = LintConfig {
            regex_index: "^idx_".to_owned(),
            regex_constraint_unique_key: "_key$".to_owned(),
            ..LintConfig::default()
        };
        assert_eq!(
            codes(&config, "CREATE INDEX CONCURRENTLY users_name ON users (name)"),
            vec!["NM003"]
        );
        let table =
            "CREATE TABLE a (id INT PRIMARY KEY, email TEXT, CONSTRAINT email_uq UNIQUE (email))";
        assert_eq!(codes(&config, table), vec!["NM006"]);
    }

    #[test]
    fn extensions_outside_allow_list_fire_gn003() {
        let config = LintConfig {
            allowed_extensions: vec!["pgcrypto".to_owned()],
            ..LintConfig::default()
        };
        assert!(codes(&config, "CREATE EXTENSION pgcrypto").is_empty());
        assert_eq!(codes(&config, "CREATE EXTENSION postgis"), vec!["GN003"]);
    }

    #[test]
    fn apply_fix_makes_index_concurrent() {
        let mut statement = parse("CREATE INDEX users_name_idx ON public.users (name)");
        assert!(apply_fix(&mut statement, "US001"));
        assert!(statement.to_string().contains("CONCURRENTLY"));
        assert!(!apply_fix(&mut statement, "US001"), "second application must be a no-op");
    }

    #[test]
    fn apply_fix_adds_time_zone() {
        let mut statement = parse("CREATE TABLE a (id INT PRIMARY KEY, created_at TIMESTAMP)");
        assert!(apply_fix(&mut statement, "TP002"));
        assert!(statement.to_string().contains("TIMESTAMP WITH TIME ZONE"), "got {statement}");
    }

    #[test]
    fn findings_carry_identifier_locations() {
        let config = LintConfig::default();
        let policy = match Policy::new(&config) {
            Ok(p) => p,
            Err(e) => panic!("policy failed: {e}"),
        };
        let findings =
            policy.check(&parse("CREATE TABLE a (\n  id INT PRIMARY KEY,\n  made TIMESTAMPTZ\n)"));
        assert_eq!(findings.len(), 1);
        let at = match findings[0].at {
            Some(at) => at,
            None => panic!("expected a location"),
        };
        assert_eq!((at.line, at.column), (3, 3));
    }
}
