// SQL Dialect Transformer
//
// Converts a query's SQL text from its source dialect to the
// Databricks dialect and repairs the artifacts the generic transpile
// step leaves behind (parameter placeholders, catalog qualification).
// Transpile failures are best-effort: the original SQL is kept and the
// failure is surfaced in the report rather than aborting the migration.

use regex::Regex;
use sqlparser::ast::{Ident, ObjectName, ObjectNamePart, Statement};
use sqlparser::dialect::{DatabricksDialect, Dialect};
use sqlparser::parser::Parser;
use std::collections::BTreeSet;
use std::ops::ControlFlow;

use super::dialect::{rewrite_for, SourceDialect};
use crate::config::TransformConfig;
use crate::models::Query;

/// Result of transpiling one query.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformOutcome {
    /// The SQL text was replaced with the transpiled form.
    Transpiled,
    /// Transpilation failed; the original SQL was kept untouched.
    Fallback { reason: String },
}

/// Accumulated results for one transformation run (the root query and
/// its dependency subtree).
#[derive(Debug, Default)]
pub struct TransformReport {
    outcomes: Vec<(String, TransformOutcome)>,
    identified_tables: BTreeSet<String>,
}

impl TransformReport {
    pub fn record_outcome(&mut self, query_name: &str, outcome: TransformOutcome) {
        self.outcomes.push((query_name.to_string(), outcome));
    }

    pub fn record_table(&mut self, table: &str) {
        self.identified_tables.insert(table.to_string());
    }

    /// Queries whose SQL was left untouched because transpilation
    /// failed, with the failure reason.
    pub fn fallbacks(&self) -> Vec<(&str, &str)> {
        self.outcomes
            .iter()
            .filter_map(|(name, outcome)| match outcome {
                TransformOutcome::Fallback { reason } => Some((name.as_str(), reason.as_str())),
                TransformOutcome::Transpiled => None,
            })
            .collect()
    }

    /// Tables rewritten by the pre-transpile pass, for audit.
    pub fn identified_tables(&self) -> &BTreeSet<String> {
        &self.identified_tables
    }

    pub fn outcomes(&self) -> &[(String, TransformOutcome)] {
        &self.outcomes
    }
}

/// Transforms query SQL from a source dialect to the Databricks
/// dialect, recursing through dropdown-parameter dependencies first so
/// dependent SQL is already normalized when the parent is processed.
pub struct SqlTransformer {
    config: TransformConfig,
    qualify_catalog: Option<String>,
    placeholder_pat: Regex,
}

impl SqlTransformer {
    pub fn new(config: TransformConfig) -> Self {
        Self {
            config,
            qualify_catalog: None,
            placeholder_pat: Regex::new(r"\{\{\s*(\w+)\s*\}\}").expect("valid regex"),
        }
    }

    /// Additionally qualify two-part table references with the given
    /// catalog after transpilation.
    pub fn with_qualify_catalog(mut self, catalog: Option<String>) -> Self {
        self.qualify_catalog = catalog;
        self
    }

    /// Transform `query` (and its dependencies, first) in place.
    /// Always leaves a syntactically complete SQL string behind; on
    /// transpile failure the original text is kept and the failure is
    /// recorded in the report.
    pub fn transform(&self, query: &mut Query, source_dialect: Option<SourceDialect>) -> TransformReport {
        let mut report = TransformReport::default();
        let dialect = source_dialect.unwrap_or(SourceDialect::Presto);
        self.transform_into(query, dialect, &mut report);
        report
    }

    fn transform_into(&self, query: &mut Query, dialect: SourceDialect, report: &mut TransformReport) {
        for dep in &mut query.depends_on {
            self.transform_into(dep, dialect, report);
        }

        let rewrite = rewrite_for(dialect, &self.config);
        rewrite.pre_transpile(query, report);

        let outcome = self.transpile(query, dialect, report);
        report.record_outcome(&query.name, outcome);

        let params: Vec<String> = query.params().iter().map(|p| p.to_string()).collect();
        query.query_string = fix_query_params(&query.query_string, &params);

        rewrite.post_transpile(query, report);
    }

    /// Generic transpile step: parse under the source dialect, re-emit
    /// under the Databricks dialect. `{{name}}` placeholders cannot be
    /// parsed, so they are shielded as `STRUCT(STRUCT(name))` first;
    /// the parameter repair step restores them afterwards.
    fn transpile(&self, query: &mut Query, dialect: SourceDialect, report: &mut TransformReport) -> TransformOutcome {
        let shielded = self
            .placeholder_pat
            .replace_all(query.query_string.trim(), "STRUCT(STRUCT($1))")
            .into_owned();

        let parsed = Parser::parse_sql(dialect.parser_dialect().as_ref(), &shielded);
        let statements = match parsed {
            Ok(statements) if !statements.is_empty() => statements,
            Ok(_) => {
                tracing::warn!(query = %query.name, "Empty SQL statement, keeping original text");
                return TransformOutcome::Fallback {
                    reason: "empty SQL statement".to_string(),
                };
            }
            Err(e) => {
                tracing::warn!(query = %query.name, error = %e, "Error transpiling query");
                return TransformOutcome::Fallback {
                    reason: e.to_string(),
                };
            }
        };

        let mut emitted = emit(&statements);

        if let Some(catalog) = &self.qualify_catalog {
            match qualify_tables_with_catalog(&emitted, &DatabricksDialect {}, catalog) {
                Ok(qualified) => {
                    emitted = qualified;
                }
                Err(e) => {
                    // Qualification is optional; keep the transpiled text
                    tracing::warn!(query = %query.name, error = %e, "Catalog qualification skipped");
                    report.record_outcome(
                        &query.name,
                        TransformOutcome::Fallback {
                            reason: format!("catalog qualification skipped: {}", e),
                        },
                    );
                }
            }
        }

        query.query_string = emitted;
        TransformOutcome::Transpiled
    }
}

fn emit(statements: &[Statement]) -> String {
    statements
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(";\n")
}

/// Post-transpile parameter repair. The transpile step corrupts
/// `{{name}}` placeholders into `STRUCT(STRUCT(name))`; this replaces
/// them back, as a pure string substitution over the declared parameter
/// names. Must run after transpilation.
pub fn fix_query_params(query: &str, params: &[String]) -> String {
    let mut result = query.to_string();
    for param in params {
        result = result.replace(
            &format!("STRUCT(STRUCT({}))", param),
            &format!("{{{{{}}}}}", param),
        );
    }
    result
}

/// Parse-tree rewrite adding a catalog qualifier to every two-part
/// table reference (`db.table` -> `catalog.db.table`), preserving
/// aliases. Returns the re-emitted SQL.
pub fn qualify_tables_with_catalog(
    sql: &str,
    dialect: &dyn Dialect,
    catalog: &str,
) -> Result<String, sqlparser::parser::ParserError> {
    let mut statements = Parser::parse_sql(dialect, sql)?;

    let _ = sqlparser::ast::visit_relations_mut(&mut statements, |name: &mut ObjectName| {
        if name.0.len() == 2 {
            name.0
                .insert(0, ObjectNamePart::Identifier(Ident::new(catalog)));
        }
        ControlFlow::<()>::Continue(())
    });

    Ok(emit(&statements))
}
