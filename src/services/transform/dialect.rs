// Source dialect handling
//
// Maps the migration's source-dialect names onto sqlparser dialects and
// hosts the dialect-specific rewrite passes that run around the generic
// transpilation step.

use regex::Regex;
use sqlparser::dialect::{
    BigQueryDialect, Dialect, GenericDialect, HiveDialect, MySqlDialect, PostgreSqlDialect,
    RedshiftSqlDialect, SnowflakeDialect,
};
use std::str::FromStr;

use super::transpiler::TransformReport;
use crate::config::TransformConfig;
use crate::models::Query;

/// SQL dialects accepted as migration sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceDialect {
    /// Default for Redash deployments; parsed with the generic grammar.
    Presto,
    MySql,
    Postgres,
    Hive,
    Snowflake,
    BigQuery,
    Redshift,
    Generic,
}

impl SourceDialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceDialect::Presto => "presto",
            SourceDialect::MySql => "mysql",
            SourceDialect::Postgres => "postgres",
            SourceDialect::Hive => "hive",
            SourceDialect::Snowflake => "snowflake",
            SourceDialect::BigQuery => "bigquery",
            SourceDialect::Redshift => "redshift",
            SourceDialect::Generic => "generic",
        }
    }

    /// The sqlparser dialect used to parse queries written in this
    /// source dialect. Presto has no dedicated sqlparser dialect and
    /// falls back to the generic grammar.
    pub fn parser_dialect(&self) -> Box<dyn Dialect> {
        match self {
            SourceDialect::Presto | SourceDialect::Generic => Box::new(GenericDialect {}),
            SourceDialect::MySql => Box::new(MySqlDialect {}),
            SourceDialect::Postgres => Box::new(PostgreSqlDialect {}),
            SourceDialect::Hive => Box::new(HiveDialect {}),
            SourceDialect::Snowflake => Box::new(SnowflakeDialect {}),
            SourceDialect::BigQuery => Box::new(BigQueryDialect {}),
            SourceDialect::Redshift => Box::new(RedshiftSqlDialect {}),
        }
    }
}

impl FromStr for SourceDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "presto" | "trino" => Ok(SourceDialect::Presto),
            "mysql" | "mariadb" => Ok(SourceDialect::MySql),
            "postgresql" | "postgres" | "pg" => Ok(SourceDialect::Postgres),
            "hive" => Ok(SourceDialect::Hive),
            "snowflake" => Ok(SourceDialect::Snowflake),
            "bigquery" => Ok(SourceDialect::BigQuery),
            "redshift" => Ok(SourceDialect::Redshift),
            "generic" => Ok(SourceDialect::Generic),
            _ => Err(format!("Unsupported source dialect: {}", s)),
        }
    }
}

/// Dialect-specific rewrites applied around the generic transpilation.
/// The default passes are no-ops.
pub trait DialectRewrite: Send + Sync {
    /// Textual rewrites applied before transpilation.
    fn pre_transpile(&self, _query: &mut Query, _report: &mut TransformReport) {}

    /// Normalization applied after transpilation and parameter repair.
    fn post_transpile(&self, _query: &mut Query, _report: &mut TransformReport) {}
}

/// Pass-through rewrite for dialects with no special handling.
pub struct NoRewrite;

impl DialectRewrite for NoRewrite {}

/// MySQL pre-transpile pass: rewrites bare `FROM`/`JOIN` table
/// references into fully qualified `catalog.schema.db_table` names,
/// tracking the current database across `USE` statements. Every table
/// rewritten this way is recorded in the report for audit.
pub struct MySqlTableRewrite {
    catalog: String,
    schema: String,
    default_database: String,
    from_pat: Regex,
    join_pat: Regex,
}

impl MySqlTableRewrite {
    pub fn new(config: &TransformConfig) -> Self {
        Self {
            catalog: config.catalog.clone(),
            schema: config.schema.clone(),
            default_database: config.default_database.clone(),
            from_pat: Regex::new(r"(?i)FROM\s+`?(\w+)`?(?:\.`?(\w+)`?)?").expect("valid regex"),
            join_pat: Regex::new(r"(?i)JOIN\s+`?(\w+)`?(?:\.`?(\w+)`?)?").expect("valid regex"),
        }
    }

    fn qualified_name(&self, db: &str, table: &str) -> String {
        format!("{}.{}.{}_{}", self.catalog, self.schema, db, table)
    }

    fn rewrite_line(
        &self,
        line: &str,
        keyword: &str,
        pat: &Regex,
        current_db: &str,
        report: &mut TransformReport,
    ) -> String {
        let caps = match pat.captures(line) {
            Some(caps) => caps,
            None => return line.to_string(),
        };
        let whole = caps.get(0).expect("capture 0 always present");

        // A single captured part is a bare table in the current db; two
        // parts are db.table.
        let (db, table) = match caps.get(2) {
            Some(table) => (caps.get(1).expect("group 1 present").as_str(), table.as_str()),
            None => (current_db, caps.get(1).expect("group 1 present").as_str()),
        };

        let qualified = self.qualified_name(db, table);
        report.record_table(&qualified);

        [
            &line[..whole.start()],
            keyword,
            &qualified,
            &line[whole.end()..],
        ]
        .join(" ")
    }
}

impl DialectRewrite for MySqlTableRewrite {
    fn pre_transpile(&self, query: &mut Query, report: &mut TransformReport) {
        let mut current_db = self.default_database.clone();
        let mut rewritten = Vec::new();

        for line in query.query_string.split('\n') {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.to_lowercase().starts_with("use ") || trimmed.eq_ignore_ascii_case("use") {
                if let Some(db) = trimmed.split_whitespace().nth(1) {
                    current_db = db.trim_end_matches(';').to_string();
                }
                continue;
            }
            if self.from_pat.is_match(line) {
                rewritten.push(self.rewrite_line(line, "FROM", &self.from_pat, &current_db, report));
            } else if self.join_pat.is_match(line) {
                rewritten.push(self.rewrite_line(line, "JOIN", &self.join_pat, &current_db, report));
            } else {
                rewritten.push(line.to_string());
            }
        }

        query.query_string = rewritten.join("\n");
    }
}

/// Rewrite passes for a source dialect.
pub fn rewrite_for(dialect: SourceDialect, config: &TransformConfig) -> Box<dyn DialectRewrite> {
    match dialect {
        SourceDialect::MySql => Box::new(MySqlTableRewrite::new(config)),
        _ => Box::new(NoRewrite),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_config() -> TransformConfig {
        TransformConfig {
            catalog: "lakehouse_production".to_string(),
            schema: "kafka_cdc".to_string(),
            default_database: "hip".to_string(),
        }
    }

    fn query_with_sql(sql: &str) -> Query {
        serde_json::from_value(json!({
            "id": 1,
            "name": "test",
            "query": sql,
            "options": {"parameters": []},
            "tags": []
        }))
        .unwrap()
    }

    #[test]
    fn test_dialect_parsing() {
        assert_eq!(
            "mysql".parse::<SourceDialect>().unwrap(),
            SourceDialect::MySql
        );
        assert_eq!(
            "Postgres".parse::<SourceDialect>().unwrap(),
            SourceDialect::Postgres
        );
        assert!("dbase".parse::<SourceDialect>().is_err());
    }

    #[test]
    fn test_bare_table_uses_default_database() {
        let rewrite = MySqlTableRewrite::new(&test_config());
        let mut query = query_with_sql("SELECT *\nFROM users\nWHERE id = 1");
        let mut report = TransformReport::default();

        rewrite.pre_transpile(&mut query, &mut report);

        assert!(query
            .query_string
            .contains("FROM lakehouse_production.kafka_cdc.hip_users"));
    }

    #[test]
    fn test_qualified_table_keeps_database() {
        let rewrite = MySqlTableRewrite::new(&test_config());
        let mut query = query_with_sql("SELECT * FROM billing.invoices");
        let mut report = TransformReport::default();

        rewrite.pre_transpile(&mut query, &mut report);

        assert!(query
            .query_string
            .contains("FROM lakehouse_production.kafka_cdc.billing_invoices"));
    }

    #[test]
    fn test_use_statement_switches_database() {
        let rewrite = MySqlTableRewrite::new(&test_config());
        let mut query = query_with_sql("USE billing;\nSELECT * FROM invoices");
        let mut report = TransformReport::default();

        rewrite.pre_transpile(&mut query, &mut report);

        // USE line is consumed, the bare table picks up its database
        assert!(!query.query_string.to_lowercase().contains("use "));
        assert!(query
            .query_string
            .contains("FROM lakehouse_production.kafka_cdc.billing_invoices"));
    }

    #[test]
    fn test_join_rewrite_and_audit() {
        let rewrite = MySqlTableRewrite::new(&test_config());
        let mut query =
            query_with_sql("SELECT * FROM orders o\nJOIN `customers` c ON o.cid = c.id");
        let mut report = TransformReport::default();

        rewrite.pre_transpile(&mut query, &mut report);

        assert!(query
            .query_string
            .contains("JOIN lakehouse_production.kafka_cdc.hip_customers"));
        assert!(report
            .identified_tables()
            .contains("lakehouse_production.kafka_cdc.hip_orders"));
        assert!(report
            .identified_tables()
            .contains("lakehouse_production.kafka_cdc.hip_customers"));
    }

    #[test]
    fn test_blank_lines_dropped() {
        let rewrite = MySqlTableRewrite::new(&test_config());
        let mut query = query_with_sql("SELECT 1\n\n\nFROM dual");
        let mut report = TransformReport::default();

        rewrite.pre_transpile(&mut query, &mut report);

        assert_eq!(query.query_string.lines().count(), 2);
    }
}
