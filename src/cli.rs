// Command-line interface
//
// One subcommand per artifact kind. Each driver lists the matching
// source artifacts, transforms their SQL, migrates them one by one and
// keeps going past individual failures; the run summary reports both
// failures and transpile fallbacks at the end.

use clap::{Args, Parser, Subcommand};
use std::sync::Arc;

use crate::config::Config;
use crate::error::MigrationError;
use crate::models::Query;
use crate::services::dbsql::DatabricksClient;
use crate::services::migrate::MigrationEngine;
use crate::services::redash::RedashClient;
use crate::services::transform::{SourceDialect, SqlTransformer};

#[derive(Debug, Parser)]
#[command(
    name = "redash2dbsql",
    version,
    about = "Migrate Redash queries, alerts and dashboards to Databricks SQL"
)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Connection flags; each falls back to its environment variable when
/// omitted.
#[derive(Debug, Args)]
pub struct ConnectionArgs {
    /// Redash base URL
    #[arg(long, global = true)]
    pub redash_url: Option<String>,

    /// Redash API key
    #[arg(long, global = true)]
    pub redash_api_key: Option<String>,

    /// Databricks workspace URL
    #[arg(long, global = true)]
    pub databricks_host: Option<String>,

    /// Databricks access token
    #[arg(long, global = true)]
    pub databricks_token: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Migrate queries into a workspace folder
    Queries(QueriesArgs),
    /// Migrate alerts (each with a dedicated query) into a folder
    Alerts(AlertsArgs),
    /// Migrate dashboards, each into its own subfolder
    Dashboards(DashboardsArgs),
}

#[derive(Debug, Args)]
pub struct TransformArgs {
    /// Source SQL dialect (presto, mysql, postgres, hive, snowflake,
    /// bigquery, redshift, generic)
    #[arg(long)]
    pub source_dialect: Option<SourceDialect>,

    /// Keep the original SQL text instead of transpiling it
    #[arg(long)]
    pub no_transform: bool,

    /// Qualify two-part table references with this catalog after
    /// transpilation
    #[arg(long)]
    pub qualify_catalog: Option<String>,
}

#[derive(Debug, Args)]
pub struct QueriesArgs {
    /// Destination workspace folder path (or a `folders/<id>` reference)
    pub target_folder: String,

    /// Migrate a single query instead of listing by tags
    #[arg(long)]
    pub query_id: Option<i64>,

    /// Only migrate queries carrying all of these tags
    #[arg(long)]
    pub tags: Vec<String>,

    /// Create a subfolder named after each query
    #[arg(long)]
    pub create_folder: bool,

    /// Databricks data source id for the created queries; defaults to
    /// the first listed data source
    #[arg(long)]
    pub data_source_id: Option<String>,

    /// Create a refresh job for scheduled queries on this warehouse
    #[arg(long)]
    pub warehouse_id: Option<String>,

    /// Identity (user email or service principal id) the refresh jobs
    /// run as
    #[arg(long)]
    pub run_as: Option<String>,

    #[command(flatten)]
    pub transform: TransformArgs,
}

#[derive(Debug, Args)]
pub struct AlertsArgs {
    /// Destination workspace folder path
    pub target_folder: String,

    /// Migrate a single alert instead of listing by tags
    #[arg(long)]
    pub alert_id: Option<i64>,

    /// Only migrate alerts whose query carries all of these tags
    #[arg(long)]
    pub tags: Vec<String>,

    /// Notification destination for alert trigger jobs
    #[arg(long)]
    pub destination_id: Option<String>,

    /// Warehouse for alert trigger jobs; a job is only created when
    /// both this and the destination are given
    #[arg(long)]
    pub warehouse_id: Option<String>,

    /// Identity the trigger jobs run as
    #[arg(long)]
    pub run_as: Option<String>,

    /// Databricks data source id for the alert queries
    #[arg(long)]
    pub data_source_id: Option<String>,

    #[command(flatten)]
    pub transform: TransformArgs,
}

#[derive(Debug, Args)]
pub struct DashboardsArgs {
    /// Parent workspace folder; each dashboard gets a subfolder
    pub target_folder: String,

    /// Migrate a single dashboard instead of listing by tags
    #[arg(long)]
    pub dashboard_id: Option<i64>,

    /// Only migrate dashboards carrying all of these tags
    #[arg(long)]
    pub tags: Vec<String>,

    /// Databricks data source id for the widget queries
    #[arg(long)]
    pub data_source_id: Option<String>,

    #[command(flatten)]
    pub transform: TransformArgs,
}

/// Per-artifact result collected by the batch drivers.
struct RunSummary {
    migrated: usize,
    failed: Vec<(String, MigrationError)>,
    fallbacks: Vec<(String, String)>,
}

impl RunSummary {
    fn new() -> Self {
        Self {
            migrated: 0,
            failed: Vec::new(),
            fallbacks: Vec::new(),
        }
    }

    /// Log the summary and return the number of failed artifacts.
    fn report(self, kind: &str) -> usize {
        for (name, reason) in &self.fallbacks {
            tracing::warn!(query = %name, reason = %reason, "SQL kept as-is, transpilation failed");
        }
        for (name, error) in &self.failed {
            tracing::error!(artifact = %name, error = %error, "Migration failed");
        }
        tracing::info!(
            kind,
            migrated = self.migrated,
            failed = self.failed.len(),
            "Migration run finished"
        );
        self.failed.len()
    }
}

/// Execute the parsed command. Returns the number of artifacts that
/// failed to migrate; individual failures do not abort the batch.
pub async fn run(cli: Cli, config: Config) -> Result<usize, MigrationError> {
    let settings = config.connection(
        cli.connection.redash_url,
        cli.connection.redash_api_key,
        cli.connection.databricks_host,
        cli.connection.databricks_token,
    )?;

    let redash = RedashClient::new(&settings.redash_url, &settings.redash_api_key);
    let databricks = Arc::new(DatabricksClient::new(
        &settings.databricks_host,
        &settings.databricks_token,
    ));

    match cli.command {
        Command::Queries(args) => {
            let engine = engine_for(&databricks, args.data_source_id.clone()).await?;
            let transformer = transformer_for(&config, &args.transform);
            migrate_queries(&redash, &engine, &transformer, args).await
        }
        Command::Alerts(args) => {
            let engine = engine_for(&databricks, args.data_source_id.clone()).await?;
            let transformer = transformer_for(&config, &args.transform);
            migrate_alerts(&redash, &engine, &transformer, args).await
        }
        Command::Dashboards(args) => {
            let engine = engine_for(&databricks, args.data_source_id.clone()).await?;
            let transformer = transformer_for(&config, &args.transform);
            migrate_dashboards(&redash, &engine, &transformer, args).await
        }
    }
}

async fn engine_for(
    databricks: &Arc<DatabricksClient>,
    data_source_id: Option<String>,
) -> Result<MigrationEngine, MigrationError> {
    let data_source_id = match data_source_id {
        Some(id) => id,
        None => databricks.default_data_source_id().await?,
    };
    Ok(MigrationEngine::new(databricks.clone(), data_source_id))
}

fn transformer_for(config: &Config, args: &TransformArgs) -> Option<SqlTransformer> {
    if args.no_transform {
        return None;
    }
    Some(
        SqlTransformer::new(config.transform.clone())
            .with_qualify_catalog(args.qualify_catalog.clone()),
    )
}

/// Run the transformer over a query tree, feeding transpile fallbacks
/// into the summary.
fn transform_query(
    transformer: &Option<SqlTransformer>,
    query: &mut Query,
    dialect: Option<SourceDialect>,
    summary: &mut RunSummary,
) {
    if let Some(transformer) = transformer {
        let report = transformer.transform(query, dialect);
        for table in report.identified_tables() {
            tracing::debug!(table = %table, "Rewrote source table reference");
        }
        for (name, reason) in report.fallbacks() {
            summary
                .fallbacks
                .push((name.to_string(), reason.to_string()));
        }
    }
}

async fn migrate_queries(
    redash: &RedashClient,
    engine: &MigrationEngine,
    transformer: &Option<SqlTransformer>,
    args: QueriesArgs,
) -> Result<usize, MigrationError> {
    let queries = redash.list_queries(&args.tags, args.query_id).await?;
    tracing::info!(count = queries.len(), "Migrating queries");

    let mut summary = RunSummary::new();
    for mut query in queries {
        transform_query(transformer, &mut query, args.transform.source_dialect, &mut summary);

        let created = match engine
            .migrate_query_ex(&query, &args.target_folder, args.create_folder)
            .await
        {
            Ok(created) => created,
            Err(e) => {
                summary.failed.push((query.name.clone(), e));
                continue;
            }
        };
        summary.migrated += 1;

        if let (Some(schedule), Some(warehouse_id)) = (&query.schedule, &args.warehouse_id) {
            if let Err(e) = engine
                .create_query_schedule(
                    &created.query_id,
                    schedule,
                    warehouse_id,
                    args.run_as.as_deref(),
                )
                .await
            {
                tracing::warn!(query = %query.name, error = %e, "Schedule job not created");
            }
        }
    }

    Ok(summary.report("queries"))
}

async fn migrate_alerts(
    redash: &RedashClient,
    engine: &MigrationEngine,
    transformer: &Option<SqlTransformer>,
    args: AlertsArgs,
) -> Result<usize, MigrationError> {
    let alerts = redash.list_alerts(&args.tags, args.alert_id).await?;
    tracing::info!(count = alerts.len(), "Migrating alerts");

    let mut summary = RunSummary::new();
    for mut alert in alerts {
        transform_query(
            transformer,
            &mut alert.query,
            args.transform.source_dialect,
            &mut summary,
        );

        match engine
            .migrate_alert(
                &alert,
                &args.target_folder,
                args.destination_id.as_deref(),
                args.warehouse_id.as_deref(),
                args.run_as.as_deref(),
            )
            .await
        {
            Ok(_) => summary.migrated += 1,
            Err(e) => summary.failed.push((alert.name.clone(), e)),
        }
    }

    Ok(summary.report("alerts"))
}

async fn migrate_dashboards(
    redash: &RedashClient,
    engine: &MigrationEngine,
    transformer: &Option<SqlTransformer>,
    args: DashboardsArgs,
) -> Result<usize, MigrationError> {
    let dashboards = match args.dashboard_id {
        Some(id) => vec![redash.get_dashboard(id).await?],
        None => redash.list_dashboards(&args.tags).await?,
    };
    tracing::info!(count = dashboards.len(), "Migrating dashboards");

    let mut summary = RunSummary::new();
    for mut dashboard in dashboards {
        for widget in &mut dashboard.widgets {
            if let Some(query) = &mut widget.query {
                transform_query(transformer, query, args.transform.source_dialect, &mut summary);
            }
        }

        match engine
            .migrate_dashboard(&dashboard, &args.target_folder)
            .await
        {
            Ok(_) => summary.migrated += 1,
            Err(e) => summary.failed.push((dashboard.name.clone(), e)),
        }
    }

    Ok(summary.report("dashboards"))
}
