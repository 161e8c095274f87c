// Migration Orchestrator
//
// Top-level driver per artifact kind. Each procedure follows the same
// shape: resolve dependencies, create target objects through the write
// collaborator, wire cross-references (visualization ids into widgets,
// query ids into alerts and schedules, folder ids into parents). The
// caller is responsible for running the SQL transformer beforehand.

use chrono::Utc;
use futures::future::BoxFuture;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use super::cache::{CachedQuery, IdentityCache};
use super::dbsql::TargetWorkspace;
use super::schedule::cron_schedule;
use crate::error::MigrationError;
use crate::models::{
    Alert, Dashboard, JobRequest, JobRunAs, JobTask, Query, Schedule, SqlTask, SqlTaskAlert,
    SqlTaskQuery, SqlTaskSubscription, Widget,
};

/// Orchestrates migration of queries, alerts and dashboards against a
/// target workspace. Holds the run-scoped identity cache; one engine
/// instance corresponds to one migration run.
pub struct MigrationEngine {
    target: Arc<dyn TargetWorkspace>,
    cache: IdentityCache,
    /// Data source (SQL warehouse) id that created queries run against.
    data_source_id: String,
}

impl MigrationEngine {
    pub fn new(target: Arc<dyn TargetWorkspace>, data_source_id: String) -> Self {
        Self {
            target,
            cache: IdentityCache::new(),
            data_source_id,
        }
    }

    /// Migrate a query into `parent` (a `folders/<id>` reference).
    ///
    /// Dependencies are created first, in post-order, so every
    /// referenced query exists before its dependent. The identity cache
    /// makes this idempotent within the run: a query already migrated
    /// is reused, not recreated.
    pub fn migrate_query<'a>(
        &'a self,
        query: &'a Query,
        parent: &'a str,
    ) -> BoxFuture<'a, Result<CachedQuery, MigrationError>> {
        Box::pin(async move {
            for dep in &query.depends_on {
                self.migrate_query(dep, parent).await?;
            }

            if let Some(cached) = self.cache.read(query.id) {
                tracing::debug!(query_id = query.id, "Cache hit, reusing migrated query");
                return Ok(cached);
            }

            let created = self.create_query_object(query, parent).await?;
            self.cache.write(query.id, created.clone());
            Ok(created)
        })
    }

    /// Migrate a query into a workspace path. Paths already in
    /// `folders/<id>` form are used as-is; otherwise the path is
    /// validated (optionally after creating a dedicated slug-named
    /// subfolder) and resolved to a folder reference.
    pub async fn migrate_query_ex(
        &self,
        query: &Query,
        target_folder: &str,
        create_folder: bool,
    ) -> Result<CachedQuery, MigrationError> {
        let parent = if target_folder.starts_with("folders/") {
            target_folder.to_string()
        } else {
            let path = if create_folder {
                let path = format!("{}/{}", target_folder, slug(&query.name));
                self.target.create_folder(&path).await?;
                path
            } else {
                target_folder.to_string()
            };
            format!("folders/{}", self.target.resolve_folder_id(&path).await?)
        };

        self.migrate_query(query, &parent).await
    }

    /// Create the target query and its visualizations, without
    /// consulting or updating the cache. Used for the normal cache-miss
    /// path and for alerts, which always get a dedicated query.
    async fn create_query_object(
        &self,
        query: &Query,
        parent: &str,
    ) -> Result<CachedQuery, MigrationError> {
        let description = format!(
            "Migrated from Redash on {}, tags: {}",
            Utc::now().format("%Y-%m-%d %H:%M:%S"),
            query.tags.join(",")
        );

        let query_id = self
            .target
            .create_query(
                &query.name,
                &query.query_string,
                &self.data_source_id,
                parent,
                build_query_options(query),
                &description,
            )
            .await?;
        tracing::info!(source_id = query.id, target_id = %query_id, "Created query");

        let mut viz_ids = HashMap::new();
        for viz in &query.visualizations {
            let viz_id = self
                .target
                .create_visualization(
                    &query_id,
                    viz.visualization_type.as_str(),
                    &viz.options,
                    viz.description.as_deref(),
                    Some(&viz.name),
                )
                .await?;
            viz_ids.insert(viz.id, viz_id);
        }

        Ok(CachedQuery { query_id, viz_ids })
    }

    /// Create a recurring job that refreshes a migrated query.
    pub async fn create_query_schedule(
        &self,
        query_id: &str,
        schedule: &Schedule,
        warehouse_id: &str,
        run_as: Option<&str>,
    ) -> Result<i64, MigrationError> {
        let request = JobRequest {
            name: format!("Query `{}` schedule", query_id),
            description: format!(
                "Schedule for query `{}` with warehouse `{}`",
                query_id, warehouse_id
            ),
            schedule: cron_schedule(schedule)?,
            run_as: run_as.map(JobRunAs::from_identity),
            tags: None,
            tasks: vec![JobTask {
                task_key: "sql".to_string(),
                sql_task: SqlTask {
                    query: Some(SqlTaskQuery {
                        query_id: query_id.to_string(),
                    }),
                    alert: None,
                    warehouse_id: warehouse_id.to_string(),
                },
            }],
        };
        self.target.create_job(&request).await
    }

    /// Migrate an alert: a dedicated query (alerts cannot share a query
    /// object, so the cache is bypassed for it), the alert itself, and
    /// — when both a destination and a warehouse are supplied — a
    /// recurring job that triggers it.
    pub async fn migrate_alert(
        &self,
        alert: &Alert,
        target_folder: &str,
        destination_id: Option<&str>,
        warehouse_id: Option<&str>,
        run_as: Option<&str>,
    ) -> Result<String, MigrationError> {
        let folder_id = self.target.resolve_folder_id(target_folder).await?;
        let parent = format!("folders/{}", folder_id);

        // Dependencies still go through the cached path; only the
        // alert's own query is always recreated.
        for dep in &alert.query.depends_on {
            self.migrate_query(dep, &parent).await?;
        }
        let created = self.create_query_object(&alert.query, &parent).await?;

        let alert_id = self
            .target
            .create_alert(
                &alert.name,
                sanitize_alert_options(&alert.options),
                &created.query_id,
                &parent,
                alert.rearm,
            )
            .await?;
        tracing::info!(source_id = alert.id, target_id = %alert_id, "Created alert");

        if let (Some(schedule), Some(destination_id), Some(warehouse_id)) =
            (&alert.schedule, destination_id, warehouse_id)
        {
            self.create_alert_schedule(alert, schedule, &alert_id, destination_id, warehouse_id, run_as, None)
                .await?;
        }

        Ok(alert_id)
    }

    #[allow(clippy::too_many_arguments)]
    async fn create_alert_schedule(
        &self,
        alert: &Alert,
        schedule: &Schedule,
        alert_id: &str,
        destination_id: &str,
        warehouse_id: &str,
        run_as: Option<&str>,
        tags: Option<&HashMap<String, String>>,
    ) -> Result<i64, MigrationError> {
        let mut job_tags = HashMap::new();
        if let Some(tags) = tags {
            job_tags.extend(tags.clone());
        }
        // Query tags are plain labels; carried as bare keys
        for tag in &alert.query.tags {
            job_tags.insert(tag.clone(), String::new());
        }
        job_tags.insert("type".to_string(), "alert".to_string());
        job_tags.insert("alert_id".to_string(), alert_id.to_string());
        job_tags.insert("destination_id".to_string(), destination_id.to_string());
        job_tags.insert("warehouse_id".to_string(), warehouse_id.to_string());
        job_tags.insert("migrated_from_redash".to_string(), "true".to_string());

        let request = JobRequest {
            name: format!("Alert `{}` schedule", alert.name),
            description: format!(
                "Schedule for alert `{}` ({}) with destination `{}`",
                alert.name, alert_id, destination_id
            ),
            schedule: cron_schedule(schedule)?,
            run_as: run_as.map(JobRunAs::from_identity),
            tags: Some(job_tags),
            tasks: vec![JobTask {
                task_key: "alert".to_string(),
                sql_task: SqlTask {
                    query: None,
                    alert: Some(SqlTaskAlert {
                        alert_id: alert_id.to_string(),
                        subscriptions: vec![SqlTaskSubscription {
                            destination_id: destination_id.to_string(),
                        }],
                    }),
                    warehouse_id: warehouse_id.to_string(),
                },
            }],
        };
        self.target.create_job(&request).await
    }

    /// Migrate a dashboard: a dedicated folder pair (dashboard folder
    /// plus a `queries` subfolder), the distinct set of widget queries,
    /// the dashboard object, and one widget per source widget.
    pub async fn migrate_dashboard(
        &self,
        dashboard: &Dashboard,
        target_folder: &str,
    ) -> Result<String, MigrationError> {
        let dashboard_folder = format!("{}/{}", target_folder, dashboard.name_slug());
        let dashboard_folder_id = self.target.create_folder(&dashboard_folder).await?;
        let queries_folder = format!("{}/queries", dashboard_folder);
        let queries_folder_id = self.target.create_folder(&queries_folder).await?;

        let mut tags = vec![
            "migrated_from_redash".to_string(),
            format!("original_id:{}", dashboard.id),
        ];
        tags.extend(dashboard.tags.iter().cloned());

        let dashboard_id = self
            .target
            .create_dashboard(
                &dashboard.name,
                &format!("folders/{}", dashboard_folder_id),
                &tags,
                dashboard.dashboard_filters_enabled,
            )
            .await?;
        tracing::info!(source_id = dashboard.id, target_id = %dashboard_id, "Created dashboard");

        // Distinct queries referenced by the widgets, deduplicated by
        // source id (the cache would catch duplicates anyway).
        let queries_parent = format!("folders/{}", queries_folder_id);
        let mut query_ids: HashMap<i64, CachedQuery> = HashMap::new();
        for widget in &dashboard.widgets {
            if let Some(query) = &widget.query {
                if !query_ids.contains_key(&query.id) {
                    let created = self.migrate_query(query, &queries_parent).await?;
                    query_ids.insert(query.id, created);
                }
            }
        }

        for widget in &dashboard.widgets {
            self.migrate_widget(widget, &dashboard_id, &query_ids).await?;
        }

        Ok(dashboard_id)
    }

    async fn migrate_widget(
        &self,
        widget: &Widget,
        dashboard_id: &str,
        query_ids: &HashMap<i64, CachedQuery>,
    ) -> Result<String, MigrationError> {
        let query = match &widget.query {
            None => {
                // Text-only widget: position/visibility options only
                return self
                    .target
                    .create_widget(
                        dashboard_id,
                        None,
                        text_widget_options(&widget.options),
                        widget.text.as_deref(),
                        widget.width,
                        None,
                    )
                    .await;
            }
            Some(query) => query,
        };

        let visualization = widget.visualization.as_ref().ok_or_else(|| {
            MigrationError::UnexpectedResponse(format!(
                "widget {} has a query but no visualization",
                widget.id
            ))
        })?;

        let created = query_ids.get(&query.id).ok_or_else(|| {
            MigrationError::UnexpectedResponse(format!(
                "no migrated query for widget {}",
                widget.id
            ))
        })?;
        let viz_id = created.viz_ids.get(&visualization.id).ok_or_else(|| {
            MigrationError::UnexpectedResponse(format!(
                "no migrated visualization {} for query {}",
                visualization.id, query.id
            ))
        })?;

        self.target
            .create_widget(
                dashboard_id,
                Some(viz_id),
                widget.options.clone(),
                widget.text.as_deref(),
                widget.width,
                Some(&visualization.name),
            )
            .await
    }
}

/// Databricks query options payload: the declared parameters with
/// untyped ones defaulted to text.
pub fn build_query_options(query: &Query) -> Value {
    let parameters: Vec<Value> = query
        .options
        .parameters
        .iter()
        .map(|p| {
            let normalized = p.normalized();
            let mut param = Map::new();
            param.insert("name".to_string(), Value::String(normalized.name.clone()));
            if let Some(title) = &normalized.title {
                param.insert("title".to_string(), Value::String(title.clone()));
            }
            if let Some(param_type) = &normalized.param_type {
                param.insert("type".to_string(), Value::String(param_type.clone()));
            }
            if let Some(value) = &normalized.value {
                param.insert("value".to_string(), value.clone());
            }
            Value::Object(param)
        })
        .collect();

    json!({ "parameters": parameters })
}

/// Map Redash condition options onto Databricks alert options: domain
/// operator names become comparison operators, and a literal zero
/// threshold becomes the string "0" so it is not read as absent.
pub fn sanitize_alert_options(options: &Value) -> Value {
    let source = match options.as_object() {
        Some(obj) => obj,
        None => return options.clone(),
    };

    let mut sanitized = Map::new();
    for (key, value) in source {
        match key.as_str() {
            "op" => {
                let op = match value.as_str() {
                    Some("greater than") => Value::String(">".to_string()),
                    Some("less than") => Value::String("<".to_string()),
                    _ => value.clone(),
                };
                sanitized.insert("op".to_string(), op);
            }
            "value" => {
                let is_zero = value.as_i64() == Some(0)
                    || value.as_f64() == Some(0.0)
                    || value == &Value::Bool(false);
                if is_zero {
                    sanitized.insert("value".to_string(), Value::String("0".to_string()));
                } else {
                    sanitized.insert("value".to_string(), value.clone());
                }
            }
            _ => {
                sanitized.insert(key.clone(), value.clone());
            }
        }
    }
    Value::Object(sanitized)
}

/// Text widgets only carry visibility, position and parameter mappings.
fn text_widget_options(options: &Value) -> Value {
    let mut filtered = Map::new();
    if let Some(obj) = options.as_object() {
        for key in ["isHidden", "position", "parameterMappings"] {
            if let Some(value) = obj.get(key) {
                filtered.insert(key.to_string(), value.clone());
            }
        }
    }
    Value::Object(filtered)
}

fn slug(name: &str) -> String {
    name.replace(' ', "_").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Visualization;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Recording mock for the target workspace. Creation calls append
    /// to `calls` and hand out sequential ids.
    #[derive(Default)]
    struct MockWorkspace {
        calls: Mutex<Vec<String>>,
        jobs: Mutex<Vec<JobRequest>>,
        counter: Mutex<u64>,
    }

    impl MockWorkspace {
        fn next_id(&self) -> u64 {
            let mut counter = self.counter.lock().unwrap();
            *counter += 1;
            *counter
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn calls_with_prefix(&self, prefix: &str) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter(|c| c.starts_with(prefix))
                .collect()
        }
    }

    #[async_trait]
    impl TargetWorkspace for MockWorkspace {
        async fn create_query(
            &self,
            name: &str,
            _sql: &str,
            _data_source_id: &str,
            parent: &str,
            _options: Value,
            _description: &str,
        ) -> Result<String, MigrationError> {
            self.record(format!("query:{}:{}", name, parent));
            Ok(format!("q-{}", self.next_id()))
        }

        async fn create_visualization(
            &self,
            query_id: &str,
            visualization_type: &str,
            _options: &Value,
            _description: Option<&str>,
            _name: Option<&str>,
        ) -> Result<String, MigrationError> {
            self.record(format!("viz:{}:{}", query_id, visualization_type));
            Ok(format!("v-{}", self.next_id()))
        }

        async fn create_widget(
            &self,
            dashboard_id: &str,
            visualization_id: Option<&str>,
            options: Value,
            _text: Option<&str>,
            _width: u64,
            title: Option<&str>,
        ) -> Result<String, MigrationError> {
            self.record(format!(
                "widget:{}:{}:{}:{}",
                dashboard_id,
                visualization_id.unwrap_or("-"),
                title.unwrap_or("-"),
                options
            ));
            Ok(format!("w-{}", self.next_id()))
        }

        async fn create_alert(
            &self,
            name: &str,
            options: Value,
            query_id: &str,
            _parent: &str,
            _rearm: Option<i64>,
        ) -> Result<String, MigrationError> {
            self.record(format!("alert:{}:{}:{}", name, query_id, options));
            Ok(format!("a-{}", self.next_id()))
        }

        async fn create_dashboard(
            &self,
            name: &str,
            parent: &str,
            tags: &[String],
            _filters_enabled: bool,
        ) -> Result<String, MigrationError> {
            self.record(format!("dashboard:{}:{}:{}", name, parent, tags.join(",")));
            Ok(format!("d-{}", self.next_id()))
        }

        async fn create_job(&self, request: &JobRequest) -> Result<i64, MigrationError> {
            self.record(format!("job:{}", request.name));
            self.jobs.lock().unwrap().push(request.clone());
            Ok(self.next_id() as i64)
        }

        async fn resolve_folder_id(&self, path: &str) -> Result<i64, MigrationError> {
            self.record(format!("resolve:{}", path));
            Ok(1000)
        }

        async fn create_folder(&self, path: &str) -> Result<i64, MigrationError> {
            self.record(format!("mkdir:{}", path));
            Ok(2000 + self.next_id() as i64)
        }
    }

    fn query(id: i64, name: &str) -> Query {
        serde_json::from_value(json!({
            "id": id,
            "name": name,
            "query": "select 1",
            "options": {"parameters": []},
            "tags": []
        }))
        .unwrap()
    }

    fn query_with_viz(id: i64, name: &str, viz_id: i64) -> Query {
        let mut q = query(id, name);
        q.visualizations = vec![Visualization {
            id: viz_id,
            visualization_type: crate::models::VisualizationType::Chart,
            name: format!("{} chart", name),
            description: None,
            options: json!({}),
        }];
        q
    }

    fn engine(target: Arc<MockWorkspace>) -> MigrationEngine {
        MigrationEngine::new(target, "warehouse-1".to_string())
    }

    #[tokio::test]
    async fn test_idempotent_reuse() {
        let target = Arc::new(MockWorkspace::default());
        let engine = engine(target.clone());
        let q = query(42, "metrics");

        let first = engine.migrate_query(&q, "folders/1").await.unwrap();
        let second = engine.migrate_query(&q, "folders/1").await.unwrap();

        assert_eq!(first.query_id, second.query_id);
        assert_eq!(target.calls_with_prefix("query:").len(), 1);
    }

    #[tokio::test]
    async fn test_dependency_ordering_two_levels() {
        let target = Arc::new(MockWorkspace::default());
        let engine = engine(target.clone());

        let mut mid = query(2, "mid");
        mid.depends_on = vec![query(3, "leaf")];
        let mut root = query(1, "root");
        root.depends_on = vec![mid];

        engine.migrate_query(&root, "folders/1").await.unwrap();

        let creations = target.calls_with_prefix("query:");
        assert_eq!(creations.len(), 3);
        assert!(creations[0].starts_with("query:leaf"));
        assert!(creations[1].starts_with("query:mid"));
        assert!(creations[2].starts_with("query:root"));
    }

    #[tokio::test]
    async fn test_shared_dependency_created_once() {
        let target = Arc::new(MockWorkspace::default());
        let engine = engine(target.clone());

        let shared = query(9, "shared lookup");
        let mut root = query(1, "root");
        root.depends_on = vec![shared.clone(), shared];

        engine.migrate_query(&root, "folders/1").await.unwrap();

        let creations = target.calls_with_prefix("query:");
        assert_eq!(creations.len(), 2);
    }

    #[tokio::test]
    async fn test_visualization_id_map() {
        let target = Arc::new(MockWorkspace::default());
        let engine = engine(target.clone());
        let q = query_with_viz(5, "sales", 77);

        let created = engine.migrate_query(&q, "folders/1").await.unwrap();

        assert_eq!(created.viz_ids.len(), 1);
        assert!(created.viz_ids.contains_key(&77));
        assert_eq!(target.calls_with_prefix("viz:").len(), 1);
    }

    #[tokio::test]
    async fn test_migrate_query_ex_creates_slug_folder() {
        let target = Arc::new(MockWorkspace::default());
        let engine = engine(target.clone());
        let q = query(4, "Weekly Report");

        engine
            .migrate_query_ex(&q, "/Users/me/reports", true)
            .await
            .unwrap();

        let calls = target.calls();
        assert!(calls.contains(&"mkdir:/Users/me/reports/weekly_report".to_string()));
        assert!(calls.contains(&"resolve:/Users/me/reports/weekly_report".to_string()));
        assert!(calls
            .iter()
            .any(|c| c.starts_with("query:Weekly Report:folders/1000")));
    }

    #[tokio::test]
    async fn test_migrate_query_ex_folders_reference_passthrough() {
        let target = Arc::new(MockWorkspace::default());
        let engine = engine(target.clone());
        let q = query(4, "report");

        engine.migrate_query_ex(&q, "folders/55", false).await.unwrap();

        assert!(target.calls_with_prefix("resolve:").is_empty());
        assert!(target.calls()[0].starts_with("query:report:folders/55"));
    }

    fn alert_with_query(alert_id: i64, q: Query) -> Alert {
        Alert {
            id: alert_id,
            name: format!("alert {}", alert_id),
            schedule: q.schedule.clone(),
            query: q,
            options: json!({"op": "greater than", "value": 0, "column": "c"}),
            rearm: Some(300),
        }
    }

    #[tokio::test]
    async fn test_alert_query_bypasses_cache() {
        let target = Arc::new(MockWorkspace::default());
        let engine = engine(target.clone());

        let q = query(42, "watched");
        let first = alert_with_query(1, q.clone());
        let second = alert_with_query(2, q);

        engine
            .migrate_alert(&first, "/alerts", None, None, None)
            .await
            .unwrap();
        engine
            .migrate_alert(&second, "/alerts", None, None, None)
            .await
            .unwrap();

        // Same source query, but each alert gets a dedicated copy
        assert_eq!(target.calls_with_prefix("query:").len(), 2);
    }

    #[tokio::test]
    async fn test_alert_options_sanitized() {
        let target = Arc::new(MockWorkspace::default());
        let engine = engine(target.clone());
        let alert = alert_with_query(1, query(42, "watched"));

        engine
            .migrate_alert(&alert, "/alerts", None, None, None)
            .await
            .unwrap();

        let alert_calls = target.calls_with_prefix("alert:");
        assert_eq!(alert_calls.len(), 1);
        assert!(alert_calls[0].contains(r#""op":">""#));
        assert!(alert_calls[0].contains(r#""value":"0""#));
    }

    #[tokio::test]
    async fn test_alert_schedule_job_only_with_destination_and_warehouse() {
        let target = Arc::new(MockWorkspace::default());
        let engine = engine(target.clone());

        let mut q = query(42, "watched");
        q.schedule = Some(Schedule {
            interval: Some(300),
            time: None,
            day_of_week: None,
            until: None,
        });
        q.tags = vec!["platform".to_string()];
        let alert = alert_with_query(1, q);

        // Missing warehouse: no job
        engine
            .migrate_alert(&alert, "/alerts", Some("dest-1"), None, None)
            .await
            .unwrap();
        assert!(target.calls_with_prefix("job:").is_empty());

        // Both present: job created with bookkeeping tags
        engine
            .migrate_alert(&alert, "/alerts", Some("dest-1"), Some("wh-1"), Some("svc-principal"))
            .await
            .unwrap();
        let jobs = target.jobs.lock().unwrap();
        assert_eq!(jobs.len(), 1);
        let job = &jobs[0];
        assert_eq!(job.schedule.quartz_cron_expression, "0 */5 * ? * * *");
        assert_eq!(job.schedule.timezone_id, "UTC");
        let tags = job.tags.as_ref().unwrap();
        assert_eq!(tags.get("type").map(String::as_str), Some("alert"));
        assert_eq!(tags.get("destination_id").map(String::as_str), Some("dest-1"));
        assert_eq!(tags.get("warehouse_id").map(String::as_str), Some("wh-1"));
        assert_eq!(
            tags.get("migrated_from_redash").map(String::as_str),
            Some("true")
        );
        assert!(tags.contains_key("platform"));
        assert_eq!(
            job.run_as,
            Some(JobRunAs::from_identity("svc-principal"))
        );
        let task = &job.tasks[0];
        assert_eq!(task.task_key, "alert");
        assert!(task.sql_task.alert.is_some());
    }

    #[tokio::test]
    async fn test_query_schedule_job() {
        let target = Arc::new(MockWorkspace::default());
        let engine = engine(target.clone());

        let schedule = Schedule {
            interval: Some(7200),
            time: None,
            day_of_week: None,
            until: None,
        };
        engine
            .create_query_schedule("q-7", &schedule, "wh-1", Some("user@something.com"))
            .await
            .unwrap();

        let jobs = target.jobs.lock().unwrap();
        assert_eq!(jobs[0].schedule.quartz_cron_expression, "0 0 */2 ? * * *");
        assert_eq!(
            jobs[0].run_as.as_ref().unwrap().user_name.as_deref(),
            Some("user@something.com")
        );
        let task = &jobs[0].tasks[0];
        assert_eq!(task.task_key, "sql");
        assert_eq!(
            task.sql_task.query.as_ref().unwrap().query_id,
            "q-7"
        );
    }

    #[tokio::test]
    async fn test_dashboard_end_to_end() {
        let target = Arc::new(MockWorkspace::default());
        let engine = engine(target.clone());

        let q = query_with_viz(7, "daily totals", 55);
        let viz = q.visualizations[0].clone();
        let dashboard = Dashboard {
            id: 12,
            name: "Ops Overview".to_string(),
            slug: "ops-overview".to_string(),
            widgets: vec![
                Widget {
                    id: 100,
                    text: Some("## Notes".to_string()),
                    width: 1,
                    options: json!({
                        "isHidden": false,
                        "position": {"col": 0, "row": 0},
                        "legacy": true
                    }),
                    query: None,
                    visualization: None,
                },
                Widget {
                    id: 101,
                    text: None,
                    width: 2,
                    options: json!({"isHidden": false, "position": {"col": 1, "row": 0}}),
                    query: Some(q),
                    visualization: Some(viz),
                },
            ],
            dashboard_filters_enabled: true,
            tags: vec!["ops".to_string()],
        };

        engine.migrate_dashboard(&dashboard, "/Shared").await.unwrap();

        let calls = target.calls();
        // Folder pair
        assert!(calls.contains(&"mkdir:/Shared/ops_overview".to_string()));
        assert!(calls.contains(&"mkdir:/Shared/ops_overview/queries".to_string()));
        // One query, one visualization
        assert_eq!(target.calls_with_prefix("query:").len(), 1);
        assert_eq!(target.calls_with_prefix("viz:").len(), 1);
        // Dashboard carries bookkeeping tags
        let dash_calls = target.calls_with_prefix("dashboard:");
        assert_eq!(dash_calls.len(), 1);
        assert!(dash_calls[0].contains("migrated_from_redash"));
        assert!(dash_calls[0].contains("original_id:12"));
        assert!(dash_calls[0].contains("ops"));

        let widget_calls = target.calls_with_prefix("widget:");
        assert_eq!(widget_calls.len(), 2);
        // Text widget: no visualization, filtered options
        assert!(widget_calls[0].contains(":-:-:"));
        assert!(!widget_calls[0].contains("legacy"));
        // Linked widget: mapped visualization id and title from the
        // visualization name
        assert!(widget_calls[1].contains(":v-"));
        assert!(widget_calls[1].contains("daily totals chart"));
    }

    #[tokio::test]
    async fn test_dashboard_shared_query_across_widgets() {
        let target = Arc::new(MockWorkspace::default());
        let engine = engine(target.clone());

        let mut q = query_with_viz(7, "shared", 55);
        q.visualizations.push(Visualization {
            id: 56,
            visualization_type: crate::models::VisualizationType::Table,
            name: "shared table".to_string(),
            description: None,
            options: json!({}),
        });
        let widget = |viz_idx: usize| Widget {
            id: 200 + viz_idx as i64,
            text: None,
            width: 1,
            options: json!({"isHidden": false, "position": {}}),
            query: Some(q.clone()),
            visualization: Some(q.visualizations[viz_idx].clone()),
        };
        let dashboard = Dashboard {
            id: 1,
            name: "d".to_string(),
            slug: "d".to_string(),
            widgets: vec![widget(0), widget(1)],
            dashboard_filters_enabled: false,
            tags: vec![],
        };

        engine.migrate_dashboard(&dashboard, "/Shared").await.unwrap();

        // The query is created once even though two widgets reference it
        assert_eq!(target.calls_with_prefix("query:").len(), 1);
        assert_eq!(target.calls_with_prefix("viz:").len(), 2);
        assert_eq!(target.calls_with_prefix("widget:").len(), 2);
    }

    #[test]
    fn test_sanitize_alert_options() {
        let sanitized = sanitize_alert_options(&json!({
            "op": "greater than",
            "value": 0,
            "muted": false,
            "column": "c"
        }));
        assert_eq!(
            sanitized,
            json!({"op": ">", "value": "0", "muted": false, "column": "c"})
        );
    }

    #[test]
    fn test_sanitize_alert_options_passthrough() {
        let sanitized = sanitize_alert_options(&json!({"op": "<=", "value": 10}));
        assert_eq!(sanitized, json!({"op": "<=", "value": 10}));

        let sanitized = sanitize_alert_options(&json!({"op": "less than", "value": 2.5}));
        assert_eq!(sanitized, json!({"op": "<", "value": 2.5}));
    }

    #[test]
    fn test_build_query_options_defaults_untyped_params() {
        let q: Query = serde_json::from_value(json!({
            "id": 1,
            "name": "q",
            "query": "select 1",
            "options": {"parameters": [
                {"name": "limit", "value": 10},
                {"name": "day", "type": "date", "value": "2024-01-01", "title": "Day"}
            ]}
        }))
        .unwrap();

        let options = build_query_options(&q);
        let params = options["parameters"].as_array().unwrap();
        assert_eq!(params[0]["type"], "text");
        assert_eq!(params[0]["value"], "10");
        assert_eq!(params[1]["type"], "date");
        assert_eq!(params[1]["title"], "Day");
    }
}
