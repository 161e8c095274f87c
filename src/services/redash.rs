// Redash read client and dependency resolver
//
// Read-only collaborator: lists and fetches queries, alerts and
// dashboards, and materializes the dependency subtree introduced by
// query-based dropdown parameters. The engine never writes to Redash.

use async_trait::async_trait;
use futures::future::BoxFuture;
use reqwest::Client as HttpClient;
use serde_json::Value;
use std::collections::HashSet;

use crate::error::MigrationError;
use crate::models::{Alert, Dashboard, Query, Visualization, Widget};

/// Fetches raw query records by id. Seam for the recursive dependency
/// resolution, so it can be driven from an in-memory map in tests.
#[async_trait]
pub trait QueryFetcher: Send + Sync {
    async fn fetch_query_raw(&self, id: i64) -> Result<Value, MigrationError>;
}

/// Build a `Query` model from a raw Redash record, recursively
/// resolving every query referenced by a dropdown parameter. No
/// deduplication: a query referenced by two parameters appears twice in
/// `depends_on` (the identity cache deduplicates at creation time).
pub async fn build_query_model(
    fetcher: &dyn QueryFetcher,
    raw: Value,
) -> Result<Query, MigrationError> {
    let mut resolving = HashSet::new();
    build_query_inner(fetcher, raw, &mut resolving).await
}

/// Recursive worker. `resolving` holds the ids currently on the
/// resolution path; revisiting one means the queryId references form a
/// cycle and resolution fails fast instead of recursing forever.
fn build_query_inner<'a>(
    fetcher: &'a dyn QueryFetcher,
    raw: Value,
    resolving: &'a mut HashSet<i64>,
) -> BoxFuture<'a, Result<Query, MigrationError>> {
    Box::pin(async move {
        let mut query: Query = serde_json::from_value(raw)?;

        if !resolving.insert(query.id) {
            return Err(MigrationError::CircularDependency(query.id));
        }

        let dep_ids: Vec<i64> = query
            .options
            .parameters
            .iter()
            .filter_map(|p| p.query_id)
            .collect();
        for dep_id in dep_ids {
            let dep_raw = fetcher.fetch_query_raw(dep_id).await?;
            let dep = build_query_inner(fetcher, dep_raw, resolving).await?;
            query.depends_on.push(dep);
        }

        resolving.remove(&query.id);
        Ok(query)
    })
}

/// Build an `Alert` model from a raw Redash record. The schedule lives
/// on the owning query in Redash and is copied onto the alert.
pub async fn build_alert_model(
    fetcher: &dyn QueryFetcher,
    mut raw: Value,
) -> Result<Alert, MigrationError> {
    #[derive(serde::Deserialize)]
    struct AlertRecord {
        id: i64,
        name: String,
        options: Value,
        #[serde(default)]
        rearm: Option<i64>,
    }

    let query_raw = raw
        .as_object_mut()
        .and_then(|o| o.remove("query"))
        .ok_or_else(|| MigrationError::UnexpectedResponse("alert record has no query".into()))?;
    let query = build_query_model(fetcher, query_raw).await?;

    let record: AlertRecord = serde_json::from_value(raw)?;
    Ok(Alert {
        id: record.id,
        name: record.name,
        schedule: query.schedule.clone(),
        query,
        options: record.options,
        rearm: record.rearm,
    })
}

/// Build a `Dashboard` model, resolving each widget's visualization
/// and query (with its dependency subtree).
pub async fn build_dashboard_model(
    fetcher: &dyn QueryFetcher,
    mut raw: Value,
) -> Result<Dashboard, MigrationError> {
    let widgets_raw = raw
        .as_object_mut()
        .and_then(|o| o.remove("widgets"))
        .unwrap_or(Value::Array(Vec::new()));

    let mut dashboard: Dashboard = serde_json::from_value(raw)?;

    if let Value::Array(widgets) = widgets_raw {
        for mut widget_raw in widgets {
            let viz_raw = widget_raw
                .as_object_mut()
                .and_then(|o| o.remove("visualization"))
                .filter(|v| !v.is_null());

            let mut widget: Widget = serde_json::from_value(widget_raw)?;

            if let Some(mut viz_raw) = viz_raw {
                let query_raw = viz_raw
                    .as_object_mut()
                    .and_then(|o| o.remove("query"))
                    .filter(|v| !v.is_null());
                let viz: Visualization = serde_json::from_value(viz_raw)?;
                if let Some(query_raw) = query_raw {
                    widget.query = Some(build_query_model(fetcher, query_raw).await?);
                }
                widget.visualization = Some(viz);
            }

            dashboard.widgets.push(widget);
        }
    }

    Ok(dashboard)
}

/// Alerts carry no tags of their own; the filter applies to the owning
/// query's tags (every requested tag must be present).
pub fn alert_matches_tags(alert: &Alert, tags: &[String]) -> bool {
    tags.iter().all(|t| alert.query.tags.contains(t))
}

/// Client for the Redash REST API.
pub struct RedashClient {
    base_url: String,
    api_key: String,
    http: HttpClient,
}

impl RedashClient {
    pub fn new(url: &str, api_key: &str) -> Self {
        Self {
            base_url: url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http: HttpClient::new(),
        }
    }

    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<Value, MigrationError> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Key {}", self.api_key))
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MigrationError::api("Redash", status.as_u16(), body));
        }
        Ok(response.json().await?)
    }

    /// Fetch one query by id, with its dependency subtree resolved.
    pub async fn get_query(&self, id: i64) -> Result<Query, MigrationError> {
        let raw = self.fetch_query_raw(id).await?;
        build_query_model(self, raw).await
    }

    /// List queries, optionally filtered by tags, or fetch a single
    /// query when an explicit id is given.
    pub async fn list_queries(
        &self,
        tags: &[String],
        query_id: Option<i64>,
    ) -> Result<Vec<Query>, MigrationError> {
        if let Some(id) = query_id {
            return Ok(vec![self.get_query(id).await?]);
        }

        let mut queries = Vec::new();
        for raw in self.paginate("/api/queries", tags).await? {
            queries.push(build_query_model(self, raw).await?);
        }
        Ok(queries)
    }

    pub async fn get_alert(&self, id: i64) -> Result<Alert, MigrationError> {
        let raw = self.get(&format!("/api/alerts/{}", id), &[]).await?;
        build_alert_model(self, raw).await
    }

    /// List alerts, optionally filtered by the owning query's tags, or
    /// fetch a single alert when an explicit id is given.
    pub async fn list_alerts(
        &self,
        tags: &[String],
        alert_id: Option<i64>,
    ) -> Result<Vec<Alert>, MigrationError> {
        if let Some(id) = alert_id {
            return Ok(vec![self.get_alert(id).await?]);
        }

        let raw = self.get("/api/alerts", &[]).await?;
        let records = raw
            .as_array()
            .cloned()
            .ok_or_else(|| MigrationError::UnexpectedResponse("alert listing is not an array".into()))?;

        let mut alerts = Vec::new();
        for record in records {
            let alert = build_alert_model(self, record).await?;
            if alert_matches_tags(&alert, tags) {
                alerts.push(alert);
            }
        }
        Ok(alerts)
    }

    pub async fn get_dashboard(&self, id: i64) -> Result<Dashboard, MigrationError> {
        let raw = self.get(&format!("/api/dashboards/{}", id), &[]).await?;
        build_dashboard_model(self, raw).await
    }

    /// List dashboards (detail records), optionally filtered by tags.
    pub async fn list_dashboards(&self, tags: &[String]) -> Result<Vec<Dashboard>, MigrationError> {
        let mut dashboards = Vec::new();
        for summary in self.paginate("/api/dashboards", tags).await? {
            let id = summary
                .get("id")
                .and_then(Value::as_i64)
                .ok_or_else(|| MigrationError::UnexpectedResponse("dashboard record has no id".into()))?;
            dashboards.push(self.get_dashboard(id).await?);
        }
        Ok(dashboards)
    }

    /// Walk a paginated listing endpoint, collecting all `results`.
    async fn paginate(&self, path: &str, tags: &[String]) -> Result<Vec<Value>, MigrationError> {
        let mut collected = Vec::new();
        let mut page = 1u64;
        loop {
            let mut params: Vec<(&str, String)> = vec![
                ("page", page.to_string()),
                ("page_size", "100".to_string()),
            ];
            for tag in tags {
                params.push(("tags", tag.clone()));
            }

            let body = self.get(path, &params).await?;
            let count = body.get("count").and_then(Value::as_u64).unwrap_or(0);
            let results = body
                .get("results")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            if results.is_empty() {
                break;
            }
            collected.extend(results);
            if collected.len() as u64 >= count {
                break;
            }
            page += 1;
        }
        Ok(collected)
    }
}

#[async_trait]
impl QueryFetcher for RedashClient {
    async fn fetch_query_raw(&self, id: i64) -> Result<Value, MigrationError> {
        self.get(&format!("/api/queries/{}", id), &[]).await
    }
}
