// Databricks write client
//
// Write-side collaborator: creates queries, visualizations, widgets,
// alerts, dashboards and jobs through the Databricks REST API, and
// resolves workspace paths to folder ids. The `TargetWorkspace` trait
// is the seam the orchestrator is written against; tests substitute a
// recording mock.

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::MigrationError;
use crate::models::JobRequest;

/// Workspace object kinds returned by the get-status API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectType {
    Directory,
    Notebook,
    File,
    Repo,
    Library,
    Dashboard,
}

/// Status of a workspace path.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectStatus {
    pub object_id: i64,
    pub object_type: ObjectType,
}

/// Check that a path exists and is a directory, returning its object
/// id. Raised before any creation call that depends on the folder.
pub fn validate_folder_status(
    path: &str,
    status: Option<ObjectStatus>,
) -> Result<i64, MigrationError> {
    match status {
        None => Err(MigrationError::FolderNotFound(path.to_string())),
        Some(status) if status.object_type != ObjectType::Directory => {
            Err(MigrationError::NotADirectory(path.to_string()))
        }
        Some(status) => Ok(status.object_id),
    }
}

/// Write API consumed by the migration orchestrator. Every method maps
/// to a single creation or lookup call against the target platform.
#[async_trait]
pub trait TargetWorkspace: Send + Sync {
    async fn create_query(
        &self,
        name: &str,
        sql: &str,
        data_source_id: &str,
        parent: &str,
        options: Value,
        description: &str,
    ) -> Result<String, MigrationError>;

    async fn create_visualization(
        &self,
        query_id: &str,
        visualization_type: &str,
        options: &Value,
        description: Option<&str>,
        name: Option<&str>,
    ) -> Result<String, MigrationError>;

    async fn create_widget(
        &self,
        dashboard_id: &str,
        visualization_id: Option<&str>,
        options: Value,
        text: Option<&str>,
        width: u64,
        title: Option<&str>,
    ) -> Result<String, MigrationError>;

    async fn create_alert(
        &self,
        name: &str,
        options: Value,
        query_id: &str,
        parent: &str,
        rearm: Option<i64>,
    ) -> Result<String, MigrationError>;

    async fn create_dashboard(
        &self,
        name: &str,
        parent: &str,
        tags: &[String],
        filters_enabled: bool,
    ) -> Result<String, MigrationError>;

    async fn create_job(&self, request: &JobRequest) -> Result<i64, MigrationError>;

    /// Resolve a workspace path to its folder id; fails if the path
    /// does not exist or is not a directory.
    async fn resolve_folder_id(&self, path: &str) -> Result<i64, MigrationError>;

    /// Create a directory (and parents) and return its folder id.
    async fn create_folder(&self, path: &str) -> Result<i64, MigrationError>;
}

/// Client for the Databricks SQL, workspace and jobs REST APIs.
pub struct DatabricksClient {
    host: String,
    token: String,
    http: HttpClient,
}

impl DatabricksClient {
    pub fn new(host: &str, token: &str) -> Self {
        Self {
            host: host.trim_end_matches('/').to_string(),
            token: token.to_string(),
            http: HttpClient::new(),
        }
    }

    /// The data source id used for created queries when the operator
    /// does not supply a warehouse id: the first listed data source.
    pub async fn default_data_source_id(&self) -> Result<String, MigrationError> {
        let body = self.get("/api/2.0/preview/sql/data_sources").await?;
        let first = body
            .as_array()
            .and_then(|sources| sources.first())
            .ok_or_else(|| {
                MigrationError::UnexpectedResponse("no data sources available".into())
            })?;
        extract_id(first)
    }

    async fn get(&self, path: &str) -> Result<Value, MigrationError> {
        let response = self
            .http
            .get(format!("{}{}", self.host, path))
            .bearer_auth(&self.token)
            .send()
            .await?;
        self.into_json(response).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, MigrationError> {
        let response = self
            .http
            .post(format!("{}{}", self.host, path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        self.into_json(response).await
    }

    async fn into_json(&self, response: reqwest::Response) -> Result<Value, MigrationError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MigrationError::api("Databricks", status.as_u16(), body));
        }
        Ok(response.json().await?)
    }

    async fn get_status(&self, path: &str) -> Result<Option<ObjectStatus>, MigrationError> {
        let response = self
            .http
            .get(format!("{}/api/2.0/workspace/get-status", self.host))
            .bearer_auth(&self.token)
            .query(&[("path", path)])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = self.into_json(response).await?;
        Ok(Some(serde_json::from_value(body)?))
    }
}

#[async_trait]
impl TargetWorkspace for DatabricksClient {
    async fn create_query(
        &self,
        name: &str,
        sql: &str,
        data_source_id: &str,
        parent: &str,
        options: Value,
        description: &str,
    ) -> Result<String, MigrationError> {
        let body = json!({
            "name": name,
            "query": sql,
            "data_source_id": data_source_id,
            "parent": parent,
            "options": options,
            "description": description,
        });
        let created = self.post("/api/2.0/preview/sql/queries", &body).await?;
        extract_id(&created)
    }

    async fn create_visualization(
        &self,
        query_id: &str,
        visualization_type: &str,
        options: &Value,
        description: Option<&str>,
        name: Option<&str>,
    ) -> Result<String, MigrationError> {
        let body = json!({
            "query_id": query_id,
            "type": visualization_type,
            "options": options,
            "description": description,
            "name": name,
        });
        let created = self
            .post("/api/2.0/preview/sql/visualizations", &body)
            .await?;
        extract_id(&created)
    }

    async fn create_widget(
        &self,
        dashboard_id: &str,
        visualization_id: Option<&str>,
        options: Value,
        text: Option<&str>,
        width: u64,
        title: Option<&str>,
    ) -> Result<String, MigrationError> {
        let mut options = options;
        if let (Some(title), Some(obj)) = (title, options.as_object_mut()) {
            obj.insert("title".to_string(), Value::String(title.to_string()));
        }
        let body = json!({
            "dashboard_id": dashboard_id,
            "visualization_id": visualization_id,
            "options": options,
            "text": text,
            "width": width,
        });
        let created = self.post("/api/2.0/preview/sql/widgets", &body).await?;
        extract_id(&created)
    }

    async fn create_alert(
        &self,
        name: &str,
        options: Value,
        query_id: &str,
        parent: &str,
        rearm: Option<i64>,
    ) -> Result<String, MigrationError> {
        let body = json!({
            "name": name,
            "options": options,
            "query_id": query_id,
            "parent": parent,
            "rearm": rearm,
        });
        let created = self.post("/api/2.0/preview/sql/alerts", &body).await?;
        extract_id(&created)
    }

    async fn create_dashboard(
        &self,
        name: &str,
        parent: &str,
        tags: &[String],
        filters_enabled: bool,
    ) -> Result<String, MigrationError> {
        let body = json!({
            "name": name,
            "parent": parent,
            "tags": tags,
            "dashboard_filters_enabled": filters_enabled,
        });
        let created = self.post("/api/2.0/preview/sql/dashboards", &body).await?;
        extract_id(&created)
    }

    async fn create_job(&self, request: &JobRequest) -> Result<i64, MigrationError> {
        let body = serde_json::to_value(request)?;
        let created = self.post("/api/2.1/jobs/create", &body).await?;
        created
            .get("job_id")
            .and_then(Value::as_i64)
            .ok_or_else(|| MigrationError::UnexpectedResponse("job creation returned no id".into()))
    }

    async fn resolve_folder_id(&self, path: &str) -> Result<i64, MigrationError> {
        let status = self.get_status(path).await?;
        validate_folder_status(path, status)
    }

    async fn create_folder(&self, path: &str) -> Result<i64, MigrationError> {
        self.post("/api/2.0/workspace/mkdirs", &json!({ "path": path }))
            .await?;
        self.resolve_folder_id(path).await
    }
}

/// Creation responses carry the new object id as a string or a number.
fn extract_id(body: &Value) -> Result<String, MigrationError> {
    match body.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(MigrationError::UnexpectedResponse(
            "creation response carried no id".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_folder_missing_path() {
        let err = validate_folder_status("/some/path/", None).unwrap_err();
        assert_eq!(err.to_string(), "Path `/some/path/` doesn't exist");
    }

    #[test]
    fn test_validate_folder_not_a_directory() {
        let status = ObjectStatus {
            object_id: 1234,
            object_type: ObjectType::Notebook,
        };
        let err = validate_folder_status("/some/path/", Some(status)).unwrap_err();
        assert_eq!(err.to_string(), "Path `/some/path/` is not a directory");
    }

    #[test]
    fn test_validate_folder_directory() {
        let status = ObjectStatus {
            object_id: 1234,
            object_type: ObjectType::Directory,
        };
        assert_eq!(
            validate_folder_status("/some/path/", Some(status)).unwrap(),
            1234
        );
    }

    #[test]
    fn test_extract_id_string_and_number() {
        assert_eq!(
            extract_id(&serde_json::json!({"id": "abc-123"})).unwrap(),
            "abc-123"
        );
        assert_eq!(extract_id(&serde_json::json!({"id": 42})).unwrap(), "42");
        assert!(extract_id(&serde_json::json!({})).is_err());
    }

    #[test]
    fn test_object_type_deserialization() {
        let status: ObjectStatus =
            serde_json::from_value(serde_json::json!({"object_id": 7, "object_type": "DIRECTORY"}))
                .unwrap();
        assert_eq!(status.object_type, ObjectType::Directory);
    }
}
