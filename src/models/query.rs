use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::visualization::Visualization;

/// A Redash query, the unit the migration engine operates on.
///
/// `query_string` is rewritten in place by the SQL transformer before
/// the query is handed to the Databricks client. `depends_on` holds the
/// queries referenced by query-based dropdown parameters and is filled
/// in by the dependency resolver, not by deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub id: i64,
    pub name: String,
    #[serde(rename = "query")]
    pub query_string: String,
    #[serde(default)]
    pub options: QueryOptions,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub visualizations: Vec<Visualization>,
    #[serde(default)]
    pub schedule: Option<Schedule>,
    #[serde(default)]
    pub data_source_id: Option<i64>,
    #[serde(skip)]
    pub depends_on: Vec<Query>,
}

impl Query {
    /// Names of the query's declared parameters, derived from
    /// `options.parameters`.
    pub fn params(&self) -> Vec<&str> {
        self.options
            .parameters
            .iter()
            .map(|p| p.name.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryOptions {
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// A query parameter. Parameters with a `queryId` are query-based
/// dropdowns and introduce a dependency edge to the referenced query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub param_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(rename = "queryId", default, skip_serializing_if = "Option::is_none")]
    pub query_id: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Parameter {
    /// Normalize the parameter for the Databricks query options
    /// payload: a parameter with no type defaults to `text` and its
    /// value is coerced to a string.
    pub fn normalized(&self) -> Parameter {
        let mut normalized = self.clone();
        if normalized.param_type.is_none() {
            normalized.param_type = Some("text".to_string());
            normalized.value = Some(Value::String(match &self.value {
                Some(Value::String(s)) => s.clone(),
                Some(v) => v.to_string(),
                None => String::new(),
            }));
        }
        normalized
    }
}

/// A Redash schedule. Only interval-based recurrence is supported by
/// the migration; the other fields are carried for completeness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub interval: Option<u64>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub day_of_week: Option<String>,
    #[serde(default)]
    pub until: Option<String>,
}
