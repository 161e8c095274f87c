// Databricks Jobs API payload types
//
// Mirrors the subset of the jobs/create request body used for alert
// and query schedule jobs.

use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize)]
pub struct CronSchedule {
    pub quartz_cron_expression: String,
    pub timezone_id: String,
}

/// Identity a scheduled job runs as: a user (email) or a service
/// principal (application id).
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JobRunAs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_principal_name: Option<String>,
}

impl JobRunAs {
    /// An identity containing `@` is treated as a user name, anything
    /// else as a service principal application id.
    pub fn from_identity(run_as: &str) -> Self {
        if run_as.contains('@') {
            JobRunAs {
                user_name: Some(run_as.to_string()),
                service_principal_name: None,
            }
        } else {
            JobRunAs {
                user_name: None,
                service_principal_name: Some(run_as.to_string()),
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobTask {
    pub task_key: String,
    pub sql_task: SqlTask,
}

#[derive(Debug, Clone, Serialize)]
pub struct SqlTask {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<SqlTaskQuery>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<SqlTaskAlert>,
    pub warehouse_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SqlTaskQuery {
    pub query_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SqlTaskAlert {
    pub alert_id: String,
    pub subscriptions: Vec<SqlTaskSubscription>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SqlTaskSubscription {
    pub destination_id: String,
}

/// Full jobs/create request body.
#[derive(Debug, Clone, Serialize)]
pub struct JobRequest {
    pub name: String,
    pub description: String,
    pub schedule: CronSchedule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_as: Option<JobRunAs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, String>>,
    pub tasks: Vec<JobTask>,
}
