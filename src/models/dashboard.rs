use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::query::Query;
use super::visualization::Visualization;

/// A dashboard widget. Either a text widget (`query` is `None`) or a
/// query widget carrying the query and the visualization to render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Widget {
    pub id: i64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub width: u64,
    /// Layout/position option bag, passed through to the target.
    pub options: Value,
    #[serde(skip)]
    pub query: Option<Query>,
    #[serde(skip)]
    pub visualization: Option<Visualization>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    pub id: i64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub widgets: Vec<Widget>,
    #[serde(default)]
    pub dashboard_filters_enabled: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Dashboard {
    /// Folder-name slug derived from the dashboard name.
    pub fn name_slug(&self) -> String {
        self.name.replace(' ', "_").to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_slug() {
        let dashboard = Dashboard {
            id: 12,
            name: "Job Estimator KPIs".to_string(),
            slug: "job-estimator-kpis".to_string(),
            widgets: vec![],
            dashboard_filters_enabled: false,
            tags: vec![],
        };
        assert_eq!(dashboard.name_slug(), "job_estimator_kpis");
    }
}
