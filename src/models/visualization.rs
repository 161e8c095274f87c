use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A visualization attached to a query. The options bag is
/// chart-library specific and passed through opaquely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visualization {
    pub id: i64,
    #[serde(rename = "type")]
    pub visualization_type: VisualizationType,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub options: Value,
}

/// The fixed set of Redash visualization types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisualizationType {
    Table,
    Chart,
    Pivot,
    Counter,
    Funnel,
    Map,
    Sankey,
    WordCloud,
    Cohort,
    Details,
}

impl VisualizationType {
    /// Wire value expected by the Databricks visualization API.
    pub fn as_str(&self) -> &'static str {
        match self {
            VisualizationType::Table => "TABLE",
            VisualizationType::Chart => "CHART",
            VisualizationType::Pivot => "PIVOT",
            VisualizationType::Counter => "COUNTER",
            VisualizationType::Funnel => "FUNNEL",
            VisualizationType::Map => "MAP",
            VisualizationType::Sankey => "SANKEY",
            VisualizationType::WordCloud => "WORD_CLOUD",
            VisualizationType::Cohort => "COHORT",
            VisualizationType::Details => "DETAILS",
        }
    }
}
