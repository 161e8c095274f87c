use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::query::{Query, Schedule};

/// A Redash alert and the query it watches. The schedule is copied out
/// of the owning query's record by the source client; alerts have no
/// schedule of their own in Redash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub name: String,
    pub query: Query,
    #[serde(default)]
    pub schedule: Option<Schedule>,
    /// Condition options: operator, threshold value, watched column.
    pub options: Value,
    #[serde(default)]
    pub rearm: Option<i64>,
}
