use thiserror::Error;

/// Migration error types
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Only interval-based schedules are supported")]
    UnsupportedSchedule,

    #[error("Interval is too large")]
    IntervalTooLarge,

    #[error("Path `{0}` doesn't exist")]
    FolderNotFound(String),

    #[error("Path `{0}` is not a directory")]
    NotADirectory(String),

    #[error("Circular dependency detected while resolving query {0}")]
    CircularDependency(i64),

    #[error("{api} API error ({status}): {message}")]
    Api {
        api: &'static str,
        status: u16,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl MigrationError {
    /// Build an API error from a failed response status and body
    pub fn api(api: &'static str, status: u16, message: impl Into<String>) -> Self {
        MigrationError::Api {
            api,
            status,
            message: message.into(),
        }
    }
}
