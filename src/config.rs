use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub redash: RedashConfig,
    pub databricks: DatabricksConfig,
    pub transform: TransformConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedashConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabricksConfig {
    pub host: Option<String>,
    pub token: Option<String>,
}

/// Settings for the MySQL pre-transpile table rewrite
#[derive(Debug, Clone, Deserialize)]
pub struct TransformConfig {
    pub catalog: String,
    pub schema: String,
    pub default_database: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env first so the env lookups below see it
        let _ = dotenv::dotenv();

        let mut builder = config::Config::builder()
            .set_default("redash.url", None::<String>)?
            .set_default("redash.api_key", None::<String>)?
            .set_default("databricks.host", None::<String>)?
            .set_default("databricks.token", None::<String>)?
            .set_default("transform.catalog", "lakehouse_production")?
            .set_default("transform.schema", "kafka_cdc")?
            .set_default("transform.default_database", "hip")?;

        if let Ok(url) = env::var("REDASH_URL") {
            builder = builder.set_override("redash.url", Some(url))?;
        }

        if let Ok(api_key) = env::var("REDASH_API_KEY") {
            builder = builder.set_override("redash.api_key", Some(api_key))?;
        }

        if let Ok(host) = env::var("DATABRICKS_HOST") {
            builder = builder.set_override("databricks.host", Some(host))?;
        }

        if let Ok(token) = env::var("DATABRICKS_TOKEN") {
            builder = builder.set_override("databricks.token", Some(token))?;
        }

        if let Ok(catalog) = env::var("TRANSFORM_CATALOG") {
            builder = builder.set_override("transform.catalog", catalog)?;
        }

        if let Ok(schema) = env::var("TRANSFORM_SCHEMA") {
            builder = builder.set_override("transform.schema", schema)?;
        }

        if let Ok(db) = env::var("TRANSFORM_DEFAULT_DATABASE") {
            builder = builder.set_override("transform.default_database", db)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Check that all four connection parameters are present, returning
    /// the resolved values. Flags passed on the command line take
    /// precedence over environment variables.
    pub fn connection(
        &self,
        redash_url: Option<String>,
        redash_api_key: Option<String>,
        databricks_host: Option<String>,
        databricks_token: Option<String>,
    ) -> Result<ConnectionSettings, crate::error::MigrationError> {
        let url = redash_url.or_else(|| self.redash.url.clone());
        let api_key = redash_api_key.or_else(|| self.redash.api_key.clone());
        let host = databricks_host.or_else(|| self.databricks.host.clone());
        let token = databricks_token.or_else(|| self.databricks.token.clone());

        let mut missing = Vec::new();
        if url.is_none() {
            missing.push("--redash-url / REDASH_URL");
        }
        if api_key.is_none() {
            missing.push("--redash-api-key / REDASH_API_KEY");
        }
        if host.is_none() {
            missing.push("--databricks-host / DATABRICKS_HOST");
        }
        if token.is_none() {
            missing.push("--databricks-token / DATABRICKS_TOKEN");
        }

        if !missing.is_empty() {
            return Err(crate::error::MigrationError::Config(format!(
                "Missing required options to connect to Redash and Databricks: {}",
                missing.join(", ")
            )));
        }

        Ok(ConnectionSettings {
            redash_url: url.unwrap(),
            redash_api_key: api_key.unwrap(),
            databricks_host: host.unwrap(),
            databricks_token: token.unwrap(),
        })
    }
}

/// Fully resolved connection parameters
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub redash_url: String,
    pub redash_api_key: String,
    pub databricks_host: String,
    pub databricks_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_config() -> Config {
        Config {
            redash: RedashConfig {
                url: None,
                api_key: None,
            },
            databricks: DatabricksConfig {
                host: None,
                token: None,
            },
            transform: TransformConfig {
                catalog: "lakehouse_production".to_string(),
                schema: "kafka_cdc".to_string(),
                default_database: "hip".to_string(),
            },
        }
    }

    #[test]
    fn test_connection_missing_options() {
        let config = empty_config();
        let result = config.connection(None, None, None, None);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("REDASH_URL"));
        assert!(err.contains("DATABRICKS_TOKEN"));
    }

    #[test]
    fn test_connection_flags_override() {
        let mut config = empty_config();
        config.redash.url = Some("https://redash.internal".to_string());
        config.redash.api_key = Some("env_key".to_string());
        config.databricks.host = Some("https://dbx.internal".to_string());
        config.databricks.token = Some("env_token".to_string());

        let settings = config
            .connection(None, Some("flag_key".to_string()), None, None)
            .unwrap();
        assert_eq!(settings.redash_url, "https://redash.internal");
        assert_eq!(settings.redash_api_key, "flag_key");
    }
}
