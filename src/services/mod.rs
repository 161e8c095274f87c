pub mod cache;
pub mod dbsql;
pub mod migrate;
pub mod redash;
pub mod schedule;
pub mod transform;

pub use cache::{CachedQuery, IdentityCache};
pub use dbsql::{DatabricksClient, TargetWorkspace};
pub use migrate::MigrationEngine;
pub use redash::RedashClient;
pub use transform::{SourceDialect, SqlTransformer};
