pub mod dialect;
pub mod transpiler;

pub use dialect::{DialectRewrite, SourceDialect};
pub use transpiler::{
    fix_query_params, qualify_tables_with_catalog, SqlTransformer, TransformOutcome,
    TransformReport,
};
