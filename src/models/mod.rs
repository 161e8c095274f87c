pub mod alert;
pub mod dashboard;
pub mod job;
pub mod query;
pub mod visualization;

pub use alert::*;
pub use dashboard::*;
pub use job::*;
pub use query::*;
pub use visualization::*;
