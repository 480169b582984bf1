// csvql - a single-table query engine over delimited text
// This is the library root that exposes the public API

pub mod error;
pub mod query;
pub mod storage;

// Re-export commonly used types for convenience
pub use error::{Error, EvaluationError, LoadError, ParseError, Result};
pub use query::{evaluate, Query, QueryExecutor, QueryParser, QueryResult};
pub use storage::table::{LoadOptions, Table};
pub use storage::{Row, Schema, Value};
