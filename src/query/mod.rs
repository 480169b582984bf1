// Query module - handles parsing and evaluation
pub mod executor;
pub mod parser;

pub use executor::{evaluate, QueryExecutor, QueryResult};
pub use parser::{Condition, CountTarget, Operator, Projection, Query, QueryKind, QueryParser};
