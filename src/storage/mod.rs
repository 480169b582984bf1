// Storage module - holds the loaded table in memory
// Rows are stored as text exactly as they were read; typing only happens at comparison time

pub mod table;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// The markers a COUNT(column) treats as a missing value
pub const EMPTY_MARKERS: [&str; 2] = ["", "NULL"];

/// Represents a single row in a table
/// The values line up with the columns of the table's Schema
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Row {
    pub values: Vec<String>,
}

impl Row {
    pub fn new(values: Vec<String>) -> Self {
        Self { values }
    }

    /// Get the cell at a column position
    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(String::as_str)
    }
}

/// A typed scalar used on either side of a WHERE comparison
/// Literals from the query can be any variant; cells from a row are only ever Float or Text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Coerce a literal written in a query: integer first, then float, then raw text
    pub fn from_literal(raw: &str) -> Self {
        if let Ok(i) = raw.parse::<i64>() {
            Value::Integer(i)
        } else if let Ok(f) = raw.parse::<f64>() {
            Value::Float(f)
        } else {
            Value::Text(raw.to_string())
        }
    }

    /// Coerce a stored cell for comparison: any number becomes a Float, anything else stays text
    pub fn from_cell(cell: &str) -> Self {
        match cell.trim().parse::<f64>() {
            Ok(f) => Value::Float(f),
            Err(_) => Value::Text(cell.to_string()),
        }
    }

    /// Compare two values (used for WHERE clauses)
    /// Integers and floats compare numerically; text only compares with text.
    /// Returns None when the values have no ordering (different kinds, or NaN).
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "'{}'", s),
        }
    }
}

/// The ordered column names shared by every row of a table
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schema {
    pub columns: Vec<String>,
}

impl Schema {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    /// Find the index of a column by name (exact, case-sensitive)
    pub fn get_column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|col| col == name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
