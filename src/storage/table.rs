// Table implementation
// A table is a schema plus the rows loaded from a delimited text source.
// It never changes after loading, so it can be shared freely between queries.

use super::{Row, Schema};
use crate::error::LoadError;
use csv::{ReaderBuilder, Trim};
use log::{debug, info};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Options for reading a delimited file
#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    /// Field separator byte (',' for CSV, b'\t' for TSV)
    pub delimiter: u8,
    /// Trim whitespace around headers and cells
    pub trim: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            trim: false,
        }
    }
}

/// Represents an in-memory table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    /// The name of the table
    pub name: String,
    /// The column names, taken from the header record
    pub schema: Schema,
    rows: Vec<Row>,
}

impl Table {
    /// Create a table from rows that already match the schema
    pub fn new(name: impl Into<String>, schema: Schema, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            schema,
            rows,
        }
    }

    /// Load a table from a file; the table is named after the file stem
    pub fn from_csv<P: AsRef<Path>>(path: P, options: &LoadOptions) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "table".to_string());

        let file = File::open(path)?;
        let table = Self::from_reader(name, file, options)?;

        info!(
            "Loaded {} row(s) with {} column(s) from {}",
            table.row_count(),
            table.schema.len(),
            path.display()
        );
        Ok(table)
    }

    /// Load a table from any reader
    /// The first record is the header; every later record becomes a row
    pub fn from_reader<R: Read>(
        name: impl Into<String>,
        reader: R,
        options: &LoadOptions,
    ) -> Result<Self, LoadError> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(options.delimiter)
            .trim(if options.trim { Trim::All } else { Trim::None })
            .from_reader(reader);

        let columns: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            rows.push(Row::new(record.iter().map(|cell| cell.to_string()).collect()));
        }

        let table = Self::new(name, Schema::new(columns), rows);
        debug!("Table '{}' columns: {:?}", table.name, table.schema.columns);
        Ok(table)
    }

    /// All rows, in load order
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Get the number of rows in the table
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get the schema of the table
    pub fn get_schema(&self) -> &Schema {
        &self.schema
    }
}
