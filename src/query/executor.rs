// Query Executor
// This module evaluates parsed queries against a loaded table
// Evaluation is a pure function of (query, table): filter first, then project or count

use super::parser::{
    Condition, CountTarget, Operator, Projection, Query, QueryKind, QueryParser,
};
use crate::error::{EvaluationError, Result};
use crate::storage::{table::Table, Row, Schema, Value, EMPTY_MARKERS};
use log::{debug, warn};
use serde_json::{json, Map, Value as JsonValue};
use std::borrow::Cow;
use std::cmp::Ordering;

/// Evaluate a query against a table
/// Every referenced column is resolved against the schema before any row is read,
/// so an unknown column fails the same way whether the table has rows or not
pub fn evaluate<'a>(
    query: &Query,
    table: &'a Table,
) -> std::result::Result<QueryResult<'a>, EvaluationError> {
    let schema = table.get_schema();

    let filtered: Vec<&'a Row> = match &query.filter {
        Some(condition) => filter_rows(condition, schema, table.rows())?,
        None => table.rows().iter().collect(),
    };

    let result = match &query.kind {
        QueryKind::Count(target) => QueryResult::Count(count_rows(target, schema, &filtered)?),
        QueryKind::Select(projection) => project_rows(projection, schema, filtered)?,
    };

    debug!(
        "Evaluated query on '{}': {} of {} row(s) matched",
        table.name,
        result.len(),
        table.row_count()
    );
    Ok(result)
}

/// Stage 1: keep the rows whose cell satisfies the condition, in order
fn filter_rows<'a>(
    condition: &Condition,
    schema: &Schema,
    rows: &'a [Row],
) -> std::result::Result<Vec<&'a Row>, EvaluationError> {
    let index = column_index(schema, &condition.column)?;
    debug!("Filtering on {}", condition);

    Ok(rows
        .iter()
        .filter(|row| row.get(index).is_some_and(|cell| cell_matches(condition, cell)))
        .collect())
}

/// Test a stored cell against the condition
/// The cell is coerced for the comparison only; it is never modified
fn cell_matches(condition: &Condition, cell: &str) -> bool {
    let ordering = Value::from_cell(cell).compare(&condition.value);
    operator_holds(condition.operator, ordering)
}

/// Decide the predicate from the result of `cell.compare(literal)`
/// An unordered pair (None) is never equal, so only `!=` holds for it
fn operator_holds(operator: Operator, ordering: Option<Ordering>) -> bool {
    match operator {
        Operator::Eq => ordering == Some(Ordering::Equal),
        Operator::NotEq => ordering != Some(Ordering::Equal),
        Operator::Gt => ordering == Some(Ordering::Greater),
        Operator::Lt => ordering == Some(Ordering::Less),
        Operator::GtEq => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        Operator::LtEq => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
    }
}

/// Stage 2a: COUNT(*) or COUNT(column)
fn count_rows(
    target: &CountTarget,
    schema: &Schema,
    rows: &[&Row],
) -> std::result::Result<usize, EvaluationError> {
    match target {
        CountTarget::AllRows => Ok(rows.len()),
        CountTarget::Column(name) => {
            let index = column_index(schema, name)?;
            Ok(rows
                .iter()
                .filter(|row| {
                    row.get(index)
                        .is_some_and(|cell| !EMPTY_MARKERS.contains(&cell))
                })
                .count())
        }
    }
}

/// Stage 2b: SELECT * hands back the stored rows; a column list builds new rows
fn project_rows<'a>(
    projection: &Projection,
    schema: &Schema,
    rows: Vec<&'a Row>,
) -> std::result::Result<QueryResult<'a>, EvaluationError> {
    match projection {
        Projection::All => Ok(QueryResult::Rows {
            column_names: schema.columns.clone(),
            rows: rows.into_iter().map(Cow::Borrowed).collect(),
        }),
        Projection::Columns(names) => {
            let indexes = names
                .iter()
                .map(|name| column_index(schema, name))
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let projected = rows
                .into_iter()
                .map(|row| {
                    let values = indexes
                        .iter()
                        .map(|&i| row.get(i).unwrap_or_default().to_string())
                        .collect();
                    Cow::Owned(Row::new(values))
                })
                .collect();

            Ok(QueryResult::Rows {
                column_names: names.clone(),
                rows: projected,
            })
        }
    }
}

fn column_index(schema: &Schema, name: &str) -> std::result::Result<usize, EvaluationError> {
    schema
        .get_column_index(name)
        .ok_or_else(|| EvaluationError::UnknownColumn(name.to_string()))
}

/// The query executor owns the loaded table and runs queries against it
/// The table is never modified, so a shared reference is all a query needs
pub struct QueryExecutor {
    table: Table,
}

impl QueryExecutor {
    pub fn new(table: Table) -> Self {
        Self { table }
    }

    /// Execute an already parsed query
    pub fn execute(&self, query: &Query) -> std::result::Result<QueryResult<'_>, EvaluationError> {
        if query.table_name != self.table.name {
            warn!(
                "Query names table '{}' but '{}' is loaded; querying '{}'",
                query.table_name, self.table.name, self.table.name
            );
        }
        evaluate(query, &self.table)
    }

    /// Parse and execute a query string
    pub fn run(&self, sql: &str) -> Result<QueryResult<'_>> {
        let query = QueryParser::parse(sql)?;
        Ok(self.execute(&query)?)
    }

    /// Get a reference to the loaded table
    pub fn table(&self) -> &Table {
        &self.table
    }
}

/// Represents the result of a query execution
/// Rows from a `SELECT *` borrow the table; projected rows are owned
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult<'a> {
    /// The number produced by COUNT
    Count(usize),
    /// Rows returned from a SELECT query
    Rows {
        column_names: Vec<String>,
        rows: Vec<Cow<'a, Row>>,
    },
}

impl QueryResult<'_> {
    /// Number of rows, or the count itself
    pub fn len(&self) -> usize {
        match self {
            QueryResult::Count(n) => *n,
            QueryResult::Rows { rows, .. } => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render as JSON: `{"count": n}` or an array of objects keyed in column order
    pub fn to_json(&self) -> JsonValue {
        match self {
            QueryResult::Count(n) => json!({ "count": n }),
            QueryResult::Rows { column_names, rows } => JsonValue::Array(
                rows.iter()
                    .map(|row| {
                        let object: Map<String, JsonValue> = column_names
                            .iter()
                            .zip(&row.values)
                            .map(|(name, value)| (name.clone(), JsonValue::String(value.clone())))
                            .collect();
                        JsonValue::Object(object)
                    })
                    .collect(),
            ),
        }
    }

    /// Format the result as a string for display
    /// This creates a box table for SELECT results
    pub fn format(&self) -> String {
        match self {
            QueryResult::Count(n) => n.to_string(),
            QueryResult::Rows { rows, column_names } => {
                if rows.is_empty() {
                    return "No rows found.".to_string();
                }

                // Calculate column widths
                let mut widths: Vec<usize> =
                    column_names.iter().map(|c| c.chars().count()).collect();

                for row in rows {
                    for (width, value) in widths.iter_mut().zip(&row.values) {
                        *width = (*width).max(value.chars().count());
                    }
                }

                let mut result = String::new();

                result.push_str(&border(&widths, '┌', '┬', '┐'));
                result.push_str(&line(column_names, &widths));
                result.push_str(&border(&widths, '├', '┼', '┤'));
                for row in rows {
                    result.push_str(&line(&row.values, &widths));
                }
                result.push_str(&border(&widths, '└', '┴', '┘'));

                result.push_str(&format!("\n{} row(s) returned", rows.len()));

                result
            }
        }
    }
}

fn border(widths: &[usize], left: char, middle: char, right: char) -> String {
    let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
    format!("{}{}{}\n", left, segments.join(&middle.to_string()), right)
}

fn line(values: &[String], widths: &[usize]) -> String {
    let mut result = String::from("│");
    for (value, width) in values.iter().zip(widths) {
        result.push_str(&format!(" {:<width$} │", value, width = width));
    }
    result.push('\n');
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn people() -> Table {
        let rows = [
            ["Alice", "34", "alice@example.com"],
            ["Bob", "29", ""],
            ["Carol", "41", "NULL"],
            ["Dave", "n/a", "dave@example.com"],
        ]
        .iter()
        .map(|cells| Row::new(cells.iter().map(|c| c.to_string()).collect()))
        .collect();

        Table::new(
            "people",
            Schema::new(vec!["name".into(), "age".into(), "email".into()]),
            rows,
        )
    }

    fn names(result: &QueryResult) -> Vec<String> {
        match result {
            QueryResult::Rows { rows, .. } => rows.iter().map(|r| r.values[0].clone()).collect(),
            QueryResult::Count(_) => panic!("expected rows"),
        }
    }

    fn condition(sql: &str) -> Condition {
        QueryParser::parse(sql).unwrap().filter.unwrap()
    }

    #[test]
    fn test_cell_matches() {
        let c = condition("SELECT * FROM t WHERE age > 30");
        assert!(cell_matches(&c, "34"));
        assert!(!cell_matches(&c, "29"));
        assert!(!cell_matches(&c, "30"));
        assert!(!cell_matches(&c, "unknown"));

        let c = condition("SELECT * FROM t WHERE age = '30'");
        assert!(!cell_matches(&c, "30"));

        let c = condition("SELECT * FROM t WHERE name != 'Bob'");
        assert!(cell_matches(&c, "Alice"));
        assert!(!cell_matches(&c, "Bob"));
        // A number is never equal to text
        assert!(cell_matches(&c, "42"));
    }

    #[test]
    fn test_operator_on_unordered_pair() {
        for op in [Operator::Eq, Operator::Gt, Operator::Lt, Operator::GtEq, Operator::LtEq] {
            assert!(!operator_holds(op, None), "{}", op);
        }
        assert!(operator_holds(Operator::NotEq, None));
        assert!(operator_holds(Operator::GtEq, Some(Ordering::Equal)));
        assert!(!operator_holds(Operator::Lt, Some(Ordering::Equal)));
    }

    #[test]
    fn test_doubled_quote_literal_matches_cell_verbatim() {
        let table = Table::new(
            "notes",
            Schema::new(vec!["text".into()]),
            vec![Row::new(vec!["it''s".into()]), Row::new(vec!["it's".into()])],
        );
        let query = QueryParser::parse("SELECT COUNT(*) FROM notes WHERE text = 'it''s'").unwrap();
        assert_eq!(evaluate(&query, &table), Ok(QueryResult::Count(1)));

        let query = QueryParser::parse("SELECT text FROM notes WHERE text = 'it''s'").unwrap();
        match evaluate(&query, &table).unwrap() {
            QueryResult::Rows { rows, .. } => assert_eq!(rows[0].values, vec!["it''s"]),
            QueryResult::Count(_) => panic!("expected rows"),
        }
    }

    #[test]
    fn test_comment_marker_literal_does_not_truncate() {
        let table = Table::new(
            "codes",
            Schema::new(vec!["code".into()]),
            vec![Row::new(vec!["A".into()]), Row::new(vec!["A--1".into()])],
        );
        let query = QueryParser::parse("SELECT code FROM codes WHERE code = A--1").unwrap();
        match evaluate(&query, &table).unwrap() {
            QueryResult::Rows { rows, .. } => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].values, vec!["A--1"]);
            }
            QueryResult::Count(_) => panic!("expected rows"),
        }
    }

    #[test]
    fn test_select_with_filter_projects_name() {
        let executor = QueryExecutor::new(people());
        let result = executor
            .run("SELECT name FROM people WHERE age > 30")
            .unwrap();

        match &result {
            QueryResult::Rows { column_names, rows } => {
                assert_eq!(column_names, &vec!["name".to_string()]);
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0].values, vec!["Alice"]);
                assert_eq!(rows[1].values, vec!["Carol"]);
            }
            QueryResult::Count(_) => panic!("expected rows"),
        }
    }

    #[test]
    fn test_select_star_borrows_rows_in_order() {
        let table = people();
        let query = QueryParser::parse("SELECT * FROM people").unwrap();
        let result = evaluate(&query, &table).unwrap();

        match result {
            QueryResult::Rows { column_names, rows } => {
                assert_eq!(column_names, table.schema.columns);
                assert_eq!(rows.len(), 4);
                for (got, expected) in rows.iter().zip(table.rows()) {
                    assert!(matches!(got, Cow::Borrowed(_)));
                    assert_eq!(got.as_ref(), expected);
                }
            }
            QueryResult::Count(_) => panic!("expected rows"),
        }
    }

    #[test]
    fn test_projection_order_follows_request() {
        let executor = QueryExecutor::new(people());
        let result = executor.run("SELECT email, name FROM people").unwrap();

        match result {
            QueryResult::Rows { column_names, rows } => {
                assert_eq!(column_names, vec!["email", "name"]);
                assert_eq!(rows[0].values, vec!["alice@example.com", "Alice"]);
                assert_eq!(rows[1].values, vec!["", "Bob"]);
            }
            QueryResult::Count(_) => panic!("expected rows"),
        }
    }

    #[test]
    fn test_count_star_and_count_column() {
        let executor = QueryExecutor::new(people());

        assert_eq!(
            executor.run("SELECT COUNT(*) FROM people").unwrap(),
            QueryResult::Count(4)
        );
        // Bob's "" and Carol's "NULL" are not counted
        assert_eq!(
            executor.run("SELECT COUNT(email) FROM people").unwrap(),
            QueryResult::Count(2)
        );
        assert_eq!(
            executor
                .run("SELECT COUNT(*) FROM people WHERE age >= 34")
                .unwrap(),
            QueryResult::Count(2)
        );
    }

    #[test]
    fn test_text_literal_never_matches_numeric_cell() {
        let executor = QueryExecutor::new(people());
        let result = executor.run("SELECT name FROM people WHERE age = '34'").unwrap();
        assert!(result.is_empty());

        // The non-numeric cell stays text and can be matched as text
        let result = executor.run("SELECT name FROM people WHERE age = 'n/a'").unwrap();
        assert_eq!(names(&result), vec!["Dave"]);
    }

    #[test]
    fn test_cross_type_comparisons() {
        let executor = QueryExecutor::new(people());

        // "n/a" is text, so it is excluded from every ordering test on a number
        let result = executor.run("SELECT name FROM people WHERE age < 100").unwrap();
        assert_eq!(names(&result), vec!["Alice", "Bob", "Carol"]);

        // ...and is never equal to one
        let result = executor.run("SELECT name FROM people WHERE age != 29").unwrap();
        assert_eq!(names(&result), vec!["Alice", "Carol", "Dave"]);
    }

    #[test]
    fn test_float_literal_against_integer_cells() {
        let executor = QueryExecutor::new(people());
        let result = executor.run("SELECT name FROM people WHERE age <= 34.0").unwrap();
        assert_eq!(names(&result), vec!["Alice", "Bob"]);
    }

    #[test]
    fn test_text_equality() {
        let executor = QueryExecutor::new(people());
        let result = executor.run("SELECT age FROM people WHERE name = 'Bob'").unwrap();
        match result {
            QueryResult::Rows { rows, .. } => assert_eq!(rows[0].values, vec!["29"]),
            QueryResult::Count(_) => panic!("expected rows"),
        }
    }

    #[test]
    fn test_unknown_columns() {
        let executor = QueryExecutor::new(people());

        for sql in [
            "SELECT missing FROM people",
            "SELECT name, missing FROM people",
            "SELECT * FROM people WHERE missing = 1",
            "SELECT COUNT(missing) FROM people",
        ] {
            let err = executor.run(sql).unwrap_err();
            assert!(
                matches!(err, Error::Evaluation(EvaluationError::UnknownColumn(ref c)) if c == "missing"),
                "{}: {}",
                sql,
                err
            );
        }
    }

    #[test]
    fn test_unknown_column_on_empty_table() {
        let table = Table::new("empty", Schema::new(vec!["a".into()]), Vec::new());
        let query = QueryParser::parse("SELECT b FROM empty").unwrap();
        assert_eq!(
            evaluate(&query, &table),
            Err(EvaluationError::UnknownColumn("b".to_string()))
        );
    }

    #[test]
    fn test_parse_errors_surface_through_run() {
        let executor = QueryExecutor::new(people());
        let err = executor.run("DELETE FROM people").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_evaluation_is_repeatable() {
        let table = people();
        let query = QueryParser::parse("SELECT name, age FROM people WHERE age > 30").unwrap();
        assert_eq!(evaluate(&query, &table), evaluate(&query, &table));
    }

    #[test]
    fn test_format_count_and_empty() {
        assert_eq!(QueryResult::Count(7).format(), "7");
        let empty = QueryResult::Rows {
            column_names: vec!["a".into()],
            rows: Vec::new(),
        };
        assert_eq!(empty.format(), "No rows found.");
    }

    #[test]
    fn test_format_table() {
        let executor = QueryExecutor::new(people());
        let output = executor
            .run("SELECT name, age FROM people WHERE name = 'Bob'")
            .unwrap()
            .format();

        let expected = "\
┌──────┬─────┐
│ name │ age │
├──────┼─────┤
│ Bob  │ 29  │
└──────┴─────┘

1 row(s) returned";
        assert_eq!(output, expected);
    }

    #[test]
    fn test_to_json_keeps_column_order() {
        let executor = QueryExecutor::new(people());
        let json = executor
            .run("SELECT name, age FROM people WHERE age > 40")
            .unwrap()
            .to_json();
        assert_eq!(json.to_string(), r#"[{"name":"Carol","age":"41"}]"#);

        let json = executor.run("SELECT COUNT(*) FROM people").unwrap().to_json();
        assert_eq!(json, serde_json::json!({ "count": 4 }));
    }

    #[test]
    fn test_concurrent_queries_share_one_table() {
        let table = people();
        let counts = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| {
                        let query = QueryParser::parse("SELECT COUNT(*) FROM people WHERE age > 30")
                            .unwrap();
                        evaluate(&query, &table).unwrap().len()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect::<Vec<_>>()
        });
        assert_eq!(counts, vec![2, 2, 2, 2]);
    }
}
