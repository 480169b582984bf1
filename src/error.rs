//! Error types for the query engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// The query text does not follow the grammar.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing SELECT")]
    MissingSelect,

    #[error("missing FROM")]
    MissingFrom,

    #[error("malformed COUNT")]
    MalformedCount,

    #[error("empty select list")]
    EmptySelectList,

    #[error("malformed select list: {0}")]
    MalformedSelectList(String),

    #[error("missing table name")]
    MissingTable,

    #[error("unexpected token: {0}")]
    UnexpectedToken(String),

    #[error("malformed WHERE")]
    MalformedWhere,

    #[error("invalid token: {0}")]
    Tokenize(String),
}

/// A well-formed query does not fit the table it runs against.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("unknown column {0}")]
    UnknownColumn(String),
}

/// Reading a table from delimited text failed.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("load error: {0}")]
    Load(#[from] LoadError),
}
