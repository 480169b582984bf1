// SQL Parser
// This module converts query strings into structured queries
// The sqlparser tokenizer does the lexing (quoted strings, operators, numbers);
// the grammar itself is small enough to match by hand

use crate::error::ParseError;
use crate::storage::Value;
use log::debug;
use serde::Serialize;
use sqlparser::dialect::GenericDialect;
use sqlparser::tokenizer::{Token, Tokenizer, Whitespace, Word};
use std::fmt;

/// A parsed query, ready to be evaluated
/// SELECT <projection> | COUNT(<target>) FROM <table_name> [WHERE <filter>]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Query {
    pub kind: QueryKind,
    /// Not checked against anything at parse time
    pub table_name: String,
    pub filter: Option<Condition>,
}

/// What the query produces
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum QueryKind {
    /// SELECT * | SELECT col1, col2, ...
    Select(Projection),
    /// SELECT COUNT(*) | SELECT COUNT(col)
    Count(CountTarget),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Projection {
    /// `*`
    All,
    Columns(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CountTarget {
    /// `COUNT(*)`
    AllRows,
    /// `COUNT(col)`: rows whose cell is not an empty marker
    Column(String),
}

/// Represents a WHERE clause (only a single condition is supported)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    pub column: String,
    pub operator: Operator,
    pub value: Value,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.column, self.operator, self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    GtEq,
    #[serde(rename = "<=")]
    LtEq,
}

impl Operator {
    fn from_token(token: &Token) -> Option<Self> {
        match token {
            Token::Eq => Some(Operator::Eq),
            // The tokenizer reads both `!=` and `<>` as Neq
            Token::Neq => Some(Operator::NotEq),
            Token::Gt => Some(Operator::Gt),
            Token::Lt => Some(Operator::Lt),
            Token::GtEq => Some(Operator::GtEq),
            Token::LtEq => Some(Operator::LtEq),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::GtEq => ">=",
            Operator::LtEq => "<=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A token that is not blank space, with its position in the full token list
/// The position lets the WHERE literal be rebuilt exactly as it was written.
/// Comment tokens count as significant: the query language has no comments, so `--`
/// and `/* */` are either part of a WHERE literal or an error.
type Significant<'a> = (usize, &'a Token);

/// The query parser
pub struct QueryParser;

impl QueryParser {
    /// Parse a query string into a Query
    /// This is the main entry point for parsing
    pub fn parse(sql: &str) -> Result<Query, ParseError> {
        // A single trailing semicolon is allowed
        let sql = sql.trim();
        let sql = sql.strip_suffix(';').unwrap_or(sql);

        // Quoted strings keep their text as written: no escape processing
        let dialect = GenericDialect {};
        let tokens = Tokenizer::new(&dialect, sql)
            .with_unescape(false)
            .tokenize()
            .map_err(|e| ParseError::Tokenize(e.to_string()))?;

        let significant: Vec<Significant> = tokens
            .iter()
            .enumerate()
            .filter(|(_, token)| !is_blank(token))
            .collect();

        match significant.first() {
            Some((_, token)) if is_keyword(token, "SELECT") => {}
            _ => return Err(ParseError::MissingSelect),
        }

        let from_index = significant
            .iter()
            .position(|(_, token)| is_keyword(token, "FROM"))
            .ok_or(ParseError::MissingFrom)?;

        let select_list: Vec<&Token> = significant[1..from_index]
            .iter()
            .map(|(_, token)| *token)
            .collect();
        let kind = Self::parse_select_list(&select_list)?;

        let after_from = &significant[from_index + 1..];
        let (table_name, consumed) = Self::parse_table_name(after_from)?;

        let filter = match &after_from[consumed..] {
            [] => None,
            [(_, token), condition @ ..] if is_keyword(token, "WHERE") => {
                Some(Self::parse_condition(&tokens, condition)?)
            }
            [(_, token), ..] => return Err(ParseError::UnexpectedToken(token.to_string())),
        };

        let query = Query {
            kind,
            table_name,
            filter,
        };
        debug!("Parsed {:?} into {:?}", sql, query);
        Ok(query)
    }

    /// Helper: Parse the tokens between SELECT and FROM
    fn parse_select_list(tokens: &[&Token]) -> Result<QueryKind, ParseError> {
        match tokens {
            [] => Err(ParseError::EmptySelectList),
            [first, rest @ ..] if is_keyword(first, "COUNT") => {
                Self::parse_count_target(rest).map(QueryKind::Count)
            }
            [Token::Mul] => Ok(QueryKind::Select(Projection::All)),
            _ => {
                let columns = tokens
                    .split(|token| matches!(token, Token::Comma))
                    .map(|item| match item {
                        [Token::Word(word)] => Ok(word.value.clone()),
                        [] => Err(ParseError::MalformedSelectList(
                            "empty column name".to_string(),
                        )),
                        other => Err(ParseError::MalformedSelectList(join_tokens(other))),
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(QueryKind::Select(Projection::Columns(columns)))
            }
        }
    }

    /// Helper: Parse `( * )` or `( column )` after COUNT
    fn parse_count_target(tokens: &[&Token]) -> Result<CountTarget, ParseError> {
        match tokens {
            [Token::LParen, Token::Mul, Token::RParen] => Ok(CountTarget::AllRows),
            [Token::LParen, Token::Word(word), Token::RParen] => {
                Ok(CountTarget::Column(word.value.clone()))
            }
            _ => Err(ParseError::MalformedCount),
        }
    }

    /// Helper: Extract the table name that follows FROM
    /// Returns the name and how many tokens it used; `a.b` names are joined with '.'
    fn parse_table_name(tokens: &[Significant]) -> Result<(String, usize), ParseError> {
        let mut parts = Vec::new();

        match tokens.first() {
            Some((_, Token::Word(word))) if !is_keyword_word(word, "WHERE") => {
                parts.push(word.value.clone())
            }
            _ => return Err(ParseError::MissingTable),
        }

        let mut consumed = 1;
        while let [(_, Token::Period), (_, Token::Word(word)), ..] = &tokens[consumed..] {
            parts.push(word.value.clone());
            consumed += 2;
        }

        Ok((parts.join("."), consumed))
    }

    /// Helper: Parse WHERE clause
    /// We only support a single condition: column <op> literal
    fn parse_condition(
        all_tokens: &[Token],
        condition: &[Significant],
    ) -> Result<Condition, ParseError> {
        let (column, operator, literal) = match condition {
            [(_, Token::Word(word)), (_, op), literal @ ..] if !literal.is_empty() => {
                let operator = Operator::from_token(op).ok_or(ParseError::MalformedWhere)?;
                (word.value.clone(), operator, literal)
            }
            _ => return Err(ParseError::MalformedWhere),
        };

        let value = match literal {
            [(_, Token::SingleQuotedString(text))] => Value::Text(text.clone()),
            [(start, _), ..] => {
                let end = literal[literal.len() - 1].0;
                // Rebuild the literal from the original tokens, whitespace included
                let raw: String = all_tokens[*start..=end]
                    .iter()
                    .map(|token| token.to_string())
                    .collect();
                Value::from_literal(raw.trim())
            }
            [] => return Err(ParseError::MalformedWhere),
        };

        Ok(Condition {
            column,
            operator,
            value,
        })
    }
}

fn is_blank(token: &Token) -> bool {
    matches!(
        token,
        Token::Whitespace(Whitespace::Space | Whitespace::Newline | Whitespace::Tab) | Token::EOF
    )
}

/// Unquoted word matching a keyword, ignoring case
fn is_keyword(token: &Token, keyword: &str) -> bool {
    matches!(token, Token::Word(word) if is_keyword_word(word, keyword))
}

fn is_keyword_word(word: &Word, keyword: &str) -> bool {
    word.quote_style.is_none() && word.value.eq_ignore_ascii_case(keyword)
}

fn join_tokens(tokens: &[&Token]) -> String {
    tokens
        .iter()
        .map(|token| token.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
