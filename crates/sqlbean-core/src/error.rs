//! Error types for SQLBean operations.

use std::fmt;

/// The primary error type for all SQLBean operations.
#[derive(Debug)]
pub enum Error {
    /// Statement execution errors reported by the connection
    Query(QueryError),
    /// A value was present but malformed for the target field
    Type(TypeError),
    /// The codec cannot represent a field kind for the given column
    Unsupported(UnsupportedError),
    /// Wrong argument shape (empty batch, primary key arity mismatch, ...)
    Param(String),
    /// DELETE without any condition or row limit
    ConditionRequired,
    /// UPDATE produced an empty SET clause
    NoColumnsToUpdate,
    /// Cache participation failed; never fatal to the write itself
    CacheFailed(String),
    /// The dialect cannot express the requested statement
    DialectUnsupported {
        dialect: &'static str,
        operation: &'static str,
    },
    /// A cascaded related record could not be found by primary key
    CascadeNotFound { table: String, key: String },
    /// Transaction errors
    Transaction(TransactionError),
    /// Serialization/deserialization errors
    Serde(String),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Syntax error in SQL
    Syntax,
    /// Constraint violation (unique, foreign key, etc.)
    Constraint,
    /// Table or column not found
    NotFound,
    /// Other database error
    Database,
}

/// Conversion failure for a single field.
#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

#[derive(Debug)]
pub struct UnsupportedError {
    pub column: String,
    pub kind: String,
    pub sql_type: String,
}

#[derive(Debug)]
pub struct TransactionError {
    pub kind: TransactionErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionErrorKind {
    /// begin() while a transaction is open
    AlreadyStarted,
    /// commit()/rollback() with no open transaction
    NotStarted,
}

impl Error {
    /// Build a conversion error naming the column and the offending raw value.
    pub fn conversion(
        column: impl Into<String>,
        expected: &'static str,
        actual: impl Into<String>,
    ) -> Self {
        Error::Type(TypeError {
            expected,
            actual: actual.into(),
            column: Some(column.into()),
        })
    }

    pub fn unsupported(
        column: impl Into<String>,
        kind: impl Into<String>,
        sql_type: impl Into<String>,
    ) -> Self {
        Error::Unsupported(UnsupportedError {
            column: column.into(),
            kind: kind.into(),
            sql_type: sql_type.into(),
        })
    }

    /// Is this the non-fatal cache failure signal?
    pub fn is_cache_failure(&self) -> bool {
        matches!(self, Error::CacheFailed(_))
    }

    /// Is this a value conversion error?
    pub fn is_conversion(&self) -> bool {
        matches!(self, Error::Type(_))
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            _ => None,
        }
    }

    /// Attach a column name to a conversion error that does not carry one yet.
    #[must_use]
    pub fn with_column(self, column: &str) -> Self {
        match self {
            Error::Type(mut te) if te.column.is_none() => {
                te.column = Some(column.to_string());
                Error::Type(te)
            }
            e => e,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Query(e) => write!(f, "Query error: {}", e.message),
            Error::Type(e) => write!(f, "Type error: {}", e),
            Error::Unsupported(e) => write!(f, "Unsupported type: {}", e),
            Error::Param(msg) => write!(f, "Parameter error: {}", msg),
            Error::ConditionRequired => {
                write!(f, "Delete action needs at least one condition or a row limit")
            }
            Error::NoColumnsToUpdate => write!(f, "No content found to be updated"),
            Error::CacheFailed(msg) => write!(f, "Cache failed: {}", msg),
            Error::DialectUnsupported { dialect, operation } => {
                write!(f, "{} is not supported by the {} dialect", operation, dialect)
            }
            Error::CascadeNotFound { table, key } => {
                write!(f, "cascade object does not exist: {} {}", table, key)
            }
            Error::Transaction(e) => write!(f, "Transaction error: {}", e.message),
            Error::Serde(msg) => write!(f, "Serialization error: {}", msg),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Query(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for UnsupportedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "column '{}' of kind {} cannot be stored as {}",
            self.column, self.kind, self.sql_type
        )
    }
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<TransactionError> for Error {
    fn from(err: TransactionError) -> Self {
        Error::Transaction(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err.to_string())
    }
}

/// Result type alias for SQLBean operations.
pub type Result<T> = std::result::Result<T, Error>;
