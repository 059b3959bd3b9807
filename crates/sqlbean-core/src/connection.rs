//! The executor abstraction the session writes through.
//!
//! Connection acquisition, pooling and statement preparation live in the
//! drivers; the write path only needs blocking `exec`/`query` calls plus
//! transaction control.

use crate::dialect::Dialect;
use crate::error::Result;
use crate::row::Row;
use crate::value::Value;

/// Outcome of a statement that does not return rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecResult {
    /// Rows changed by the statement.
    pub rows_affected: u64,
    /// Driver-reported id of the last inserted row, if the driver has one.
    pub last_insert_id: Option<i64>,
}

impl ExecResult {
    pub const fn new(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            last_insert_id: None,
        }
    }

    pub const fn with_last_insert_id(mut self, id: i64) -> Self {
        self.last_insert_id = Some(id);
        self
    }
}

/// A database connection.
///
/// All calls block until the database answers. SQL text arrives already
/// run through [`Dialect::filter_sql`], so placeholders are in the
/// database's native form.
pub trait Connection: Send + Sync {
    /// The dialect statements for this connection are generated in.
    fn dialect(&self) -> Dialect;

    /// Execute a statement that does not return rows.
    fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecResult>;

    /// Execute a query and return all rows.
    fn query(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>>;

    /// Begin a transaction.
    fn begin(&self) -> Result<()>;

    /// Commit the open transaction.
    fn commit(&self) -> Result<()>;

    /// Roll back the open transaction.
    fn rollback(&self) -> Result<()>;
}
