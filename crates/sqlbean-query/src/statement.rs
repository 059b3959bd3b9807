//! Per-session statement context.
//!
//! Modifiers such as `cols`, `omit`, `where_sql` or `limit` accumulate here
//! between operations. The session takes the whole context at the start of
//! each write operation, so the next operation always starts from defaults
//! whether or not the previous one succeeded.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use sqlbean_core::{Dialect, Result, Table, Value};

use crate::clause::OrderBy;
use crate::cond::{Cond, Pk, id_cond, in_cond};

/// A user closure run against the bean before or after a write.
pub type Closure = Arc<dyn Fn(&mut dyn Any) + Send + Sync>;

/// Accumulated modifiers for the next write operation.
#[derive(Clone, Default)]
pub struct Statement {
    /// Table name override
    pub table_name: Option<String>,
    /// Explicit include list
    pub cols: Vec<String>,
    /// Exclude list
    pub omit: Vec<String>,
    /// Columns written as NULL when zero-valued
    pub nullable: Vec<String>,
    /// Update zero-valued fields too
    pub all_cols: bool,
    /// Bool fields take part in bean-derived conditions
    pub use_bool: bool,
    pub no_auto_time: bool,
    pub no_cache: bool,
    /// Bypass the soft-delete rewrite and scope
    pub unscoped: bool,
    pub no_auto_condition: bool,
    pub no_version_check: bool,
    /// Raw WHERE fragments
    pub where_cond: Cond,
    /// Primary-key condition
    pub id: Option<Pk>,
    /// `col IN (...)` conditions
    pub in_conds: Vec<(String, Vec<Value>)>,
    pub limit: Option<u64>,
    pub order: Vec<OrderBy>,
    /// `col = col + ?`
    pub incr: Vec<(String, Value)>,
    /// `col = col - ?`
    pub decr: Vec<(String, Value)>,
    /// `col = <expr>`
    pub exprs: Vec<(String, String)>,
    pub before: Vec<Closure>,
    pub after: Vec<Closure>,
}

impl fmt::Debug for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("table_name", &self.table_name)
            .field("cols", &self.cols)
            .field("omit", &self.omit)
            .field("where_cond", &self.where_cond)
            .field("id", &self.id)
            .field("limit", &self.limit)
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .finish_non_exhaustive()
    }
}

fn contains(list: &[String], name: &str) -> bool {
    list.iter().any(|c| c.eq_ignore_ascii_case(name))
}

impl Statement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the accumulated context, leaving defaults behind.
    pub fn take(&mut self) -> Statement {
        std::mem::take(self)
    }

    /// Whether `name` passes the include list (an empty list includes all).
    pub fn includes(&self, name: &str) -> bool {
        self.cols.is_empty() || contains(&self.cols, name)
    }

    /// Whether `name` was listed explicitly with `cols`.
    pub fn is_listed(&self, name: &str) -> bool {
        contains(&self.cols, name)
    }

    pub fn omits(&self, name: &str) -> bool {
        contains(&self.omit, name)
    }

    pub fn is_nullable(&self, name: &str) -> bool {
        contains(&self.nullable, name)
    }

    /// Whether an incr/decr/expression assignment targets `name`.
    pub fn has_expr_column(&self, name: &str) -> bool {
        self.incr.iter().any(|(c, _)| c.eq_ignore_ascii_case(name))
            || self.decr.iter().any(|(c, _)| c.eq_ignore_ascii_case(name))
            || self.exprs.iter().any(|(c, _)| c.eq_ignore_ascii_case(name))
    }

    /// Table name to write to.
    pub fn table_name<'a, R>(&'a self, table: &'a Table<R>) -> &'a str {
        self.table_name.as_deref().unwrap_or(table.name())
    }

    /// The caller's explicit conditions: raw WHERE, id and IN clauses.
    pub fn explicit_cond<R>(&self, table: &Table<R>, dialect: Dialect) -> Result<Cond> {
        let mut cond = self.where_cond.clone();
        if let Some(pk) = &self.id {
            cond.extend(id_cond(table, pk, dialect)?);
        }
        for (column, values) in &self.in_conds {
            cond.extend(in_cond(column, values, dialect));
        }
        Ok(cond)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_resets() {
        let mut stmt = Statement::new();
        stmt.cols.push("name".into());
        stmt.limit = Some(2);
        stmt.after.push(Arc::new(|_: &mut dyn Any| {}));
        let taken = stmt.take();
        assert_eq!(taken.limit, Some(2));
        assert_eq!(taken.after.len(), 1);
        assert!(stmt.cols.is_empty());
        assert!(stmt.limit.is_none());
        assert!(stmt.after.is_empty());
    }

    #[test]
    fn test_column_filters() {
        let mut stmt = Statement::new();
        assert!(stmt.includes("anything"));
        stmt.cols.push("Name".into());
        stmt.omit.push("age".into());
        stmt.incr.push(("score".into(), Value::BigInt(1)));
        assert!(stmt.includes("name"));
        assert!(!stmt.includes("age"));
        assert!(stmt.omits("AGE"));
        assert!(stmt.has_expr_column("score"));
        assert!(!stmt.has_expr_column("name"));
    }
}
