//! Write-path session for SQLBean.
//!
//! `sqlbean-session` is the **unit-of-work layer**. A [`Session`] wraps one
//! [`Connection`], accumulates statement modifiers between calls, and runs
//! the public write operations end to end: lifecycle hooks, statement
//! building, execution, bean write-back and cache maintenance.
//!
//! # Role In The Architecture
//!
//! - **Write operations**: `insert`, `insert_multi`, `update`, `delete` and
//!   their map-based variants return the number of affected rows.
//! - **Lifecycle hooks**: user closures and declared table hooks run around
//!   every write; after-hooks wait for commit inside a transaction.
//! - **Bean cache**: an optional shared [`BeanCache`] is kept consistent with
//!   writes. Cache trouble never fails a write.
//!
//! # Example
//!
//! ```ignore
//! let mut session = Session::new(conn).with_cache(Arc::new(MemoryCache::default()));
//!
//! let mut hero = Hero { name: "Deadpond".into(), ..Hero::default() };
//! session.insert(&mut hero)?;            // hero.id now set
//!
//! hero.age = 31;
//! session.id(hero.id).update(&mut hero)?;
//!
//! session.begin()?;
//! session.delete(&mut hero)?;
//! session.commit()?;                     // deferred after-delete hooks run here
//! ```

mod cache_sync;
mod delete;
pub mod hooks;
mod insert;
pub mod memory_cache;
mod update;

pub use hooks::DeferredHook;
pub use memory_cache::MemoryCache;

use std::any::Any;
use std::sync::Arc;

use chrono::{FixedOffset, Offset, Timelike, Utc};
use sqlbean_core::codec::decode_row;
use sqlbean_core::error::{TransactionError, TransactionErrorKind};
use sqlbean_core::{
    BeanCache, CascadeLoader, CodecConfig, Connection, DecodeContext, Dialect, Error, ExecResult,
    Record, Result, Row, Value,
};
use sqlbean_query::{
    BuildContext, Closure, Cond, OrderBy, Pk, SqlStatement, Stamp, Statement, deleted_scope,
    id_cond,
};

// ============================================================================
// Session Configuration
// ============================================================================

/// How the cache reacts to an UPDATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheUpdateStrategy {
    /// Drop every cached bean of the table.
    #[default]
    Invalidate,
    /// Patch the affected cached beans with the new values.
    Patch,
}

/// Configuration for Session behavior.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Log every statement and its arguments at `info`.
    pub show_sql: bool,
    /// Zone naive times are written to and read from the database in.
    pub database_tz: FixedOffset,
    /// Zone decoded times and auto-time stamps are expressed in.
    pub local_tz: FixedOffset,
    pub cache_update: CacheUpdateStrategy,
    /// Optimistic versioning for tables with a version column.
    pub check_version: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            show_sql: false,
            database_tz: Utc.fix(),
            local_tz: Utc.fix(),
            cache_update: CacheUpdateStrategy::default(),
            check_version: true,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_show_sql(mut self, value: bool) -> Self {
        self.show_sql = value;
        self
    }

    #[must_use]
    pub fn with_database_tz(mut self, tz: FixedOffset) -> Self {
        self.database_tz = tz;
        self
    }

    #[must_use]
    pub fn with_local_tz(mut self, tz: FixedOffset) -> Self {
        self.local_tz = tz;
        self
    }

    #[must_use]
    pub fn with_cache_update(mut self, strategy: CacheUpdateStrategy) -> Self {
        self.cache_update = strategy;
        self
    }

    #[must_use]
    pub fn with_check_version(mut self, value: bool) -> Self {
        self.check_version = value;
        self
    }
}

// ============================================================================
// Session
// ============================================================================

/// A write session over one connection.
///
/// Modifiers (`cols`, `where_sql`, `limit`, ...) apply to the next write
/// operation only; every operation takes them at entry, so they are reset
/// whether it succeeds or fails.
pub struct Session<C: Connection> {
    conn: C,
    pub(crate) config: SessionConfig,
    pub(crate) cache: Option<Arc<dyn BeanCache>>,
    pub(crate) stmt: Statement,
    pub(crate) in_transaction: bool,
    /// After-hooks queued until commit.
    pub(crate) deferred: Vec<DeferredHook>,
}

impl<C: Connection> std::fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("dialect", &self.conn.dialect())
            .field("config", &self.config)
            .field("cache", &self.cache.is_some())
            .field("stmt", &self.stmt)
            .field("in_transaction", &self.in_transaction)
            .field("deferred", &self.deferred.len())
            .finish()
    }
}

impl<C: Connection> Session<C> {
    /// Create a new session from an existing connection.
    pub fn new(conn: C) -> Self {
        Self::with_config(conn, SessionConfig::default())
    }

    /// Create a new session with custom configuration.
    pub fn with_config(conn: C, config: SessionConfig) -> Self {
        Self {
            conn,
            config,
            cache: None,
            stmt: Statement::new(),
            in_transaction: false,
            deferred: Vec::new(),
        }
    }

    /// Attach a bean cache, typically shared with other sessions.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn BeanCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Get a reference to the underlying connection.
    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn dialect(&self) -> Dialect {
        self.conn.dialect()
    }

    pub fn is_in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Number of after-hooks waiting for commit.
    pub fn deferred_hooks(&self) -> usize {
        self.deferred.len()
    }

    pub(crate) fn codec_config(&self) -> CodecConfig {
        CodecConfig {
            dialect: self.dialect(),
            database_tz: self.config.database_tz,
            local_tz: self.config.local_tz,
        }
    }

    pub(crate) fn build_context<'s>(&self, stmt: &'s Statement) -> BuildContext<'s> {
        let now = Utc::now().with_timezone(&self.config.local_tz);
        BuildContext {
            stmt,
            config: self.codec_config(),
            now: now.with_nanosecond(0).unwrap_or(now),
            check_version: self.config.check_version && !stmt.no_version_check,
        }
    }

    /// Queue for after-hooks: `None` runs them immediately.
    pub(crate) fn hook_queue(&mut self) -> Option<&mut Vec<DeferredHook>> {
        if self.in_transaction {
            Some(&mut self.deferred)
        } else {
            None
        }
    }

    // ========================================================================
    // Statement Modifiers
    // ========================================================================

    /// Only write these columns.
    pub fn cols(&mut self, cols: &[&str]) -> &mut Self {
        self.stmt.cols.extend(cols.iter().map(|c| (*c).to_string()));
        self
    }

    /// Never write these columns.
    pub fn omit(&mut self, cols: &[&str]) -> &mut Self {
        self.stmt.omit.extend(cols.iter().map(|c| (*c).to_string()));
        self
    }

    /// Write NULL instead of the zero value for these nullable columns.
    pub fn nullable(&mut self, cols: &[&str]) -> &mut Self {
        self.stmt.nullable.extend(cols.iter().map(|c| (*c).to_string()));
        self
    }

    /// Update zero-valued fields too.
    pub fn all_cols(&mut self) -> &mut Self {
        self.stmt.all_cols = true;
        self
    }

    /// Let bool fields take part in bean-derived conditions.
    pub fn use_bool(&mut self) -> &mut Self {
        self.stmt.use_bool = true;
        self
    }

    pub fn no_auto_time(&mut self) -> &mut Self {
        self.stmt.no_auto_time = true;
        self
    }

    pub fn no_cache(&mut self) -> &mut Self {
        self.stmt.no_cache = true;
        self
    }

    /// Ignore the soft-delete column: delete physically, match deleted rows.
    pub fn unscoped(&mut self) -> &mut Self {
        self.stmt.unscoped = true;
        self
    }

    pub fn no_auto_condition(&mut self) -> &mut Self {
        self.stmt.no_auto_condition = true;
        self
    }

    pub fn no_version_check(&mut self) -> &mut Self {
        self.stmt.no_version_check = true;
        self
    }

    /// Replace the raw WHERE condition.
    pub fn where_sql(&mut self, sql: &str, args: Vec<Value>) -> &mut Self {
        self.stmt.where_cond = Cond::expr(sql, args);
        self
    }

    /// AND another raw fragment onto the WHERE condition.
    pub fn and_sql(&mut self, sql: &str, args: Vec<Value>) -> &mut Self {
        self.stmt.where_cond.push(sql, args);
        self
    }

    /// Match by primary key.
    pub fn id(&mut self, pk: impl Into<Pk>) -> &mut Self {
        self.stmt.id = Some(pk.into());
        self
    }

    /// `column IN (values...)`
    pub fn in_values(&mut self, column: &str, values: Vec<Value>) -> &mut Self {
        self.stmt.in_conds.push((column.to_string(), values));
        self
    }

    pub fn limit(&mut self, n: u64) -> &mut Self {
        self.stmt.limit = Some(n);
        self
    }

    /// Raw ORDER BY expression.
    pub fn order_by(&mut self, expr: &str) -> &mut Self {
        self.stmt.order.push(OrderBy::Raw(expr.to_string()));
        self
    }

    pub fn asc(&mut self, column: &str) -> &mut Self {
        self.stmt.order.push(OrderBy::asc(column));
        self
    }

    pub fn desc(&mut self, column: &str) -> &mut Self {
        self.stmt.order.push(OrderBy::desc(column));
        self
    }

    /// `column = column + value` on update.
    pub fn incr(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.stmt.incr.push((column.to_string(), value.into()));
        self
    }

    /// `column = column - value` on update.
    pub fn decr(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.stmt.decr.push((column.to_string(), value.into()));
        self
    }

    /// Write a raw SQL expression instead of the field value.
    pub fn set_expr(&mut self, column: &str, expr: &str) -> &mut Self {
        self.stmt.exprs.push((column.to_string(), expr.to_string()));
        self
    }

    /// Override the table name.
    pub fn table(&mut self, name: &str) -> &mut Self {
        self.stmt.table_name = Some(name.to_string());
        self
    }

    /// Run `f` against the bean before the next write.
    pub fn before(&mut self, f: impl Fn(&mut dyn Any) + Send + Sync + 'static) -> &mut Self {
        self.stmt.before.push(Arc::new(f));
        self
    }

    /// Run `f` against the bean after the next write.
    pub fn after(&mut self, f: impl Fn(&mut dyn Any) + Send + Sync + 'static) -> &mut Self {
        self.stmt.after.push(Arc::new(f));
        self
    }

    /// Typed [`before`](Self::before); skipped for beans of other types.
    pub fn before_typed<R: Record>(
        &mut self,
        f: impl Fn(&mut R) + Send + Sync + 'static,
    ) -> &mut Self {
        self.stmt.before.push(typed(f));
        self
    }

    /// Typed [`after`](Self::after); skipped for beans of other types.
    pub fn after_typed<R: Record>(
        &mut self,
        f: impl Fn(&mut R) + Send + Sync + 'static,
    ) -> &mut Self {
        self.stmt.after.push(typed(f));
        self
    }

    // ========================================================================
    // Execution
    // ========================================================================

    pub(crate) fn exec_logged(&self, statement: &SqlStatement) -> Result<ExecResult> {
        let sql = statement.native_sql(self.dialect());
        if self.config.show_sql {
            tracing::info!(sql = %sql, args = ?statement.args, "[SQL]");
        }
        self.conn.exec(&sql, &statement.args)
    }

    /// Run a query written with `?` placeholders.
    pub(crate) fn query_logged(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>> {
        let sql = self.dialect().filter_sql(sql);
        if self.config.show_sql {
            tracing::info!(sql = %sql, args = ?args, "[SQL]");
        }
        self.conn.query(&sql, args)
    }

    // ========================================================================
    // Transaction Management
    // ========================================================================

    /// Begin a transaction. After-hooks are deferred until [`commit`](Self::commit).
    pub fn begin(&mut self) -> Result<()> {
        if self.in_transaction {
            return Err(Error::Transaction(TransactionError {
                kind: TransactionErrorKind::AlreadyStarted,
                message: "a transaction is already open on this session".to_string(),
            }));
        }
        self.conn.begin()?;
        self.in_transaction = true;
        tracing::debug!("Transaction started");
        Ok(())
    }

    /// Commit, then run the deferred after-hooks in registration order.
    ///
    /// Hook errors are logged; the commit has already happened.
    pub fn commit(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Err(not_started("commit"));
        }
        self.conn.commit()?;
        self.in_transaction = false;

        let deferred = std::mem::take(&mut self.deferred);
        tracing::debug!(hooks = deferred.len(), "Transaction committed");
        for hook in deferred {
            let (table, phase) = (hook.table, hook.phase);
            if let Err(e) = hook.run() {
                tracing::warn!(table = table, phase = ?phase, error = %e, "Deferred hook failed after commit");
            }
        }
        Ok(())
    }

    /// Roll back and discard the deferred after-hooks.
    pub fn rollback(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Err(not_started("rollback"));
        }
        self.in_transaction = false;
        let discarded = std::mem::take(&mut self.deferred).len();
        tracing::debug!(discarded_hooks = discarded, "Transaction rolled back");
        self.conn.rollback()
    }

    // ========================================================================
    // Read Path
    // ========================================================================

    /// Load a record by primary key.
    ///
    /// Served from the cache when possible. Related fields are cascade-loaded
    /// one level deep.
    ///
    /// Inside a transaction the cache is neither read nor filled: rows seen
    /// there may be uncommitted.
    #[tracing::instrument(level = "debug", skip(self, pk), fields(table = R::table().name()))]
    pub fn get<R: Record>(&mut self, pk: impl Into<Pk>) -> Result<Option<R>> {
        let stmt = self.stmt.take();
        let table = R::table();
        let dialect = self.dialect();
        let config = self.codec_config();
        let table_name = stmt.table_name(table).to_string();
        let pk = pk.into();

        let cache = self
            .cache
            .clone()
            .filter(|_| !stmt.no_cache && !self.in_transaction);
        let key = match &cache {
            Some(_) => Some(cache_sync::bean_key(table, &pk.0, &config)?),
            None => None,
        };
        if let (Some(cache), Some(key)) = (&cache, &key) {
            let hit = cache
                .get_bean(&table_name, key)
                .and_then(|b| b.downcast::<R>().ok());
            if let Some(bean) = hit {
                tracing::debug!(table = %table_name, key = %key, "[cache] bean hit");
                return Ok(Some(Arc::unwrap_or_clone(bean)));
            }
        }

        let mut cond = id_cond(table, &pk, dialect)?;
        if let Some(deleted) = table.deleted() {
            if !stmt.unscoped {
                cond.push(deleted_scope(deleted.info(), dialect), []);
            }
        }
        let sql = format!(
            "SELECT * FROM {} WHERE {}",
            dialect.quote_table(&table_name),
            cond.to_sql(dialect)
        );
        let rows = self.query_logged(&sql, cond.args())?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let ctx = DecodeContext::with_loader(config, &*self);
        let bean: R = decode_row(row, &ctx)?;

        if let (Some(cache), Some(key)) = (cache, key) {
            tracing::debug!(table = %table_name, key = %key, "[cache] storing bean");
            cache.put_bean(&table_name, &key, Arc::new(bean.clone()));
        }
        Ok(Some(bean))
    }
}

impl<C: Connection> CascadeLoader for Session<C> {
    fn load_row(&self, table: &str, pk_column: &str, key: Value) -> Result<Option<Row>> {
        let dialect = self.dialect();
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?",
            dialect.quote_table(table),
            dialect.quote_identifier(pk_column)
        );
        Ok(self.query_logged(&sql, &[key])?.into_iter().next())
    }
}

fn typed<R: Record>(f: impl Fn(&mut R) + Send + Sync + 'static) -> Closure {
    Arc::new(move |bean: &mut dyn Any| {
        if let Some(bean) = bean.downcast_mut::<R>() {
            f(bean);
        }
    })
}

fn not_started(operation: &str) -> Error {
    Error::Transaction(TransactionError {
        kind: TransactionErrorKind::NotStarted,
        message: format!("{operation} called with no open transaction"),
    })
}

/// Copy builder-computed values (auto-time stamps) into the bean.
pub(crate) fn apply_stamps<R: Record>(bean: &mut R, stamps: &[Stamp]) -> Result<()> {
    let table = R::table();
    for (name, value) in stamps {
        if let Some(column) = table.column(name).filter(|c| c.is_settable()) {
            column.set(bean, value.clone())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_defaults() {
        let config = SessionConfig::default();
        assert!(!config.show_sql);
        assert!(config.check_version);
        assert_eq!(config.cache_update, CacheUpdateStrategy::Invalidate);
        assert_eq!(config.database_tz.local_minus_utc(), 0);
    }

    #[test]
    fn test_session_config_builders() {
        let tz = FixedOffset::east_opt(8 * 3600).unwrap();
        let config = SessionConfig::new()
            .with_show_sql(true)
            .with_local_tz(tz)
            .with_cache_update(CacheUpdateStrategy::Patch)
            .with_check_version(false);
        assert!(config.show_sql);
        assert_eq!(config.local_tz, tz);
        assert_eq!(config.database_tz.local_minus_utc(), 0);
        assert_eq!(config.cache_update, CacheUpdateStrategy::Patch);
        assert!(!config.check_version);
    }
}
