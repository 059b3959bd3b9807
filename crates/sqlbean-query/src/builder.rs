//! Builders for INSERT, UPDATE and DELETE statements.
//!
//! Statements are assembled with uniform `?` placeholders. The session runs
//! them through [`Dialect::filter_sql`] right before execution; the cache
//! synchronizer works on the `?` form.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use sqlbean_core::codec::encode_field;
use sqlbean_core::{
    AutoIncrStrategy, CodecConfig, Dialect, Error, FieldInfo, FieldKind, FieldValue, Result,
    Table, Value,
};

use crate::clause::{order_by_sql, order_limit_sql};
use crate::cond::{BeanCondOptions, Cond, bean_conds, deleted_scope};
use crate::statement::Statement;

/// SQL text with `?` placeholders plus its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub args: Vec<Value>,
}

impl SqlStatement {
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }

    /// Statement text in the dialect's native placeholder form.
    pub fn native_sql(&self, dialect: Dialect) -> String {
        dialect.filter_sql(&self.sql)
    }
}

/// A value computed by the write path that must be copied into the bean
/// once the statement succeeded.
pub type Stamp = (&'static str, FieldValue);

/// Inputs shared by every builder.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    pub stmt: &'a Statement,
    pub config: CodecConfig,
    /// Timestamp for created/updated/deleted columns
    pub now: DateTime<FixedOffset>,
    /// Optimistic versioning is in effect for this operation
    pub check_version: bool,
}

impl BuildContext<'_> {
    fn dialect(&self) -> Dialect {
        self.config.dialect
    }

    fn q(&self, name: &str) -> String {
        self.config.dialect.quote_identifier(name)
    }

    fn use_auto_time(&self) -> bool {
        !self.stmt.no_auto_time
    }

    fn table_sql<R>(&self, table: &Table<R>) -> String {
        self.dialect().quote_table(self.stmt.table_name(table))
    }
}

/// The value an auto-time column receives: a time, or unix seconds for
/// integer fields.
pub fn now_value(info: &FieldInfo, now: DateTime<FixedOffset>) -> FieldValue {
    match info.kind {
        FieldKind::Int => FieldValue::Int(now.timestamp()),
        FieldKind::UInt => FieldValue::UInt(u64::try_from(now.timestamp()).unwrap_or(0)),
        _ => FieldValue::Time(now),
    }
}

/// Follow-up query reading the id Oracle assigned through the table's sequence.
pub fn sequence_query(table_name: &str) -> String {
    format!("SELECT SEQ_{}.currval FROM dual", table_name)
}

// ============================================================================
// INSERT
// ============================================================================

/// A built INSERT plus what to copy back into the bean afterwards.
#[derive(Debug, Clone)]
pub struct InsertPlan {
    pub statement: SqlStatement,
    /// Auto-increment column whose id should be read back
    pub id_column: Option<&'static str>,
    pub strategy: AutoIncrStrategy,
    pub stamps: Vec<Stamp>,
    /// Version column initialised to 1
    pub version: Option<&'static str>,
}

/// Where an inserted column's value comes from.
#[derive(Debug, Clone)]
enum Source {
    Field(usize),
    Now(usize),
    Version(usize),
    Expr(String, String),
}

fn insert_sources<R>(ctx: &BuildContext<'_>, table: &Table<R>, first: &R) -> Result<Vec<Source>> {
    let stmt = ctx.stmt;
    let mut sources = Vec::new();
    for (i, column) in table.columns().iter().enumerate() {
        let info = column.info();
        let name = info.name;
        if info.db_only
            || info.deleted
            || stmt.omits(name)
            || !stmt.includes(name)
            || stmt.exprs.iter().any(|(c, _)| c.eq_ignore_ascii_case(name))
        {
            continue;
        }
        if (info.created || info.updated) && ctx.use_auto_time() {
            sources.push(Source::Now(i));
        } else if info.version && ctx.check_version {
            sources.push(Source::Version(i));
        } else if info.auto_increment && info.is_zero(&column.get(first)?) {
            continue;
        } else {
            sources.push(Source::Field(i));
        }
    }
    for (column, expr) in &stmt.exprs {
        sources.push(Source::Expr(column.clone(), expr.clone()));
    }
    Ok(sources)
}

fn source_columns<R>(ctx: &BuildContext<'_>, table: &Table<R>, sources: &[Source]) -> Vec<String> {
    sources
        .iter()
        .map(|s| match s {
            Source::Field(i) | Source::Now(i) | Source::Version(i) => {
                ctx.q(table.columns()[*i].name())
            }
            Source::Expr(column, _) => ctx.q(column),
        })
        .collect()
}

/// Placeholders (or raw expressions) for one row; arguments go to `args`.
fn row_marks<R>(
    ctx: &BuildContext<'_>,
    table: &Table<R>,
    bean: &R,
    sources: &[Source],
    args: &mut Vec<Value>,
) -> Result<Vec<String>> {
    let mut marks = Vec::with_capacity(sources.len());
    for source in sources {
        match source {
            Source::Field(i) => {
                let column = &table.columns()[*i];
                let info = column.info();
                let value = column.get(bean)?;
                if ctx.stmt.is_nullable(info.name) && info.nullable && info.is_zero(&value) {
                    args.push(Value::Null);
                } else {
                    args.push(encode_field(info, &value, &ctx.config)?);
                }
            }
            Source::Now(i) => {
                let info = table.columns()[*i].info();
                args.push(encode_field(info, &now_value(info, ctx.now), &ctx.config)?);
            }
            Source::Version(_) => args.push(Value::BigInt(1)),
            Source::Expr(_, expr) => {
                marks.push(expr.clone());
                continue;
            }
        }
        marks.push("?".to_string());
    }
    Ok(marks)
}

fn source_stamps<R>(ctx: &BuildContext<'_>, table: &Table<R>, sources: &[Source]) -> Vec<Stamp> {
    sources
        .iter()
        .filter_map(|s| match s {
            Source::Now(i) => {
                let info = table.columns()[*i].info();
                Some((info.name, now_value(info, ctx.now)))
            }
            _ => None,
        })
        .collect()
}

fn source_version<R>(table: &Table<R>, sources: &[Source]) -> Option<&'static str> {
    sources.iter().find_map(|s| match s {
        Source::Version(i) => Some(table.columns()[*i].name()),
        _ => None,
    })
}

/// Build a single-row INSERT.
///
/// Zero-valued auto-increment, DB-only and soft-delete columns are skipped,
/// as are columns filtered out by `cols`/`omit`. Created/updated columns get
/// the current time and the version column starts at 1. Raw expressions
/// replace same-named columns and go last.
pub fn build_insert<R>(ctx: &BuildContext<'_>, table: &Table<R>, bean: &R) -> Result<InsertPlan> {
    let dialect = ctx.dialect();
    let sources = insert_sources(ctx, table, bean)?;
    let columns = source_columns(ctx, table, &sources);
    let mut args = Vec::new();
    let marks = row_marks(ctx, table, bean, &sources, &mut args)?;

    let table_sql = ctx.table_sql(table);
    let id_column = table.auto_increment().map(|c| c.name());
    let strategy = dialect.auto_increment_strategy();

    let output = match (id_column, strategy) {
        (Some(id), AutoIncrStrategy::Output) => format!(" OUTPUT INSERTED.{}", ctx.q(id)),
        _ => String::new(),
    };
    let mut sql = if columns.is_empty() {
        if dialect == Dialect::Mysql {
            format!("INSERT INTO {} VALUES ()", table_sql)
        } else {
            format!("INSERT INTO {}{} DEFAULT VALUES", table_sql, output)
        }
    } else {
        format!(
            "INSERT INTO {} ({}){} VALUES ({})",
            table_sql,
            columns.join(", "),
            output,
            marks.join(", ")
        )
    };
    if let (Some(id), AutoIncrStrategy::Returning) = (id_column, strategy) {
        sql.push_str(&format!(" RETURNING {}", ctx.q(id)));
    }

    Ok(InsertPlan {
        statement: SqlStatement::new(sql, args),
        id_column,
        strategy,
        stamps: source_stamps(ctx, table, &sources),
        version: source_version(table, &sources),
    })
}

/// Build one INSERT for many rows.
///
/// The column set is derived from the first record; every record then
/// supplies exactly those columns. Ids are not read back.
pub fn build_insert_multi<R>(
    ctx: &BuildContext<'_>,
    table: &Table<R>,
    beans: &[R],
) -> Result<InsertPlan> {
    let Some(first) = beans.first() else {
        return Err(Error::Param(
            "multi-row insert needs a non-empty slice of records".to_string(),
        ));
    };
    let dialect = ctx.dialect();
    let sources = insert_sources(ctx, table, first)?;
    let columns = source_columns(ctx, table, &sources).join(", ");
    let table_sql = ctx.table_sql(table);

    let mut args = Vec::new();
    let mut rows = Vec::with_capacity(beans.len());
    for bean in beans {
        rows.push(row_marks(ctx, table, bean, &sources, &mut args)?.join(", "));
    }

    let sql = if sources.is_empty() {
        if dialect != Dialect::Mysql {
            return Err(Error::Param(format!(
                "no columns to insert into '{}'",
                table.name()
            )));
        }
        format!("INSERT INTO {} VALUES {}", table_sql, vec!["()"; rows.len()].join(", "))
    } else if dialect == Dialect::Oracle {
        let mut sql = String::from("INSERT ALL");
        for row in &rows {
            sql.push_str(&format!(" INTO {} ({}) VALUES ({})", table_sql, columns, row));
        }
        sql.push_str(" SELECT 1 FROM DUAL");
        sql
    } else {
        let tuples: Vec<String> = rows.iter().map(|r| format!("({})", r)).collect();
        format!("INSERT INTO {} ({}) VALUES {}", table_sql, columns, tuples.join(", "))
    };

    Ok(InsertPlan {
        statement: SqlStatement::new(sql, args),
        id_column: None,
        strategy: AutoIncrStrategy::LastInsertId,
        stamps: source_stamps(ctx, table, &sources),
        version: source_version(table, &sources),
    })
}

/// Build an INSERT from a column -> value map.
///
/// Auto-time columns missing from the map are filled with the current time.
pub fn build_insert_map<R>(
    ctx: &BuildContext<'_>,
    table: &Table<R>,
    map: &BTreeMap<String, Value>,
) -> Result<SqlStatement> {
    let mut columns = Vec::new();
    let mut marks = Vec::new();
    let mut args = Vec::new();
    for (name, value) in map {
        if ctx.stmt.omits(name) || !ctx.stmt.includes(name) {
            continue;
        }
        columns.push(ctx.q(name));
        marks.push("?".to_string());
        args.push(value.clone());
    }
    if ctx.use_auto_time() {
        for column in table.columns() {
            let info = column.info();
            if (info.created || info.updated) && !map.contains_key(info.name) {
                columns.push(ctx.q(info.name));
                marks.push("?".to_string());
                args.push(encode_field(info, &now_value(info, ctx.now), &ctx.config)?);
            }
        }
    }
    for (column, expr) in &ctx.stmt.exprs {
        columns.push(ctx.q(column));
        marks.push(expr.clone());
    }
    if columns.is_empty() {
        return Err(Error::Param("insert map is empty".to_string()));
    }
    Ok(SqlStatement::new(
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            ctx.table_sql(table),
            columns.join(", "),
            marks.join(", ")
        ),
        args,
    ))
}

// ============================================================================
// UPDATE
// ============================================================================

/// What an UPDATE takes its SET values from.
pub enum UpdateSource<'a, R> {
    /// Non-zero fields of a record (or the `cols` list)
    Bean(&'a R),
    /// Every key, verbatim
    Map(&'a BTreeMap<String, Value>),
}

impl<R> Clone for UpdateSource<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for UpdateSource<'_, R> {}

/// A built UPDATE plus what to copy back into the bean afterwards.
#[derive(Debug, Clone)]
pub struct UpdatePlan {
    pub statement: SqlStatement,
    pub stamps: Vec<Stamp>,
    /// Version column bumped by this statement
    pub version: Option<&'static str>,
}

fn bean_assignments<R>(
    ctx: &BuildContext<'_>,
    table: &Table<R>,
    bean: &R,
    sets: &mut Vec<String>,
    args: &mut Vec<Value>,
) -> Result<()> {
    let stmt = ctx.stmt;
    let explicit = !stmt.cols.is_empty();
    for column in table.columns() {
        let info = column.info();
        let name = info.name;
        let listed = stmt.is_listed(name);
        if info.db_only || stmt.omits(name) || stmt.has_expr_column(name) || (explicit && !listed) {
            continue;
        }
        if (info.version && ctx.check_version) || (info.deleted && !stmt.unscoped) {
            continue;
        }
        if !listed && (info.created || info.auto_increment || (info.updated && ctx.use_auto_time())) {
            continue;
        }

        let value = column.get(bean)?;
        let zero = info.is_zero(&value);
        let arg = if zero && stmt.is_nullable(name) && info.nullable {
            Value::Null
        } else if explicit
            || stmt.all_cols
            || !zero
            || (matches!(info.kind, FieldKind::Bool) && !info.optional)
        {
            encode_field(info, &value, &ctx.config)?
        } else {
            continue;
        };
        sets.push(format!("{} = ?", ctx.q(name)));
        args.push(arg);
    }
    Ok(())
}

/// Build an UPDATE.
///
/// SET assignments come from the source, then the updated-time column,
/// increments, decrements and raw expressions, in that order. The WHERE
/// clause is `(explicit) AND (derived)`, where the derived part comes from
/// `cond_bean` and the soft-delete scope, plus the version check. Without
/// any condition the statement updates every row.
pub fn build_update<R>(
    ctx: &BuildContext<'_>,
    table: &Table<R>,
    source: UpdateSource<'_, R>,
    cond_bean: Option<&R>,
) -> Result<UpdatePlan> {
    let stmt = ctx.stmt;
    let dialect = ctx.dialect();
    let mut sets = Vec::new();
    let mut args = Vec::new();

    match source {
        UpdateSource::Bean(bean) => bean_assignments(ctx, table, bean, &mut sets, &mut args)?,
        UpdateSource::Map(map) => {
            for (name, value) in map {
                if stmt.omits(name) {
                    continue;
                }
                sets.push(format!("{} = ?", ctx.q(name)));
                args.push(value.clone());
            }
        }
    }

    let mut stamps = Vec::new();
    if ctx.use_auto_time() {
        for column in table.updated() {
            let info = column.info();
            let in_map = matches!(source, UpdateSource::Map(map) if map.contains_key(info.name));
            if stmt.is_listed(info.name) || stmt.omits(info.name) || in_map {
                continue;
            }
            let value = now_value(info, ctx.now);
            sets.push(format!("{} = ?", ctx.q(info.name)));
            args.push(encode_field(info, &value, &ctx.config)?);
            stamps.push((info.name, value));
        }
    }
    for (column, value) in &stmt.incr {
        sets.push(format!("{0} = {0} + ?", ctx.q(column)));
        args.push(value.clone());
    }
    for (column, value) in &stmt.decr {
        sets.push(format!("{0} = {0} - ?", ctx.q(column)));
        args.push(value.clone());
    }
    for (column, expr) in &stmt.exprs {
        sets.push(format!("{} = {}", ctx.q(column), expr));
    }
    if sets.is_empty() {
        return Err(Error::NoColumnsToUpdate);
    }

    let explicit = stmt.explicit_cond(table, dialect)?;
    let mut derived = Cond::new();
    if !stmt.no_auto_condition {
        if let Some(cond_bean) = cond_bean {
            let opts = BeanCondOptions {
                include_version: true,
                include_updated: true,
                include_auto_increment: true,
                use_bool: stmt.use_bool,
                unscoped: stmt.unscoped,
            };
            derived = bean_conds(table, cond_bean, &opts, &ctx.config)?;
        }
        if let Some(deleted) = table.deleted() {
            if !stmt.unscoped {
                derived.push(deleted_scope(deleted.info(), dialect), []);
            }
        }
    }
    let mut cond = Cond::grouped(explicit, derived, dialect);

    let mut version = None;
    if let (UpdateSource::Bean(bean), Some(column), true) = (source, table.version(), ctx.check_version) {
        let current = column.get(bean)?;
        cond.push(
            format!("{} = ?", ctx.q(column.name())),
            [encode_field(column.info(), &current, &ctx.config)?],
        );
        sets.push(format!("{0} = {0} + 1", ctx.q(column.name())));
        version = Some(column.name());
    }

    let table_sql = ctx.table_sql(table);
    let set_sql = sets.join(", ");
    let where_sql = cond.to_sql(dialect);
    let where_clause = if where_sql.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_sql)
    };
    args.extend(cond.into_args());

    let sql = match stmt.limit {
        None => {
            let order = if dialect == Dialect::Mysql {
                order_by_sql(&stmt.order, dialect)
            } else {
                String::new()
            };
            format!("UPDATE {} SET {}{}{}", table_sql, set_sql, where_clause, order)
        }
        Some(n) => match dialect {
            Dialect::Mysql => format!(
                "UPDATE {} SET {}{}{}",
                table_sql,
                set_sql,
                where_clause,
                order_limit_sql(&stmt.order, Some(n), dialect)
            ),
            Dialect::Sqlite | Dialect::Postgres => {
                let row_id = physical_row_id(dialect);
                format!(
                    "UPDATE {t} SET {s} WHERE {r} IN (SELECT {r} FROM {t}{w}{o})",
                    t = table_sql,
                    s = set_sql,
                    r = row_id,
                    w = where_clause,
                    o = order_limit_sql(&stmt.order, Some(n), dialect)
                )
            }
            Dialect::Mssql => {
                format!("UPDATE TOP ({}) {} SET {}{}", n, table_sql, set_sql, where_clause)
            }
            Dialect::Oracle => {
                return Err(Error::DialectUnsupported {
                    dialect: dialect.name(),
                    operation: "UPDATE with LIMIT",
                });
            }
        },
    };

    Ok(UpdatePlan {
        statement: SqlStatement::new(sql, args),
        stamps,
        version,
    })
}

fn physical_row_id(dialect: Dialect) -> &'static str {
    if dialect == Dialect::Sqlite {
        "rowid"
    } else {
        "ctid"
    }
}

// ============================================================================
// DELETE
// ============================================================================

/// A built DELETE (or its soft-delete UPDATE) plus the DELETE-shaped
/// statement the cache derives affected keys from.
#[derive(Debug, Clone)]
pub struct DeletePlan {
    pub statement: SqlStatement,
    pub cache_statement: SqlStatement,
    pub stamps: Vec<Stamp>,
}

/// ` WHERE ...` plus ORDER BY / LIMIT handling per dialect.
fn delete_tail(ctx: &BuildContext<'_>, table_sql: &str, where_sql: &str) -> Result<String> {
    let dialect = ctx.dialect();
    let where_clause = if where_sql.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_sql)
    };
    let order_limit = order_limit_sql(&ctx.stmt.order, ctx.stmt.limit, dialect);
    if order_limit.is_empty() {
        return Ok(where_clause);
    }
    match dialect {
        Dialect::Postgres | Dialect::Sqlite => {
            let row_id = physical_row_id(dialect);
            Ok(format!(
                " WHERE {r} IN (SELECT {r} FROM {t}{w}{o})",
                r = row_id,
                t = table_sql,
                w = where_clause,
                o = order_limit
            ))
        }
        Dialect::Mssql => Err(Error::DialectUnsupported {
            dialect: dialect.name(),
            operation: "DELETE with ORDER BY or LIMIT",
        }),
        Dialect::Mysql | Dialect::Oracle => Ok(format!("{}{}", where_clause, order_limit)),
    }
}

/// Build a DELETE.
///
/// Conditions come from the explicit WHERE/id/IN clauses and the bean's
/// non-zero fields. With neither and no row limit the delete is refused.
/// Tables with a soft-delete column get an UPDATE stamping that column
/// instead, unless the statement is unscoped.
pub fn build_delete<R>(ctx: &BuildContext<'_>, table: &Table<R>, bean: &R) -> Result<DeletePlan> {
    let stmt = ctx.stmt;
    let dialect = ctx.dialect();

    let explicit = stmt.explicit_cond(table, dialect)?;
    let derived = if stmt.no_auto_condition {
        Cond::new()
    } else {
        let opts = BeanCondOptions {
            include_version: true,
            include_updated: true,
            include_auto_increment: true,
            use_bool: stmt.use_bool,
            unscoped: stmt.unscoped,
        };
        bean_conds(table, bean, &opts, &ctx.config)?
    };
    if explicit.is_empty() && derived.is_empty() && stmt.limit.is_none() {
        return Err(Error::ConditionRequired);
    }

    let mut cond = Cond::grouped(explicit, derived, dialect);
    let soft = table.deleted().filter(|_| !stmt.unscoped);
    if let Some(deleted) = soft {
        if !stmt.no_auto_condition {
            cond.push(deleted_scope(deleted.info(), dialect), []);
        }
    }

    let table_sql = ctx.table_sql(table);
    let tail = delete_tail(ctx, &table_sql, &cond.to_sql(dialect))?;
    let cond_args = cond.into_args();
    let cache_statement = SqlStatement::new(format!("DELETE FROM {}{}", table_sql, tail), cond_args.clone());

    let Some(deleted) = soft else {
        return Ok(DeletePlan {
            statement: cache_statement.clone(),
            cache_statement,
            stamps: Vec::new(),
        });
    };

    let info = deleted.info();
    tracing::debug!(table = table.name(), column = info.name, "Soft delete rewritten as UPDATE");
    let value = now_value(info, ctx.now);
    let mut args = vec![encode_field(info, &value, &ctx.config)?];
    args.extend(cond_args);
    Ok(DeletePlan {
        statement: SqlStatement::new(
            format!("UPDATE {} SET {} = ?{}", table_sql, ctx.q(info.name), tail),
            args,
        ),
        cache_statement,
        stamps: vec![(info.name, value)],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::OrderBy;
    use crate::cond::Pk;
    use sqlbean_core::{Record, SqlType, col};
    use std::sync::OnceLock;

    #[derive(Debug, Default, Clone)]
    struct Doc {
        id: i64,
        title: String,
        views: i64,
        draft: bool,
        version: i32,
        created_at: DateTime<FixedOffset>,
        updated_at: DateTime<FixedOffset>,
    }

    impl Record for Doc {
        fn table() -> &'static Table<Self> {
            static TABLE: OnceLock<Table<Doc>> = OnceLock::new();
            TABLE.get_or_init(|| {
                Table::builder("docs")
                    .column(col!(Doc, id, SqlType::BigInt).pk().auto_increment())
                    .column(col!(Doc, title, SqlType::VarChar(64)))
                    .column(col!(Doc, views, SqlType::BigInt))
                    .column(col!(Doc, draft, SqlType::Boolean))
                    .column(col!(Doc, version, SqlType::Integer).version())
                    .column(col!(Doc, created_at, SqlType::DateTime).created())
                    .column(col!(Doc, updated_at, SqlType::DateTime).updated())
                    .build()
            })
        }
    }

    #[derive(Debug, Default, Clone)]
    struct Note {
        id: i64,
        body: String,
        deleted_at: Option<DateTime<FixedOffset>>,
    }

    impl Record for Note {
        fn table() -> &'static Table<Self> {
            static TABLE: OnceLock<Table<Note>> = OnceLock::new();
            TABLE.get_or_init(|| {
                Table::builder("notes")
                    .column(col!(Note, id, SqlType::BigInt).pk().auto_increment())
                    .column(col!(Note, body, SqlType::Text))
                    .column(col!(Note, deleted_at, SqlType::DateTime).deleted())
                    .build()
            })
        }
    }

    const NOW: &str = "2024-01-02 03:04:05";

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-01-02T03:04:05+00:00").unwrap()
    }

    fn ctx(stmt: &Statement, dialect: Dialect) -> BuildContext<'_> {
        BuildContext {
            stmt,
            config: CodecConfig {
                dialect,
                ..CodecConfig::default()
            },
            now: now(),
            check_version: !stmt.no_version_check,
        }
    }

    fn doc(title: &str) -> Doc {
        Doc {
            title: title.to_string(),
            ..Doc::default()
        }
    }

    #[test]
    fn insert_postgres_returning() {
        let stmt = Statement::new();
        let plan = build_insert(&ctx(&stmt, Dialect::Postgres), Doc::table(), &doc("a")).unwrap();
        assert_eq!(
            plan.statement.sql,
            "INSERT INTO \"docs\" (\"title\", \"views\", \"draft\", \"version\", \"created_at\", \"updated_at\") \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING \"id\""
        );
        assert_eq!(
            plan.statement.args,
            vec![
                Value::Text("a".into()),
                Value::BigInt(0),
                Value::Bool(false),
                Value::BigInt(1),
                Value::Text(NOW.into()),
                Value::Text(NOW.into()),
            ]
        );
        assert_eq!(plan.id_column, Some("id"));
        assert_eq!(plan.version, Some("version"));
        assert_eq!(
            plan.stamps,
            vec![
                ("created_at", FieldValue::Time(now())),
                ("updated_at", FieldValue::Time(now()))
            ]
        );
        assert_eq!(
            plan.statement.native_sql(Dialect::Postgres),
            "INSERT INTO \"docs\" (\"title\", \"views\", \"draft\", \"version\", \"created_at\", \"updated_at\") \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING \"id\""
        );
    }

    #[test]
    fn insert_mssql_output_and_filters() {
        let mut stmt = Statement::new();
        stmt.cols = vec!["title".into(), "views".into()];
        let plan = build_insert(&ctx(&stmt, Dialect::Mssql), Doc::table(), &doc("a")).unwrap();
        assert_eq!(
            plan.statement.sql,
            "INSERT INTO [docs] ([title], [views]) OUTPUT INSERTED.[id] VALUES (?, ?)"
        );
        assert!(plan.stamps.is_empty());
        assert_eq!(plan.version, None);
    }

    #[test]
    fn insert_with_explicit_id_and_expression() {
        let mut stmt = Statement::new();
        stmt.omit = vec!["created_at".into(), "updated_at".into(), "draft".into()];
        stmt.exprs = vec![("title".into(), "UPPER('x')".into())];
        let mut bean = doc("ignored");
        bean.id = 5;
        let plan = build_insert(&ctx(&stmt, Dialect::Mysql), Doc::table(), &bean).unwrap();
        assert_eq!(
            plan.statement.sql,
            "INSERT INTO `docs` (`id`, `views`, `version`, `title`) VALUES (?, ?, ?, UPPER('x'))"
        );
        assert_eq!(
            plan.statement.args,
            vec![Value::BigInt(5), Value::BigInt(0), Value::BigInt(1)]
        );
    }

    #[test]
    fn insert_without_columns() {
        let mut stmt = Statement::new();
        stmt.cols = vec!["nothing".into()];
        let plan = build_insert(&ctx(&stmt, Dialect::Mysql), Note::table(), &Note::default()).unwrap();
        assert_eq!(plan.statement.sql, "INSERT INTO `notes` VALUES ()");
        let plan = build_insert(&ctx(&stmt, Dialect::Sqlite), Note::table(), &Note::default()).unwrap();
        assert_eq!(plan.statement.sql, "INSERT INTO \"notes\" DEFAULT VALUES");
    }

    #[test]
    fn insert_skips_soft_delete_column() {
        let mut stmt = Statement::new();
        stmt.nullable = vec!["deleted_at".into()];
        stmt.cols = vec!["body".into()];
        let plan = build_insert(&ctx(&stmt, Dialect::Sqlite), Note::table(), &Note::default()).unwrap();
        assert_eq!(plan.statement.sql, "INSERT INTO \"notes\" (\"body\") VALUES (?)");
        assert_eq!(plan.statement.args, vec![Value::Text(String::new())]);
    }

    #[test]
    fn multi_insert_shares_first_row_columns() {
        let stmt = Statement::new();
        let beans = vec![doc("a"), doc("b")];
        let plan = build_insert_multi(&ctx(&stmt, Dialect::Mysql), Doc::table(), &beans).unwrap();
        assert_eq!(
            plan.statement.sql,
            "INSERT INTO `docs` (`title`, `views`, `draft`, `version`, `created_at`, `updated_at`) \
             VALUES (?, ?, ?, ?, ?, ?), (?, ?, ?, ?, ?, ?)"
        );
        assert_eq!(plan.statement.args.len(), 12);
        assert_eq!(plan.statement.args[6], Value::Text("b".into()));
        assert_eq!(plan.id_column, None);
    }

    #[test]
    fn multi_insert_oracle_uses_insert_all() {
        let mut stmt = Statement::new();
        stmt.cols = vec!["title".into()];
        let beans = vec![doc("a"), doc("b")];
        let plan = build_insert_multi(&ctx(&stmt, Dialect::Oracle), Doc::table(), &beans).unwrap();
        assert_eq!(
            plan.statement.sql,
            "INSERT ALL INTO \"docs\" (\"title\") VALUES (?) INTO \"docs\" (\"title\") VALUES (?) SELECT 1 FROM DUAL"
        );
    }

    #[test]
    fn multi_insert_rejects_empty_slice() {
        let stmt = Statement::new();
        let err = build_insert_multi::<Doc>(&ctx(&stmt, Dialect::Mysql), Doc::table(), &[]).unwrap_err();
        assert!(matches!(err, Error::Param(_)));
    }

    #[test]
    fn insert_map_fills_auto_time() {
        let mut stmt = Statement::new();
        stmt.omit = vec!["views".into()];
        let mut map = BTreeMap::new();
        map.insert("title".to_string(), Value::Text("m".into()));
        map.insert("views".to_string(), Value::BigInt(2));
        map.insert("updated_at".to_string(), Value::Null);
        let built = build_insert_map(&ctx(&stmt, Dialect::Sqlite), Doc::table(), &map).unwrap();
        assert_eq!(
            built.sql,
            "INSERT INTO \"docs\" (\"title\", \"updated_at\", \"created_at\") VALUES (?, ?, ?)"
        );
        assert_eq!(
            built.args,
            vec![Value::Text("m".into()), Value::Null, Value::Text(NOW.into())]
        );
    }

    #[test]
    fn update_by_id_with_version() {
        let mut stmt = Statement::new();
        stmt.id = Some(Pk::from(1_i64));
        let mut bean = doc("b");
        bean.version = 3;
        let plan = build_update(
            &ctx(&stmt, Dialect::Postgres),
            Doc::table(),
            UpdateSource::Bean(&bean),
            None,
        )
        .unwrap();
        assert_eq!(
            plan.statement.sql,
            "UPDATE \"docs\" SET \"title\" = ?, \"draft\" = ?, \"updated_at\" = ?, \
             \"version\" = \"version\" + 1 WHERE \"id\" = ? AND \"version\" = ?"
        );
        assert_eq!(
            plan.statement.args,
            vec![
                Value::Text("b".into()),
                Value::Bool(false),
                Value::Text(NOW.into()),
                Value::BigInt(1),
                Value::BigInt(3),
            ]
        );
        assert_eq!(plan.version, Some("version"));
        assert_eq!(plan.stamps, vec![("updated_at", FieldValue::Time(now()))]);
    }

    #[test]
    fn update_with_condition_bean() {
        let mut stmt = Statement::new();
        stmt.where_cond.push("views > ?", [Value::BigInt(10)]);
        let bean = Doc {
            views: 5,
            ..Doc::default()
        };
        let cond = doc("x");
        let mut ctx = ctx(&stmt, Dialect::Postgres);
        ctx.check_version = false;
        let plan = build_update(&ctx, Doc::table(), UpdateSource::Bean(&bean), Some(&cond)).unwrap();
        assert_eq!(
            plan.statement.sql,
            "UPDATE \"docs\" SET \"views\" = ?, \"draft\" = ?, \"updated_at\" = ? \
             WHERE (views > ?) AND (\"title\" = ?)"
        );
        assert_eq!(plan.version, None);
    }

    #[test]
    fn update_incr_with_mysql_limit() {
        let mut stmt = Statement::new();
        stmt.cols = vec!["title".into()];
        stmt.incr = vec![("views".into(), Value::BigInt(2))];
        stmt.decr = vec![("version".into(), Value::BigInt(1))];
        stmt.exprs = vec![("draft".into(), "NOT draft".into())];
        stmt.limit = Some(5);
        stmt.order = vec![OrderBy::desc("id")];
        stmt.no_auto_time = true;
        stmt.no_version_check = true;
        let bean = doc("t");
        let plan = build_update(&ctx(&stmt, Dialect::Mysql), Doc::table(), UpdateSource::Bean(&bean), None)
            .unwrap();
        assert_eq!(
            plan.statement.sql,
            "UPDATE `docs` SET `title` = ?, `views` = `views` + ?, `version` = `version` - ?, \
             `draft` = NOT draft ORDER BY `id` DESC LIMIT 5"
        );
        assert_eq!(
            plan.statement.args,
            vec![Value::Text("t".into()), Value::BigInt(2), Value::BigInt(1)]
        );
    }

    #[test]
    fn update_limit_per_dialect() {
        let mut stmt = Statement::new();
        stmt.cols = vec!["title".into()];
        stmt.limit = Some(2);
        stmt.no_auto_time = true;
        stmt.no_version_check = true;
        stmt.id = Some(Pk::from(4_i64));
        let bean = doc("t");
        let build = |dialect| {
            build_update(&ctx(&stmt, dialect), Doc::table(), UpdateSource::Bean(&bean), None)
        };
        assert_eq!(
            build(Dialect::Sqlite).unwrap().statement.sql,
            "UPDATE \"docs\" SET \"title\" = ? WHERE rowid IN (SELECT rowid FROM \"docs\" WHERE \"id\" = ? LIMIT 2)"
        );
        assert_eq!(
            build(Dialect::Postgres).unwrap().statement.sql,
            "UPDATE \"docs\" SET \"title\" = ? WHERE ctid IN (SELECT ctid FROM \"docs\" WHERE \"id\" = ? LIMIT 2)"
        );
        assert_eq!(
            build(Dialect::Mssql).unwrap().statement.sql,
            "UPDATE TOP (2) [docs] SET [title] = ? WHERE [id] = ?"
        );
        assert!(matches!(
            build(Dialect::Oracle),
            Err(Error::DialectUnsupported { .. })
        ));
    }

    #[test]
    fn update_without_assignments_fails() {
        let mut stmt = Statement::new();
        stmt.omit = vec!["draft".into()];
        stmt.no_auto_time = true;
        stmt.no_version_check = true;
        let bean = Doc::default();
        let err = build_update(&ctx(&stmt, Dialect::Mysql), Doc::table(), UpdateSource::Bean(&bean), None)
            .unwrap_err();
        assert!(matches!(err, Error::NoColumnsToUpdate));
    }

    #[test]
    fn update_map_sets_every_key() {
        let mut stmt = Statement::new();
        stmt.id = Some(Pk::from(1_i64));
        let mut map = BTreeMap::new();
        map.insert("title".to_string(), Value::Text("m".into()));
        map.insert("views".to_string(), Value::BigInt(9));
        let plan =
            build_update::<Doc>(&ctx(&stmt, Dialect::Postgres), Doc::table(), UpdateSource::Map(&map), None)
                .unwrap();
        assert_eq!(
            plan.statement.sql,
            "UPDATE \"docs\" SET \"title\" = ?, \"views\" = ?, \"updated_at\" = ? WHERE \"id\" = ?"
        );
        assert_eq!(plan.version, None);
    }

    #[test]
    fn update_scopes_soft_deleted_rows() {
        let mut stmt = Statement::new();
        stmt.id = Some(Pk::from(1_i64));
        let bean = Note {
            body: "b".into(),
            ..Note::default()
        };
        let plan = build_update(&ctx(&stmt, Dialect::Sqlite), Note::table(), UpdateSource::Bean(&bean), None)
            .unwrap();
        assert_eq!(
            plan.statement.sql,
            "UPDATE \"notes\" SET \"body\" = ? WHERE (\"id\" = ?) AND \
             (\"deleted_at\" IS NULL OR \"deleted_at\" = '0001-01-01 00:00:00')"
        );
    }

    #[test]
    fn delete_requires_condition_or_limit() {
        let mut stmt = Statement::new();
        let err = build_delete(&ctx(&stmt, Dialect::Mysql), Doc::table(), &Doc::default()).unwrap_err();
        assert!(matches!(err, Error::ConditionRequired));

        stmt.limit = Some(1);
        let plan = build_delete(&ctx(&stmt, Dialect::Mysql), Doc::table(), &Doc::default()).unwrap();
        assert_eq!(plan.statement.sql, "DELETE FROM `docs` LIMIT 1");
    }

    #[test]
    fn delete_by_bean_fields() {
        let stmt = Statement::new();
        let bean = Doc {
            id: 7,
            ..Doc::default()
        };
        let plan = build_delete(&ctx(&stmt, Dialect::Postgres), Doc::table(), &bean).unwrap();
        assert_eq!(plan.statement.sql, "DELETE FROM \"docs\" WHERE \"id\" = ?");
        assert_eq!(plan.statement.args, vec![Value::BigInt(7)]);
        assert_eq!(plan.statement, plan.cache_statement);
    }

    #[test]
    fn delete_limit_per_dialect() {
        let mut stmt = Statement::new();
        stmt.limit = Some(2);
        stmt.order = vec![OrderBy::asc("id")];
        let bean = Doc {
            id: 7,
            ..Doc::default()
        };
        let plan = build_delete(&ctx(&stmt, Dialect::Postgres), Doc::table(), &bean).unwrap();
        assert_eq!(
            plan.statement.sql,
            "DELETE FROM \"docs\" WHERE ctid IN (SELECT ctid FROM \"docs\" WHERE \"id\" = ? ORDER BY \"id\" ASC LIMIT 2)"
        );
        let plan = build_delete(&ctx(&stmt, Dialect::Mysql), Doc::table(), &bean).unwrap();
        assert_eq!(
            plan.statement.sql,
            "DELETE FROM `docs` WHERE `id` = ? ORDER BY `id` ASC LIMIT 2"
        );
        assert!(matches!(
            build_delete(&ctx(&stmt, Dialect::Mssql), Doc::table(), &bean),
            Err(Error::DialectUnsupported { .. })
        ));
    }

    #[test]
    fn soft_delete_rewrites_to_update() {
        let stmt = Statement::new();
        let bean = Note {
            id: 3,
            ..Note::default()
        };
        let plan = build_delete(&ctx(&stmt, Dialect::Postgres), Note::table(), &bean).unwrap();
        let scope = "(\"deleted_at\" IS NULL OR \"deleted_at\" = '0001-01-01 00:00:00')";
        assert_eq!(
            plan.statement.sql,
            format!("UPDATE \"notes\" SET \"deleted_at\" = ? WHERE \"id\" = ? AND {scope}")
        );
        assert_eq!(
            plan.statement.args,
            vec![Value::Text(NOW.into()), Value::BigInt(3)]
        );
        assert_eq!(
            plan.cache_statement.sql,
            format!("DELETE FROM \"notes\" WHERE \"id\" = ? AND {scope}")
        );
        assert_eq!(plan.cache_statement.args, vec![Value::BigInt(3)]);
        assert_eq!(plan.stamps, vec![("deleted_at", FieldValue::Time(now()))]);
    }

    #[test]
    fn unscoped_delete_is_physical() {
        let mut stmt = Statement::new();
        stmt.unscoped = true;
        let bean = Note {
            id: 3,
            ..Note::default()
        };
        let plan = build_delete(&ctx(&stmt, Dialect::Postgres), Note::table(), &bean).unwrap();
        assert_eq!(plan.statement.sql, "DELETE FROM \"notes\" WHERE \"id\" = ?");
        assert!(plan.stamps.is_empty());
    }
}
