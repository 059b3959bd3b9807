//! WHERE-clause composition.
//!
//! A [`Cond`] is a list of fragments joined with the dialect's AND token,
//! each fragment written with `?` placeholders and carrying its arguments in
//! order.

use sqlbean_core::codec::encode_field;
use sqlbean_core::{CodecConfig, Dialect, Error, FieldInfo, FieldKind, Result, Table, Value};

/// A composable condition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cond {
    parts: Vec<String>,
    args: Vec<Value>,
}

impl Cond {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single fragment.
    pub fn expr(sql: impl Into<String>, args: Vec<Value>) -> Self {
        let mut cond = Self::new();
        cond.push(sql, args);
        cond
    }

    /// AND another fragment onto this condition.
    ///
    /// Fragments containing a top-level `OR` are parenthesized so they keep
    /// their meaning once joined.
    pub fn push(&mut self, sql: impl Into<String>, args: impl IntoIterator<Item = Value>) {
        let sql = sql.into();
        let sql = sql.trim();
        if sql.is_empty() {
            return;
        }
        if contains_or(sql) && !is_wrapped(sql) {
            self.parts.push(format!("({})", sql));
        } else {
            self.parts.push(sql.to_string());
        }
        self.args.extend(args);
    }

    /// AND every fragment of `other` onto this condition.
    pub fn extend(&mut self, other: Cond) {
        self.parts.extend(other.parts);
        self.args.extend(other.args);
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn into_args(self) -> Vec<Value> {
        self.args
    }

    /// Render the fragments joined with the dialect's AND token.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.parts.join(&format!(" {} ", dialect.and_op()))
    }

    /// Combine an explicit and a derived condition as `(explicit) AND (derived)`.
    ///
    /// When only one side is present it is returned unchanged.
    pub fn grouped(explicit: Cond, derived: Cond, dialect: Dialect) -> Cond {
        match (explicit.is_empty(), derived.is_empty()) {
            (_, true) => explicit,
            (true, false) => derived,
            (false, false) => {
                let mut out = Cond::new();
                for group in [explicit, derived] {
                    let sql = group.to_sql(dialect);
                    let sql = if group.parts.len() == 1 && is_wrapped(&sql) {
                        sql
                    } else {
                        format!("({})", sql)
                    };
                    out.parts.push(sql);
                    out.args.extend(group.args);
                }
                out
            }
        }
    }
}

fn contains_or(sql: &str) -> bool {
    sql.to_ascii_lowercase().contains(" or ")
}

/// Whether the whole fragment is enclosed by one pair of parentheses.
fn is_wrapped(sql: &str) -> bool {
    if !(sql.starts_with('(') && sql.ends_with(')')) {
        return false;
    }
    let mut depth = 0_i32;
    for (i, ch) in sql.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 && i != sql.len() - 1 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// A primary-key value, one entry per key column.
#[derive(Debug, Clone, PartialEq)]
pub struct Pk(pub Vec<Value>);

impl Pk {
    pub fn new(values: Vec<Value>) -> Self {
        Pk(values)
    }
}

impl From<i64> for Pk {
    fn from(v: i64) -> Self {
        Pk(vec![Value::BigInt(v)])
    }
}

impl From<i32> for Pk {
    fn from(v: i32) -> Self {
        Pk(vec![Value::from(v)])
    }
}

impl From<u32> for Pk {
    fn from(v: u32) -> Self {
        Pk(vec![Value::from(v)])
    }
}

impl From<&str> for Pk {
    fn from(v: &str) -> Self {
        Pk(vec![Value::from(v)])
    }
}

impl From<String> for Pk {
    fn from(v: String) -> Self {
        Pk(vec![Value::Text(v)])
    }
}

impl From<Value> for Pk {
    fn from(v: Value) -> Self {
        Pk(vec![v])
    }
}

impl From<Vec<Value>> for Pk {
    fn from(v: Vec<Value>) -> Self {
        Pk(v)
    }
}

/// `pk1 = ? AND pk2 = ?` for a primary key; the arity must match the table.
pub fn id_cond<R>(table: &Table<R>, pk: &Pk, dialect: Dialect) -> Result<Cond> {
    let names = table.pk_names();
    if names.len() != pk.0.len() {
        return Err(Error::Param(format!(
            "table '{}' has {} primary key column(s) but {} value(s) were given",
            table.name(),
            names.len(),
            pk.0.len()
        )));
    }
    let mut cond = Cond::new();
    for (name, value) in names.iter().zip(&pk.0) {
        cond.push(
            format!("{} = ?", dialect.quote_identifier(name)),
            [value.clone()],
        );
    }
    Ok(cond)
}

/// `col IN (?, ?, ...)`; an empty list matches nothing.
pub fn in_cond(column: &str, values: &[Value], dialect: Dialect) -> Cond {
    if values.is_empty() {
        return Cond::expr("0 = 1", Vec::new());
    }
    let marks = vec!["?"; values.len()].join(", ");
    Cond::expr(
        format!("{} IN ({})", dialect.quote_identifier(column), marks),
        values.to_vec(),
    )
}

/// The implicit scope hiding soft-deleted rows.
pub fn deleted_scope(column: &FieldInfo, dialect: Dialect) -> String {
    let name = dialect.quote_identifier(column.name);
    if column.sql_type.is_integer() {
        format!("({name} IS NULL OR {name} = 0)")
    } else {
        format!("({name} IS NULL OR {name} = '0001-01-01 00:00:00')")
    }
}

/// Which columns participate in conditions derived from a bean.
#[derive(Debug, Clone, Copy, Default)]
pub struct BeanCondOptions {
    pub include_version: bool,
    pub include_updated: bool,
    pub include_auto_increment: bool,
    /// Non-optional bool fields take part (including `false`)
    pub use_bool: bool,
    /// The soft-delete marker's own value takes part
    pub unscoped: bool,
}

/// `col = ?` for every non-zero field of `bean`.
pub fn bean_conds<R>(
    table: &Table<R>,
    bean: &R,
    opts: &BeanCondOptions,
    config: &CodecConfig,
) -> Result<Cond> {
    let mut cond = Cond::new();
    for column in table.columns() {
        let info = column.info();
        if (info.version && !opts.include_version)
            || (info.updated && !opts.include_updated)
            || (info.auto_increment && !opts.include_auto_increment)
            || (info.deleted && !opts.unscoped)
        {
            continue;
        }
        let value = column.get(bean)?;
        if matches!(info.kind, FieldKind::Bool) && !info.optional {
            if !opts.use_bool {
                continue;
            }
        } else if info.is_zero(&value) {
            continue;
        }
        let arg = encode_field(info, &value, config)?;
        cond.push(
            format!("{} = ?", config.dialect.quote_identifier(info.name)),
            [arg],
        );
    }
    Ok(cond)
}
