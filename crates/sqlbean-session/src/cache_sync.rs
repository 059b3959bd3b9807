//! Keeps the bean cache consistent with writes.
//!
//! Affected primary keys are derived from the statement the builder
//! produced: its WHERE tail is replayed as `SELECT <pk> FROM <table> ...`,
//! answered from the cache's fingerprint index when possible. Keys are
//! captured before the write executes (afterwards the rows may no longer
//! match), and applied once it succeeded:
//!
//! - update: cached beans get the SET assignments patched in place
//! - delete: cached beans are evicted
//! - insert: only the fingerprint index is dropped
//!
//! Any failure along the way degrades to invalidating the whole table and is
//! logged, never returned.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use sqlbean_core::codec::{decode_value, encode_field};
use sqlbean_core::{
    BeanCache, CodecConfig, Connection, DecodeContext, Error, FieldValue, Record, Result, Table,
    Value, fingerprint, pk_string,
};
use sqlbean_query::SqlStatement;

use crate::Session;

/// A change to apply to a cached bean.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    /// `col = ?`
    Set(&'static str, FieldValue),
    /// `col = col + ?`, `col = col - ?` and the version bump
    Add(&'static str, i64),
    /// An assignment that cannot be replayed in memory
    Opaque(String),
}

/// What to do with the cache once the write succeeded.
#[derive(Debug)]
pub(crate) enum CachePlan {
    /// No cache configured
    Skip,
    /// Drop every bean and the fingerprint index of the table
    Invalidate,
    Patch {
        keys: Vec<String>,
        patches: Vec<Patch>,
    },
    Evict {
        keys: Vec<String>,
    },
}

// ============================================================================
// SQL shape parsing
// ============================================================================

type Pattern = OnceLock<std::result::Result<Regex, regex::Error>>;

fn pattern(cell: &'static Pattern, re: &str) -> Result<&'static Regex> {
    cell.get_or_init(|| Regex::new(re))
        .as_ref()
        .map_err(|e| Error::CacheFailed(format!("invalid statement pattern: {e}")))
}

fn update_pattern() -> Result<&'static Regex> {
    static RE: Pattern = OnceLock::new();
    pattern(&RE, r"(?is)^\s*UPDATE\s+(TOP\s*\(\s*\d+\s*\)\s+)?(\S+)\s+SET\s+(.+)$")
}

fn delete_pattern() -> Result<&'static Regex> {
    static RE: Pattern = OnceLock::new();
    pattern(&RE, r"(?is)^\s*DELETE\s+FROM\s+(\S+)(.*)$")
}

/// An UPDATE split into the pieces the synchronizer needs.
#[derive(Debug, PartialEq)]
pub(crate) struct UpdateShape<'a> {
    /// `TOP (n) ` prefix, MSSQL only
    pub top: &'a str,
    pub table: &'a str,
    pub set: &'a str,
    /// Everything after the SET list, starting with a space or empty
    pub tail: &'a str,
}

pub(crate) fn parse_update(sql: &str) -> Result<UpdateShape<'_>> {
    let caps = update_pattern()?
        .captures(sql)
        .ok_or_else(|| Error::CacheFailed(format!("unrecognised UPDATE shape: {sql}")))?;
    let (Some(table), Some(rest)) = (caps.get(2), caps.get(3)) else {
        return Err(Error::CacheFailed(format!("unrecognised UPDATE shape: {sql}")));
    };
    let rest = rest.as_str();
    let split = find_top_level(rest, &[" WHERE ", " ORDER BY ", " LIMIT "]).unwrap_or(rest.len());
    Ok(UpdateShape {
        top: caps.get(1).map_or("", |m| m.as_str()),
        table: table.as_str(),
        set: &rest[..split],
        tail: &rest[split..],
    })
}

/// Table and WHERE tail of a DELETE.
pub(crate) fn parse_delete(sql: &str) -> Result<(&str, &str)> {
    let caps = delete_pattern()?
        .captures(sql)
        .ok_or_else(|| Error::CacheFailed(format!("unrecognised DELETE shape: {sql}")))?;
    match (caps.get(1), caps.get(2)) {
        (Some(table), Some(tail)) => Ok((table.as_str(), tail.as_str())),
        _ => Err(Error::CacheFailed(format!("unrecognised DELETE shape: {sql}"))),
    }
}

/// Byte offset of the first keyword outside quotes and parentheses.
fn find_top_level(s: &str, keywords: &[&str]) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut depth = 0_i32;
    let mut quote: Option<u8> = None;
    for (i, &b) in bytes.iter().enumerate() {
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'\'' | b'"' | b'`' => quote = Some(b),
            b'[' => quote = Some(b']'),
            b'(' => depth += 1,
            b')' => depth -= 1,
            _ if depth == 0 => {
                let hit = keywords.iter().any(|kw| {
                    bytes
                        .get(i..i + kw.len())
                        .is_some_and(|window| window.eq_ignore_ascii_case(kw.as_bytes()))
                });
                if hit {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on a separator outside quotes and parentheses.
fn split_top_level(s: &str, sep: u8) -> Vec<&str> {
    let bytes = s.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0_i32;
    let mut quote: Option<u8> = None;
    let mut start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'\'' | b'"' | b'`' => quote = Some(b),
            b'[' => quote = Some(b']'),
            b'(' => depth += 1,
            b')' => depth -= 1,
            _ if b == sep && depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Number of `?` markers outside quoted text.
fn count_placeholders(s: &str) -> usize {
    let mut quote: Option<char> = None;
    let mut count = 0;
    for ch in s.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None => match ch {
                '\'' | '"' | '`' => quote = Some(ch),
                '[' => quote = Some(']'),
                '?' => count += 1,
                _ => {}
            },
        }
    }
    count
}

fn unquote(ident: &str) -> String {
    ident
        .chars()
        .filter(|c| !matches!(c, '"' | '`' | '[' | ']'))
        .collect::<String>()
        .trim()
        .to_string()
}

fn take<'v>(args: &mut std::slice::Iter<'v, Value>, n: usize) -> Result<Vec<&'v Value>> {
    (0..n)
        .map(|_| {
            args.next()
                .ok_or_else(|| Error::CacheFailed("fewer arguments than placeholders".to_string()))
        })
        .collect()
}

/// Turn a SET list into patches, consuming its arguments in order.
pub(crate) fn parse_assignments<R>(
    table: &Table<R>,
    set: &str,
    args: &[Value],
    config: &CodecConfig,
) -> Result<Vec<Patch>> {
    let ctx = DecodeContext::new(*config);
    let mut args = args.iter();
    let mut patches = Vec::new();
    for assignment in split_top_level(set, b',') {
        let Some((lhs, rhs)) = assignment.split_once('=') else {
            return Err(Error::CacheFailed(format!("unparseable assignment: {assignment}")));
        };
        let name = unquote(lhs);
        let rhs = rhs.trim();
        let Some(column) = table.column(&name) else {
            take(&mut args, count_placeholders(rhs))?;
            patches.push(Patch::Opaque(assignment.trim().to_string()));
            continue;
        };

        let operand = unquote(rhs);
        let patch = if rhs == "?" {
            let arg = take(&mut args, 1)?[0];
            Patch::Set(column.name(), decode_value(column.info(), arg, &ctx)?)
        } else if operand == format!("{} + 1", column.name()) {
            Patch::Add(column.name(), 1)
        } else if operand == format!("{} + ?", column.name()) || operand == format!("{} - ?", column.name()) {
            let sign = if operand.ends_with("- ?") { -1 } else { 1 };
            match take(&mut args, 1)?[0].as_i64() {
                Some(delta) => Patch::Add(column.name(), sign * delta),
                None => Patch::Opaque(assignment.trim().to_string()),
            }
        } else {
            take(&mut args, count_placeholders(rhs))?;
            Patch::Opaque(assignment.trim().to_string())
        };
        patches.push(patch);
    }
    Ok(patches)
}

/// Whether a SET list assigns one of the primary-key columns.
fn assigns_key<R>(table: &Table<R>, set: &str) -> bool {
    let pk_names = table.pk_names();
    split_top_level(set, b',')
        .into_iter()
        .filter_map(|assignment| assignment.split_once('='))
        .any(|(lhs, _)| pk_names.contains(&unquote(lhs).as_str()))
}

/// Apply patches to a bean; `false` when one of them cannot be replayed.
fn apply_patches<R: Record>(bean: &mut R, patches: &[Patch]) -> bool {
    let table = R::table();
    for patch in patches {
        let applied = match patch {
            Patch::Set(name, value) => table
                .column(name)
                .is_some_and(|c| c.set(bean, value.clone()).is_ok()),
            Patch::Add(name, delta) => table.column(name).is_some_and(|c| {
                c.get(bean)
                    .ok()
                    .and_then(|current| add(current, *delta))
                    .is_some_and(|next| c.set(bean, next).is_ok())
            }),
            Patch::Opaque(_) => false,
        };
        if !applied {
            return false;
        }
    }
    true
}

/// `value + delta` for numeric field values.
pub(crate) fn add(value: FieldValue, delta: i64) -> Option<FieldValue> {
    match value {
        FieldValue::Int(v) => v.checked_add(delta).map(FieldValue::Int),
        FieldValue::UInt(v) => v.checked_add_signed(delta).map(FieldValue::UInt),
        #[allow(clippy::cast_precision_loss)]
        FieldValue::Float(v) => Some(FieldValue::Float(v + delta as f64)),
        _ => None,
    }
}

/// Cache key of a primary key, normalised through the key columns' codec so
/// `1`, `"1"` and `1u32` all map to `[1]`.
pub(crate) fn bean_key<R>(table: &Table<R>, values: &[Value], config: &CodecConfig) -> Result<String> {
    let columns = table.pk_columns();
    if columns.len() != values.len() {
        return Err(Error::Param(format!(
            "table '{}' has {} primary key column(s) but {} value(s) were given",
            table.name(),
            columns.len(),
            values.len()
        )));
    }
    let ctx = DecodeContext::new(*config);
    let mut normalised = Vec::with_capacity(values.len());
    for (column, value) in columns.iter().zip(values) {
        let field = decode_value(column.info(), value, &ctx)?;
        normalised.push(encode_field(column.info(), &field, config)?);
    }
    Ok(pk_string(&normalised))
}

// ============================================================================
// Session integration
// ============================================================================

impl<C: Connection> Session<C> {
    fn write_cache(&self, no_cache: bool, patch: bool) -> Option<&Arc<dyn BeanCache>> {
        let cache = self.cache.as_ref()?;
        if no_cache || !patch {
            return None;
        }
        Some(cache)
    }

    /// Primary keys the `SELECT` derived from `select_tail` resolves to.
    fn affected_keys<R: Record>(
        &self,
        cache: &dyn BeanCache,
        table_name: &str,
        select: &str,
        args: &[Value],
    ) -> Result<Vec<String>> {
        if self.in_transaction {
            return Err(Error::CacheFailed("inside a transaction".to_string()));
        }
        let table = R::table();
        let fp = fingerprint(select, args);
        if let Some(ids) = cache.get_ids(table_name, &fp) {
            tracing::debug!(table = table_name, ids = ids.len(), "[cache] fingerprint hit");
            return Ok(ids);
        }

        let rows = self.query_logged(select, args)?;
        let config = self.codec_config();
        let pk_names = table.pk_names();
        let mut ids = Vec::with_capacity(rows.len());
        for row in &rows {
            let values: Vec<Value> = pk_names
                .iter()
                .enumerate()
                .map(|(i, name)| row.get_by_name(name).or_else(|| row.get(i)).cloned().unwrap_or(Value::Null))
                .collect();
            ids.push(bean_key(table, &values, &config)?);
        }
        tracing::debug!(table = table_name, ids = ids.len(), "[cache] keys derived from storage");
        cache.put_ids(table_name, &fp, ids.clone());
        Ok(ids)
    }

    fn pk_select<R: Record>(&self, top: &str, table_sql: &str, tail: &str) -> Result<String> {
        let dialect = self.dialect();
        let pk_names = R::table().pk_names();
        if pk_names.is_empty() {
            return Err(Error::CacheFailed(format!(
                "table '{}' has no primary key",
                R::table().name()
            )));
        }
        let pks: Vec<String> = pk_names.iter().map(|n| dialect.quote_identifier(n)).collect();
        Ok(format!("SELECT {}{} FROM {}{}", top, pks.join(", "), table_sql, tail))
    }

    fn try_prepare_update<R: Record>(
        &self,
        cache: &dyn BeanCache,
        table_name: &str,
        statement: &SqlStatement,
    ) -> Result<CachePlan> {
        let shape = parse_update(&statement.sql)?;
        if assigns_key(R::table(), shape.set) {
            // the bean would move to a key nothing derived
            tracing::debug!(table = table_name, "[cache] primary key reassigned, invalidating table");
            return Ok(CachePlan::Invalidate);
        }
        let head_args = count_placeholders(shape.set);
        let where_args = statement
            .args
            .get(head_args..)
            .ok_or_else(|| Error::CacheFailed("fewer arguments than placeholders".to_string()))?;
        let patches = parse_assignments(
            R::table(),
            shape.set,
            &statement.args[..head_args],
            &self.codec_config(),
        )?;
        let select = self.pk_select::<R>(shape.top, shape.table, shape.tail)?;
        let keys = self.affected_keys::<R>(cache, table_name, &select, where_args)?;
        Ok(CachePlan::Patch { keys, patches })
    }

    fn try_prepare_delete<R: Record>(
        &self,
        cache: &dyn BeanCache,
        table_name: &str,
        statement: &SqlStatement,
    ) -> Result<CachePlan> {
        let (table_sql, tail) = parse_delete(&statement.sql)?;
        let select = self.pk_select::<R>("", table_sql, tail)?;
        let keys = self.affected_keys::<R>(cache, table_name, &select, &statement.args)?;
        Ok(CachePlan::Evict { keys })
    }

    fn fallback(&self, table_name: &str, err: &Error) -> CachePlan {
        tracing::warn!(table = table_name, error = %err, "[cache] synchronisation failed, invalidating table");
        CachePlan::Invalidate
    }

    /// Capture the keys an UPDATE will touch, before it runs.
    pub(crate) fn prepare_update_cache<R: Record>(
        &self,
        no_cache: bool,
        table_name: &str,
        statement: &SqlStatement,
    ) -> CachePlan {
        if self.cache.is_none() {
            return CachePlan::Skip;
        }
        let patch = self.config.cache_update == crate::CacheUpdateStrategy::Patch;
        let Some(cache) = self.write_cache(no_cache, patch) else {
            return CachePlan::Invalidate;
        };
        self.try_prepare_update::<R>(cache.as_ref(), table_name, statement)
            .unwrap_or_else(|e| self.fallback(table_name, &e))
    }

    /// Capture the keys a DELETE (or its soft-delete UPDATE) will touch.
    pub(crate) fn prepare_delete_cache<R: Record>(
        &self,
        no_cache: bool,
        table_name: &str,
        statement: &SqlStatement,
    ) -> CachePlan {
        let Some(cache) = self.write_cache(no_cache, true) else {
            return if self.cache.is_some() {
                CachePlan::Invalidate
            } else {
                CachePlan::Skip
            };
        };
        self.try_prepare_delete::<R>(cache.as_ref(), table_name, statement)
            .unwrap_or_else(|e| self.fallback(table_name, &e))
    }

    /// Apply a prepared plan once the write went through.
    pub(crate) fn finish_cache<R: Record>(&self, table_name: &str, plan: CachePlan) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        match plan {
            CachePlan::Skip => return,
            CachePlan::Invalidate => {
                tracing::debug!(table = table_name, "[cache] invalidating table");
                cache.clear_beans(table_name);
            }
            CachePlan::Patch { keys, patches } => {
                for key in &keys {
                    let Some(cached) = cache.get_bean(table_name, key) else {
                        continue;
                    };
                    let Ok(cached) = cached.downcast::<R>() else {
                        cache.del_bean(table_name, key);
                        continue;
                    };
                    let mut bean = Arc::unwrap_or_clone(cached);
                    if apply_patches(&mut bean, &patches) {
                        tracing::debug!(table = table_name, key = %key, "[cache] patched bean");
                        cache.put_bean(table_name, key, Arc::new(bean));
                    } else {
                        tracing::debug!(table = table_name, key = %key, "[cache] evicting unpatchable bean");
                        cache.del_bean(table_name, key);
                    }
                }
            }
            CachePlan::Evict { keys } => {
                for key in &keys {
                    tracing::debug!(table = table_name, key = %key, "[cache] evicting bean");
                    cache.del_bean(table_name, key);
                }
            }
        }
        cache.clear_ids(table_name);
    }

    /// Inserts only make the fingerprint index stale.
    pub(crate) fn finish_insert_cache(&self, table_name: &str) {
        if let Some(cache) = &self.cache {
            tracing::debug!(table = table_name, "[cache] clearing fingerprint index");
            cache.clear_ids(table_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlbean_core::{SqlType, col};

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Item {
        id: i64,
        name: String,
        stock: u32,
        version: i32,
    }

    impl Record for Item {
        fn table() -> &'static Table<Self> {
            static TABLE: OnceLock<Table<Item>> = OnceLock::new();
            TABLE.get_or_init(|| {
                Table::builder("items")
                    .column(col!(Item, id, SqlType::BigInt).pk())
                    .column(col!(Item, name, SqlType::Text))
                    .column(col!(Item, stock, SqlType::Integer))
                    .column(col!(Item, version, SqlType::Integer).version())
                    .build()
            })
        }
    }

    #[test]
    fn test_parse_update_shapes() {
        let shape = parse_update("UPDATE \"items\" SET \"name\" = ? WHERE \"id\" = ?").unwrap();
        assert_eq!(shape.top, "");
        assert_eq!(shape.table, "\"items\"");
        assert_eq!(shape.set, "\"name\" = ?");
        assert_eq!(shape.tail, " WHERE \"id\" = ?");

        let shape = parse_update("UPDATE `items` SET `name` = ? ORDER BY `id` DESC LIMIT 2").unwrap();
        assert_eq!(shape.tail, " ORDER BY `id` DESC LIMIT 2");

        let shape = parse_update("UPDATE TOP (3) [items] SET [name] = ?").unwrap();
        assert_eq!(shape.top, "TOP (3) ");
        assert_eq!(shape.table, "[items]");
        assert_eq!(shape.tail, "");

        assert!(parse_update("SELECT 1").unwrap_err().is_cache_failure());
    }

    #[test]
    fn test_where_inside_subquery_is_not_top_level() {
        let sql = "UPDATE \"items\" SET \"name\" = (SELECT n FROM t WHERE x = ?) WHERE \"id\" = ?";
        let shape = parse_update(sql).unwrap();
        assert_eq!(shape.set, "\"name\" = (SELECT n FROM t WHERE x = ?)");
        assert_eq!(count_placeholders(shape.set), 1);
    }

    #[test]
    fn test_parse_delete() {
        let (table, tail) = parse_delete("DELETE FROM \"items\" WHERE \"id\" = ?").unwrap();
        assert_eq!(table, "\"items\"");
        assert_eq!(tail, " WHERE \"id\" = ?");
        let (_, tail) = parse_delete("DELETE FROM `items` LIMIT 1").unwrap();
        assert_eq!(tail, " LIMIT 1");
    }

    #[test]
    fn test_placeholders_in_quotes_are_ignored() {
        assert_eq!(count_placeholders("a = ?, b = '?', c = \"?\""), 1);
    }

    #[test]
    fn test_parse_assignments() {
        let config = CodecConfig::default();
        let patches = parse_assignments(
            Item::table(),
            "\"name\" = ?, \"stock\" = \"stock\" - ?, \"version\" = \"version\" + 1, \"note\" = ?",
            &[Value::Text("new".into()), Value::BigInt(2), Value::Text("x".into())],
            &config,
        )
        .unwrap();
        assert_eq!(
            patches,
            vec![
                Patch::Set("name", FieldValue::Text("new".into())),
                Patch::Add("stock", -2),
                Patch::Add("version", 1),
                Patch::Opaque("\"note\" = ?".into()),
            ]
        );
    }

    #[test]
    fn test_assigns_key() {
        assert!(assigns_key(Item::table(), "`name` = ?, `id` = ?"));
        assert!(assigns_key(Item::table(), "\"id\" = \"id\" + ?"));
        assert!(!assigns_key(Item::table(), "`name` = ?, `stock` = `stock` - ?"));
    }

    #[test]
    fn test_apply_patches() {
        let mut item = Item {
            id: 1,
            name: "old".into(),
            stock: 5,
            version: 1,
        };
        let ok = apply_patches(
            &mut item,
            &[
                Patch::Set("name", FieldValue::Text("new".into())),
                Patch::Add("stock", -2),
                Patch::Add("version", 1),
            ],
        );
        assert!(ok);
        assert_eq!(item.name, "new");
        assert_eq!(item.stock, 3);
        assert_eq!(item.version, 2);

        assert!(!apply_patches(&mut item, &[Patch::Opaque("x = now()".into())]));
    }

    #[test]
    fn test_bean_key_normalises() {
        let config = CodecConfig::default();
        let a = bean_key(Item::table(), &[Value::BigInt(7)], &config).unwrap();
        let b = bean_key(Item::table(), &[Value::Text("7".into())], &config).unwrap();
        assert_eq!(a, "[7]");
        assert_eq!(a, b);
        assert!(bean_key(Item::table(), &[], &config).is_err());
    }

    #[test]
    fn test_add() {
        assert_eq!(add(FieldValue::UInt(1), -1), Some(FieldValue::UInt(0)));
        assert_eq!(add(FieldValue::UInt(0), -1), None);
        assert_eq!(add(FieldValue::Text("a".into()), 1), None);
    }
}
