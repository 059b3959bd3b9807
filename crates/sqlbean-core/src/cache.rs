//! The bean cache contract.
//!
//! A bean cache holds two kinds of entries per table: bean snapshots keyed by
//! their stringified primary key, and a fingerprint index mapping a query
//! (SQL text plus arguments) to the primary keys it resolved to.
//! Implementations synchronise internally; a single cache is typically shared
//! by many sessions through an `Arc`.

use std::any::Any;
use std::sync::Arc;

use crate::value::Value;

/// A cached bean snapshot. Readers downcast to the record type.
pub type CachedBean = Arc<dyn Any + Send + Sync>;

pub trait BeanCache: Send + Sync {
    /// Primary keys a query fingerprint is known to resolve to.
    fn get_ids(&self, table: &str, fingerprint: &str) -> Option<Vec<String>>;

    fn put_ids(&self, table: &str, fingerprint: &str, ids: Vec<String>);

    /// Drop the whole fingerprint index of a table.
    fn clear_ids(&self, table: &str);

    fn get_bean(&self, table: &str, key: &str) -> Option<CachedBean>;

    fn put_bean(&self, table: &str, key: &str, bean: CachedBean);

    fn del_bean(&self, table: &str, key: &str);

    /// Drop every bean of a table.
    fn clear_beans(&self, table: &str);
}

/// Stringify primary-key values: a JSON array such as `[1]` or `["a",2]`.
pub fn pk_string(values: &[Value]) -> String {
    serde_json::Value::Array(values.iter().map(Value::to_json).collect()).to_string()
}

/// Fingerprint of a query: SQL text plus its JSON-encoded arguments.
pub fn fingerprint(sql: &str, args: &[Value]) -> String {
    format!("{}-{}", sql, pk_string(args))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pk_string() {
        assert_eq!(pk_string(&[Value::BigInt(1)]), "[1]");
        assert_eq!(
            pk_string(&[Value::Text("a".into()), Value::BigInt(2)]),
            r#"["a",2]"#
        );
    }

    #[test]
    fn test_fingerprint_includes_args() {
        let a = fingerprint("SELECT id FROM t WHERE x = ?", &[Value::BigInt(1)]);
        let b = fingerprint("SELECT id FROM t WHERE x = ?", &[Value::BigInt(2)]);
        assert_ne!(a, b);
        assert!(a.starts_with("SELECT id FROM t"));
    }
}
