//! Raw database bytes -> field values.

use std::sync::Arc;

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::field::{FieldInfo, FieldKind, FieldValue};
use crate::model::Record;
use crate::row::Row;
use crate::types::SqlType;
use crate::value::Value;

use super::DecodeContext;
use super::encode::encode_field;
use super::time::parse_time;

/// Decode one column's raw bytes; `None` is SQL NULL.
pub fn decode_field(
    column: &FieldInfo,
    raw: Option<&[u8]>,
    ctx: &DecodeContext<'_>,
) -> Result<FieldValue> {
    let Some(raw) = raw else {
        return Ok(FieldValue::Null);
    };
    match column.kind {
        FieldKind::Bool => decode_bool(column, raw).map(FieldValue::Bool),
        FieldKind::Int => decode_int(column, raw, ctx.config.dialect).map(FieldValue::Int),
        FieldKind::UInt => decode_uint(column, raw, ctx.config.dialect).map(FieldValue::UInt),
        FieldKind::Float => {
            let s = text(column, raw)?;
            s.trim()
                .parse::<f64>()
                .map(FieldValue::Float)
                .map_err(|_| Error::conversion(column.name, "float", s))
        }
        FieldKind::Text => text(column, raw).map(|s| FieldValue::Text(s.to_string())),
        FieldKind::Bytes => {
            if column.sql_type.is_blob() || column.sql_type.is_text() {
                Ok(FieldValue::Bytes(raw.to_vec()))
            } else {
                Err(unsupported(column))
            }
        }
        FieldKind::Time => {
            parse_time(text(column, raw)?, column, &ctx.config).map(FieldValue::Time)
        }
        FieldKind::Structured => {
            if column.sql_type.is_text() || column.sql_type.is_blob() {
                serde_json::from_slice(raw)
                    .map(FieldValue::Json)
                    .map_err(|_| {
                        Error::conversion(column.name, "json", String::from_utf8_lossy(raw))
                    })
            } else {
                Err(unsupported(column))
            }
        }
        FieldKind::Custom => Ok(FieldValue::Custom(raw.to_vec())),
        FieldKind::Related(info) => (info.resolve)(raw, ctx),
    }
}

/// Decode a wire value for one column.
pub fn decode_value(
    column: &FieldInfo,
    value: &Value,
    ctx: &DecodeContext<'_>,
) -> Result<FieldValue> {
    decode_field(column, value.raw().as_deref(), ctx)
}

/// Decode a full row into a fresh record.
///
/// Columns missing from the row and read-only columns keep their defaults.
pub fn decode_row<T: Record>(row: &Row, ctx: &DecodeContext<'_>) -> Result<T> {
    let mut bean = T::default();
    for column in T::table().columns() {
        if !column.is_settable() {
            continue;
        }
        let Some(value) = row.get_by_name(column.name()) else {
            continue;
        };
        let field = decode_value(column.info(), value, ctx)?;
        column.set(&mut bean, field)?;
    }
    Ok(bean)
}

/// Resolve a related record from the raw bytes of its primary key.
///
/// With a loader the related row is fetched (one level deep: the nested
/// decode runs with cascade disabled). Without one, the record carries only
/// its primary key.
///
/// # Panics
///
/// Panics if `T` does not have exactly one primary-key column. Cascade
/// resolution is keyed by a single column; anything else is a table
/// definition error.
pub fn resolve_related<T: Record>(raw: &[u8], ctx: &DecodeContext<'_>) -> Result<FieldValue> {
    let table = T::table();
    let pk_columns = table.pk_columns();
    let [pk] = pk_columns.as_slice() else {
        panic!(
            "cascade on table '{}' requires exactly one primary key column, found {}",
            table.name(),
            pk_columns.len()
        );
    };

    let nested = ctx.without_cascade();
    let key = decode_field(pk.info(), Some(raw), &nested)?;

    let Some(loader) = ctx.loader() else {
        let mut bean = T::default();
        pk.set(&mut bean, key)?;
        return Ok(FieldValue::Record(Arc::new(bean)));
    };

    let wire = encode_field(pk.info(), &key, &ctx.config)?;
    tracing::debug!(table = table.name(), key = ?wire, "cascade load");
    let row = loader
        .load_row(table.name(), pk.name(), wire)?
        .ok_or_else(|| Error::CascadeNotFound {
            table: table.name().to_string(),
            key: String::from_utf8_lossy(raw).into_owned(),
        })?;
    let bean: T = decode_row(&row, &nested)?;
    Ok(FieldValue::Record(Arc::new(bean)))
}

fn text<'r>(column: &FieldInfo, raw: &'r [u8]) -> Result<&'r str> {
    std::str::from_utf8(raw)
        .map_err(|_| Error::conversion(column.name, "utf-8 text", format!("{:?}", raw)))
}

fn unsupported(column: &FieldInfo) -> Error {
    Error::unsupported(column.name, column.kind.name(), column.sql_type.sql_name())
}

/// MySQL reports `BIT(n)` values as raw bytes.
fn mysql_bit(column: &FieldInfo, raw: &[u8], dialect: Dialect) -> Option<u8> {
    match raw {
        [b] if column.sql_type == SqlType::Bit && dialect == Dialect::Mysql => Some(*b),
        _ => None,
    }
}

fn decode_bool(column: &FieldInfo, raw: &[u8]) -> Result<bool> {
    match raw {
        b"1" | b"t" | b"T" | b"TRUE" | b"true" | b"True" => Ok(true),
        b"0" | b"f" | b"F" | b"FALSE" | b"false" | b"False" => Ok(false),
        [b] => Ok(*b != 0),
        _ => Err(Error::conversion(
            column.name,
            "bool",
            String::from_utf8_lossy(raw),
        )),
    }
}

/// Integer text in hex (`0x1F`), octal (`017`), bool-word or decimal form.
/// Hex and octal accept a leading `-`.
pub fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim();
    let (negative, unsigned) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    if let Some((digits, radix)) = radix_digits(unsigned) {
        let magnitude = u64::from_str_radix(digits, radix).ok()?;
        return if negative {
            0_i64.checked_sub_unsigned(magnitude)
        } else {
            i64::try_from(magnitude).ok()
        };
    }
    if s.eq_ignore_ascii_case("true") {
        Some(1)
    } else if s.eq_ignore_ascii_case("false") {
        Some(0)
    } else {
        s.parse().ok()
    }
}

fn parse_uint(s: &str) -> Option<u64> {
    let s = s.trim();
    if let Some((digits, radix)) = radix_digits(s) {
        u64::from_str_radix(digits, radix).ok()
    } else if s.eq_ignore_ascii_case("true") {
        Some(1)
    } else if s.eq_ignore_ascii_case("false") {
        Some(0)
    } else {
        s.parse().ok()
    }
}

fn radix_digits(s: &str) -> Option<(&str, u32)> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some((hex, 16))
    } else if s.len() > 1 && s.starts_with('0') {
        Some((&s[1..], 8))
    } else {
        None
    }
}

fn decode_int(column: &FieldInfo, raw: &[u8], dialect: Dialect) -> Result<i64> {
    if let Some(bit) = mysql_bit(column, raw, dialect) {
        return Ok(i64::from(bit));
    }
    let s = text(column, raw)?;
    parse_int(s).ok_or_else(|| Error::conversion(column.name, "integer", s))
}

fn decode_uint(column: &FieldInfo, raw: &[u8], dialect: Dialect) -> Result<u64> {
    if let Some(bit) = mysql_bit(column, raw, dialect) {
        return Ok(u64::from(bit));
    }
    let s = text(column, raw)?;
    parse_uint(s).ok_or_else(|| Error::conversion(column.name, "unsigned integer", s))
}
