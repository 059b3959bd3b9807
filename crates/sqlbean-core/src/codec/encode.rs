//! Field values -> wire values.

use crate::error::{Error, Result};
use crate::field::{FieldInfo, FieldValue};
use crate::value::Value;

use super::CodecConfig;
use super::time::format_time;

/// Encode a field value for binding as a statement argument.
///
/// Unsigned integers above `i64::MAX` are rejected rather than wrapped.
/// Related records are reduced to their primary key.
pub fn encode_field(column: &FieldInfo, value: &FieldValue, config: &CodecConfig) -> Result<Value> {
    let out = match value {
        FieldValue::Null => Value::Null,
        FieldValue::Bool(v) => Value::Bool(*v),
        FieldValue::Int(v) => Value::BigInt(*v),
        FieldValue::UInt(v) => Value::try_from(*v).map_err(|e| e.with_column(column.name))?,
        FieldValue::Float(v) => Value::Double(*v),
        FieldValue::Text(s) => Value::Text(s.clone()),
        FieldValue::Bytes(b) => Value::Bytes(b.clone()),
        FieldValue::Time(t) => format_time(t, column, config),
        FieldValue::Json(v) => {
            if column.sql_type.is_text() {
                Value::Text(serde_json::to_string(v)?)
            } else if column.sql_type.is_blob() {
                Value::Bytes(serde_json::to_vec(v)?)
            } else {
                return Err(unsupported(column, "structured"));
            }
        }
        FieldValue::Custom(data) => {
            if column.sql_type.is_text() {
                String::from_utf8(data.clone())
                    .map(Value::Text)
                    .map_err(|_| Error::conversion(column.name, "utf-8 text", format!("{:?}", data)))?
            } else {
                Value::Bytes(data.clone())
            }
        }
        FieldValue::Related(pk) => encode_field(column, pk, config)?,
        FieldValue::Record(_) => return Err(unsupported(column, "record")),
    };
    Ok(out)
}

fn unsupported(column: &FieldInfo, kind: &str) -> Error {
    Error::unsupported(column.name, kind, column.sql_type.sql_name())
}
