//! Lenient time parsing and per-dialect time formatting.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike};

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::field::FieldInfo;
use crate::types::SqlType;
use crate::value::Value;

use super::CodecConfig;

/// Unix seconds of `0001-01-01 00:00:00 UTC`.
const ZERO_TIME_UNIX: i64 = -62_135_596_800;

/// Strings some databases return for an unset datetime.
const ZERO_SENTINELS: [&str; 2] = ["0000-00-00 00:00:00", "0001-01-01 00:00:00"];

/// The zero time: `0001-01-01 00:00:00 UTC`.
pub fn zero_time() -> DateTime<FixedOffset> {
    DateTime::from_timestamp(ZERO_TIME_UNIX, 0)
        .unwrap_or_default()
        .fixed_offset()
}

pub fn is_zero_time(t: &DateTime<FixedOffset>) -> bool {
    t.timestamp() == ZERO_TIME_UNIX && t.timestamp_subsec_nanos() == 0
}

/// Parse a raw database time string for `column`.
///
/// Layouts are attempted from most to least specific; each failed attempt
/// falls through to the next. Naive values are read in the column's zone
/// (or the database zone) and returned in the column's zone (or the local
/// zone).
pub fn parse_time(raw: &str, column: &FieldInfo, config: &CodecConfig) -> Result<DateTime<FixedOffset>> {
    let s = raw.trim();
    let parse_tz = column.time_zone.unwrap_or(config.database_tz);
    let out_tz = column.time_zone.unwrap_or(config.local_tz);

    if s.is_empty() || ZERO_SENTINELS.contains(&s) {
        return Ok(zero_time());
    }

    if is_unix_seconds(s) {
        // integer columns store the zero time as 0
        if let Some(t) = s.parse::<i64>().ok().and_then(|secs| match secs {
            0 => Some(zero_time()),
            secs => DateTime::from_timestamp(secs, 0).map(|t| t.fixed_offset()),
        }) {
            return Ok(t.with_timezone(&out_tz));
        }
    }

    if s.len() > 19 && s.contains('-') {
        if let Ok(t) = DateTime::parse_from_rfc3339(s) {
            return Ok(t.with_timezone(&out_tz));
        }
        if let Some(t) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
            .ok()
            .and_then(|n| localize(&n, parse_tz))
        {
            return Ok(t.with_timezone(&out_tz));
        }
        if let Ok(t) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f %:z") {
            return Ok(t.with_timezone(&out_tz));
        }
    }

    if s.len() == 19 && s.contains('-') {
        if let Some(t) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
            .ok()
            .and_then(|n| localize(&n, parse_tz))
        {
            return Ok(t.with_timezone(&out_tz));
        }
    }

    let bytes = s.as_bytes();
    if s.len() == 10 && bytes[4] == b'-' && bytes[7] == b'-' {
        if let Some(t) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|d| localize(&d.and_time(NaiveTime::MIN), parse_tz))
        {
            return Ok(t.with_timezone(&out_tz));
        }
    }

    if column.sql_type == SqlType::Time {
        let mut clock = s.split(' ').nth(1).unwrap_or(s).trim();
        if config.dialect == Dialect::Mysql && clock.len() > 8 {
            clock = clock.get(clock.len() - 8..).unwrap_or(clock);
        }
        let synthetic = format!("0001-01-01 {}", clock);
        if let Some(t) = NaiveDateTime::parse_from_str(&synthetic, "%Y-%m-%d %H:%M:%S%.f")
            .ok()
            .and_then(|n| localize(&n, parse_tz))
        {
            return Ok(t.with_timezone(&out_tz));
        }
    }

    Err(Error::conversion(
        column.name,
        "time",
        format!("unsupported time format {:?}", s),
    ))
}

fn is_unix_seconds(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn localize(naive: &NaiveDateTime, tz: FixedOffset) -> Option<DateTime<FixedOffset>> {
    tz.from_local_datetime(naive).single()
}

/// Format a time value for `column` the way its SQL type expects.
///
/// The zero time becomes NULL for nullable columns and on MSSQL, and `0`
/// for integer columns.
pub fn format_time(t: &DateTime<FixedOffset>, column: &FieldInfo, config: &CodecConfig) -> Value {
    if is_zero_time(t) {
        if column.sql_type.is_integer() {
            return Value::BigInt(0);
        }
        if column.nullable || config.dialect == Dialect::Mssql {
            return Value::Null;
        }
    }

    let tz = column.time_zone.unwrap_or(config.database_tz);
    let t = t.with_timezone(&tz);
    match column.sql_type {
        SqlType::Time => Value::Text(t.format("%H:%M:%S").to_string()),
        SqlType::Date => Value::Text(t.format("%Y-%m-%d").to_string()),
        SqlType::TimestampTz if config.dialect == Dialect::Mssql => Value::Text(format!(
            "{}.{:07} {}",
            t.format("%Y-%m-%d %H:%M:%S"),
            t.nanosecond() / 100,
            t.format("%:z")
        )),
        SqlType::TimestampTz => {
            Value::Text(t.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true))
        }
        ty if ty.is_integer() => Value::BigInt(t.timestamp()),
        _ => Value::Text(t.format("%Y-%m-%d %H:%M:%S").to_string()),
    }
}
