//! Field values, column metadata and capability-based column accessors.
//!
//! A [`Column`] binds a column name and its write-path flags to a getter and
//! (optionally) a setter over the record type. The accessors are built once
//! when the table descriptor is constructed, so the write path never inspects
//! record types at runtime.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::codec::{self, DecodeContext};
use crate::error::{Error, Result, TypeError};
use crate::model::Record;
use crate::types::SqlType;

/// In-memory value of a single record field, as seen by the codec.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Time(DateTime<FixedOffset>),
    /// Structured value (sequences, mappings) held as JSON
    Json(serde_json::Value),
    /// Output of a [`Conversion`] implementation
    Custom(Vec<u8>),
    /// Primary key of a related record
    Related(Box<FieldValue>),
    /// A related record decoded by cascade
    Record(Arc<dyn Any + Send + Sync>),
}

impl FieldValue {
    /// Check if this value is NULL.
    pub const fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Whether this is the zero value of its kind.
    ///
    /// Zero values are skipped by update SET derivation and by bean-derived
    /// conditions.
    pub fn is_zero(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Bool(v) => !v,
            FieldValue::Int(v) => *v == 0,
            FieldValue::UInt(v) => *v == 0,
            FieldValue::Float(v) => *v == 0.0,
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::Bytes(b) | FieldValue::Custom(b) => b.is_empty(),
            // the unix epoch is what `DateTime::default()` yields
            FieldValue::Time(t) => {
                codec::time::is_zero_time(t) || (t.timestamp() == 0 && t.timestamp_subsec_nanos() == 0)
            }
            FieldValue::Json(v) => match v {
                serde_json::Value::Null => true,
                serde_json::Value::Array(a) => a.is_empty(),
                serde_json::Value::Object(o) => o.is_empty(),
                _ => false,
            },
            FieldValue::Related(pk) => pk.is_zero(),
            FieldValue::Record(_) => false,
        }
    }

    /// Get the type name of this value.
    pub const fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Int(_) => "int",
            FieldValue::UInt(_) => "uint",
            FieldValue::Float(_) => "float",
            FieldValue::Text(_) => "text",
            FieldValue::Bytes(_) => "bytes",
            FieldValue::Time(_) => "time",
            FieldValue::Json(_) => "json",
            FieldValue::Custom(_) => "custom",
            FieldValue::Related(_) => "related",
            FieldValue::Record(_) => "record",
        }
    }

    fn mismatch(&self, expected: &'static str) -> Error {
        Error::Type(TypeError {
            expected,
            actual: format!("{:?}", self),
            column: None,
        })
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => true,
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
            (FieldValue::Int(a), FieldValue::Int(b)) => a == b,
            (FieldValue::UInt(a), FieldValue::UInt(b)) => a == b,
            (FieldValue::Float(a), FieldValue::Float(b)) => a == b,
            (FieldValue::Text(a), FieldValue::Text(b)) => a == b,
            (FieldValue::Bytes(a), FieldValue::Bytes(b))
            | (FieldValue::Custom(a), FieldValue::Custom(b)) => a == b,
            (FieldValue::Time(a), FieldValue::Time(b)) => a == b,
            (FieldValue::Json(a), FieldValue::Json(b)) => a == b,
            (FieldValue::Related(a), FieldValue::Related(b)) => a == b,
            (FieldValue::Record(a), FieldValue::Record(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Semantic kind of a field; decode dispatches on this.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    Bool,
    Int,
    UInt,
    Float,
    Text,
    Bytes,
    Time,
    /// Sequences and mappings carried as JSON
    Structured,
    /// A type implementing [`Conversion`]
    Custom,
    /// A related record stored by its primary key
    Related(RelatedInfo),
}

impl FieldKind {
    pub const fn name(&self) -> &'static str {
        match self {
            FieldKind::Bool => "bool",
            FieldKind::Int => "int",
            FieldKind::UInt => "uint",
            FieldKind::Float => "float",
            FieldKind::Text => "text",
            FieldKind::Bytes => "bytes",
            FieldKind::Time => "time",
            FieldKind::Structured => "structured",
            FieldKind::Custom => "custom",
            FieldKind::Related(_) => "related",
        }
    }
}

/// Hooks the codec uses to resolve a related record from its primary key.
#[derive(Clone, Copy)]
pub struct RelatedInfo {
    /// Table name of the related record type.
    pub table: fn() -> &'static str,
    /// Decode raw key bytes into a [`FieldValue::Record`].
    pub resolve: fn(&[u8], &DecodeContext<'_>) -> Result<FieldValue>,
}

impl fmt::Debug for RelatedInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelatedInfo")
            .field("table", &(self.table)())
            .finish_non_exhaustive()
    }
}

/// A Rust type that can be stored in a column.
pub trait FieldType: Sized {
    /// Semantic kind used by the codec.
    const KIND: FieldKind;
    /// `Option<T>`: zero means `None`, not the inner zero value.
    const OPTIONAL: bool = false;

    fn to_field(&self) -> Result<FieldValue>;

    fn from_field(value: FieldValue) -> Result<Self>;
}

/// Custom raw-bytes contract for types that manage their own wire form.
pub trait Conversion {
    fn to_db(&self) -> Result<Vec<u8>>;

    fn from_db(&mut self, data: &[u8]) -> Result<()>;
}

/// Wrapper storing any serde type as a structured (JSON) column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl FieldType for bool {
    const KIND: FieldKind = FieldKind::Bool;

    fn to_field(&self) -> Result<FieldValue> {
        Ok(FieldValue::Bool(*self))
    }

    fn from_field(value: FieldValue) -> Result<Self> {
        match value {
            FieldValue::Null => Ok(false),
            FieldValue::Bool(v) => Ok(v),
            FieldValue::Int(v) => Ok(v != 0),
            FieldValue::UInt(v) => Ok(v != 0),
            other => Err(other.mismatch("bool")),
        }
    }
}

macro_rules! signed_field {
    ($($ty:ty),*) => {$(
        impl FieldType for $ty {
            const KIND: FieldKind = FieldKind::Int;

            fn to_field(&self) -> Result<FieldValue> {
                Ok(FieldValue::Int(i64::from(*self)))
            }

            fn from_field(value: FieldValue) -> Result<Self> {
                let out = match &value {
                    FieldValue::Null => Some(0),
                    FieldValue::Int(v) => <$ty>::try_from(*v).ok(),
                    FieldValue::UInt(v) => <$ty>::try_from(*v).ok(),
                    FieldValue::Bool(v) => Some(<$ty>::from(*v)),
                    _ => None,
                };
                out.ok_or_else(|| value.mismatch(stringify!($ty)))
            }
        }
    )*};
}

macro_rules! unsigned_field {
    ($($ty:ty),*) => {$(
        impl FieldType for $ty {
            const KIND: FieldKind = FieldKind::UInt;

            fn to_field(&self) -> Result<FieldValue> {
                Ok(FieldValue::UInt(u64::from(*self)))
            }

            fn from_field(value: FieldValue) -> Result<Self> {
                let out = match &value {
                    FieldValue::Null => Some(0),
                    FieldValue::Int(v) => <$ty>::try_from(*v).ok(),
                    FieldValue::UInt(v) => <$ty>::try_from(*v).ok(),
                    FieldValue::Bool(v) => Some(<$ty>::from(*v)),
                    _ => None,
                };
                out.ok_or_else(|| value.mismatch(stringify!($ty)))
            }
        }
    )*};
}

signed_field!(i8, i16, i32, i64);
unsigned_field!(u8, u16, u32, u64);

impl FieldType for f64 {
    const KIND: FieldKind = FieldKind::Float;

    fn to_field(&self) -> Result<FieldValue> {
        Ok(FieldValue::Float(*self))
    }

    fn from_field(value: FieldValue) -> Result<Self> {
        match value {
            FieldValue::Null => Ok(0.0),
            FieldValue::Float(v) => Ok(v),
            FieldValue::Int(v) => Ok(v as f64),
            FieldValue::UInt(v) => Ok(v as f64),
            other => Err(other.mismatch("f64")),
        }
    }
}

impl FieldType for f32 {
    const KIND: FieldKind = FieldKind::Float;

    fn to_field(&self) -> Result<FieldValue> {
        Ok(FieldValue::Float(f64::from(*self)))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_field(value: FieldValue) -> Result<Self> {
        f64::from_field(value).map(|v| v as f32)
    }
}

impl FieldType for String {
    const KIND: FieldKind = FieldKind::Text;

    fn to_field(&self) -> Result<FieldValue> {
        Ok(FieldValue::Text(self.clone()))
    }

    fn from_field(value: FieldValue) -> Result<Self> {
        match value {
            FieldValue::Null => Ok(String::new()),
            FieldValue::Text(s) => Ok(s),
            other => Err(other.mismatch("string")),
        }
    }
}

impl FieldType for Vec<u8> {
    const KIND: FieldKind = FieldKind::Bytes;

    fn to_field(&self) -> Result<FieldValue> {
        Ok(FieldValue::Bytes(self.clone()))
    }

    fn from_field(value: FieldValue) -> Result<Self> {
        match value {
            FieldValue::Null => Ok(Vec::new()),
            FieldValue::Bytes(b) => Ok(b),
            FieldValue::Text(s) => Ok(s.into_bytes()),
            other => Err(other.mismatch("bytes")),
        }
    }
}

impl FieldType for DateTime<FixedOffset> {
    const KIND: FieldKind = FieldKind::Time;

    fn to_field(&self) -> Result<FieldValue> {
        Ok(FieldValue::Time(*self))
    }

    fn from_field(value: FieldValue) -> Result<Self> {
        match value {
            FieldValue::Null => Ok(codec::time::zero_time()),
            FieldValue::Time(t) => Ok(t),
            other => Err(other.mismatch("time")),
        }
    }
}

impl<T: FieldType> FieldType for Option<T> {
    const KIND: FieldKind = T::KIND;
    const OPTIONAL: bool = true;

    fn to_field(&self) -> Result<FieldValue> {
        match self {
            Some(v) => v.to_field(),
            None => Ok(FieldValue::Null),
        }
    }

    fn from_field(value: FieldValue) -> Result<Self> {
        match value {
            FieldValue::Null => Ok(None),
            other => T::from_field(other).map(Some),
        }
    }
}

impl<T> FieldType for Json<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    const KIND: FieldKind = FieldKind::Structured;

    fn to_field(&self) -> Result<FieldValue> {
        Ok(FieldValue::Json(serde_json::to_value(&self.0)?))
    }

    fn from_field(value: FieldValue) -> Result<Self> {
        match value {
            FieldValue::Null => Ok(Json(T::default())),
            FieldValue::Json(v) => Ok(Json(serde_json::from_value(v)?)),
            FieldValue::Text(s) => Ok(Json(serde_json::from_str(&s)?)),
            other => Err(other.mismatch("json")),
        }
    }
}

/// Metadata about a column, including its write-path flags.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    /// Database column name
    pub name: &'static str,
    /// SQL type for this column
    pub sql_type: SqlType,
    /// Semantic kind of the Rust field
    pub kind: FieldKind,
    /// The Rust field is an `Option`
    pub optional: bool,
    /// Whether the column accepts NULL
    pub nullable: bool,
    /// Whether this is (part of) the primary key
    pub primary_key: bool,
    /// Whether this column auto-increments
    pub auto_increment: bool,
    /// Set to the current time on insert
    pub created: bool,
    /// Set to the current time on insert and update
    pub updated: bool,
    /// Soft-delete marker
    pub deleted: bool,
    /// Optimistic version counter
    pub version: bool,
    /// Populated by the database only; never written
    pub db_only: bool,
    /// Zone used for this column's time values, overriding the session's
    pub time_zone: Option<FixedOffset>,
}

impl FieldInfo {
    /// Create a new field info with minimal required data.
    pub const fn new(name: &'static str, sql_type: SqlType, kind: FieldKind) -> Self {
        Self {
            name,
            sql_type,
            kind,
            optional: false,
            nullable: false,
            primary_key: false,
            auto_increment: false,
            created: false,
            updated: false,
            deleted: false,
            version: false,
            db_only: false,
            time_zone: None,
        }
    }

    /// Set the optional flag.
    pub const fn optional(mut self, value: bool) -> Self {
        self.optional = value;
        self
    }

    /// Set the nullable flag.
    pub const fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    /// Set the primary key flag.
    pub const fn primary_key(mut self, value: bool) -> Self {
        self.primary_key = value;
        self
    }

    /// Set the auto-increment flag.
    pub const fn auto_increment(mut self, value: bool) -> Self {
        self.auto_increment = value;
        self
    }

    pub const fn created(mut self, value: bool) -> Self {
        self.created = value;
        self
    }

    pub const fn updated(mut self, value: bool) -> Self {
        self.updated = value;
        self
    }

    pub const fn deleted(mut self, value: bool) -> Self {
        self.deleted = value;
        self
    }

    pub const fn version(mut self, value: bool) -> Self {
        self.version = value;
        self
    }

    pub const fn db_only(mut self, value: bool) -> Self {
        self.db_only = value;
        self
    }

    pub const fn time_zone(mut self, tz: FixedOffset) -> Self {
        self.time_zone = Some(tz);
        self
    }

    /// Zero test honouring `Option` fields: `Some(0)` is not zero.
    pub fn is_zero(&self, value: &FieldValue) -> bool {
        if self.optional {
            value.is_null()
        } else {
            value.is_zero()
        }
    }
}

type Getter<R> = Box<dyn Fn(&R) -> Result<FieldValue> + Send + Sync>;
type Setter<R> = Box<dyn Fn(&mut R, FieldValue) -> Result<()> + Send + Sync>;

/// A column of record type `R`: metadata plus accessors.
pub struct Column<R> {
    info: FieldInfo,
    get: Getter<R>,
    set: Option<Setter<R>>,
}

impl<R> fmt::Debug for Column<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("info", &self.info)
            .field("settable", &self.set.is_some())
            .finish()
    }
}

impl<R: 'static> Column<R> {
    /// A column over a plain field.
    pub fn new<T: FieldType + 'static>(
        name: &'static str,
        sql_type: SqlType,
        get: fn(&R) -> &T,
        get_mut: fn(&mut R) -> &mut T,
    ) -> Self {
        let info = FieldInfo::new(name, sql_type, T::KIND)
            .optional(T::OPTIONAL)
            .nullable(T::OPTIONAL);
        Self {
            info,
            get: Box::new(move |r| get(r).to_field().map_err(|e| e.with_column(name))),
            set: Some(Box::new(move |r, v| {
                *get_mut(r) = T::from_field(v).map_err(|e| e.with_column(name))?;
                Ok(())
            })),
        }
    }

    /// A column whose value can be read but never written back.
    pub fn read_only<T: FieldType + 'static>(
        name: &'static str,
        sql_type: SqlType,
        get: fn(&R) -> &T,
    ) -> Self {
        let info = FieldInfo::new(name, sql_type, T::KIND)
            .optional(T::OPTIONAL)
            .nullable(T::OPTIONAL);
        Self {
            info,
            get: Box::new(move |r| get(r).to_field().map_err(|e| e.with_column(name))),
            set: None,
        }
    }

    /// A column over a type with its own [`Conversion`].
    pub fn converted<T: Conversion + Default + 'static>(
        name: &'static str,
        sql_type: SqlType,
        get: fn(&R) -> &T,
        get_mut: fn(&mut R) -> &mut T,
    ) -> Self {
        Self {
            info: FieldInfo::new(name, sql_type, FieldKind::Custom),
            get: Box::new(move |r| {
                get(r)
                    .to_db()
                    .map(FieldValue::Custom)
                    .map_err(|e| e.with_column(name))
            }),
            set: Some(Box::new(move |r, v| match v {
                FieldValue::Null => {
                    *get_mut(r) = T::default();
                    Ok(())
                }
                FieldValue::Custom(data) | FieldValue::Bytes(data) => get_mut(r)
                    .from_db(&data)
                    .map_err(|e| e.with_column(name)),
                FieldValue::Text(s) => get_mut(r)
                    .from_db(s.as_bytes())
                    .map_err(|e| e.with_column(name)),
                other => Err(other.mismatch("custom").with_column(name)),
            })),
        }
    }

    /// A column holding a related record, stored as that record's primary key.
    pub fn related<T: Record>(
        name: &'static str,
        sql_type: SqlType,
        get: fn(&R) -> &Option<T>,
        get_mut: fn(&mut R) -> &mut Option<T>,
    ) -> Self {
        let kind = FieldKind::Related(RelatedInfo {
            table: related_table_name::<T>,
            resolve: codec::decode::resolve_related::<T>,
        });
        Self {
            info: FieldInfo::new(name, sql_type, kind)
                .optional(true)
                .nullable(true),
            get: Box::new(move |r| match get(r) {
                Some(related) => T::table()
                    .single_pk_value(related)
                    .map(|pk| FieldValue::Related(Box::new(pk)))
                    .map_err(|e| e.with_column(name)),
                None => Ok(FieldValue::Null),
            }),
            set: Some(Box::new(move |r, v| {
                *get_mut(r) = match v {
                    FieldValue::Null => None,
                    FieldValue::Record(any) => match any.downcast::<T>() {
                        Ok(bean) => Some(Arc::unwrap_or_clone(bean)),
                        Err(_) => {
                            return Err(Error::conversion(name, "related record", "record of another type"));
                        }
                    },
                    FieldValue::Related(pk) => {
                        let mut bean = T::default();
                        T::table().set_single_pk(&mut bean, *pk)?;
                        Some(bean)
                    }
                    other => return Err(other.mismatch("related record").with_column(name)),
                };
                Ok(())
            })),
        }
    }
}

fn related_table_name<T: Record>() -> &'static str {
    T::table().name()
}

impl<R> Column<R> {
    /// Column name.
    pub fn name(&self) -> &'static str {
        self.info.name
    }

    /// Column metadata.
    pub fn info(&self) -> &FieldInfo {
        &self.info
    }

    /// Read this column's value from a record.
    pub fn get(&self, record: &R) -> Result<FieldValue> {
        (self.get)(record)
    }

    /// Whether values can be written back into the record.
    pub fn is_settable(&self) -> bool {
        self.set.is_some()
    }

    /// Write a value into the record.
    pub fn set(&self, record: &mut R, value: FieldValue) -> Result<()> {
        match &self.set {
            Some(set) => set(record, value),
            None => Err(Error::Param(format!(
                "column '{}' is read-only",
                self.info.name
            ))),
        }
    }

    /// Mark as (part of) the primary key.
    pub fn pk(mut self) -> Self {
        self.info = self.info.primary_key(true);
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.info = self.info.auto_increment(true);
        self
    }

    /// Set to the current time on insert.
    pub fn created(mut self) -> Self {
        self.info = self.info.created(true);
        self
    }

    /// Set to the current time on insert and every update.
    pub fn updated(mut self) -> Self {
        self.info = self.info.updated(true);
        self
    }

    /// Soft-delete marker: delete becomes an UPDATE setting this column.
    pub fn deleted(mut self) -> Self {
        self.info = self.info.deleted(true).nullable(true);
        self
    }

    /// Optimistic version counter.
    pub fn version(mut self) -> Self {
        self.info = self.info.version(true);
        self
    }

    pub fn db_only(mut self) -> Self {
        self.info = self.info.db_only(true);
        self
    }

    pub fn nullable(mut self, value: bool) -> Self {
        self.info = self.info.nullable(value);
        self
    }

    pub fn time_zone(mut self, tz: FixedOffset) -> Self {
        self.info = self.info.time_zone(tz);
        self
    }
}
