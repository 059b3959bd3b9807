//! The value codec: raw database bytes <-> typed field values.
//!
//! Decode dispatches on the field's [`FieldKind`](crate::FieldKind) and the
//! column's [`SqlType`](crate::SqlType); encode narrows a
//! [`FieldValue`](crate::FieldValue) to a wire [`Value`].

pub mod decode;
pub mod encode;
pub mod time;

use chrono::{FixedOffset, Offset, Utc};

use crate::dialect::Dialect;
use crate::error::Result;
use crate::row::Row;
use crate::value::Value;

pub use decode::{decode_field, decode_row, decode_value};
pub use encode::encode_field;

/// Session-level settings the codec depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecConfig {
    pub dialect: Dialect,
    /// Zone naive database times are written and read in.
    pub database_tz: FixedOffset,
    /// Zone decoded times are returned in.
    pub local_tz: FixedOffset,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            database_tz: Utc.fix(),
            local_tz: Utc.fix(),
        }
    }
}

/// Loads a related row by primary key during cascade decode.
pub trait CascadeLoader {
    fn load_row(&self, table: &str, pk_column: &str, key: Value) -> Result<Option<Row>>;
}

/// Decode-time state: codec settings plus the optional cascade loader.
///
/// Without a loader, related fields are filled with a record that only
/// carries its primary key.
#[derive(Clone, Copy)]
pub struct DecodeContext<'a> {
    pub config: CodecConfig,
    loader: Option<&'a dyn CascadeLoader>,
}

impl<'a> DecodeContext<'a> {
    pub fn new(config: CodecConfig) -> Self {
        Self {
            config,
            loader: None,
        }
    }

    pub fn with_loader(config: CodecConfig, loader: &'a dyn CascadeLoader) -> Self {
        Self {
            config,
            loader: Some(loader),
        }
    }

    pub fn loader(&self) -> Option<&'a dyn CascadeLoader> {
        self.loader
    }

    /// Same settings, cascade disabled.
    pub fn without_cascade(&self) -> DecodeContext<'static> {
        DecodeContext::new(self.config)
    }
}
