//! Core types and traits for SQLBean.
//!
//! This crate provides the foundational abstractions the write path is built on:
//!
//! - `Record` trait and `Table` descriptors with capability-based `Column` accessors
//! - `Value` / `FieldValue` and the `codec` converting between them
//! - `Connection` trait for the blocking executor
//! - `Dialect` for quoting, placeholders and auto-increment strategies
//! - `BeanCache` trait for the second-level bean cache

pub mod cache;
pub mod codec;
pub mod connection;
pub mod dialect;
pub mod error;
pub mod field;
pub mod model;
pub mod row;
pub mod types;
pub mod value;

pub use cache::{BeanCache, CachedBean, fingerprint, pk_string};
pub use codec::{CascadeLoader, CodecConfig, DecodeContext};
pub use connection::{Connection, ExecResult};
pub use dialect::{AutoIncrStrategy, Dialect};
pub use error::{Error, Result};
pub use field::{Column, Conversion, FieldInfo, FieldKind, FieldType, FieldValue, Json};
pub use model::{HookFn, HookPhase, Hooks, Record, Table, TableBuilder};
pub use row::Row;
pub use types::SqlType;
pub use value::Value;
