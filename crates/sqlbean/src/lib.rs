//! SQLBean - struct-level CRUD over SQL with a write-consistent bean cache.
//!
//! SQLBean maps plain Rust structs ("beans") onto table rows and provides:
//!
//! - Insert, multi-row insert, update and delete driven by the bean's fields
//! - Automatic created/updated/deleted timestamps and soft delete
//! - Optimistic locking through a version column
//! - Lifecycle hooks, deferred to commit inside a transaction
//! - A bean cache kept consistent with every write
//!
//! # Quick Start
//!
//! ```ignore
//! use sqlbean::prelude::*;
//!
//! #[derive(Debug, Default, Clone)]
//! struct Hero {
//!     id: i64,
//!     name: String,
//!     version: i64,
//!     created: DateTime<FixedOffset>,
//! }
//!
//! impl Record for Hero {
//!     fn table() -> &'static Table<Self> {
//!         static TABLE: OnceLock<Table<Hero>> = OnceLock::new();
//!         TABLE.get_or_init(|| {
//!             Table::builder("heroes")
//!                 .column(col!(Hero, id, SqlType::BigInt).pk().auto_increment())
//!                 .column(col!(Hero, name, SqlType::Text))
//!                 .column(col!(Hero, version, SqlType::BigInt).version())
//!                 .column(col!(Hero, created, SqlType::Timestamp).created())
//!                 .build()
//!         })
//!     }
//! }
//!
//! let mut session = SessionBuilder::new().build(conn);
//! let mut hero = Hero { name: "Spider-Boy".into(), ..Hero::default() };
//! session.insert(&mut hero)?;              // id, created and version = 1 set
//!
//! hero.name = "Spider-Man".into();
//! session.id(hero.id).update(&mut hero)?;  // version checked and bumped
//!
//! session.delete(&mut hero)?;
//! ```

// Re-export all public types from sub-crates
pub use sqlbean_core::{
    AutoIncrStrategy, BeanCache, CachedBean, CascadeLoader, CodecConfig, Column, Connection,
    Conversion, DecodeContext, Dialect, Error, ExecResult, FieldInfo, FieldKind, FieldType,
    FieldValue, HookFn, HookPhase, Hooks, Json, Record, Result, Row, SqlType, Table,
    TableBuilder, Value, col,
};
pub use sqlbean_core::{codec, error};

pub use sqlbean_query::{Cond, OrderBy, OrderDirection, Pk, SqlStatement, Statement};

pub use sqlbean_session::{
    CacheUpdateStrategy, DeferredHook, MemoryCache, Session, SessionConfig,
};

pub mod session;
pub use session::SessionBuilder;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use sqlbean::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        // Cache
        BeanCache,
        CacheUpdateStrategy,
        // Core traits and types
        Column,
        Connection,
        Dialect,
        Error,
        FieldValue,
        MemoryCache,
        Pk,
        Record,
        Result,
        Row,
        // Session
        Session,
        SessionBuilder,
        SessionConfig,
        SqlType,
        Table,
        Value,
        col,
    };
    pub use chrono::{DateTime, FixedOffset};
    pub use std::sync::{Arc, OnceLock};
}
