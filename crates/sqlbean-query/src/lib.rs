//! Statement construction for SQLBean.
//!
//! `sqlbean-query` is the **statement layer**. It holds the per-session
//! [`Statement`] context that chainable modifiers accumulate into and turns
//! `Table` metadata plus a bean into INSERT, UPDATE and DELETE text with
//! ordered arguments.
//!
//! # Role In The Architecture
//!
//! - **Conditions**: [`Cond`] composes WHERE fragments; [`bean_conds`] derives
//!   them from a bean's non-zero fields.
//! - **Builders**: [`build_insert`], [`build_insert_multi`], [`build_update`]
//!   and [`build_delete`] produce [`SqlStatement`]s with uniform `?` markers.
//! - **Dialect quirks**: RETURNING / OUTPUT id retrieval, Oracle `INSERT ALL`,
//!   and row-limited writes via `rowid`/`ctid` subqueries.
//!
//! Statements execute through the `Connection` trait from `sqlbean-core`,
//! driven by `sqlbean-session`.

pub mod builder;
pub mod clause;
pub mod cond;
pub mod statement;

pub use builder::{
    BuildContext, DeletePlan, InsertPlan, SqlStatement, Stamp, UpdatePlan, UpdateSource,
    build_delete, build_insert, build_insert_map, build_insert_multi, build_update, now_value,
    sequence_query,
};
pub use clause::{OrderBy, OrderDirection, order_by_sql, order_limit_sql};
pub use cond::{BeanCondOptions, Cond, Pk, bean_conds, deleted_scope, id_cond, in_cond};
pub use statement::{Closure, Statement};
