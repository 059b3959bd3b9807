//! Record trait and table descriptors.
//!
//! A [`Record`] is any struct that maps to a table. Its [`Table`] descriptor
//! is built once (typically in a `static OnceLock`) and lists the columns,
//! their accessors, and which lifecycle hook phases the record takes part in.
//!
//! ```ignore
//! impl Record for User {
//!     fn table() -> &'static Table<Self> {
//!         static TABLE: OnceLock<Table<User>> = OnceLock::new();
//!         TABLE.get_or_init(|| {
//!             Table::builder("users")
//!                 .column(col!(User, id, SqlType::BigInt).pk().auto_increment())
//!                 .column(col!(User, name, SqlType::VarChar(64)))
//!                 .column(col!(related User, team as "team_id", SqlType::BigInt))
//!                 .before_insert(|u| { u.name = u.name.trim().to_string(); Ok(()) })
//!                 .build()
//!         })
//!     }
//! }
//! ```

use crate::error::{Error, Result};
use crate::field::{Column, FieldValue};

/// Build a [`Column`] over a struct field.
///
/// `col!(User, name, SqlType::Text)` maps field `name` to column `name`;
/// `col!(User, name as "user_name", SqlType::Text)` renames it.
/// Prefix the record type with `related` for an `Option<T: Record>` field
/// or with `converted` for a field implementing [`Conversion`](crate::Conversion).
#[macro_export]
macro_rules! col {
    (related $record:ty, $field:ident as $name:expr, $sql:expr) => {
        $crate::Column::related($name, $sql, |r: &$record| &r.$field, |r: &mut $record| &mut r.$field)
    };
    (related $record:ty, $field:ident, $sql:expr) => {
        $crate::col!(related $record, $field as stringify!($field), $sql)
    };
    (converted $record:ty, $field:ident as $name:expr, $sql:expr) => {
        $crate::Column::converted($name, $sql, |r: &$record| &r.$field, |r: &mut $record| &mut r.$field)
    };
    (converted $record:ty, $field:ident, $sql:expr) => {
        $crate::col!(converted $record, $field as stringify!($field), $sql)
    };
    ($record:ty, $field:ident as $name:expr, $sql:expr) => {
        $crate::Column::new($name, $sql, |r: &$record| &r.$field, |r: &mut $record| &mut r.$field)
    };
    ($record:ty, $field:ident, $sql:expr) => {
        $crate::col!($record, $field as stringify!($field), $sql)
    };
}

/// A struct persisted by the session.
pub trait Record: Default + Clone + Send + Sync + 'static {
    /// The table descriptor for this record type.
    fn table() -> &'static Table<Self>;
}

/// A lifecycle hook phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    BeforeInsert,
    AfterInsert,
    BeforeUpdate,
    AfterUpdate,
    BeforeDelete,
    AfterDelete,
}

impl HookPhase {
    const ALL: [HookPhase; 6] = [
        HookPhase::BeforeInsert,
        HookPhase::AfterInsert,
        HookPhase::BeforeUpdate,
        HookPhase::AfterUpdate,
        HookPhase::BeforeDelete,
        HookPhase::AfterDelete,
    ];

    const fn index(self) -> usize {
        match self {
            HookPhase::BeforeInsert => 0,
            HookPhase::AfterInsert => 1,
            HookPhase::BeforeUpdate => 2,
            HookPhase::AfterUpdate => 3,
            HookPhase::BeforeDelete => 4,
            HookPhase::AfterDelete => 5,
        }
    }
}

/// A record-level lifecycle hook.
pub type HookFn<R> = fn(&mut R) -> Result<()>;

/// Hook phases a record declared at registration.
pub struct Hooks<R> {
    slots: [Option<HookFn<R>>; 6],
}

impl<R> Default for Hooks<R> {
    fn default() -> Self {
        Self { slots: [None; 6] }
    }
}

impl<R> Hooks<R> {
    pub fn get(&self, phase: HookPhase) -> Option<HookFn<R>> {
        self.slots[phase.index()]
    }

    /// The phases this record participates in.
    pub(crate) fn phases(&self) -> Vec<HookPhase> {
        HookPhase::ALL
            .into_iter()
            .filter(|p| self.slots[p.index()].is_some())
            .collect()
    }
}

/// Column layout and write-path metadata for one record type.
pub struct Table<R> {
    name: &'static str,
    columns: Vec<Column<R>>,
    pk: Vec<usize>,
    auto_increment: Option<usize>,
    version: Option<usize>,
    deleted: Option<usize>,
    hooks: Hooks<R>,
}

impl<R> std::fmt::Debug for Table<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("columns", &self.columns)
            .field("hooks", &self.hooks.phases())
            .finish()
    }
}

impl<R> Table<R> {
    /// Start describing a table.
    pub fn builder(name: &'static str) -> TableBuilder<R> {
        TableBuilder {
            name,
            columns: Vec::new(),
            hooks: Hooks::default(),
        }
    }

    /// Table name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// All columns, in declaration order.
    pub fn columns(&self) -> &[Column<R>] {
        &self.columns
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column<R>> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// Primary-key columns, in declaration order.
    pub fn pk_columns(&self) -> Vec<&Column<R>> {
        self.pk.iter().map(|&i| &self.columns[i]).collect()
    }

    pub fn pk_names(&self) -> Vec<&'static str> {
        self.pk.iter().map(|&i| self.columns[i].name()).collect()
    }

    pub fn auto_increment(&self) -> Option<&Column<R>> {
        self.auto_increment.map(|i| &self.columns[i])
    }

    /// The optimistic-version column, if any.
    pub fn version(&self) -> Option<&Column<R>> {
        self.version.map(|i| &self.columns[i])
    }

    /// The soft-delete marker column, if any.
    pub fn deleted(&self) -> Option<&Column<R>> {
        self.deleted.map(|i| &self.columns[i])
    }

    /// Columns stamped with the current time on insert.
    pub fn created(&self) -> impl Iterator<Item = &Column<R>> {
        self.columns.iter().filter(|c| c.info().created)
    }

    /// Columns stamped with the current time on insert and update.
    pub fn updated(&self) -> impl Iterator<Item = &Column<R>> {
        self.columns.iter().filter(|c| c.info().updated)
    }

    pub fn hooks(&self) -> &Hooks<R> {
        &self.hooks
    }

    /// The primary-key value of a single-key table.
    pub fn single_pk_value(&self, record: &R) -> Result<FieldValue> {
        match self.pk.as_slice() {
            [i] => self.columns[*i].get(record),
            _ => Err(self.single_pk_required()),
        }
    }

    /// Write the primary key of a single-key table.
    pub fn set_single_pk(&self, record: &mut R, value: FieldValue) -> Result<()> {
        match self.pk.as_slice() {
            [i] => self.columns[*i].set(record, value),
            _ => Err(self.single_pk_required()),
        }
    }

    fn single_pk_required(&self) -> Error {
        Error::Param(format!(
            "table '{}' must have exactly one primary key column, found {}",
            self.name,
            self.pk.len()
        ))
    }
}

/// Builder for [`Table`].
pub struct TableBuilder<R> {
    name: &'static str,
    columns: Vec<Column<R>>,
    hooks: Hooks<R>,
}

impl<R> TableBuilder<R> {
    /// Append a column.
    pub fn column(mut self, column: Column<R>) -> Self {
        self.columns.push(column);
        self
    }

    /// Register a hook for a phase, replacing any earlier one.
    pub fn hook(mut self, phase: HookPhase, hook: HookFn<R>) -> Self {
        self.hooks.slots[phase.index()] = Some(hook);
        self
    }

    pub fn before_insert(self, hook: HookFn<R>) -> Self {
        self.hook(HookPhase::BeforeInsert, hook)
    }

    pub fn after_insert(self, hook: HookFn<R>) -> Self {
        self.hook(HookPhase::AfterInsert, hook)
    }

    pub fn before_update(self, hook: HookFn<R>) -> Self {
        self.hook(HookPhase::BeforeUpdate, hook)
    }

    pub fn after_update(self, hook: HookFn<R>) -> Self {
        self.hook(HookPhase::AfterUpdate, hook)
    }

    pub fn before_delete(self, hook: HookFn<R>) -> Self {
        self.hook(HookPhase::BeforeDelete, hook)
    }

    pub fn after_delete(self, hook: HookFn<R>) -> Self {
        self.hook(HookPhase::AfterDelete, hook)
    }

    /// Finish the descriptor. The first column carrying each marker wins.
    pub fn build(self) -> Table<R> {
        let find = |pred: fn(&Column<R>) -> bool| self.columns.iter().position(pred);
        let pk = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.info().primary_key)
            .map(|(i, _)| i)
            .collect();
        let auto_increment = find(|c| c.info().auto_increment);
        let version = find(|c| c.info().version);
        let deleted = find(|c| c.info().deleted);
        Table {
            name: self.name,
            pk,
            auto_increment,
            version,
            deleted,
            columns: self.columns,
            hooks: self.hooks,
        }
    }
}
