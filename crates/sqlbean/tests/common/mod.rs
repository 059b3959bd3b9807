//! Shared fixtures: a scripted connection and a few records.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use sqlbean::prelude::*;
use sqlbean::{ExecResult, HookPhase};

/// Everything a [`MockConnection`] saw, plus the answers it will give.
#[derive(Debug, Default)]
pub struct MockState {
    /// `(sql, args)` of every exec and query, in order
    pub statements: Vec<(String, Vec<Value>)>,
    pub exec_results: VecDeque<ExecResult>,
    pub query_results: VecDeque<Vec<Row>>,
    pub begins: usize,
    pub commits: usize,
    pub rollbacks: usize,
}

/// A connection that records statements and replays scripted results.
///
/// `exec` answers `ExecResult::new(1)` and `query` answers no rows once the
/// scripted results run out.
#[derive(Debug, Clone)]
pub struct MockConnection {
    dialect: Dialect,
    state: Arc<Mutex<MockState>>,
}

impl MockConnection {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn push_exec(&self, result: ExecResult) {
        self.state().exec_results.push_back(result);
    }

    pub fn push_rows(&self, rows: Vec<Row>) {
        self.state().query_results.push_back(rows);
    }

    pub fn statements(&self) -> Vec<(String, Vec<Value>)> {
        self.state().statements.clone()
    }

    pub fn sql(&self) -> Vec<String> {
        self.statements().into_iter().map(|(sql, _)| sql).collect()
    }

    pub fn last(&self) -> (String, Vec<Value>) {
        self.statements().pop().expect("no statement recorded")
    }
}

impl Connection for MockConnection {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecResult> {
        let mut state = self.state();
        state.statements.push((sql.to_string(), args.to_vec()));
        Ok(state.exec_results.pop_front().unwrap_or(ExecResult::new(1)))
    }

    fn query(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>> {
        let mut state = self.state();
        state.statements.push((sql.to_string(), args.to_vec()));
        Ok(state.query_results.pop_front().unwrap_or_default())
    }

    fn begin(&self) -> Result<()> {
        self.state().begins += 1;
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.state().commits += 1;
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        self.state().rollbacks += 1;
        Ok(())
    }
}

pub fn row(names: &[&str], values: Vec<Value>) -> Row {
    Row::new(names.iter().map(|n| (*n).to_string()).collect(), values)
}

pub fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

// ============================================================================
// Records
// ============================================================================

/// Versioned record with an integer updated-at column.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub balance: i64,
    pub version: i64,
    pub updated: i64,
}

impl Record for Account {
    fn table() -> &'static Table<Self> {
        static TABLE: OnceLock<Table<Account>> = OnceLock::new();
        TABLE.get_or_init(|| {
            Table::builder("accounts")
                .column(col!(Account, id, SqlType::BigInt).pk().auto_increment())
                .column(col!(Account, name, SqlType::VarChar(64)))
                .column(col!(Account, balance, SqlType::BigInt))
                .column(col!(Account, version, SqlType::BigInt).version())
                .column(col!(Account, updated, SqlType::BigInt).updated())
                .build()
        })
    }
}

impl Account {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub const COLUMNS: [&'static str; 5] = ["id", "name", "balance", "version", "updated"];

    pub fn row(&self) -> Row {
        row(
            &Self::COLUMNS,
            vec![
                Value::BigInt(self.id),
                text(&self.name),
                Value::BigInt(self.balance),
                Value::BigInt(self.version),
                Value::BigInt(self.updated),
            ],
        )
    }
}

/// Soft-deletable record whose before-insert hook trims the body and
/// rejects empty ones.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Memo {
    pub id: i64,
    pub body: String,
    pub deleted: i64,
}

fn trim_body(memo: &mut Memo) -> Result<()> {
    memo.body = memo.body.trim().to_string();
    if memo.body.is_empty() {
        return Err(Error::Custom("memo body is empty".to_string()));
    }
    Ok(())
}

impl Record for Memo {
    fn table() -> &'static Table<Self> {
        static TABLE: OnceLock<Table<Memo>> = OnceLock::new();
        TABLE.get_or_init(|| {
            Table::builder("memos")
                .column(col!(Memo, id, SqlType::BigInt).pk().auto_increment())
                .column(col!(Memo, body, SqlType::Text))
                .column(col!(Memo, deleted, SqlType::BigInt).deleted())
                .hook(HookPhase::BeforeInsert, trim_body)
                .build()
        })
    }
}
