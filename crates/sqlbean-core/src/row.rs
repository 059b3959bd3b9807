//! Result rows handed back by the executor.

use crate::value::Value;

/// One row of a [`Connection::query`](crate::Connection::query) result.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    names: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(names: Vec<String>, values: Vec<Value>) -> Self {
        Self { names, values }
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Value of the named column.
    ///
    /// Falls back to a case-insensitive match, since some databases fold
    /// unquoted identifiers to upper case.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        let index = self
            .names
            .iter()
            .position(|n| n == name)
            .or_else(|| self.names.iter().position(|n| n.eq_ignore_ascii_case(name)))?;
        self.values.get(index)
    }
}
