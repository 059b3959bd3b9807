//! SQL dialects: quoting, placeholders and per-database write quirks.

/// SQL dialect a session generates statements for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// MySQL / MariaDB (uses ? placeholders)
    Mysql,
    /// PostgreSQL (uses $1, $2 placeholders)
    #[default]
    Postgres,
    /// SQLite (uses ? placeholders)
    Sqlite,
    /// Oracle (uses :1, :2 placeholders)
    Oracle,
    /// Microsoft SQL Server (uses @p1, @p2 placeholders)
    Mssql,
}

/// How the id of a freshly inserted row is read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoIncrStrategy {
    /// Driver-reported last insert id.
    LastInsertId,
    /// `INSERT ... RETURNING col`, id read from the result row.
    Returning,
    /// `INSERT ... OUTPUT INSERTED.col VALUES ...`, id read from the result row.
    Output,
    /// Follow-up `SELECT seq.currval FROM dual`.
    Sequence,
}

impl Dialect {
    /// Database name, as used in log fields and error messages.
    pub const fn name(self) -> &'static str {
        match self {
            Dialect::Mysql => "mysql",
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
            Dialect::Oracle => "oracle",
            Dialect::Mssql => "mssql",
        }
    }

    /// Generate a placeholder for the given parameter index (1-based).
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Oracle => format!(":{index}"),
            Dialect::Mssql => format!("@p{index}"),
            Dialect::Mysql | Dialect::Sqlite => "?".to_string(),
        }
    }

    /// The logical-AND token used to join condition fragments.
    pub const fn and_op(self) -> &'static str {
        "AND"
    }

    /// Quote an identifier for this dialect.
    ///
    /// Embedded quote characters are escaped by doubling them.
    pub fn quote_identifier(self, name: &str) -> String {
        match self {
            Dialect::Postgres | Dialect::Sqlite | Dialect::Oracle => {
                let escaped = name.replace('"', "\"\"");
                format!("\"{}\"", escaped)
            }
            Dialect::Mysql => {
                let escaped = name.replace('`', "``");
                format!("`{}`", escaped)
            }
            Dialect::Mssql => {
                let escaped = name.replace(']', "]]");
                format!("[{}]", escaped)
            }
        }
    }

    /// Quote a possibly schema-qualified table name (`schema.table`).
    pub fn quote_table(self, name: &str) -> String {
        name.split('.')
            .map(|part| self.quote_identifier(part))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// How this database hands back auto-increment ids.
    pub const fn auto_increment_strategy(self) -> AutoIncrStrategy {
        match self {
            Dialect::Oracle => AutoIncrStrategy::Sequence,
            Dialect::Postgres => AutoIncrStrategy::Returning,
            Dialect::Mssql => AutoIncrStrategy::Output,
            Dialect::Mysql | Dialect::Sqlite => AutoIncrStrategy::LastInsertId,
        }
    }

    /// Run the dialect's filter chain over statement text.
    ///
    /// Statements are assembled with uniform `?` placeholders; this rewrites
    /// them into the numbered form the database expects. Placeholders inside
    /// string literals and quoted identifiers are left alone.
    pub fn filter_sql(self, sql: &str) -> String {
        if matches!(self, Dialect::Mysql | Dialect::Sqlite) {
            return sql.to_string();
        }
        let mut out = String::with_capacity(sql.len() + 8);
        let mut index = 0;
        let mut quote: Option<char> = None;
        for ch in sql.chars() {
            match quote {
                Some(q) => {
                    if ch == q {
                        quote = None;
                    }
                    out.push(ch);
                }
                None => match ch {
                    '\'' | '"' | '`' => {
                        quote = Some(ch);
                        out.push(ch);
                    }
                    '[' if self == Dialect::Mssql => {
                        quote = Some(']');
                        out.push(ch);
                    }
                    '?' => {
                        index += 1;
                        out.push_str(&self.placeholder(index));
                    }
                    _ => out.push(ch),
                },
            }
        }
        out
    }
}
