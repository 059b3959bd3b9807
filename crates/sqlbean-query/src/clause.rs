//! ORDER BY and LIMIT clauses.

use sqlbean_core::Dialect;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderBy {
    /// A raw SQL expression, rendered verbatim
    Raw(String),
    /// A column name, quoted at render time
    Column(String, OrderDirection),
}

impl OrderBy {
    /// Create an ascending order by clause.
    pub fn asc(column: impl Into<String>) -> Self {
        OrderBy::Column(column.into(), OrderDirection::Asc)
    }

    /// Create a descending order by clause.
    pub fn desc(column: impl Into<String>) -> Self {
        OrderBy::Column(column.into(), OrderDirection::Desc)
    }

    /// Generate SQL for this ORDER BY term.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        match self {
            OrderBy::Raw(expr) => expr.clone(),
            OrderBy::Column(col, dir) => {
                let mut sql = dialect.quote_identifier(col);
                sql.push_str(match dir {
                    OrderDirection::Asc => " ASC",
                    OrderDirection::Desc => " DESC",
                });
                sql
            }
        }
    }
}

/// Render ` ORDER BY ...` for a list of terms; empty when there are none.
pub fn order_by_sql(terms: &[OrderBy], dialect: Dialect) -> String {
    if terms.is_empty() {
        return String::new();
    }
    let rendered: Vec<String> = terms.iter().map(|t| t.to_sql(dialect)).collect();
    format!(" ORDER BY {}", rendered.join(", "))
}

/// Render ` ORDER BY ... LIMIT n` in the form MySQL, SQLite and Postgres accept.
pub fn order_limit_sql(terms: &[OrderBy], limit: Option<u64>, dialect: Dialect) -> String {
    let mut sql = order_by_sql(terms, dialect);
    if let Some(n) = limit {
        sql.push_str(&format!(" LIMIT {}", n));
    }
    sql
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_terms() {
        let terms = vec![OrderBy::desc("id"), OrderBy::Raw("length(name)".into())];
        assert_eq!(
            order_by_sql(&terms, Dialect::Postgres),
            " ORDER BY \"id\" DESC, length(name)"
        );
        assert_eq!(order_by_sql(&[], Dialect::Postgres), "");
    }

    #[test]
    fn test_order_limit() {
        assert_eq!(
            order_limit_sql(&[OrderBy::asc("n")], Some(3), Dialect::Mysql),
            " ORDER BY `n` ASC LIMIT 3"
        );
        assert_eq!(order_limit_sql(&[], Some(1), Dialect::Sqlite), " LIMIT 1");
    }
}
