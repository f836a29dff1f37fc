//! INSERT / REPLACE statement assembly

use super::common::{Field, Statement};
use crate::{Error, Result};

/// Statement verb for row inserts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertVerb {
    #[default]
    Insert,
    /// MySQL / SQLite `REPLACE INTO`
    Replace,
}

impl std::fmt::Display for InsertVerb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InsertVerb::Insert => write!(f, "INSERT"),
            InsertVerb::Replace => write!(f, "REPLACE"),
        }
    }
}

/// Render `INSERT INTO t (a,b) VALUES (?,?)` for one row.
///
/// Columns keep the row's insertion order and values bind in that same order.
pub fn insert(table: &str, row: &[(String, Field)], verb: InsertVerb) -> Result<Statement> {
    if row.is_empty() {
        return Err(Error::invalid_query(format!(
            "{} into {} requires at least one column",
            verb, table
        )));
    }

    let columns: Vec<&str> = row.iter().map(|(column, _)| column.as_str()).collect();
    let mut params = Vec::with_capacity(row.len());
    let slots: Vec<String> = row
        .iter()
        .map(|(column, field)| field.render(column, false, &mut params))
        .collect();

    let sql = format!(
        "{} INTO {} ({}) VALUES ({})",
        verb,
        table,
        columns.join(","),
        slots.join(",")
    );

    Ok(Statement::new(sql, params))
}
