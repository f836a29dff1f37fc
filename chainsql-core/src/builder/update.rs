//! UPDATE statement assembly

use super::common::{render_conditions, Field, Statement};
use super::state::QueryState;
use crate::{Error, Result};

/// Render `UPDATE t SET a = ?, b = ? WHERE ...`.
///
/// SET values are bound before WHERE values since their placeholders come
/// first in the text. Without a WHERE condition the chain must have opted in
/// with `where_all()`.
pub fn update(state: &QueryState, table: &str, data: &[(String, Field)]) -> Result<Statement> {
    state.check()?;

    if data.is_empty() {
        return Err(Error::invalid_query(format!(
            "UPDATE {} requires at least one column to set",
            table
        )));
    }
    if state.where_conditions.is_empty() && !state.where_all {
        return Err(Error::invalid_query(
            "UPDATE requires WHERE condition for safety; call where_all() to update every row",
        ));
    }

    let mut params = Vec::new();
    let assignments: Vec<String> = data
        .iter()
        .map(|(column, field)| format!("{} = {}", column, field.render(column, true, &mut params)))
        .collect();

    let mut sql = format!("UPDATE {} SET {}", table, assignments.join(", "));
    render_conditions("WHERE", &state.where_conditions, &mut sql, &mut params);

    Ok(Statement::new(sql, params))
}
