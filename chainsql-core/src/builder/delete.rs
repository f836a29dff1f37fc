//! DELETE statement assembly

use super::common::{render_conditions, Statement};
use super::state::QueryState;
use crate::{Error, Result};

/// Render `DELETE FROM t WHERE ...`. A condition-less delete needs `where_all()`.
pub fn delete(state: &QueryState, table: &str) -> Result<Statement> {
    state.check()?;

    if state.where_conditions.is_empty() && !state.where_all {
        return Err(Error::invalid_query(
            "DELETE requires WHERE condition for safety; call where_all() to delete every row",
        ));
    }

    let mut sql = format!("DELETE FROM {}", table);
    let mut params = Vec::new();
    render_conditions("WHERE", &state.where_conditions, &mut sql, &mut params);

    Ok(Statement::new(sql, params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::op;
    use crate::Value;

    #[test]
    fn test_delete_builder() {
        let mut state = QueryState::new();
        state.where_(("age", op::LT, 18));
        let stmt = delete(&state, "users").unwrap();
        assert_eq!(stmt.sql, "DELETE FROM users WHERE age < ?");
        assert_eq!(stmt.params, vec![Value::I32(18)]);
    }

    #[test]
    fn test_delete_multiple_conditions() {
        let mut state = QueryState::new();
        state
            .where_(("age", op::LT, 18))
            .or_where(("status", "inactive"));
        let stmt = delete(&state, "users").unwrap();
        assert_eq!(stmt.sql, "DELETE FROM users WHERE age < ? OR status = ?");
    }

    #[test]
    fn test_delete_without_where_fails() {
        let result = delete(&QueryState::new(), "users");
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("DELETE requires WHERE condition for safety"));
    }

    #[test]
    fn test_delete_everything_when_opted_in() {
        let mut state = QueryState::new();
        state.where_all();
        assert_eq!(delete(&state, "sessions").unwrap().sql, "DELETE FROM sessions");
    }
}
