//! SELECT statement assembly
//!
//! Clause order is fixed: columns, FROM, joins, WHERE, GROUP BY, HAVING,
//! ORDER BY, LIMIT.

use super::common::{render_conditions, render_joins, Statement};
use super::state::QueryState;
use crate::Result;

/// Render the SELECT for `table` (already prefixed)
pub fn select(state: &QueryState, table: &str) -> Result<Statement> {
    state.check()?;

    let mut sql = String::new();
    let mut params = Vec::new();

    sql.push_str("SELECT ");
    if state.columns.is_empty() {
        sql.push('*');
    } else {
        sql.push_str(&state.columns.join(", "));
    }
    sql.push_str(" FROM ");
    sql.push_str(table);

    render_body(state, &mut sql, &mut params);

    if !state.order_by.is_empty() {
        let parts: Vec<String> = state
            .order_by
            .iter()
            .map(|(expr, direction)| format!("{} {}", expr, direction))
            .collect();
        sql.push_str(" ORDER BY ");
        sql.push_str(&parts.join(", "));
    }

    if let Some(limit) = &state.limit {
        limit.render(&mut sql);
    }

    Ok(Statement::new(sql, params))
}

/// `SELECT EXISTS(SELECT 1 FROM t ...)`; ordering and limit are irrelevant and dropped
pub fn exists(state: &QueryState, table: &str) -> Result<Statement> {
    state.check()?;

    let mut sql = format!("SELECT EXISTS(SELECT 1 FROM {}", table);
    let mut params = Vec::new();
    render_body(state, &mut sql, &mut params);
    sql.push(')');

    Ok(Statement::new(sql, params))
}

/// Count every row the SELECT would match if it had no LIMIT
pub fn total_count(state: &QueryState, table: &str) -> Result<Statement> {
    state.check()?;

    let mut sql = String::from("SELECT COUNT(*) FROM (SELECT ");
    let mut params = Vec::new();
    if state.columns.is_empty() {
        sql.push('*');
    } else {
        sql.push_str(&state.columns.join(", "));
    }
    sql.push_str(" FROM ");
    sql.push_str(table);
    render_body(state, &mut sql, &mut params);
    sql.push_str(") AS chainsql_total");

    Ok(Statement::new(sql, params))
}

// joins, WHERE, GROUP BY, HAVING
fn render_body(state: &QueryState, sql: &mut String, params: &mut Vec<crate::Value>) {
    render_joins(&state.join_clauses, sql);
    render_conditions("WHERE", &state.where_conditions, sql, params);

    if !state.group_by.is_empty() {
        sql.push_str(" GROUP BY ");
        sql.push_str(&state.group_by.join(", "));
    }

    render_conditions("HAVING", &state.having_conditions, sql, params);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{JoinType, SortDirection};
    use crate::operator::op;
    use crate::{Error, Value};

    #[test]
    fn test_simple_select() {
        let stmt = select(&QueryState::new(), "users").unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM users");
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_where_chain() {
        let mut state = QueryState::new();
        state.where_(("id", 1)).where_(("login", "=", "admin"));

        let stmt = select(&state, "users").unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM users WHERE id = ? AND login = ?");
        assert_eq!(stmt.params, vec![Value::I32(1), Value::from("admin")]);
    }

    #[test]
    fn test_between() {
        let mut state = QueryState::new();
        state.where_(("id", op::BETWEEN, [4, 20]));

        let stmt = select(&state, "users").unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM users WHERE id BETWEEN ? AND ?");
        assert_eq!(stmt.params, vec![Value::I32(4), Value::I32(20)]);
    }

    #[test]
    fn test_in_has_one_placeholder_per_value() {
        let values = vec![3, 1, 4, 1, 5];
        let mut state = QueryState::new();
        state.where_(("active", true)).where_(("id", "IN", values.clone()));

        let stmt = select(&state, "users").unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT * FROM users WHERE active = ? AND id IN (?, ?, ?, ?, ?)"
        );
        let expected: Vec<Value> = values.into_iter().map(Value::from).collect();
        assert_eq!(&stmt.params[1..], expected.as_slice());
        assert_eq!(stmt.placeholder_count(), stmt.params.len());
    }

    #[test]
    fn test_null_checks_bind_nothing() {
        let mut state = QueryState::new();
        state
            .where_(("deleted_at", "IS", "whatever"))
            .or_where(("banned_at", op::IS_NOT, ()));

        let stmt = select(&state, "users").unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT * FROM users WHERE deleted_at IS NULL OR banned_at IS NOT NULL"
        );
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_full_clause_order() {
        let mut state = QueryState::new();
        state
            .select(("u.name", "COUNT(o.id) AS orders"))
            .join("orders o", "o.userId = u.id", JoinType::Left)
            .where_(("u.active", 1))
            .group_by("u.name")
            .having(("COUNT(o.id)", op::GT, 2))
            .order_by("orders", SortDirection::Desc)
            .order_by("u.name", SortDirection::Asc)
            .limit((20u64, 10u64));

        let stmt = select(&state, "users u").unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT u.name, COUNT(o.id) AS orders FROM users u \
             LEFT JOIN orders o ON o.userId = u.id \
             WHERE u.active = ? GROUP BY u.name HAVING COUNT(o.id) > ? \
             ORDER BY orders DESC, u.name ASC LIMIT 10 OFFSET 20"
        );
        assert_eq!(stmt.params, vec![Value::I32(1), Value::I32(2)]);
    }

    #[test]
    fn test_raw_predicates() {
        let mut state = QueryState::new();
        state
            .where_raw("createdAt = updatedAt")
            .where_raw_params("(id = ? OR id = ?)", vec![1.into(), 2.into()]);

        let stmt = select(&state, "users").unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT * FROM users WHERE createdAt = updatedAt AND (id = ? OR id = ?)"
        );
        assert_eq!(stmt.params.len(), 2);
    }

    #[test]
    fn test_order_by_values() {
        let mut state = QueryState::new();
        state.order_by_values("status", SortDirection::Desc, vec!["new", "open"]);
        let stmt = select(&state, "tickets").unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT * FROM tickets ORDER BY FIELD(status, 'new', 'open') DESC"
        );
    }

    #[test]
    fn test_exists() {
        let mut state = QueryState::new();
        state
            .where_(("login", "admin"))
            .order_by("id", SortDirection::Asc)
            .limit(5u64);

        let stmt = exists(&state, "users").unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT EXISTS(SELECT 1 FROM users WHERE login = ?)"
        );
        assert_eq!(stmt.params, vec![Value::from("admin")]);

        let stmt = exists(&QueryState::new(), "users").unwrap();
        assert_eq!(stmt.sql, "SELECT EXISTS(SELECT 1 FROM users)");
    }

    #[test]
    fn test_total_count_drops_order_and_limit() {
        let mut state = QueryState::new();
        state
            .where_(("age", op::GTE, 18))
            .order_by("id", SortDirection::Desc)
            .limit((0u64, 10u64));

        let stmt = total_count(&state, "users").unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT COUNT(*) FROM (SELECT * FROM users WHERE age >= ?) AS chainsql_total"
        );
        assert_eq!(stmt.params, vec![Value::I32(18)]);
    }

    #[test]
    fn test_recorded_shape_error_blocks_rendering() {
        let mut state = QueryState::new();
        state.where_(("id", op::NOT_IN, "1,2,3"));
        assert!(matches!(
            select(&state, "users"),
            Err(Error::InvalidCondition { .. })
        ));
    }
}
