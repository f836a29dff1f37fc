//! Per-chain clause accumulator
//!
//! A [`QueryState`] collects where/having conditions, joins, ordering,
//! grouping, the column list and the limit of one call chain. Statement
//! renderers in the sibling modules read it; [`crate::Db`] owns one and takes
//! it (leaving an empty one behind) at every terminal operation.

use indexmap::IndexMap;

use super::common::{
    empty_membership, Condition, Connector, IntoColumns, IntoCondition, IntoLimit, JoinClause,
    JoinType, Limit, Predicate, SortDirection,
};
use crate::value::quote_literal;
use crate::{Error, Result, Value};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryState {
    pub where_conditions: Vec<Condition>,
    pub join_clauses: Vec<JoinClause>,
    pub having_conditions: Vec<Condition>,
    pub order_by: IndexMap<String, SortDirection>,
    pub group_by: Vec<String>,
    pub columns: Vec<String>,
    pub limit: Option<Limit>,
    pub with_total_count: bool,
    pub where_all: bool,
    /// First input-shape error of the chain, reported by the terminal operation
    pub pending_error: Option<String>,
}

impl QueryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no clause has been accumulated
    pub fn is_empty(&self) -> bool {
        self.where_conditions.is_empty()
            && self.join_clauses.is_empty()
            && self.having_conditions.is_empty()
            && self.order_by.is_empty()
            && self.group_by.is_empty()
            && self.columns.is_empty()
            && self.limit.is_none()
            && !self.with_total_count
            && !self.where_all
            && self.pending_error.is_none()
    }

    /// Return the recorded input error, if the chain produced one
    pub fn check(&self) -> Result<()> {
        match &self.pending_error {
            Some(message) => Err(Error::invalid_condition(message.clone())),
            None => Ok(()),
        }
    }

    fn record_error(&mut self, err: Error) {
        if self.pending_error.is_none() {
            let message = match err {
                Error::InvalidCondition { message } => message,
                other => other.to_string(),
            };
            self.pending_error = Some(message);
        }
    }

    fn push_condition<C>(&mut self, having: bool, connector: Connector, condition: C) -> &mut Self
    where
        C: IntoCondition,
    {
        let (column, operator, value) = condition.into_condition();
        match Predicate::for_operator(&column, &operator, value) {
            Ok(predicate) => {
                let condition = Condition {
                    connector,
                    column,
                    operator,
                    predicate,
                };
                if having {
                    self.having_conditions.push(condition);
                } else {
                    self.where_conditions.push(condition);
                }
            }
            Err(err) => self.record_error(err),
        }
        self
    }

    fn push_raw(&mut self, having: bool, connector: Connector, expr: &str, params: Vec<Value>) -> &mut Self {
        let condition = Condition {
            connector,
            column: expr.to_string(),
            operator: crate::Operator::EQ,
            predicate: Predicate::Raw(params),
        };
        if having {
            self.having_conditions.push(condition);
        } else {
            self.where_conditions.push(condition);
        }
        self
    }

    /// Add a WHERE condition. A NULL value is not bound; see
    /// [`Predicate::for_operator`].
    pub fn where_<C>(&mut self, condition: C) -> &mut Self
    where
        C: IntoCondition,
    {
        self.push_condition(false, Connector::And, condition)
    }

    /// Add an OR WHERE condition
    pub fn or_where<C>(&mut self, condition: C) -> &mut Self
    where
        C: IntoCondition,
    {
        self.push_condition(false, Connector::Or, condition)
    }

    /// Add a self-contained boolean expression; nothing is bound.
    /// The expression is inlined verbatim, so it must not carry user input.
    pub fn where_raw(&mut self, expr: &str) -> &mut Self {
        self.push_raw(false, Connector::And, expr, Vec::new())
    }

    pub fn or_where_raw(&mut self, expr: &str) -> &mut Self {
        self.push_raw(false, Connector::Or, expr, Vec::new())
    }

    /// Add an expression carrying its own `?` placeholders, e.g. `"(id = ? OR id = ?)"`
    pub fn where_raw_params(&mut self, expr: &str, params: Vec<Value>) -> &mut Self {
        self.push_raw(false, Connector::And, expr, params)
    }

    pub fn where_in<V>(&mut self, column: &str, values: Vec<V>) -> &mut Self
    where
        V: Into<Value>,
    {
        self.where_((column, crate::Operator::IN, values))
    }

    pub fn where_not_in<V>(&mut self, column: &str, values: Vec<V>) -> &mut Self
    where
        V: Into<Value>,
    {
        self.where_((column, crate::Operator::NOT_IN, values))
    }

    pub fn where_between<V>(&mut self, column: &str, low: V, high: V) -> &mut Self
    where
        V: Into<Value>,
    {
        self.where_((column, crate::Operator::BETWEEN, vec![low.into(), high.into()]))
    }

    pub fn where_not_between<V>(&mut self, column: &str, low: V, high: V) -> &mut Self
    where
        V: Into<Value>,
    {
        self.where_((column, crate::Operator::NOT_BETWEEN, vec![low.into(), high.into()]))
    }

    pub fn where_null(&mut self, column: &str) -> &mut Self {
        self.where_((column, crate::Operator::IS, ()))
    }

    pub fn where_not_null(&mut self, column: &str) -> &mut Self {
        self.where_((column, crate::Operator::IS_NOT, ()))
    }

    /// Add a HAVING condition
    pub fn having<C>(&mut self, condition: C) -> &mut Self
    where
        C: IntoCondition,
    {
        self.push_condition(true, Connector::And, condition)
    }

    /// Add an OR HAVING condition
    pub fn or_having<C>(&mut self, condition: C) -> &mut Self
    where
        C: IntoCondition,
    {
        self.push_condition(true, Connector::Or, condition)
    }

    pub fn having_raw(&mut self, expr: &str, params: Vec<Value>) -> &mut Self {
        self.push_raw(true, Connector::And, expr, params)
    }

    /// Add a JOIN; `condition` is raw SQL and is not parameterized
    pub fn join(&mut self, table: &str, condition: &str, join_type: JoinType) -> &mut Self {
        self.join_clauses.push(JoinClause {
            join_type,
            table: table.to_string(),
            condition: condition.to_string(),
        });
        self
    }

    /// Append `AND col OP 'literal'` to the latest join on `table`.
    ///
    /// The value is spliced into the SQL text, not bound. Only pass trusted
    /// values; use `where_` for anything that comes from a user.
    pub fn join_where_raw<C>(&mut self, table: &str, condition: C) -> &mut Self
    where
        C: IntoCondition,
    {
        self.push_join_literal(table, Connector::And, condition)
    }

    /// Append `OR col OP 'literal'` to the latest join on `table`. Same caveats
    /// as [`QueryState::join_where_raw`].
    pub fn join_or_where_raw<C>(&mut self, table: &str, condition: C) -> &mut Self
    where
        C: IntoCondition,
    {
        self.push_join_literal(table, Connector::Or, condition)
    }

    fn push_join_literal<C>(&mut self, table: &str, connector: Connector, condition: C) -> &mut Self
    where
        C: IntoCondition,
    {
        let (column, operator, value) = condition.into_condition();
        let fragment = Predicate::for_operator(&column, &operator, value).map(|predicate| {
            render_literal_condition(&column, &operator, &predicate)
        });
        let fragment = match fragment {
            Ok(fragment) => fragment,
            Err(err) => {
                self.record_error(err);
                return self;
            }
        };

        match self.join_clauses.iter_mut().rev().find(|join| join.table == table) {
            Some(join) => {
                if join.condition.is_empty() {
                    join.condition = fragment;
                } else {
                    join.condition = format!("{} {} {}", join.condition, connector, fragment);
                }
            }
            None => self.record_error(Error::invalid_condition(format!(
                "no join on table '{}' to attach a condition to",
                table
            ))),
        }
        self
    }

    /// Add an ORDER BY entry; ordering the same expression again only updates its direction
    pub fn order_by(&mut self, column: &str, direction: SortDirection) -> &mut Self {
        self.order_by.insert(column.to_string(), direction);
        self
    }

    /// Order by an explicit enumeration of values, rendered as `FIELD(col, 'a', 'b')`
    pub fn order_by_values<V>(&mut self, column: &str, direction: SortDirection, values: Vec<V>) -> &mut Self
    where
        V: Into<Value>,
    {
        let literals: Vec<String> = values
            .into_iter()
            .map(|value| match value.into() {
                Value::String(s) => quote_literal(&s),
                other => quote_literal(&other.to_sql_literal()),
            })
            .collect();
        let expr = format!("FIELD({}, {})", column, literals.join(", "));
        self.order_by.insert(expr, direction);
        self
    }

    /// Add a GROUP BY expression; duplicates are kept
    pub fn group_by(&mut self, column: &str) -> &mut Self {
        self.group_by.push(column.to_string());
        self
    }

    /// Columns for the next SELECT (default `*`)
    pub fn select<C>(&mut self, columns: C) -> &mut Self
    where
        C: IntoColumns,
    {
        self.columns.extend(columns.into_columns());
        self
    }

    pub fn limit<L>(&mut self, limit: L) -> &mut Self
    where
        L: IntoLimit,
    {
        self.limit = limit.into_limit();
        self
    }

    /// Also count the rows the next SELECT would match without its LIMIT
    pub fn with_total_count(&mut self) -> &mut Self {
        self.with_total_count = true;
        self
    }

    /// Allow the next UPDATE / DELETE to run without any WHERE condition
    pub fn where_all(&mut self) -> &mut Self {
        self.where_all = true;
        self
    }
}

fn render_literal_condition(column: &str, operator: &crate::Operator, predicate: &Predicate) -> String {
    match predicate {
        Predicate::Compare(value) => format!("{} {} {}", column, operator, value.to_sql_literal()),
        Predicate::Range(lo, hi) => format!(
            "{} {} {} AND {}",
            column,
            operator,
            lo.to_sql_literal(),
            hi.to_sql_literal()
        ),
        Predicate::Membership(values) if values.is_empty() => {
            empty_membership(operator).to_string()
        }
        Predicate::Membership(values) => {
            let literals: Vec<String> = values.iter().map(Value::to_sql_literal).collect();
            format!("{} {} ({})", column, operator, literals.join(", "))
        }
        Predicate::NullCheck => format!("{} {} NULL", column, operator),
        Predicate::Raw(_) => column.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::op;

    #[test]
    fn test_conditions_accumulate_in_order() {
        let mut state = QueryState::new();
        state.where_(("id", 1)).or_where(("login", "admin"));

        assert_eq!(state.where_conditions.len(), 2);
        assert_eq!(state.where_conditions[0].connector, Connector::And);
        assert_eq!(state.where_conditions[1].connector, Connector::Or);
        assert_eq!(state.where_conditions[1].column, "login");
    }

    #[test]
    fn test_shape_error_is_recorded_once() {
        let mut state = QueryState::new();
        state
            .where_(("id", op::IN, 5))
            .where_(("id", op::BETWEEN, vec![1, 2, 3]));

        assert!(state.where_conditions.is_empty());
        let err = state.check().unwrap_err();
        assert!(matches!(err, Error::InvalidCondition { .. }));
        assert!(err.to_string().contains("IN expects a list"));
    }

    #[test]
    fn test_typed_helpers() {
        let mut state = QueryState::new();
        state
            .where_in("id", vec![1, 2])
            .where_between("age", 18, 30)
            .where_null("deleted_at");

        assert_eq!(
            state.where_conditions[0].predicate,
            Predicate::Membership(vec![Value::I32(1), Value::I32(2)])
        );
        assert_eq!(
            state.where_conditions[1].predicate,
            Predicate::Range(Value::I32(18), Value::I32(30))
        );
        assert_eq!(state.where_conditions[2].predicate, Predicate::NullCheck);
    }

    #[test]
    fn test_order_by_overwrites_direction_in_place() {
        let mut state = QueryState::new();
        state
            .order_by("id", SortDirection::Asc)
            .order_by("login", SortDirection::Asc)
            .order_by("id", SortDirection::Desc);

        let entries: Vec<_> = state.order_by.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        assert_eq!(
            entries,
            vec![("id", SortDirection::Desc), ("login", SortDirection::Asc)]
        );
    }

    #[test]
    fn test_order_by_values() {
        let mut state = QueryState::new();
        state.order_by_values("status", SortDirection::Asc, vec!["active", "it's", "banned"]);
        let (expr, _) = state.order_by.first().unwrap();
        assert_eq!(expr, "FIELD(status, 'active', 'it''s', 'banned')");
    }

    #[test]
    fn test_join_where_raw_attaches_to_latest_matching_join() {
        let mut state = QueryState::new();
        state
            .join("products p", "p.tenantID = u.tenantID", JoinType::Left)
            .join("orders o", "o.userId = u.id", JoinType::Inner)
            .join_where_raw("products p", ("p.active", 1))
            .join_or_where_raw("products p", ("p.name", "it's"));

        assert_eq!(
            state.join_clauses[0].condition,
            "p.tenantID = u.tenantID AND p.active = 1 OR p.name = 'it''s'"
        );
        assert_eq!(state.join_clauses[1].condition, "o.userId = u.id");
        assert!(state.check().is_ok());
    }

    #[test]
    fn test_join_where_raw_with_empty_list() {
        let mut state = QueryState::new();
        state
            .join("products p", "p.id = u.productId", JoinType::Inner)
            .join_where_raw("products p", ("p.kind", op::IN, Vec::<i32>::new()))
            .join_or_where_raw("products p", ("p.kind", op::NOT_IN, Vec::<i32>::new()));

        assert_eq!(
            state.join_clauses[0].condition,
            "p.id = u.productId AND 1 = 0 OR 1 = 1"
        );
        assert!(state.check().is_ok());
    }

    #[test]
    fn test_join_where_raw_without_join_is_an_error() {
        let mut state = QueryState::new();
        state.join_where_raw("missing", ("a", 1));
        assert!(state.check().is_err());
    }

    #[test]
    fn test_group_by_keeps_duplicates() {
        let mut state = QueryState::new();
        state.group_by("name").group_by("name");
        assert_eq!(state.group_by, vec!["name", "name"]);
    }

    #[test]
    fn test_default_state_is_empty() {
        let mut state = QueryState::new();
        assert!(state.is_empty());
        state.limit(10u64);
        assert!(!state.is_empty());
        assert_eq!(std::mem::take(&mut state).limit, Some(Limit::Count(10)));
        assert!(state.is_empty());
    }
}
