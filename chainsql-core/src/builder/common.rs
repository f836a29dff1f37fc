//! Common types and traits shared across all statement renderers

use crate::{Error, IntoOperator, Operator, OperatorKind, Result, Value};

/// An assembled statement: SQL text plus the values aligned with its `?` placeholders
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Number of `?` placeholders outside string literals
    pub fn placeholder_count(&self) -> usize {
        crate::params::count_placeholders(&self.sql)
    }

    /// Fail when the placeholder count and the bind list disagree
    pub fn check_arity(&self) -> Result<()> {
        let placeholders = self.placeholder_count();
        if placeholders != self.params.len() {
            return Err(Error::prepare(format!(
                "statement has {} placeholders but {} parameters were bound",
                placeholders,
                self.params.len()
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Trait for conditions that can be used in WHERE / HAVING / join clauses
pub trait IntoCondition {
    fn into_condition(self) -> (String, Operator, Value);
}

// Shorthand equality: where_(("age", 18))
impl<T> IntoCondition for (&str, T)
where
    T: Into<Value>,
{
    fn into_condition(self) -> (String, Operator, Value) {
        (self.0.to_string(), Operator::EQ, self.1.into())
    }
}

// Explicit operators: where_(("age", op::GT, 18)) or where_(("age", ">", 18))
impl<T, O> IntoCondition for (&str, O, T)
where
    T: Into<Value>,
    O: IntoOperator,
{
    fn into_condition(self) -> (String, Operator, Value) {
        (self.0.to_string(), self.1.into_operator(), self.2.into())
    }
}

/// How conditions are connected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
}

impl std::fmt::Display for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Connector::And => write!(f, "AND"),
            Connector::Or => write!(f, "OR"),
        }
    }
}

/// The operand of a condition, tagged by operator family
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare(Value),
    Range(Value, Value),
    Membership(Vec<Value>),
    NullCheck,
    /// The column text is a self-contained boolean expression; its own `?`s
    /// are filled from the given values
    Raw(Vec<Value>),
}

impl Predicate {
    /// Check that `value` has the shape `operator` needs.
    ///
    /// A comparison with a NULL value is never bound. When `column` is a
    /// whole expression (`createdAt = updatedAt`) it is used as is; against a
    /// bare column it would match nothing, so it is rejected in favour of
    /// `where_null`.
    pub fn for_operator(column: &str, operator: &Operator, value: Value) -> Result<Self> {
        match operator.kind() {
            OperatorKind::Comparison if value.is_null() => {
                if is_bare_column(column) {
                    Err(Error::invalid_condition(format!(
                        "{} {} NULL never matches; use where_null / where_not_null",
                        column, operator
                    )))
                } else {
                    Ok(Predicate::Raw(Vec::new()))
                }
            }
            OperatorKind::Comparison => Ok(Predicate::Compare(value)),
            OperatorKind::NullCheck => Ok(Predicate::NullCheck),
            OperatorKind::Membership => match value {
                Value::Array(values) => Ok(Predicate::Membership(values)),
                other => Err(Error::invalid_condition(format!(
                    "{} expects a list of values, got {}",
                    operator,
                    other.type_name()
                ))),
            },
            OperatorKind::Range => match value {
                Value::Array(values) => match <[Value; 2]>::try_from(values) {
                    Ok([lo, hi]) => Ok(Predicate::Range(lo, hi)),
                    Err(values) => Err(Error::invalid_condition(format!(
                        "{} expects exactly two values, got {}",
                        operator,
                        values.len()
                    ))),
                },
                other => Err(Error::invalid_condition(format!(
                    "{} expects a [low, high] pair, got {}",
                    operator,
                    other.type_name()
                ))),
            },
        }
    }
}

// `users.id`, `login`: identifiers only, nothing that could hold a comparison
fn is_bare_column(column: &str) -> bool {
    !column.is_empty()
        && column
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == '`' || c == '"')
}

/// One WHERE or HAVING entry
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub connector: Connector,
    pub column: String,
    pub operator: Operator,
    pub predicate: Predicate,
}

impl Condition {
    /// Append the rendered condition to `sql` and its values to `params`
    fn render(&self, sql: &mut String, params: &mut Vec<Value>) {
        match &self.predicate {
            Predicate::Compare(value) => {
                sql.push_str(&format!("{} {} ?", self.column, self.operator));
                params.push(value.clone());
            }
            Predicate::Range(lo, hi) => {
                sql.push_str(&format!("{} {} ? AND ?", self.column, self.operator));
                params.push(lo.clone());
                params.push(hi.clone());
            }
            Predicate::Membership(values) if values.is_empty() => {
                sql.push_str(empty_membership(&self.operator));
            }
            Predicate::Membership(values) => {
                let placeholders = vec!["?"; values.len()].join(", ");
                sql.push_str(&format!("{} {} ({})", self.column, self.operator, placeholders));
                params.extend(values.iter().cloned());
            }
            Predicate::NullCheck => {
                sql.push_str(&format!("{} {} NULL", self.column, self.operator));
            }
            Predicate::Raw(values) => {
                sql.push_str(&self.column);
                params.extend(values.iter().cloned());
            }
        }
    }
}

/// Stand-in for a membership test against an empty list. `IN ()` is not
/// valid SQL, so the truth value is kept instead.
pub(crate) fn empty_membership(operator: &Operator) -> &'static str {
    if *operator == Operator::NOT_IN {
        "1 = 1"
    } else {
        "1 = 0"
    }
}

/// Render a condition list with `keyword` (`WHERE` / `HAVING`) in front.
/// Nothing is written for an empty list.
pub(crate) fn render_conditions(
    keyword: &str,
    conditions: &[Condition],
    sql: &mut String,
    params: &mut Vec<Value>,
) {
    if conditions.is_empty() {
        return;
    }

    sql.push(' ');
    sql.push_str(keyword);
    sql.push(' ');
    for (i, condition) in conditions.iter().enumerate() {
        if i > 0 {
            sql.push_str(&format!(" {} ", condition.connector));
        }
        condition.render(sql, params);
    }
}

/// Trait to convert various types into columns
pub trait IntoColumns {
    fn into_columns(self) -> Vec<String>;
}

impl IntoColumns for &str {
    fn into_columns(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoColumns for String {
    fn into_columns(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoColumns for Vec<String> {
    fn into_columns(self) -> Vec<String> {
        self
    }
}

impl IntoColumns for Vec<&str> {
    fn into_columns(self) -> Vec<String> {
        self.into_iter().map(|s| s.to_string()).collect()
    }
}

impl<const N: usize> IntoColumns for [&str; N] {
    fn into_columns(self) -> Vec<String> {
        self.into_iter().map(|s| s.to_string()).collect()
    }
}

impl IntoColumns for (&str, &str) {
    fn into_columns(self) -> Vec<String> {
        vec![self.0.to_string(), self.1.to_string()]
    }
}

impl IntoColumns for (&str, &str, &str) {
    fn into_columns(self) -> Vec<String> {
        vec![self.0.to_string(), self.1.to_string(), self.2.to_string()]
    }
}

impl IntoColumns for (&str, &str, &str, &str) {
    fn into_columns(self) -> Vec<String> {
        vec![
            self.0.to_string(),
            self.1.to_string(),
            self.2.to_string(),
            self.3.to_string(),
        ]
    }
}

/// JOIN types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    LeftOuter,
    RightOuter,
    Full,
    Cross,
    Natural,
}

impl std::fmt::Display for JoinType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinType::Inner => write!(f, "INNER"),
            JoinType::Left => write!(f, "LEFT"),
            JoinType::Right => write!(f, "RIGHT"),
            JoinType::LeftOuter => write!(f, "LEFT OUTER"),
            JoinType::RightOuter => write!(f, "RIGHT OUTER"),
            JoinType::Full => write!(f, "FULL OUTER"),
            JoinType::Cross => write!(f, "CROSS"),
            JoinType::Natural => write!(f, "NATURAL"),
        }
    }
}

/// A JOIN clause. The condition is raw SQL and is never parameterized.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub table: String,
    pub condition: String,
}

impl JoinClause {
    fn render(&self, sql: &mut String) {
        sql.push_str(&format!(" {} JOIN {}", self.join_type, self.table));
        if !self.condition.is_empty() {
            sql.push_str(" ON ");
            sql.push_str(&self.condition);
        }
    }
}

pub(crate) fn render_joins(joins: &[JoinClause], sql: &mut String) {
    for join in joins {
        join.render(sql);
    }
}

/// Sort direction for ORDER BY clauses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl std::fmt::Display for SortDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "ASC"),
            SortDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// Row limit: a plain count or an `(offset, count)` window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Count(u64),
    Page { offset: u64, count: u64 },
}

impl Limit {
    pub(crate) fn render(&self, sql: &mut String) {
        match self {
            Limit::Count(count) => sql.push_str(&format!(" LIMIT {}", count)),
            Limit::Page { offset, count } => {
                sql.push_str(&format!(" LIMIT {} OFFSET {}", count, offset))
            }
        }
    }
}

/// Trait for the accepted spellings of a limit
pub trait IntoLimit {
    fn into_limit(self) -> Option<Limit>;
}

impl IntoLimit for () {
    fn into_limit(self) -> Option<Limit> {
        None
    }
}

impl IntoLimit for u64 {
    fn into_limit(self) -> Option<Limit> {
        Some(Limit::Count(self))
    }
}

impl IntoLimit for u32 {
    fn into_limit(self) -> Option<Limit> {
        Some(Limit::Count(u64::from(self)))
    }
}

impl IntoLimit for (u64, u64) {
    fn into_limit(self) -> Option<Limit> {
        Some(Limit::Page {
            offset: self.0,
            count: self.1,
        })
    }
}

impl IntoLimit for Limit {
    fn into_limit(self) -> Option<Limit> {
        Some(self)
    }
}

impl IntoLimit for Option<Limit> {
    fn into_limit(self) -> Option<Limit> {
        self
    }
}

/// A column value in INSERT / UPDATE row data
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// Bound as a parameter
    Value(Value),
    /// `col = col + n` (UPDATE only; INSERT binds `n`)
    Inc(i64),
    /// `col = col - n` (UPDATE only; INSERT writes `0 - n`)
    Dec(i64),
    /// SQL expression with its own `?` placeholders, e.g. `NOW()` or `SHA1(?)`
    Func(String, Vec<Value>),
    /// Inlined verbatim; the caller must sanitize it
    Raw(String),
}

impl Field {
    /// Render the right-hand side of `col = ...` (or one VALUES slot)
    pub(crate) fn render(&self, column: &str, for_update: bool, params: &mut Vec<Value>) -> String {
        match self {
            Field::Value(value) => {
                params.push(value.clone());
                "?".to_string()
            }
            // the step is bound as given; negating it could overflow
            Field::Inc(step) if for_update => {
                params.push(Value::I64(*step));
                format!("{} + ?", column)
            }
            Field::Dec(step) if for_update => {
                params.push(Value::I64(*step));
                format!("{} - ?", column)
            }
            Field::Inc(step) => {
                params.push(Value::I64(*step));
                "?".to_string()
            }
            Field::Dec(step) => {
                params.push(Value::I64(*step));
                "(0 - ?)".to_string()
            }
            Field::Func(expr, values) => {
                params.extend(values.iter().cloned());
                expr.clone()
            }
            Field::Raw(expr) => expr.clone(),
        }
    }
}

impl From<Value> for Field {
    fn from(value: Value) -> Self {
        Field::Value(value)
    }
}

macro_rules! field_from_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Field {
                fn from(value: $ty) -> Self {
                    Field::Value(value.into())
                }
            }
        )*
    };
}

field_from_value!(
    (),
    bool,
    i32,
    u32,
    i64,
    f32,
    f64,
    String,
    &String,
    &str,
    serde_json::Value,
);

impl<T> From<Option<T>> for Field
where
    T: Into<Value>,
{
    fn from(value: Option<T>) -> Self {
        Field::Value(value.into())
    }
}

/// `col = col + step`
pub fn inc(step: i64) -> Field {
    Field::Inc(step)
}

/// `col = col - step`
pub fn dec(step: i64) -> Field {
    Field::Dec(step)
}

/// The database's current timestamp
pub fn now() -> Field {
    Field::Func("CURRENT_TIMESTAMP".to_string(), Vec::new())
}

/// An SQL expression with bound arguments, e.g. `func("SHA1(?)", vec!["secret".into()])`
pub fn func(expr: &str, params: Vec<Value>) -> Field {
    Field::Func(expr.to_string(), params)
}

/// Trait for types that can be converted to ordered row data
pub trait IntoRowData {
    fn into_row_data(self) -> Vec<(String, Field)>;
}

impl<K, V> IntoRowData for Vec<(K, V)>
where
    K: Into<String>,
    V: Into<Field>,
{
    fn into_row_data(self) -> Vec<(String, Field)> {
        self.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
    }
}

impl<K, V, const N: usize> IntoRowData for [(K, V); N]
where
    K: Into<String>,
    V: Into<Field>,
{
    fn into_row_data(self) -> Vec<(String, Field)> {
        self.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
    }
}

impl<V> IntoRowData for indexmap::IndexMap<String, V>
where
    V: Into<Field>,
{
    fn into_row_data(self) -> Vec<(String, Field)> {
        self.into_iter().map(|(k, v)| (k, v.into())).collect()
    }
}

impl IntoRowData for serde_json::Map<String, serde_json::Value> {
    fn into_row_data(self) -> Vec<(String, Field)> {
        self.into_iter()
            .map(|(k, v)| (k, Field::Value(json_to_value(v))))
            .collect()
    }
}

/// Scalar JSON maps onto the matching Value; arrays and objects stay JSON
pub(crate) fn json_to_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::I64(i),
            None => n.as_f64().map(Value::F64).unwrap_or(Value::Null),
        },
        serde_json::Value::String(s) => Value::String(s),
        other => Value::Json(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::op;

    fn render(conditions: &[Condition]) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut params = Vec::new();
        render_conditions("WHERE", conditions, &mut sql, &mut params);
        (sql, params)
    }

    fn cond(column: &str, operator: Operator, value: Value) -> Condition {
        let predicate = Predicate::for_operator(column, &operator, value).unwrap();
        Condition {
            connector: Connector::And,
            column: column.to_string(),
            operator,
            predicate,
        }
    }

    #[test]
    fn test_condition_trait_implementations() {
        let (column, operator, value) = ("name", "John").into_condition();
        assert_eq!(column, "name");
        assert_eq!(operator, op::EQ);
        assert_eq!(value, "John".into());

        let (column, operator, value) = ("age", ">", 18).into_condition();
        assert_eq!(column, "age");
        assert_eq!(operator, op::GT);
        assert_eq!(value, 18.into());
    }

    #[test]
    fn test_membership_renders_one_placeholder_per_value() {
        let (sql, params) = render(&[cond("id", op::IN, vec![1, 5, 9].into())]);
        assert_eq!(sql, " WHERE id IN (?, ?, ?)");
        assert_eq!(params, vec![Value::I32(1), Value::I32(5), Value::I32(9)]);
    }

    #[test]
    fn test_empty_membership_keeps_truth_value() {
        let (sql, params) = render(&[cond("id", op::IN, Vec::<i32>::new().into())]);
        assert_eq!(sql, " WHERE 1 = 0");
        assert!(params.is_empty());

        let (sql, _) = render(&[cond("id", op::NOT_IN, Vec::<i32>::new().into())]);
        assert_eq!(sql, " WHERE 1 = 1");
    }

    #[test]
    fn test_range_binds_low_then_high() {
        let (sql, params) = render(&[cond("id", op::BETWEEN, [4, 20].into())]);
        assert_eq!(sql, " WHERE id BETWEEN ? AND ?");
        assert_eq!(params, vec![Value::I32(4), Value::I32(20)]);
    }

    #[test]
    fn test_null_check_binds_nothing() {
        let (sql, params) = render(&[cond("deleted_at", op::IS, "ignored".into())]);
        assert_eq!(sql, " WHERE deleted_at IS NULL");
        assert!(params.is_empty());

        let (sql, params) = render(&[cond("deleted_at", op::IS_NOT, Value::Null)]);
        assert_eq!(sql, " WHERE deleted_at IS NOT NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn test_shape_errors() {
        let err = Predicate::for_operator("id", &op::IN, Value::I32(1)).unwrap_err();
        assert!(matches!(err, Error::InvalidCondition { .. }));

        let err = Predicate::for_operator("id", &op::BETWEEN, vec![1, 2, 3].into()).unwrap_err();
        assert!(err.to_string().contains("exactly two values"));

        let err = Predicate::for_operator("id", &op::NOT_BETWEEN, Value::I32(1)).unwrap_err();
        assert!(matches!(err, Error::InvalidCondition { .. }));
    }

    #[test]
    fn test_null_comparison_operand() {
        let (sql, params) = render(&[cond("createdAt = updatedAt", op::EQ, Value::Null)]);
        assert_eq!(sql, " WHERE createdAt = updatedAt");
        assert!(params.is_empty());

        let err = Predicate::for_operator("u.age", &op::EQ, Value::Null).unwrap_err();
        assert!(matches!(err, Error::InvalidCondition { .. }));
        assert!(err.to_string().contains("where_null"));
    }

    #[test]
    fn test_connectors() {
        let mut second = cond("login", op::EQ, "admin".into());
        second.connector = Connector::Or;
        let (sql, params) = render(&[cond("id", op::EQ, 1.into()), second]);
        assert_eq!(sql, " WHERE id = ? OR login = ?");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_field_rendering() {
        let mut params = Vec::new();
        assert_eq!(inc(2).render("visits", true, &mut params), "visits + ?");
        assert_eq!(dec(3).render("stock", true, &mut params), "stock - ?");
        assert_eq!(now().render("ts", true, &mut params), "CURRENT_TIMESTAMP");
        assert_eq!(
            func("SHA1(?)", vec!["pw".into()]).render("hash", true, &mut params),
            "SHA1(?)"
        );
        assert_eq!(
            params,
            vec![Value::I64(2), Value::I64(3), Value::String("pw".into())]
        );
    }

    #[test]
    fn test_extreme_steps_are_bound_unchanged() {
        let mut params = Vec::new();
        assert_eq!(dec(i64::MIN).render("c", true, &mut params), "c - ?");
        assert_eq!(inc(i64::MIN).render("c", true, &mut params), "c + ?");
        assert_eq!(dec(i64::MIN).render("c", false, &mut params), "(0 - ?)");
        assert_eq!(params, vec![Value::I64(i64::MIN); 3]);
    }

    #[test]
    fn test_row_data_keeps_insertion_order() {
        let data = vec![("login", "admin"), ("firstName", "John")].into_row_data();
        let keys: Vec<_> = data.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["login", "firstName"]);

        let json = serde_json::json!({"z": 1, "a": "x"});
        let data = json.as_object().unwrap().clone().into_row_data();
        assert_eq!(data[0].0, "z");
        assert_eq!(data[0].1, Field::Value(Value::I64(1)));
    }

    #[test]
    fn test_limit_rendering() {
        let mut sql = String::new();
        Limit::Count(10).render(&mut sql);
        assert_eq!(sql, " LIMIT 10");

        let mut sql = String::new();
        (5u64, 10u64).into_limit().unwrap().render(&mut sql);
        assert_eq!(sql, " LIMIT 10 OFFSET 5");
    }

    #[test]
    fn test_arity_check() {
        let stmt = Statement::new("SELECT * FROM t WHERE a = ? AND b = '?'", vec![1.into()]);
        assert_eq!(stmt.placeholder_count(), 1);
        assert!(stmt.check_arity().is_ok());

        let stmt = Statement::new("SELECT * FROM t WHERE a = ?", vec![]);
        assert!(matches!(stmt.check_arity(), Err(Error::Prepare { .. })));
    }
}
