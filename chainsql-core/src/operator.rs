//! SQL operator types and conversions

use std::borrow::Cow;
use std::fmt::{self, Display};

/// SQL comparison operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator(Cow<'static, str>);

/// Operator families; each one renders and binds its operand differently
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    /// `col OP ?`
    Comparison,
    /// `col OP ? AND ?`
    Range,
    /// `col OP (?, ?, ...)`
    Membership,
    /// `col OP NULL`, nothing bound
    NullCheck,
}

impl Operator {
    pub const GT: Self = Operator(Cow::Borrowed(">"));
    pub const LT: Self = Operator(Cow::Borrowed("<"));
    pub const EQ: Self = Operator(Cow::Borrowed("="));
    pub const NEQ: Self = Operator(Cow::Borrowed("!="));
    pub const GTE: Self = Operator(Cow::Borrowed(">="));
    pub const LTE: Self = Operator(Cow::Borrowed("<="));
    pub const LIKE: Self = Operator(Cow::Borrowed("LIKE"));
    pub const NOT_LIKE: Self = Operator(Cow::Borrowed("NOT LIKE"));
    pub const ILIKE: Self = Operator(Cow::Borrowed("ILIKE"));
    pub const IN: Self = Operator(Cow::Borrowed("IN"));
    pub const NOT_IN: Self = Operator(Cow::Borrowed("NOT IN"));
    pub const BETWEEN: Self = Operator(Cow::Borrowed("BETWEEN"));
    pub const NOT_BETWEEN: Self = Operator(Cow::Borrowed("NOT BETWEEN"));
    pub const IS: Self = Operator(Cow::Borrowed("IS"));
    pub const IS_NOT: Self = Operator(Cow::Borrowed("IS NOT"));

    /// Create a custom operator for database-specific operations
    ///
    /// # Examples
    /// ```
    /// use chainsql_core::Operator;
    ///
    /// // PostgreSQL full-text search
    /// let fts_op = Operator::custom("@@");
    /// assert_eq!(fts_op.as_str(), "@@");
    /// ```
    pub const fn custom(op: &'static str) -> Self {
        Operator(Cow::Borrowed(op))
    }

    /// Parse operator text. Keywords are upper-cased and whitespace collapsed;
    /// `IS NULL` / `IS NOT NULL` fold into `IS` / `IS NOT`.
    pub fn parse(op: &str) -> Self {
        let normalized = op.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_ascii_uppercase().as_str() {
            ">" => Operator::GT,
            "<" => Operator::LT,
            "=" => Operator::EQ,
            "!=" => Operator::NEQ,
            ">=" => Operator::GTE,
            "<=" => Operator::LTE,
            "LIKE" => Operator::LIKE,
            "NOT LIKE" => Operator::NOT_LIKE,
            "ILIKE" => Operator::ILIKE,
            "IN" => Operator::IN,
            "NOT IN" => Operator::NOT_IN,
            "BETWEEN" => Operator::BETWEEN,
            "NOT BETWEEN" => Operator::NOT_BETWEEN,
            "IS" | "IS NULL" => Operator::IS,
            "IS NOT" | "IS NOT NULL" => Operator::IS_NOT,
            upper if upper.chars().any(|c| c.is_ascii_alphabetic()) => {
                Operator(Cow::Owned(upper.to_string()))
            }
            _ => Operator(Cow::Owned(normalized)),
        }
    }

    /// Get the string representation of the operator
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn kind(&self) -> OperatorKind {
        match self.as_str() {
            "IN" | "NOT IN" => OperatorKind::Membership,
            "BETWEEN" | "NOT BETWEEN" => OperatorKind::Range,
            "IS" | "IS NOT" => OperatorKind::NullCheck,
            _ => OperatorKind::Comparison,
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trait for types that can be converted to SQL operators
pub trait IntoOperator {
    fn into_operator(self) -> Operator;
}

impl IntoOperator for Operator {
    fn into_operator(self) -> Operator {
        self
    }
}

impl IntoOperator for &str {
    fn into_operator(self) -> Operator {
        Operator::parse(self)
    }
}

impl IntoOperator for String {
    fn into_operator(self) -> Operator {
        Operator::parse(&self)
    }
}

/// Convenience module for operator constants
pub mod op {
    use super::Operator;

    pub const GT: Operator = Operator::GT;
    pub const LT: Operator = Operator::LT;
    pub const EQ: Operator = Operator::EQ;
    pub const NEQ: Operator = Operator::NEQ;
    pub const GTE: Operator = Operator::GTE;
    pub const LTE: Operator = Operator::LTE;
    pub const LIKE: Operator = Operator::LIKE;
    pub const NOT_LIKE: Operator = Operator::NOT_LIKE;
    pub const ILIKE: Operator = Operator::ILIKE;
    pub const IN: Operator = Operator::IN;
    pub const NOT_IN: Operator = Operator::NOT_IN;
    pub const BETWEEN: Operator = Operator::BETWEEN;
    pub const NOT_BETWEEN: Operator = Operator::NOT_BETWEEN;
    pub const IS: Operator = Operator::IS;
    pub const IS_NOT: Operator = Operator::IS_NOT;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_constants() {
        assert_eq!(Operator::GT.as_str(), ">");
        assert_eq!(Operator::EQ.as_str(), "=");
        assert_eq!(Operator::NOT_BETWEEN.as_str(), "NOT BETWEEN");
    }

    #[test]
    fn test_string_conversion() {
        assert_eq!(">".into_operator(), Operator::GT);
        assert_eq!("like".into_operator(), Operator::LIKE);
        assert_eq!("not   in".into_operator(), Operator::NOT_IN);
        assert_eq!("is null".into_operator(), Operator::IS);
        assert_eq!("IS NOT NULL".into_operator(), Operator::IS_NOT);
    }

    #[test]
    fn test_unknown_operators_pass_through() {
        assert_eq!("<>".into_operator().as_str(), "<>");
        assert_eq!("regexp".into_operator().as_str(), "REGEXP");
        assert_eq!(Operator::custom("@@").kind(), OperatorKind::Comparison);
    }

    #[test]
    fn test_operator_kinds() {
        assert_eq!(Operator::IN.kind(), OperatorKind::Membership);
        assert_eq!(Operator::NOT_IN.kind(), OperatorKind::Membership);
        assert_eq!(Operator::BETWEEN.kind(), OperatorKind::Range);
        assert_eq!(Operator::IS_NOT.kind(), OperatorKind::NullCheck);
        assert_eq!(Operator::LIKE.kind(), OperatorKind::Comparison);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Operator::GTE), ">=");
        assert_eq!(format!("{}", Operator::NOT_IN), "NOT IN");
    }
}
