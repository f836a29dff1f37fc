//! Chainsql Core - a fluent query builder and execution wrapper
//!
//! Chained calls accumulate where / having / join / order / group / limit
//! clauses; a terminal operation assembles them into one parameterized
//! statement, binds the values positionally and runs it through an
//! [`Executor`]. Assembly is a pure function of the accumulated
//! [`QueryState`], so it can be tested without a database.

pub mod builder;
pub mod config;
pub mod db;
pub mod error;
pub mod executor;
pub mod operator;
pub mod params;
pub mod value;

// Re-export main types
pub use builder::{
    dec, func, inc, now, Field, IntoColumns, IntoCondition, IntoLimit, IntoRowData, JoinType,
    Limit, QueryState, SortDirection, Statement,
};
pub use config::DbConfig;
pub use db::Db;
pub use error::{Error, Result};
pub use executor::{ExecResult, Executor, PlaceholderStyle, Row, SqlxExecutor};
pub use operator::{op, IntoOperator, Operator, OperatorKind};
pub use value::Value;
