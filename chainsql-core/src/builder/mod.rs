//! Query builder module
//!
//! [`QueryState`] accumulates clauses; the renderers turn it into a
//! [`Statement`] without touching a connection.

pub mod common;
pub mod delete;
pub mod insert;
pub mod select;
pub mod state;
pub mod update;

pub use common::{
    dec, func, inc, now, Condition, Connector, Field, IntoColumns, IntoCondition, IntoLimit,
    IntoRowData, JoinClause, JoinType, Limit, Predicate, SortDirection, Statement,
};
pub use insert::InsertVerb;
pub use state::QueryState;
