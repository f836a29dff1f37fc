//! The fluent database handle
//!
//! A [`Db`] owns one clause accumulator, one executor and the table prefix.
//! Chained calls add clauses; a terminal operation (`get`, `insert`,
//! `update`, `delete`, `has`, `raw_query`, ...) takes the accumulated state,
//! leaving an empty one behind whatever the outcome, renders one statement
//! and runs it.
//!
//! ```no_run
//! use chainsql_core::{op, Db, DbConfig};
//!
//! # async fn demo() -> chainsql_core::Result<()> {
//! let mut db = Db::connect(DbConfig::new("sqlite::memory:")).await?;
//! let adults = db
//!     .where_(("age", op::GTE, 18))
//!     .where_(("active", true))
//!     .get("users")
//!     .await?;
//! println!("{} adults", adults.len());
//! # Ok(())
//! # }
//! ```

use serde::de::DeserializeOwned;

use crate::builder::{
    delete, insert, select, update, InsertVerb, IntoColumns, IntoCondition, IntoLimit,
    IntoRowData, JoinType, Limit, QueryState, SortDirection, Statement,
};
use crate::executor::{ExecResult, Executor, Row, SqlxExecutor};
use crate::{DbConfig, Error, Result, Value};

const DEFAULT_PAGE_LIMIT: u64 = 20;

pub struct Db<E: Executor = SqlxExecutor> {
    executor: E,
    state: QueryState,
    prefix: String,
    page_limit: u64,
    last_query: Option<Statement>,
    last_error: Option<String>,
    count: usize,
    total_count: Option<u64>,
    total_pages: Option<u64>,
}

impl Db<SqlxExecutor> {
    /// Connect through sqlx's `Any` driver
    pub async fn connect(config: DbConfig) -> Result<Self> {
        let executor = SqlxExecutor::connect(&config).await?;
        Ok(Self::with_executor(executor)
            .set_prefix(config.prefix)
            .set_page_limit(config.page_limit))
    }
}

impl<E: Executor> Db<E> {
    pub fn with_executor(executor: E) -> Self {
        Self {
            executor,
            state: QueryState::default(),
            prefix: String::new(),
            page_limit: DEFAULT_PAGE_LIMIT,
            last_query: None,
            last_error: None,
            count: 0,
            total_count: None,
            total_pages: None,
        }
    }

    pub fn set_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn set_page_limit(mut self, page_limit: u64) -> Self {
        self.page_limit = page_limit.max(1);
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut E {
        &mut self.executor
    }

    /// Clauses accumulated so far by the current chain
    pub fn state(&self) -> &QueryState {
        &self.state
    }

    /// The last statement handed to the executor
    pub fn last_query(&self) -> Option<&Statement> {
        self.last_query.as_ref()
    }

    /// Message of the last failed operation; cleared by the next success
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Rows returned by the last select
    pub fn count(&self) -> usize {
        self.count
    }

    /// Unlimited match count of the last select run `with_total_count`
    pub fn total_count(&self) -> Option<u64> {
        self.total_count
    }

    /// Page count of the last `paginate`
    pub fn total_pages(&self) -> Option<u64> {
        self.total_pages
    }

    fn table(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    // ---- clause accumulation ----

    pub fn where_<C>(&mut self, condition: C) -> &mut Self
    where
        C: IntoCondition,
    {
        self.state.where_(condition);
        self
    }

    pub fn or_where<C>(&mut self, condition: C) -> &mut Self
    where
        C: IntoCondition,
    {
        self.state.or_where(condition);
        self
    }

    pub fn where_in<V>(&mut self, column: &str, values: Vec<V>) -> &mut Self
    where
        V: Into<Value>,
    {
        self.state.where_in(column, values);
        self
    }

    pub fn where_not_in<V>(&mut self, column: &str, values: Vec<V>) -> &mut Self
    where
        V: Into<Value>,
    {
        self.state.where_not_in(column, values);
        self
    }

    pub fn where_between<V>(&mut self, column: &str, low: V, high: V) -> &mut Self
    where
        V: Into<Value>,
    {
        self.state.where_between(column, low, high);
        self
    }

    pub fn where_not_between<V>(&mut self, column: &str, low: V, high: V) -> &mut Self
    where
        V: Into<Value>,
    {
        self.state.where_not_between(column, low, high);
        self
    }

    pub fn where_null(&mut self, column: &str) -> &mut Self {
        self.state.where_null(column);
        self
    }

    pub fn where_not_null(&mut self, column: &str) -> &mut Self {
        self.state.where_not_null(column);
        self
    }

    /// Self-contained boolean expression, inlined verbatim; see [`QueryState::where_raw`]
    pub fn where_raw(&mut self, expr: &str) -> &mut Self {
        self.state.where_raw(expr);
        self
    }

    pub fn or_where_raw(&mut self, expr: &str) -> &mut Self {
        self.state.or_where_raw(expr);
        self
    }

    pub fn where_raw_params(&mut self, expr: &str, params: Vec<Value>) -> &mut Self {
        self.state.where_raw_params(expr, params);
        self
    }

    pub fn having<C>(&mut self, condition: C) -> &mut Self
    where
        C: IntoCondition,
    {
        self.state.having(condition);
        self
    }

    pub fn or_having<C>(&mut self, condition: C) -> &mut Self
    where
        C: IntoCondition,
    {
        self.state.or_having(condition);
        self
    }

    pub fn having_raw(&mut self, expr: &str, params: Vec<Value>) -> &mut Self {
        self.state.having_raw(expr, params);
        self
    }

    /// Add a JOIN on the prefixed `table`. The condition is raw SQL.
    pub fn join(&mut self, table: &str, condition: &str, join_type: JoinType) -> &mut Self {
        let table = self.table(table);
        self.state.join(&table, condition, join_type);
        self
    }

    /// Append a literal `AND col OP 'value'` to the latest join on `table`.
    /// The value is inlined, not bound: never pass user input here.
    pub fn join_where_raw<C>(&mut self, table: &str, condition: C) -> &mut Self
    where
        C: IntoCondition,
    {
        let table = self.table(table);
        self.state.join_where_raw(&table, condition);
        self
    }

    /// OR flavour of [`Db::join_where_raw`], with the same caveat
    pub fn join_or_where_raw<C>(&mut self, table: &str, condition: C) -> &mut Self
    where
        C: IntoCondition,
    {
        let table = self.table(table);
        self.state.join_or_where_raw(&table, condition);
        self
    }

    pub fn order_by(&mut self, column: &str, direction: SortDirection) -> &mut Self {
        self.state.order_by(column, direction);
        self
    }

    pub fn order_by_values<V>(&mut self, column: &str, direction: SortDirection, values: Vec<V>) -> &mut Self
    where
        V: Into<Value>,
    {
        self.state.order_by_values(column, direction, values);
        self
    }

    pub fn group_by(&mut self, column: &str) -> &mut Self {
        self.state.group_by(column);
        self
    }

    pub fn select<C>(&mut self, columns: C) -> &mut Self
    where
        C: IntoColumns,
    {
        self.state.select(columns);
        self
    }

    pub fn limit<L>(&mut self, limit: L) -> &mut Self
    where
        L: IntoLimit,
    {
        self.state.limit(limit);
        self
    }

    pub fn with_total_count(&mut self) -> &mut Self {
        self.state.with_total_count();
        self
    }

    /// Allow the next `update` / `delete` to touch every row
    pub fn where_all(&mut self) -> &mut Self {
        self.state.where_all();
        self
    }

    // ---- terminal operations ----

    /// Run the accumulated SELECT against `table`
    pub async fn get(&mut self, table: &str) -> Result<Vec<Row>> {
        let state = std::mem::take(&mut self.state);
        let result = self.select_rows(&state, table).await;
        self.finish(result)
    }

    /// Positional form: `limit` and `columns` override whatever the chain set
    pub async fn get_with<L, C>(&mut self, table: &str, limit: L, columns: C) -> Result<Vec<Row>>
    where
        L: IntoLimit,
        C: IntoColumns,
    {
        let mut state = std::mem::take(&mut self.state);
        state.limit = limit.into_limit();
        state.columns = columns.into_columns();
        let result = self.select_rows(&state, table).await;
        self.finish(result)
    }

    /// First matching row
    pub async fn get_one(&mut self, table: &str) -> Result<Option<Row>> {
        let mut state = std::mem::take(&mut self.state);
        state.limit = Some(Limit::Count(1));
        let result = self
            .select_rows(&state, table)
            .await
            .map(|rows| rows.into_iter().next());
        self.finish(result)
    }

    /// A single column of the first matching row
    pub async fn get_value(&mut self, table: &str, column: &str) -> Result<Option<Value>> {
        let mut state = std::mem::take(&mut self.state);
        state.limit = Some(Limit::Count(1));
        state.columns = vec![column.to_string()];
        let result = self.select_rows(&state, table).await.map(first_value);
        self.finish(result)
    }

    /// Like [`Db::get`], deserializing each row into `T`
    pub async fn get_as<T>(&mut self, table: &str) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let state = std::mem::take(&mut self.state);
        let result = match self.select_rows(&state, table).await {
            Ok(rows) => rows.iter().map(row_into::<T>).collect(),
            Err(err) => Err(err),
        };
        self.finish(result)
    }

    /// Fetch page `page` (1-based) and record `total_count` / `total_pages`
    pub async fn paginate(&mut self, table: &str, page: u64) -> Result<Vec<Row>> {
        let mut state = std::mem::take(&mut self.state);
        let Some(offset) = (page.max(1) - 1).checked_mul(self.page_limit) else {
            return self.finish(Err(Error::invalid_query(format!(
                "page {} is out of range for {} rows per page",
                page, self.page_limit
            ))));
        };
        state.limit = Some(Limit::Page {
            offset,
            count: self.page_limit,
        });
        state.with_total_count = true;

        let result = self.select_rows(&state, table).await;
        if result.is_ok() {
            self.total_pages = self
                .total_count
                .map(|total| total.div_ceil(self.page_limit));
        }
        self.finish(result)
    }

    /// Insert one row; returns the generated id when the driver reports one
    pub async fn insert<D>(&mut self, table: &str, data: D) -> Result<Option<i64>>
    where
        D: IntoRowData,
    {
        self.state = QueryState::default();
        let table = self.table(table);
        let result = match insert::insert(&table, &data.into_row_data(), InsertVerb::Insert) {
            Ok(stmt) => self.exec(stmt).await.map(|r| r.last_insert_id),
            Err(err) => Err(err),
        };
        self.finish(result)
    }

    /// `REPLACE INTO` (MySQL / SQLite)
    pub async fn replace<D>(&mut self, table: &str, data: D) -> Result<Option<i64>>
    where
        D: IntoRowData,
    {
        self.state = QueryState::default();
        let table = self.table(table);
        let result = match insert::insert(&table, &data.into_row_data(), InsertVerb::Replace) {
            Ok(stmt) => self.exec(stmt).await.map(|r| r.last_insert_id),
            Err(err) => Err(err),
        };
        self.finish(result)
    }

    /// Insert several rows, all or nothing. Runs inside its own transaction
    /// unless one is already open.
    pub async fn insert_multi<I>(&mut self, table: &str, rows: I) -> Result<Vec<Option<i64>>>
    where
        I: IntoIterator,
        I::Item: IntoRowData,
    {
        self.state = QueryState::default();
        let table = self.table(table);
        let statements: Result<Vec<Statement>> = rows
            .into_iter()
            .map(|row| insert::insert(&table, &row.into_row_data(), InsertVerb::Insert))
            .collect();
        let result = match statements {
            Ok(statements) => self.insert_all(statements).await,
            Err(err) => Err(err),
        };
        self.finish(result)
    }

    async fn insert_all(&mut self, statements: Vec<Statement>) -> Result<Vec<Option<i64>>> {
        if statements.is_empty() {
            return Ok(Vec::new());
        }

        let owns_tx = !self.executor.in_transaction();
        if owns_tx {
            self.executor.begin().await?;
        }

        let mut ids = Vec::with_capacity(statements.len());
        for stmt in statements {
            match self.exec(stmt).await {
                Ok(result) => ids.push(result.last_insert_id),
                Err(err) => {
                    if owns_tx {
                        if let Err(rollback_err) = self.executor.rollback().await {
                            tracing::warn!(
                                target: "chainsql::sql",
                                error = %rollback_err,
                                "rollback after failed insert_multi failed",
                            );
                        }
                    }
                    return Err(err);
                }
            }
        }

        if owns_tx {
            self.executor.commit().await?;
        }
        Ok(ids)
    }

    /// Apply `data` to the rows matched by the chain; returns the affected count
    pub async fn update<D>(&mut self, table: &str, data: D) -> Result<u64>
    where
        D: IntoRowData,
    {
        let state = std::mem::take(&mut self.state);
        let table = self.table(table);
        let result = match update::update(&state, &table, &data.into_row_data()) {
            Ok(stmt) => self.exec(stmt).await.map(|r| r.rows_affected),
            Err(err) => Err(err),
        };
        self.finish(result)
    }

    /// Delete the rows matched by the chain; true when at least one went away
    pub async fn delete(&mut self, table: &str) -> Result<bool> {
        let state = std::mem::take(&mut self.state);
        let table = self.table(table);
        let result = match delete::delete(&state, &table) {
            Ok(stmt) => self.exec(stmt).await.map(|r| r.rows_affected > 0),
            Err(err) => Err(err),
        };
        self.finish(result)
    }

    /// Whether any row matches the chain's conditions
    pub async fn has(&mut self, table: &str) -> Result<bool> {
        let state = std::mem::take(&mut self.state);
        let table = self.table(table);
        let result = match select::exists(&state, &table) {
            Ok(stmt) => self
                .fetch(stmt)
                .await
                .map(|rows| first_value(rows).is_some_and(|v| v.is_truthy())),
            Err(err) => Err(err),
        };
        self.finish(result)
    }

    /// Run literal SQL with positional `?` parameters
    pub async fn raw_query(&mut self, sql: &str, params: Vec<Value>) -> Result<Vec<Row>> {
        self.state = QueryState::default();
        let result = self.fetch(Statement::new(sql, params)).await;
        self.finish(result)
    }

    pub async fn raw_query_one(&mut self, sql: &str, params: Vec<Value>) -> Result<Option<Row>> {
        self.state = QueryState::default();
        let result = self
            .fetch(Statement::new(sql, params))
            .await
            .map(|rows| rows.into_iter().next());
        self.finish(result)
    }

    /// First column of the first row
    pub async fn raw_query_value(&mut self, sql: &str, params: Vec<Value>) -> Result<Option<Value>> {
        self.state = QueryState::default();
        let result = self.fetch(Statement::new(sql, params)).await.map(first_value);
        self.finish(result)
    }

    /// Run literal SQL with `:name` parameters
    pub async fn raw_query_named(&mut self, sql: &str, named: &[(&str, Value)]) -> Result<Vec<Row>> {
        self.state = QueryState::default();
        let result = match crate::params::bind_named(sql, named) {
            Ok(stmt) => self.fetch(stmt).await,
            Err(err) => Err(err),
        };
        self.finish(result)
    }

    pub async fn start_transaction(&mut self) -> Result<()> {
        let result = self.executor.begin().await;
        self.finish(result)
    }

    pub async fn commit(&mut self) -> Result<()> {
        let result = self.executor.commit().await;
        self.finish(result)
    }

    pub async fn rollback(&mut self) -> Result<()> {
        let result = self.executor.rollback().await;
        self.finish(result)
    }

    pub async fn ping(&mut self) -> Result<()> {
        let result = self.executor.ping().await;
        self.finish(result)
    }

    // ---- plumbing ----

    async fn select_rows(&mut self, state: &QueryState, table: &str) -> Result<Vec<Row>> {
        let table = self.table(table);
        self.count = 0;
        self.total_count = None;
        self.total_pages = None;

        let stmt = select::select(state, &table)?;
        if state.with_total_count {
            let count_stmt = select::total_count(state, &table)?;
            let total = first_value(self.run_fetch(&count_stmt).await?)
                .and_then(|v| v.as_i64())
                .and_then(|n| u64::try_from(n).ok())
                .ok_or_else(|| Error::execution("total count query returned no number"))?;
            self.total_count = Some(total);
        }

        let rows = self.fetch(stmt).await?;
        self.count = rows.len();
        Ok(rows)
    }

    async fn run_fetch(&mut self, stmt: &Statement) -> Result<Vec<Row>> {
        stmt.check_arity()?;
        tracing::debug!(
            target: "chainsql::sql",
            sql = %stmt.sql,
            param_count = stmt.params.len(),
            "fetch",
        );
        let result = self.executor.fetch_all(stmt).await;
        if let Err(err) = &result {
            tracing::warn!(target: "chainsql::sql", sql = %stmt.sql, error = %err, "statement failed");
        }
        result
    }

    async fn fetch(&mut self, stmt: Statement) -> Result<Vec<Row>> {
        let result = self.run_fetch(&stmt).await;
        self.last_query = Some(stmt);
        result
    }

    async fn exec(&mut self, stmt: Statement) -> Result<ExecResult> {
        let result = match stmt.check_arity() {
            Ok(()) => {
                tracing::debug!(
                    target: "chainsql::sql",
                    sql = %stmt.sql,
                    param_count = stmt.params.len(),
                    "execute",
                );
                let result = self.executor.execute(&stmt).await;
                if let Err(err) = &result {
                    tracing::warn!(target: "chainsql::sql", sql = %stmt.sql, error = %err, "statement failed");
                }
                result
            }
            Err(err) => Err(err),
        };
        self.last_query = Some(stmt);
        result
    }

    fn finish<T>(&mut self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.last_error = None,
            Err(err) => self.last_error = Some(err.to_string()),
        }
        result
    }
}

fn first_value(rows: Vec<Row>) -> Option<Value> {
    rows.into_iter()
        .next()
        .and_then(|row| row.into_iter().next().map(|(_, value)| value))
}

fn row_into<T>(row: &Row) -> Result<T>
where
    T: DeserializeOwned,
{
    let object: serde_json::Map<String, serde_json::Value> = row
        .iter()
        .map(|(column, value)| (column.clone(), value.to_json()))
        .collect();
    Ok(serde_json::from_value(serde_json::Value::Object(object))?)
}
