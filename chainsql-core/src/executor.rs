//! Statement execution interface
//!
//! [`Executor`] is the narrow contract the builder needs from a database
//! client: run one statement, fetch rows, and drive a transaction.
//! [`SqlxExecutor`] implements it over sqlx's `Any` driver.

use std::future::Future;

use indexmap::IndexMap;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyConnection, AnyPool, Column, Connection, Row as _, TypeInfo, ValueRef};

use crate::builder::Statement;
use crate::config::DbConfig;
use crate::{Error, Result, Value};

/// One fetched record, columns in select order
pub type Row = IndexMap<String, Value>;

/// Outcome of a statement that returns no rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: u64,
    pub last_insert_id: Option<i64>,
}

/// Trait for anything that can run assembled statements
pub trait Executor: Send {
    /// Execute a statement that returns no rows (INSERT, UPDATE, DELETE)
    fn execute(&mut self, stmt: &Statement) -> impl Future<Output = Result<ExecResult>> + Send;

    /// Execute a statement and collect every row
    fn fetch_all(&mut self, stmt: &Statement) -> impl Future<Output = Result<Vec<Row>>> + Send;

    /// Start a transaction; following statements run inside it
    fn begin(&mut self) -> impl Future<Output = Result<()>> + Send;

    fn commit(&mut self) -> impl Future<Output = Result<()>> + Send;

    fn rollback(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Check that the database is reachable
    fn ping(&mut self) -> impl Future<Output = Result<()>> + Send;

    fn in_transaction(&self) -> bool;
}

/// How the driver spells positional placeholders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaceholderStyle {
    /// `?` (MySQL, SQLite)
    #[default]
    Question,
    /// `$1, $2, ...` (PostgreSQL)
    Dollar,
}

impl PlaceholderStyle {
    pub fn for_url(url: &str) -> Self {
        if url.starts_with("postgres") {
            PlaceholderStyle::Dollar
        } else {
            PlaceholderStyle::Question
        }
    }

    pub fn apply(&self, sql: &str) -> String {
        match self {
            PlaceholderStyle::Question => sql.to_string(),
            PlaceholderStyle::Dollar => crate::params::rewrite_dollar_placeholders(sql),
        }
    }
}

/// SQLx `Any` pool wrapper holding at most one open transaction
pub struct SqlxExecutor {
    pool: AnyPool,
    tx: Option<sqlx::Transaction<'static, sqlx::Any>>,
    placeholders: PlaceholderStyle,
}

impl SqlxExecutor {
    /// Open a pool for `config.url`; the driver is picked from the URL scheme
    pub async fn connect(config: &DbConfig) -> Result<Self> {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| Error::connection(e.to_string()))?;
        Ok(Self::from_pool(pool, PlaceholderStyle::for_url(&config.url)))
    }

    /// Create from an existing AnyPool
    pub fn from_pool(pool: AnyPool, placeholders: PlaceholderStyle) -> Self {
        Self {
            pool,
            tx: None,
            placeholders,
        }
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }
}

impl Executor for SqlxExecutor {
    async fn execute(&mut self, stmt: &Statement) -> Result<ExecResult> {
        let sql = self.placeholders.apply(&stmt.sql);
        let query = bind_values(sqlx::query(&sql), &stmt.params);

        // the id lookup has to run on the connection that did the insert
        let mut pooled: PoolConnection<Any>;
        let conn: &mut AnyConnection = match self.tx.as_mut() {
            Some(tx) => &mut **tx,
            None => {
                pooled = self.pool.acquire().await?;
                &mut *pooled
            }
        };

        let result = query.execute(&mut *conn).await?;
        let mut last_insert_id = result.last_insert_id();

        // SQLite's Any bridge never reports the rowid
        if last_insert_id.is_none()
            && result.rows_affected() > 0
            && conn.backend_name() == "SQLite"
            && is_insert(&sql)
        {
            let id: i64 = sqlx::query_scalar("SELECT last_insert_rowid()")
                .fetch_one(&mut *conn)
                .await?;
            last_insert_id = Some(id);
        }

        Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id,
        })
    }

    async fn fetch_all(&mut self, stmt: &Statement) -> Result<Vec<Row>> {
        let sql = self.placeholders.apply(&stmt.sql);
        let query = bind_values(sqlx::query(&sql), &stmt.params);
        let rows = match self.tx.as_mut() {
            Some(tx) => query.fetch_all(&mut **tx).await?,
            None => query.fetch_all(&self.pool).await?,
        };
        rows.iter().map(decode_row).collect()
    }

    async fn begin(&mut self) -> Result<()> {
        if self.tx.is_some() {
            return Err(Error::invalid_query("a transaction is already in progress"));
        }
        self.tx = Some(self.pool.begin().await?);
        tracing::debug!(target: "chainsql::sql", "transaction started");
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| Error::invalid_query("no transaction in progress"))?;
        tx.commit().await?;
        tracing::debug!(target: "chainsql::sql", "transaction committed");
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| Error::invalid_query("no transaction in progress"))?;
        tx.rollback().await?;
        tracing::debug!(target: "chainsql::sql", "transaction rolled back");
        Ok(())
    }

    async fn ping(&mut self) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| Error::connection(e.to_string()))?;
        conn.ping()
            .await
            .map_err(|e| Error::connection(e.to_string()))
    }

    fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }
}

fn is_insert(sql: &str) -> bool {
    let head = sql.trim_start();
    ["INSERT", "REPLACE"].iter().any(|verb| {
        head.get(..verb.len())
            .is_some_and(|word| word.eq_ignore_ascii_case(verb))
    })
}

/// Bind Values to a SQLx query in order
fn bind_values<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>>,
    params: &'q [Value],
) -> sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>> {
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<i32>),
            Value::Bool(b) => query.bind(*b),
            Value::I32(i) => query.bind(*i),
            Value::I64(i) => query.bind(*i),
            Value::F32(f) => query.bind(*f),
            Value::F64(f) => query.bind(*f),
            Value::String(s) => query.bind(s.as_str()),
            Value::Bytes(b) => query.bind(b.as_slice()),
            // the Any driver has no JSON type; bind the text form
            Value::Json(j) => query.bind(j.to_string()),
            Value::Array(_) => query.bind(param.to_json().to_string()),
        };
    }
    query
}

fn decode_row(row: &AnyRow) -> Result<Row> {
    let mut record = Row::with_capacity(row.columns().len());
    for column in row.columns() {
        let i = column.ordinal();
        let value = decode_column(row, i)?;
        record.insert(column.name().to_string(), value);
    }
    Ok(record)
}

/// Decode by the type of the cell itself. The Any driver stores NULL as its
/// own kind and `ValueRef::is_null` is always false there, so the name is the
/// only reliable signal.
fn decode_column(row: &AnyRow, i: usize) -> Result<Value> {
    let raw = row.try_get_raw(i)?;
    let type_info = raw.type_info();

    let decoded = match type_info.name() {
        "NULL" => return Ok(Value::Null),
        "BOOLEAN" => row.try_get::<bool, _>(i).map(Value::Bool),
        "SMALLINT" => row.try_get::<i16, _>(i).map(|v| Value::I32(i32::from(v))),
        "INTEGER" => row.try_get::<i32, _>(i).map(Value::I32),
        "BIGINT" => row.try_get::<i64, _>(i).map(Value::I64),
        "REAL" => row.try_get::<f32, _>(i).map(Value::F32),
        "DOUBLE" => row.try_get::<f64, _>(i).map(Value::F64),
        "BLOB" => row.try_get::<Vec<u8>, _>(i).map(Value::Bytes),
        _ => row.try_get::<String, _>(i).map(Value::String),
    };

    match decoded {
        Ok(value) => Ok(value),
        // the driver's kind and the Rust decoder can still disagree; take
        // whatever decodes
        Err(_) => row
            .try_get::<i64, _>(i)
            .map(Value::I64)
            .or_else(|_| row.try_get::<f64, _>(i).map(Value::F64))
            .or_else(|_| row.try_get::<String, _>(i).map(Value::String))
            .or_else(|_| row.try_get::<Vec<u8>, _>(i).map(Value::Bytes))
            .map_err(|e| Error::execution(format!("cannot decode column {}: {}", column_label(row, i), e))),
    }
}

fn column_label(row: &AnyRow, i: usize) -> String {
    row.columns()
        .get(i)
        .map(|c| c.name().to_string())
        .unwrap_or_else(|| i.to_string())
}
