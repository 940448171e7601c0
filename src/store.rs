//! Relational store
//!
//! A single SQLite connection, seeded once at startup and then switched to
//! `query_only` so nothing that reaches it can write. Every query runs under
//! a wall-clock budget enforced by SQLite's progress handler, so a runaway
//! statement cannot hold the connection indefinitely.

use crate::config::IN_MEMORY;
use crate::error::{AppError, Result};
use crate::result::{CellValue, ResultSet};
use crate::schema::SchemaDescriptor;
use crate::seed;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, ErrorCode};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::info;

pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// VM instructions between deadline checks.
const PROGRESS_STEPS: i32 = 1_000;

/// Shared handle to the seeded store. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    query_timeout: Duration,
}

impl Store {
    /// Open `path` (or an in-memory database for `:memory:`), recreate the
    /// schema tables, load the fixture and lock the connection read-only.
    pub fn open(path: &str, schema: &SchemaDescriptor) -> Result<Self> {
        let mut conn = if path == IN_MEMORY {
            Connection::open_in_memory()?
        } else {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            Connection::open(path)?
        };

        seed_products(&mut conn, schema)?;
        conn.execute_batch("PRAGMA query_only = ON")?;
        info!("Store ready at {} ({} seed rows)", path, seed::PRODUCTS.len());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        })
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    pub fn in_memory(schema: &SchemaDescriptor) -> Result<Self> {
        Self::open(IN_MEMORY, schema)
    }

    /// Run one read-only statement and collect every row. Blocking.
    ///
    /// The statement is interrupted once it runs past the query budget.
    pub fn query(&self, sql: &str) -> std::result::Result<ResultSet, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;

        let deadline = Instant::now() + self.query_timeout;
        conn.progress_handler(PROGRESS_STEPS, Some(move || Instant::now() >= deadline));
        let outcome = collect_rows(&conn, sql);
        conn.progress_handler(PROGRESS_STEPS, None::<fn() -> bool>);

        outcome.map_err(|e| match e {
            StoreError::Sqlite(ref err)
                if err.sqlite_error_code() == Some(ErrorCode::OperationInterrupted) =>
            {
                StoreError::TimedOut(self.query_timeout)
            }
            other => other,
        })
    }
}

fn collect_rows(conn: &Connection, sql: &str) -> std::result::Result<ResultSet, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    if !stmt.readonly() {
        return Err(StoreError::NotReadOnly);
    }

    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();
    let mut result = ResultSet::new(columns);

    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(width);
        for index in 0..width {
            values.push(cell_value(row.get_ref(index)?));
        }
        result.push_row(values);
    }

    Ok(result)
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("statement is not read-only")]
    NotReadOnly,

    #[error("query exceeded its {0:?} execution budget")]
    TimedOut(Duration),

    #[error("store connection is unavailable")]
    Poisoned,
}

fn cell_value(value: ValueRef<'_>) -> CellValue {
    match value {
        ValueRef::Null => CellValue::Null,
        ValueRef::Integer(v) => CellValue::Integer(v),
        ValueRef::Real(v) => CellValue::Real(v),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            CellValue::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

fn seed_products(conn: &mut Connection, schema: &SchemaDescriptor) -> Result<()> {
    let products = schema
        .table("products")
        .ok_or_else(|| AppError::Config("schema has no products table".to_string()))?;

    let tx = conn.transaction()?;
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS {name}; {ddl};",
        name = products.name,
        ddl = products.create_table_sql()
    ))?;
    {
        let mut stmt = tx.prepare(&format!("INSERT INTO {} VALUES (?1, ?2, ?3, ?4, ?5)", products.name))?;
        for (id, name, category, price, rating) in seed::PRODUCTS {
            stmt.execute(params![id, name, category, price, rating])?;
        }
    }
    tx.commit()?;
    Ok(())
}
