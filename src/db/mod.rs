pub mod db_pool;
pub mod db_utils;
pub mod ledger;
pub mod migrations;
pub mod models;

use r2d2::Pool;
use std::error::Error;
use std::fmt;
use tracing::info;

use crate::db::db_pool::DuckDBConnectionManager;

pub type DbPool = Pool<DuckDBConnectionManager>;

#[derive(Debug)]
pub enum LedgerError {
    NotFound { entity: &'static str, id: i64 },
    Database(duckdb::Error),
    Pool(r2d2::Error),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::NotFound { entity, id } => write!(f, "{} {} not found", entity, id),
            LedgerError::Database(e) => write!(f, "Database error: {}", e),
            LedgerError::Pool(e) => write!(f, "Connection pool error: {}", e),
        }
    }
}

impl Error for LedgerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LedgerError::NotFound { .. } => None,
            LedgerError::Database(e) => Some(e),
            LedgerError::Pool(e) => Some(e),
        }
    }
}

impl From<duckdb::Error> for LedgerError {
    fn from(e: duckdb::Error) -> Self {
        LedgerError::Database(e)
    }
}

impl From<r2d2::Error> for LedgerError {
    fn from(e: r2d2::Error) -> Self {
        LedgerError::Pool(e)
    }
}

/// Opens the ledger database, builds the pool and brings the schema up to date.
pub fn init_pool(connection_string: &str, pool_size: u32) -> Result<DbPool, LedgerError> {
    let manager = DuckDBConnectionManager::new(connection_string.to_string())?;
    info!("Opened ledger database: {}", manager.connection_string());
    let pool = Pool::builder().max_size(pool_size.max(1)).build(manager)?;

    let conn = pool.get()?;
    migrations::run_migrations(&conn)?;

    Ok(pool)
}
