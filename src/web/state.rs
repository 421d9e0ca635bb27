use crate::config::AppConfig;
use crate::db::{DbPool, LedgerError};
use crate::llm::generator::Generator;
use crate::web::error::AppError;
use duckdb::Connection;
use tracing::error;

/// Shared application state for the web server
pub struct AppState {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub generator: Generator,
}

impl AppState {
    pub fn new(config: AppConfig, db_pool: DbPool, generator: Generator) -> Self {
        Self {
            config,
            db_pool,
            generator,
        }
    }

    /// Runs ledger work on a pooled connection in a blocking task.
    pub async fn with_conn<T, F>(&self, work: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut Connection) -> Result<T, LedgerError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.db_pool.clone();

        let task_result = tokio::task::spawn_blocking(move || -> Result<T, LedgerError> {
            let mut conn = pool.get()?;
            work(&mut *conn)
        })
        .await;

        match task_result {
            Ok(result) => result.map_err(AppError::from),
            Err(join_err) => {
                error!("Database task execution failed: {}", join_err);
                Err(AppError::internal())
            }
        }
    }
}
