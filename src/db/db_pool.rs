use duckdb::Connection;
use r2d2::ManageConnection;
use std::sync::Mutex;

/// Hands out connections that all share a single DuckDB database instance.
///
/// Opening the same file twice in one process gives two independent
/// instances, and `:memory:` would give an empty database per connection, so
/// the manager keeps a root handle and clones it instead.
pub struct DuckDBConnectionManager {
    connection_string: String,
    root: Mutex<Connection>,
}

impl DuckDBConnectionManager {
    pub fn new(connection_string: String) -> duckdb::Result<Self> {
        let root = if is_in_memory(&connection_string) {
            Connection::open_in_memory()?
        } else {
            Connection::open(&connection_string)?
        };

        Ok(Self {
            connection_string,
            root: Mutex::new(root),
        })
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }
}

fn is_in_memory(connection_string: &str) -> bool {
    connection_string.is_empty() || connection_string == ":memory:"
}

impl ManageConnection for DuckDBConnectionManager {
    type Connection = Connection;
    type Error = duckdb::Error;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let root = self
            .root
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        root.try_clone()
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.execute("SELECT 1", [])?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_connections_share_one_database() {
        let manager = DuckDBConnectionManager::new(":memory:".to_string()).unwrap();
        let first = manager.connect().unwrap();
        let second = manager.connect().unwrap();

        first.execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (42);").unwrap();
        let x: i32 = second.query_row("SELECT x FROM t", [], |row| row.get(0)).unwrap();
        assert_eq!(x, 42);
    }

    #[test]
    fn test_file_database_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.duckdb");
        let manager = DuckDBConnectionManager::new(path.to_string_lossy().to_string()).unwrap();

        let mut conn = manager.connect().unwrap();
        assert!(manager.is_valid(&mut conn).is_ok());
        assert!(path.exists());
    }
}
