use duckdb::Connection;
use tracing::info;

/// Ledger tables. Back-references are plain BIGINT columns; the ledger checks
/// parent rows itself inside the writing transaction.
const SCHEMA: &str = r#"
CREATE SEQUENCE IF NOT EXISTS query_history_id_seq START 1;
CREATE TABLE IF NOT EXISTS query_history (
    id BIGINT PRIMARY KEY DEFAULT nextval('query_history_id_seq'),
    natural_query VARCHAR NOT NULL,
    generated_sql VARCHAR NOT NULL,
    database_type VARCHAR NOT NULL,
    explanation VARCHAR,
    model_used VARCHAR,
    context VARCHAR,
    created_at VARCHAR NOT NULL,
    is_favorite BOOLEAN NOT NULL DEFAULT FALSE
);

CREATE SEQUENCE IF NOT EXISTS schema_versions_id_seq START 1;
CREATE TABLE IF NOT EXISTS schema_versions (
    id BIGINT PRIMARY KEY DEFAULT nextval('schema_versions_id_seq'),
    name VARCHAR NOT NULL,
    description VARCHAR NOT NULL,
    schema_ddl VARCHAR NOT NULL,
    database_type VARCHAR NOT NULL,
    explanation VARCHAR,
    tables_info VARCHAR,
    version INTEGER NOT NULL DEFAULT 1,
    created_at VARCHAR NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT TRUE
);

CREATE SEQUENCE IF NOT EXISTS chat_messages_id_seq START 1;
CREATE TABLE IF NOT EXISTS chat_messages (
    id BIGINT PRIMARY KEY DEFAULT nextval('chat_messages_id_seq'),
    message VARCHAR NOT NULL,
    response VARCHAR NOT NULL,
    message_type VARCHAR NOT NULL DEFAULT 'general',
    created_at VARCHAR NOT NULL
);

CREATE SEQUENCE IF NOT EXISTS analytics_events_id_seq START 1;
CREATE TABLE IF NOT EXISTS analytics_events (
    id BIGINT PRIMARY KEY DEFAULT nextval('analytics_events_id_seq'),
    event_type VARCHAR NOT NULL,
    created_at VARCHAR NOT NULL,
    query_history_id BIGINT
);

CREATE SEQUENCE IF NOT EXISTS query_versions_id_seq START 1;
CREATE TABLE IF NOT EXISTS query_versions (
    id BIGINT PRIMARY KEY DEFAULT nextval('query_versions_id_seq'),
    version_message VARCHAR,
    generated_sql VARCHAR NOT NULL,
    created_at VARCHAR NOT NULL,
    query_history_id BIGINT NOT NULL
);
"#;

/// Creates every ledger table that does not exist yet.
pub fn run_migrations(conn: &Connection) -> duckdb::Result<()> {
    conn.execute_batch(SCHEMA)?;
    info!("Ledger schema is up to date");
    Ok(())
}
