//! Persistence ledger: inserts, flag updates and ordered listings over the
//! record tables. Multi-row writes run in a single transaction so a failure
//! leaves no partial rows behind.

use chrono::Utc;
use duckdb::{params, Connection, OptionalExt, Result as DuckResult};
use tracing::{debug, error, warn};

use crate::db::db_utils::to_db_timestamp;
use crate::db::models::{
    AnalyticsEvent, AnalyticsSummary, ChatMessage, EventType, MessageType, NewQueryHistory,
    NewQueryVersion, NewSchemaVersion, Page, QueryHistory, QueryVersion, SchemaVersion,
};
use crate::db::LedgerError;

const QUERY_HISTORY: &str = "Query";

/// Runs `work` inside a transaction, committing on success and rolling back
/// on any error.
fn in_transaction<T>(
    conn: &mut Connection,
    work: impl FnOnce(&Connection) -> Result<T, LedgerError>,
) -> Result<T, LedgerError> {
    let tx = conn.transaction()?;
    match work(&tx) {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(e) => {
            warn!("Rolling back ledger transaction: {}", e);
            if let Err(rollback_err) = tx.rollback() {
                error!("Rollback failed: {}", rollback_err);
            }
            Err(e)
        }
    }
}

// Query history

pub fn insert_query_history(conn: &Connection, new: &NewQueryHistory) -> DuckResult<i64> {
    conn.query_row(
        "INSERT INTO query_history \
         (natural_query, generated_sql, database_type, explanation, model_used, context, created_at, is_favorite) \
         VALUES (?, ?, ?, ?, ?, ?, ?, FALSE) RETURNING id",
        params![
            new.natural_query,
            new.generated_sql,
            new.database_type,
            new.explanation,
            new.model_used,
            new.context,
            to_db_timestamp(&Utc::now()),
        ],
        |row| row.get(0),
    )
}

pub fn get_query_history(conn: &Connection, id: i64) -> DuckResult<Option<QueryHistory>> {
    conn.query_row(
        &format!("SELECT {} FROM query_history WHERE id = ?", QueryHistory::COLUMNS),
        params![id],
        QueryHistory::from_row,
    )
    .optional()
}

fn query_history_exists(conn: &Connection, id: i64) -> DuckResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM query_history WHERE id = ?",
        params![id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Returns `false` when no row has the given id.
pub fn set_favorite(conn: &Connection, id: i64, is_favorite: bool) -> DuckResult<bool> {
    let changed = conn.execute(
        "UPDATE query_history SET is_favorite = ? WHERE id = ?",
        params![is_favorite, id],
    )?;
    Ok(changed > 0)
}

/// Newest first. `page` is 1-based.
pub fn list_query_history(
    conn: &Connection,
    page: i64,
    per_page: i64,
) -> DuckResult<Page<QueryHistory>> {
    let page = page.max(1);
    let per_page = per_page.max(1);

    let total: i64 = conn.query_row("SELECT COUNT(*) FROM query_history", [], |row| row.get(0))?;
    let pages = if total == 0 { 0 } else { (total - 1) / per_page + 1 };

    // Pages past the end are empty, however far past
    let offset = match (page - 1).checked_mul(per_page) {
        Some(offset) if offset < total => offset,
        _ => {
            return Ok(Page {
                items: Vec::new(),
                total,
                pages,
            });
        }
    };

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM query_history ORDER BY created_at DESC, id DESC LIMIT {} OFFSET {}",
        QueryHistory::COLUMNS,
        per_page,
        offset
    ))?;
    let items = stmt
        .query_map([], QueryHistory::from_row)?
        .collect::<DuckResult<Vec<_>>>()?;

    Ok(Page { items, total, pages })
}

/// Records a successful SQL generation together with its analytics event.
pub fn save_sql_generation(
    conn: &mut Connection,
    new: &NewQueryHistory,
) -> Result<i64, LedgerError> {
    in_transaction(conn, |tx| {
        let id = insert_query_history(tx, new)?;
        insert_analytics_event(tx, EventType::GenerateSql, Some(id))?;
        debug!("Saved query history {}", id);
        Ok(id)
    })
}

/// Deletes a history row along with the events and versions that reference it.
pub fn delete_query_history(conn: &mut Connection, id: i64) -> Result<(), LedgerError> {
    in_transaction(conn, |tx| {
        if !query_history_exists(tx, id)? {
            return Err(LedgerError::NotFound { entity: QUERY_HISTORY, id });
        }
        tx.execute("DELETE FROM analytics_events WHERE query_history_id = ?", params![id])?;
        tx.execute("DELETE FROM query_versions WHERE query_history_id = ?", params![id])?;
        tx.execute("DELETE FROM query_history WHERE id = ?", params![id])?;
        Ok(())
    })
}

// Schema versions

pub fn insert_schema_version(conn: &Connection, new: &NewSchemaVersion) -> DuckResult<i64> {
    conn.query_row(
        "INSERT INTO schema_versions \
         (name, description, schema_ddl, database_type, explanation, tables_info, version, created_at, is_active) \
         VALUES (?, ?, ?, ?, ?, ?, 1, ?, TRUE) RETURNING id",
        params![
            new.name,
            new.description,
            new.schema_ddl,
            new.database_type,
            new.explanation,
            new.tables_info,
            to_db_timestamp(&Utc::now()),
        ],
        |row| row.get(0),
    )
}

pub fn get_schema_version(conn: &Connection, id: i64) -> DuckResult<Option<SchemaVersion>> {
    conn.query_row(
        &format!("SELECT {} FROM schema_versions WHERE id = ?", SchemaVersion::COLUMNS),
        params![id],
        SchemaVersion::from_row,
    )
    .optional()
}

/// Returns `false` when no row has the given id.
pub fn set_schema_active(conn: &Connection, id: i64, is_active: bool) -> DuckResult<bool> {
    let changed = conn.execute(
        "UPDATE schema_versions SET is_active = ? WHERE id = ?",
        params![is_active, id],
    )?;
    Ok(changed > 0)
}

pub fn list_schema_versions(conn: &Connection) -> DuckResult<Vec<SchemaVersion>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM schema_versions ORDER BY created_at DESC, id DESC",
        SchemaVersion::COLUMNS
    ))?;
    let rows = stmt.query_map([], SchemaVersion::from_row)?;
    rows.collect()
}

/// Records a schema generation together with its analytics event.
pub fn save_schema_generation(
    conn: &mut Connection,
    new: &NewSchemaVersion,
) -> Result<i64, LedgerError> {
    in_transaction(conn, |tx| {
        let id = insert_schema_version(tx, new)?;
        insert_analytics_event(tx, EventType::GenerateSchema, None)?;
        debug!("Saved schema version {}", id);
        Ok(id)
    })
}

// Chat messages

pub fn insert_chat_message(
    conn: &Connection,
    message: &str,
    response: &str,
    message_type: MessageType,
) -> DuckResult<ChatMessage> {
    conn.query_row(
        &format!(
            "INSERT INTO chat_messages (message, response, message_type, created_at) \
             VALUES (?, ?, ?, ?) RETURNING {}",
            ChatMessage::COLUMNS
        ),
        params![
            message,
            response,
            message_type.as_str(),
            to_db_timestamp(&Utc::now())
        ],
        ChatMessage::from_row,
    )
}

pub fn list_recent_chat_messages(conn: &Connection, limit: i64) -> DuckResult<Vec<ChatMessage>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM chat_messages ORDER BY created_at DESC, id DESC LIMIT {}",
        ChatMessage::COLUMNS,
        limit.max(0)
    ))?;
    let rows = stmt.query_map([], ChatMessage::from_row)?;
    rows.collect()
}

// Analytics

pub fn insert_analytics_event(
    conn: &Connection,
    event_type: EventType,
    query_history_id: Option<i64>,
) -> DuckResult<i64> {
    conn.query_row(
        "INSERT INTO analytics_events (event_type, created_at, query_history_id) \
         VALUES (?, ?, ?) RETURNING id",
        params![
            event_type.as_str(),
            to_db_timestamp(&Utc::now()),
            query_history_id
        ],
        |row| row.get(0),
    )
}

pub fn events_for_query(conn: &Connection, query_history_id: i64) -> DuckResult<Vec<AnalyticsEvent>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM analytics_events WHERE query_history_id = ? ORDER BY created_at DESC, id DESC",
        AnalyticsEvent::COLUMNS
    ))?;
    let rows = stmt.query_map(params![query_history_id], AnalyticsEvent::from_row)?;
    rows.collect()
}

pub fn count_events(conn: &Connection, event_type: EventType) -> DuckResult<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM analytics_events WHERE event_type = ?",
        params![event_type.as_str()],
        |row| row.get(0),
    )
}

pub fn analytics_summary(conn: &Connection) -> DuckResult<AnalyticsSummary> {
    Ok(AnalyticsSummary {
        sql_generations_total: count_events(conn, EventType::GenerateSql)?,
        schema_generations_total: count_events(conn, EventType::GenerateSchema)?,
        total_queries_in_history: conn.query_row(
            "SELECT COUNT(*) FROM query_history",
            [],
            |row| row.get(0),
        )?,
    })
}

// Query versions

/// Appends an edit to a history row. Fails with `NotFound` if the parent row
/// does not exist.
pub fn add_query_version(
    conn: &mut Connection,
    new: &NewQueryVersion,
) -> Result<QueryVersion, LedgerError> {
    in_transaction(conn, |tx| {
        if !query_history_exists(tx, new.query_history_id)? {
            return Err(LedgerError::NotFound {
                entity: QUERY_HISTORY,
                id: new.query_history_id,
            });
        }
        let version = tx.query_row(
            &format!(
                "INSERT INTO query_versions (version_message, generated_sql, created_at, query_history_id) \
                 VALUES (?, ?, ?, ?) RETURNING {}",
                QueryVersion::COLUMNS
            ),
            params![
                new.version_message,
                new.generated_sql,
                to_db_timestamp(&Utc::now()),
                new.query_history_id
            ],
            QueryVersion::from_row,
        )?;
        Ok(version)
    })
}

/// Newest first. Fails with `NotFound` if the parent row does not exist.
pub fn list_query_versions(
    conn: &Connection,
    query_history_id: i64,
) -> Result<Vec<QueryVersion>, LedgerError> {
    if !query_history_exists(conn, query_history_id)? {
        return Err(LedgerError::NotFound {
            entity: QUERY_HISTORY,
            id: query_history_id,
        });
    }

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM query_versions WHERE query_history_id = ? ORDER BY created_at DESC, id DESC",
        QueryVersion::COLUMNS
    ))?;
    let versions = stmt
        .query_map(params![query_history_id], QueryVersion::from_row)?
        .collect::<DuckResult<Vec<_>>>()?;
    Ok(versions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_pool, migrations, DbPool};

    fn pool() -> DbPool {
        init_pool(":memory:", 2).unwrap()
    }

    fn new_query(prompt: &str) -> NewQueryHistory {
        NewQueryHistory {
            natural_query: prompt.to_string(),
            generated_sql: "SELECT * FROM users WHERE age > 30;".to_string(),
            database_type: "postgresql".to_string(),
            explanation: Some("Filters users by age".to_string()),
            model_used: Some("test-model".to_string()),
            context: None,
        }
    }

    fn new_schema() -> NewSchemaVersion {
        NewSchemaVersion {
            name: "Blog".to_string(),
            description: "blog with posts and comments".to_string(),
            schema_ddl: "CREATE TABLE posts (id INT, title TEXT);".to_string(),
            database_type: "postgresql".to_string(),
            explanation: None,
            tables_info: Some(r#"[{"name":"posts","columns":["id","title"]}]"#.to_string()),
        }
    }

    #[test]
    fn test_save_sql_generation_writes_history_and_event() {
        let pool = pool();
        let mut conn = pool.get().unwrap();

        let id = save_sql_generation(&mut conn, &new_query("list all users older than 30")).unwrap();

        let saved = get_query_history(&conn, id).unwrap().unwrap();
        assert_eq!(saved.natural_query, "list all users older than 30");
        assert!(!saved.is_favorite);

        let events = events_for_query(&conn, id).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::GenerateSql);
        assert_eq!(events[0].query_history_id, Some(id));
    }

    #[test]
    fn test_failed_event_insert_rolls_back_history_row() {
        let pool = pool();
        let mut conn = pool.get().unwrap();
        conn.execute_batch("DROP TABLE analytics_events").unwrap();

        let result = save_sql_generation(&mut conn, &new_query("doomed"));
        assert!(matches!(result, Err(LedgerError::Database(_))));

        migrations::run_migrations(&conn).unwrap();
        let summary = analytics_summary(&conn).unwrap();
        assert_eq!(summary.total_queries_in_history, 0);
        assert_eq!(summary.sql_generations_total, 0);
    }

    #[test]
    fn test_save_schema_generation_event_has_no_back_reference() {
        let pool = pool();
        let mut conn = pool.get().unwrap();

        let id = save_schema_generation(&mut conn, &new_schema()).unwrap();
        let schema = get_schema_version(&conn, id).unwrap().unwrap();
        assert_eq!(schema.version, 1);
        assert!(schema.is_active);

        let event_ref: Option<i64> = conn
            .query_row(
                "SELECT query_history_id FROM analytics_events WHERE event_type = 'generate_schema'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(event_ref, None);
    }

    #[test]
    fn test_toggles_report_missing_rows() {
        let pool = pool();
        let mut conn = pool.get().unwrap();
        let query_id = save_sql_generation(&mut conn, &new_query("q")).unwrap();
        let schema_id = save_schema_generation(&mut conn, &new_schema()).unwrap();

        assert!(set_favorite(&conn, query_id, true).unwrap());
        assert!(get_query_history(&conn, query_id).unwrap().unwrap().is_favorite);
        assert!(!set_favorite(&conn, 9999, true).unwrap());

        assert!(set_schema_active(&conn, schema_id, false).unwrap());
        assert!(!get_schema_version(&conn, schema_id).unwrap().unwrap().is_active);
        assert!(!set_schema_active(&conn, 9999, false).unwrap());
    }

    #[test]
    fn test_history_pagination_newest_first() {
        let pool = pool();
        let mut conn = pool.get().unwrap();
        for i in 0..5 {
            save_sql_generation(&mut conn, &new_query(&format!("query {}", i))).unwrap();
        }

        let first = list_query_history(&conn, 1, 2).unwrap();
        assert_eq!(first.total, 5);
        assert_eq!(first.pages, 3);
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.items[0].natural_query, "query 4");
        assert_eq!(first.items[1].natural_query, "query 3");

        let last = list_query_history(&conn, 3, 2).unwrap();
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].natural_query, "query 0");

        let beyond = list_query_history(&conn, 7, 2).unwrap();
        assert!(beyond.items.is_empty());
    }

    #[test]
    fn test_far_page_is_empty_not_an_error() {
        let pool = pool();
        let mut conn = pool.get().unwrap();
        save_sql_generation(&mut conn, &new_query("only one")).unwrap();

        let page = list_query_history(&conn, i64::MAX, 100).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 1);
        assert_eq!(page.pages, 1);

        let page = list_query_history(&conn, 2, i64::MAX).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.pages, 1);
    }

    #[test]
    fn test_empty_history_has_zero_pages() {
        let pool = pool();
        let conn = pool.get().unwrap();
        let page = list_query_history(&conn, 1, 10).unwrap();
        assert_eq!(page.total, 0);
        assert_eq!(page.pages, 0);
    }

    #[test]
    fn test_query_versions_require_parent_and_list_newest_first() {
        let pool = pool();
        let mut conn = pool.get().unwrap();

        let orphan = add_query_version(
            &mut conn,
            &NewQueryVersion {
                query_history_id: 42,
                generated_sql: "SELECT 1".to_string(),
                version_message: None,
            },
        );
        assert!(matches!(orphan, Err(LedgerError::NotFound { id: 42, .. })));
        assert!(matches!(
            list_query_versions(&conn, 42),
            Err(LedgerError::NotFound { .. })
        ));

        let id = save_sql_generation(&mut conn, &new_query("q")).unwrap();
        for n in 1..=3 {
            add_query_version(
                &mut conn,
                &NewQueryVersion {
                    query_history_id: id,
                    generated_sql: format!("SELECT {}", n),
                    version_message: Some(format!("v{}", n)),
                },
            )
            .unwrap();
        }

        let versions = list_query_versions(&conn, id).unwrap();
        let messages: Vec<_> = versions
            .iter()
            .map(|v| v.version_message.clone().unwrap())
            .collect();
        assert_eq!(messages, vec!["v3", "v2", "v1"]);
        assert!(versions.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[test]
    fn test_delete_cascades_to_owned_rows() {
        let pool = pool();
        let mut conn = pool.get().unwrap();
        let id = save_sql_generation(&mut conn, &new_query("q")).unwrap();
        let kept = save_sql_generation(&mut conn, &new_query("kept")).unwrap();
        add_query_version(
            &mut conn,
            &NewQueryVersion {
                query_history_id: id,
                generated_sql: "SELECT 2".to_string(),
                version_message: None,
            },
        )
        .unwrap();

        delete_query_history(&mut conn, id).unwrap();

        assert!(get_query_history(&conn, id).unwrap().is_none());
        assert!(events_for_query(&conn, id).unwrap().is_empty());
        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM query_versions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(versions, 0);
        assert_eq!(events_for_query(&conn, kept).unwrap().len(), 1);

        assert!(matches!(
            delete_query_history(&mut conn, id),
            Err(LedgerError::NotFound { .. })
        ));
    }

    #[test]
    fn test_chat_messages_limit_and_order() {
        let pool = pool();
        let conn = pool.get().unwrap();
        for i in 0..25 {
            insert_chat_message(&conn, &format!("m{}", i), "r", MessageType::Query).unwrap();
        }

        let recent = list_recent_chat_messages(&conn, 20).unwrap();
        assert_eq!(recent.len(), 20);
        assert_eq!(recent[0].message, "m24");
        assert_eq!(recent[19].message, "m5");
        assert_eq!(recent[0].message_type, MessageType::Query);
    }

    #[test]
    fn test_analytics_summary_counts() {
        let pool = pool();
        let mut conn = pool.get().unwrap();
        save_sql_generation(&mut conn, &new_query("a")).unwrap();
        save_sql_generation(&mut conn, &new_query("b")).unwrap();
        save_schema_generation(&mut conn, &new_schema()).unwrap();

        assert_eq!(
            analytics_summary(&conn).unwrap(),
            AnalyticsSummary {
                sql_generations_total: 2,
                schema_generations_total: 1,
                total_queries_in_history: 2,
            }
        );
    }
}
