//! Schema for the libSQL message store.
//!
//! Steps are numbered from 1 and applied in order. Each step runs in its own
//! transaction together with its `schema_version` row, so a failed step
//! leaves the schema at the previous version.

use libsql::{Connection, params};
use tracing::info;

use crate::error::DatabaseError;

/// Ordered schema steps: `(name, sql)`. The version is the 1-based position.
const STEPS: &[(&str, &str)] = &[
    (
        "messages",
        "CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            type TEXT NOT NULL,
            from_name TEXT NOT NULL,
            from_email TEXT NOT NULL,
            phone TEXT,
            company TEXT,
            service TEXT,
            subject TEXT NOT NULL,
            body TEXT NOT NULL,
            project_location TEXT,
            timeline TEXT,
            budget TEXT,
            details TEXT,
            created_at TEXT NOT NULL,
            is_read INTEGER NOT NULL DEFAULT 0,
            has_attachments INTEGER NOT NULL DEFAULT 0,
            conversation_id TEXT NOT NULL,
            source TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_messages_created_at ON messages(created_at);
        CREATE INDEX IF NOT EXISTS idx_messages_type ON messages(type);
        CREATE INDEX IF NOT EXISTS idx_messages_is_read ON messages(is_read);
        CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id);",
    ),
    (
        "retention_index",
        "CREATE INDEX IF NOT EXISTS idx_messages_retention
            ON messages(created_at, type, is_read);",
    ),
];

/// Latest schema version this build knows about.
pub fn latest_version() -> i64 {
    STEPS.len() as i64
}

/// Bring the schema up to [`latest_version`].
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("schema_version table: {e}")))?;

    let applied = applied_version(conn).await?;
    if applied > latest_version() {
        return Err(DatabaseError::Migration(format!(
            "database is at schema v{applied}, newer than this build (v{})",
            latest_version()
        )));
    }

    for (version, (name, sql)) in (1_i64..).zip(STEPS.iter()) {
        if version <= applied {
            continue;
        }
        apply(conn, version, name, sql).await?;
        info!(version, name, "Applied schema step");
    }
    Ok(())
}

async fn apply(conn: &Connection, version: i64, name: &str, sql: &str) -> Result<(), DatabaseError> {
    let fail = |e: libsql::Error| DatabaseError::Migration(format!("v{version} {name}: {e}"));

    let tx = conn.transaction().await.map_err(fail)?;
    tx.execute_batch(sql).await.map_err(fail)?;
    tx.execute(
        "INSERT INTO schema_version (version, name, applied_at) VALUES (?1, ?2, ?3)",
        params![version, name, chrono::Utc::now().to_rfc3339()],
    )
    .await
    .map_err(fail)?;
    tx.commit().await.map_err(fail)
}

/// Highest recorded version; 0 on a fresh database.
pub async fn applied_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT MAX(version) FROM schema_version", ())
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;
    let Some(row) = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?
    else {
        return Ok(0);
    };
    let version = row
        .get::<Option<i64>>(0)
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;
    Ok(version.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn fresh() -> Connection {
        libsql::Builder::new_local(":memory:")
            .build()
            .await
            .unwrap()
            .connect()
            .unwrap()
    }

    #[tokio::test]
    async fn fresh_database_reaches_latest() {
        let conn = fresh().await;
        run_migrations(&conn).await.unwrap();
        assert_eq!(applied_version(&conn).await.unwrap(), latest_version());

        let mut rows = conn
            .query("SELECT name FROM sqlite_master WHERE type = 'index' AND name = 'idx_messages_retention'", ())
            .await
            .unwrap();
        assert!(rows.next().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn rerun_applies_nothing() {
        let conn = fresh().await;
        run_migrations(&conn).await.unwrap();
        run_migrations(&conn).await.unwrap();

        let mut rows = conn
            .query("SELECT COUNT(*) FROM schema_version", ())
            .await
            .unwrap();
        let count: i64 = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(count, latest_version());
    }

    #[tokio::test]
    async fn newer_schema_is_refused() {
        let conn = fresh().await;
        run_migrations(&conn).await.unwrap();
        conn.execute(
            "INSERT INTO schema_version (version, name, applied_at) VALUES (?1, 'future', 'now')",
            params![latest_version() + 1],
        )
        .await
        .unwrap();

        let err = run_migrations(&conn).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Migration(_)));
    }
}
