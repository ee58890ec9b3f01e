//! libSQL backend for the `MessageStore` trait.
//!
//! Supports local file and in-memory databases. Timestamps are written as
//! fixed-width RFC 3339 with nanoseconds so text ordering equals time ordering.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::params::Params;
use libsql::{Connection, Database as LibSqlDatabase, Value, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::inquiries::model::{Message, MessageSource, MessageType};
use crate::inquiries::stats::MessageStats;
use crate::pipeline::types::storable_timestamp;
use crate::store::migrations;
use crate::store::traits::{MessageFilter, MessageStore, PageRequest, RetentionPredicate};

/// libSQL message store.
///
/// Holds a single connection reused for all operations. Every mutation is
/// one statement, so no transaction is ever left open on the shared
/// connection.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db)?;
        migrations::run_migrations(&store.conn).await?;
        info!(path = %path.display(), "Database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let store = Self::from_database(db)?;
        migrations::run_migrations(&store.conn).await?;
        Ok(store)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    async fn collect_messages(
        &self,
        sql: &str,
        values: Vec<Value>,
        op: &str,
    ) -> Result<Vec<Message>, DatabaseError> {
        let mut rows = self
            .conn
            .query(sql, Params::Positional(values))
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;

        let mut messages = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?
        {
            messages.push(row_to_message(&row)?);
        }
        Ok(messages)
    }

    async fn scalar(&self, sql: &str, values: Vec<Value>, op: &str) -> Result<i64, DatabaseError> {
        let mut rows = self
            .conn
            .query(sql, Params::Positional(values))
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;
        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?
        {
            Some(row) => row
                .get::<i64>(0)
                .map_err(|e| DatabaseError::Query(format!("{op}: {e}"))),
            None => Ok(0),
        }
    }
}

// ── Helper functions ────────────────────────────────────────────────

const MESSAGE_COLUMNS: &str = "id, type, from_name, from_email, phone, company, service, \
     subject, body, project_location, timeline, budget, details, created_at, is_read, \
     has_attachments, conversation_id, source";

/// Canonical text form of a timestamp.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Query(format!("bad created_at {s:?}: {e}")))
}

/// Ids as one JSON array parameter, expanded in SQL with `json_each`.
fn id_list(ids: &[String]) -> Result<String, DatabaseError> {
    serde_json::to_string(ids).map_err(|e| DatabaseError::Query(format!("id list: {e}")))
}

fn opt_text(s: Option<&str>) -> Value {
    match s {
        Some(s) => Value::Text(s.to_string()),
        None => Value::Null,
    }
}

fn row_err(e: libsql::Error) -> DatabaseError {
    DatabaseError::Query(format!("row parse: {e}"))
}

/// Map a libsql Row (selected with `MESSAGE_COLUMNS`) to a Message.
fn row_to_message(row: &libsql::Row) -> Result<Message, DatabaseError> {
    let kind_str: String = row.get(1).map_err(row_err)?;
    let created_str: String = row.get(13).map_err(row_err)?;
    let source_str: String = row.get(17).map_err(row_err)?;

    Ok(Message {
        id: row.get(0).map_err(row_err)?,
        kind: kind_str.parse::<MessageType>().map_err(DatabaseError::Query)?,
        from_name: row.get(2).map_err(row_err)?,
        from_email: row.get(3).map_err(row_err)?,
        phone: row.get::<Option<String>>(4).map_err(row_err)?,
        company: row.get::<Option<String>>(5).map_err(row_err)?,
        service: row.get::<Option<String>>(6).map_err(row_err)?,
        subject: row.get(7).map_err(row_err)?,
        body: row.get(8).map_err(row_err)?,
        project_location: row.get::<Option<String>>(9).map_err(row_err)?,
        timeline: row.get::<Option<String>>(10).map_err(row_err)?,
        budget: row.get::<Option<String>>(11).map_err(row_err)?,
        details: row.get::<Option<String>>(12).map_err(row_err)?,
        created_at: parse_timestamp(&created_str)?,
        is_read: row.get::<i64>(14).map_err(row_err)? != 0,
        has_attachments: row.get::<i64>(15).map_err(row_err)? != 0,
        conversation_id: row.get(16).map_err(row_err)?,
        source: source_str.parse::<MessageSource>().map_err(DatabaseError::Query)?,
    })
}

/// WHERE clause and positional values for a message filter.
fn filter_clause(filter: &MessageFilter) -> (String, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut values = Vec::new();

    if let Some(kind) = filter.kind {
        values.push(Value::Text(kind.as_str().to_string()));
        clauses.push(format!("type = ?{}", values.len()));
    }
    if let Some(read) = filter.is_read {
        values.push(Value::Integer(i64::from(read)));
        clauses.push(format!("is_read = ?{}", values.len()));
    }
    if let Some(conv) = &filter.conversation_id {
        values.push(Value::Text(conv.clone()));
        clauses.push(format!("conversation_id = ?{}", values.len()));
    }
    if let Some(needle) = filter.needle() {
        values.push(Value::Text(needle));
        let n = values.len();
        clauses.push(format!(
            "(instr(lower(from_name), ?{n}) > 0 OR instr(lower(from_email), ?{n}) > 0 \
             OR instr(lower(subject), ?{n}) > 0 OR instr(lower(body), ?{n}) > 0)"
        ));
    }

    if clauses.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), values)
    }
}

/// WHERE clause fragment for a retention predicate, numbering from `start`.
fn retention_clause(predicate: &RetentionPredicate, start: usize) -> (String, Vec<Value>) {
    let mut values = vec![Value::Text(format_timestamp(&predicate.cutoff))];
    let mut clause = format!("created_at < ?{start}");
    if let Some(kind) = predicate.kind {
        values.push(Value::Text(kind.as_str().to_string()));
        clause.push_str(&format!(" AND type = ?{}", start + values.len() - 1));
    }
    if let Some(read) = predicate.is_read {
        values.push(Value::Integer(i64::from(read)));
        clause.push_str(&format!(" AND is_read = ?{}", start + values.len() - 1));
    }
    (clause, values)
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl MessageStore for LibSqlStore {
    fn backend(&self) -> &'static str {
        "libsql"
    }

    async fn append(&self, message: &Message) -> Result<(), DatabaseError> {
        if storable_timestamp(message.created_at).is_none() {
            return Err(DatabaseError::Constraint(format!(
                "created_at {} is outside the storable range",
                message.created_at
            )));
        }
        self.conn
            .execute(
                &format!(
                    "INSERT INTO messages ({MESSAGE_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"
                ),
                params![
                    message.id.clone(),
                    message.kind.as_str(),
                    message.from_name.clone(),
                    message.from_email.clone(),
                    opt_text(message.phone.as_deref()),
                    opt_text(message.company.as_deref()),
                    opt_text(message.service.as_deref()),
                    message.subject.clone(),
                    message.body.clone(),
                    opt_text(message.project_location.as_deref()),
                    opt_text(message.timeline.as_deref()),
                    opt_text(message.budget.as_deref()),
                    opt_text(message.details.as_deref()),
                    format_timestamp(&message.created_at),
                    i64::from(message.is_read),
                    i64::from(message.has_attachments),
                    message.conversation_id.clone(),
                    message.source.as_str(),
                ],
            )
            .await
            .map_err(|e| {
                let text = e.to_string();
                if text.contains("UNIQUE") {
                    DatabaseError::Constraint(format!("append: {text}"))
                } else {
                    DatabaseError::Query(format!("append: {text}"))
                }
            })?;

        debug!(id = %message.id, kind = %message.kind, "Message persisted");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Message>, DatabaseError> {
        let mut found = self
            .collect_messages(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                vec![Value::Text(id.to_string())],
                "get",
            )
            .await?;
        Ok(found.pop())
    }

    async fn list(
        &self,
        filter: &MessageFilter,
        page: Option<PageRequest>,
    ) -> Result<Vec<Message>, DatabaseError> {
        let (where_sql, mut values) = filter_clause(filter);
        let mut sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages{where_sql} ORDER BY created_at DESC, id DESC"
        );
        if let Some(page) = page {
            values.push(Value::Integer(page.limit as i64));
            values.push(Value::Integer(page.offset as i64));
            sql.push_str(&format!(
                " LIMIT ?{} OFFSET ?{}",
                values.len() - 1,
                values.len()
            ));
        }
        self.collect_messages(&sql, values, "list").await
    }

    async fn count(&self, filter: &MessageFilter) -> Result<usize, DatabaseError> {
        let (where_sql, values) = filter_clause(filter);
        let n = self
            .scalar(
                &format!("SELECT COUNT(*) FROM messages{where_sql}"),
                values,
                "count",
            )
            .await?;
        Ok(n.max(0) as usize)
    }

    async fn message_stats(&self) -> Result<MessageStats, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*),
                        COALESCE(SUM(CASE WHEN is_read = 0 THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN type = 'quote' THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN type = 'contact' THEN 1 ELSE 0 END), 0)
                 FROM messages",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("message_stats: {e}")))?;

        let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("message_stats: {e}")))?
        else {
            return Ok(MessageStats::default());
        };

        let get = |i: i32| -> Result<usize, DatabaseError> {
            Ok(row.get::<i64>(i).map_err(row_err)?.max(0) as usize)
        };
        Ok(MessageStats {
            total: get(0)?,
            unread: get(1)?,
            quote_count: get(2)?,
            contact_count: get(3)?,
        })
    }

    async fn set_read(&self, id: &str, read: bool) -> Result<bool, DatabaseError> {
        let affected = self
            .conn
            .execute(
                "UPDATE messages SET is_read = ?1 WHERE id = ?2",
                params![i64::from(read), id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_read: {e}")))?;
        debug!(id = id, is_read = read, affected, "Read state updated");
        Ok(affected > 0)
    }

    async fn delete(&self, id: &str) -> Result<bool, DatabaseError> {
        let affected = self
            .conn
            .execute("DELETE FROM messages WHERE id = ?1", params![id])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete: {e}")))?;
        Ok(affected > 0)
    }

    async fn delete_many(&self, ids: &[String]) -> Result<usize, DatabaseError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let deleted = self
            .conn
            .execute(
                "DELETE FROM messages WHERE id IN (SELECT value FROM json_each(?1))",
                params![id_list(ids)?],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_many: {e}")))?
            as usize;
        info!(requested = ids.len(), deleted, "Bulk delete");
        Ok(deleted)
    }

    async fn retention_candidates(
        &self,
        predicate: &RetentionPredicate,
    ) -> Result<Vec<Message>, DatabaseError> {
        let (clause, values) = retention_clause(predicate, 1);
        self.collect_messages(
            &format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE {clause} ORDER BY created_at ASC, id ASC"
            ),
            values,
            "retention_candidates",
        )
        .await
    }

    async fn delete_retained(
        &self,
        predicate: &RetentionPredicate,
        ids: &[String],
    ) -> Result<usize, DatabaseError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let (clause, mut values) = retention_clause(predicate, 2);
        values.insert(0, Value::Text(id_list(ids)?));
        let deleted = self
            .conn
            .execute(
                &format!(
                    "DELETE FROM messages
                     WHERE id IN (SELECT value FROM json_each(?1)) AND {clause}"
                ),
                Params::Positional(values),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_retained: {e}")))?
            as usize;
        Ok(deleted)
    }
}
