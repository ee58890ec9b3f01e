//! `MessageStore` trait: a single async interface over both store backings.
//!
//! Implementations own their own synchronization. Callers receive the store
//! as an injected `Arc<dyn MessageStore>`; nothing here is process-global.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DatabaseError;
use crate::inquiries::model::{Message, MessageType};
use crate::inquiries::stats::MessageStats;

/// Filters for message scans. All set fields must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageFilter {
    pub kind: Option<MessageType>,
    pub is_read: Option<bool>,
    /// Case-insensitive substring, OR-matched across name, email, subject, body.
    pub search: Option<String>,
    pub conversation_id: Option<String>,
}

impl MessageFilter {
    pub fn conversation(id: &str) -> Self {
        Self {
            conversation_id: Some(id.to_string()),
            ..Default::default()
        }
    }

    /// Lowercased search needle, or `None` when search is absent or blank.
    pub fn needle(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    pub fn matches(&self, message: &Message) -> bool {
        if self.kind.is_some_and(|k| k != message.kind) {
            return false;
        }
        if self.is_read.is_some_and(|r| r != message.is_read) {
            return false;
        }
        if let Some(conv) = &self.conversation_id
            && conv != &message.conversation_id
        {
            return false;
        }
        match self.needle() {
            Some(needle) => message.matches_search(&needle),
            None => true,
        }
    }
}

/// Offset pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: usize,
    pub offset: usize,
}

/// Which messages a retention run may delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPredicate {
    /// Only messages created strictly before this instant.
    pub cutoff: DateTime<Utc>,
    pub kind: Option<MessageType>,
    pub is_read: Option<bool>,
}

impl RetentionPredicate {
    pub fn matches(&self, message: &Message) -> bool {
        message.created_at < self.cutoff
            && self.kind.is_none_or(|k| k == message.kind)
            && self.is_read.is_none_or(|r| r == message.is_read)
    }
}

/// Backend-agnostic message repository.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;

    /// Append a fully classified, thread-resolved message.
    async fn append(&self, message: &Message) -> Result<(), DatabaseError>;

    /// Point lookup by id.
    async fn get(&self, id: &str) -> Result<Option<Message>, DatabaseError>;

    /// Matching messages, newest first (`created_at` desc, then id desc).
    async fn list(
        &self,
        filter: &MessageFilter,
        page: Option<PageRequest>,
    ) -> Result<Vec<Message>, DatabaseError>;

    /// Number of matching messages.
    async fn count(&self, filter: &MessageFilter) -> Result<usize, DatabaseError>;

    /// Message-level counts taken from one consistent read.
    async fn message_stats(&self) -> Result<MessageStats, DatabaseError> {
        let all = self.list(&MessageFilter::default(), None).await?;
        Ok(MessageStats::from_messages(&all))
    }

    /// Set the read flag. Returns `false` if the id does not exist.
    async fn set_read(&self, id: &str, read: bool) -> Result<bool, DatabaseError>;

    /// Delete one message. Returns `false` if the id does not exist.
    async fn delete(&self, id: &str) -> Result<bool, DatabaseError>;

    /// Delete a set of ids. Absent ids contribute nothing to the count.
    async fn delete_many(&self, ids: &[String]) -> Result<usize, DatabaseError>;

    /// Messages a retention run would delete, oldest first.
    async fn retention_candidates(
        &self,
        predicate: &RetentionPredicate,
    ) -> Result<Vec<Message>, DatabaseError>;

    /// Delete the listed ids that still match the predicate. Returns the count.
    async fn delete_retained(
        &self,
        predicate: &RetentionPredicate,
        ids: &[String],
    ) -> Result<usize, DatabaseError>;
}
