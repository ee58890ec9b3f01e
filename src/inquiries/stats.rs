//! Live statistics computed from current store contents. Nothing is cached.

use serde::Serialize;

use crate::error::DatabaseError;
use crate::inquiries::model::{Conversation, ConversationStatus, Message, MessageType, Priority};
use crate::pipeline::threading::ThreadResolver;
use crate::store::{MessageFilter, MessageStore};

/// Message-level counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageStats {
    pub total: usize,
    pub unread: usize,
    pub quote_count: usize,
    pub contact_count: usize,
}

impl MessageStats {
    pub fn from_messages(messages: &[Message]) -> Self {
        messages.iter().fold(Self::default(), |mut stats, m| {
            stats.total += 1;
            stats.unread += usize::from(!m.is_read);
            match m.kind {
                MessageType::Quote => stats.quote_count += 1,
                MessageType::Contact => stats.contact_count += 1,
            }
            stats
        })
    }
}

/// Conversation-level counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationStats {
    pub total: usize,
    pub open: usize,
    pub pending: usize,
    pub closed: usize,
    pub quote_count: usize,
    pub contact_count: usize,
    pub urgent_count: usize,
    /// Unread messages across all conversations.
    pub unread_count: usize,
}

impl ConversationStats {
    pub fn from_conversations(conversations: &[Conversation]) -> Self {
        conversations.iter().fold(Self::default(), |mut stats, c| {
            stats.total += 1;
            match c.status {
                ConversationStatus::Open => stats.open += 1,
                ConversationStatus::Pending => stats.pending += 1,
                ConversationStatus::Closed => stats.closed += 1,
            }
            match c.category {
                MessageType::Quote => stats.quote_count += 1,
                MessageType::Contact => stats.contact_count += 1,
            }
            stats.urgent_count += usize::from(c.priority == Priority::High);
            stats.unread_count += c.unread_count;
            stats
        })
    }
}

/// Message counts straight from the store.
pub async fn message_stats(store: &dyn MessageStore) -> Result<MessageStats, DatabaseError> {
    store.message_stats().await
}

/// Every conversation, recomputed from the store's current messages.
pub async fn all_conversations(
    store: &dyn MessageStore,
    resolver: &ThreadResolver,
) -> Result<Vec<Conversation>, DatabaseError> {
    let messages = store.list(&MessageFilter::default(), None).await?;
    Ok(resolver.group(&messages))
}

/// Conversation counts recomputed from the store.
pub async fn conversation_stats(
    store: &dyn MessageStore,
    resolver: &ThreadResolver,
) -> Result<ConversationStats, DatabaseError> {
    let conversations = all_conversations(store, resolver).await?;
    Ok(ConversationStats::from_conversations(&conversations))
}
