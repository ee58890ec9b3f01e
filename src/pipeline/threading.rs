//! Thread resolver: groups messages into conversations.
//!
//! Each message gets a conversation key once, at ingestion, from the first
//! present identifier in this chain:
//! 1. explicit conversation id
//! 2. provider thread id
//! 3. provider message id
//! 4. the message's own id (singleton conversation)
//!
//! Conversations are then recomputed on read from their members. Members are
//! sorted by `(created_at, id)` before deriving anything, so the output does
//! not depend on input order.

use std::collections::BTreeMap;

use regex::Regex;

use crate::inquiries::model::{Conversation, ConversationStatus, Message, Priority};
use crate::pipeline::types::{ThreadHints, non_blank};

/// Pick the conversation key for a message.
pub fn resolve_key(hints: &ThreadHints, own_id: &str) -> String {
    non_blank(hints.conversation_id.as_deref())
        .or_else(|| non_blank(hints.provider_thread_id.as_deref()))
        .or_else(|| non_blank(hints.provider_message_id.as_deref()))
        .unwrap_or_else(|| own_id.to_string())
}

/// Builds conversation views from messages.
pub struct ThreadResolver {
    urgency: Regex,
    reply_prefix: Regex,
}

impl ThreadResolver {
    pub fn new() -> Self {
        Self {
            urgency: Regex::new(r"(?i)\b(urgent|asap|emergency|immediately|critical)\b")
                .expect("urgency pattern is valid"),
            reply_prefix: Regex::new(r"(?i)^\s*(?:(?:re|fw|fwd|aw)\s*(?:\[\d+\])?\s*:\s*)+")
                .expect("reply prefix pattern is valid"),
        }
    }

    /// Subject matches the urgency vocabulary.
    pub fn is_urgent(&self, subject: &str) -> bool {
        self.urgency.is_match(subject)
    }

    /// Subject with leading reply/forward markers removed.
    pub fn base_subject(&self, subject: &str) -> String {
        let stripped = self.reply_prefix.replace(subject, "");
        let stripped = stripped.trim();
        if stripped.is_empty() {
            "(no subject)".to_string()
        } else {
            stripped.to_string()
        }
    }

    /// Start a conversation from its earliest member.
    pub fn start(&self, first: &Message) -> Conversation {
        let priority = if self.is_urgent(&first.subject) {
            Priority::High
        } else {
            Priority::Normal
        };
        Conversation {
            id: first.conversation_id.clone(),
            subject: self.base_subject(&first.subject),
            category: first.kind,
            priority,
            status: ConversationStatus::from_unread(!first.is_read),
            message_count: 1,
            first_message_at: first.created_at,
            last_message_at: first.created_at,
            has_unread: !first.is_read,
            unread_count: usize::from(!first.is_read),
            participants: vec![first.from_email.clone()],
        }
    }

    /// Fold one more member into a conversation.
    ///
    /// First-message fields (subject, category, priority) are left alone.
    pub fn merge(&self, conversation: &mut Conversation, message: &Message) {
        conversation.message_count += 1;
        conversation.last_message_at = conversation.last_message_at.max(message.created_at);
        conversation.first_message_at = conversation.first_message_at.min(message.created_at);
        conversation.has_unread = conversation.has_unread || !message.is_read;
        conversation.unread_count += usize::from(!message.is_read);
        conversation.status = ConversationStatus::from_unread(conversation.has_unread);
        if !conversation.participants.contains(&message.from_email) {
            conversation.participants.push(message.from_email.clone());
        }
    }

    /// Build one conversation from an arbitrary-order member list.
    ///
    /// Returns `None` for an empty list.
    pub fn summarize(&self, members: &[Message]) -> Option<Conversation> {
        self.fold(&sorted_members(members.iter()))
    }

    fn fold(&self, ordered: &[&Message]) -> Option<Conversation> {
        let (first, rest) = ordered.split_first()?;
        let mut conversation = self.start(first);
        for message in rest {
            self.merge(&mut conversation, message);
        }
        Some(conversation)
    }

    /// Group messages into conversations, most recently active first.
    pub fn group(&self, messages: &[Message]) -> Vec<Conversation> {
        let mut buckets: BTreeMap<&str, Vec<&Message>> = BTreeMap::new();
        for message in messages {
            buckets
                .entry(message.conversation_id.as_str())
                .or_default()
                .push(message);
        }

        let mut conversations: Vec<Conversation> = buckets
            .into_values()
            .filter_map(|members| self.fold(&sorted_members(members.into_iter())))
            .collect();

        conversations.sort_by(|a, b| {
            b.last_message_at
                .cmp(&a.last_message_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        conversations
    }
}

impl Default for ThreadResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Members in `(created_at, id)` ascending order.
pub fn sorted_members<'a>(members: impl Iterator<Item = &'a Message>) -> Vec<&'a Message> {
    let mut ordered: Vec<&Message> = members.collect();
    ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    ordered
}

/// Compare an incrementally maintained conversation against a recompute.
///
/// Returns the names of fields that drifted; empty means consistent.
pub fn reconcile(stored: &Conversation, recomputed: &Conversation) -> Vec<&'static str> {
    let mut drift = Vec::new();
    if stored.id != recomputed.id {
        drift.push("id");
    }
    if stored.subject != recomputed.subject {
        drift.push("subject");
    }
    if stored.category != recomputed.category {
        drift.push("category");
    }
    if stored.priority != recomputed.priority {
        drift.push("priority");
    }
    if stored.status != recomputed.status {
        drift.push("status");
    }
    if stored.message_count != recomputed.message_count {
        drift.push("message_count");
    }
    if stored.first_message_at != recomputed.first_message_at {
        drift.push("first_message_at");
    }
    if stored.last_message_at != recomputed.last_message_at {
        drift.push("last_message_at");
    }
    if stored.has_unread != recomputed.has_unread {
        drift.push("has_unread");
    }
    if stored.unread_count != recomputed.unread_count {
        drift.push("unread_count");
    }
    drift
}
