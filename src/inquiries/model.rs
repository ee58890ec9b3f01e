//! Inquiry data model: messages, conversations, and their status enums.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classification of an inquiry. Assigned once at ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Sales inquiry asking for a price or proposal.
    Quote,
    /// General contact message.
    Contact,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Contact => "contact",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MessageType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quote" => Ok(Self::Quote),
            "contact" => Ok(Self::Contact),
            _ => Err(format!("Unknown message type: {}", s)),
        }
    }
}

/// Channel a message arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageSource {
    #[serde(rename = "form")]
    Form,
    #[serde(rename = "inbound-email")]
    InboundEmail,
}

impl MessageSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Form => "form",
            Self::InboundEmail => "inbound-email",
        }
    }
}

impl std::str::FromStr for MessageSource {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "form" => Ok(Self::Form),
            "inbound-email" => Ok(Self::InboundEmail),
            _ => Err(format!("Unknown message source: {}", s)),
        }
    }
}

/// A normalized, classified, thread-resolved inquiry.
///
/// Content fields never change after creation. Only `is_read` is mutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub from_name: String,
    pub from_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    pub subject: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
    pub has_attachments: bool,
    pub conversation_id: String,
    pub source: MessageSource,
}

impl Message {
    /// True if `needle` (already lowercased) occurs in name, email, subject, or body.
    pub fn matches_search(&self, needle: &str) -> bool {
        [
            &self.from_name,
            &self.from_email,
            &self.subject,
            &self.body,
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
    }
}

/// Derived conversation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    /// Every member has been read.
    Open,
    /// At least one member is unread.
    Pending,
    /// Accepted as a filter value; never derived from members.
    Closed,
}

impl ConversationStatus {
    pub fn from_unread(has_unread: bool) -> Self {
        if has_unread { Self::Pending } else { Self::Open }
    }
}

impl std::str::FromStr for ConversationStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "pending" => Ok(Self::Pending),
            "closed" => Ok(Self::Closed),
            _ => Err(format!("Unknown conversation status: {}", s)),
        }
    }
}

/// Conversation priority, derived from the first member's subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Normal,
    High,
}

impl std::str::FromStr for Priority {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "high" | "urgent" => Ok(Self::High),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

/// A conversation is a computed view over messages sharing a conversation id.
///
/// Holds no state of its own: every field is reproducible from its members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub subject: String,
    pub category: MessageType,
    pub priority: Priority,
    pub status: ConversationStatus,
    pub message_count: usize,
    pub first_message_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
    pub has_unread: bool,
    pub unread_count: usize,
    pub participants: Vec<String>,
}
