//! Shared types for the intake pipeline.

use std::ops::RangeInclusive;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::inquiries::model::{MessageSource, MessageType};

// ── Canonical record ────────────────────────────────────────────────

/// Channel-neutral intermediate record.
///
/// Both ingestion channels convert their native shape into this struct.
/// The pipeline then classifies, thread-resolves, and stores it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Which channel produced the record.
    pub source: MessageSource,
    /// Sender address.
    pub from_address: String,
    /// Sender display name, when the channel supplies one.
    pub from_name: Option<String>,
    /// Recipient address.
    pub to_address: String,
    pub subject: String,
    /// Plain-text body.
    pub text_body: String,
    pub html_body: Option<String>,
    pub received_at: DateTime<Utc>,
    /// Explicit caller intent. Overrides every classification heuristic.
    pub origin: Option<MessageType>,
    /// Structured form fields. `None` for the inbound-email channel.
    pub structured: Option<StructuredFields>,
    /// Identifiers used to group this record into a conversation.
    pub thread: ThreadHints,
    pub has_attachments: bool,
}

/// Structured fields a web form supplies directly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuredFields {
    pub phone: Option<String>,
    pub company: Option<String>,
    pub service: Option<String>,
    pub project_location: Option<String>,
    pub timeline: Option<String>,
    pub budget: Option<String>,
    pub message: Option<String>,
    pub details: Option<String>,
}

/// Identifier chain for conversation grouping, highest priority first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadHints {
    /// Conversation id supplied explicitly by the caller.
    pub conversation_id: Option<String>,
    /// Provider thread id (e.g. first `References` entry).
    pub provider_thread_id: Option<String>,
    /// Provider message id (`Message-ID`).
    pub provider_message_id: Option<String>,
}

/// Years a stored timestamp may carry. Later years have no RFC 3339 form.
pub const STORABLE_YEARS: RangeInclusive<i32> = 1970..=9999;

/// Keep a timestamp only if its year is in [`STORABLE_YEARS`].
pub fn storable_timestamp(ts: DateTime<Utc>) -> Option<DateTime<Utc>> {
    STORABLE_YEARS.contains(&ts.year()).then_some(ts)
}

/// Trim a value and drop it if nothing is left.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}
