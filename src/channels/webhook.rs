//! Inbound-email webhook payload normalization.
//!
//! Providers disagree on key spelling, so every logical field has an ordered
//! alias chain. The first key holding a non-empty value wins. Values may be
//! plain strings, `{email|address, name}` objects, or arrays of either (the
//! first element is used). A raw RFC 822 source, when present, is the last
//! fallback for every field.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use tracing::warn;

use crate::channels::email_types::{RawEmail, parse_raw, strip_html};
use crate::error::IngestError;
use crate::inquiries::model::{MessageSource, MessageType};
use crate::pipeline::types::{CanonicalRecord, ThreadHints, storable_timestamp};

/// One webhook payload object.
pub type Item = Map<String, Value>;

// ── Alias tables ────────────────────────────────────────────────────

pub const FROM_KEYS: &[&str] = &[
    "from",
    "From",
    "sender",
    "from_email",
    "fromEmail",
    "fromAddress",
    "envelope.from",
];
pub const FROM_NAME_KEYS: &[&str] = &["fromName", "from_name", "senderName", "sender_name"];
pub const TO_KEYS: &[&str] = &[
    "to",
    "To",
    "recipient",
    "to_email",
    "toEmail",
    "toAddress",
    "envelope.to",
];
pub const SUBJECT_KEYS: &[&str] = &["subject", "Subject", "title"];
pub const TEXT_KEYS: &[&str] = &[
    "text",
    "textBody",
    "text_body",
    "body-plain",
    "plain",
    "TextBody",
    "body",
];
pub const HTML_KEYS: &[&str] = &["html", "htmlBody", "html_body", "body-html", "HtmlBody"];
pub const RECEIVED_KEYS: &[&str] = &["receivedAt", "received_at", "date", "Date", "timestamp"];
pub const RAW_KEYS: &[&str] = &["raw", "rawEmail", "raw_email", "mime", "email"];
pub const CONVERSATION_KEYS: &[&str] = &["conversationId", "conversation_id"];
pub const THREAD_KEYS: &[&str] = &[
    "threadId",
    "thread_id",
    "ThreadId",
    "References",
    "references",
    "inReplyTo",
    "in_reply_to",
    "In-Reply-To",
];
pub const MESSAGE_ID_KEYS: &[&str] = &[
    "messageId",
    "message_id",
    "MessageID",
    "Message-Id",
    "Message-ID",
];
pub const ORIGIN_KEYS: &[&str] = &["origin", "inquiryType", "inquiry_type"];
pub const ATTACHMENT_KEYS: &[&str] = &[
    "attachments",
    "Attachments",
    "hasAttachments",
    "has_attachments",
    "attachmentCount",
    "attachment-count",
];

pub const DEFAULT_SUBJECT: &str = "(no subject)";

// ── Value helpers ───────────────────────────────────────────────────

/// Look up a key, following one level of dotted path (`envelope.from`).
fn lookup<'a>(item: &'a Item, key: &str) -> Option<&'a Value> {
    match key.split_once('.') {
        Some((outer, inner)) => item.get(outer)?.as_object()?.get(inner),
        None => item.get(key),
    }
}

/// Text of a value: strings, `{email|address}` objects, first array element.
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(obj) => ["email", "address"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(value_text)),
        Value::Array(items) => items.first().and_then(value_text),
        _ => None,
    }
}

/// Display name carried alongside an address object.
fn value_name(value: &Value) -> Option<String> {
    match value {
        Value::Object(obj) => obj.get("name").and_then(value_text),
        Value::Array(items) => items.first().and_then(value_name),
        _ => None,
    }
}

/// First non-empty text across an alias chain.
fn first_text(item: &Item, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| lookup(item, k))
        .find_map(value_text)
}

/// Split `Name <addr@host>` into its parts. Bare addresses have no name.
fn split_mailbox(raw: &str) -> (Option<String>, String) {
    if let Some(open) = raw.rfind('<')
        && let Some(close) = raw[open..].find('>')
    {
        let address = raw[open + 1..open + close].trim().to_string();
        let name = raw[..open].trim().trim_matches('"').trim();
        let name = (!name.is_empty()).then(|| name.to_string());
        return (name, address);
    }
    (None, raw.trim().to_string())
}

/// Parse a timestamp: RFC 3339, RFC 2822, or unix seconds/milliseconds.
///
/// Values outside the storable year range count as unparseable.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            let n: i64 = raw.parse().ok()?;
            if n.unsigned_abs() >= 1_000_000_000_000 {
                Utc.timestamp_millis_opt(n).single()
            } else {
                Utc.timestamp_opt(n, 0).single()
            }
        })?;
    storable_timestamp(parsed)
}

// ── Field accessors ─────────────────────────────────────────────────

/// Sender address, with any display name removed.
pub fn from_address(item: &Item) -> Option<String> {
    first_text(item, FROM_KEYS).map(|v| split_mailbox(&v).1).filter(|a| !a.is_empty())
}

/// Sender display name from a dedicated key, an address object, or `Name <addr>`.
pub fn from_name(item: &Item) -> Option<String> {
    first_text(item, FROM_NAME_KEYS)
        .or_else(|| {
            FROM_KEYS
                .iter()
                .filter_map(|k| lookup(item, k))
                .find_map(value_name)
        })
        .or_else(|| first_text(item, FROM_KEYS).and_then(|v| split_mailbox(&v).0))
}

pub fn to_address(item: &Item) -> Option<String> {
    first_text(item, TO_KEYS).map(|v| split_mailbox(&v).1).filter(|a| !a.is_empty())
}

pub fn subject(item: &Item) -> Option<String> {
    first_text(item, SUBJECT_KEYS)
}

pub fn text_body(item: &Item) -> Option<String> {
    first_text(item, TEXT_KEYS)
}

pub fn html_body(item: &Item) -> Option<String> {
    first_text(item, HTML_KEYS)
}

/// Receipt time. Present but unparseable values are logged and ignored.
pub fn received_at(item: &Item) -> Option<DateTime<Utc>> {
    let raw = first_text(item, RECEIVED_KEYS)?;
    let parsed = parse_timestamp(&raw);
    if parsed.is_none() {
        warn!(value = %raw, "Unparseable webhook timestamp, using receipt time");
    }
    parsed
}

pub fn conversation_id(item: &Item) -> Option<String> {
    first_text(item, CONVERSATION_KEYS)
}

/// Provider thread id. A `References` list yields its first id.
pub fn thread_id(item: &Item) -> Option<String> {
    first_text(item, THREAD_KEYS).and_then(|v| {
        v.split_whitespace()
            .next()
            .map(|id| id.trim_matches(|c| c == '<' || c == '>').to_string())
    })
}

pub fn message_id(item: &Item) -> Option<String> {
    first_text(item, MESSAGE_ID_KEYS).map(|v| v.trim_matches(|c| c == '<' || c == '>').to_string())
}

/// Raw RFC 822 source. Single-line values are not message sources.
pub fn raw_source(item: &Item) -> Option<String> {
    RAW_KEYS
        .iter()
        .filter_map(|k| lookup(item, k))
        .filter_map(Value::as_str)
        .find(|s| s.contains('\n'))
        .map(str::to_string)
}

/// Explicit caller intent. Unknown values are ignored.
pub fn origin(item: &Item) -> Option<MessageType> {
    first_text(item, ORIGIN_KEYS).and_then(|v| v.parse().ok())
}

/// True for a non-empty attachment list, a positive count, or `true`.
pub fn has_attachments(item: &Item) -> bool {
    ATTACHMENT_KEYS
        .iter()
        .filter_map(|k| lookup(item, k))
        .any(|v| match v {
            Value::Array(list) => !list.is_empty(),
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|n| n > 0.0),
            Value::String(s) => s.trim().parse::<u64>().is_ok_and(|n| n > 0),
            _ => false,
        })
}

// ── Payload parsing ─────────────────────────────────────────────────

/// Normalize a webhook payload. An object is one item, an array is many.
///
/// Each entry in the result corresponds to one input item, in order.
pub fn parse_payload(payload: &Value) -> Vec<Result<CanonicalRecord, IngestError>> {
    match payload {
        Value::Array(items) => items.iter().map(parse_value).collect(),
        other => vec![parse_value(other)],
    }
}

fn parse_value(value: &Value) -> Result<CanonicalRecord, IngestError> {
    match value {
        Value::Object(item) => parse_item(item),
        _ => Err(IngestError::Parse("item is not a JSON object".into())),
    }
}

/// Normalize one payload object into a canonical record.
pub fn parse_item(item: &Item) -> Result<CanonicalRecord, IngestError> {
    let raw = match raw_source(item) {
        Some(source) => Some(
            parse_raw(&source)
                .ok_or_else(|| IngestError::Parse("raw message source is unparseable".into()))?,
        ),
        None => None,
    };
    let raw = raw.as_ref();
    let from_raw = |f: fn(&RawEmail) -> Option<String>| raw.and_then(f);

    let from_address = from_address(item)
        .or_else(|| from_raw(|r| r.from_address.clone()))
        .ok_or_else(|| IngestError::Parse("missing sender address".into()))?;
    let to_address = to_address(item)
        .or_else(|| from_raw(|r| r.to_address.clone()))
        .ok_or_else(|| IngestError::Parse("missing recipient address".into()))?;

    let html_body = html_body(item).or_else(|| from_raw(|r| r.html_body.clone()));
    let text_body = text_body(item)
        .or_else(|| from_raw(|r| r.text_body.clone()).filter(|t| !t.is_empty()))
        .or_else(|| html_body.as_deref().map(strip_html))
        .unwrap_or_default();

    let thread = ThreadHints {
        conversation_id: conversation_id(item),
        provider_thread_id: thread_id(item).or_else(|| from_raw(|r| r.thread_id.clone())),
        provider_message_id: message_id(item).or_else(|| from_raw(|r| r.message_id.clone())),
    };

    Ok(CanonicalRecord {
        source: MessageSource::InboundEmail,
        from_name: from_name(item).or_else(|| from_raw(|r| r.from_name.clone())),
        from_address,
        to_address,
        subject: subject(item)
            .or_else(|| from_raw(|r| r.subject.clone()))
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
        text_body,
        html_body,
        received_at: received_at(item)
            .or_else(|| raw.and_then(|r| r.received_at).and_then(storable_timestamp))
            .unwrap_or_else(Utc::now),
        origin: origin(item),
        structured: None,
        thread,
        has_attachments: has_attachments(item) || raw.is_some_and(|r| r.has_attachments),
    })
}
