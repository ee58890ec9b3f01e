//! Admin query surface: filtering, pagination, read-state, deletion,
//! conversation listing and detail.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::{AdminError, FieldError, ValidationError};
use crate::inquiries::model::{Conversation, ConversationStatus, Message, MessageType, Priority};
use crate::inquiries::stats::{self, ConversationStats, MessageStats};
use crate::pipeline::threading::{ThreadResolver, sorted_members};
use crate::store::{MessageFilter, MessageStore, PageRequest};

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 200;

// ── Requests ────────────────────────────────────────────────────────

/// Query string of `GET /api/messages`. Raw strings, validated here so every
/// problem is reported in one error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub read: Option<String>,
    pub search: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

/// Query string of `GET /api/conversations`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationQuery {
    pub status: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

// ── Responses ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    /// 1-based page containing `offset`.
    pub page: usize,
    pub total_pages: usize,
    pub has_more: bool,
}

impl Pagination {
    pub fn new(page: PageRequest, total: usize) -> Self {
        Self {
            total,
            limit: page.limit,
            offset: page.offset,
            page: page.offset / page.limit + 1,
            total_pages: total.div_ceil(page.limit),
            has_more: page.offset.saturating_add(page.limit) < total,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageList {
    pub messages: Vec<Message>,
    pub stats: MessageStats,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationList {
    pub conversations: Vec<Conversation>,
    pub stats: ConversationStats,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationDetail {
    pub conversation: Conversation,
    /// Members, oldest first.
    pub messages: Vec<Message>,
}

// ── Parsing helpers ─────────────────────────────────────────────────

fn blank_to_none(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Parse an optional enum-like parameter, recording a field error on failure.
fn parse_param<T: std::str::FromStr>(
    field: &str,
    value: &Option<String>,
    errors: &mut Vec<FieldError>,
) -> Option<T> {
    let raw = blank_to_none(value)?;
    match raw.parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            errors.push(FieldError::new(field, format!("unrecognized value {raw:?}")));
            None
        }
    }
}

fn parse_read(value: &Option<String>, errors: &mut Vec<FieldError>) -> Option<bool> {
    let raw = blank_to_none(value)?;
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => {
            errors.push(FieldError::new("read", "must be true or false"));
            None
        }
    }
}

/// Limit defaults to 50 and is clamped to `1..=200`; offset defaults to 0.
fn parse_page(
    limit: &Option<String>,
    offset: &Option<String>,
    errors: &mut Vec<FieldError>,
) -> PageRequest {
    let limit = match blank_to_none(limit) {
        None => DEFAULT_LIMIT,
        Some(raw) => match raw.parse::<i64>() {
            Ok(n) => n.clamp(1, MAX_LIMIT as i64) as usize,
            Err(_) => {
                errors.push(FieldError::new("limit", "must be an integer"));
                DEFAULT_LIMIT
            }
        },
    };
    let offset = match blank_to_none(offset) {
        None => 0,
        Some(raw) => match raw.parse::<usize>() {
            Ok(n) => n,
            Err(_) => {
                errors.push(FieldError::new("offset", "must be a non-negative integer"));
                0
            }
        },
    };
    PageRequest { limit, offset }
}

/// Message ids are UUIDs; anything else is a validation error.
fn require_uuid(field: &str, id: &str) -> Result<(), ValidationError> {
    Uuid::parse_str(id.trim())
        .map(|_| ())
        .map_err(|_| ValidationError::single(field, "must be a UUID"))
}

// ── Service ─────────────────────────────────────────────────────────

/// Admin operations over an injected store.
pub struct AdminService {
    store: Arc<dyn MessageStore>,
    resolver: ThreadResolver,
}

impl AdminService {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self {
            store,
            resolver: ThreadResolver::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    /// Filtered, searched, paginated messages with global stats.
    pub async fn list_messages(&self, query: &ListQuery) -> Result<MessageList, AdminError> {
        let mut errors = Vec::new();
        let kind = parse_param::<MessageType>("type", &query.kind, &mut errors);
        let is_read = parse_read(&query.read, &mut errors);
        let page = parse_page(&query.limit, &query.offset, &mut errors);
        ValidationError::check(errors)?;

        let filter = MessageFilter {
            kind,
            is_read,
            search: blank_to_none(&query.search).map(String::from),
            conversation_id: None,
        };

        let total = self.store.count(&filter).await?;
        let messages = self.store.list(&filter, Some(page)).await?;
        let stats = stats::message_stats(self.store.as_ref()).await?;

        Ok(MessageList {
            messages,
            stats,
            pagination: Pagination::new(page, total),
        })
    }

    pub async fn get_message(&self, id: &str) -> Result<Message, AdminError> {
        require_uuid("id", id)?;
        self.store
            .get(id)
            .await?
            .ok_or_else(|| AdminError::message_not_found(id))
    }

    /// Set the read flag. Repeating the same call is a no-op.
    pub async fn mark_read(&self, id: &str, read: bool) -> Result<Message, AdminError> {
        require_uuid("id", id)?;
        if !self.store.set_read(id, read).await? {
            return Err(AdminError::message_not_found(id));
        }
        info!(id = id, is_read = read, "Message read state set");
        self.store
            .get(id)
            .await?
            .ok_or_else(|| AdminError::message_not_found(id))
    }

    pub async fn delete_one(&self, id: &str) -> Result<(), AdminError> {
        require_uuid("id", id)?;
        if !self.store.delete(id).await? {
            return Err(AdminError::message_not_found(id));
        }
        info!(id = id, "Message deleted");
        Ok(())
    }

    /// Delete a set of ids; absent ids are ignored. Returns the count deleted.
    pub async fn delete_many(&self, ids: &[String]) -> Result<usize, AdminError> {
        if ids.is_empty() {
            return Err(ValidationError::single("ids", "must not be empty").into());
        }
        let malformed: Vec<FieldError> = ids
            .iter()
            .filter(|id| require_uuid("ids", id).is_err())
            .map(|id| FieldError::new("ids", format!("{id:?} is not a UUID")))
            .collect();
        ValidationError::check(malformed)?;

        Ok(self.store.delete_many(ids).await?)
    }

    /// Conversations filtered by status/category/priority, most recent first.
    pub async fn list_conversations(
        &self,
        query: &ConversationQuery,
    ) -> Result<ConversationList, AdminError> {
        let mut errors = Vec::new();
        let status = parse_param::<ConversationStatus>("status", &query.status, &mut errors);
        let category = parse_param::<MessageType>("category", &query.category, &mut errors);
        let priority = parse_param::<Priority>("priority", &query.priority, &mut errors);
        let page = parse_page(&query.limit, &query.offset, &mut errors);
        ValidationError::check(errors)?;

        let all = stats::all_conversations(self.store.as_ref(), &self.resolver).await?;
        let stats = ConversationStats::from_conversations(&all);

        let matching: Vec<Conversation> = all
            .into_iter()
            .filter(|c| status.is_none_or(|s| s == c.status))
            .filter(|c| category.is_none_or(|k| k == c.category))
            .filter(|c| priority.is_none_or(|p| p == c.priority))
            .collect();
        let total = matching.len();
        let conversations = matching
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .collect();

        Ok(ConversationList {
            conversations,
            stats,
            pagination: Pagination::new(page, total),
        })
    }

    /// One conversation and its members, oldest first.
    pub async fn conversation_detail(&self, id: &str) -> Result<ConversationDetail, AdminError> {
        let members = self
            .store
            .list(&MessageFilter::conversation(id), None)
            .await?;
        let conversation = self
            .resolver
            .summarize(&members)
            .ok_or_else(|| AdminError::conversation_not_found(id))?;
        let messages = sorted_members(members.iter()).into_iter().cloned().collect();

        Ok(ConversationDetail {
            conversation,
            messages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    use crate::inquiries::model::MessageSource;
    use crate::store::BoundedMemoryStore;

    fn message(n: i64, kind: MessageType, conversation: Option<&str>, subject: &str) -> Message {
        let id = Uuid::new_v4().to_string();
        Message {
            conversation_id: conversation.map(String::from).unwrap_or_else(|| id.clone()),
            id,
            kind,
            from_name: format!("Person {n}"),
            from_email: format!("p{n}@mail.com"),
            phone: None,
            company: None,
            service: None,
            subject: subject.into(),
            body: format!("body {n}"),
            project_location: None,
            timeline: None,
            budget: None,
            details: None,
            created_at: Utc.with_ymd_and_hms(2026, 4, 1, 8, 0, 0).unwrap() + Duration::minutes(n),
            is_read: false,
            has_attachments: false,
            source: MessageSource::InboundEmail,
        }
    }

    async fn seeded(count: i64) -> (AdminService, Vec<Message>) {
        let store = Arc::new(BoundedMemoryStore::new(1000));
        let mut seeded = Vec::new();
        for n in 0..count {
            let kind = if n % 3 == 0 {
                MessageType::Quote
            } else {
                MessageType::Contact
            };
            let msg = message(n, kind, None, &format!("Subject {n}"));
            store.append(&msg).await.unwrap();
            seeded.push(msg);
        }
        (AdminService::new(store), seeded)
    }

    fn page(limit: Option<&str>, offset: Option<&str>) -> ListQuery {
        ListQuery {
            limit: limit.map(String::from),
            offset: offset.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn pagination_math() {
        let p = Pagination::new(PageRequest { limit: 10, offset: 20 }, 25);
        assert_eq!((p.page, p.total_pages, p.has_more), (3, 3, false));
        let p = Pagination::new(PageRequest { limit: 10, offset: 0 }, 25);
        assert_eq!((p.page, p.total_pages, p.has_more), (1, 3, true));
        let p = Pagination::new(PageRequest { limit: 50, offset: 0 }, 0);
        assert_eq!((p.page, p.total_pages, p.has_more), (1, 0, false));
    }

    #[tokio::test]
    async fn limit_defaults_and_clamps() {
        let (admin, _) = seeded(5).await;
        let list = admin.list_messages(&ListQuery::default()).await.unwrap();
        assert_eq!(list.pagination.limit, DEFAULT_LIMIT);

        let list = admin.list_messages(&page(Some("5000"), None)).await.unwrap();
        assert_eq!(list.pagination.limit, MAX_LIMIT);

        let list = admin.list_messages(&page(Some("0"), None)).await.unwrap();
        assert_eq!(list.pagination.limit, 1);
        assert_eq!(list.messages.len(), 1);

        let list = admin.list_messages(&page(Some("-3"), None)).await.unwrap();
        assert_eq!(list.pagination.limit, 1);
    }

    #[tokio::test]
    async fn pages_are_disjoint_and_ordered() {
        let (admin, _) = seeded(7).await;
        let first = admin.list_messages(&page(Some("3"), Some("0"))).await.unwrap();
        let second = admin.list_messages(&page(Some("3"), Some("3"))).await.unwrap();
        let third = admin.list_messages(&page(Some("3"), Some("6"))).await.unwrap();

        assert_eq!(first.pagination.total, 7);
        assert_eq!(first.pagination.total_pages, 3);
        assert!(first.pagination.has_more);
        assert!(!third.pagination.has_more);
        assert_eq!(third.messages.len(), 1);

        let all: Vec<_> = [first, second, third]
            .into_iter()
            .flat_map(|l| l.messages)
            .collect();
        assert_eq!(all.len(), 7);
        assert!(all.windows(2).all(|w| w[0].created_at > w[1].created_at));
    }

    #[tokio::test]
    async fn bad_parameters_are_reported_together() {
        let (admin, _) = seeded(1).await;
        let query = ListQuery {
            kind: Some("spam".into()),
            read: Some("maybe".into()),
            limit: Some("ten".into()),
            ..Default::default()
        };
        let AdminError::Invalid(err) = admin.list_messages(&query).await.unwrap_err() else {
            panic!("expected validation error");
        };
        assert!(err.has_field("type"));
        assert!(err.has_field("read"));
        assert!(err.has_field("limit"));
    }

    #[tokio::test]
    async fn filters_and_search() {
        let (admin, seeded) = seeded(6).await;
        let quotes = ListQuery {
            kind: Some("quote".into()),
            ..Default::default()
        };
        let list = admin.list_messages(&quotes).await.unwrap();
        assert_eq!(list.pagination.total, 2);
        assert_eq!(list.stats.total, 6);

        let search = ListQuery {
            search: Some("P4@MAIL".into()),
            ..Default::default()
        };
        let list = admin.list_messages(&search).await.unwrap();
        assert_eq!(list.messages.len(), 1);
        assert_eq!(list.messages[0].id, seeded[4].id);
    }

    #[tokio::test]
    async fn mark_read_is_idempotent() {
        let (admin, seeded) = seeded(2).await;
        let id = &seeded[0].id;

        admin.mark_read(id, true).await.unwrap();
        let after_one = admin.list_messages(&ListQuery::default()).await.unwrap().stats;
        admin.mark_read(id, true).await.unwrap();
        let after_two = admin.list_messages(&ListQuery::default()).await.unwrap().stats;
        assert_eq!(after_one, after_two);
        assert_eq!(after_two.unread, 1);

        let unread = admin.mark_read(id, false).await.unwrap();
        assert!(!unread.is_read);
    }

    #[tokio::test]
    async fn missing_and_malformed_ids() {
        let (admin, _) = seeded(1).await;
        let absent = Uuid::new_v4().to_string();
        assert!(matches!(
            admin.mark_read(&absent, true).await,
            Err(AdminError::NotFound { .. })
        ));
        assert!(matches!(
            admin.mark_read("not-a-uuid", true).await,
            Err(AdminError::Invalid(_))
        ));
        assert!(matches!(
            admin.delete_one(&absent).await,
            Err(AdminError::NotFound { .. })
        ));
        assert!(matches!(
            admin.get_message("42").await,
            Err(AdminError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn delete_then_delete_again() {
        let (admin, seeded) = seeded(3).await;
        admin.delete_one(&seeded[0].id).await.unwrap();
        assert!(matches!(
            admin.delete_one(&seeded[0].id).await,
            Err(AdminError::NotFound { .. })
        ));

        let ids = vec![
            seeded[1].id.clone(),
            seeded[2].id.clone(),
            Uuid::new_v4().to_string(),
        ];
        assert_eq!(admin.delete_many(&ids).await.unwrap(), 2);
        assert_eq!(admin.delete_many(&ids).await.unwrap(), 0);
        assert!(matches!(
            admin.delete_many(&[]).await,
            Err(AdminError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn conversations_list_filter_and_detail() {
        let store = Arc::new(BoundedMemoryStore::new(100));
        let first = message(0, MessageType::Quote, Some("thread-a"), "URGENT: burst pipe");
        let reply = message(5, MessageType::Contact, Some("thread-a"), "Re: URGENT: burst pipe");
        let lone = message(3, MessageType::Contact, None, "Opening hours");
        for m in [&reply, &lone, &first] {
            store.append(m).await.unwrap();
        }
        let admin = AdminService::new(store);
        admin.mark_read(&lone.id, true).await.unwrap();

        let all = admin
            .list_conversations(&ConversationQuery::default())
            .await
            .unwrap();
        assert_eq!(all.pagination.total, 2);
        assert_eq!(all.conversations[0].id, "thread-a");
        assert_eq!(all.stats.urgent_count, 1);

        let high = ConversationQuery {
            priority: Some("high".into()),
            ..Default::default()
        };
        let list = admin.list_conversations(&high).await.unwrap();
        assert_eq!(list.conversations.len(), 1);
        assert_eq!(list.conversations[0].category, MessageType::Quote);

        let open = ConversationQuery {
            status: Some("open".into()),
            ..Default::default()
        };
        let list = admin.list_conversations(&open).await.unwrap();
        assert_eq!(list.conversations.len(), 1);
        assert_eq!(list.conversations[0].id, lone.id);

        let closed = ConversationQuery {
            status: Some("closed".into()),
            ..Default::default()
        };
        assert!(admin.list_conversations(&closed).await.unwrap().conversations.is_empty());

        let detail = admin.conversation_detail("thread-a").await.unwrap();
        assert_eq!(detail.conversation.message_count, 2);
        assert_eq!(detail.conversation.subject, "URGENT: burst pipe");
        assert_eq!(detail.messages[0].id, first.id);
        assert_eq!(detail.messages[1].id, reply.id);

        assert!(matches!(
            admin.conversation_detail("nope").await,
            Err(AdminError::NotFound { .. })
        ));
    }
}
