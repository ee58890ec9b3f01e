//! Bounded in-memory message store with FIFO eviction.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::inquiries::model::Message;
use crate::store::traits::{MessageFilter, MessageStore, PageRequest, RetentionPredicate};

/// Default capacity of the bounded store.
pub const DEFAULT_CAPACITY: usize = 1000;

/// In-memory store holding at most `capacity` messages.
///
/// Once full, each append evicts the oldest-appended message, so the retained
/// set is always the `capacity` most recently appended. A single lock guards
/// append, scan, and update.
pub struct BoundedMemoryStore {
    messages: RwLock<VecDeque<Message>>,
    capacity: usize,
}

impl BoundedMemoryStore {
    /// Create a store. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            messages: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of messages currently retained.
    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}

impl Default for BoundedMemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Newest first; ties broken by id so the order is total.
fn newest_first(a: &Message, b: &Message) -> std::cmp::Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

#[async_trait]
impl MessageStore for BoundedMemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn append(&self, message: &Message) -> Result<(), DatabaseError> {
        let mut messages = self.messages.write().await;
        if messages.iter().any(|m| m.id == message.id) {
            return Err(DatabaseError::Constraint(format!(
                "message {} already exists",
                message.id
            )));
        }
        messages.push_back(message.clone());
        while messages.len() > self.capacity {
            if let Some(evicted) = messages.pop_front() {
                debug!(id = %evicted.id, "Evicted oldest message from bounded store");
            }
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Message>, DatabaseError> {
        let messages = self.messages.read().await;
        Ok(messages.iter().find(|m| m.id == id).cloned())
    }

    async fn list(
        &self,
        filter: &MessageFilter,
        page: Option<PageRequest>,
    ) -> Result<Vec<Message>, DatabaseError> {
        let mut matching: Vec<Message> = {
            let messages = self.messages.read().await;
            messages.iter().filter(|m| filter.matches(m)).cloned().collect()
        };
        matching.sort_by(newest_first);

        Ok(match page {
            Some(page) => matching
                .into_iter()
                .skip(page.offset)
                .take(page.limit)
                .collect(),
            None => matching,
        })
    }

    async fn count(&self, filter: &MessageFilter) -> Result<usize, DatabaseError> {
        let messages = self.messages.read().await;
        Ok(messages.iter().filter(|m| filter.matches(m)).count())
    }

    async fn set_read(&self, id: &str, read: bool) -> Result<bool, DatabaseError> {
        let mut messages = self.messages.write().await;
        match messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                message.is_read = read;
                debug!(id = id, is_read = read, "Read state updated");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool, DatabaseError> {
        let mut messages = self.messages.write().await;
        let before = messages.len();
        messages.retain(|m| m.id != id);
        Ok(messages.len() < before)
    }

    async fn delete_many(&self, ids: &[String]) -> Result<usize, DatabaseError> {
        let mut messages = self.messages.write().await;
        let before = messages.len();
        messages.retain(|m| !ids.contains(&m.id));
        let deleted = before - messages.len();
        info!(requested = ids.len(), deleted, "Bulk delete");
        Ok(deleted)
    }

    async fn retention_candidates(
        &self,
        predicate: &RetentionPredicate,
    ) -> Result<Vec<Message>, DatabaseError> {
        let messages = self.messages.read().await;
        let mut candidates: Vec<Message> = messages
            .iter()
            .filter(|m| predicate.matches(m))
            .cloned()
            .collect();
        candidates.sort_by(|a, b| newest_first(b, a));
        Ok(candidates)
    }

    async fn delete_retained(
        &self,
        predicate: &RetentionPredicate,
        ids: &[String],
    ) -> Result<usize, DatabaseError> {
        let mut messages = self.messages.write().await;
        let before = messages.len();
        messages.retain(|m| !(ids.contains(&m.id) && predicate.matches(m)));
        Ok(before - messages.len())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    use crate::inquiries::model::{MessageSource, MessageType};

    fn msg(n: usize) -> Message {
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        Message {
            id: format!("m{n:05}"),
            kind: if n % 2 == 0 {
                MessageType::Quote
            } else {
                MessageType::Contact
            },
            from_name: format!("Sender {n}"),
            from_email: format!("s{n}@example.com"),
            phone: None,
            company: None,
            service: None,
            subject: format!("Subject {n}"),
            body: format!("Body {n}"),
            project_location: None,
            timeline: None,
            budget: None,
            details: None,
            created_at: base + Duration::seconds(n as i64),
            is_read: false,
            has_attachments: false,
            conversation_id: format!("m{n:05}"),
            source: MessageSource::Form,
        }
    }

    #[tokio::test]
    async fn append_and_get() {
        let store = BoundedMemoryStore::new(10);
        store.append(&msg(1)).await.unwrap();
        let loaded = store.get("m00001").await.unwrap().unwrap();
        assert_eq!(loaded, msg(1));
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let store = BoundedMemoryStore::new(10);
        store.append(&msg(1)).await.unwrap();
        assert!(store.append(&msg(1)).await.is_err());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn evicts_oldest_beyond_capacity() {
        let store = BoundedMemoryStore::new(1000);
        for n in 0..1001 {
            store.append(&msg(n)).await.unwrap();
        }
        assert_eq!(store.len().await, 1000);
        assert!(store.get("m00000").await.unwrap().is_none());
        assert!(store.get("m00001").await.unwrap().is_some());
        assert!(store.get("m01000").await.unwrap().is_some());
    }

    #[test]
    fn zero_capacity_holds_one() {
        assert_eq!(BoundedMemoryStore::new(0).capacity(), 1);
        assert_eq!(BoundedMemoryStore::default().capacity(), DEFAULT_CAPACITY);
    }

    #[tokio::test]
    async fn list_is_newest_first_and_paged() {
        let store = BoundedMemoryStore::new(10);
        for n in [3, 1, 2] {
            store.append(&msg(n)).await.unwrap();
        }
        let all = store.list(&MessageFilter::default(), None).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m00003", "m00002", "m00001"]);

        let page = store
            .list(
                &MessageFilter::default(),
                Some(PageRequest {
                    limit: 1,
                    offset: 1,
                }),
            )
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, "m00002");
    }

    #[tokio::test]
    async fn filters_by_type_and_read_state() {
        let store = BoundedMemoryStore::new(10);
        for n in 0..4 {
            store.append(&msg(n)).await.unwrap();
        }
        store.set_read("m00000", true).await.unwrap();

        let quotes = MessageFilter {
            kind: Some(MessageType::Quote),
            ..Default::default()
        };
        assert_eq!(store.count(&quotes).await.unwrap(), 2);

        let unread_quotes = MessageFilter {
            kind: Some(MessageType::Quote),
            is_read: Some(false),
            ..Default::default()
        };
        let found = store.list(&unread_quotes, None).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "m00002");
    }

    #[tokio::test]
    async fn set_read_reports_missing() {
        let store = BoundedMemoryStore::new(10);
        store.append(&msg(1)).await.unwrap();
        assert!(store.set_read("m00001", true).await.unwrap());
        assert!(store.set_read("m00001", true).await.unwrap());
        assert!(!store.set_read("nope", true).await.unwrap());
        assert!(store.get("m00001").await.unwrap().unwrap().is_read);
    }

    #[tokio::test]
    async fn delete_single_and_bulk() {
        let store = BoundedMemoryStore::new(10);
        for n in 0..5 {
            store.append(&msg(n)).await.unwrap();
        }
        assert!(store.delete("m00000").await.unwrap());
        assert!(!store.delete("m00000").await.unwrap());

        let ids = vec!["m00001".to_string(), "m00002".to_string(), "ghost".to_string()];
        assert_eq!(store.delete_many(&ids).await.unwrap(), 2);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn retention_deletes_only_listed_matches() {
        let store = BoundedMemoryStore::new(10);
        for n in 0..4 {
            store.append(&msg(n)).await.unwrap();
        }
        let predicate = RetentionPredicate {
            cutoff: msg(2).created_at,
            kind: None,
            is_read: None,
        };
        let candidates = store.retention_candidates(&predicate).await.unwrap();
        let ids: Vec<String> = candidates.iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids, vec!["m00000".to_string(), "m00001".to_string()]);

        // m00003 is listed but does not match the predicate, so it survives.
        let mut requested = ids.clone();
        requested.push("m00003".into());
        assert_eq!(store.delete_retained(&predicate, &requested).await.unwrap(), 2);
        assert_eq!(store.len().await, 2);
        assert!(store.get("m00003").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn concurrent_appends_keep_every_entry() {
        let store = Arc::new(BoundedMemoryStore::new(1000));
        let mut handles = Vec::new();
        for worker in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    store.append(&msg(worker * 50 + i)).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.len().await, 400);
        let all = store.list(&MessageFilter::default(), None).await.unwrap();
        assert!(all.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[tokio::test]
    async fn concurrent_read_updates_do_not_interfere() {
        let store = Arc::new(BoundedMemoryStore::new(100));
        for n in 0..50 {
            store.append(&msg(n)).await.unwrap();
        }
        let handles: Vec<_> = (0..50)
            .map(|n| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.set_read(&format!("m{n:05}"), true).await })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().unwrap());
        }
        let unread = MessageFilter {
            is_read: Some(false),
            ..Default::default()
        };
        assert_eq!(store.count(&unread).await.unwrap(), 0);
    }
}
