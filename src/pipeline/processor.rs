//! Intake processor: channel record → classification → thread key → store.
//!
//! Each item is one atomic unit. The message is fully built (classified and
//! thread-resolved) in memory, then appended in a single store call, so a
//! failure at any step records nothing.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::channels::form::FormSubmission;
use crate::channels::webhook;
use crate::error::IngestError;
use crate::inquiries::model::{Message, MessageType};
use crate::pipeline::classifier::Classifier;
use crate::pipeline::threading::resolve_key;
use crate::pipeline::types::{CanonicalRecord, non_blank};
use crate::store::MessageStore;

/// Identifiers of a newly stored message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Accepted {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub conversation_id: String,
}

/// Outcome of one webhook item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemResult {
    Processed {
        index: usize,
        #[serde(flatten)]
        accepted: Accepted,
    },
    Failed {
        index: usize,
        error: String,
    },
}

/// Summary of a webhook delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub received: usize,
    pub processed: usize,
    pub failed: usize,
    pub results: Vec<ItemResult>,
}

/// Runs both ingestion channels through the shared pipeline.
pub struct IntakeProcessor {
    classifier: Classifier,
    store: Arc<dyn MessageStore>,
}

impl IntakeProcessor {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self {
            classifier: Classifier::new(),
            store,
        }
    }

    /// Build the stored message for a record. Pure apart from id generation.
    pub fn build_message(&self, record: &CanonicalRecord) -> Message {
        let id = Uuid::new_v4().to_string();
        let classification = self.classifier.classify(record);
        let fields = classification.fields;
        let from_name = record
            .from_name
            .clone()
            .unwrap_or_else(|| record.from_address.clone());

        let subject = match non_blank(Some(record.subject.as_str())) {
            Some(subject) => subject,
            None => default_subject(classification.kind, &from_name),
        };
        let details = record
            .structured
            .as_ref()
            .and_then(|s| non_blank(s.details.as_deref()));

        Message {
            conversation_id: resolve_key(&record.thread, &id),
            id,
            kind: classification.kind,
            from_name,
            from_email: record.from_address.clone(),
            phone: fields.phone,
            company: fields.company,
            service: fields.service,
            subject,
            body: record.text_body.clone(),
            project_location: fields.project_location,
            timeline: fields.timeline,
            budget: fields.budget,
            details,
            created_at: record.received_at,
            is_read: false,
            has_attachments: record.has_attachments,
            source: record.source,
        }
    }

    /// Classify, thread-resolve, and append one record.
    pub async fn ingest(&self, record: &CanonicalRecord) -> Result<Accepted, IngestError> {
        let message = self.build_message(record);
        self.store.append(&message).await?;

        info!(
            id = %message.id,
            kind = %message.kind,
            source = message.source.as_str(),
            conversation_id = %message.conversation_id,
            "Inquiry stored"
        );

        Ok(Accepted {
            id: message.id,
            kind: message.kind,
            conversation_id: message.conversation_id,
        })
    }

    /// Validate and ingest a form submission.
    pub async fn ingest_form(&self, form: FormSubmission) -> Result<Accepted, IngestError> {
        let record = form.into_record(Utc::now()).inspect_err(|e| {
            warn!(error = %e, "Form submission rejected");
        })?;
        self.ingest(&record).await
    }

    /// Ingest a webhook payload (one object or an array), isolating failures.
    ///
    /// Unparseable items are reported and skipped. A store error aborts the
    /// delivery; items stored before it remain stored.
    pub async fn ingest_webhook(&self, payload: &Value) -> Result<BatchReport, IngestError> {
        let parsed = webhook::parse_payload(payload);
        let mut report = BatchReport {
            received: parsed.len(),
            ..Default::default()
        };

        for (index, item) in parsed.into_iter().enumerate() {
            let outcome = match item {
                Ok(record) => self.ingest(&record).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(accepted) => {
                    report.processed += 1;
                    report.results.push(ItemResult::Processed { index, accepted });
                }
                Err(IngestError::Store(e)) => return Err(IngestError::Store(e)),
                Err(e) => {
                    warn!(index, error = %e, "Skipping webhook item");
                    report.failed += 1;
                    report.results.push(ItemResult::Failed {
                        index,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            received = report.received,
            processed = report.processed,
            failed = report.failed,
            "Webhook delivery processed"
        );
        Ok(report)
    }
}

fn default_subject(kind: MessageType, from_name: &str) -> String {
    match kind {
        MessageType::Quote => format!("Quote request from {from_name}"),
        MessageType::Contact => format!("Message from {from_name}"),
    }
}
