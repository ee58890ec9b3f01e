//! Web form submissions.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

use crate::error::{FieldError, ValidationError};
use crate::inquiries::model::{MessageSource, MessageType};
use crate::pipeline::types::{CanonicalRecord, StructuredFields, ThreadHints, non_blank};

/// Recipient recorded for form submissions.
pub const FORM_RECIPIENT: &str = "website-form";

static EMAIL_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

/// JSON body of `POST /api/contact`. Every field is optional at the wire
/// level so validation can report all problems at once.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSubmission {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub service: Option<String>,
    pub message: Option<String>,
    pub project_location: Option<String>,
    pub timeline: Option<String>,
    pub budget: Option<String>,
    pub details: Option<String>,
    /// Explicit intent: `quote` or `contact`.
    pub origin: Option<String>,
    /// Continue an existing conversation.
    pub conversation_id: Option<String>,
}

impl FormSubmission {
    /// Check every rule and report all failing fields together.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = Vec::new();

        if non_blank(self.name.as_deref()).is_none() {
            errors.push(FieldError::new("name", "is required"));
        }
        match non_blank(self.email.as_deref()) {
            None => errors.push(FieldError::new("email", "is required")),
            Some(email) if !EMAIL_SHAPE.is_match(&email) => {
                errors.push(FieldError::new("email", "must look like local@domain"));
            }
            Some(_) => {}
        }
        if non_blank(self.message.as_deref()).is_none()
            && non_blank(self.details.as_deref()).is_none()
        {
            errors.push(FieldError::new("message", "message or details is required"));
        }
        if let Some(origin) = non_blank(self.origin.as_deref())
            && origin.parse::<MessageType>().is_err()
        {
            errors.push(FieldError::new("origin", "must be quote or contact"));
        }

        ValidationError::check(errors)
    }

    /// Validate and convert into a canonical record.
    pub fn into_record(self, received_at: DateTime<Utc>) -> Result<CanonicalRecord, ValidationError> {
        self.validate()?;

        let origin = non_blank(self.origin.as_deref()).and_then(|o| o.parse().ok());
        let message = non_blank(self.message.as_deref());
        let details = non_blank(self.details.as_deref());
        let text_body = [message.as_deref(), details.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(CanonicalRecord {
            source: MessageSource::Form,
            from_address: non_blank(self.email.as_deref()).unwrap_or_default(),
            from_name: non_blank(self.name.as_deref()),
            to_address: FORM_RECIPIENT.to_string(),
            subject: String::new(),
            text_body,
            html_body: None,
            received_at,
            origin,
            structured: Some(StructuredFields {
                phone: non_blank(self.phone.as_deref()),
                company: non_blank(self.company.as_deref()),
                service: non_blank(self.service.as_deref()),
                project_location: non_blank(self.project_location.as_deref()),
                timeline: non_blank(self.timeline.as_deref()),
                budget: non_blank(self.budget.as_deref()),
                message,
                details,
            }),
            thread: ThreadHints {
                conversation_id: non_blank(self.conversation_id.as_deref()),
                ..Default::default()
            },
            has_attachments: false,
        })
    }
}
