//! Ingestion channels: web form and inbound-email webhook.

pub mod email_types;
pub mod form;
pub mod webhook;

pub use form::FormSubmission;
pub use webhook::parse_payload;
