//! Inquiry Intake: classification, threading, and triage for business inquiries.

pub mod channels;
pub mod config;
pub mod error;
pub mod inquiries;
pub mod pipeline;
pub mod retention;
pub mod store;
