//! Inquiry classifier: deterministic quote/contact decision plus field extraction.
//!
//! Two rule sets, chosen by what evidence the channel provides:
//! - `FormRuleSet` when structured fields are available (web form)
//! - `EmailRuleSet` when only free text is available (inbound email)
//!
//! The rule sets deliberately differ. An explicit `origin` on the record
//! overrides both.

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::inquiries::model::MessageType;
use crate::pipeline::types::{CanonicalRecord, StructuredFields, non_blank};

/// Details/message length above which a form submission counts as a quote.
pub const QUOTE_LENGTH_THRESHOLD: usize = 200;

/// Structured fields pulled from a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedFields {
    pub phone: Option<String>,
    pub company: Option<String>,
    pub service: Option<String>,
    pub project_location: Option<String>,
    pub timeline: Option<String>,
    pub budget: Option<String>,
}

/// Which rule produced the classification. Logged, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Decision {
    ExplicitOrigin,
    FormSignals {
        strong_field: bool,
        length: bool,
        keyword: bool,
    },
    EmailKeyword {
        matched: bool,
    },
}

/// Classifier output, merged into the message at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub kind: MessageType,
    pub fields: ExtractedFields,
    pub decision: Decision,
}

// ── Rule sets ───────────────────────────────────────────────────────

/// Which rule set applies to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSet {
    Form,
    Email,
}

impl RuleSet {
    /// Form rules when structured fields are present, email rules otherwise.
    pub fn for_record(record: &CanonicalRecord) -> Self {
        if record.structured.is_some() {
            Self::Form
        } else {
            Self::Email
        }
    }
}

/// Rules for channels that carry structured fields.
#[derive(Debug, Clone)]
pub struct FormRuleSet {
    keywords: Regex,
    length_threshold: usize,
}

impl FormRuleSet {
    pub fn new() -> Self {
        Self {
            keywords: Regex::new(
                r"(?i)\b(quote|quotation|pricing|price|estimate|budget|timeline|proposal|bid|renovation|remodel|construction|installation|fit-out)\b",
            )
            .expect("form keyword pattern is valid"),
            length_threshold: QUOTE_LENGTH_THRESHOLD,
        }
    }

    fn evaluate(&self, record: &CanonicalRecord, structured: &StructuredFields) -> Decision {
        let strong_field = [&structured.company, &structured.timeline, &structured.budget]
            .iter()
            .any(|v| non_blank(v.as_deref()).is_some());

        let long_text = non_blank(structured.details.as_deref())
            .or_else(|| non_blank(structured.message.as_deref()))
            .unwrap_or_default();
        let length = long_text.chars().count() > self.length_threshold;

        let keyword =
            self.keywords.is_match(&record.subject) || self.keywords.is_match(&record.text_body);

        Decision::FormSignals {
            strong_field,
            length,
            keyword,
        }
    }
}

impl Default for FormRuleSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Looser rules for channels with free text only.
#[derive(Debug, Clone)]
pub struct EmailRuleSet {
    keywords: Regex,
}

impl EmailRuleSet {
    pub fn new() -> Self {
        Self {
            keywords: Regex::new(r"(?i)(quote|pricing|estimate)")
                .expect("email keyword pattern is valid"),
        }
    }

    fn evaluate(&self, record: &CanonicalRecord) -> Decision {
        Decision::EmailKeyword {
            matched: self.keywords.is_match(&record.subject)
                || self.keywords.is_match(&record.text_body),
        }
    }
}

impl Default for EmailRuleSet {
    fn default() -> Self {
        Self::new()
    }
}

// ── Label scanning ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum FieldName {
    Phone,
    Company,
    Service,
    ProjectLocation,
    Timeline,
    Budget,
}

/// Matches `Label: value` on its own line.
#[derive(Debug, Clone)]
struct LabelPattern {
    field: FieldName,
    regex: Regex,
}

impl LabelPattern {
    fn new(field: FieldName, labels: &str) -> Self {
        let pattern = format!(r"(?im)^[ \t]*(?:{labels})[ \t]*:[ \t]*([^\r\n]*?)[ \t]*\r?$");
        Self {
            field,
            regex: Regex::new(&pattern).expect("label pattern is valid"),
        }
    }

    fn scan(&self, text: &str) -> Option<String> {
        self.regex
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .find(|v| !v.is_empty())
            .map(String::from)
    }
}

// ── Classifier ──────────────────────────────────────────────────────

/// Deterministic classifier. Pure: same record in, same result out.
pub struct Classifier {
    form: FormRuleSet,
    email: EmailRuleSet,
    labels: Vec<LabelPattern>,
}

impl Classifier {
    pub fn new() -> Self {
        let labels = vec![
            LabelPattern::new(FieldName::Phone, "phone|tel|telephone"),
            LabelPattern::new(FieldName::Company, "company|organization|organisation"),
            LabelPattern::new(FieldName::Service, "service"),
            LabelPattern::new(FieldName::ProjectLocation, r"project[ \t]+location|location"),
            LabelPattern::new(FieldName::Timeline, "timeline"),
            LabelPattern::new(FieldName::Budget, "budget"),
        ];
        Self {
            form: FormRuleSet::new(),
            email: EmailRuleSet::new(),
            labels,
        }
    }

    /// Classify a record and extract its structured fields.
    pub fn classify(&self, record: &CanonicalRecord) -> Classification {
        let fields = self.extract_fields(record);

        let (kind, decision) = if let Some(origin) = record.origin {
            (origin, Decision::ExplicitOrigin)
        } else {
            let decision = match (RuleSet::for_record(record), &record.structured) {
                (RuleSet::Form, Some(structured)) => self.form.evaluate(record, structured),
                _ => self.email.evaluate(record),
            };
            (kind_for(&decision), decision)
        };

        debug!(
            from = %record.from_address,
            source = record.source.as_str(),
            kind = %kind,
            decision = ?decision,
            "Record classified"
        );

        Classification {
            kind,
            fields,
            decision,
        }
    }

    /// Structured values win; missing ones fall back to `Label: value` lines.
    pub fn extract_fields(&self, record: &CanonicalRecord) -> ExtractedFields {
        let structured = record.structured.clone().unwrap_or_default();
        let text = free_text(record);
        let mut fields = ExtractedFields {
            phone: non_blank(structured.phone.as_deref()),
            company: non_blank(structured.company.as_deref()),
            service: non_blank(structured.service.as_deref()),
            project_location: non_blank(structured.project_location.as_deref()),
            timeline: non_blank(structured.timeline.as_deref()),
            budget: non_blank(structured.budget.as_deref()),
        };

        for label in &self.labels {
            let slot = match label.field {
                FieldName::Phone => &mut fields.phone,
                FieldName::Company => &mut fields.company,
                FieldName::Service => &mut fields.service,
                FieldName::ProjectLocation => &mut fields.project_location,
                FieldName::Timeline => &mut fields.timeline,
                FieldName::Budget => &mut fields.budget,
            };
            if slot.is_none() {
                *slot = label.scan(&text);
            }
        }

        fields
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

fn kind_for(decision: &Decision) -> MessageType {
    let is_quote = match decision {
        Decision::ExplicitOrigin => false,
        Decision::FormSignals {
            strong_field,
            length,
            keyword,
        } => *strong_field || *length || *keyword,
        Decision::EmailKeyword { matched } => *matched,
    };
    if is_quote {
        MessageType::Quote
    } else {
        MessageType::Contact
    }
}

/// All free text a record carries, for label scanning.
fn free_text(record: &CanonicalRecord) -> String {
    let mut parts = vec![record.text_body.as_str()];
    if let Some(structured) = &record.structured {
        for extra in [&structured.message, &structured.details].into_iter().flatten() {
            if !record.text_body.contains(extra.as_str()) {
                parts.push(extra);
            }
        }
    }
    parts.join("\n")
}
