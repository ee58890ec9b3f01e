//! Retention: delete messages older than a cutoff, optionally narrowed by
//! type and read state.
//!
//! A run is planned once (cutoff fixed, candidates listed) and then executed
//! against exactly that plan. Execution re-checks the predicate per id, so a
//! message that changed between planning and execution is left alone.
//!
//! A `days` cutoff is counted back from the start of the current UTC day, so
//! separate invocations on the same day select the same set. An explicit
//! `before` instant pins the cutoff across days.

use chrono::{DateTime, NaiveTime, TimeDelta, Utc};
use comfy_table::{Cell, Table};
use tracing::info;

use crate::error::{DatabaseError, FieldError, ValidationError};
use crate::inquiries::model::{Message, MessageType};
use crate::store::{MessageStore, RetentionPredicate};

pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Operator-chosen retention options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionOptions {
    pub days: u32,
    /// Explicit cutoff; overrides `days` when set.
    pub before: Option<DateTime<Utc>>,
    pub kind: Option<MessageType>,
    pub read_only: bool,
    pub unread_only: bool,
}

impl Default for RetentionOptions {
    fn default() -> Self {
        Self {
            days: DEFAULT_RETENTION_DAYS,
            before: None,
            kind: None,
            read_only: false,
            unread_only: false,
        }
    }
}

impl RetentionOptions {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = Vec::new();
        if self.read_only && self.unread_only {
            errors.push(FieldError::new(
                "read-only",
                "--read-only and --unread-only are mutually exclusive",
            ));
        }
        ValidationError::check(errors)
    }

    /// Cutoff: `before` if given, else `days` before the start of `now`'s UTC day.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, ValidationError> {
        if let Some(before) = self.before {
            return Ok(before);
        }
        let day_start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
        TimeDelta::try_days(i64::from(self.days))
            .and_then(|span| day_start.checked_sub_signed(span))
            .ok_or_else(|| {
                ValidationError::single("days", format!("{} days reaches past the earliest date", self.days))
            })
    }

    /// Predicate with the cutoff fixed by [`Self::cutoff`].
    pub fn predicate(&self, now: DateTime<Utc>) -> Result<RetentionPredicate, ValidationError> {
        self.validate()?;
        let cutoff = self.cutoff(now)?;
        let is_read = match (self.read_only, self.unread_only) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        Ok(RetentionPredicate {
            cutoff,
            kind: self.kind,
            is_read,
        })
    }
}

/// A computed retention run: the fixed predicate and its candidates.
#[derive(Debug, Clone)]
pub struct RetentionPlan {
    pub predicate: RetentionPredicate,
    /// Oldest first.
    pub candidates: Vec<Message>,
}

impl RetentionPlan {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.candidates.iter().map(|m| m.id.clone()).collect()
    }
}

/// List what a run with this predicate would delete. Mutates nothing.
pub async fn plan(
    store: &dyn MessageStore,
    predicate: RetentionPredicate,
) -> Result<RetentionPlan, DatabaseError> {
    let candidates = store.retention_candidates(&predicate).await?;
    info!(
        cutoff = %predicate.cutoff,
        kind = ?predicate.kind,
        is_read = ?predicate.is_read,
        candidates = candidates.len(),
        "Retention plan computed"
    );
    Ok(RetentionPlan {
        predicate,
        candidates,
    })
}

/// Delete the planned candidates that still match. Returns the count.
pub async fn execute(store: &dyn MessageStore, plan: &RetentionPlan) -> Result<usize, DatabaseError> {
    if plan.is_empty() {
        return Ok(0);
    }
    let deleted = store.delete_retained(&plan.predicate, &plan.ids()).await?;
    info!(
        planned = plan.candidates.len(),
        deleted,
        "Retention run complete"
    );
    Ok(deleted)
}

/// Candidate listing for operator review.
pub fn candidate_table(candidates: &[Message]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("ID"),
        Cell::new("Type"),
        Cell::new("Read"),
        Cell::new("Created"),
        Cell::new("From"),
        Cell::new("Subject"),
    ]);
    for message in candidates {
        table.add_row(vec![
            Cell::new(&message.id),
            Cell::new(message.kind.as_str()),
            Cell::new(if message.is_read { "yes" } else { "no" }),
            Cell::new(message.created_at.format("%Y-%m-%d %H:%M").to_string()),
            Cell::new(&message.from_email),
            Cell::new(truncate(&message.subject, 60)),
        ]);
    }
    table
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}
