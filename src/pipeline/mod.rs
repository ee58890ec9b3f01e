//! Intake pipeline.
//!
//! Every inbound item from any channel flows through:
//! 1. channel adapter → `CanonicalRecord`
//! 2. `Classifier::classify()` → quote/contact plus extracted fields
//! 3. `resolve_key()` → conversation id
//! 4. `MessageStore::append()`

pub mod classifier;
pub mod processor;
pub mod threading;
pub mod types;

pub use classifier::Classifier;
pub use processor::{Accepted, BatchReport, IntakeProcessor, ItemResult};
pub use threading::ThreadResolver;
pub use types::CanonicalRecord;
