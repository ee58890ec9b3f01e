//! Persistence layer: one `MessageStore` trait, two backings.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use memory::BoundedMemoryStore;
pub use traits::{MessageFilter, MessageStore, PageRequest, RetentionPredicate};
