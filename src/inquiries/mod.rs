//! Inquiry records, statistics, and the admin surface.

pub mod model;
pub mod query;
pub mod routes;
pub mod stats;

pub use model::{Conversation, ConversationStatus, Message, MessageSource, MessageType, Priority};
pub use query::AdminService;
pub use routes::{AppState, intake_routes};
