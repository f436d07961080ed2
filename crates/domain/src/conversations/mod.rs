/// Conversation aggregate
pub mod aggregate;

/// Commands
pub mod commands;

/// Events
pub mod events;

/// Per-sender state storage
pub mod store;

/// DynamoDB-backed store
pub mod dynamo;

/// User-facing message texts
pub mod replies;

/// Inbound message handling
pub mod engine;

pub use aggregate::{Conversation, ConversationStatus, Services, AGGREGATE_TYPE};
pub use commands::Command;
pub use engine::{ConversationEngine, InboundMessage, Reply};
pub use events::Event;
pub use store::{ConversationStore, InMemoryConversationStore};
