//! Chat session layer
//!
//! Persistence and per-conversation serialization around the workflow.

mod archive;
mod locks;
mod service;

pub use archive::{Archive, HistoryEntry};
pub use locks::TurnLocks;
pub use service::{ChatReply, ChatService, NEW_CONVERSATION_TITLE, ServiceError, conversation_title};
