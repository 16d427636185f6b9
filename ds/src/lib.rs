//! DesignStore - SQLite persistence for design conversations
//!
//! Stores everything a conversational design assistant needs to survive a
//! restart: conversations owned by a user, their messages, the artifacts
//! attached to assistant messages, numbered design iterations, and an
//! expiring key/value table for opaque per-conversation turn state.
//!
//! The store is generic: parameters and metadata are JSON values and images
//! are byte blobs. It has no knowledge of what is being designed.
//!
//! # Architecture
//!
//! ```text
//! {store_dir}/
//! └── designstore.db    # conversations, messages, artifacts,
//!                       # design_iterations, turn_state
//! ```
//!
//! # Example
//!
//! ```ignore
//! use designstore::Store;
//!
//! let mut store = Store::open(".designstore")?;
//! let conv = store.create_conversation("user-1", "New kitchen")?;
//! store.add_message(&conv.id, "user", "I want an L-shaped kitchen")?;
//! ```

mod records;
mod store;

pub use records::{ArtifactRecord, ConversationRecord, DesignIterationRecord, MessageRecord, NewArtifact, NewIteration};
pub use store::Store;

/// Database file name inside the store directory
pub const DB_FILE: &str = "designstore.db";

/// Current time as unix milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
