//! State manager messages
//!
//! Commands and responses for the actor pattern.

use designstore::{
    ArtifactRecord, ConversationRecord, DesignIterationRecord, MessageRecord, NewArtifact, NewIteration,
};
use thiserror::Error;
use tokio::sync::oneshot;

/// Errors from state operations
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Channel error")]
    ChannelError,
}

/// Response from state operations
pub type StateResponse<T> = Result<T, StateError>;

/// Commands sent to the StateManager actor
#[derive(Debug)]
pub enum StateCommand {
    // Conversation operations
    CreateConversation {
        user_id: String,
        title: String,
        reply: oneshot::Sender<StateResponse<ConversationRecord>>,
    },
    GetConversation {
        id: String,
        user_id: String,
        reply: oneshot::Sender<StateResponse<Option<ConversationRecord>>>,
    },
    ListConversations {
        user_id: String,
        limit: usize,
        offset: usize,
        reply: oneshot::Sender<StateResponse<Vec<ConversationRecord>>>,
    },
    UpdateTitle {
        id: String,
        title: String,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    DeleteConversation {
        id: String,
        user_id: String,
        reply: oneshot::Sender<StateResponse<bool>>,
    },

    // Message operations
    AddMessage {
        conversation_id: String,
        role: String,
        content: String,
        reply: oneshot::Sender<StateResponse<MessageRecord>>,
    },
    ListMessages {
        conversation_id: String,
        reply: oneshot::Sender<StateResponse<Vec<MessageRecord>>>,
    },
    AddArtifact {
        message_id: String,
        artifact: NewArtifact,
        reply: oneshot::Sender<StateResponse<ArtifactRecord>>,
    },
    ListArtifacts {
        message_id: String,
        reply: oneshot::Sender<StateResponse<Vec<ArtifactRecord>>>,
    },

    // Design iterations
    SaveIteration {
        conversation_id: String,
        iteration: NewIteration,
        reply: oneshot::Sender<StateResponse<DesignIterationRecord>>,
    },
    ListIterations {
        conversation_id: String,
        reply: oneshot::Sender<StateResponse<Vec<DesignIterationRecord>>>,
    },
    LatestIteration {
        conversation_id: String,
        reply: oneshot::Sender<StateResponse<Option<DesignIterationRecord>>>,
    },

    // Turn state blobs
    PutState {
        key: String,
        value: String,
        expires_at: Option<i64>,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    GetState {
        key: String,
        reply: oneshot::Sender<StateResponse<Option<String>>>,
    },
    DeleteState {
        key: String,
        reply: oneshot::Sender<StateResponse<bool>>,
    },
    PurgeExpired {
        reply: oneshot::Sender<StateResponse<usize>>,
    },

    // Shutdown
    Shutdown,
}
