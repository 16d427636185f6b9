//! Read side of stored conversations
//!
//! Needs only the design store, so listing and deleting work without
//! model credentials.

use designstore::{ArtifactRecord, ConversationRecord, DesignIterationRecord, MessageRecord};
use tracing::debug;

use super::locks::TurnLocks;
use super::service::ServiceError;
use crate::config::Config;
use crate::domain::TurnIdentity;
use crate::state::StateManager;

/// A stored message with its artifacts
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub message: MessageRecord,
    pub artifacts: Vec<ArtifactRecord>,
}

/// Owner-scoped access to conversations, messages and designs
#[derive(Clone)]
pub struct Archive {
    state: StateManager,
    locks: TurnLocks,
}

impl Archive {
    pub fn new(state: StateManager) -> Self {
        Self {
            state,
            locks: TurnLocks::new(),
        }
    }

    /// Spawn the state actor over the configured store directory
    pub fn open(config: &Config) -> eyre::Result<Self> {
        debug!(store_dir = %config.storage.store_dir, "Archive::open: called");
        Ok(Self::new(StateManager::spawn(&config.storage.store_dir)?))
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    pub(crate) fn locks(&self) -> &TurnLocks {
        &self.locks
    }

    /// Fetch a conversation owned by `user_id`
    pub async fn conversation(&self, user_id: &str, conversation_id: &str) -> Result<ConversationRecord, ServiceError> {
        self.state
            .get_conversation(conversation_id, user_id)
            .await?
            .ok_or_else(|| ServiceError::ConversationNotFound(conversation_id.to_string()))
    }

    pub async fn conversations(&self, user_id: &str, limit: usize) -> Result<Vec<ConversationRecord>, ServiceError> {
        debug!(%user_id, limit, "Archive::conversations: called");
        Ok(self.state.list_conversations(user_id, limit, 0).await?)
    }

    /// Messages in order, each with its artifacts
    pub async fn history(&self, user_id: &str, conversation_id: &str) -> Result<Vec<HistoryEntry>, ServiceError> {
        debug!(%user_id, %conversation_id, "Archive::history: called");
        self.conversation(user_id, conversation_id).await?;

        let mut entries = Vec::new();
        for message in self.state.list_messages(conversation_id).await? {
            let artifacts = self.state.list_artifacts(&message.id).await?;
            entries.push(HistoryEntry { message, artifacts });
        }
        Ok(entries)
    }

    /// Design iterations ordered by version
    pub async fn designs(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<Vec<DesignIterationRecord>, ServiceError> {
        debug!(%user_id, %conversation_id, "Archive::designs: called");
        self.conversation(user_id, conversation_id).await?;
        Ok(self.state.list_iterations(conversation_id).await?)
    }

    /// Highest-version design, if one was ever produced
    pub async fn latest_design(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<Option<DesignIterationRecord>, ServiceError> {
        debug!(%user_id, %conversation_id, "Archive::latest_design: called");
        self.conversation(user_id, conversation_id).await?;
        Ok(self.state.latest_iteration(conversation_id).await?)
    }

    /// Delete a conversation and its cached turn state
    pub async fn delete(&self, user_id: &str, conversation_id: &str) -> Result<bool, ServiceError> {
        debug!(%user_id, %conversation_id, "Archive::delete: called");
        let turn = self.locks.acquire(user_id, conversation_id).await;
        let deleted = self.state.delete_conversation(conversation_id, user_id).await?;
        if deleted {
            self.state
                .delete_turn_state(&TurnIdentity::new(user_id, conversation_id))
                .await?;
        }
        drop(turn);
        self.locks.prune().await;
        Ok(deleted)
    }

    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        Ok(self.state.shutdown().await?)
    }
}
