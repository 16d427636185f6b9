//! StateManager - actor that owns the design store
//!
//! Processes commands via channels for thread-safe access to persistent state.

use std::path::Path;
use std::time::Duration;

use designstore::{
    ArtifactRecord, ConversationRecord, DesignIterationRecord, MessageRecord, NewArtifact, NewIteration, Store,
    now_ms,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::messages::{StateCommand, StateError, StateResponse};
use crate::domain::{ConversationState, TurnIdentity};

/// Handle to send commands to the StateManager
#[derive(Clone)]
pub struct StateManager {
    tx: mpsc::Sender<StateCommand>,
}

impl StateManager {
    /// Spawn a new StateManager actor over a store in `store_dir`
    pub fn spawn(store_dir: impl AsRef<Path>) -> eyre::Result<Self> {
        debug!(store_dir = %store_dir.as_ref().display(), "spawn: called");
        let mut store = Store::open(store_dir.as_ref())?;

        let purged = store.purge_expired_state()?;
        info!(purged, "Purged expired turn state");

        Ok(Self::start(store))
    }

    /// Spawn an actor over an in-memory store
    pub fn spawn_in_memory() -> eyre::Result<Self> {
        debug!("spawn_in_memory: called");
        Ok(Self::start(Store::open_in_memory()?))
    }

    fn start(store: Store) -> Self {
        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(actor_loop(store, rx));
        info!("StateManager spawned");
        Self { tx }
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<StateResponse<T>>) -> StateCommand) -> StateResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(command(reply_tx))
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    // === Conversations ===

    pub async fn create_conversation(&self, user_id: &str, title: &str) -> StateResponse<ConversationRecord> {
        debug!(%user_id, %title, "create_conversation: called");
        self.request(|reply| StateCommand::CreateConversation {
            user_id: user_id.to_string(),
            title: title.to_string(),
            reply,
        })
        .await
    }

    /// Get a conversation owned by `user_id`
    pub async fn get_conversation(&self, id: &str, user_id: &str) -> StateResponse<Option<ConversationRecord>> {
        debug!(%id, %user_id, "get_conversation: called");
        self.request(|reply| StateCommand::GetConversation {
            id: id.to_string(),
            user_id: user_id.to_string(),
            reply,
        })
        .await
    }

    /// Most recently updated first
    pub async fn list_conversations(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> StateResponse<Vec<ConversationRecord>> {
        debug!(%user_id, limit, offset, "list_conversations: called");
        self.request(|reply| StateCommand::ListConversations {
            user_id: user_id.to_string(),
            limit,
            offset,
            reply,
        })
        .await
    }

    pub async fn update_title(&self, id: &str, title: &str) -> StateResponse<()> {
        debug!(%id, %title, "update_title: called");
        self.request(|reply| StateCommand::UpdateTitle {
            id: id.to_string(),
            title: title.to_string(),
            reply,
        })
        .await
    }

    /// Delete a conversation and everything recorded under it
    pub async fn delete_conversation(&self, id: &str, user_id: &str) -> StateResponse<bool> {
        debug!(%id, %user_id, "delete_conversation: called");
        self.request(|reply| StateCommand::DeleteConversation {
            id: id.to_string(),
            user_id: user_id.to_string(),
            reply,
        })
        .await
    }

    // === Messages and artifacts ===

    pub async fn add_message(&self, conversation_id: &str, role: &str, content: &str) -> StateResponse<MessageRecord> {
        debug!(%conversation_id, %role, content_len = content.len(), "add_message: called");
        self.request(|reply| StateCommand::AddMessage {
            conversation_id: conversation_id.to_string(),
            role: role.to_string(),
            content: content.to_string(),
            reply,
        })
        .await
    }

    pub async fn list_messages(&self, conversation_id: &str) -> StateResponse<Vec<MessageRecord>> {
        debug!(%conversation_id, "list_messages: called");
        self.request(|reply| StateCommand::ListMessages {
            conversation_id: conversation_id.to_string(),
            reply,
        })
        .await
    }

    pub async fn add_artifact(&self, message_id: &str, artifact: NewArtifact) -> StateResponse<ArtifactRecord> {
        debug!(%message_id, artifact_type = %artifact.artifact_type, "add_artifact: called");
        self.request(|reply| StateCommand::AddArtifact {
            message_id: message_id.to_string(),
            artifact,
            reply,
        })
        .await
    }

    pub async fn list_artifacts(&self, message_id: &str) -> StateResponse<Vec<ArtifactRecord>> {
        debug!(%message_id, "list_artifacts: called");
        self.request(|reply| StateCommand::ListArtifacts {
            message_id: message_id.to_string(),
            reply,
        })
        .await
    }

    // === Design iterations ===

    pub async fn save_iteration(
        &self,
        conversation_id: &str,
        iteration: NewIteration,
    ) -> StateResponse<DesignIterationRecord> {
        debug!(%conversation_id, version = ?iteration.version, "save_iteration: called");
        self.request(|reply| StateCommand::SaveIteration {
            conversation_id: conversation_id.to_string(),
            iteration,
            reply,
        })
        .await
    }

    /// Iterations ordered by version
    pub async fn list_iterations(&self, conversation_id: &str) -> StateResponse<Vec<DesignIterationRecord>> {
        debug!(%conversation_id, "list_iterations: called");
        self.request(|reply| StateCommand::ListIterations {
            conversation_id: conversation_id.to_string(),
            reply,
        })
        .await
    }

    /// Highest-version iteration, if any
    pub async fn latest_iteration(&self, conversation_id: &str) -> StateResponse<Option<DesignIterationRecord>> {
        debug!(%conversation_id, "latest_iteration: called");
        self.request(|reply| StateCommand::LatestIteration {
            conversation_id: conversation_id.to_string(),
            reply,
        })
        .await
    }

    // === Turn state ===

    /// Cached workflow state for a conversation
    ///
    /// Missing, expired and undecodable entries all read as `None`.
    pub async fn load_turn_state(&self, identity: &TurnIdentity) -> StateResponse<Option<ConversationState>> {
        debug!(%identity, "load_turn_state: called");
        let raw = self
            .request(|reply| StateCommand::GetState {
                key: identity.state_key(),
                reply,
            })
            .await?;

        let Some(raw) = raw else {
            debug!(%identity, "load_turn_state: no cached state");
            return Ok(None);
        };

        match serde_json::from_str::<ConversationState>(&raw) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                warn!(%identity, error = %e, "Discarding unreadable turn state");
                Ok(None)
            }
        }
    }

    /// Cache workflow state, expiring after `ttl`
    pub async fn save_turn_state(&self, state: &ConversationState, ttl: Duration) -> StateResponse<()> {
        let identity = state.identity();
        debug!(%identity, version = state.design_version, "save_turn_state: called");
        let value = serde_json::to_string(state).map_err(|e| StateError::StoreError(e.to_string()))?;
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = now_ms().saturating_add(ttl_ms);

        self.request(|reply| StateCommand::PutState {
            key: identity.state_key(),
            value,
            expires_at: Some(expires_at),
            reply,
        })
        .await
    }

    pub async fn delete_turn_state(&self, identity: &TurnIdentity) -> StateResponse<bool> {
        debug!(%identity, "delete_turn_state: called");
        self.request(|reply| StateCommand::DeleteState {
            key: identity.state_key(),
            reply,
        })
        .await
    }

    pub async fn purge_expired(&self) -> StateResponse<usize> {
        debug!("purge_expired: called");
        self.request(|reply| StateCommand::PurgeExpired { reply }).await
    }

    /// Shutdown the StateManager
    pub async fn shutdown(&self) -> Result<(), StateError> {
        debug!("shutdown: called");
        self.tx
            .send(StateCommand::Shutdown)
            .await
            .map_err(|_| StateError::ChannelError)
    }
}

fn store_err(e: eyre::Report) -> StateError {
    StateError::StoreError(format!("{:#}", e))
}

/// The actor loop that processes commands
async fn actor_loop(mut store: Store, mut rx: mpsc::Receiver<StateCommand>) {
    debug!("StateManager actor started");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            StateCommand::CreateConversation { user_id, title, reply } => {
                debug!(%user_id, "actor_loop: CreateConversation command");
                let _ = reply.send(store.create_conversation(&user_id, &title).map_err(store_err));
            }

            StateCommand::GetConversation { id, user_id, reply } => {
                debug!(%id, "actor_loop: GetConversation command");
                let _ = reply.send(store.get_conversation(&id, &user_id).map_err(store_err));
            }

            StateCommand::ListConversations {
                user_id,
                limit,
                offset,
                reply,
            } => {
                debug!(%user_id, "actor_loop: ListConversations command");
                let _ = reply.send(store.list_conversations(&user_id, limit, offset).map_err(store_err));
            }

            StateCommand::UpdateTitle { id, title, reply } => {
                debug!(%id, "actor_loop: UpdateTitle command");
                let result = match store.update_conversation_title(&id, &title) {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(StateError::NotFound(id)),
                    Err(e) => Err(store_err(e)),
                };
                let _ = reply.send(result);
            }

            StateCommand::DeleteConversation { id, user_id, reply } => {
                debug!(%id, "actor_loop: DeleteConversation command");
                let _ = reply.send(store.delete_conversation(&id, &user_id).map_err(store_err));
            }

            StateCommand::AddMessage {
                conversation_id,
                role,
                content,
                reply,
            } => {
                debug!(%conversation_id, %role, "actor_loop: AddMessage command");
                let _ = reply.send(store.add_message(&conversation_id, &role, &content).map_err(store_err));
            }

            StateCommand::ListMessages { conversation_id, reply } => {
                debug!(%conversation_id, "actor_loop: ListMessages command");
                let _ = reply.send(store.list_messages(&conversation_id).map_err(store_err));
            }

            StateCommand::AddArtifact {
                message_id,
                artifact,
                reply,
            } => {
                debug!(%message_id, "actor_loop: AddArtifact command");
                let _ = reply.send(store.add_artifact(&message_id, artifact).map_err(store_err));
            }

            StateCommand::ListArtifacts { message_id, reply } => {
                debug!(%message_id, "actor_loop: ListArtifacts command");
                let _ = reply.send(store.list_artifacts(&message_id).map_err(store_err));
            }

            StateCommand::SaveIteration {
                conversation_id,
                iteration,
                reply,
            } => {
                debug!(%conversation_id, "actor_loop: SaveIteration command");
                let _ = reply.send(store.save_design_iteration(&conversation_id, iteration).map_err(store_err));
            }

            StateCommand::ListIterations { conversation_id, reply } => {
                debug!(%conversation_id, "actor_loop: ListIterations command");
                let _ = reply.send(store.list_design_iterations(&conversation_id).map_err(store_err));
            }

            StateCommand::LatestIteration { conversation_id, reply } => {
                debug!(%conversation_id, "actor_loop: LatestIteration command");
                let _ = reply.send(store.latest_design_iteration(&conversation_id).map_err(store_err));
            }

            StateCommand::PutState {
                key,
                value,
                expires_at,
                reply,
            } => {
                debug!(%key, ?expires_at, "actor_loop: PutState command");
                let _ = reply.send(store.put_state(&key, &value, expires_at).map_err(store_err));
            }

            StateCommand::GetState { key, reply } => {
                debug!(%key, "actor_loop: GetState command");
                let _ = reply.send(store.get_state(&key).map_err(store_err));
            }

            StateCommand::DeleteState { key, reply } => {
                debug!(%key, "actor_loop: DeleteState command");
                let _ = reply.send(store.delete_state(&key).map_err(store_err));
            }

            StateCommand::PurgeExpired { reply } => {
                debug!("actor_loop: PurgeExpired command");
                let _ = reply.send(store.purge_expired_state().map_err(store_err));
            }

            StateCommand::Shutdown => {
                debug!("actor_loop: Shutdown command");
                info!("StateManager shutting down");
                break;
            }
        }
    }

    debug!("StateManager actor stopped");
}
