//! Chat service
//!
//! Wraps the workflow engine with persistence: conversations, messages,
//! artifacts, design iterations and the cached turn state.

use std::sync::Arc;
use std::time::Duration;

use designstore::{ConversationRecord, NewArtifact, NewIteration};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info};

use super::archive::Archive;
use crate::config::Config;
use crate::domain::{Artifact, ConversationState, TurnIdentity};
use crate::image::create_image_client;
use crate::llm::{Role, create_client};
use crate::prompts::PromptLoader;
use crate::reasoning::LlmReasoner;
use crate::state::{StateError, StateManager};
use crate::workflow::{Services, Workflow, WorkflowError, format_meters};

/// Title given to conversations before their first design
pub const NEW_CONVERSATION_TITLE: &str = "Nueva Cocina";

/// Errors from the chat service
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    State(#[from] StateError),
}

/// Reply to one user message
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub conversation_id: String,
    /// Id of the recorded assistant message
    pub message_id: String,
    pub content: String,
    pub artifacts: Vec<Artifact>,
    pub design_version: u32,
}

/// Title for a conversation once its first design exists
pub fn conversation_title(state: &ConversationState, default_linear_meters: f64) -> String {
    let p = state.params.resolve(default_linear_meters);
    format!(
        "Cocina {} {} - {}m",
        p.style.as_str(),
        p.shape.code(),
        format_meters(p.linear_meters)
    )
}

fn new_artifact(artifact: &Artifact) -> NewArtifact {
    let mut metadata = artifact.metadata.clone();
    if let Some(image) = &artifact.image {
        metadata.insert("mime_type".to_string(), Value::from(image.mime_type.clone()));
    }
    NewArtifact {
        artifact_type: artifact.kind.as_str().to_string(),
        title: Some(artifact.title.clone()),
        content: artifact.content.clone(),
        image_data: artifact.image.as_ref().map(|img| img.data.clone()),
        metadata: Value::Object(metadata),
    }
}

/// Conversation front door used by the CLI
#[derive(Clone)]
pub struct ChatService {
    workflow: Workflow,
    archive: Archive,
    state_ttl: Duration,
}

impl ChatService {
    pub fn new(workflow: Workflow, state: StateManager, state_ttl: Duration) -> Self {
        Self {
            workflow,
            archive: Archive::new(state),
            state_ttl,
        }
    }

    /// Build every collaborator from configuration
    ///
    /// Must run inside a tokio runtime; the state actor is spawned here.
    pub fn from_config(config: &Config) -> eyre::Result<Self> {
        debug!("ChatService::from_config: called");
        let prompts = Arc::new(PromptLoader::new(config.prompts_dir.clone()));
        let llm = create_client(&config.llm)?;
        let images = create_image_client(&config.image, prompts.clone())?;
        let reasoner = Arc::new(LlmReasoner::new(
            llm,
            prompts.clone(),
            config.llm.max_tokens,
            config.llm.temperature,
        ));

        let workflow = Workflow::new(Services {
            reasoner,
            images,
            prompts,
            settings: config.workflow.clone(),
        });
        let archive = Archive::open(config)?;

        Ok(Self {
            workflow,
            archive,
            state_ttl: config.storage.state_ttl(),
        })
    }

    /// Read side over the same store
    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    pub fn state(&self) -> &StateManager {
        self.archive.state()
    }

    /// Handle one user message
    ///
    /// Creates the conversation when `conversation_id` is `None`. The turn
    /// state is saved last, after the reply and its artifacts are recorded.
    pub async fn send(
        &self,
        user_id: &str,
        conversation_id: Option<&str>,
        message: &str,
    ) -> Result<ChatReply, ServiceError> {
        debug!(%user_id, ?conversation_id, "ChatService::send: called");
        let message = message.trim();
        if message.is_empty() {
            return Err(WorkflowError::EmptyMessage.into());
        }

        let conversation = match conversation_id {
            Some(id) => self.archive.conversation(user_id, id).await?,
            None => self.state().create_conversation(user_id, NEW_CONVERSATION_TITLE).await?,
        };

        let turn = self.archive.locks().acquire(user_id, &conversation.id).await;
        let result = self.locked_turn(user_id, conversation, message).await;
        drop(turn);
        self.archive.locks().prune().await;
        result
    }

    /// Body of `send`, run while the conversation's turn lock is held
    async fn locked_turn(
        &self,
        user_id: &str,
        conversation: ConversationRecord,
        message: &str,
    ) -> Result<ChatReply, ServiceError> {
        let identity = TurnIdentity::new(user_id, &conversation.id);

        self.state().add_message(&conversation.id, Role::User.as_str(), message).await?;
        let prior = self.state().load_turn_state(&identity).await?;
        let prior_version = prior.as_ref().map(|s| s.design_version).unwrap_or(0);

        let output = self.workflow.run_turn(message, &identity, prior).await?;
        info!(%identity, branch = output.branch.as_str(), version = output.state.design_version, "Turn complete");

        let reply = self
            .state()
            .add_message(&conversation.id, Role::Assistant.as_str(), &output.response_text)
            .await?;
        for artifact in &output.artifacts {
            self.state().add_artifact(&reply.id, new_artifact(artifact)).await?;
        }

        let version = output.state.design_version;
        if version > prior_version {
            let p = &output.state.params;
            self.state()
                .save_iteration(
                    &conversation.id,
                    NewIteration {
                        prompt_used: message.to_string(),
                        image_data: output.state.current_image.as_ref().map(|img| img.data.clone()),
                        parameters: json!({
                            "linear_meters": p.linear_meters,
                            "shape": p.shape,
                            "style": p.style,
                        }),
                        version: Some(version as i64),
                        parent_iteration_id: None,
                    },
                )
                .await?;

            if version == 1 {
                let title = conversation_title(&output.state, self.workflow.services().settings.default_linear_meters);
                self.state().update_title(&conversation.id, &title).await?;
            }
        }

        self.state().save_turn_state(&output.state, self.state_ttl).await?;

        Ok(ChatReply {
            conversation_id: conversation.id,
            message_id: reply.id,
            content: output.response_text,
            artifacts: output.artifacts,
            design_version: version,
        })
    }

    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        self.archive.shutdown().await
    }
}
