//! Reasoning service
//!
//! Text understanding for the workflow: intent/parameter extraction and
//! free conversation. The service returns raw model text; decoding the
//! embedded record is the classifier's job.

use std::sync::Arc;

use async_trait::async_trait;
use eyre::Result;
use serde::Serialize;
use tracing::debug;

use crate::domain::DesignContext;
use crate::llm::{CompletionRequest, LlmClient, Message};
use crate::prompts::PromptLoader;

/// Natural-language collaborator of the workflow
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Ask for the structured reading of an utterance
    ///
    /// Returns the model's raw reply, expected to embed one JSON record.
    async fn analyze(&self, utterance: &str, context: &DesignContext) -> Result<String>;

    /// Continue a conversation; `history` may be empty
    async fn converse(&self, history: &[Message], utterance: &str) -> Result<String>;
}

#[derive(Serialize)]
struct AnalyzeContext<'a> {
    utterance: &'a str,
    context: String,
}

/// ReasoningService backed by an LLM client
///
/// Holds no conversation state; history arrives with every call.
pub struct LlmReasoner {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLoader>,
    max_tokens: u32,
    temperature: f32,
}

impl LlmReasoner {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLoader>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            llm,
            prompts,
            max_tokens,
            temperature,
        }
    }

    async fn complete(&self, messages: Vec<Message>) -> Result<String> {
        let system_prompt = self.prompts.render("system", &serde_json::json!({}))?;
        let request = CompletionRequest {
            system_prompt,
            messages,
            max_tokens: self.max_tokens,
            temperature: Some(self.temperature),
        };

        let response = self.llm.complete(request).await?;
        response
            .content
            .ok_or_else(|| eyre::eyre!("Model returned no text (stop reason {:?})", response.stop_reason))
    }
}

#[async_trait]
impl ReasoningService for LlmReasoner {
    async fn analyze(&self, utterance: &str, context: &DesignContext) -> Result<String> {
        debug!(utterance_len = utterance.len(), "LlmReasoner::analyze: called");
        let prompt = self.prompts.render(
            "analyze",
            &AnalyzeContext {
                utterance,
                context: serde_json::to_string(context)?,
            },
        )?;
        self.complete(vec![Message::user(prompt)]).await
    }

    async fn converse(&self, history: &[Message], utterance: &str) -> Result<String> {
        debug!(history_len = history.len(), "LlmReasoner::converse: called");
        let mut messages = history.to_vec();
        messages.push(Message::user(utterance));
        self.complete(messages).await
    }
}
