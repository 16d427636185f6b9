//! Conversation-state workflow engine
//!
//! One call to [`Workflow::run_turn`] takes a user utterance and the prior
//! state of its conversation through analyze, one branch and finalize.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use eyre::{Result, eyre};

use crate::config::WorkflowConfig;
use crate::domain::Artifact;
use crate::image::ImageClient;
use crate::prompts::PromptLoader;
use crate::reasoning::ReasoningService;

pub mod clarify;
pub mod classifier;
pub mod converse;
pub mod editor;
mod error;
pub mod generator;
mod orchestrator;
pub mod router;
pub mod specs;

pub use classifier::{Intent, IntentAction, classify_reply, decode_intent};
pub use error::WorkflowError;
pub use orchestrator::{TurnOutput, Workflow};
pub use router::{Route, route};
pub use specs::{ModuleLayout, format_meters, technical_specs};

/// Collaborators shared by every turn
///
/// Safe to share across conversations: nothing here holds per-conversation
/// data.
#[derive(Clone)]
pub struct Services {
    pub reasoner: Arc<dyn ReasoningService>,
    pub images: Arc<dyn ImageClient>,
    pub prompts: Arc<PromptLoader>,
    pub settings: WorkflowConfig,
}

/// What one branch produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BranchOutcome {
    pub response_text: String,
    pub artifacts: Vec<Artifact>,
    pub error: Option<String>,
}

impl BranchOutcome {
    pub fn text(response_text: impl Into<String>) -> Self {
        Self {
            response_text: response_text.into(),
            ..Default::default()
        }
    }

    pub fn failed(response_text: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            response_text: response_text.into(),
            artifacts: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Await a service call, treating expiry of `limit` as a failure
pub(crate) async fn bounded<T>(limit: Duration, label: &str, call: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(eyre!("{} timed out after {}ms", label, limit.as_millis())),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted collaborators for workflow unit tests

    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::domain::DesignContext;
    use crate::llm::Message;

    /// Reasoning service answering from fixed queues
    #[derive(Default)]
    pub struct ScriptedReasoner {
        analyze_replies: Mutex<VecDeque<Result<String, String>>>,
        converse_replies: Mutex<VecDeque<Result<String, String>>>,
        analyze_calls: AtomicUsize,
        converse_calls: AtomicUsize,
        conversations: Mutex<Vec<(Vec<Message>, String)>>,
        contexts: Mutex<Vec<DesignContext>>,
    }

    impl ScriptedReasoner {
        pub fn new(analyze: Vec<Result<String, String>>, converse: Vec<Result<String, String>>) -> Self {
            Self {
                analyze_replies: Mutex::new(analyze.into()),
                converse_replies: Mutex::new(converse.into()),
                ..Default::default()
            }
        }

        pub fn analyze_calls(&self) -> usize {
            self.analyze_calls.load(Ordering::SeqCst)
        }

        pub fn converse_calls(&self) -> usize {
            self.converse_calls.load(Ordering::SeqCst)
        }

        pub fn last_converse(&self) -> Option<(Vec<Message>, String)> {
            self.conversations.lock().unwrap().last().cloned()
        }

        pub fn contexts(&self) -> Vec<DesignContext> {
            self.contexts.lock().unwrap().clone()
        }
    }

    fn next(queue: &Mutex<VecDeque<Result<String, String>>>) -> Result<String> {
        match queue.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(e)) => Err(eyre!(e)),
            None => Err(eyre!("No more scripted replies")),
        }
    }

    #[async_trait]
    impl ReasoningService for ScriptedReasoner {
        async fn analyze(&self, _utterance: &str, context: &DesignContext) -> Result<String> {
            self.analyze_calls.fetch_add(1, Ordering::SeqCst);
            self.contexts.lock().unwrap().push(context.clone());
            next(&self.analyze_replies)
        }

        async fn converse(&self, history: &[Message], utterance: &str) -> Result<String> {
            self.converse_calls.fetch_add(1, Ordering::SeqCst);
            self.conversations
                .lock()
                .unwrap()
                .push((history.to_vec(), utterance.to_string()));
            next(&self.converse_replies)
        }
    }

    pub fn services(reasoner: Arc<dyn ReasoningService>, images: Arc<dyn ImageClient>) -> Services {
        Services {
            reasoner,
            images,
            prompts: Arc::new(PromptLoader::embedded_only()),
            settings: WorkflowConfig::default(),
        }
    }
}
