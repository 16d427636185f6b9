//! Workflow orchestrator
//!
//! Drives one turn through an explicit stage machine:
//! `Analyze -> {Clarify | Generate | Edit | Converse} -> Finalize`.
//! No stage is skipped and no branch returns to `Analyze`.

use tracing::{debug, info, warn};

use super::classifier::{Intent, classify_reply};
use super::router::{Route, route};
use super::{BranchOutcome, Services, WorkflowError, bounded, clarify, converse, editor, generator};
use crate::domain::{Artifact, Branch, ConversationState, PendingTurn, TurnIdentity};
use crate::llm::Message;

/// Result of one turn
#[derive(Debug, Clone)]
pub struct TurnOutput {
    pub response_text: String,
    pub artifacts: Vec<Artifact>,
    /// Full state to persist for the next turn
    pub state: ConversationState,
    pub branch: Branch,
    /// Failure recorded for logging; the turn still has a reply
    pub error: Option<String>,
}

enum Stage {
    Analyze,
    Dispatch { route: Route, intent: Intent },
    Finalize { branch: Branch, outcome: BranchOutcome },
}

/// Stateless turn runner; all conversation data arrives with each call
#[derive(Clone)]
pub struct Workflow {
    services: Services,
}

impl Workflow {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Run one turn
    ///
    /// `prior` of `None` starts a fresh conversation state. Only an empty
    /// message or a state that belongs to another conversation is refused;
    /// every other failure resolves into a reply.
    pub async fn run_turn(
        &self,
        message: &str,
        identity: &TurnIdentity,
        prior: Option<ConversationState>,
    ) -> Result<TurnOutput, WorkflowError> {
        debug!(%identity, has_prior = prior.is_some(), "run_turn: called");

        let message = message.trim();
        if message.is_empty() {
            return Err(WorkflowError::EmptyMessage);
        }

        let mut state = match prior {
            Some(state) if state.identity() != *identity => {
                return Err(WorkflowError::IdentityMismatch {
                    expected: identity.clone(),
                    found: state.identity(),
                });
            }
            Some(state) => state,
            None => ConversationState::new(identity),
        };
        state.pending = PendingTurn::default();
        state.messages.push(Message::user(message));

        let mut stage = Stage::Analyze;
        loop {
            stage = match stage {
                Stage::Analyze => {
                    let intent = self.analyze(message, &state).await;
                    state.params.merge(&intent.patch);
                    let chosen = route(&intent, &state.params);
                    info!(%identity, action = ?intent.action, branch = chosen.branch().as_str(), "Turn routed");
                    Stage::Dispatch { route: chosen, intent }
                }
                Stage::Dispatch { route, intent } => {
                    let (branch, outcome) = match route {
                        Route::Clarify(questions) => {
                            state.pending.needs_clarification = true;
                            state.pending.questions = questions.clone();
                            (Branch::Clarify, BranchOutcome::text(clarify::compose(&questions, &state.params)))
                        }
                        Route::Generate => (Branch::Generate, generator::generate(&self.services, &mut state).await),
                        Route::Edit => {
                            let (ran, outcome) =
                                editor::edit(&self.services, &mut state, intent.edit_instructions.as_deref()).await;
                            if ran != Branch::Edit {
                                info!(%identity, branch = ran.as_str(), "Edit fell back to a new design");
                            }
                            (ran, outcome)
                        }
                        Route::Converse => (Branch::Converse, converse::converse(&self.services, &state.messages).await),
                    };
                    Stage::Finalize { branch, outcome }
                }
                Stage::Finalize { branch, outcome } => {
                    return Ok(self.finalize(state, branch, outcome));
                }
            };
        }
    }

    async fn analyze(&self, message: &str, state: &ConversationState) -> Intent {
        let context = state.context();
        let call = self.services.reasoner.analyze(message, &context);
        match bounded(self.services.settings.service_timeout(), "analyze", call).await {
            Ok(reply) => classify_reply(&reply),
            Err(e) => {
                warn!(error = %e, "Intent analysis failed, asking for details");
                Intent::fallback()
            }
        }
    }

    fn finalize(&self, mut state: ConversationState, branch: Branch, outcome: BranchOutcome) -> TurnOutput {
        debug!(branch = branch.as_str(), version = state.design_version, "finalize: called");
        state.messages.push(Message::assistant(outcome.response_text.clone()));

        state.pending.branch = Some(branch);
        state.pending.response_text = outcome.response_text.clone();
        state.pending.artifacts = outcome.artifacts.clone();
        state.pending.error = outcome.error.clone();

        TurnOutput {
            response_text: outcome.response_text,
            artifacts: outcome.artifacts,
            state,
            branch,
            error: outcome.error,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::{Shape, Style};
    use crate::image::client::mock::MockImageClient;
    use crate::image::{ImagePayload, ImageResponse};
    use crate::llm::Role;
    use crate::workflow::router::MISSING_METERS_QUESTION;
    use crate::workflow::testing::{ScriptedReasoner, services};

    fn ok_image(byte: u8) -> Result<ImageResponse, String> {
        Ok(ImageResponse::ok(vec![ImagePayload::png(vec![byte])], "p"))
    }

    fn workflow(reasoner: Arc<ScriptedReasoner>, images: Arc<MockImageClient>) -> Workflow {
        Workflow::new(services(reasoner, images))
    }

    fn identity() -> TurnIdentity {
        TurnIdentity::new("user-1", "conv-1")
    }

    const GENERATE_L: &str = r#"{"action": "generate", "linear_meters": 4, "shape": "L", "style": "modern"}"#;

    #[tokio::test]
    async fn test_first_turn_generates() {
        let reasoner = Arc::new(ScriptedReasoner::new(vec![Ok(GENERATE_L.to_string())], vec![]));
        let images = Arc::new(MockImageClient::new().with_generate(ok_image(1)));
        let wf = workflow(reasoner, images);

        let out = wf
            .run_turn("quiero una cocina de 4 metros en forma de L estilo moderno", &identity(), None)
            .await
            .unwrap();

        assert_eq!(out.branch, Branch::Generate);
        assert_eq!(out.state.design_version, 1);
        assert_eq!(out.state.design_history.len(), 1);
        assert_eq!(out.artifacts.len(), 2);
        assert_eq!(out.state.params.linear_meters, Some(4.0));
        assert_eq!(out.state.params.shape, Some(Shape::L));
        assert_eq!(out.state.params.style, Some(Style::Modern));
        assert_eq!(out.state.messages.len(), 2);
        assert_eq!(out.state.messages[0].role, Role::User);
        assert_eq!(out.state.messages[1].role, Role::Assistant);
        assert_eq!(out.state.messages[1].content, out.response_text);
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let reasoner = Arc::new(ScriptedReasoner::default());
        let wf = workflow(reasoner.clone(), Arc::new(MockImageClient::new()));

        let err = wf.run_turn("   ", &identity(), None).await.unwrap_err();
        assert_eq!(err, WorkflowError::EmptyMessage);
        assert_eq!(reasoner.analyze_calls(), 0);
    }

    #[tokio::test]
    async fn test_foreign_state_is_rejected() {
        let wf = workflow(Arc::new(ScriptedReasoner::default()), Arc::new(MockImageClient::new()));
        let other = ConversationState::new(&TurnIdentity::new("user-2", "conv-1"));

        let err = wf.run_turn("hola", &identity(), Some(other)).await.unwrap_err();
        assert!(matches!(err, WorkflowError::IdentityMismatch { .. }));
    }

    #[tokio::test]
    async fn test_generate_without_size_clarifies() {
        let reasoner = Arc::new(ScriptedReasoner::new(
            vec![Ok(r#"{"action": "generate", "shape": "U"}"#.to_string())],
            vec![],
        ));
        let images = Arc::new(MockImageClient::new());
        let wf = workflow(reasoner, images.clone());

        let out = wf.run_turn("hazme una cocina en U", &identity(), None).await.unwrap();

        assert_eq!(out.branch, Branch::Clarify);
        assert_eq!(out.response_text, MISSING_METERS_QUESTION);
        assert_eq!(images.generate_calls(), 0);
        assert_eq!(out.state.design_version, 0);
        assert_eq!(out.state.params.shape, Some(Shape::U));
        assert!(out.state.pending.needs_clarification);
    }

    #[tokio::test]
    async fn test_unusable_reply_falls_back_to_converse() {
        let reasoner = Arc::new(ScriptedReasoner::new(
            vec![Ok("no json here".to_string())],
            vec![Ok("Cuéntame más".to_string())],
        ));
        let wf = workflow(reasoner.clone(), Arc::new(MockImageClient::new()));

        let out = wf.run_turn("hola", &identity(), None).await.unwrap();

        assert_eq!(out.branch, Branch::Converse);
        assert_eq!(out.response_text, "Cuéntame más");
        assert!(out.artifacts.is_empty());
        assert_eq!(reasoner.converse_calls(), 1);
    }

    #[tokio::test]
    async fn test_analysis_error_still_replies() {
        let reasoner = Arc::new(ScriptedReasoner::new(
            vec![Err("service down".to_string())],
            vec![Ok("¿En qué te ayudo?".to_string())],
        ));
        let wf = workflow(reasoner, Arc::new(MockImageClient::new()));

        let out = wf.run_turn("hola", &identity(), None).await.unwrap();
        assert_eq!(out.branch, Branch::Converse);
        assert_eq!(out.response_text, "¿En qué te ayudo?");
    }

    #[tokio::test]
    async fn test_null_extraction_keeps_known_values() {
        let reasoner = Arc::new(ScriptedReasoner::new(
            vec![
                Ok(GENERATE_L.to_string()),
                Ok(r#"{"action": "question", "shape": null, "style": null}"#.to_string()),
            ],
            vec![Ok("Claro".to_string())],
        ));
        let images = Arc::new(MockImageClient::new().with_generate(ok_image(1)));
        let wf = workflow(reasoner.clone(), images);

        let first = wf.run_turn("cocina de 4m en L", &identity(), None).await.unwrap();
        let second = wf
            .run_turn("¿qué opinas?", &identity(), Some(first.state))
            .await
            .unwrap();

        assert_eq!(second.state.params.shape, Some(Shape::L));
        assert_eq!(second.state.params.style, Some(Style::Modern));
        assert_eq!(second.state.design_version, 1);
        assert_eq!(second.state.messages.len(), 4);

        // Second analysis saw the design from the first turn
        let contexts = reasoner.contexts();
        assert!(!contexts[0].has_current_design);
        assert!(contexts[1].has_current_design);
        assert_eq!(contexts[1].design_version, 1);
    }

    #[tokio::test]
    async fn test_edit_turn_advances_once() {
        let reasoner = Arc::new(ScriptedReasoner::new(
            vec![
                Ok(GENERATE_L.to_string()),
                Ok(r#"{"action": "edit", "edit_instructions": "granite countertop"}"#.to_string()),
            ],
            vec![],
        ));
        let images = Arc::new(MockImageClient::new().with_generate(ok_image(1)).with_edit(ok_image(2)));
        let wf = workflow(reasoner, images.clone());

        let first = wf.run_turn("cocina de 4m en L", &identity(), None).await.unwrap();
        let second = wf
            .run_turn("cambia la cubierta a granito", &identity(), Some(first.state))
            .await
            .unwrap();

        assert_eq!(second.branch, Branch::Edit);
        assert_eq!(second.state.design_version, 2);
        assert_eq!(second.state.design_history.len(), 2);
        assert_eq!(second.artifacts.len(), 1);
        assert_eq!(images.edit_calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_edit_reports_generate_branch() {
        let reasoner = Arc::new(ScriptedReasoner::new(
            vec![
                Ok(GENERATE_L.to_string()),
                Ok(r#"{"action": "edit", "edit_instructions": "granite countertop"}"#.to_string()),
            ],
            vec![],
        ));
        let images = Arc::new(
            MockImageClient::new()
                .with_generate(ok_image(1))
                .with_generate(ok_image(3))
                .with_edit(Ok(ImageResponse::failed("edit unsupported"))),
        );
        let wf = workflow(reasoner, images.clone());

        let first = wf.run_turn("cocina de 4m en L", &identity(), None).await.unwrap();
        let second = wf
            .run_turn("cambia la cubierta a granito", &identity(), Some(first.state))
            .await
            .unwrap();

        assert_eq!(second.branch, Branch::Generate);
        assert_eq!(second.state.pending.branch, Some(Branch::Generate));
        assert_eq!(second.state.design_version, 2);
        assert_eq!(second.artifacts.len(), 2);
        assert_eq!(images.edit_calls(), 1);
        assert_eq!(images.generate_calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_generation_keeps_version() {
        let reasoner = Arc::new(ScriptedReasoner::new(vec![Ok(GENERATE_L.to_string())], vec![]));
        let images = Arc::new(MockImageClient::new().with_generate(Ok(ImageResponse::failed("blocked"))));
        let wf = workflow(reasoner, images);

        let out = wf.run_turn("cocina de 4m en L", &identity(), None).await.unwrap();

        assert_eq!(out.branch, Branch::Generate);
        assert_eq!(out.state.design_version, 0);
        assert!(out.state.current_image.is_none());
        assert!(out.artifacts.is_empty());
        assert_eq!(out.error.as_deref(), Some("blocked"));
        // Parameters learned this turn are still kept
        assert_eq!(out.state.params.linear_meters, Some(4.0));
    }

    #[tokio::test]
    async fn test_explicit_clarification_uses_questions() {
        let reasoner = Arc::new(ScriptedReasoner::new(
            vec![Ok(
                r#"{"action": "clarification", "questions_to_ask": ["¿Qué estilo prefieres?"]}"#.to_string(),
            )],
            vec![],
        ));
        let wf = workflow(reasoner, Arc::new(MockImageClient::new()));

        let out = wf.run_turn("quiero remodelar", &identity(), None).await.unwrap();
        assert_eq!(out.branch, Branch::Clarify);
        assert!(out.response_text.starts_with("¿Qué estilo prefieres?"));
        assert!(out.response_text.contains("**Configuraciones disponibles:**"));
        assert_eq!(out.state.pending.questions, vec!["¿Qué estilo prefieres?"]);
    }
}
