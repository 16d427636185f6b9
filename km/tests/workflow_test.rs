//! End-to-end turns through the workflow and the chat service
//!
//! Collaborators are scripted fakes; no network is touched.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use eyre::{Result, eyre};
use tempfile::TempDir;

use kitchenmaster::config::WorkflowConfig;
use kitchenmaster::domain::{Branch, DesignContext, Shape, TurnIdentity};
use kitchenmaster::image::{ImageClient, ImagePayload, ImageResponse};
use kitchenmaster::llm::Message;
use kitchenmaster::prompts::PromptLoader;
use kitchenmaster::reasoning::ReasoningService;
use kitchenmaster::session::{Archive, ChatService};
use kitchenmaster::state::StateManager;
use kitchenmaster::workflow::router::MISSING_METERS_QUESTION;
use kitchenmaster::workflow::{Services, Workflow, WorkflowError};

// =============================================================================
// Fakes
// =============================================================================

#[derive(Default)]
struct FakeReasoner {
    analyze: Mutex<VecDeque<String>>,
    converse: Mutex<VecDeque<String>>,
}

impl FakeReasoner {
    fn analyzing(replies: &[&str]) -> Self {
        Self {
            analyze: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            ..Default::default()
        }
    }

    fn conversing(mut self, replies: &[&str]) -> Self {
        self.converse = Mutex::new(replies.iter().map(|r| r.to_string()).collect());
        self
    }
}

#[async_trait]
impl ReasoningService for FakeReasoner {
    async fn analyze(&self, _utterance: &str, _context: &DesignContext) -> Result<String> {
        self.analyze
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| eyre!("no scripted analysis"))
    }

    async fn converse(&self, _history: &[Message], _utterance: &str) -> Result<String> {
        self.converse
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| eyre!("no scripted reply"))
    }
}

struct FakeImages {
    delay: Duration,
    generated: Mutex<usize>,
}

impl FakeImages {
    fn new() -> Self {
        Self::slow(Duration::ZERO)
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            generated: Mutex::new(0),
        }
    }
}

#[async_trait]
impl ImageClient for FakeImages {
    async fn generate(&self, prompt: &str) -> Result<ImageResponse> {
        tokio::time::sleep(self.delay).await;
        let mut n = self.generated.lock().unwrap();
        *n += 1;
        Ok(ImageResponse::ok(vec![ImagePayload::png(vec![*n as u8; 4])], prompt))
    }

    async fn edit(&self, _base: &ImagePayload, instructions: &str) -> Result<ImageResponse> {
        Ok(ImageResponse::ok(vec![ImagePayload::png(vec![0xED; 4])], instructions))
    }
}

fn workflow_with(reasoner: FakeReasoner, images: FakeImages, settings: WorkflowConfig) -> Workflow {
    Workflow::new(Services {
        reasoner: Arc::new(reasoner),
        images: Arc::new(images),
        prompts: Arc::new(PromptLoader::embedded_only()),
        settings,
    })
}

fn workflow(reasoner: FakeReasoner, images: FakeImages) -> Workflow {
    workflow_with(reasoner, images, WorkflowConfig::default())
}

const GENERATE_4M_L: &str = r#"Entendido. {"action": "generate", "linear_meters": 4, "shape": "L", "style": "modern"}"#;

// =============================================================================
// Workflow turns
// =============================================================================

#[tokio::test]
async fn test_first_turn_generates_design() {
    let wf = workflow(FakeReasoner::analyzing(&[GENERATE_4M_L]), FakeImages::new());
    let identity = TurnIdentity::new("ana", "c1");

    let out = wf
        .run_turn("Quiero una cocina moderna en L de 4 metros", &identity, None)
        .await
        .unwrap();

    assert_eq!(out.branch, Branch::Generate);
    assert!(out.error.is_none());
    assert_eq!(out.state.design_version, 1);
    assert_eq!(out.state.params.shape, Some(Shape::L));
    assert!(out.state.current_image.is_some());
    assert_eq!(out.state.messages.len(), 2);
    assert_eq!(out.state.design_history.len(), 1);
    assert_eq!(out.artifacts.len(), 2);

    let specs = out.artifacts.iter().find_map(|a| a.content.as_deref()).unwrap();
    assert!(specs.contains("Módulo fregadero"));
}

#[tokio::test]
async fn test_generate_without_meters_asks_for_them() {
    let wf = workflow(
        FakeReasoner::analyzing(&[r#"{"action": "generate", "shape": "U"}"#]),
        FakeImages::new(),
    );
    let out = wf
        .run_turn("hazme una cocina en U", &TurnIdentity::new("ana", "c1"), None)
        .await
        .unwrap();

    assert_eq!(out.branch, Branch::Clarify);
    assert!(out.response_text.contains(MISSING_METERS_QUESTION));
    assert_eq!(out.state.design_version, 0);
    assert!(out.artifacts.is_empty());
}

#[tokio::test]
async fn test_unreadable_analysis_still_answers() {
    let wf = workflow(
        FakeReasoner::analyzing(&["no JSON here"]).conversing(&["¡Claro que sí!"]),
        FakeImages::new(),
    );
    let out = wf
        .run_turn("hola", &TurnIdentity::new("ana", "c1"), None)
        .await
        .unwrap();

    assert!(matches!(out.branch, Branch::Clarify | Branch::Converse));
    assert!(!out.response_text.is_empty());
    assert_eq!(out.state.messages.len(), 2);
}

#[tokio::test]
async fn test_slow_image_service_counts_as_failure() {
    let settings = WorkflowConfig {
        service_timeout_ms: 50,
        ..WorkflowConfig::default()
    };
    let wf = workflow_with(
        FakeReasoner::analyzing(&[GENERATE_4M_L]),
        FakeImages::slow(Duration::from_secs(5)),
        settings,
    );

    let out = wf
        .run_turn("cocina en L de 4 metros", &TurnIdentity::new("ana", "c1"), None)
        .await
        .unwrap();

    assert_eq!(out.branch, Branch::Generate);
    assert!(out.error.is_some());
    assert_eq!(out.state.design_version, 0);
    assert!(out.state.current_image.is_none());
    assert!(out.artifacts.is_empty());
}

#[tokio::test]
async fn test_second_design_then_edit() {
    let wf = workflow(
        FakeReasoner::analyzing(&[
            GENERATE_4M_L,
            r#"{"action": "edit", "edit_instructions": "gabinetes azules"}"#,
        ]),
        FakeImages::new(),
    );
    let identity = TurnIdentity::new("ana", "c1");

    let first = wf.run_turn("cocina en L de 4 metros", &identity, None).await.unwrap();
    let second = wf
        .run_turn("cambia los gabinetes a azul", &identity, Some(first.state))
        .await
        .unwrap();

    assert_eq!(second.branch, Branch::Edit);
    assert_eq!(second.state.design_version, 2);
    assert_eq!(second.state.messages.len(), 4);
    assert_eq!(second.state.current_image.as_ref().unwrap().data, vec![0xED; 4]);
}

#[tokio::test]
async fn test_prior_state_of_other_conversation_is_rejected() {
    let wf = workflow(FakeReasoner::analyzing(&[GENERATE_4M_L]), FakeImages::new());
    let first = wf
        .run_turn("cocina en L de 4 metros", &TurnIdentity::new("ana", "c1"), None)
        .await
        .unwrap();

    let err = wf
        .run_turn("otra", &TurnIdentity::new("ana", "c2"), Some(first.state))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::IdentityMismatch { .. }));
}

// =============================================================================
// Chat service over an on-disk store
// =============================================================================

#[tokio::test]
async fn test_conversation_survives_restart() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let conversation_id = {
        let state = StateManager::spawn(temp_dir.path()).unwrap();
        let service = ChatService::new(
            workflow(FakeReasoner::analyzing(&[GENERATE_4M_L]), FakeImages::new()),
            state,
            Duration::from_secs(3600),
        );
        let reply = service.send("ana", None, "cocina en L de 4 metros").await.unwrap();
        assert_eq!(reply.design_version, 1);
        service.shutdown().await.unwrap();
        reply.conversation_id
    };

    let archive = Archive::new(StateManager::spawn(temp_dir.path()).unwrap());
    let conversations = archive.conversations("ana", 10).await.unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].id, conversation_id);
    assert_eq!(conversations[0].title, "Cocina modern L - 4.0m");

    let history = archive.history("ana", &conversation_id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].artifacts.len(), 2);

    let designs = archive.designs("ana", &conversation_id).await.unwrap();
    assert_eq!(designs.len(), 1);
    assert!(designs[0].has_image());

    let cached = archive
        .state()
        .load_turn_state(&TurnIdentity::new("ana", &conversation_id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cached.design_version, 1);
    archive.shutdown().await.unwrap();
}
