//! Per-conversation workflow state

use serde::{Deserialize, Serialize};

use super::artifact::Artifact;
use super::params::{DesignParameters, Materials, Shape, Style};
use crate::image::ImagePayload;
use crate::llm::Message;

/// Who a turn belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnIdentity {
    pub user_id: String,
    pub conversation_id: String,
}

impl TurnIdentity {
    pub fn new(user_id: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            conversation_id: conversation_id.into(),
        }
    }

    /// Key under which the turn state is cached
    pub fn state_key(&self) -> String {
        format!("turn:{}:{}", self.user_id, self.conversation_id)
    }
}

impl std::fmt::Display for TurnIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.user_id, self.conversation_id)
    }
}

/// Parameters captured when a version was produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignSnapshot {
    pub version: u32,
    pub params: DesignParameters,
}

/// Branch a turn took
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    Clarify,
    Generate,
    Edit,
    Converse,
}

impl Branch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Branch::Clarify => "clarify",
            Branch::Generate => "generate",
            Branch::Edit => "edit",
            Branch::Converse => "converse",
        }
    }
}

/// Scratch values of the turn in progress, rebuilt every turn
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingTurn {
    pub branch: Option<Branch>,
    pub needs_clarification: bool,
    pub questions: Vec<String>,
    pub response_text: String,
    pub artifacts: Vec<Artifact>,
    pub error: Option<String>,
}

/// Everything the workflow knows about one conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub user_id: String,
    pub conversation_id: String,
    /// Append-only chat log
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub params: DesignParameters,
    /// Latest image; present exactly when `design_version > 0`
    #[serde(default)]
    pub current_image: Option<ImagePayload>,
    #[serde(default)]
    pub design_version: u32,
    #[serde(default)]
    pub design_history: Vec<DesignSnapshot>,
    #[serde(skip)]
    pub pending: PendingTurn,
}

impl ConversationState {
    /// Fresh state with nothing known
    pub fn new(identity: &TurnIdentity) -> Self {
        Self {
            user_id: identity.user_id.clone(),
            conversation_id: identity.conversation_id.clone(),
            messages: Vec::new(),
            params: DesignParameters::default(),
            current_image: None,
            design_version: 0,
            design_history: Vec::new(),
            pending: PendingTurn::default(),
        }
    }

    pub fn identity(&self) -> TurnIdentity {
        TurnIdentity::new(&self.user_id, &self.conversation_id)
    }

    /// Latest message, if any
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Summary handed to the classifier
    pub fn context(&self) -> DesignContext {
        DesignContext {
            linear_meters: self.params.linear_meters,
            shape: self.params.shape,
            style: self.params.style.clone(),
            materials: self.params.materials.clone(),
            has_current_design: self.current_image.is_some(),
            design_version: self.design_version,
        }
    }

    /// Record a new version with its image
    pub fn advance_version(&mut self, image: ImagePayload, params: DesignParameters) -> u32 {
        self.design_version += 1;
        self.current_image = Some(image);
        self.design_history.push(DesignSnapshot {
            version: self.design_version,
            params,
        });
        self.design_version
    }
}

/// What the classifier is told about the current design
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DesignContext {
    pub linear_meters: Option<f64>,
    pub shape: Option<Shape>,
    pub style: Option<Style>,
    pub materials: Materials,
    pub has_current_design: bool,
    pub design_version: u32,
}
