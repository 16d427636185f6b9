//! Structured outputs attached to an assistant reply

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::image::ImagePayload;

/// Artifact vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Image,
    Specs,
    CostEstimate,
    FloorPlan,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Image => "image",
            ArtifactKind::Specs => "specs",
            ArtifactKind::CostEstimate => "cost_estimate",
            ArtifactKind::FloorPlan => "floor_plan",
        }
    }
}

/// One artifact of a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub image: Option<ImagePayload>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Artifact {
    pub fn image(title: impl Into<String>, image: ImagePayload, metadata: Map<String, Value>) -> Self {
        Self {
            kind: ArtifactKind::Image,
            title: title.into(),
            content: None,
            image: Some(image),
            metadata,
        }
    }

    pub fn specs(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: ArtifactKind::Specs,
            title: title.into(),
            content: Some(content.into()),
            image: None,
            metadata: Map::new(),
        }
    }
}
