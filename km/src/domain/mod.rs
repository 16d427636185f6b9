//! Domain types for the kitchen design workflow

mod artifact;
mod params;
mod state;

pub use artifact::{Artifact, ArtifactKind};
pub use params::{
    Budget, DEFAULT_BACKSPLASH, DEFAULT_CABINETS, DEFAULT_COLORS, DEFAULT_COUNTERTOP, DesignParameters, FieldUpdate,
    Materials, MaterialsPatch, ParameterPatch, ResolvedMaterials, ResolvedParameters, Shape, Style,
};
pub use state::{Branch, ConversationState, DesignContext, DesignSnapshot, PendingTurn, TurnIdentity};
