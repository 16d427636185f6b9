use thiserror::Error;

use crate::domain::TurnIdentity;

/// Reasons a turn is refused before any branch runs
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("No user message provided")]
    EmptyMessage,

    #[error("Prior state belongs to {found}, not {expected}")]
    IdentityMismatch { expected: TurnIdentity, found: TurnIdentity },
}
