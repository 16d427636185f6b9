//! Action router
//!
//! Pure decision from a classified intent and the merged parameters to the
//! branch a turn takes.

use tracing::debug;

use super::classifier::{Intent, IntentAction};
use crate::domain::{Branch, DesignParameters};

/// Question asked when generation is requested without a known size
pub const MISSING_METERS_QUESTION: &str = "¿Cuántos metros lineales tiene disponibles para su cocina?";

/// Branch chosen for a turn
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Ask the given questions; empty means compose from missing fields
    Clarify(Vec<String>),
    Generate,
    Edit,
    Converse,
}

impl Route {
    pub fn branch(&self) -> Branch {
        match self {
            Route::Clarify(_) => Branch::Clarify,
            Route::Generate => Branch::Generate,
            Route::Edit => Branch::Edit,
            Route::Converse => Branch::Converse,
        }
    }
}

/// Decide the branch; `params` must already include this turn's patch
pub fn route(intent: &Intent, params: &DesignParameters) -> Route {
    debug!(action = ?intent.action, "route: called");

    if intent.needs_clarification() {
        return Route::Clarify(intent.questions.clone());
    }

    match intent.action {
        IntentAction::Generate if params.linear_meters.is_none() => {
            debug!("route: generate without linear meters, clarifying");
            Route::Clarify(vec![MISSING_METERS_QUESTION.to_string()])
        }
        IntentAction::Generate => Route::Generate,
        IntentAction::Edit => Route::Edit,
        IntentAction::Question | IntentAction::Clarification => Route::Converse,
    }
}
