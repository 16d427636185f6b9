//! Conversational composer

use tracing::{debug, warn};

use super::{BranchOutcome, Services, bounded};
use crate::llm::Message;

pub const GREETING: &str =
    "¡Hola! Soy KitchenMaster AI, tu experto en diseño de cocinas integrales. ¿En qué puedo ayudarte hoy?";

pub const CONVERSE_FAILED: &str = "Lo siento, tuve un problema al procesar tu mensaje. ¿Podrías intentarlo de nuevo?";

/// Reply to the latest message with the earlier ones as context
pub async fn converse(services: &Services, messages: &[Message]) -> BranchOutcome {
    debug!(messages = messages.len(), "converse: called");

    let Some((latest, history)) = messages.split_last() else {
        return BranchOutcome::text(GREETING);
    };

    let call = services.reasoner.converse(history, &latest.content);
    match bounded(services.settings.service_timeout(), "converse", call).await {
        Ok(reply) => BranchOutcome::text(reply),
        Err(e) => {
            warn!(error = %e, "Conversation reply failed");
            BranchOutcome::failed(CONVERSE_FAILED, e.to_string())
        }
    }
}
