//! Clarification composer

use tracing::debug;

use crate::domain::DesignParameters;

pub const GENERIC_CLARIFICATION: &str = "¿Podrías darme más detalles sobre lo que te gustaría modificar?";

pub const SHAPE_MENU: &str = "\n\n**Configuraciones disponibles:**\n\
- **Lineal (I):** Ideal para espacios estrechos\n\
- **En L:** La más versátil, aprovecha esquinas\n\
- **En U:** Máximo almacenamiento, espacios amplios\n\
- **Paralela:** Perfecta para cocinas tipo pasillo\n";

/// Names of the required fields still unknown, in asking order
pub fn missing_fields(params: &DesignParameters) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if params.linear_meters.is_none() {
        missing.push("metros lineales disponibles");
    }
    if params.shape.is_none() {
        missing.push("configuración deseada (L, U, lineal, etc.)");
    }
    if params.style.is_none() {
        missing.push("estilo preferido");
    }
    missing
}

/// Compose the follow-up text for a clarify turn
///
/// Explicit questions win. Without them the text names exactly the
/// missing fields. The shape menu is appended whenever shape is unknown.
pub fn compose(questions: &[String], params: &DesignParameters) -> String {
    debug!(questions = questions.len(), "clarify::compose: called");

    let mut text = if !questions.is_empty() {
        questions.join("\n")
    } else {
        let missing = missing_fields(params);
        if missing.is_empty() {
            GENERIC_CLARIFICATION.to_string()
        } else {
            format!(
                "Para crear tu diseño ideal, necesito saber: {}. ¿Podrías proporcionarme esta información?",
                missing.join(", ")
            )
        }
    };

    if params.shape.is_none() {
        text.push_str(SHAPE_MENU);
    }
    text
}
