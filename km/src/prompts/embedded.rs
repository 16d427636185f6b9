//! Embedded fallback prompts
//!
//! Compiled into the binary and used when no template file overrides them.

use tracing::debug;

/// Persona shared by every reasoning call
pub const SYSTEM: &str = include_str!("../../prompts/system.pmt");

/// Intent and parameter extraction request
pub const ANALYZE: &str = include_str!("../../prompts/analyze.pmt");

/// Kitchen description sent to the image model
pub const DESIGN_IMAGE: &str = include_str!("../../prompts/design-image.pmt");

/// Edit instructions sent with the base image
pub const EDIT_IMAGE: &str = include_str!("../../prompts/edit-image.pmt");

/// Question asked of the multimodal model before an edit
pub const DESCRIBE_IMAGE: &str = include_str!("../../prompts/describe-image.pmt");

/// Reply after a successful generation
pub const DESIGN_REPLY: &str = include_str!("../../prompts/design-reply.pmt");

/// Reply after a successful edit
pub const EDIT_REPLY: &str = include_str!("../../prompts/edit-reply.pmt");

/// Technical specification document
pub const TECH_SPECS: &str = include_str!("../../prompts/tech-specs.pmt");

/// Names of every embedded template
pub const NAMES: &[&str] = &[
    "system",
    "analyze",
    "design-image",
    "edit-image",
    "describe-image",
    "design-reply",
    "edit-reply",
    "tech-specs",
];

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "system" => Some(SYSTEM),
        "analyze" => Some(ANALYZE),
        "design-image" => Some(DESIGN_IMAGE),
        "edit-image" => Some(EDIT_IMAGE),
        "describe-image" => Some(DESCRIBE_IMAGE),
        "design-reply" => Some(DESIGN_REPLY),
        "edit-reply" => Some(EDIT_REPLY),
        "tech-specs" => Some(TECH_SPECS),
        _ => {
            debug!(%name, "get_embedded: no embedded prompt");
            None
        }
    }
}
