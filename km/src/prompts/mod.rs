//! Prompt Template System
//!
//! Loads and renders `.pmt` (prompt template) files.
//!
//! Template loading chain:
//! 1. `{prompts-dir}/{name}.pmt` (configured override)
//! 2. `.kitchenmaster/prompts/{name}.pmt` (project override)
//! 3. Embedded fallback in code
//!
//! Templates use Handlebars syntax for variable substitution. Output is
//! plain text, so HTML escaping is off.

pub mod embedded;
mod loader;

pub use loader::PromptLoader;
