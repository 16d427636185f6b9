//! Prompt Loader
//!
//! Loads prompt templates from files or falls back to embedded defaults.

use std::path::PathBuf;

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use super::embedded;

/// Project-local override directory, relative to the working directory
const LOCAL_PROMPTS_DIR: &str = ".kitchenmaster/prompts";

/// Loads and renders prompt templates
pub struct PromptLoader {
    /// Handlebars template engine
    hbs: Handlebars<'static>,
    /// Configured override directory (`prompts-dir`)
    override_dir: Option<PathBuf>,
    /// Project override directory (`.kitchenmaster/prompts/`)
    local_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a prompt loader
    ///
    /// `prompts_dir` is the configured override directory, if any.
    pub fn new(prompts_dir: Option<PathBuf>) -> Self {
        debug!(?prompts_dir, "PromptLoader::new: called");
        let local_dir = PathBuf::from(LOCAL_PROMPTS_DIR);

        Self {
            hbs: plain_text_handlebars(),
            override_dir: prompts_dir.filter(|d| d.exists()),
            local_dir: if local_dir.exists() { Some(local_dir) } else { None },
        }
    }

    /// Create a loader that only uses embedded prompts (for testing)
    pub fn embedded_only() -> Self {
        Self {
            hbs: plain_text_handlebars(),
            override_dir: None,
            local_dir: None,
        }
    }

    /// Load a template by name
    ///
    /// Checks in order:
    /// 1. Configured override: `{prompts-dir}/{name}.pmt`
    /// 2. Project override: `.kitchenmaster/prompts/{name}.pmt`
    /// 3. Embedded fallback
    pub fn load_template(&self, name: &str) -> Result<String> {
        for dir in [&self.override_dir, &self.local_dir].into_iter().flatten() {
            let path = dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!("Loading prompt from override: {:?}", path);
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read prompt {}: {}", path.display(), e));
            }
        }

        if let Some(content) = embedded::get_embedded(name) {
            debug!("Using embedded prompt: {}", name);
            return Ok(content.to_string());
        }

        Err(eyre!("Prompt template not found: {}", name))
    }

    /// Render a template with the given context
    pub fn render<T: Serialize>(&self, template_name: &str, context: &T) -> Result<String> {
        let template = self.load_template(template_name)?;
        debug!(%template_name, "render: called");

        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template {}: {}", template_name, e))
    }
}

fn plain_text_handlebars() -> Handlebars<'static> {
    let mut hbs = Handlebars::new();
    hbs.register_escape_fn(handlebars::no_escape);
    hbs
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_embedded_system_prompt() {
        let loader = PromptLoader::embedded_only();
        let system = loader.load_template("system").unwrap();
        assert!(system.contains("KitchenMaster AI"));
        assert!(system.contains("español"));
    }

    #[test]
    fn test_unknown_template() {
        let loader = PromptLoader::embedded_only();
        assert!(loader.load_template("nonexistent-template").is_err());
    }

    #[test]
    fn test_render_does_not_escape() {
        let loader = PromptLoader::embedded_only();
        let out = loader
            .render("edit-reply", &json!({"version": 3}))
            .unwrap();
        assert!(out.contains("Versión 3"));

        let out = loader
            .render(
                "analyze",
                &json!({"utterance": "cocina \"moderna\" & <grande>", "context": "{}"}),
            )
            .unwrap();
        assert!(out.contains("cocina \"moderna\" & <grande>"));
    }

    #[test]
    fn test_override_dir_wins() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("edit-reply.pmt"), "custom v{{version}}").unwrap();

        let loader = PromptLoader::new(Some(dir.path().to_path_buf()));
        let out = loader.render("edit-reply", &json!({"version": 2})).unwrap();
        assert_eq!(out, "custom v2");

        // Templates not overridden still come from the embedded set
        assert!(loader.load_template("system").unwrap().contains("KitchenMaster AI"));
    }

    #[test]
    fn test_missing_override_dir_is_ignored() {
        let loader = PromptLoader::new(Some(PathBuf::from("/nonexistent/prompts")));
        assert!(loader.load_template("tech-specs").is_ok());
    }
}
