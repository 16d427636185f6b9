//! Design generator
//!
//! Turns the accumulated parameters into a fresh design image plus its
//! technical specification.

use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use super::specs::{format_meters, technical_specs};
use super::{BranchOutcome, Services, bounded};
use crate::domain::{Artifact, ConversationState, ResolvedParameters};

pub const SPECS_TITLE: &str = "Especificaciones Técnicas";

pub fn design_title(version: u32) -> String {
    format!("Diseño de Cocina v{}", version)
}

pub fn generation_failed_text(error: &str) -> String {
    format!(
        "Lo siento, hubo un problema al generar la imagen: {}. ¿Podrías intentarlo de nuevo?",
        error
    )
}

#[derive(Serialize)]
struct ImageContext<'a> {
    shape_description: &'a str,
    linear_meters: String,
    style: &'a str,
    atmosphere: &'a str,
    cabinets: &'a str,
    countertop: &'a str,
    backsplash: &'a str,
    colors: String,
    special_requirements: Option<&'a str>,
}

#[derive(Serialize)]
struct ReplyContext<'a> {
    version: u32,
    style: &'a str,
    shape_name: &'a str,
    linear_meters: String,
    cabinets: &'a str,
    countertop: &'a str,
    backsplash: &'a str,
    colors: String,
}

/// Texts rendered ahead of the image call
struct Rendered {
    image_prompt: String,
    specs: String,
    reply: String,
}

fn render(services: &Services, p: &ResolvedParameters, version: u32) -> eyre::Result<Rendered> {
    let meters = format_meters(p.linear_meters);
    let colors = p.colors.join(", ");

    let image_prompt = services.prompts.render(
        "design-image",
        &ImageContext {
            shape_description: p.shape.description(),
            linear_meters: meters.clone(),
            style: p.style.as_str(),
            atmosphere: p.style.atmosphere(),
            cabinets: &p.materials.cabinets,
            countertop: &p.materials.countertop,
            backsplash: &p.materials.backsplash,
            colors: colors.clone(),
            special_requirements: p.special_requirements.as_deref(),
        },
    )?;

    let specs = technical_specs(&services.prompts, p.linear_meters, p.shape, &p.materials, Some(p.budget))?;

    let reply = services.prompts.render(
        "design-reply",
        &ReplyContext {
            version,
            style: p.style.as_str(),
            shape_name: p.shape.display_name(),
            linear_meters: meters,
            cabinets: &p.materials.cabinets,
            countertop: &p.materials.countertop,
            backsplash: &p.materials.backsplash,
            colors,
        },
    )?;

    Ok(Rendered {
        image_prompt,
        specs,
        reply,
    })
}

/// Generate a design from the current parameters
///
/// Failure leaves `state` untouched. Success bumps the version, records a
/// history snapshot and replaces the current image.
pub async fn generate(services: &Services, state: &mut ConversationState) -> BranchOutcome {
    debug!(version = state.design_version, "generate: called");
    let resolved = state.params.resolve(services.settings.default_linear_meters);
    let next_version = state.design_version + 1;

    let rendered = match render(services, &resolved, next_version) {
        Ok(rendered) => rendered,
        Err(e) => {
            warn!(error = %e, "Failed to render design prompts");
            let error = e.to_string();
            return BranchOutcome::failed(generation_failed_text(&error), error);
        }
    };

    let call = services.images.generate(&rendered.image_prompt);
    let image = match bounded(services.settings.service_timeout(), "generate", call).await {
        Ok(response) => response.into_first_image(),
        Err(e) => Err(e.to_string()),
    };

    let image = match image {
        Ok(image) => image,
        Err(error) => {
            warn!(%error, "Design generation failed");
            return BranchOutcome::failed(generation_failed_text(&error), error);
        }
    };

    let params = state.params.clone();
    let version = state.advance_version(image.clone(), params);
    info!(version, shape = %resolved.shape, style = %resolved.style, "Generated design");

    let mut metadata = Map::new();
    metadata.insert("linear_meters".to_string(), json!(resolved.linear_meters));
    metadata.insert("shape".to_string(), Value::from(resolved.shape.code()));
    metadata.insert("style".to_string(), Value::from(resolved.style.as_str()));
    metadata.insert("version".to_string(), Value::from(version));

    BranchOutcome {
        response_text: rendered.reply,
        artifacts: vec![
            Artifact::image(design_title(version), image, metadata),
            Artifact::specs(SPECS_TITLE, rendered.specs),
        ],
        error: None,
    }
}
