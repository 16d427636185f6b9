//! Design editor
//!
//! Applies free-text changes to the current image. Any failure falls
//! through to a fresh generation instead of stopping the turn.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::generator::{self, design_title};
use super::specs::format_meters;
use super::{BranchOutcome, Services, bounded};
use crate::domain::{Artifact, Branch, ConversationState};
use crate::llm::Role;

#[derive(Serialize)]
struct EditContext<'a> {
    changes: &'a str,
    edit_instructions: &'a str,
    shape: Option<&'a str>,
    linear_meters: Option<String>,
}

/// Latest thing the user said in this conversation
fn latest_user_text(state: &ConversationState) -> &str {
    state
        .messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .unwrap_or_default()
}

async fn fall_back(services: &Services, state: &mut ConversationState) -> (Branch, BranchOutcome) {
    (Branch::Generate, generator::generate(services, state).await)
}

/// Edit the current design, or generate when there is none
///
/// `instructions` is the classifier's reading of the change; the raw
/// message is used when it has none. The returned branch is the one that
/// actually ran: `Generate` whenever the edit fell through.
pub async fn edit(
    services: &Services,
    state: &mut ConversationState,
    instructions: Option<&str>,
) -> (Branch, BranchOutcome) {
    debug!(version = state.design_version, ?instructions, "edit: called");

    let Some(base) = state.current_image.clone() else {
        debug!("edit: no current design, generating");
        return fall_back(services, state).await;
    };

    let changes = latest_user_text(state).to_string();
    let instructions = instructions.unwrap_or(changes.as_str());
    let next_version = state.design_version + 1;

    let rendered = services
        .prompts
        .render(
            "edit-image",
            &EditContext {
                changes: &changes,
                edit_instructions: instructions,
                shape: state.params.shape.map(|s| s.code()),
                linear_meters: state.params.linear_meters.map(format_meters),
            },
        )
        .and_then(|prompt| {
            let reply = services.prompts.render("edit-reply", &serde_json::json!({ "version": next_version }))?;
            Ok((prompt, reply))
        });

    let (prompt, reply) = match rendered {
        Ok(texts) => texts,
        Err(e) => {
            warn!(error = %e, "Failed to render edit prompts, generating instead");
            return fall_back(services, state).await;
        }
    };

    let call = services.images.edit(&base, &prompt);
    let image = match bounded(services.settings.service_timeout(), "edit", call).await {
        Ok(response) => response.into_first_image(),
        Err(e) => Err(e.to_string()),
    };

    let image = match image {
        Ok(image) => image,
        Err(error) => {
            warn!(%error, "Design edit failed, generating instead");
            return fall_back(services, state).await;
        }
    };

    let params = state.params.clone();
    let version = state.advance_version(image.clone(), params);
    info!(version, "Edited design");

    let mut metadata = Map::new();
    metadata.insert("version".to_string(), Value::from(version));
    metadata.insert("edit".to_string(), Value::Bool(true));

    let outcome = BranchOutcome {
        response_text: reply,
        artifacts: vec![Artifact::image(design_title(version), image, metadata)],
        error: None,
    };
    (Branch::Edit, outcome)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::{DesignParameters, Shape, TurnIdentity};
    use crate::image::client::mock::MockImageClient;
    use crate::image::{ImagePayload, ImageResponse};
    use crate::llm::Message;
    use crate::workflow::testing::{ScriptedReasoner, services};

    fn ok_image(byte: u8) -> Result<ImageResponse, String> {
        Ok(ImageResponse::ok(vec![ImagePayload::png(vec![byte])], "p"))
    }

    fn designed_state() -> ConversationState {
        let mut state = ConversationState::new(&TurnIdentity::new("u", "c"));
        state.params = DesignParameters {
            linear_meters: Some(4.0),
            shape: Some(Shape::L),
            ..Default::default()
        };
        state.advance_version(ImagePayload::png(vec![1]), state.params.clone());
        state.messages.push(Message::user("cambia los gabinetes a azul"));
        state
    }

    #[tokio::test]
    async fn test_successful_edit() {
        let images = Arc::new(MockImageClient::new().with_edit(ok_image(2)));
        let svc = services(Arc::new(ScriptedReasoner::default()), images.clone());
        let mut state = designed_state();

        let (branch, outcome) = edit(&svc, &mut state, Some("blue cabinets")).await;

        assert_eq!(branch, Branch::Edit);
        assert_eq!(images.edit_calls(), 1);
        assert_eq!(images.generate_calls(), 0);
        assert_eq!(state.design_version, 2);
        assert_eq!(state.design_history.len(), 2);
        assert_eq!(state.current_image.as_ref().unwrap().data, vec![2]);

        assert_eq!(outcome.artifacts.len(), 1);
        assert_eq!(outcome.artifacts[0].title, "Diseño de Cocina v2");
        assert_eq!(outcome.artifacts[0].metadata["edit"], true);
        assert_eq!(outcome.artifacts[0].metadata["version"], 2);
        assert!(outcome.response_text.contains("Versión 2"));

        let prompt = &images.prompts()[0];
        assert!(prompt.contains("cambia los gabinetes a azul"));
        assert!(prompt.contains("Modify this kitchen design to blue cabinets."));
        assert!(prompt.contains("Keep the L configuration with 4.0 linear meters."));
    }

    #[tokio::test]
    async fn test_failed_edit_falls_back_to_generate() {
        let images = Arc::new(
            MockImageClient::new()
                .with_edit(Ok(ImageResponse::failed("edit unsupported")))
                .with_generate(ok_image(3)),
        );
        let svc = services(Arc::new(ScriptedReasoner::default()), images.clone());
        let mut state = designed_state();

        let (branch, outcome) = edit(&svc, &mut state, None).await;

        assert_eq!(branch, Branch::Generate);
        assert_eq!(images.edit_calls(), 1);
        assert_eq!(images.generate_calls(), 1);
        assert_eq!(state.design_version, 2);
        assert_eq!(outcome.artifacts.len(), 2);
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_empty_edit_falls_back_to_generate() {
        let images = Arc::new(
            MockImageClient::new()
                .with_edit(Ok(ImageResponse::ok(vec![], "p")))
                .with_generate(ok_image(4)),
        );
        let svc = services(Arc::new(ScriptedReasoner::default()), images.clone());
        let mut state = designed_state();

        let (branch, _) = edit(&svc, &mut state, None).await;

        assert_eq!(branch, Branch::Generate);
        assert_eq!(images.generate_calls(), 1);
        assert_eq!(state.current_image.as_ref().unwrap().data, vec![4]);
    }

    #[tokio::test]
    async fn test_both_failing_reports_generation_error() {
        let images = Arc::new(
            MockImageClient::new()
                .with_edit(Err("timeout".to_string()))
                .with_generate(Ok(ImageResponse::failed("quota"))),
        );
        let svc = services(Arc::new(ScriptedReasoner::default()), images);
        let mut state = designed_state();

        let (branch, outcome) = edit(&svc, &mut state, None).await;

        assert_eq!(branch, Branch::Generate);
        assert_eq!(state.design_version, 1);
        assert_eq!(outcome.error.as_deref(), Some("quota"));
    }

    #[tokio::test]
    async fn test_without_image_matches_generate() {
        let params = DesignParameters {
            linear_meters: Some(3.0),
            ..Default::default()
        };
        let mut via_edit = ConversationState::new(&TurnIdentity::new("u", "c"));
        via_edit.params = params.clone();
        let mut via_generate = via_edit.clone();

        let edit_images = Arc::new(MockImageClient::new().with_generate(ok_image(5)));
        let gen_images = Arc::new(MockImageClient::new().with_generate(ok_image(5)));
        let edit_svc = services(Arc::new(ScriptedReasoner::default()), edit_images.clone());
        let gen_svc = services(Arc::new(ScriptedReasoner::default()), gen_images.clone());

        let (branch, a) = edit(&edit_svc, &mut via_edit, Some("más luz")).await;
        let b = generator::generate(&gen_svc, &mut via_generate).await;

        assert_eq!(branch, Branch::Generate);
        assert_eq!(a, b);
        assert_eq!(via_edit, via_generate);
        assert_eq!(edit_images.edit_calls(), 0);
        assert_eq!(edit_images.prompts(), gen_images.prompts());
    }
}
