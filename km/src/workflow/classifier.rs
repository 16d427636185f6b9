//! Intent classifier
//!
//! Decodes the reasoning service's free-text reply into an [`Intent`].
//! Decoding never fails: a reply without a usable JSON record becomes a
//! generic follow-up question.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::{Budget, FieldUpdate, MaterialsPatch, ParameterPatch, Shape, Style};

/// Question asked when the reply could not be decoded
pub const FALLBACK_QUESTION: &str = "¿Podrías proporcionar más detalles sobre tu cocina ideal?";

/// What the user wants from this turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentAction {
    Generate,
    Edit,
    Question,
    Clarification,
}

impl IntentAction {
    /// Unknown or missing actions read as `Question`
    pub fn parse(s: Option<&str>) -> Self {
        match s.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("generate") => IntentAction::Generate,
            Some("edit") => IntentAction::Edit,
            Some("clarification") | Some("clarify") => IntentAction::Clarification,
            _ => IntentAction::Question,
        }
    }
}

/// Decoded reading of one utterance
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: IntentAction,
    pub patch: ParameterPatch,
    pub edit_instructions: Option<String>,
    pub questions: Vec<String>,
}

impl Intent {
    /// Recovery value when nothing usable came back
    pub fn fallback() -> Self {
        Self {
            action: IntentAction::Question,
            patch: ParameterPatch::default(),
            edit_instructions: None,
            questions: vec![FALLBACK_QUESTION.to_string()],
        }
    }

    pub fn needs_clarification(&self) -> bool {
        self.action == IntentAction::Clarification
    }
}

/// Reply record as the model writes it; every field is loose JSON
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawIntent {
    action: Option<Value>,
    linear_meters: FieldUpdate<Value>,
    shape: FieldUpdate<Value>,
    style: FieldUpdate<Value>,
    materials: Option<Value>,
    colors: FieldUpdate<Value>,
    budget: FieldUpdate<Value>,
    edit_instructions: Option<Value>,
    questions_to_ask: Option<Value>,
    special_requirements: FieldUpdate<Value>,
}

fn text(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Array items, or a lone string as one item
fn text_list(value: Value) -> Option<Vec<String>> {
    let items: Vec<String> = match value {
        Value::Array(items) => items.into_iter().filter_map(text).collect(),
        other => text(other).into_iter().collect(),
    };
    if items.is_empty() { None } else { Some(items) }
}

/// Like `text_list`, but a lone string is a comma-separated list
fn comma_list(value: Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => {
            let items: Vec<String> = s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if items.is_empty() { None } else { Some(items) }
        }
        other => text_list(other),
    }
}

fn meters(value: Value) -> Option<f64> {
    let m = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('m').trim().replace(',', ".").parse().ok()?,
        _ => return None,
    };
    if m.is_finite() && m > 0.0 { Some(m) } else { None }
}

impl From<RawIntent> for Intent {
    fn from(raw: RawIntent) -> Self {
        let action = IntentAction::parse(raw.action.as_ref().and_then(Value::as_str));

        let materials = match raw.materials {
            Some(Value::Object(mut map)) => {
                let mut field = |key: &str| -> FieldUpdate<String> {
                    match map.remove(key) {
                        None => FieldUpdate::Absent,
                        Some(v) => FieldUpdate::Set(v).and_then(text),
                    }
                };
                MaterialsPatch {
                    cabinets: field("cabinets"),
                    countertop: field("countertop"),
                    backsplash: field("backsplash"),
                }
            }
            _ => MaterialsPatch::default(),
        };

        let patch = ParameterPatch {
            linear_meters: raw.linear_meters.and_then(meters),
            shape: raw.shape.and_then(|v| text(v).and_then(|s| Shape::parse(&s))),
            style: raw.style.and_then(|v| text(v).and_then(|s| Style::parse(&s))),
            materials,
            colors: raw.colors.and_then(comma_list),
            budget: raw.budget.and_then(|v| text(v).and_then(|s| Budget::parse(&s))),
            special_requirements: raw.special_requirements.and_then(text),
        };

        Intent {
            action,
            patch,
            edit_instructions: raw.edit_instructions.and_then(text),
            questions: raw.questions_to_ask.and_then(text_list).unwrap_or_default(),
        }
    }
}

/// Index of the brace closing the one at `start`, skipping string contents
fn find_matching_brace(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if escape_next {
            escape_next = false;
            continue;
        }
        if b == b'\\' && in_string {
            escape_next = true;
            continue;
        }
        if b == b'"' {
            in_string = !in_string;
            continue;
        }
        if in_string {
            continue;
        }
        if b == b'{' {
            depth += 1;
        } else if b == b'}' {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(i);
            }
        }
    }

    None
}

/// Top-level `{...}` blocks of `reply`, in order
pub fn json_blocks(reply: &str) -> Vec<&str> {
    let bytes = reply.as_bytes();
    let mut blocks = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{'
            && let Some(end) = find_matching_brace(bytes, i)
        {
            blocks.push(&reply[i..=end]);
            i = end + 1;
            continue;
        }
        i += 1;
    }
    blocks
}

/// Decode the first block that parses as an intent record
pub fn decode_intent(reply: &str) -> Option<Intent> {
    debug!(reply_len = reply.len(), "decode_intent: called");
    json_blocks(reply).into_iter().find_map(|block| match serde_json::from_str::<RawIntent>(block) {
        Ok(raw) => Some(Intent::from(raw)),
        Err(e) => {
            debug!(error = %e, "decode_intent: block rejected");
            None
        }
    })
}

/// Classify a reply, falling back to a generic question
pub fn classify_reply(reply: &str) -> Intent {
    decode_intent(reply).unwrap_or_else(|| {
        warn!("Reasoning reply had no usable intent record, asking for details");
        Intent::fallback()
    })
}
