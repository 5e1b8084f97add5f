//! Caption Generator: builds the caption prompt, calls the text model and
//! applies guardrails to whatever comes back.
//!
//! Flow: grounding block → brand block → style/length calibration →
//!       model call → lenient response parse → guardrails → CaptionResult.
//!
//! A model failure is returned as `Err(LlmError)`. A caption that fails a
//! guardrail is NOT an error: it comes back with `valid = false`.

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::generation::guardrails::{check_caption, FailReason, GuardrailContext};
use crate::generation::prompts::{
    AUTO_LIBRARY_BLOCK, BRAND_BLOCK, CAPTION_PROMPT_TEMPLATE, CAPTION_SYSTEM,
    GROUNDED_LIBRARY_BLOCK, MANUAL_SEED_BLOCK,
};
use crate::generation::tone::{length_for_tone, temperature_for, voice_for_style};
use crate::llm_client::prompts::NO_FABRICATION_INSTRUCTION;
use crate::llm_client::{strip_json_fences, LlmError, TextModel};
use crate::models::content::ContentProfile;
use crate::selection::Grounding;

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// Everything one caption is generated from.
#[derive(Debug, Clone)]
pub struct CaptionRequest<'a> {
    /// The automation's configured topic; guardrails compare against it.
    pub topic: &'a str,
    /// The angle actually written about (the topic itself when no variation).
    pub angle: &'a str,
    pub style: &'a str,
    pub tone: &'a str,
    pub language: &'a str,
    pub banned_phrases: &'a [String],
    pub profile: Option<&'a ContentProfile>,
    pub creativity: f64,
    pub grounding: &'a Grounding,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaptionResult {
    pub caption: String,
    pub hashtags: Vec<String>,
    pub alt_text: String,
    pub valid: bool,
    pub fail_reason: Option<FailReason>,
}

// ────────────────────────────────────────────────────────────────────────────
// Generation
// ────────────────────────────────────────────────────────────────────────────

pub async fn generate_caption(
    model: &dyn TextModel,
    request: &CaptionRequest<'_>,
) -> Result<CaptionResult, LlmError> {
    let prompt = build_caption_prompt(request);
    let raw = model
        .complete(&prompt, CAPTION_SYSTEM, temperature_for(request.creativity))
        .await?;

    let value: Value = serde_json::from_str(strip_json_fences(&raw))?;
    let (caption, hashtags, alt_text) = parse_caption_response(&value);

    let fail_reason = check_caption(
        &caption,
        &GuardrailContext {
            topic: request.topic,
            banned_phrases: request.banned_phrases,
            required_reference: request.grounding.required_reference(),
        },
    );
    match fail_reason {
        Some(reason) => warn!(
            "Caption for '{}' failed guardrail {reason}: {:?}",
            request.topic,
            caption.chars().take(60).collect::<String>()
        ),
        None => info!(
            "Caption generated for '{}' ({} chars, {} hashtags, grounding={})",
            request.topic,
            caption.chars().count(),
            hashtags.len(),
            request.grounding.mode()
        ),
    }

    Ok(CaptionResult {
        caption,
        hashtags,
        alt_text,
        valid: fail_reason.is_none(),
        fail_reason,
    })
}

/// Pulls caption, hashtags and alt text out of the model's JSON.
///
/// Missing or mistyped fields become empty values; a non-list `hashtags`
/// becomes an empty list.
fn parse_caption_response(value: &Value) -> (String, Vec<String>, String) {
    let text = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };

    let hashtags = match value.get("hashtags") {
        Some(Value::Array(tags)) => tags
            .iter()
            .filter_map(Value::as_str)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        _ => Vec::new(),
    };

    (text("caption"), hashtags, text("alt_text"))
}

// ────────────────────────────────────────────────────────────────────────────
// Prompt building
// ────────────────────────────────────────────────────────────────────────────

pub fn build_caption_prompt(request: &CaptionRequest<'_>) -> String {
    let mut banned: Vec<String> = request
        .banned_phrases
        .iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    if let Some(profile) = request.profile {
        banned.extend(profile.avoid_words.iter().map(|w| w.trim().to_string()));
    }
    let banned = if banned.is_empty() {
        "(none)".to_string()
    } else {
        banned.join(", ")
    };

    let language = match request.language.trim() {
        "" => "en",
        l => l,
    };

    CAPTION_PROMPT_TEMPLATE
        .replace("{topic}", request.angle)
        .replace("{voice}", voice_for_style(request.style))
        .replace("{length}", &length_for_tone(request.tone))
        .replace("{language}", language)
        .replace("{banned}", &banned)
        .replace("{brand_block}", &brand_block(request.profile))
        .replace("{grounding_block}", &grounding_block(request.grounding))
}

fn brand_block(profile: Option<&ContentProfile>) -> String {
    let Some(profile) = profile else {
        return String::new();
    };
    BRAND_BLOCK
        .replace("{brand_name}", &profile.brand_name)
        .replace("{voice}", profile.voice.as_deref().unwrap_or("not specified"))
        .replace("{audience}", profile.audience.as_deref().unwrap_or("general"))
        .replace(
            "{avoid}",
            &if profile.avoid_words.is_empty() {
                "(none)".to_string()
            } else {
                profile.avoid_words.join(", ")
            },
        )
}

fn grounding_block(grounding: &Grounding) -> String {
    match grounding {
        Grounding::None => String::new(),
        Grounding::ManualSeed { text } => MANUAL_SEED_BLOCK.replace("{seed}", text.trim()),
        Grounding::AutoLibrary { chunks } => {
            let listed = chunks
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    format!(
                        "[{}] \"{}\"\n    source: {}\n    url: {}",
                        i + 1,
                        c.text.trim(),
                        c.source_title,
                        c.url.as_deref().unwrap_or("n/a")
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");
            AUTO_LIBRARY_BLOCK
                .replace("{chunks}", &listed)
                .replace("{no_fabrication}", NO_FABRICATION_INSTRUCTION)
        }
        Grounding::GroundedLibrary {
            text,
            reference,
            source_title,
        } => {
            let reference = reference
                .as_deref()
                .filter(|r| !r.trim().is_empty())
                .or(source_title.as_deref())
                .unwrap_or("(no reference; do not cite one)");
            GROUNDED_LIBRARY_BLOCK
                .replace("{snippet}", text.trim())
                .replace("{reference}", reference)
                .replace("{no_fabrication}", NO_FABRICATION_INSTRUCTION)
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
