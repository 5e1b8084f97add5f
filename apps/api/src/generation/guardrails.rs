//! Post-hoc caption guardrails.
//!
//! Applied to every caption after the model returns, regardless of what the
//! model claims about its own output. Never returns an error: an invalid
//! caption is reported through `GuardrailVerdict` and the caller decides.

use std::fmt;

use serde::Serialize;

pub const MIN_CAPTION_CHARS: usize = 20;

/// Prefix that shows the model echoed the automation label back.
pub const AUTO_ECHO_PREFIX: &str = "auto:";

/// Phrases that mark a caption as generic filler. Lowercase.
pub const GENERIC_FILLER_PHRASES: &[&str] = &[
    "stay tuned for more",
    "in today's fast-paced world",
    "here is a caption",
    "here's a caption",
    "this post is about",
    "lorem ipsum",
    "as an ai",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailReason {
    EmptyCaption,
    CaptionEqualsTopic,
    CaptionStartsWithAuto,
    ContainsGenericFiller,
    CaptionTooShort,
    ContainsBannedPhrase,
    ReferenceMissing,
}

impl FailReason {
    pub fn code(&self) -> &'static str {
        match self {
            FailReason::EmptyCaption => "empty_caption",
            FailReason::CaptionEqualsTopic => "caption_equals_topic",
            FailReason::CaptionStartsWithAuto => "caption_starts_with_auto",
            FailReason::ContainsGenericFiller => "contains_generic_filler",
            FailReason::CaptionTooShort => "caption_too_short",
            FailReason::ContainsBannedPhrase => "contains_banned_phrase",
            FailReason::ReferenceMissing => "reference_missing",
        }
    }
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// What the caption is checked against.
#[derive(Debug, Clone, Default)]
pub struct GuardrailContext<'a> {
    pub topic: &'a str,
    pub banned_phrases: &'a [String],
    pub required_reference: Option<&'a str>,
}

/// Returns the first failing rule, or `None` when the caption passes.
///
/// Rules run in a fixed order so the reported reason is deterministic.
pub fn check_caption(caption: &str, ctx: &GuardrailContext<'_>) -> Option<FailReason> {
    let trimmed = caption.trim();
    if trimmed.is_empty() {
        return Some(FailReason::EmptyCaption);
    }

    let lower = trimmed.to_lowercase();
    let topic = ctx.topic.trim().to_lowercase();
    if !topic.is_empty() && lower == topic {
        return Some(FailReason::CaptionEqualsTopic);
    }
    if lower.starts_with(AUTO_ECHO_PREFIX) {
        return Some(FailReason::CaptionStartsWithAuto);
    }
    if GENERIC_FILLER_PHRASES.iter().any(|p| lower.contains(p)) {
        return Some(FailReason::ContainsGenericFiller);
    }
    if trimmed.chars().count() < MIN_CAPTION_CHARS {
        return Some(FailReason::CaptionTooShort);
    }
    if ctx
        .banned_phrases
        .iter()
        .map(|p| p.trim().to_lowercase())
        .any(|p| !p.is_empty() && lower.contains(&p))
    {
        return Some(FailReason::ContainsBannedPhrase);
    }
    if let Some(reference) = ctx.required_reference {
        if !trimmed.contains(reference.trim()) {
            return Some(FailReason::ReferenceMissing);
        }
    }
    None
}
