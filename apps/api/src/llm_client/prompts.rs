// Shared prompt constants and prompt-building utilities.
// Each service that needs model calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Common instruction appended to every grounded caption prompt.
pub const NO_FABRICATION_INSTRUCTION: &str = "\
    CRITICAL: Never fabricate quotes, statistics, sources or references. \
    If the provided material does not support a claim, leave the claim out.";

/// Appended to every image prompt. Generated images must carry no lettering.
pub const NO_TEXT_IN_IMAGE: &str =
    "Absolutely no text, letters, words, numbers, logos or watermarks anywhere in the image.";
