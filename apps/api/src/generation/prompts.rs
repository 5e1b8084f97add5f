// All model prompt constants for the Generation module.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for caption generation, enforces JSON-only output.
pub const CAPTION_SYSTEM: &str = "You are an experienced social media copywriter \
    writing Instagram captions for a brand. \
    You MUST respond with valid JSON only: a single JSON object. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT repeat the instructions or the topic line back verbatim.";

/// Caption prompt template.
/// Replace: {topic}, {voice}, {length}, {language}, {banned}, {brand_block},
///          {grounding_block}
pub const CAPTION_PROMPT_TEMPLATE: &str = r##"Write one Instagram caption about the topic below.

TOPIC: {topic}

VOICE: {voice}
LENGTH: {length}
LANGUAGE: Write the caption, hashtags and alt text in {language}.
NEVER USE these words or phrases: {banned}
{brand_block}{grounding_block}
Return a JSON object with this EXACT schema (no extra fields):
{
  "caption": "the caption text, without hashtags",
  "hashtags": ["#example", "#another"],
  "alt_text": "one sentence describing a fitting image for screen readers"
}

Rules:
- Open with a line that earns attention. Never open with "Auto" or with the topic line itself.
- No generic filler such as "stay tuned" or "in today's fast-paced world".
- 3 to 8 hashtags, lowercase, relevant to the topic.
"##;

/// Grounding block for `auto_library`. Replace: {no_fabrication}, {chunks}
pub const AUTO_LIBRARY_BLOCK: &str = r#"
SOURCE MATERIAL (retrieved from the organisation's library):
{chunks}
Use exactly ONE short verbatim excerpt from the material above and cite its source title.
{no_fabrication}
"#;

/// Grounding block for `manual_seed`. Replace: {seed}
pub const MANUAL_SEED_BLOCK: &str = r#"
SEED CONTENT:
"""
{seed}
"""
The caption MUST reflect this content. Do not drift to unrelated points.
"#;

/// Grounding block for `grounded_library`. Replace: {no_fabrication}, {snippet}, {reference}
pub const GROUNDED_LIBRARY_BLOCK: &str = r#"
SNIPPET:
"""
{snippet}
"""
REFERENCE: {reference}
Quote at most one sentence of the snippet, or summarise it in your own words.
The reference MUST appear in the caption exactly as given above.
Never fabricate a reference or attribute the snippet to anyone else.
{no_fabrication}
"#;

/// Brand voice block. Replace: {brand_name}, {voice}, {audience}, {avoid}
pub const BRAND_BLOCK: &str = r#"
BRAND VOICE:
- Brand: {brand_name}
- Voice: {voice}
- Audience: {audience}
- Avoid: {avoid}
"#;

/// Topic-angle prompt. Replace: {count}, {topic}
pub const VARIATIONS_PROMPT_TEMPLATE: &str = r#"Suggest {count} distinct angles for a social media post about the topic below.
Each angle is one short phrase (under 12 words) that narrows the topic to something concrete.

TOPIC: {topic}

Return a JSON array of strings and nothing else, e.g. ["angle one", "angle two"]."#;
