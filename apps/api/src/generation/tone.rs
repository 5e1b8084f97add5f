//! Style and length calibration for caption prompts.
//!
//! `style_preset` picks the tone of voice, `tone` picks the length. Unknown
//! values fall back to the defaults rather than failing the run.

/// Hard character cap communicated to the model for `short` captions.
pub const SHORT_CAPTION_MAX_CHARS: usize = 150;

/// Tone-of-voice instruction for a style preset.
pub fn voice_for_style(style: &str) -> &'static str {
    match style.trim().to_lowercase().as_str() {
        "educational" => {
            "Clear and informative. Teach one useful idea with a concrete example, \
            like a knowledgeable friend explaining it over coffee."
        }
        "inspirational" => {
            "Warm and uplifting. Speak to the reader's aspirations without clichés."
        }
        "motivational" => "Energetic and direct. End with a small, concrete call to action.",
        "storytelling" => {
            "Narrative. Open with a short scene or moment, then land the point."
        }
        "reflective" | "spiritual" => {
            "Calm and contemplative. Leave space for the reader to reflect."
        }
        "humorous" => "Light and witty, never sarcastic or mocking.",
        "professional" => "Polished and confident, suited to a business audience.",
        "casual" => "Relaxed and conversational, as if texting a friend.",
        _ => "Friendly, clear and authentic.",
    }
}

/// Length instruction for a tone value (`short`, `medium`, `long`).
pub fn length_for_tone(tone: &str) -> String {
    match tone.trim().to_lowercase().as_str() {
        "short" => format!(
            "Short. HARD LIMIT of {SHORT_CAPTION_MAX_CHARS} characters for the caption."
        ),
        "long" => "Long. 5-6 short paragraphs separated by blank lines.".to_string(),
        _ => "Medium. 2-3 short paragraphs separated by blank lines.".to_string(),
    }
}

/// Maps an automation's creativity level to a sampling temperature.
pub fn temperature_for(creativity: f64) -> f32 {
    if creativity.is_nan() {
        return 0.7;
    }
    creativity.clamp(0.0, 1.0) as f32
}
