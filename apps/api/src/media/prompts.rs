// Image prompt fragments for the AI media modes.

use crate::llm_client::images::with_no_text_constraint;
use crate::models::automation::AiImageStyle;

fn style_prefix(style: AiImageStyle) -> &'static str {
    match style {
        AiImageStyle::NaturePhoto => {
            "A serene, high-resolution nature photograph with soft natural light, evoking"
        }
        AiImageStyle::IslamicPattern => {
            "An intricate Islamic geometric pattern, symmetrical tessellation in harmonious \
             colors, inspired by"
        }
        AiImageStyle::MinimalGradient => {
            "A minimal abstract background of soft gradients and gentle color transitions, \
             with a mood inspired by"
        }
        AiImageStyle::Generated => "A tasteful, modern illustration for a social media post about",
    }
}

/// Full image prompt: style prefix, topic, optional concept, no-text constraint.
pub fn build_image_prompt(style: AiImageStyle, topic: &str, concept: Option<&str>) -> String {
    let mut prompt = format!("{} {}", style_prefix(style), topic.trim());
    if let Some(concept) = concept.map(str::trim).filter(|c| !c.is_empty()) {
        prompt.push_str(&format!(". Concept: {concept}"));
    }
    with_no_text_constraint(&prompt)
}
