//! Topic-angle variations.
//!
//! One model call proposes a handful of sub-angles for the automation's topic
//! and one is picked at random, so daily posts on the same topic do not repeat.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::generation::prompts::VARIATIONS_PROMPT_TEMPLATE;
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{call_json, TextModel};

/// Temperature for angle brainstorming. Higher than captions on purpose.
const VARIATIONS_TEMPERATURE: f32 = 0.9;

/// The angle a run writes about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicAngle {
    Variation(String),
    /// No usable variations; the raw topic is used.
    Original(String),
}

impl TopicAngle {
    pub fn as_str(&self) -> &str {
        match self {
            TopicAngle::Variation(s) | TopicAngle::Original(s) => s,
        }
    }
}

/// Asks the model for `count` angles on `topic` and picks one uniformly.
///
/// A model error, an unparsable answer or an empty list all yield
/// `TopicAngle::Original`.
pub async fn choose_angle(
    model: &dyn TextModel,
    topic: &str,
    count: usize,
    rng: &mut StdRng,
) -> TopicAngle {
    if count == 0 || topic.trim().is_empty() {
        return TopicAngle::Original(topic.to_string());
    }

    let prompt = VARIATIONS_PROMPT_TEMPLATE
        .replace("{count}", &count.to_string())
        .replace("{topic}", topic);

    let angles: Vec<String> =
        match call_json(model, &prompt, JSON_ONLY_SYSTEM, VARIATIONS_TEMPERATURE).await {
            Ok(angles) => angles,
            Err(e) => {
                warn!("Topic variation failed, using original topic: {e}");
                return TopicAngle::Original(topic.to_string());
            }
        };

    let angles: Vec<String> = angles
        .into_iter()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .take(count)
        .collect();
    debug!("{} topic angles proposed for '{topic}'", angles.len());

    match angles.choose(rng) {
        Some(angle) => TopicAngle::Variation(angle.clone()),
        None => TopicAngle::Original(topic.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::ScriptedTextModel;
    use rand::SeedableRng;

    #[tokio::test]
    async fn test_picks_one_of_the_proposed_angles() {
        let model = ScriptedTextModel::always(r#"["gratitude at work", "gratitude in hard times"]"#);
        let angle = choose_angle(&model, "Gratitude", 5, &mut StdRng::seed_from_u64(7)).await;
        match angle {
            TopicAngle::Variation(a) => {
                assert!(a == "gratitude at work" || a == "gratitude in hard times")
            }
            other => panic!("expected a variation, got {other:?}"),
        }
        assert!(model.prompts.lock().unwrap()[0].contains("Suggest 5 distinct angles"));
    }

    #[tokio::test]
    async fn test_model_error_falls_back_to_topic() {
        let model = ScriptedTextModel::failing("overloaded");
        let angle = choose_angle(&model, "Gratitude", 5, &mut StdRng::seed_from_u64(7)).await;
        assert_eq!(angle, TopicAngle::Original("Gratitude".to_string()));
    }

    #[tokio::test]
    async fn test_empty_or_blank_list_falls_back_to_topic() {
        let model = ScriptedTextModel::always(r#"["", "   "]"#);
        let angle = choose_angle(&model, "Gratitude", 5, &mut StdRng::seed_from_u64(7)).await;
        assert_eq!(angle.as_str(), "Gratitude");
        assert!(matches!(angle, TopicAngle::Original(_)));
    }

    #[tokio::test]
    async fn test_zero_count_skips_the_model() {
        let model = ScriptedTextModel::failing("should not be called");
        let angle = choose_angle(&model, "Gratitude", 0, &mut StdRng::seed_from_u64(7)).await;
        assert_eq!(angle, TopicAngle::Original("Gratitude".to_string()));
        assert!(model.prompts.lock().unwrap().is_empty());
    }
}
