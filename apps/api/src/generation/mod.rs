// Caption Generation
// Implements: topic-angle variations, style/length calibration, caption prompt,
// model call, post-hoc guardrails.
// All model calls go through llm_client; no direct API calls here.

pub mod generator;
pub mod guardrails;
pub mod prompts;
pub mod tone;
pub mod variations;
