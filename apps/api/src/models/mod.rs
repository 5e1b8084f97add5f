pub mod account;
pub mod automation;
pub mod content;
pub mod media;
pub mod post;

use thiserror::Error;

/// Raised when a mode column holds a value none of the closed enums know about.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("unknown {kind} '{value}'")]
pub struct ModeParseError {
    pub kind: &'static str,
    pub value: String,
}

impl ModeParseError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
