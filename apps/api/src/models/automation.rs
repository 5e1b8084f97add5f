//! Automation is a standing configuration that produces one post per run.
//!
//! Every mode column is a closed enum, parsed once when the row is loaded.
//! Unknown strings fail the row load rather than being matched loosely later.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::ModeParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentSeedMode {
    None,
    Manual,
    AutoLibrary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    Random,
    RoundRobin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostingMode {
    PublishNow,
    Schedule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    AutoApprove,
    NeedsManualApprove,
}

/// Visual style requested from the image model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiImageStyle {
    NaturePhoto,
    IslamicPattern,
    MinimalGradient,
    Generated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ImageMode {
    ReuseLastUpload,
    LibraryFixed,
    LibraryTag,
    QuoteCard,
    Ai(AiImageStyle),
    NonePlaceholder,
}

impl ContentSeedMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentSeedMode::None => "none",
            ContentSeedMode::Manual => "manual",
            ContentSeedMode::AutoLibrary => "auto_library",
        }
    }
}

impl FromStr for ContentSeedMode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "none" => Ok(ContentSeedMode::None),
            "manual" => Ok(ContentSeedMode::Manual),
            "auto_library" => Ok(ContentSeedMode::AutoLibrary),
            other => Err(ModeParseError::new("content_seed_mode", other)),
        }
    }
}

impl SelectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionMode::Random => "random",
            SelectionMode::RoundRobin => "round_robin",
        }
    }
}

impl FromStr for SelectionMode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random" => Ok(SelectionMode::Random),
            "round_robin" => Ok(SelectionMode::RoundRobin),
            other => Err(ModeParseError::new("selection_mode", other)),
        }
    }
}

impl PostingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostingMode::PublishNow => "publish_now",
            PostingMode::Schedule => "schedule",
        }
    }
}

impl FromStr for PostingMode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "publish_now" => Ok(PostingMode::PublishNow),
            "schedule" => Ok(PostingMode::Schedule),
            other => Err(ModeParseError::new("posting_mode", other)),
        }
    }
}

impl ApprovalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalMode::AutoApprove => "auto_approve",
            ApprovalMode::NeedsManualApprove => "needs_manual_approve",
        }
    }
}

impl FromStr for ApprovalMode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto_approve" => Ok(ApprovalMode::AutoApprove),
            "needs_manual_approve" => Ok(ApprovalMode::NeedsManualApprove),
            other => Err(ModeParseError::new("approval_mode", other)),
        }
    }
}

impl AiImageStyle {
    /// Tag recorded on media assets generated in this style.
    pub fn tag(&self) -> &'static str {
        match self {
            AiImageStyle::NaturePhoto => "ai_nature_photo",
            AiImageStyle::IslamicPattern => "ai_islamic_pattern",
            AiImageStyle::MinimalGradient => "ai_minimal_gradient",
            AiImageStyle::Generated => "ai_generated",
        }
    }
}

impl ImageMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageMode::ReuseLastUpload => "reuse_last_upload",
            ImageMode::LibraryFixed => "library_fixed",
            ImageMode::LibraryTag => "library_tag",
            ImageMode::QuoteCard => "quote_card",
            ImageMode::Ai(style) => style.tag(),
            ImageMode::NonePlaceholder => "none_placeholder",
        }
    }

    pub fn is_ai(&self) -> bool {
        matches!(self, ImageMode::Ai(_))
    }
}

impl FromStr for ImageMode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reuse_last_upload" => Ok(ImageMode::ReuseLastUpload),
            "library_fixed" => Ok(ImageMode::LibraryFixed),
            "library_tag" => Ok(ImageMode::LibraryTag),
            "quote_card" => Ok(ImageMode::QuoteCard),
            "ai_nature_photo" => Ok(ImageMode::Ai(AiImageStyle::NaturePhoto)),
            "ai_islamic_pattern" => Ok(ImageMode::Ai(AiImageStyle::IslamicPattern)),
            "ai_minimal_gradient" => Ok(ImageMode::Ai(AiImageStyle::MinimalGradient)),
            "ai_generated" => Ok(ImageMode::Ai(AiImageStyle::Generated)),
            "none_placeholder" => Ok(ImageMode::NonePlaceholder),
            other => Err(ModeParseError::new("image_mode", other)),
        }
    }
}

impl fmt::Display for ImageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ImageMode> for String {
    fn from(mode: ImageMode) -> Self {
        mode.as_str().to_string()
    }
}

impl TryFrom<String> for ImageMode {
    type Error = ModeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<String> for ContentSeedMode {
    type Error = ModeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<String> for SelectionMode {
    type Error = ModeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<String> for PostingMode {
    type Error = ModeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<String> for ApprovalMode {
    type Error = ModeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Automation {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub account_id: Uuid,
    pub name: String,

    // Generation
    pub topic_prompt: String,
    pub style_preset: String,
    /// `short` | `medium` | `long`
    pub tone: String,
    pub language: String,
    pub banned_phrases: Vec<String>,
    /// 0.0 – 1.0, mapped to model temperature.
    pub creativity: f64,
    pub content_profile_id: Option<Uuid>,

    // Sourcing
    #[sqlx(try_from = "String")]
    pub content_seed_mode: ContentSeedMode,
    pub manual_seed_text: Option<String>,
    pub use_prebuilt_packs: bool,
    pub use_org_library: bool,
    pub source_id: Option<Uuid>,
    #[sqlx(try_from = "String")]
    pub selection_mode: SelectionMode,
    pub items_per_run: i32,
    /// Opaque at this boundary; see `selection::cursor`.
    pub selection_cursor: Option<String>,
    pub avoid_repeat_days: i32,

    // Media
    #[sqlx(try_from = "String")]
    pub image_mode: ImageMode,
    pub fixed_media_id: Option<Uuid>,
    pub media_tag_query: Option<String>,

    // Scheduling
    /// Local `HH:MM`; falls back to the account's slot.
    pub post_time: Option<String>,
    /// IANA name; falls back to the account's zone.
    pub timezone: Option<String>,
    pub enabled: bool,

    // Posting policy
    #[sqlx(try_from = "String")]
    pub posting_mode: PostingMode,
    #[sqlx(try_from = "String")]
    pub approval_mode: ApprovalMode,

    // Outcome tracking
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_post_id: Option<Uuid>,
    pub last_error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Automation {
    /// Tags requested through `media_tag_query`, comma or whitespace separated.
    pub fn media_tags(&self) -> Vec<String> {
        self.media_tag_query
            .as_deref()
            .unwrap_or("")
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect()
    }

    pub fn items_per_run(&self) -> usize {
        self.items_per_run.max(1) as usize
    }
}
