use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::ModeParseError;

/// Post lifecycle. `failed` is reachable from any state after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Submitted,
    Drafted,
    NeedsReview,
    Scheduled,
    Published,
    Failed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Submitted => "submitted",
            PostStatus::Drafted => "drafted",
            PostStatus::NeedsReview => "needs_review",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Published => "published",
            PostStatus::Failed => "failed",
        }
    }
}

impl FromStr for PostStatus {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(PostStatus::Submitted),
            "drafted" => Ok(PostStatus::Drafted),
            "needs_review" => Ok(PostStatus::NeedsReview),
            "scheduled" => Ok(PostStatus::Scheduled),
            "published" => Ok(PostStatus::Published),
            "failed" => Ok(PostStatus::Failed),
            other => Err(ModeParseError::new("post status", other)),
        }
    }
}

impl TryFrom<String> for PostStatus {
    type Error = ModeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub account_id: Uuid,
    pub automation_id: Option<Uuid>,
    pub content_item_id: Option<i64>,
    pub caption: Option<String>,
    pub hashtags: Vec<String>,
    pub alt_text: Option<String>,
    pub media_url: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: PostStatus,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub published_time: Option<DateTime<Utc>>,
    pub remote_media_id: Option<String>,
    /// Open bag of failure reasons; always merged, never replaced.
    pub flags: Value,
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// Caption as sent to the platform: caption, blank line, space-joined hashtags.
    pub fn publish_caption(&self) -> String {
        let caption = self.caption.as_deref().unwrap_or("").trim_end();
        let tags = self
            .hashtags
            .iter()
            .map(|t| {
                let t = t.trim();
                if t.starts_with('#') {
                    t.to_string()
                } else {
                    format!("#{t}")
                }
            })
            .filter(|t| t.len() > 1)
            .collect::<Vec<_>>()
            .join(" ");
        if tags.is_empty() {
            caption.to_string()
        } else {
            format!("{caption}\n\n{tags}")
        }
    }
}

/// Insert payload for a post produced by a run.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub tenant_id: Uuid,
    pub account_id: Uuid,
    pub automation_id: Option<Uuid>,
    pub content_item_id: Option<i64>,
    pub caption: Option<String>,
    pub hashtags: Vec<String>,
    pub alt_text: Option<String>,
    pub media_url: Option<String>,
    pub status: PostStatus,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub flags: Value,
}

/// A status-changing write applied to an existing post in one statement.
#[derive(Debug, Clone)]
pub struct PostTransition {
    pub status: PostStatus,
    pub published_time: Option<DateTime<Utc>>,
    pub remote_media_id: Option<String>,
    /// Merged into `flags` key by key.
    pub flags_patch: Value,
}

impl PostTransition {
    pub fn published(at: DateTime<Utc>, remote_media_id: String) -> Self {
        Self {
            status: PostStatus::Published,
            published_time: Some(at),
            remote_media_id: Some(remote_media_id),
            flags_patch: Value::Object(Default::default()),
        }
    }

    pub fn failed(flags_patch: Value) -> Self {
        Self {
            status: PostStatus::Failed,
            published_time: None,
            remote_media_id: None,
            flags_patch,
        }
    }
}

/// Shallow-merges `patch` into `flags`. Non-object inputs are coerced to objects.
pub fn merge_flags(flags: &mut Value, patch: &Value) {
    if !flags.is_object() {
        *flags = Value::Object(Default::default());
    }
    if let (Some(target), Some(source)) = (flags.as_object_mut(), patch.as_object()) {
        for (key, value) in source {
            target.insert(key.clone(), value.clone());
        }
    }
}
