use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One reusable piece of source material (quote, snippet, excerpt).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ContentItem {
    pub id: i64,
    pub tenant_id: Uuid,
    pub source_id: Option<Uuid>,
    pub text: String,
    pub text_secondary: Option<String>,
    pub tags: Vec<String>,
    pub source_title: Option<String>,
    pub reference: Option<String>,
    pub use_count: i32,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Append-only audit row: automation × post × content item.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ContentUsage {
    pub id: Uuid,
    pub automation_id: Uuid,
    pub post_id: Uuid,
    pub content_item_id: i64,
    pub used_at: DateTime<Utc>,
}

impl ContentUsage {
    pub fn new(automation_id: Uuid, post_id: Uuid, content_item_id: i64, used_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            automation_id,
            post_id,
            content_item_id,
            used_at,
        }
    }
}

/// Brand voice attached to automations via `content_profile_id`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ContentProfile {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub brand_name: String,
    pub voice: Option<String>,
    pub audience: Option<String>,
    pub avoid_words: Vec<String>,
}

/// A chunk of an uploaded tenant document, as returned by retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub text: String,
    pub source_title: String,
    pub url: Option<String>,
    pub score: u32,
}

#[derive(Debug, Clone, FromRow)]
pub struct DocumentChunk {
    pub id: i64,
    pub tenant_id: Uuid,
    pub text: String,
    pub source_title: String,
    pub url: Option<String>,
}
