//! Persistence contract for the automation pipeline.
//!
//! The pipeline only talks to the datastore through these traits. `PgStore`
//! is the production implementation; tests use the in-memory store.

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::account::Account;
use crate::models::automation::Automation;
use crate::models::content::{ContentItem, ContentProfile, RetrievedChunk};
use crate::models::media::{MediaAsset, NewMediaAsset};
use crate::models::post::{NewPost, Post, PostTransition};

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
    // Automations
    async fn get_automation(&self, id: Uuid) -> Result<Option<Automation>>;
    async fn list_enabled_automations(&self) -> Result<Vec<Automation>>;
    /// Returns false when no such automation exists.
    async fn set_automation_enabled(&self, id: Uuid, enabled: bool) -> Result<bool>;
    async fn delete_automation(&self, id: Uuid) -> Result<bool>;
    async fn set_automation_error(&self, id: Uuid, error: &str) -> Result<()>;
    /// Success bookkeeping: last run/post, cleared error, advanced cursor.
    async fn record_run_success(
        &self,
        id: Uuid,
        post_id: Uuid,
        cursor: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<()>;

    // Accounts and brand
    async fn get_account(&self, id: Uuid) -> Result<Option<Account>>;
    async fn get_content_profile(&self, id: Uuid) -> Result<Option<ContentProfile>>;

    // Posts
    async fn insert_post(&self, post: NewPost) -> Result<Post>;
    /// Applies `transition` only while the post is still `scheduled`.
    /// Returns `None` when the post has already left that state.
    async fn transition_post(&self, id: Uuid, transition: PostTransition) -> Result<Option<Post>>;
    /// `scheduled` posts with `scheduled_time <= now`, oldest first.
    async fn due_posts(&self, now: DateTime<Utc>) -> Result<Vec<Post>>;
    /// Most recent non-null media URL among the account's posts.
    async fn last_media_url(&self, account_id: Uuid) -> Result<Option<String>>;

    // Media library
    async fn get_media_asset(&self, id: Uuid) -> Result<Option<MediaAsset>>;
    async fn tenant_media_assets(&self, tenant_id: Uuid) -> Result<Vec<MediaAsset>>;
    async fn insert_media_asset(&self, asset: NewMediaAsset) -> Result<MediaAsset>;

    // Content library
    async fn source_items(&self, source_id: Uuid) -> Result<Vec<ContentItem>>;
    async fn items_tagged(&self, tenant_id: Uuid, tag: &str) -> Result<Vec<ContentItem>>;
    /// Item ids this automation used at or after `since`.
    async fn items_used_since(
        &self,
        automation_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<HashSet<i64>>;
    /// Bumps usage counters and appends one `ContentUsage` row per item, atomically.
    async fn mark_content_used(
        &self,
        automation_id: Uuid,
        post_id: Uuid,
        item_ids: &[i64],
        at: DateTime<Utc>,
    ) -> Result<()>;
}

/// Tenant document retrieval used by `auto_library` grounding.
#[async_trait]
pub trait DocumentRetriever: Send + Sync {
    async fn retrieve(&self, tenant_id: Uuid, query: &str, k: usize)
        -> Result<Vec<RetrievedChunk>>;
}
