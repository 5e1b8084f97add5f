//! In-memory `Store` used by the pipeline tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::models::account::Account;
use crate::models::automation::{
    ApprovalMode, Automation, ContentSeedMode, ImageMode, PostingMode, SelectionMode,
};
use crate::models::content::{ContentItem, ContentProfile, ContentUsage, RetrievedChunk};
use crate::models::media::{MediaAsset, NewMediaAsset};
use crate::models::post::{merge_flags, NewPost, Post, PostStatus, PostTransition};
use crate::store::{DocumentRetriever, Store};

#[derive(Default)]
struct Tables {
    accounts: HashMap<Uuid, Account>,
    automations: HashMap<Uuid, Automation>,
    profiles: HashMap<Uuid, ContentProfile>,
    posts: Vec<Post>,
    media: Vec<MediaAsset>,
    items: Vec<ContentItem>,
    usages: Vec<ContentUsage>,
    chunks: HashMap<Uuid, Vec<RetrievedChunk>>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_account(&self, account: Account) {
        self.tables.lock().unwrap().accounts.insert(account.id, account);
    }

    pub fn put_automation(&self, automation: Automation) {
        self.tables
            .lock()
            .unwrap()
            .automations
            .insert(automation.id, automation);
    }

    pub fn put_profile(&self, profile: ContentProfile) {
        self.tables.lock().unwrap().profiles.insert(profile.id, profile);
    }

    pub fn put_post(&self, post: Post) {
        self.tables.lock().unwrap().posts.push(post);
    }

    pub fn put_media(&self, asset: MediaAsset) {
        self.tables.lock().unwrap().media.push(asset);
    }

    pub fn put_item(&self, item: ContentItem) {
        self.tables.lock().unwrap().items.push(item);
    }

    pub fn put_usage(&self, usage: ContentUsage) {
        self.tables.lock().unwrap().usages.push(usage);
    }

    pub fn put_chunks(&self, tenant_id: Uuid, chunks: Vec<RetrievedChunk>) {
        self.tables.lock().unwrap().chunks.insert(tenant_id, chunks);
    }

    pub fn automation(&self, id: Uuid) -> Option<Automation> {
        self.tables.lock().unwrap().automations.get(&id).cloned()
    }

    pub fn posts(&self) -> Vec<Post> {
        self.tables.lock().unwrap().posts.clone()
    }

    pub fn post(&self, id: Uuid) -> Option<Post> {
        self.posts().into_iter().find(|p| p.id == id)
    }

    pub fn usages(&self) -> Vec<ContentUsage> {
        self.tables.lock().unwrap().usages.clone()
    }

    pub fn items(&self) -> Vec<ContentItem> {
        self.tables.lock().unwrap().items.clone()
    }

    pub fn media(&self) -> Vec<MediaAsset> {
        self.tables.lock().unwrap().media.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_automation(&self, id: Uuid) -> Result<Option<Automation>> {
        Ok(self.automation(id))
    }

    async fn list_enabled_automations(&self) -> Result<Vec<Automation>> {
        let tables = self.tables.lock().unwrap();
        let mut enabled: Vec<_> = tables
            .automations
            .values()
            .filter(|a| a.enabled)
            .cloned()
            .collect();
        enabled.sort_by_key(|a| a.created_at);
        Ok(enabled)
    }

    async fn set_automation_enabled(&self, id: Uuid, enabled: bool) -> Result<bool> {
        let mut tables = self.tables.lock().unwrap();
        match tables.automations.get_mut(&id) {
            Some(a) => {
                a.enabled = enabled;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_automation(&self, id: Uuid) -> Result<bool> {
        Ok(self.tables.lock().unwrap().automations.remove(&id).is_some())
    }

    async fn set_automation_error(&self, id: Uuid, error: &str) -> Result<()> {
        if let Some(a) = self.tables.lock().unwrap().automations.get_mut(&id) {
            a.last_error = Some(error.to_string());
        }
        Ok(())
    }

    async fn record_run_success(
        &self,
        id: Uuid,
        post_id: Uuid,
        cursor: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        if let Some(a) = self.tables.lock().unwrap().automations.get_mut(&id) {
            a.last_run_at = Some(at);
            a.last_post_id = Some(post_id);
            a.last_error = None;
            if cursor.is_some() {
                a.selection_cursor = cursor;
            }
        }
        Ok(())
    }

    async fn get_account(&self, id: Uuid) -> Result<Option<Account>> {
        Ok(self.tables.lock().unwrap().accounts.get(&id).cloned())
    }

    async fn get_content_profile(&self, id: Uuid) -> Result<Option<ContentProfile>> {
        Ok(self.tables.lock().unwrap().profiles.get(&id).cloned())
    }

    async fn insert_post(&self, post: NewPost) -> Result<Post> {
        let row = Post {
            id: Uuid::new_v4(),
            tenant_id: post.tenant_id,
            account_id: post.account_id,
            automation_id: post.automation_id,
            content_item_id: post.content_item_id,
            caption: post.caption,
            hashtags: post.hashtags,
            alt_text: post.alt_text,
            media_url: post.media_url,
            status: post.status,
            scheduled_time: post.scheduled_time,
            published_time: None,
            remote_media_id: None,
            flags: post.flags,
            created_at: Utc::now(),
        };
        self.tables.lock().unwrap().posts.push(row.clone());
        Ok(row)
    }

    async fn transition_post(&self, id: Uuid, transition: PostTransition) -> Result<Option<Post>> {
        let mut tables = self.tables.lock().unwrap();
        let post = tables
            .posts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| anyhow!("post {id} not found"))?;
        if post.status != PostStatus::Scheduled {
            return Ok(None);
        }
        post.status = transition.status;
        if transition.published_time.is_some() {
            post.published_time = transition.published_time;
        }
        if transition.remote_media_id.is_some() {
            post.remote_media_id = transition.remote_media_id;
        }
        merge_flags(&mut post.flags, &transition.flags_patch);
        Ok(Some(post.clone()))
    }

    async fn due_posts(&self, now: DateTime<Utc>) -> Result<Vec<Post>> {
        let tables = self.tables.lock().unwrap();
        let mut due: Vec<_> = tables
            .posts
            .iter()
            .filter(|p| p.status == PostStatus::Scheduled)
            .filter(|p| p.scheduled_time.is_some_and(|t| t <= now))
            .cloned()
            .collect();
        due.sort_by_key(|p| p.scheduled_time);
        Ok(due)
    }

    async fn last_media_url(&self, account_id: Uuid) -> Result<Option<String>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .posts
            .iter()
            .filter(|p| p.account_id == account_id && p.media_url.is_some())
            .max_by_key(|p| p.created_at)
            .and_then(|p| p.media_url.clone()))
    }

    async fn get_media_asset(&self, id: Uuid) -> Result<Option<MediaAsset>> {
        Ok(self.media().into_iter().find(|m| m.id == id))
    }

    async fn tenant_media_assets(&self, tenant_id: Uuid) -> Result<Vec<MediaAsset>> {
        Ok(self
            .media()
            .into_iter()
            .filter(|m| m.tenant_id == tenant_id)
            .collect())
    }

    async fn insert_media_asset(&self, asset: NewMediaAsset) -> Result<MediaAsset> {
        let row = MediaAsset {
            id: Uuid::new_v4(),
            tenant_id: asset.tenant_id,
            account_id: asset.account_id,
            url: asset.url,
            storage_path: asset.storage_path,
            tags: asset.tags,
            created_at: Utc::now(),
        };
        self.tables.lock().unwrap().media.push(row.clone());
        Ok(row)
    }

    async fn source_items(&self, source_id: Uuid) -> Result<Vec<ContentItem>> {
        let mut items: Vec<_> = self
            .items()
            .into_iter()
            .filter(|i| i.source_id == Some(source_id))
            .collect();
        items.sort_by_key(|i| i.id);
        Ok(items)
    }

    async fn items_tagged(&self, tenant_id: Uuid, tag: &str) -> Result<Vec<ContentItem>> {
        Ok(self
            .items()
            .into_iter()
            .filter(|i| i.tenant_id == tenant_id)
            .filter(|i| i.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)))
            .collect())
    }

    async fn items_used_since(
        &self,
        automation_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<HashSet<i64>> {
        Ok(self
            .usages()
            .into_iter()
            .filter(|u| u.automation_id == automation_id && u.used_at >= since)
            .map(|u| u.content_item_id)
            .collect())
    }

    async fn mark_content_used(
        &self,
        automation_id: Uuid,
        post_id: Uuid,
        item_ids: &[i64],
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tables = self.tables.lock().unwrap();
        for item in tables.items.iter_mut().filter(|i| item_ids.contains(&i.id)) {
            item.use_count += 1;
            item.last_used_at = Some(at);
        }
        for &content_item_id in item_ids {
            tables
                .usages
                .push(ContentUsage::new(automation_id, post_id, content_item_id, at));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentRetriever for MemoryStore {
    async fn retrieve(
        &self,
        tenant_id: Uuid,
        _query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .chunks
            .get(&tenant_id)
            .map(|c| c.iter().take(k).cloned().collect())
            .unwrap_or_default())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Fixtures
// ────────────────────────────────────────────────────────────────────────────

pub fn account_fixture(timezone: &str, daily_post_time: &str) -> Account {
    Account {
        id: Uuid::new_v4(),
        tenant_id: Uuid::new_v4(),
        name: "test account".to_string(),
        ig_user_id: "17841400000000000".to_string(),
        access_token: "token".to_string(),
        timezone: Some(timezone.to_string()),
        daily_post_time: Some(daily_post_time.to_string()),
        is_active: true,
        created_at: Utc::now(),
    }
}

pub fn automation_fixture(account: &Account, topic: &str) -> Automation {
    Automation {
        id: Uuid::new_v4(),
        tenant_id: account.tenant_id,
        account_id: account.id,
        name: format!("{topic} daily"),
        topic_prompt: topic.to_string(),
        style_preset: "educational".to_string(),
        tone: "medium".to_string(),
        language: "en".to_string(),
        banned_phrases: vec![],
        creativity: 0.5,
        content_profile_id: None,
        content_seed_mode: ContentSeedMode::None,
        manual_seed_text: None,
        use_prebuilt_packs: false,
        use_org_library: false,
        source_id: None,
        selection_mode: SelectionMode::RoundRobin,
        items_per_run: 1,
        selection_cursor: None,
        avoid_repeat_days: 30,
        image_mode: ImageMode::ReuseLastUpload,
        fixed_media_id: None,
        media_tag_query: None,
        post_time: None,
        timezone: None,
        enabled: true,
        posting_mode: PostingMode::Schedule,
        approval_mode: ApprovalMode::AutoApprove,
        last_run_at: None,
        last_post_id: None,
        last_error: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn post_fixture(account: &Account, media_url: Option<&str>) -> Post {
    Post {
        id: Uuid::new_v4(),
        tenant_id: account.tenant_id,
        account_id: account.id,
        automation_id: None,
        content_item_id: None,
        caption: Some("An earlier caption that was published".to_string()),
        hashtags: vec![],
        alt_text: None,
        media_url: media_url.map(str::to_string),
        status: PostStatus::Published,
        scheduled_time: None,
        published_time: None,
        remote_media_id: None,
        flags: json!({}),
        created_at: Utc::now(),
    }
}

pub fn item_fixture(id: i64, tenant_id: Uuid, source_id: Option<Uuid>, text: &str) -> ContentItem {
    ContentItem {
        id,
        tenant_id,
        source_id,
        text: text.to_string(),
        text_secondary: None,
        tags: vec![],
        source_title: None,
        reference: None,
        use_count: 0,
        last_used_at: None,
        created_at: Utc::now(),
    }
}
