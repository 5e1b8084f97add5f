use std::collections::HashSet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::models::account::Account;
use crate::models::automation::Automation;
use crate::models::content::{
    ContentItem, ContentProfile, ContentUsage, DocumentChunk, RetrievedChunk,
};
use crate::models::media::{MediaAsset, NewMediaAsset};
use crate::models::post::{NewPost, Post, PostTransition};
use crate::selection::keywords::{rank_chunks, topic_keywords};
use crate::store::{DocumentRetriever, Store};

/// Upper bound on candidate chunks pulled per retrieval before ranking.
const CHUNK_CANDIDATE_LIMIT: i64 = 500;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn get_automation(&self, id: Uuid) -> Result<Option<Automation>> {
        Ok(
            sqlx::query_as::<_, Automation>("SELECT * FROM automations WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_enabled_automations(&self) -> Result<Vec<Automation>> {
        Ok(sqlx::query_as::<_, Automation>(
            "SELECT * FROM automations WHERE enabled = TRUE ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn set_automation_enabled(&self, id: Uuid, enabled: bool) -> Result<bool> {
        let result =
            sqlx::query("UPDATE automations SET enabled = $2, updated_at = now() WHERE id = $1")
                .bind(id)
                .bind(enabled)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_automation(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM automations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_automation_error(&self, id: Uuid, error: &str) -> Result<()> {
        sqlx::query("UPDATE automations SET last_error = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(error)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_run_success(
        &self,
        id: Uuid,
        post_id: Uuid,
        cursor: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE automations
            SET last_run_at = $2,
                last_post_id = $3,
                last_error = NULL,
                selection_cursor = COALESCE($4, selection_cursor),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(at)
        .bind(post_id)
        .bind(cursor)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_account(&self, id: Uuid) -> Result<Option<Account>> {
        Ok(
            sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn get_content_profile(&self, id: Uuid) -> Result<Option<ContentProfile>> {
        Ok(
            sqlx::query_as::<_, ContentProfile>("SELECT * FROM content_profiles WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn insert_post(&self, post: NewPost) -> Result<Post> {
        let row = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts
                (id, tenant_id, account_id, automation_id, content_item_id, caption,
                 hashtags, alt_text, media_url, status, scheduled_time, flags)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(post.tenant_id)
        .bind(post.account_id)
        .bind(post.automation_id)
        .bind(post.content_item_id)
        .bind(&post.caption)
        .bind(&post.hashtags)
        .bind(&post.alt_text)
        .bind(&post.media_url)
        .bind(post.status.as_str())
        .bind(post.scheduled_time)
        .bind(&post.flags)
        .fetch_one(&self.pool)
        .await
        .context("inserting post")?;
        Ok(row)
    }

    async fn transition_post(&self, id: Uuid, transition: PostTransition) -> Result<Option<Post>> {
        let row = sqlx::query_as::<_, Post>(
            r#"
            UPDATE posts
            SET status = $2,
                published_time = COALESCE($3, published_time),
                remote_media_id = COALESCE($4, remote_media_id),
                flags = COALESCE(flags, '{}'::jsonb) || $5::jsonb
            WHERE id = $1 AND status = 'scheduled'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(transition.status.as_str())
        .bind(transition.published_time)
        .bind(&transition.remote_media_id)
        .bind(&transition.flags_patch)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("transitioning post {id}"))?;
        Ok(row)
    }

    async fn due_posts(&self, now: DateTime<Utc>) -> Result<Vec<Post>> {
        Ok(sqlx::query_as::<_, Post>(
            r#"
            SELECT * FROM posts
            WHERE status = 'scheduled' AND scheduled_time <= $1
            ORDER BY scheduled_time ASC
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn last_media_url(&self, account_id: Uuid) -> Result<Option<String>> {
        Ok(sqlx::query_scalar::<_, String>(
            r#"
            SELECT media_url FROM posts
            WHERE account_id = $1 AND media_url IS NOT NULL
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn get_media_asset(&self, id: Uuid) -> Result<Option<MediaAsset>> {
        Ok(
            sqlx::query_as::<_, MediaAsset>("SELECT * FROM media_assets WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn tenant_media_assets(&self, tenant_id: Uuid) -> Result<Vec<MediaAsset>> {
        Ok(sqlx::query_as::<_, MediaAsset>(
            "SELECT * FROM media_assets WHERE tenant_id = $1 ORDER BY created_at",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_media_asset(&self, asset: NewMediaAsset) -> Result<MediaAsset> {
        Ok(sqlx::query_as::<_, MediaAsset>(
            r#"
            INSERT INTO media_assets (id, tenant_id, account_id, url, storage_path, tags)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(asset.tenant_id)
        .bind(asset.account_id)
        .bind(&asset.url)
        .bind(&asset.storage_path)
        .bind(&asset.tags)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn source_items(&self, source_id: Uuid) -> Result<Vec<ContentItem>> {
        Ok(sqlx::query_as::<_, ContentItem>(
            "SELECT * FROM content_items WHERE source_id = $1 ORDER BY id",
        )
        .bind(source_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn items_tagged(&self, tenant_id: Uuid, tag: &str) -> Result<Vec<ContentItem>> {
        Ok(sqlx::query_as::<_, ContentItem>(
            r#"
            SELECT * FROM content_items
            WHERE tenant_id = $1
              AND EXISTS (SELECT 1 FROM unnest(tags) t WHERE lower(t) = lower($2))
            ORDER BY id
            "#,
        )
        .bind(tenant_id)
        .bind(tag)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn items_used_since(
        &self,
        automation_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<HashSet<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT content_item_id FROM content_usages
            WHERE automation_id = $1 AND used_at >= $2
            "#,
        )
        .bind(automation_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().collect())
    }

    async fn mark_content_used(
        &self,
        automation_id: Uuid,
        post_id: Uuid,
        item_ids: &[i64],
        at: DateTime<Utc>,
    ) -> Result<()> {
        if item_ids.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE content_items SET use_count = use_count + 1, last_used_at = $2 WHERE id = ANY($1)",
        )
        .bind(item_ids)
        .bind(at)
        .execute(&mut *tx)
        .await?;

        for &item_id in item_ids {
            let usage = ContentUsage::new(automation_id, post_id, item_id, at);
            sqlx::query(
                r#"
                INSERT INTO content_usages (id, automation_id, post_id, content_item_id, used_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(usage.id)
            .bind(usage.automation_id)
            .bind(usage.post_id)
            .bind(usage.content_item_id)
            .bind(usage.used_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(
            "Marked {} content items used for automation {automation_id}",
            item_ids.len()
        );
        Ok(())
    }
}

#[async_trait]
impl DocumentRetriever for PgStore {
    async fn retrieve(
        &self,
        tenant_id: Uuid,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        let keywords = topic_keywords(query);
        if keywords.is_empty() {
            return Ok(Vec::new());
        }
        let patterns: Vec<String> = keywords.iter().map(|kw| format!("%{kw}%")).collect();

        let candidates = sqlx::query_as::<_, DocumentChunk>(
            r#"
            SELECT id, tenant_id, text, source_title, url
            FROM document_chunks
            WHERE tenant_id = $1 AND text ILIKE ANY($2)
            ORDER BY id
            LIMIT $3
            "#,
        )
        .bind(tenant_id)
        .bind(&patterns)
        .bind(CHUNK_CANDIDATE_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        Ok(rank_chunks(&keywords, candidates, k))
    }
}
