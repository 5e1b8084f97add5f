//! Automation Run Engine: one run produces at most one `Post`.
//!
//! Flow: load automation → topic angle → content selection → caption →
//!       guardrails → media (with reuse fallback) → status → persist →
//!       success bookkeeping → optional immediate publish.
//!
//! Expected failures (guardrail, missing media) still persist a `failed` post.
//! Upstream errors (model, datastore, bad schedule) abort the run, are written
//! to `automation.last_error`, and produce no post.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::automation::delivery::deliver;
use crate::automation::schedule::{DailySchedule, ScheduleError};
use crate::generation::generator::{generate_caption, CaptionRequest, CaptionResult};
use crate::generation::variations::{choose_angle, TopicAngle};
use crate::llm_client::{LlmError, TextModel};
use crate::media::{MediaRequest, MediaResolver};
use crate::models::account::Account;
use crate::models::automation::{ApprovalMode, Automation, ImageMode, PostingMode};
use crate::models::post::{NewPost, Post, PostStatus};
use crate::publish::Publisher;
use crate::selection::{ContentSelector, Selection};
use crate::store::Store;

pub const DEFAULT_TOPIC_VARIATIONS: usize = 5;

/// Reason recorded when an `auto_library` run found nothing to ground on.
pub const NO_LIBRARY_SOURCES: &str = "no_library_sources_found";
pub const MEDIA_MISSING: &str = "media_url missing";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("automation {0} has no linked account")]
    MissingAccount(Uuid),

    #[error("llm_error: {0}")]
    Llm(#[from] LlmError),

    #[error("schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("datastore error: {0:#}")]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Sub-angles requested per run; 0 disables variations.
    pub topic_variations: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            topic_variations: DEFAULT_TOPIC_VARIATIONS,
        }
    }
}

pub struct AutomationEngine {
    store: Arc<dyn Store>,
    selector: ContentSelector,
    media: MediaResolver,
    text_model: Arc<dyn TextModel>,
    publisher: Arc<Publisher>,
    config: EngineConfig,
}

impl AutomationEngine {
    pub fn new(
        store: Arc<dyn Store>,
        selector: ContentSelector,
        media: MediaResolver,
        text_model: Arc<dyn TextModel>,
        publisher: Arc<Publisher>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            selector,
            media,
            text_model,
            publisher,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn publisher(&self) -> &Arc<Publisher> {
        &self.publisher
    }

    /// Runs automation `id` once. Returns the post produced, or `None` when
    /// the automation is missing or disabled, or the run aborted.
    pub async fn run(&self, id: Uuid) -> Option<Post> {
        let mut rng = StdRng::from_entropy();
        self.run_at(id, Utc::now(), &mut rng).await
    }

    pub async fn run_at(&self, id: Uuid, now: DateTime<Utc>, rng: &mut StdRng) -> Option<Post> {
        let automation = match self.store.get_automation(id).await {
            Ok(Some(a)) if a.enabled => a,
            Ok(Some(_)) => {
                info!("Automation {id} is disabled, skipping run");
                return None;
            }
            Ok(None) => {
                info!("Automation {id} no longer exists, skipping run");
                return None;
            }
            Err(e) => {
                error!("Failed to load automation {id}: {e:#}");
                return None;
            }
        };

        match self.execute(&automation, now, rng).await {
            Ok(post) => {
                info!(
                    "Automation {id} produced post {} with status {}",
                    post.id, post.status
                );
                Some(post)
            }
            Err(e) => {
                error!("Automation {id} run failed: {e}");
                if let Err(store_err) = self.store.set_automation_error(id, &e.to_string()).await {
                    error!("Failed to record error on automation {id}: {store_err:#}");
                }
                None
            }
        }
    }

    async fn execute(
        &self,
        automation: &Automation,
        now: DateTime<Utc>,
        rng: &mut StdRng,
    ) -> Result<Post, EngineError> {
        let account = self
            .store
            .get_account(automation.account_id)
            .await?
            .ok_or(EngineError::MissingAccount(automation.account_id))?;

        // Step 1: topic angle
        let topic = automation.topic_prompt.as_str();
        let angle = choose_angle(
            self.text_model.as_ref(),
            topic,
            self.config.topic_variations,
            rng,
        )
        .await;
        info!("Automation {}: angle {:?}", automation.id, angle.as_str());

        // Step 2: grounding
        let selection = self.selector.select(topic, automation, now, rng).await?;

        // Step 3: caption + guardrails
        let profile = match automation.content_profile_id {
            Some(pid) => self.store.get_content_profile(pid).await?,
            None => None,
        };
        let caption = generate_caption(
            self.text_model.as_ref(),
            &CaptionRequest {
                topic,
                angle: angle.as_str(),
                style: &automation.style_preset,
                tone: &automation.tone,
                language: &automation.language,
                banned_phrases: &automation.banned_phrases,
                profile: profile.as_ref(),
                creativity: automation.creativity,
                grounding: &selection.grounding,
            },
        )
        .await?;

        let mut flags = base_flags(&angle, &selection);

        if let Some(reason) = caption.fail_reason {
            flags["reason"] = json!(reason.code());
            let post = self
                .persist(automation, &selection, &caption, None, PostStatus::Failed, None, flags)
                .await?;
            self.store
                .set_automation_error(automation.id, &format!("guardrail: {reason}"))
                .await?;
            return Ok(post);
        }

        // Step 4: media
        let media_url = self
            .resolve_media(automation, &account, &selection, rng)
            .await?;
        let Some(media_url) = media_url else {
            flags["automation_error"] = json!(MEDIA_MISSING);
            let post = self
                .persist(automation, &selection, &caption, None, PostStatus::Failed, None, flags)
                .await?;
            self.store
                .set_automation_error(automation.id, MEDIA_MISSING)
                .await?;
            return Ok(post);
        };

        // Step 5: status
        let (status, scheduled_time) = if selection.starved {
            flags["reason"] = json!(NO_LIBRARY_SOURCES);
            (PostStatus::NeedsReview, None)
        } else if automation.approval_mode == ApprovalMode::NeedsManualApprove {
            (PostStatus::Drafted, None)
        } else if automation.posting_mode == PostingMode::PublishNow {
            // No scheduled_time: the due-post sweep must not pick it up mid-publish.
            (PostStatus::Scheduled, None)
        } else {
            let schedule = DailySchedule::for_automation(automation, Some(&account))?;
            (PostStatus::Scheduled, Some(schedule.next_after(now)?))
        };

        // Step 6: persist, then bookkeeping
        let post = self
            .persist(
                automation,
                &selection,
                &caption,
                Some(media_url),
                status,
                scheduled_time,
                flags,
            )
            .await?;

        self.selector
            .mark_used(automation.id, post.id, &selection, now)
            .await?;
        self.store
            .record_run_success(
                automation.id,
                post.id,
                selection.next_cursor.as_ref().map(|c| c.encode()),
                now,
            )
            .await?;

        // Step 7: immediate publish
        if post.status == PostStatus::Scheduled
            && automation.posting_mode == PostingMode::PublishNow
            && automation.approval_mode == ApprovalMode::AutoApprove
        {
            let Some(post) =
                deliver(self.store.as_ref(), &self.publisher, &post, &account, now).await?
            else {
                return Ok(post);
            };
            if post.status == PostStatus::Failed {
                self.store
                    .set_automation_error(automation.id, &publish_error_text(&post.flags))
                    .await?;
            }
            return Ok(post);
        }

        Ok(post)
    }

    /// Resolves media for the run. An AI or quote-card mode that yields
    /// nothing falls back once to the account's last upload.
    async fn resolve_media(
        &self,
        automation: &Automation,
        account: &Account,
        selection: &Selection,
        rng: &mut StdRng,
    ) -> anyhow::Result<Option<String>> {
        let mut request = MediaRequest {
            mode: automation.image_mode,
            topic: &automation.topic_prompt,
            account_id: account.id,
            tenant_id: automation.tenant_id,
            fixed_asset_id: automation.fixed_media_id,
            tag_query: automation.media_tags(),
            concept: match automation.image_mode {
                ImageMode::QuoteCard => selection.primary_text(),
                _ => None,
            },
        };

        let url = self.media.resolve(&request, rng).await?;
        if url.is_some() || !(request.mode.is_ai() || request.mode == ImageMode::QuoteCard) {
            return Ok(url);
        }

        warn!(
            "Automation {}: {} produced no media, falling back to last upload",
            automation.id, request.mode
        );
        request.mode = ImageMode::ReuseLastUpload;
        self.media.resolve(&request, rng).await
    }

    #[allow(clippy::too_many_arguments)]
    async fn persist(
        &self,
        automation: &Automation,
        selection: &Selection,
        caption: &CaptionResult,
        media_url: Option<String>,
        status: PostStatus,
        scheduled_time: Option<DateTime<Utc>>,
        flags: Value,
    ) -> anyhow::Result<Post> {
        self.store
            .insert_post(NewPost {
                tenant_id: automation.tenant_id,
                account_id: automation.account_id,
                automation_id: Some(automation.id),
                content_item_id: selection.items.first().map(|i| i.id),
                caption: Some(caption.caption.clone()).filter(|c| !c.is_empty()),
                hashtags: caption.hashtags.clone(),
                alt_text: Some(caption.alt_text.clone()).filter(|a| !a.is_empty()),
                media_url,
                status,
                scheduled_time,
                flags,
            })
            .await
    }
}

fn base_flags(angle: &TopicAngle, selection: &Selection) -> Value {
    json!({
        "topic_angle": angle.as_str(),
        "angle_source": match angle {
            TopicAngle::Variation(_) => "variation",
            TopicAngle::Original(_) => "original",
        },
        "grounding": selection.grounding.mode(),
    })
}

fn publish_error_text(flags: &Value) -> String {
    let err = &flags["publish_error"];
    format!(
        "publish failed at {}: {}",
        err["step"].as_str().unwrap_or("unknown"),
        err["detail"].as_str().unwrap_or("")
    )
}
