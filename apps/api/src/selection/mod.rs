//! Content Selector: picks grounding material for one automation run.
//!
//! Selection has no side effects. Usage is recorded separately through
//! `mark_used`, and only once the resulting post has been persisted.

pub mod cursor;
pub mod keywords;
pub mod packs;
pub mod recency;
pub mod rotation;

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::automation::{Automation, ContentSeedMode, SelectionMode};
use crate::models::content::{ContentItem, RetrievedChunk};
use crate::selection::cursor::SelectionCursor;
use crate::selection::packs::PrebuiltPacks;
use crate::selection::recency::pick_avoiding_repeats;
use crate::selection::rotation::{round_robin, weighted_random};
use crate::store::{DocumentRetriever, Store};

/// Chunks retrieved per run in `auto_library` mode when no item count is set.
pub const DEFAULT_LIBRARY_K: usize = 3;

/// The grounding handed to the caption generator.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Grounding {
    None,
    ManualSeed {
        text: String,
    },
    AutoLibrary {
        chunks: Vec<RetrievedChunk>,
    },
    GroundedLibrary {
        text: String,
        reference: Option<String>,
        source_title: Option<String>,
    },
}

impl Grounding {
    pub fn mode(&self) -> &'static str {
        match self {
            Grounding::None => "none",
            Grounding::ManualSeed { .. } => "manual_seed",
            Grounding::AutoLibrary { .. } => "auto_library",
            Grounding::GroundedLibrary { .. } => "grounded_library",
        }
    }

    /// Reference string that must appear verbatim in the caption, if any.
    pub fn required_reference(&self) -> Option<&str> {
        match self {
            Grounding::GroundedLibrary {
                reference: Some(r),
                ..
            } if !r.trim().is_empty() => Some(r.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Selection {
    /// Library items picked this run; only these are marked used.
    pub items: Vec<ContentItem>,
    pub grounding: Grounding,
    /// Cursor to persist after a successful run; `None` leaves it unchanged.
    pub next_cursor: Option<SelectionCursor>,
    /// `auto_library` was requested but nothing matched.
    pub starved: bool,
}

impl Selection {
    fn empty() -> Self {
        Self {
            items: Vec::new(),
            grounding: Grounding::None,
            next_cursor: None,
            starved: false,
        }
    }

    pub fn item_ids(&self) -> Vec<i64> {
        self.items.iter().map(|i| i.id).collect()
    }

    /// Text of the primary selected snippet, used by quote cards.
    pub fn primary_text(&self) -> Option<&str> {
        if let Some(item) = self.items.first() {
            return Some(item.text.as_str());
        }
        match &self.grounding {
            Grounding::GroundedLibrary { text, .. } | Grounding::ManualSeed { text } => {
                Some(text.as_str())
            }
            Grounding::AutoLibrary { chunks } => chunks.first().map(|c| c.text.as_str()),
            Grounding::None => None,
        }
    }
}

pub struct ContentSelector {
    store: Arc<dyn Store>,
    retriever: Arc<dyn DocumentRetriever>,
    packs: Arc<PrebuiltPacks>,
}

impl ContentSelector {
    pub fn new(
        store: Arc<dyn Store>,
        retriever: Arc<dyn DocumentRetriever>,
        packs: Arc<PrebuiltPacks>,
    ) -> Self {
        Self {
            store,
            retriever,
            packs,
        }
    }

    /// Chooses zero or more snippets for `topic`.
    ///
    /// Order of precedence:
    /// 1. `source_id` set → rotation over that source (round-robin or weighted random)
    /// 2. `manual` → the seed text verbatim
    /// 3. `auto_library` → tenant documents, then prebuilt packs, then the
    ///    organisation library with repeat avoidance
    pub async fn select(
        &self,
        topic: &str,
        automation: &Automation,
        now: DateTime<Utc>,
        rng: &mut StdRng,
    ) -> Result<Selection> {
        if let Some(source_id) = automation.source_id {
            return self.select_from_source(source_id, automation, rng).await;
        }

        match automation.content_seed_mode {
            ContentSeedMode::None => Ok(Selection::empty()),
            ContentSeedMode::Manual => Ok(select_manual(automation)),
            ContentSeedMode::AutoLibrary => self.select_library(topic, automation, now, rng).await,
        }
    }

    async fn select_from_source(
        &self,
        source_id: Uuid,
        automation: &Automation,
        rng: &mut StdRng,
    ) -> Result<Selection> {
        let items = self.store.source_items(source_id).await?;
        let count = automation.items_per_run();

        let (picked, next_cursor) = match automation.selection_mode {
            SelectionMode::RoundRobin => {
                let cursor = SelectionCursor::decode(automation.selection_cursor.as_deref());
                round_robin(&items, cursor, count)
            }
            SelectionMode::Random => (weighted_random(&items, count, rng), None),
        };

        debug!(
            "Source {source_id}: picked {} of {} items ({})",
            picked.len(),
            items.len(),
            automation.selection_mode.as_str()
        );

        let grounding = grounding_for_items(&picked);
        Ok(Selection {
            items: picked,
            grounding,
            next_cursor,
            starved: false,
        })
    }

    async fn select_library(
        &self,
        topic: &str,
        automation: &Automation,
        now: DateTime<Utc>,
        rng: &mut StdRng,
    ) -> Result<Selection> {
        let k = if automation.items_per_run > 0 {
            automation.items_per_run()
        } else {
            DEFAULT_LIBRARY_K
        };

        let chunks = self
            .retriever
            .retrieve(automation.tenant_id, topic, k)
            .await?;
        if !chunks.is_empty() {
            info!("Retrieved {} library chunks for {topic:?}", chunks.len());
            return Ok(Selection {
                grounding: Grounding::AutoLibrary { chunks },
                ..Selection::empty()
            });
        }

        if automation.use_prebuilt_packs {
            if let Some(item) = self.packs.find(topic) {
                return Ok(Selection {
                    grounding: Grounding::GroundedLibrary {
                        text: item.text.clone(),
                        reference: item.reference.clone(),
                        source_title: item.source.clone(),
                    },
                    ..Selection::empty()
                });
            }
        }

        if automation.use_org_library {
            if let Some(item) = self.pick_library_item(topic, automation, now, rng).await? {
                let grounding = grounding_for_items(std::slice::from_ref(&item));
                return Ok(Selection {
                    items: vec![item],
                    grounding,
                    ..Selection::empty()
                });
            }
        }

        info!("No library sources found for {topic:?}");
        Ok(Selection {
            starved: true,
            ..Selection::empty()
        })
    }

    /// Topic-tagged organisation item not used by this automation within
    /// `avoid_repeat_days` of `now`.
    pub async fn pick_library_item(
        &self,
        topic: &str,
        automation: &Automation,
        now: DateTime<Utc>,
        rng: &mut StdRng,
    ) -> Result<Option<ContentItem>> {
        let tag = topic.trim().to_lowercase();
        let candidates = self.store.items_tagged(automation.tenant_id, &tag).await?;
        if candidates.is_empty() {
            return Ok(None);
        }

        let recently_used = if automation.avoid_repeat_days > 0 {
            let since = now - Duration::days(automation.avoid_repeat_days as i64);
            self.store.items_used_since(automation.id, since).await?
        } else {
            Default::default()
        };

        Ok(pick_avoiding_repeats(&candidates, &recently_used, rng))
    }

    /// Records usage of every selected library item against `post_id`.
    pub async fn mark_used(
        &self,
        automation_id: Uuid,
        post_id: Uuid,
        selection: &Selection,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let ids = selection.item_ids();
        if ids.is_empty() {
            return Ok(());
        }
        self.store
            .mark_content_used(automation_id, post_id, &ids, now)
            .await
    }
}

fn select_manual(automation: &Automation) -> Selection {
    match automation.manual_seed_text.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => Selection {
            grounding: Grounding::ManualSeed {
                text: text.to_string(),
            },
            ..Selection::empty()
        },
        _ => Selection::empty(),
    }
}

fn grounding_for_items(items: &[ContentItem]) -> Grounding {
    match items {
        [] => Grounding::None,
        [item] => Grounding::GroundedLibrary {
            text: item.text.clone(),
            reference: item.reference.clone(),
            source_title: item.source_title.clone(),
        },
        many => Grounding::AutoLibrary {
            chunks: many
                .iter()
                .map(|item| RetrievedChunk {
                    text: item.text.clone(),
                    source_title: item.source_title.clone().unwrap_or_default(),
                    url: None,
                    score: 0,
                })
                .collect(),
        },
    }
}
