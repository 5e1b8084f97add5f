//! Publishing a persisted post and recording the outcome on it.
//!
//! Shared by the run engine (`publish_now`) and the due-post sweep.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{info, warn};

use crate::models::account::Account;
use crate::models::post::{Post, PostTransition};
use crate::publish::{PublishError, PublishRequest, PublishStep, Publisher};
use crate::store::Store;

/// Publishes `post` for `account` and commits the resulting transition.
///
/// Publish failures are recorded on the post (`failed` + `flags.publish_error`)
/// and are not errors here; only datastore failures are. Returns `None` when
/// the post was no longer `scheduled` by the time the outcome was committed.
pub async fn deliver(
    store: &dyn Store,
    publisher: &Publisher,
    post: &Post,
    account: &Account,
    now: DateTime<Utc>,
) -> Result<Option<Post>> {
    let outcome = match post.media_url.as_deref() {
        Some(image_url) => {
            let caption = post.publish_caption();
            publisher
                .publish(&PublishRequest {
                    ig_user_id: &account.ig_user_id,
                    access_token: &account.access_token,
                    image_url,
                    caption: &caption,
                })
                .await
        }
        None => Err(PublishError {
            step: PublishStep::Media,
            detail: "post has no media_url".to_string(),
            reason: None,
        }),
    };

    let transition = match outcome {
        Ok(published) => {
            info!(
                "Post {} published as {} after {} attempt(s)",
                post.id, published.media_id, published.attempts
            );
            PostTransition::published(now, published.media_id)
        }
        Err(e) => {
            warn!("Post {} failed to publish: {e}", post.id);
            PostTransition::failed(json!({ "publish_error": e }))
        }
    };

    let updated = store.transition_post(post.id, transition).await?;
    if updated.is_none() {
        warn!("Post {} was already transitioned, outcome not recorded", post.id);
    }
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::post::PostStatus;
    use crate::publish::testing::FakeGraph;
    use crate::publish::PublishConfig;
    use crate::store::memory::{account_fixture, post_fixture, MemoryStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_success_marks_post_published() {
        let store = MemoryStore::new();
        let account = account_fixture("UTC", "09:00");
        let mut post = post_fixture(&account, Some("https://x/img1.jpg"));
        post.status = PostStatus::Scheduled;
        post.hashtags = vec!["#gratitude".to_string()];
        store.put_post(post.clone());

        let graph = Arc::new(FakeGraph::succeeding());
        let publisher = Publisher::new(graph.clone(), PublishConfig::default());
        let now = Utc::now();

        let updated = deliver(&store, &publisher, &post, &account, now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, PostStatus::Published);
        assert_eq!(updated.published_time, Some(now));
        assert_eq!(updated.remote_media_id.as_deref(), Some("media-1"));

        let calls = graph.create_calls.lock().unwrap();
        assert_eq!(calls[0].0, "https://x/img1.jpg");
        assert!(calls[0].1.ends_with("\n\n#gratitude"));
    }

    #[tokio::test]
    async fn test_failure_is_recorded_in_flags() {
        let store = MemoryStore::new();
        let account = account_fixture("UTC", "09:00");
        let mut post = post_fixture(&account, Some("https://x/img1.jpg"));
        post.status = PostStatus::Scheduled;
        post.flags = json!({ "topic_angle": "kept" });
        store.put_post(post.clone());

        let graph = Arc::new(FakeGraph::scripted(vec![Err(190)], None));
        let publisher = Publisher::new(graph, PublishConfig::default());

        let updated = deliver(&store, &publisher, &post, &account, Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, PostStatus::Failed);
        assert_eq!(updated.flags["publish_error"]["step"], "media_publish");
        assert_eq!(updated.flags["topic_angle"], "kept");
    }

    #[tokio::test]
    async fn test_post_that_left_scheduled_is_not_overwritten() {
        let store = MemoryStore::new();
        let account = account_fixture("UTC", "09:00");
        let mut post = post_fixture(&account, Some("https://x/img1.jpg"));
        post.status = PostStatus::Published;
        post.remote_media_id = Some("media-0".to_string());
        store.put_post(post.clone());

        let graph = Arc::new(FakeGraph::scripted(vec![Err(190)], None));
        let publisher = Publisher::new(graph, PublishConfig::default());

        let updated = deliver(&store, &publisher, &post, &account, Utc::now())
            .await
            .unwrap();
        assert!(updated.is_none());
        let stored = store.post(post.id).unwrap();
        assert_eq!(stored.status, PostStatus::Published);
        assert_eq!(stored.remote_media_id.as_deref(), Some("media-0"));
        assert!(stored.flags.get("publish_error").is_none());
    }
}
