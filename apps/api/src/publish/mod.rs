//! Publisher: two-phase container publish with bounded readiness polling.
//!
//! CREATE_CONTAINER → POLL_PUBLISH → PUBLISHED. The poll is a fixed-delay
//! busy-wait on the "not ready" code, not exponential backoff.
//!
//! The publisher never touches the datastore and never returns transport
//! errors raw: every failure comes back as a `PublishError { step, detail }`.
//! Persisting the outcome is the caller's job.

pub mod graph_api;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::publish::graph_api::GraphApi;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(4);
/// Graph error code for "media not ready yet".
pub const DEFAULT_NOT_READY_CODE: i64 = 9007;

#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub not_ready_code: i64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            not_ready_code: DEFAULT_NOT_READY_CODE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStep {
    Media,
    MediaPublish,
}

impl fmt::Display for PublishStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PublishStep::Media => "media",
            PublishStep::MediaPublish => "media_publish",
        })
    }
}

#[derive(Debug, Clone, Error, PartialEq, Serialize)]
#[error("publish failed at {step}: {detail}")]
pub struct PublishError {
    pub step: PublishStep,
    pub detail: String,
    /// Set to `never_ready` when the poll budget ran out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PublishError {
    fn at(step: PublishStep, detail: impl Into<String>) -> Self {
        Self {
            step,
            detail: detail.into(),
            reason: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub creation_id: String,
    pub media_id: String,
    pub attempts: u32,
}

/// What to publish and where.
#[derive(Debug, Clone)]
pub struct PublishRequest<'a> {
    pub ig_user_id: &'a str,
    pub access_token: &'a str,
    pub image_url: &'a str,
    /// Fully assembled caption, hashtags included.
    pub caption: &'a str,
}

pub struct Publisher {
    api: Arc<dyn GraphApi>,
    config: PublishConfig,
}

impl Publisher {
    pub fn new(api: Arc<dyn GraphApi>, config: PublishConfig) -> Self {
        Self { api, config }
    }

    pub async fn publish(&self, request: &PublishRequest<'_>) -> Result<Published, PublishError> {
        let creation_id = self
            .api
            .create_container(
                request.ig_user_id,
                request.image_url,
                request.caption,
                request.access_token,
            )
            .await
            .map_err(|e| PublishError::at(PublishStep::Media, e.to_string()))?;

        let max_attempts = self.config.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            match self
                .api
                .publish_container(request.ig_user_id, &creation_id, request.access_token)
                .await
            {
                Ok(media_id) => {
                    info!(
                        "Published container {creation_id} as {media_id} on attempt {attempt}/{max_attempts}"
                    );
                    return Ok(Published {
                        creation_id,
                        media_id,
                        attempts: attempt,
                    });
                }
                Err(e) if e.code() == Some(self.config.not_ready_code) => {
                    warn!("Container {creation_id} not ready (attempt {attempt}/{max_attempts})");
                    if attempt < max_attempts {
                        tokio::time::sleep(self.config.retry_delay).await;
                    }
                }
                Err(e) => {
                    return Err(PublishError::at(PublishStep::MediaPublish, e.to_string()));
                }
            }
        }

        Err(PublishError {
            step: PublishStep::MediaPublish,
            detail: format!("container {creation_id} not ready after {max_attempts} attempts"),
            reason: Some("never_ready".to_string()),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeGraph;
    use super::*;

    fn request() -> PublishRequest<'static> {
        PublishRequest {
            ig_user_id: "17841400000000000",
            access_token: "token",
            image_url: "https://x/img1.jpg",
            caption: "caption\n\n#tag",
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_ready_three_times_then_success() {
        let graph = Arc::new(FakeGraph::scripted(
            vec![Err(9007), Err(9007), Err(9007), Ok("media-42".to_string())],
            None,
        ));
        let publisher = Publisher::new(graph.clone(), PublishConfig::default());

        let published = publisher.publish(&request()).await.unwrap();
        assert_eq!(published.media_id, "media-42");
        assert_eq!(published.attempts, 4);
        assert_eq!(graph.publish_attempts(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_ready_stops_at_budget() {
        let graph = Arc::new(FakeGraph::scripted(vec![], Some(9007)));
        let publisher = Publisher::new(graph.clone(), PublishConfig::default());

        let err = publisher.publish(&request()).await.unwrap_err();
        assert_eq!(err.step, PublishStep::MediaPublish);
        assert_eq!(err.reason.as_deref(), Some("never_ready"));
        assert_eq!(graph.publish_attempts(), DEFAULT_MAX_ATTEMPTS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_wait_the_fixed_delay() {
        let graph = Arc::new(FakeGraph::scripted(vec![Err(9007), Err(9007)], None));
        let publisher = Publisher::new(graph, PublishConfig::default());

        let started = tokio::time::Instant::now();
        publisher.publish(&request()).await.unwrap();
        assert_eq!(started.elapsed(), DEFAULT_RETRY_DELAY * 2);
    }

    #[tokio::test]
    async fn test_create_failure_reports_media_step() {
        let mut graph = FakeGraph::succeeding();
        graph.create_fails = true;
        let graph = Arc::new(graph);
        let publisher = Publisher::new(graph.clone(), PublishConfig::default());

        let err = publisher.publish(&request()).await.unwrap_err();
        assert_eq!(err.step, PublishStep::Media);
        assert!(err.detail.contains("Invalid image_url"));
        assert_eq!(graph.publish_attempts(), 0);
    }

    #[tokio::test]
    async fn test_other_publish_error_is_not_retried() {
        let graph = Arc::new(FakeGraph::scripted(vec![Err(190)], None));
        let publisher = Publisher::new(graph.clone(), PublishConfig::default());

        let err = publisher.publish(&request()).await.unwrap_err();
        assert_eq!(err.step, PublishStep::MediaPublish);
        assert!(err.reason.is_none());
        assert_eq!(graph.publish_attempts(), 1);
    }
}
