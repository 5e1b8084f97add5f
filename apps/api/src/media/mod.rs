//! Media Resolver: decides where a post's image comes from.
//!
//! Lookups that find nothing return `Ok(None)`. For the AI modes every
//! generation, download or storage failure is logged and also reported as
//! `Ok(None)`; only datastore errors on the lookup paths propagate.

pub mod prompts;
pub mod storage;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{info, warn};
use uuid::Uuid;

use crate::llm_client::images::ImageModel;
use crate::media::prompts::build_image_prompt;
use crate::media::storage::{extension_for, MediaStorage};
use crate::models::automation::{AiImageStyle, ImageMode};
use crate::models::media::NewMediaAsset;
use crate::store::Store;

/// Everything the resolver needs to know about the post being illustrated.
#[derive(Debug, Clone)]
pub struct MediaRequest<'a> {
    pub mode: ImageMode,
    pub topic: &'a str,
    pub account_id: Uuid,
    pub tenant_id: Uuid,
    pub fixed_asset_id: Option<Uuid>,
    pub tag_query: Vec<String>,
    pub concept: Option<&'a str>,
}

/// Upper bound on one storage write.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct MediaResolver {
    store: Arc<dyn Store>,
    images: Option<Arc<dyn ImageModel>>,
    storage: Arc<dyn MediaStorage>,
    placeholder_url: Option<String>,
    store_timeout: Duration,
}

impl MediaResolver {
    pub fn new(
        store: Arc<dyn Store>,
        images: Option<Arc<dyn ImageModel>>,
        storage: Arc<dyn MediaStorage>,
        placeholder_url: Option<String>,
    ) -> Self {
        Self {
            store,
            images,
            storage,
            placeholder_url,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub async fn resolve(&self, request: &MediaRequest<'_>, rng: &mut StdRng) -> Result<Option<String>> {
        match request.mode {
            ImageMode::ReuseLastUpload => self.store.last_media_url(request.account_id).await,
            ImageMode::LibraryFixed => match request.fixed_asset_id {
                Some(id) => Ok(self.store.get_media_asset(id).await?.map(|a| a.url)),
                None => Ok(None),
            },
            ImageMode::LibraryTag => self.pick_tagged(request, rng).await,
            ImageMode::Ai(style) => Ok(self
                .generate(style, request, vec![style.tag().to_string()])
                .await),
            ImageMode::QuoteCard => match request.concept {
                Some(_) => Ok(self
                    .generate(
                        AiImageStyle::MinimalGradient,
                        request,
                        vec!["quote_card".to_string()],
                    )
                    .await),
                None => Ok(None),
            },
            ImageMode::NonePlaceholder => Ok(self.placeholder_url.clone()),
        }
    }

    async fn pick_tagged(
        &self,
        request: &MediaRequest<'_>,
        rng: &mut StdRng,
    ) -> Result<Option<String>> {
        if request.tag_query.is_empty() {
            return Ok(None);
        }
        let assets = self.store.tenant_media_assets(request.tenant_id).await?;
        let matching: Vec<_> = assets
            .iter()
            .filter(|a| a.has_any_tag(&request.tag_query))
            .collect();
        Ok(matching.choose(rng).map(|a| a.url.clone()))
    }

    /// Generates, re-hosts and registers an image. Any failure yields `None`.
    async fn generate(
        &self,
        style: AiImageStyle,
        request: &MediaRequest<'_>,
        mut tags: Vec<String>,
    ) -> Option<String> {
        let Some(images) = &self.images else {
            warn!("AI image mode {} requested but no image model is configured", request.mode);
            return None;
        };

        let prompt = build_image_prompt(style, request.topic, request.concept);
        let transient_url = match images.generate(&prompt).await {
            Ok(url) => url,
            Err(e) => {
                warn!("Image generation failed: {e}");
                return None;
            }
        };

        let (bytes, content_type) = match images.download(&transient_url).await {
            Ok(downloaded) => downloaded,
            Err(e) => {
                warn!("Downloading generated image failed: {e}");
                return None;
            }
        };

        let key = format!(
            "generated/{}/{}.{}",
            request.tenant_id,
            Uuid::new_v4(),
            extension_for(&content_type)
        );
        let put = self.storage.put(&key, bytes, &content_type);
        let url = match tokio::time::timeout(self.store_timeout, put).await {
            Ok(Ok(url)) => url,
            Ok(Err(e)) => {
                warn!("Storing generated image failed: {e:#}");
                return None;
            }
            Err(_) => {
                warn!(
                    "Storing generated image timed out after {}s",
                    self.store_timeout.as_secs()
                );
                return None;
            }
        };

        let topic_tag = request.topic.trim().to_lowercase();
        if !topic_tag.is_empty() {
            tags.push(topic_tag);
        }
        let asset = NewMediaAsset {
            tenant_id: request.tenant_id,
            account_id: Some(request.account_id),
            url: url.clone(),
            storage_path: key,
            tags,
        };
        if let Err(e) = self.store.insert_media_asset(asset).await {
            warn!("Registering generated media asset failed: {e:#}");
            return None;
        }

        info!("Generated {} image stored at {url}", request.mode);
        Some(url)
    }
}

#[cfg(test)]
pub mod testing {
    //! Image model and storage doubles.

    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use bytes::Bytes;

    use crate::llm_client::images::{ImageError, ImageModel};
    use crate::media::storage::MediaStorage;

    /// Image model that either always works or always fails to generate.
    pub struct FakeImageModel {
        pub succeed: bool,
        pub calls: AtomicUsize,
    }

    impl FakeImageModel {
        pub fn working() -> Self {
            Self {
                succeed: true,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn broken() -> Self {
            Self {
                succeed: false,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ImageModel for FakeImageModel {
        async fn generate(&self, _prompt: &str) -> Result<String, ImageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                Ok("https://transient.example/img.png".to_string())
            } else {
                Err(ImageError::NoImage)
            }
        }

        async fn download(&self, _url: &str) -> Result<(Bytes, String), ImageError> {
            Ok((Bytes::from_static(b"\x89PNG"), "image/png".to_string()))
        }
    }

    /// Storage that records nothing and hands back a CDN URL.
    pub struct FakeStorage;

    #[async_trait]
    impl MediaStorage for FakeStorage {
        async fn put(&self, key: &str, _bytes: Bytes, _content_type: &str) -> anyhow::Result<String> {
            Ok(format!("https://cdn.example/{key}"))
        }
    }
}
