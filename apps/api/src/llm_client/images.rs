//! Image model client (OpenAI Images API).
//!
//! Generated URLs are transient; callers download and re-host the bytes
//! before anything is persisted.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::llm_client::prompts::NO_TEXT_IN_IMAGE;

const OPENAI_IMAGES_URL: &str = "https://api.openai.com/v1/images/generations";
pub const IMAGE_MODEL: &str = "dall-e-3";
const IMAGE_SIZE: &str = "1024x1024";

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("image model returned no image")]
    NoImage,

    #[error("image download failed with status {0}")]
    Download(u16),
}

#[async_trait]
pub trait ImageModel: Send + Sync {
    /// Generates one image and returns its transient URL. The prompt is sent
    /// as-is; build it with `with_no_text_constraint`.
    async fn generate(&self, prompt: &str) -> Result<String, ImageError>;

    /// Fetches the bytes behind a transient URL, with its content type.
    async fn download(&self, url: &str) -> Result<(Bytes, String), ImageError>;
}

/// Appends the no-lettering constraint every image prompt carries.
pub fn with_no_text_constraint(prompt: &str) -> String {
    format!("{}. {}", prompt.trim_end_matches('.'), NO_TEXT_IN_IMAGE)
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
}

#[derive(Clone)]
pub struct OpenAiImageClient {
    client: Client,
    api_key: String,
}

impl OpenAiImageClient {
    pub fn new(api_key: String, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
        }
    }
}

#[async_trait]
impl ImageModel for OpenAiImageClient {
    async fn generate(&self, prompt: &str) -> Result<String, ImageError> {
        let response = self
            .client
            .post(OPENAI_IMAGES_URL)
            .bearer_auth(&self.api_key)
            .json(&ImageRequest {
                model: IMAGE_MODEL,
                prompt,
                n: 1,
                size: IMAGE_SIZE,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ImageError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ImageResponse = response.json().await?;
        let url = body
            .data
            .into_iter()
            .find_map(|d| d.url)
            .ok_or(ImageError::NoImage)?;
        debug!("Image model returned transient URL");
        Ok(url)
    }

    async fn download(&self, url: &str) -> Result<(Bytes, String), ImageError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::Download(status.as_u16()));
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/png")
            .to_string();
        Ok((response.bytes().await?, content_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_text_constraint_is_appended_once() {
        let prompt = with_no_text_constraint("A calm lake at dawn.");
        assert!(prompt.starts_with("A calm lake at dawn. "));
        assert!(prompt.ends_with(NO_TEXT_IN_IMAGE));
        assert_eq!(prompt.matches("no text").count(), 1);
    }
}
