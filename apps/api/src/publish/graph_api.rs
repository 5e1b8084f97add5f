//! Remote publish API: Graph-style two-endpoint container protocol.
//!
//! `POST {base}/{ig_user_id}/media`         → `{id}` (creation id) or `{error}`
//! `POST {base}/{ig_user_id}/media_publish` → `{id}` (media id) or `{error:{code}}`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_GRAPH_API_BASE: &str = "https://graph.facebook.com/v19.0";

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote API answered with an `error` object.
    #[error("Graph API error (code {code:?}): {message}")]
    Api { code: Option<i64>, message: String },

    #[error("Graph API response had neither id nor error (status {0})")]
    Malformed(u16),
}

impl GraphError {
    pub fn code(&self) -> Option<i64> {
        match self {
            GraphError::Api { code, .. } => *code,
            _ => None,
        }
    }
}

#[async_trait]
pub trait GraphApi: Send + Sync {
    /// Creates a media container, returning its creation id.
    async fn create_container(
        &self,
        ig_user_id: &str,
        image_url: &str,
        caption: &str,
        access_token: &str,
    ) -> Result<String, GraphError>;

    /// Publishes a container, returning the published media id.
    async fn publish_container(
        &self,
        ig_user_id: &str,
        creation_id: &str,
        access_token: &str,
    ) -> Result<String, GraphError>;
}

#[derive(Debug, Deserialize)]
struct GraphResponse {
    id: Option<String>,
    error: Option<GraphErrorBody>,
}

#[derive(Debug, Deserialize)]
struct GraphErrorBody {
    #[serde(default)]
    message: String,
    code: Option<i64>,
}

#[derive(Clone)]
pub struct GraphClient {
    client: Client,
    base_url: String,
}

impl GraphClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post(&self, path: &str, form: &[(&str, &str)]) -> Result<String, GraphError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self.client.post(&url).form(&form).send().await?;
        let status = response.status().as_u16();
        let body: GraphResponse = response.json().await?;
        debug!("Graph API {path} answered {status}");
        interpret(body, status)
    }
}

fn interpret(body: GraphResponse, status: u16) -> Result<String, GraphError> {
    if let Some(err) = body.error {
        return Err(GraphError::Api {
            code: err.code,
            message: err.message,
        });
    }
    body.id.ok_or(GraphError::Malformed(status))
}

#[async_trait]
impl GraphApi for GraphClient {
    async fn create_container(
        &self,
        ig_user_id: &str,
        image_url: &str,
        caption: &str,
        access_token: &str,
    ) -> Result<String, GraphError> {
        self.post(
            &format!("{ig_user_id}/media"),
            &[
                ("image_url", image_url),
                ("caption", caption),
                ("access_token", access_token),
            ],
        )
        .await
    }

    async fn publish_container(
        &self,
        ig_user_id: &str,
        creation_id: &str,
        access_token: &str,
    ) -> Result<String, GraphError> {
        self.post(
            &format!("{ig_user_id}/media_publish"),
            &[("creation_id", creation_id), ("access_token", access_token)],
        )
        .await
    }
}
